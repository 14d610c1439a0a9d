//! Outbound HTTP.

pub mod http;

pub use http::{build_user_agent, HttpResponse, HttpTransport, ReqwestTransport};
