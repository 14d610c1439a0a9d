//! Wire format for the remote authenticate call and update-server errors.

pub mod models;

pub use models::{
    parse_auth_response, update_error_message, AuthRequest, AuthResponse, AuthResult,
    LicensedItemMeta,
};
