//! # Sellergate
//!
//! **Entitlement checks for distributed host extensions against their seller's server.**
//!
//! Each licensed product ("product id") is validated against a remote
//! provider. The verdict is cached per product and re-checked once a day.
//!
//! ## Features
//!
//! - **Fail-open validation**: an unreachable or misbehaving provider never locks a
//!   paying customer out; only an explicit `"error"` verdict does
//! - **Multiple sellers**: installers pick which provider sold them the product
//! - **Daily cadence**: first check at the next 03:00 (UTC+09:00), hourly ticks are
//!   no-ops until the anchor passes
//! - **Host capabilities injected**: storage, HTTP and timers are traits
//!
//! ## Quickstart
//!
//! ```no_run
//! use sellergate::{
//!     Collaborators, FileStore, ManualTaskScheduler, ProductConfig, RequestContext,
//!     ReqwestTransport, SchedulerHandle,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), sellergate::SellergateError> {
//!     let config = ProductConfig::new("my-widget", "2.1.0", "My Widget")
//!         .with_sellers(["aivec", "welcart"], "aivec");
//!
//!     let timer = Arc::new(ManualTaskScheduler::new());
//!     let collaborators = Collaborators::new(
//!         Arc::new(FileStore::new("my-widget")?),
//!         Arc::new(ReqwestTransport::new(&config)?),
//!         timer.clone(),
//!     );
//!
//!     let handle = SchedulerHandle::initialize(
//!         config,
//!         collaborators,
//!         &RequestContext::new("shop.example.com"),
//!     )?;
//!
//!     if !handle.is_entitled() {
//!         eprintln!("{}", handle.current_failure_message());
//!     }
//!
//!     // From the host's hourly cron hook:
//!     timer.fire_all();
//!     Ok(())
//! }
//! ```
//!
//! ## Environment
//!
//! - `SELLERGATE_ENV`: `prod` (default), `staging` or `dev`
//! - `SELLERGATE_BRIDGE_IP` / `SELLERGATE_BRIDGE_PORT`: dev bridge address
//!
//! See [`DeploymentConfig::from_env`].

#![doc(html_root_url = "https://docs.rs/sellergate/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Wire format and transport
pub mod client;
pub mod protocol;

// Persistence
pub mod store;

// Providers and validation
pub mod provider;
pub mod validator;

// Lifecycle
pub mod notifier;
pub mod scheduler;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use client::{HttpResponse, HttpTransport, ReqwestTransport};
pub use config::{
    DeploymentConfig, Environment, EnvironmentFingerprint, ProductConfig, RequestContext,
};
pub use errors::SellergateError;
pub use protocol::LicensedItemMeta;
pub use provider::{EndpointOverride, ProviderMetaOverride, SellerChoice};
pub use scheduler::{
    AuthEvent, AuthEventKind, Collaborators, ManualTaskScheduler, SchedulerHandle, TaskScheduler,
};
pub use store::{AuthState, EntitlementRecord, FileStore, KeyValueStore, MemoryStore};
pub use validator::{RemoteValidator, ValidationOutcome, ValidationRequest, Validator};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
