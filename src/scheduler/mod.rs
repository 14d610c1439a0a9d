//! Authentication state machine and recurring check scheduling.
//!
//! The [`SchedulerHandle`] owns a product's lifecycle:
//! - validates immediately while the cached verdict is false (except on
//!   heartbeat requests)
//! - arms an hourly tick once validated; the tick only calls the provider
//!   when the daily anchor has passed
//! - serializes every write to the product's record behind a per-product
//!   guard, so the stored verdict is always that of the last completed attempt
//!
//! Validation, persistence and timing are collaborators, not base classes:
//! see [`Collaborators`].

pub mod cadence;
pub mod events;
pub mod timer;

pub use events::{AuthEvent, AuthEventKind, AuthListener, EventBus};
pub use timer::{ManualTaskScheduler, TaskCallback, TaskScheduler};

use crate::client::HttpTransport;
use crate::clock::{Clock, SystemClock};
use crate::config::{DeploymentConfig, EnvironmentFingerprint, ProductConfig, RequestContext, POLL_INTERVAL};
use crate::notifier::Notifier;
use crate::provider::{ProviderCatalog, ProviderRegistry, SellerChoice};
use crate::store::{AuthState, EntitlementRecord, EntitlementStore, KeyValueStore};
use crate::validator::{self, RemoteValidator, ValidationOutcome, ValidationRequest, Validator};
use crate::SellergateError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One guard per product id, shared by every handle in the process.
static VALIDATION_GUARDS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn validation_guard(product_id: &str) -> Arc<Mutex<()>> {
    VALIDATION_GUARDS
        .lock()
        .entry(product_id.to_string())
        .or_default()
        .clone()
}

/// External capabilities the scheduler is built from.
pub struct Collaborators {
    /// Persistence for entitlement records.
    pub store: Arc<dyn KeyValueStore>,
    /// HTTP capability used by the default validator.
    pub transport: Arc<dyn HttpTransport>,
    /// Host timer infrastructure.
    pub timer: Arc<dyn TaskScheduler>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Deployment environment and dev bridge.
    pub deployment: DeploymentConfig,
    /// Diagnostics sent with every check.
    pub fingerprint: EnvironmentFingerprint,
    /// Replaces the HTTP validator when set.
    pub validator: Option<Arc<dyn Validator>>,
}

impl Collaborators {
    /// Production defaults: system clock, `prod` deployment, empty fingerprint.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        timer: Arc<dyn TaskScheduler>,
    ) -> Self {
        Self {
            store,
            transport,
            timer,
            clock: Arc::new(SystemClock),
            deployment: DeploymentConfig::default(),
            fingerprint: EnvironmentFingerprint::default(),
            validator: None,
        }
    }

    /// Use a specific clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a specific deployment configuration.
    pub fn with_deployment(mut self, deployment: DeploymentConfig) -> Self {
        self.deployment = deployment;
        self
    }

    /// Send these diagnostics with every check.
    pub fn with_fingerprint(mut self, fingerprint: EnvironmentFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Replace the HTTP validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

struct Scheduler {
    product_id: String,
    product_version: String,
    task_name: String,
    registry: ProviderRegistry,
    store: EntitlementStore,
    validator: Arc<dyn Validator>,
    timer: Arc<dyn TaskScheduler>,
    clock: Arc<dyn Clock>,
    fingerprint: EnvironmentFingerprint,
    notifier: Notifier,
    host: RwLock<String>,
    events: EventBus,
    active: AtomicBool,
}

impl Scheduler {
    /// Run one check and persist the transition. Caller holds the guard.
    fn validate_and_transition(
        &self,
        reschedule: Option<DateTime<Utc>>,
    ) -> Result<AuthEvent, SellergateError> {
        let endpoint = self.registry.resolve(&self.product_id, None)?;
        let host = self.host.read().clone();

        let outcome = self.validator.validate(&ValidationRequest {
            product_id: &self.product_id,
            product_version: &self.product_version,
            endpoint: &endpoint,
            host: &host,
            fingerprint: &self.fingerprint,
        });

        let now = self.clock.now_utc();
        let mut record = match self.store.load(&self.product_id) {
            Ok(Some(record)) => record,
            Ok(None) => self.registry.ensure_record(&self.product_id)?,
            Err(e) => {
                warn!(product_id = %self.product_id, error = %e, "unreadable entitlement record, rebuilding");
                self.registry.ensure_record(&self.product_id)?
            }
        };

        let kind = match outcome {
            ValidationOutcome::Success { licensed_item_meta } => {
                record.mark_verified(licensed_item_meta, now);
                AuthEventKind::Success
            }
            ValidationOutcome::Failure {
                message,
                licensed_item_meta,
            } => {
                record.mark_failed(message.clone(), licensed_item_meta, now);
                AuthEventKind::Failure { message }
            }
        };
        if let Some(next) = reschedule {
            record.next_check_at = Some(next);
        }
        self.store.save(&record)?;

        info!(
            product_id = %self.product_id,
            provider = %endpoint.provider,
            verified = record.verified,
            "validation attempt completed"
        );

        Ok(AuthEvent {
            product_id: self.product_id.clone(),
            kind,
        })
    }

    fn load_or_warn(&self) -> Option<EntitlementRecord> {
        match self.store.load(&self.product_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(product_id = %self.product_id, error = %e, "failed to load entitlement record");
                None
            }
        }
    }
}

/// Host-facing handle to a product's authentication lifecycle.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Scheduler>,
}

impl SchedulerHandle {
    /// Register a product and run its activation step.
    ///
    /// Creates (or refreshes) the product's record, then either arms the
    /// recurring check (cached-valid) or validates synchronously.
    ///
    /// # Errors
    /// - `InvalidConfiguration` - bad product config or provider catalog
    /// - `Store` - the record could not be created
    pub fn initialize(
        config: ProductConfig,
        collaborators: Collaborators,
        ctx: &RequestContext,
    ) -> Result<Self, SellergateError> {
        config.validate()?;
        let catalog = ProviderCatalog::build(&config, &collaborators.deployment)?;
        let store = EntitlementStore::new(collaborators.store);
        let registry = ProviderRegistry::new(catalog, store.clone());
        let validator: Arc<dyn Validator> = match collaborators.validator {
            Some(validator) => validator,
            None => Arc::new(RemoteValidator::new(collaborators.transport)),
        };

        let handle = Self {
            inner: Arc::new(Scheduler {
                task_name: format!("{}_validate_install", config.product_id),
                notifier: Notifier::new(config.display_name.clone()),
                product_id: config.product_id,
                product_version: config.product_version,
                registry,
                store,
                validator,
                timer: collaborators.timer,
                clock: collaborators.clock,
                fingerprint: collaborators.fingerprint,
                host: RwLock::new(ctx.host.clone()),
                events: EventBus::default(),
                active: AtomicBool::new(true),
            }),
        };

        {
            let guard = validation_guard(&handle.inner.product_id);
            let _lock = guard.lock();
            handle.inner.registry.ensure_record(&handle.inner.product_id)?;
        }

        info!(
            product_id = %handle.inner.product_id,
            environment = %handle.inner.registry.catalog().environment(),
            "product registered"
        );

        handle.on_request(ctx);
        Ok(handle)
    }

    /// React to a host event.
    ///
    /// Validates synchronously when the cached verdict is false, unless the
    /// request is a heartbeat. When validated, makes sure the recurring check
    /// is armed.
    pub fn on_request(&self, ctx: &RequestContext) -> AuthState {
        if !ctx.host.is_empty() {
            *self.inner.host.write() = ctx.host.clone();
        }

        if self.is_entitled() {
            self.arm_schedule();
            return AuthState::Validated;
        }
        if ctx.is_heartbeat() {
            debug!(product_id = %self.inner.product_id, "heartbeat request, validation skipped");
            return self.state();
        }
        self.validate_now()
    }

    /// Validate now, regardless of the cached verdict.
    pub fn validate_now(&self) -> AuthState {
        let event = {
            let guard = validation_guard(&self.inner.product_id);
            let _lock = guard.lock();
            self.inner.validate_and_transition(None)
        };
        self.finish(event)
    }

    /// Tick of the recurring check.
    ///
    /// A no-op until the stored due time has passed; returns whether a
    /// validation attempt ran.
    pub fn run_scheduled_check(&self) -> bool {
        if !self.inner.active.load(Ordering::SeqCst) {
            debug!(product_id = %self.inner.product_id, "tick after deactivation ignored");
            return false;
        }

        let event = {
            let guard = validation_guard(&self.inner.product_id);
            let _lock = guard.lock();

            let Some(mut record) = self.inner.load_or_warn() else {
                return false;
            };
            let now = self.inner.clock.now_utc();
            match record.next_check_at {
                None => {
                    record.next_check_at = Some(cadence::first_check_after(now));
                    if let Err(e) = self.inner.store.save(&record) {
                        warn!(product_id = %self.inner.product_id, error = %e, "failed to anchor recurring check");
                    }
                    return false;
                }
                Some(due) if !cadence::is_due(due, now) => {
                    debug!(product_id = %self.inner.product_id, due = %due, "recurring check not yet due");
                    return false;
                }
                Some(due) => self
                    .inner
                    .validate_and_transition(Some(cadence::next_after(due, now))),
            }
        };

        self.finish(event);
        true
    }

    fn finish(&self, event: Result<AuthEvent, SellergateError>) -> AuthState {
        match event {
            Ok(event) => {
                if event.is_success() {
                    self.arm_schedule();
                }
                self.inner.events.emit(&event);
            }
            Err(e) => {
                warn!(product_id = %self.inner.product_id, error = %e, "validation attempt not recorded");
            }
        }
        self.state()
    }

    fn arm_schedule(&self) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }

        // Held through registration so on_deactivate cannot interleave
        let guard = validation_guard(&self.inner.product_id);
        let _lock = guard.lock();
        if !self.inner.active.load(Ordering::SeqCst)
            || self.inner.timer.is_scheduled(&self.inner.task_name)
        {
            return;
        }

        if let Some(mut record) = self.inner.load_or_warn() {
            if record.next_check_at.is_none() {
                record.next_check_at = Some(cadence::first_check_after(self.inner.clock.now_utc()));
                if let Err(e) = self.inner.store.save(&record) {
                    warn!(product_id = %self.inner.product_id, error = %e, "failed to store first due time");
                }
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let callback: TaskCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                SchedulerHandle { inner }.run_scheduled_check();
            }
        });
        self.inner
            .timer
            .schedule_recurring(&self.inner.task_name, POLL_INTERVAL, callback);

        info!(product_id = %self.inner.product_id, task = %self.inner.task_name, "recurring check armed");
    }

    /// Switch provider and re-validate against it before returning.
    ///
    /// # Errors
    /// `InvalidProvider` if `provider` is not allow-listed; the stored record
    /// is left untouched.
    pub fn switch_provider(&self, provider: &str) -> Result<AuthState, SellergateError> {
        let event = {
            let guard = validation_guard(&self.inner.product_id);
            let _lock = guard.lock();
            self.inner
                .registry
                .switch_provider(&self.inner.product_id, provider)?;
            self.inner.validate_and_transition(None)
        };
        Ok(self.finish(event))
    }

    /// Cancel the recurring check. Later ticks are ignored.
    pub fn on_deactivate(&self) {
        let guard = validation_guard(&self.inner.product_id);
        let _lock = guard.lock();
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.timer.cancel_recurring(&self.inner.task_name);

        if let Some(mut record) = self.inner.load_or_warn() {
            if record.next_check_at.take().is_some() {
                if let Err(e) = self.inner.store.save(&record) {
                    warn!(product_id = %self.inner.product_id, error = %e, "failed to clear due time");
                }
            }
        }

        info!(product_id = %self.inner.product_id, "recurring check cancelled");
    }

    /// Metadata URL for the host's update checker, on the current provider.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the provider endpoint is not an absolute URL.
    pub fn update_metadata_url(&self) -> Result<String, SellergateError> {
        let endpoint = self.inner.registry.resolve(&self.inner.product_id, None)?;
        let host = self.inner.host.read().clone();
        validator::update_metadata_url(&endpoint.endpoint, &self.inner.product_id, &host)
    }

    /// Cached entitlement verdict.
    pub fn is_entitled(&self) -> bool {
        self.inner.load_or_warn().is_some_and(|r| r.verified)
    }

    /// Last failure reason; empty when entitled.
    pub fn current_failure_message(&self) -> String {
        self.inner
            .load_or_warn()
            .map(|r| r.error_message)
            .unwrap_or_default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        self.inner
            .load_or_warn()
            .map(|r| r.state())
            .unwrap_or(AuthState::Unvalidated)
    }

    /// Snapshot of the stored record.
    pub fn record(&self) -> Result<Option<EntitlementRecord>, SellergateError> {
        self.inner.store.load(&self.inner.product_id)
    }

    /// Whether the host should show a warning banner.
    pub fn should_warn(&self) -> bool {
        self.inner
            .load_or_warn()
            .is_some_and(|r| Notifier::should_warn(&r))
    }

    /// Banner text, when a warning is due.
    pub fn warning_banner(&self) -> Option<String> {
        self.inner
            .load_or_warn()
            .and_then(|r| self.inner.notifier.banner(&r))
    }

    /// Display name and stored error, formatted for the host UI.
    pub fn render_message(&self) -> String {
        match self.inner.load_or_warn() {
            Some(record) => self.inner.notifier.render_message(&record),
            None => String::new(),
        }
    }

    /// Origin the host should allow cross-origin requests from.
    pub fn allowed_origin(&self) -> String {
        match self.inner.registry.resolve(&self.inner.product_id, None) {
            Ok(endpoint) => endpoint.origin,
            Err(e) => {
                warn!(product_id = %self.inner.product_id, error = %e, "failed to resolve origin");
                String::new()
            }
        }
    }

    /// Seller options for the host's selection UI.
    pub fn seller_choices(&self) -> Vec<SellerChoice> {
        self.inner
            .registry
            .seller_choices(&self.inner.product_id)
            .unwrap_or_else(|e| {
                warn!(product_id = %self.inner.product_id, error = %e, "failed to list sellers");
                Vec::new()
            })
    }

    /// Receive an event after every recorded validation attempt.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(Arc::new(listener));
    }

    /// Name the recurring check is registered under.
    pub fn task_name(&self) -> &str {
        &self.inner.task_name
    }

    /// Whether the recurring check is currently registered.
    pub fn is_scheduled(&self) -> bool {
        self.inner.timer.is_scheduled(&self.inner.task_name)
    }

    /// Product this handle manages.
    pub fn product_id(&self) -> &str {
        &self.inner.product_id
    }
}
