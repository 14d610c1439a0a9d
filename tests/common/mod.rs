//! Shared test helpers for lifecycle tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use sellergate::{
    AuthEvent, Collaborators, HttpResponse, HttpTransport, ManualTaskScheduler, MemoryStore,
    MockClock, ProductConfig, RequestContext, SchedulerHandle, SellergateError,
};
use std::collections::VecDeque;
use std::sync::Arc;

/// One request seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub url: String,
    pub referer: Option<String>,
    pub body: serde_json::Value,
}

/// Transport replaying scripted replies in order.
///
/// Once the script runs out every call gets a `{"result":"success"}` reply.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, SellergateError>>>,
    sent: Mutex<Vec<SentRequest>>,
    served: Mutex<Vec<String>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, status: u16, body: &str) {
        self.replies.lock().push_back(Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.replies
            .lock()
            .push_back(Err(SellergateError::Transport(message.to_string())));
    }

    pub fn slow_down(&self, by: std::time::Duration) {
        *self.delay.lock() = Some(by);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Bodies of the replies handed out, in the order they were served.
    pub fn served(&self) -> Vec<String> {
        self.served.lock().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, SellergateError> {
        self.sent.lock().push(SentRequest {
            url: url.to_string(),
            referer: headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("referer"))
                .map(|(_, value)| value.to_string()),
            body: serde_json::from_slice(body).unwrap(),
        });

        let reply = self.replies.lock().pop_front().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 200,
                body: success_body().into_bytes(),
            })
        });
        if let Ok(response) = &reply {
            self.served
                .lock()
                .push(String::from_utf8_lossy(&response.body).into_owned());
        }

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        reply
    }
}

pub fn success_body() -> String {
    r#"{"result":"success"}"#.to_string()
}

pub fn error_body(message: &str, usage_terms: Option<&str>) -> String {
    let mut body = serde_json::json!({ "result": "error", "error": { "message": message } });
    if let Some(terms) = usage_terms {
        body["licensedItemMeta"] = serde_json::json!({ "usageTermsCategory": terms });
    }
    body.to_string()
}

/// Collects emitted event names.
pub fn record_events(handle: &SchedulerHandle) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    handle.subscribe(move |event: &AuthEvent| sink.lock().push(event.name()));
    events
}

/// Everything a lifecycle test drives.
pub struct Fixture {
    pub transport: Arc<ScriptedTransport>,
    pub timer: Arc<ManualTaskScheduler>,
    pub clock: Arc<MockClock>,
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ScriptedTransport::new()),
            timer: Arc::new(ManualTaskScheduler::new()),
            clock: Arc::new(MockClock::from_rfc3339("2025-03-10T12:00:00Z")),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.store.clone(),
            self.transport.clone(),
            self.timer.clone(),
        )
        .with_clock(self.clock.clone())
    }

    pub fn config(product_id: &str) -> ProductConfig {
        ProductConfig::new(product_id, "1.4.2", "Widget Pro").with_sellers(["aivec", "welcart"], "aivec")
    }

    pub fn start(&self, product_id: &str) -> SchedulerHandle {
        SchedulerHandle::initialize(
            Self::config(product_id),
            self.collaborators(),
            &RequestContext::new("shop.example.com"),
        )
        .unwrap()
    }
}
