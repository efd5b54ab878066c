//! Scripted in-memory transport shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::{ApiError, HttpRequest, HttpResponse, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync>;

/// Records every request and answers with a closure. Refresh calls can be
/// held on a `Notify` so several callers pile up behind one refresh, and
/// the nth request to a path can be held so its answer lands late.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
    refresh_gate: Option<Arc<Notify>>,
    holds: Vec<(String, usize, Arc<Notify>)>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            refresh_gate: None,
            holds: Vec::new(),
        }
    }

    pub fn gate_refresh(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    /// Hold the `nth` (1-based) request whose path ends with `suffix` until
    /// `gate` is notified.
    pub fn hold_nth(mut self, suffix: &str, nth: usize, gate: Arc<Notify>) -> Self {
        self.holds.push((suffix.to_string(), nth, gate));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn sent_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    pub fn count(&self, suffix: &str) -> usize {
        self.sent_to(suffix).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let held: Vec<Arc<Notify>> = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            self.holds
                .iter()
                .filter(|(suffix, nth, _)| {
                    request.path.ends_with(suffix.as_str())
                        && requests.iter().filter(|r| r.path.ends_with(suffix.as_str())).count() == *nth
                })
                .map(|(_, _, gate)| gate.clone())
                .collect()
        };
        for gate in held {
            gate.notified().await;
        }
        if request.path.ends_with("/refresh-token") {
            if let Some(ref gate) = self.refresh_gate {
                gate.notified().await;
            }
        }
        (self.handler)(&request)
    }
}

pub(crate) fn respond(status: u16, body: Value) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::new(status, body.to_string()))
}
