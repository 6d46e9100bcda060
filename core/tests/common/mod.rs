//! Transports for driving commands without a network.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use vidshare_core::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

type Reply = Result<HttpResponse, TransportError>;

pub fn ok(body: Value) -> Reply {
    Ok(HttpResponse {
        status: 200,
        headers: Vec::new(),
        body: body.to_string(),
    })
}

pub fn status(status: u16, body: &str) -> Reply {
    Ok(HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    })
}

pub fn offline(message: &str) -> Reply {
    Err(TransportError::new(message))
}

/// Holds every request until the test answers it, so completion order is
/// under the test's control.
#[derive(Default)]
pub struct Scripted {
    calls: Mutex<Vec<HttpRequest>>,
    responders: Mutex<Vec<Option<oneshot::Sender<Reply>>>>,
}

impl Scripted {
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Yield until `n` requests have reached the transport.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..10_000 {
            if self.call_count() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} calls, saw {}", self.call_count());
    }

    /// Answer the `index`-th request (0-based, in arrival order).
    pub fn respond(&self, index: usize, reply: Reply) {
        let sender = self.responders.lock().unwrap()[index]
            .take()
            .expect("request already answered");
        // The execution may already be gone; that is fine.
        let _ = sender.send(reply);
    }
}

impl Transport for Scripted {
    async fn perform(&self, request: HttpRequest) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(request);
        self.responders.lock().unwrap().push(Some(tx));
        rx.await
            .unwrap_or_else(|_| Err(TransportError::new("responder dropped")))
    }
}

/// Answers immediately from a fixed `(method, url)` table; anything else is
/// a 404 with a message body.
#[derive(Default)]
pub struct Canned {
    routes: Mutex<HashMap<(HttpMethod, String), Reply>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl Canned {
    pub fn route(&self, method: HttpMethod, url: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, url.to_string()), reply);
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for Canned {
    async fn perform(&self, request: HttpRequest) -> Reply {
        let key = (request.method, request.url.clone());
        self.calls.lock().unwrap().push(request);
        self.routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| status(404, r#"{"message":"Not found"}"#))
    }
}
