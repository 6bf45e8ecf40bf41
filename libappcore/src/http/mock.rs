//! Mock transport for testing
//!
//! Serves canned responses keyed by method and URL, records every request
//! it sees, and can simulate latency or network failures. Used by the unit
//! and integration tests to drive the executor and query client without a
//! server.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::RequestError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method, RequestResult};

#[derive(Debug, Clone)]
enum MockReply {
    Response(HttpResponse),
    NetworkFailure(String),
}

type RouteTable = HashMap<(Method, String), VecDeque<MockReply>>;

/// Transport answering from a route table
///
/// Replies queued for a route are consumed in order; the last one keeps
/// being served. Clones share the same routes and request log.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<RouteTable>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply (simulates network latency)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a response for `method url`
    pub fn respond(&self, method: Method, url: &str, status: u16, body: &str) {
        self.push(method, url, MockReply::Response(HttpResponse::new(status, body)));
    }

    /// Queue a JSON response for `method url`
    pub fn respond_json(&self, method: Method, url: &str, status: u16, body: &serde_json::Value) {
        self.respond(method, url, status, &body.to_string());
    }

    /// Queue a network failure for `method url`
    pub fn fail(&self, method: Method, url: &str, error: &str) {
        self.push(method, url, MockReply::NetworkFailure(error.to_string()));
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of requests received for `method url`
    pub fn calls_to(&self, method: &Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }

    fn push(&self, method: Method, url: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    fn next_reply(&self, method: &Method, url: &str) -> Option<MockReply> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = routes.get_mut(&(method.clone(), url.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> RequestResult<HttpResponse> {
        let reply = self.next_reply(&request.method, &request.url);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::NetworkFailure(error)) => Err(RequestError::Network(error)),
            None => Err(RequestError::Network(format!(
                "No mock route for {} {}",
                request.method, request.url
            ))),
        }
    }
}
