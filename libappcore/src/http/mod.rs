//! Request execution and response classification
//!
//! Every call the runtime makes to the backend goes through an
//! [`HttpTransport`]. The transport's only job is to move bytes; it fails
//! solely when no response could be obtained. [`RequestExecutor`] sits on
//! top and turns non-success statuses into [`RequestError::Http`] with the
//! message `"<status>: <text>"`.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libappcore::http::{client::ReqwestTransport, Method, RequestExecutor};
//!
//! # async fn example() -> libappcore::Result<()> {
//! let executor = RequestExecutor::new(Arc::new(ReqwestTransport::new()?));
//! let response = executor
//!     .execute(Method::GET, "http://localhost:5001/api/user", None)
//!     .await?;
//! let user: serde_json::Value = response.json()?;
//! println!("{}", user);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RequestError;

pub mod client;

// Mock transport is available for all builds (not just tests) to support integration tests
pub mod mock;

pub use reqwest::Method;

/// Result of a request-layer operation
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Outgoing request as seen by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body; `None` means no body and no content-type header
    pub body: Option<Value>,
}

/// Response obtained from the server, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Parse the body as JSON
    ///
    /// An empty body decodes as JSON `null` so that bodyless success
    /// responses (e.g. 204) are usable as `Value`.
    pub fn json<T: DeserializeOwned>(&self) -> RequestResult<T> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

/// Moves a request to the server and returns whatever response comes back
///
/// Implementations must always send credentials (cookies) and must only
/// fail with [`RequestError::Network`]; status classification is the
/// executor's job.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> RequestResult<HttpResponse>;
}

/// Issues requests through a transport and classifies the outcome
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Send without status classification
    ///
    /// Only network failures are errors here; callers that need to inspect
    /// a specific status (such as 401) before classifying use this.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> RequestResult<HttpResponse> {
        tracing::debug!(%method, url, has_body = body.is_some(), "Sending request");

        let request = HttpRequest {
            method,
            url: url.to_string(),
            body,
        };
        let response = self.transport.send(request).await.map_err(|e| {
            tracing::debug!(url, error = %e, "Request failed before a response");
            e
        })?;

        tracing::debug!(url, status = response.status, "Received response");
        Ok(response)
    }

    /// Send and fail on any non-success status
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> RequestResult<HttpResponse> {
        let response = self.send(method, url, body).await?;
        ensure_success(response)
    }
}

/// Pass success responses through; turn others into [`RequestError::Http`]
///
/// The message text is the response body, or the status's standard reason
/// phrase when the body is empty.
pub fn ensure_success(response: HttpResponse) -> RequestResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let text = if response.body.is_empty() {
        reason_phrase(response.status).to_string()
    } else {
        response.body
    };

    Err(RequestError::Http {
        status: response.status,
        text,
    })
}

/// Standard reason phrase for `status`, `"Unknown"` for non-standard codes
pub fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use serde_json::json;

    const URL: &str = "http://localhost:5001/api/items";

    fn executor(transport: &MockTransport) -> RequestExecutor {
        RequestExecutor::new(Arc::new(transport.clone()))
    }

    #[test]
    fn test_ensure_success_passes_2xx() {
        let response = HttpResponse::new(204, "");
        assert_eq!(ensure_success(response.clone()).unwrap(), response);
    }

    #[test]
    fn test_ensure_success_uses_body_text() {
        let err = ensure_success(HttpResponse::new(500, "boom")).unwrap_err();
        assert_eq!(err.to_string(), "500: boom");
    }

    #[test]
    fn test_ensure_success_falls_back_to_reason_phrase() {
        let err = ensure_success(HttpResponse::new(404, "")).unwrap_err();
        assert_eq!(err.to_string(), "404: Not Found");

        let err = ensure_success(HttpResponse::new(401, "")).unwrap_err();
        assert_eq!(err.to_string(), "401: Unauthorized");
    }

    #[test]
    fn test_reason_phrase_unknown_status() {
        assert_eq!(reason_phrase(599), "Unknown");
        assert_eq!(reason_phrase(503), "Service Unavailable");
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::new(200, r#"{"id": 7}"#);
        let value: Value = response.json().unwrap();
        assert_eq!(value, json!({"id": 7}));

        let empty: Value = HttpResponse::new(204, "").json().unwrap();
        assert_eq!(empty, Value::Null);

        let bad = HttpResponse::new(200, "<html>").json::<Value>().unwrap_err();
        assert!(matches!(bad, RequestError::Decode(_)));
    }

    #[tokio::test]
    async fn test_execute_returns_success_as_is() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, URL, 200, r#"[1,2,3]"#);

        let response = executor(&transport)
            .execute(Method::GET, URL, None)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "[1,2,3]");
    }

    #[tokio::test]
    async fn test_execute_classifies_http_error() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, URL, 500, "boom");

        let err = executor(&transport)
            .execute(Method::GET, URL, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::Http {
                status: 500,
                text: "boom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_execute_propagates_network_error() {
        let transport = MockTransport::new();
        transport.fail(Method::GET, URL, "connection refused");

        let err = executor(&transport)
            .execute(Method::GET, URL, None)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Network("connection refused".to_string()));
    }

    #[tokio::test]
    async fn test_send_does_not_classify_status() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, URL, 401, "");

        let response = executor(&transport).send(Method::GET, URL, None).await.unwrap();
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn test_body_forwarded_to_transport() {
        let transport = MockTransport::new();
        transport.respond(Method::POST, URL, 201, "{}");

        executor(&transport)
            .execute(Method::POST, URL, Some(json!({"name": "widget"})))
            .await
            .unwrap();
        executor(&transport)
            .send(Method::POST, URL, None)
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, Some(json!({"name": "widget"})));
        assert_eq!(requests[1].body, None);
    }
}
