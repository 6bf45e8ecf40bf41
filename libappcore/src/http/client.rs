//! `reqwest`-backed transport

use async_trait::async_trait;

use crate::error::{ConfigError, RequestError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, RequestResult};

const USER_AGENT: &str = concat!("appcore/", env!("CARGO_PKG_VERSION"));

/// Transport over a shared `reqwest::Client`
///
/// The client keeps a cookie store, so session cookies set by the server
/// are sent back on every later request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh cookie-carrying client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> RequestResult<HttpResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        if let Some(body) = &request.body {
            // Sets Content-Type: application/json
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Network(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
