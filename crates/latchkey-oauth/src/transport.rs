//! HTTP transport collaborator.

use std::borrow::Cow;
use std::time::Duration;

use tracing::debug;
use ureq::{Agent, RequestBuilder};

use crate::error::TransportError;
use crate::signer::SignedRequest;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Status code and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Sends one HTTP request. Implemented by the host.
///
/// Non-2xx statuses are responses, not errors; only failures to obtain a
/// response at all are [`TransportError`]s. Retries and timeouts belong here.
pub trait Transport: Send + Sync {
    /// Send a request and return its status and body.
    fn send(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError>;
}

/// Send a signed request through a transport.
pub fn send_signed(
    transport: &dyn Transport,
    request: &SignedRequest,
) -> Result<HttpResponse, TransportError> {
    transport.send(&request.method, &request.url, &request.headers, &request.body)
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Create a transport with a global per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT))
    }
}

impl Transport for UreqTransport {
    fn send(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        debug!(method = %method, url = %url, "Sending HTTP request");

        let response = match method {
            "GET" => with_headers(self.agent.get(url), headers).call()?,
            "DELETE" => with_headers(self.agent.delete(url), headers).call()?,
            "HEAD" => with_headers(self.agent.head(url), headers).call()?,
            "POST" => with_headers(self.agent.post(url), headers).send(body)?,
            "PUT" => with_headers(self.agent.put(url), headers).send(body)?,
            "PATCH" => with_headers(self.agent.patch(url), headers).send(body)?,
            other => return Err(TransportError::UnsupportedMethod(other.to_owned())),
        };

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();
        let body = body_reader.read_to_vec()?;

        debug!(status, bytes = body.len(), "Received HTTP response");
        Ok(HttpResponse { status, body })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
