//! Outbound HTTP to provider endpoints
//!
//! `HttpTransport` is the seam between the flow and the network: the flow
//! only ever issues a GET with query parameters (profile fetch) or a
//! form-encoded POST (token exchange) and reads back the status and body
//! text. `ReqwestTransport` is the production implementation; tests swap in
//! a recording stub.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Boxed future used by the dyn-compatible traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Upper bound on a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body text of a provider response.
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

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP client used to call provider endpoints.
///
/// Non-2xx responses are returned as `Ok`; only failures to get a response
/// at all (connect, timeout, body read) are errors. Uses `Pin<Box<dyn Future>>`
/// return types so the flow can hold an `Arc<dyn HttpTransport>`.
pub trait HttpTransport: Send + Sync {
    /// GET `url` with `query` appended to any query it already carries.
    fn get<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>>;

    /// POST `form` to `url` as `application/x-www-form-urlencoded`.
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>>;
}

/// Append form-encoded `params` to `base`, keeping any existing query.
///
/// Spaces encode as `+` and reserved characters are percent-escaped, so the
/// result parses back to exactly the pairs given.
pub fn with_query(base: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::InvalidEndpoint {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// `HttpTransport` over a shared `reqwest::Client` with a per-request
/// timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(endpoint, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(endpoint, e))?;

        debug!(endpoint, status, "provider responded");
        Ok(HttpResponse { status, body })
    }

    /// Strips the URL from reqwest's message: profile requests carry the
    /// access token in the query string.
    fn request_error(&self, endpoint: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            return Error::Transport(format!(
                "{endpoint} timed out after {}s",
                self.timeout.as_secs_f64()
            ));
        }
        Error::Transport(format!("{endpoint}: {}", e.without_url()))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_TIMEOUT)
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let full = with_query(url, query)?;
            debug!(endpoint = url, "GET provider endpoint");
            self.send(url, self.client.get(full)).await
        })
    }

    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let target = with_query(url, &[])?;
            debug!(endpoint = url, "POST provider endpoint");
            self.send(url, self.client.post(target).form(form)).await
        })
    }
}
