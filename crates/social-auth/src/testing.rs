//! Recording transport stub shared by the unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{BoxFuture, HttpResponse, HttpTransport};

/// One outbound call as seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned responses keyed by URL; every call is recorded, including calls
/// to URLs with no canned response (those fail with a transport error).
#[derive(Default)]
pub struct StubTransport {
    routes: HashMap<String, (Duration, HttpResponse)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: HttpResponse) -> Self {
        self.respond_after(url, Duration::ZERO, response)
    }

    pub fn respond_after(mut self, url: &str, delay: Duration, response: HttpResponse) -> Self {
        self.routes.insert(url.to_string(), (delay, response));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.url == url).count()
    }

    fn handle<'a>(
        &'a self,
        method: &'static str,
        url: &'a str,
        params: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        let route = self.routes.get(url).cloned();
        Box::pin(async move {
            let (delay, response) =
                route.ok_or_else(|| Error::Transport(format!("no stub for {url}")))?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(response)
        })
    }
}

impl HttpTransport for StubTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        self.handle("GET", url, query)
    }

    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        self.handle("POST", url, form)
    }
}
