//! HTTP transport abstraction.
//!
//! The client only ever issues authenticated `GET`s, so the seam is a single
//! method. [`ReqwestTransport`] talks to a real server; [`StaticTransport`]
//! serves canned bodies for tests and offline runs.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Url};

use crate::ClientError;

/// A received response: status code plus the raw body text.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues `GET` requests against the monitoring server.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Fetch `url`. Non-success statuses are returned, not turned into errors;
    /// only failures to get any response at all are errors here.
    async fn get(&self, url: &Url) -> Result<HttpResponse, ClientError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connection(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ClientError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Serves canned responses chosen by URL substring.
///
/// Routes are tried in insertion order; the first whose pattern appears in
/// the request URL answers. Unrouted requests get a 404. Every requested URL
/// is recorded.
///
/// ```rust
/// use prtgwatch_client::transport::{StaticTransport, Transport};
///
/// # tokio_test_block_on(async {
/// let transport = StaticTransport::new()
///     .route("content=groups", r#"{"groups": [{"objid": 1, "group": "Root"}]}"#);
///
/// let url = "http://prtg.local/api/table.json?content=groups".parse().unwrap();
/// let response = transport.get(&url).await.unwrap();
/// assert_eq!(response.status, 200);
/// assert_eq!(transport.requests().len(), 1);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    routes: Arc<Mutex<Vec<(String, Result<HttpResponse, ClientError>)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer URLs containing `pattern` with a 200 and `body`.
    pub fn route(self, pattern: impl Into<String>, body: impl Into<String>) -> Self {
        self.respond(pattern, Ok(HttpResponse::ok(body)))
    }

    /// Answer URLs containing `pattern` with a specific status.
    pub fn route_status(
        self,
        pattern: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.respond(
            pattern,
            Ok(HttpResponse {
                status,
                body: body.into(),
            }),
        )
    }

    /// Fail URLs containing `pattern` with `error`.
    pub fn route_error(self, pattern: impl Into<String>, error: ClientError) -> Self {
        self.respond(pattern, Err(error))
    }

    fn respond(self, pattern: impl Into<String>, response: Result<HttpResponse, ClientError>) -> Self {
        self.routes.lock().push((pattern.into(), response));
        self
    }

    /// URLs requested so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Requested URLs containing `pattern`.
    pub fn requests_matching(&self, pattern: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|u| u.contains(pattern))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, ClientError> {
        let url = url.as_str().to_string();
        self.requests.lock().push(url.clone());

        let routes = self.routes.lock();
        routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 404,
                    body: format!("no route for {url}"),
                })
            })
    }
}
