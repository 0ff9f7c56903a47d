//! Reverse proxy for the documentation endpoints.
//!
//! Host applications call the proxy for every incoming request. Only the docs page and docs
//! JSON paths are forwarded to the documentation service; everything else goes to the next
//! handler untouched.

use crate::config::DocsConfig;
use crate::error::{Error, Result};
use crate::service::ServiceHandle;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;

/// Header telling the documentation service which registered application to render
pub const APP_PORT_HEADER: &str = "X-App-Port";

/// Body returned when the documentation service cannot be reached
pub const UNAVAILABLE_BODY: &str = "AtomicDocs unavailable";

/// Body returned when the documentation service sends more than the configured limit
pub const TOO_LARGE_BODY: &str = "AtomicDocs response too large";

/// What the host should do with a request.
#[derive(Debug)]
pub enum ProxyOutcome {
    /// Send this response instead of running the host's handlers
    Respond(Response<Vec<u8>>),
    /// Not a docs path; continue down the handler chain
    Next,
}

/// Forwards docs requests to the documentation service.
pub struct DocsProxy {
    service: Arc<ServiceHandle>,
    paths: Vec<String>,
    app_port: u16,
    max_body_bytes: usize,
}

impl DocsProxy {
    pub fn new(service: Arc<ServiceHandle>, docs: &DocsConfig, app_port: u16) -> Self {
        Self {
            service,
            paths: docs.paths().iter().map(|p| p.to_string()).collect(),
            app_port,
            max_body_bytes: docs.max_body_bytes,
        }
    }

    /// Whether `path` is one of the reserved docs paths. Matching is exact.
    pub fn intercepts(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Decides on a request path, forwarding it when it is a docs path.
    pub async fn handle(&self, path: &str) -> ProxyOutcome {
        if !self.intercepts(path) {
            return ProxyOutcome::Next;
        }
        ProxyOutcome::Respond(self.forward(path).await)
    }

    /// Middleware-style entry point: docs paths are answered here, other requests are passed
    /// to `next`.
    pub async fn call<B, F, Fut>(&self, request: Request<B>, next: F) -> Response<Vec<u8>>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Response<Vec<u8>>>,
    {
        let path = request.uri().path();
        if self.intercepts(path) {
            let path = path.to_string();
            return self.forward(&path).await;
        }
        next(request).await
    }

    /// Fetches `path` from the documentation service, relaying status, content type and body.
    ///
    /// Never fails: an unreachable service yields `503` and an oversized body yields `502`,
    /// both with a plain-text body.
    pub async fn forward(&self, path: &str) -> Response<Vec<u8>> {
        match self.fetch(path).await {
            Ok(response) => response,
            Err(Error::UpstreamTooLarge { limit }) => {
                warn!("AtomicDocs: {} exceeded {} bytes", path, limit);
                plain_response(StatusCode::BAD_GATEWAY, TOO_LARGE_BODY)
            }
            Err(e) => {
                warn!("AtomicDocs: Could not proxy {}: {}", path, e);
                plain_response(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_BODY)
            }
        }
    }

    async fn fetch(&self, path: &str) -> Result<Response<Vec<u8>>> {
        let url = format!("{}{}", self.service.base_url(), path);
        debug!("Proxying {} for app port {}", url, self.app_port);

        let mut upstream = self
            .service
            .http()
            .get(&url)
            .header(APP_PORT_HEADER, self.app_port.to_string())
            .send()
            .await?;

        let limit = self.max_body_bytes;
        if upstream.content_length().map_or(false, |len| len > limit as u64) {
            return Err(Error::UpstreamTooLarge { limit });
        }

        let status = upstream.status();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("text/html"));

        let mut body = Vec::new();
        while let Some(chunk) = upstream.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(Error::UpstreamTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let mut response = Response::new(body);
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        Ok(response)
    }
}

fn plain_response(status: StatusCode, body: &str) -> Response<Vec<u8>> {
    let mut response = Response::new(body.as_bytes().to_vec());
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
