// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Upstream transport
//
// The one place that talks HTTP to another service. Both the relay (towards
// the agent backend) and the chat client (towards the relay) go through
// `HttpSender`, so tests can swap in scripted transports.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

/// An in-flight response body, yielded chunk by chunk as the transport
/// delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Deadline for the whole exchange, including reading the body.
    pub timeout_ms: Option<u64>,
}

impl HttpRequest {
    /// A `POST` carrying an already-serialized JSON body.
    pub fn post_json(url: impl Into<String>, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            method: Method::POST,
            url: url.into(),
            headers,
            body,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

pub struct HttpResponse {
    pub status: StatusCode,
    /// `None` when the exchange carries no body at all (e.g. 204).
    pub body: Option<ByteStream>,
}

impl HttpResponse {
    /// Drain the whole body into a string, replacing invalid UTF-8.
    ///
    /// Used only for error bodies, which are not streamed.
    pub async fn read_text(self) -> Result<String, HttpError> {
        let Some(mut body) = self.body else {
            return Ok(String::new());
        };
        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&collected).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

impl HttpError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Trait: HttpSender (dependency injection point)
// ---------------------------------------------------------------------------

/// Sends one HTTP request and hands back the response with its body still
/// streaming.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpSender {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let has_body = request.method != Method::HEAD;

        let mut req = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body);

        if let Some(timeout_ms) = request.timeout_ms {
            req = req.timeout(std::time::Duration::from_millis(timeout_ms));
        }

        let resp = req.send().await.map_err(HttpError::from_reqwest)?;

        let status = resp.status();
        let body = if has_body && status_permits_body(status) {
            let stream = resp.bytes_stream().map_err(HttpError::from_reqwest);
            Some(Box::pin(stream) as ByteStream)
        } else {
            None
        };

        Ok(HttpResponse { status, body })
    }
}

/// Statuses that by definition carry no content (RFC 9110 §6.4.1).
fn status_permits_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}
