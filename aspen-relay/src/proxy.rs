// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface
//
// Responsibilities:
// - Relay route: validate the JSON body, relay it upstream, stream the
//   upstream bytes back untouched as application/x-ndjson
// - Upstream failures before streaming become ordinary error responses
// - A failure mid-stream aborts the response body
// - Health endpoint

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::relay::{RelayError, StreamRelay};

/// Content type of every successful relay response.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// The relay only ever listens on loopback.
pub const BIND_HOST: [u8; 4] = [127, 0, 0, 1];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything the relay route can answer with instead of a stream.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("failed to read request body: {0}")]
    UnreadableBody(String),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::EmptyBody => {
                (StatusCode::BAD_REQUEST, "request body is empty").into_response()
            }
            ProxyError::MalformedJson(_) => {
                (StatusCode::BAD_REQUEST, "request body is not valid JSON").into_response()
            }
            ProxyError::UnreadableBody(e) => (
                StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
            )
                .into_response(),
            ProxyError::Relay(e) => e.into_response(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::UpstreamStatus { status, body } => {
                (status, format!("Backend Error: {body}")).into_response()
            }
            RelayError::UpstreamBodyMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Backend response body is null",
            )
                .into_response(),
            err @ (RelayError::UpstreamTransport(_) | RelayError::UpstreamRead(_)) => {
                (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
            }
            err @ RelayError::UpstreamTimeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, err.to_string()).into_response()
            }
            RelayError::DownstreamWrite | RelayError::RequestEncoding(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "relay failed").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<StreamRelay>,
    pub max_request_bytes: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health -> 200 {"status":"ok"}
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST <route>: relay the body upstream and stream the reply back.
pub async fn relay_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let body = axum::body::to_bytes(request.into_body(), state.max_request_bytes)
        .await
        .map_err(|e| ProxyError::UnreadableBody(e.to_string()))?;

    if body.is_empty() {
        return Err(ProxyError::EmptyBody);
    }
    if let Err(e) = serde_json::from_slice::<serde_json::Value>(&body) {
        return Err(ProxyError::MalformedJson(e.to_string()));
    }

    let stream = state.relay.relay(body).await?;
    tracing::debug!(request_id = %stream.request_id(), "streaming relay response");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the router: the relay route from `server`, plus `/health`.
pub fn build_router(relay: Arc<StreamRelay>, server: &ServerConfig) -> Router {
    let state = AppState {
        relay,
        max_request_bytes: server.max_request_bytes,
    };

    Router::new()
        .route("/health", get(health))
        .route(&server.route, post(relay_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
