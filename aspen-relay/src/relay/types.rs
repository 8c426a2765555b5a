// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;

use crate::upstream::HttpError;

/// Capacity of the channel between the forwarding task and the downstream
/// body. Chunks are forwarded one by one as they arrive; the capacity only
/// bounds how far upstream may run ahead of a slow consumer.
pub const RELAY_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Terminal failures of one relay exchange. Each surfaces exactly once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Upstream answered with a non-success status. Not streamed.
    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("upstream returned success with no body")]
    UpstreamBodyMissing,

    /// I/O failure after streaming began.
    #[error("upstream read failed: {0}")]
    UpstreamRead(String),

    /// No response at all (connection refused, DNS, TLS).
    #[error("upstream request failed: {0}")]
    UpstreamTransport(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    /// The downstream consumer disconnected or stopped accepting chunks.
    #[error("downstream consumer disconnected")]
    DownstreamWrite,

    #[error("request payload could not be serialized: {0}")]
    RequestEncoding(String),
}

impl RelayError {
    /// Error raised while a request is being sent, before any response.
    pub(crate) fn from_send(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => RelayError::UpstreamTransport(msg),
            HttpError::Timeout(msg) => RelayError::UpstreamTimeout(msg),
        }
    }

    /// Error raised while reading a body that is already streaming.
    pub(crate) fn from_read(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => RelayError::UpstreamRead(msg),
            HttpError::Timeout(msg) => RelayError::UpstreamTimeout(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle of one relay exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Upstream response accepted, no chunk forwarded yet.
    Open,
    Streaming,
    /// Upstream ended cleanly; downstream closed.
    Closed,
    /// Ended by a terminal error; both handles released.
    Errored,
}

/// How a forwarding loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySummary {
    pub state: RelayState,
    pub chunks: usize,
    pub bytes: usize,
    pub error: Option<RelayError>,
}

impl RelaySummary {
    pub(crate) fn open() -> Self {
        Self {
            state: RelayState::Open,
            chunks: 0,
            bytes: 0,
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, error: RelayError) {
        self.state = RelayState::Errored;
        self.error = Some(error);
    }
}
