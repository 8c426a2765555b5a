// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Chat client
//
// Posts one user message to the relay endpoint and renders the streamed reply
// through a `MessageSink`. One send at a time per client: a send issued while
// another is in flight is refused without touching the sink.

use axum::http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::accumulator::Accumulator;
use crate::decode::FrameDecoder;
use crate::config::ClientConfig;
use crate::turn::{run_turn, MessageSink, TurnStats};
use crate::upstream::{HttpError, HttpRequest, HttpSender};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a message is already being sent")]
    Busy,

    #[error("HTTP error! status: {}", .0.as_u16())]
    Status(StatusCode),

    #[error("Response body is null")]
    MissingBody,

    #[error(transparent)]
    Transport(HttpError),

    #[error("response stream failed: {0}")]
    Stream(HttpError),

    #[error("no complete reply within {0} ms")]
    Timeout(u64),

    #[error("request could not be encoded: {0}")]
    Encoding(String),
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a turn ended. `message` holds whatever was received, even when
/// `error` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub message: String,
    pub frames: usize,
    pub parse_errors: usize,
    pub error: Option<ClientError>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Clears the in-flight flag however the send ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ChatClient {
    http: Arc<dyn HttpSender>,
    url: String,
    timeout_ms: Option<u64>,
    in_flight: AtomicBool,
}

impl ChatClient {
    pub fn new(http: Arc<dyn HttpSender>, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            timeout_ms: config.timeout_ms,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send `message` and stream the reply into `sink`.
    ///
    /// Blank messages and overlapping sends are refused with `Err` before
    /// anything is sent. Every other failure lands in `TurnOutcome::error`,
    /// after `sink.on_error` has seen it; `sink.on_finished` always fires.
    pub async fn send(
        &self,
        message: &str,
        sink: &mut dyn MessageSink,
    ) -> Result<TurnOutcome, ClientError> {
        if message.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        sink.on_started();
        let mut acc = Accumulator::new();
        let mut decoder = FrameDecoder::new();

        let result = match self.timeout_ms {
            Some(ms) => {
                let exchange = self.exchange(message, &mut decoder, &mut acc, &mut *sink);
                match tokio::time::timeout(Duration::from_millis(ms), exchange).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout(ms)),
                }
            }
            None => {
                self.exchange(message, &mut decoder, &mut acc, &mut *sink)
                    .await
            }
        };

        let (stats, error) = match result {
            Ok(stats) => (stats, None),
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "chat turn failed");
                sink.on_error(&err.to_string());
                let partial = TurnStats {
                    frames: acc.frames_applied(),
                    parse_errors: decoder.parse_errors().len(),
                };
                (partial, Some(err))
            }
        };
        sink.on_finished();

        Ok(TurnOutcome {
            message: acc.into_message(),
            frames: stats.frames,
            parse_errors: stats.parse_errors,
            error,
        })
    }

    async fn exchange(
        &self,
        message: &str,
        decoder: &mut FrameDecoder,
        acc: &mut Accumulator,
        sink: &mut dyn MessageSink,
    ) -> Result<TurnStats, ClientError> {
        let body = serde_json::to_vec(&ChatRequest { message })
            .map_err(|e| ClientError::Encoding(e.to_string()))?;
        let request = HttpRequest::post_json(self.url.clone(), body.into());

        let response = self
            .http
            .send(request)
            .await
            .map_err(ClientError::Transport)?;

        if !response.status.is_success() {
            return Err(ClientError::Status(response.status));
        }
        let body = response.body.ok_or(ClientError::MissingBody)?;

        run_turn(body, decoder, acc, sink)
            .await
            .map_err(ClientError::Stream)
    }
}
