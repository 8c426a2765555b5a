// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Stream relay
//
// Responsibilities:
// - POST the request body unmodified to the agent backend
// - Fail fast on non-success: read the whole error body, never stream it
// - Success without a body is its own error, raised before any stream opens
// - Forward each upstream chunk verbatim, in order, as soon as it arrives
// - Upstream end closes the downstream stream; upstream failure is delivered
//   on the downstream error channel, then both sides are released
// - A downstream disconnect releases the upstream connection

mod forwarder;
mod types;

pub use types::{RelayError, RelayState, RelaySummary, RELAY_CHANNEL_CAPACITY};

use bytes::Bytes;
use futures_util::stream::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::upstream::{HttpRequest, HttpSender};

/// Issues upstream requests and turns successful responses into
/// [`RelayStream`]s. One instance serves many requests; every call gets its
/// own forwarding task and channel.
pub struct StreamRelay {
    http: Arc<dyn HttpSender>,
    upstream: UpstreamConfig,
}

impl StreamRelay {
    pub fn new(http: Arc<dyn HttpSender>, upstream: UpstreamConfig) -> Self {
        Self { http, upstream }
    }

    /// Serialize `payload` as JSON and relay it.
    pub async fn relay_json<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<RelayStream, RelayError> {
        let body =
            serde_json::to_vec(payload).map_err(|e| RelayError::RequestEncoding(e.to_string()))?;
        self.relay(Bytes::from(body)).await
    }

    /// Relay an already-serialized JSON body.
    pub async fn relay(&self, body: Bytes) -> Result<RelayStream, RelayError> {
        let request_id = Uuid::new_v4().to_string();
        let request = HttpRequest::post_json(self.upstream.url.clone(), body)
            .with_timeout(self.upstream.timeout_ms);

        let response = self.http.send(request).await.map_err(|e| {
            let err = RelayError::from_send(e);
            tracing::error!(
                request_id = %request_id,
                upstream = %self.upstream.url,
                error = %err,
                "upstream request failed"
            );
            err
        })?;

        let status = response.status;
        if !status.is_success() {
            let body = match response.read_text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        error = %e,
                        "could not read upstream error body"
                    );
                    String::new()
                }
            };
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                "upstream returned non-success status; not streaming"
            );
            return Err(RelayError::UpstreamStatus { status, body });
        }

        let Some(upstream) = response.body else {
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                "upstream returned success with no body"
            );
            return Err(RelayError::UpstreamBodyMissing);
        };

        tracing::info!(
            request_id = %request_id,
            status = status.as_u16(),
            "relay streaming"
        );

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(RelayState::Open);
        let task = tokio::spawn(forwarder::forward(
            upstream,
            tx,
            state_tx,
            request_id.clone(),
        ));

        Ok(RelayStream {
            inner: ReceiverStream::new(rx),
            task,
            state: state_rx,
            request_id,
        })
    }
}

/// The downstream side of one relay exchange: upstream chunks, verbatim, in
/// arrival order, ending with at most one error.
///
/// Dropping it is how a consumer cancels; the forwarding task notices and
/// releases the upstream connection.
pub struct RelayStream {
    inner: ReceiverStream<Result<Bytes, RelayError>>,
    task: JoinHandle<RelaySummary>,
    state: watch::Receiver<RelayState>,
    request_id: String,
}

impl RelayStream {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Where the exchange is now. `Open` until the first chunk is forwarded.
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Stop receiving and wait for the forwarding task to wind down.
    ///
    /// Call after the stream has been drained to learn how it ended. `None`
    /// when the forwarding task did not finish normally.
    pub async fn summary(self) -> Option<RelaySummary> {
        drop(self.inner);
        match self.task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(
                    request_id = %self.request_id,
                    error = %e,
                    "relay forwarding task failed"
                );
                None
            }
        }
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests;
