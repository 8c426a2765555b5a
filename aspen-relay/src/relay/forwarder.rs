// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Forwarding loop
//
// Reads upstream chunks one at a time and hands each to the downstream
// channel as soon as it arrives. Owns the upstream body for its whole life;
// returning from `forward` drops both the body and the sender, which is what
// closes the two connections, on every exit path.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};

use super::types::{RelayError, RelayState, RelaySummary};
use crate::upstream::{ByteStream, HttpError};

enum Step {
    Upstream(Option<Result<Bytes, HttpError>>),
    DownstreamClosed,
}

pub(crate) async fn forward(
    mut upstream: ByteStream,
    tx: mpsc::Sender<Result<Bytes, RelayError>>,
    state: watch::Sender<RelayState>,
    request_id: String,
) -> RelaySummary {
    let mut summary = RelaySummary::open();

    loop {
        // Watching `closed()` while waiting lets a disconnect release the
        // upstream connection even when upstream is idle.
        let step = tokio::select! {
            biased;
            _ = tx.closed() => Step::DownstreamClosed,
            item = upstream.next() => Step::Upstream(item),
        };

        match step {
            Step::Upstream(Some(Ok(chunk))) => {
                if chunk.is_empty() {
                    continue;
                }
                if summary.state == RelayState::Open {
                    summary.state = RelayState::Streaming;
                    state.send_replace(RelayState::Streaming);
                }
                summary.chunks += 1;
                summary.bytes += chunk.len();
                tracing::debug!(
                    request_id = %request_id,
                    size = chunk.len(),
                    "forwarding chunk"
                );
                if tx.send(Ok(chunk)).await.is_err() {
                    tracing::warn!(request_id = %request_id, "downstream rejected chunk");
                    summary.fail(RelayError::DownstreamWrite);
                    break;
                }
            }
            Step::Upstream(Some(Err(e))) => {
                let err = RelayError::from_read(e);
                tracing::error!(
                    request_id = %request_id,
                    error = %err,
                    chunks = summary.chunks,
                    "upstream stream failed"
                );
                // Best effort: the consumer may already be gone.
                let _ = tx.send(Err(err.clone())).await;
                summary.fail(err);
                break;
            }
            Step::Upstream(None) => {
                summary.state = RelayState::Closed;
                tracing::info!(
                    request_id = %request_id,
                    chunks = summary.chunks,
                    bytes = summary.bytes,
                    "relay stream finished"
                );
                break;
            }
            Step::DownstreamClosed => {
                tracing::warn!(
                    request_id = %request_id,
                    chunks = summary.chunks,
                    "downstream disconnected; releasing upstream"
                );
                summary.fail(RelayError::DownstreamWrite);
                break;
            }
        }
    }

    // Published before `tx` drops, so a drained consumer sees the final state.
    state.send_replace(summary.state);
    drop(upstream);
    summary
}
