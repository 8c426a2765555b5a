// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Consumer pipeline for one conversation turn
//
// Bytes in, full-text notifications out: every chunk goes through the frame
// decoder, every frame into the accumulator, and the sink is told the whole
// message after each frame. End of stream flushes the decoder's tail. A
// stream error stops the turn where it is; the decoder is left unflushed,
// still holding its parse failures, and the accumulated text stays as it was.

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};

use crate::accumulator::Accumulator;
use crate::decode::FrameDecoder;

/// Whoever renders a turn's progress.
///
/// `on_message` always receives the full text so far; render it by replacing
/// what was shown before.
pub trait MessageSink: Send {
    fn on_started(&mut self) {}

    fn on_message(&mut self, full_text: &str);

    /// Called at most once per turn.
    fn on_error(&mut self, message: &str);

    /// Called exactly once per turn, after success or failure.
    fn on_finished(&mut self) {}
}

/// Counters for a turn that ran to the end of its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnStats {
    pub frames: usize,
    pub parse_errors: usize,
}

/// Feed `body` through `decoder` into `acc`, notifying `sink` after every
/// applied frame.
///
/// `decoder` must be fresh; it is flushed and replaced by an empty one when
/// the stream ends. `acc` is reset before the first byte is looked at. On
/// error, or if the returned future is dropped, the text applied so far stays
/// in `acc` and the parse failures seen so far stay in `decoder`.
pub async fn run_turn<S, E>(
    mut body: S,
    decoder: &mut FrameDecoder,
    acc: &mut Accumulator,
    sink: &mut dyn MessageSink,
) -> Result<TurnStats, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    acc.reset();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in decoder.decode(&chunk) {
            acc.apply(&frame);
            sink.on_message(acc.current());
        }
    }

    let flushed = std::mem::take(decoder).flush();
    for frame in &flushed.frames {
        acc.apply(frame);
        sink.on_message(acc.current());
    }

    Ok(TurnStats {
        frames: acc.frames_applied(),
        parse_errors: flushed.parse_errors.len(),
    })
}
