// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use super::frame::{parse_record, Frame, FrameParseError};
use super::utf8::Utf8StreamDecoder;

/// Reassembles NDJSON frames from arbitrarily chunked bytes.
///
/// One decoder per stream. Its buffer always holds exactly the decoded text
/// after the last newline seen so far; everything before that newline has
/// already been turned into frames (or dropped).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8StreamDecoder,
    buffer: String,
    parse_errors: Vec<FrameParseError>,
}

/// What remains once the stream has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    /// Frames recovered from the unterminated tail (at most one).
    pub frames: Vec<Frame>,
    /// Every parse failure seen over the stream's lifetime.
    pub parse_errors: Vec<FrameParseError>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the frames it completed, in order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let text = self.utf8.decode(chunk);
        let has_newline = text.contains('\n');
        self.buffer.push_str(&text);
        if !has_newline {
            return Vec::new();
        }

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        let mut frames = Vec::new();
        for line in complete[..last_newline].split('\n') {
            self.resolve(line, &mut frames);
        }
        frames
    }

    /// End of stream: resolve the unterminated tail, if any.
    ///
    /// Consumes the decoder, so nothing can be fed to it afterwards.
    pub fn flush(mut self) -> Flushed {
        if let Some(replacement) = self.utf8.finish() {
            tracing::warn!("stream ended inside a multi-byte character");
            self.buffer.push(replacement);
        }

        let tail = std::mem::take(&mut self.buffer);
        let mut frames = Vec::new();
        self.resolve(&tail, &mut frames);

        Flushed {
            frames,
            parse_errors: self.parse_errors,
        }
    }

    /// Parse failures recorded so far.
    pub fn parse_errors(&self) -> &[FrameParseError] {
        &self.parse_errors
    }

    /// Decoded text still waiting for its newline.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn resolve(&mut self, line: &str, frames: &mut Vec<Frame>) {
        match parse_record(line) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    preview = %e.preview,
                    reason = %e.reason,
                    "skipping malformed NDJSON line"
                );
                self.parse_errors.push(e);
            }
        }
    }
}
