// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use crate::decode::Frame;

/// The growing reply for one conversation turn.
///
/// Consumers render `current()` as a single unit after each `apply`,
/// replacing what they showed before.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Accumulator {
    message: String,
    frames: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn.
    pub fn reset(&mut self) {
        self.message.clear();
        self.frames = 0;
    }

    pub fn apply(&mut self, frame: &Frame) {
        self.message.push_str(&frame.text);
        self.frames += 1;
    }

    pub fn current(&self) -> &str {
        &self.message
    }

    /// Frames applied since the last reset.
    pub fn frames_applied(&self) -> usize {
        self.frames
    }

    pub fn into_message(self) -> String {
        self.message
    }
}
