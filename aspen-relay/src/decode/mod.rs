// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// NDJSON frame decoding
//
// Responsibilities:
// - Decode transport bytes to text incrementally (split characters held back)
// - Split on '\n'; hold the unterminated tail until more bytes or end of stream
// - Parse each complete line as JSON; keep objects with a string `text`
// - Blank lines skipped, other JSON shapes ignored, malformed lines logged
//   and dropped without aborting the stream

mod decoder;
mod frame;
mod utf8;

pub use decoder::{Flushed, FrameDecoder};
pub use frame::{parse_record, Frame, FrameParseError};
pub use utf8::Utf8StreamDecoder;
