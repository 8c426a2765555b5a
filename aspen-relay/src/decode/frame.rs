// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// Longest slice of a rejected line kept for diagnostics, in characters.
const PREVIEW_CHARS: usize = 120;

/// One decoded NDJSON record carrying a text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
}

impl Frame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A single line that was not valid JSON. Recoverable: the line is dropped
/// and decoding continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed NDJSON record ({reason}): {preview}")]
pub struct FrameParseError {
    /// Leading characters of the offending line.
    pub preview: String,
    pub reason: String,
}

/// Interpret one complete line.
///
/// - blank or whitespace-only: `Ok(None)`
/// - JSON with a string `text` field: `Ok(Some(frame))`
/// - any other JSON value: `Ok(None)`; other frame kinds are not ours to judge
/// - not JSON: `Err`
pub fn parse_record(line: &str) -> Result<Option<Frame>, FrameParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| FrameParseError {
        preview: trimmed.chars().take(PREVIEW_CHARS).collect(),
        reason: e.to_string(),
    })?;

    match value.get("text") {
        Some(Value::String(text)) => Ok(Some(Frame::new(text.as_str()))),
        _ => Ok(None),
    }
}
