// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Incremental UTF-8 decoding
//
// Transport chunks carry no character boundaries. A multi-byte sequence cut
// by a chunk boundary is held back until the rest arrives, so each byte is
// decoded exactly once. Invalid sequences decode to U+FFFD and decoding
// continues.

/// Stateful byte-to-text decoder for one stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Leading bytes of a character whose tail has not arrived yet (< 4).
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, input: &[u8]) -> String {
        let joined: Vec<u8>;
        let mut bytes: &[u8] = if self.pending.is_empty() {
            input
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(input);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(bytes.len());
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[bad..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes.
                            self.pending.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// True while a partial character is held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// End of stream. A dangling partial character becomes one U+FFFD.
    pub fn finish(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER)
    }
}
