//! Newline-delimited JSON framing.
//!
//! Ollama streams its responses as one JSON object per line, but the
//! network hands us arbitrary byte chunks: a chunk may end mid-line or even
//! in the middle of a multi-byte UTF-8 character. `FrameDecoder` turns those
//! chunks back into whole records.
//!
//! ```text
//! bytes ──> utf-8 (carry partial char) ──> buffer ──split '\n'──> lines ──> JSON
//!                                            ^                      |
//!                                            └── incomplete tail ───┘
//! ```
//!
//! A line that is not valid JSON is logged and skipped; it never aborts the
//! stream. Whatever is left in the buffer when the stream ends is dropped.

use futures_util::{pin_mut, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Incremental decoder for one response body.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded text not yet terminated by a newline.
    buffer: String,
    /// Leading bytes of a UTF-8 sequence cut off at a chunk boundary.
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.decode_utf8(chunk);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        let mut records = Vec::new();
        for line in complete.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(error = %err, line = %line, "Skipping unparseable stream line"),
            }
        }
        records
    }

    /// Text held back because no newline has terminated it yet.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        // A genuinely invalid sequence: substitute and go on.
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        // Truncated sequence at the end of the chunk.
                        None => {
                            self.pending = rest[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Drive a byte stream through a `FrameDecoder`, handing each record to
/// `on_record` in order.
///
/// Stops at the first transport error or the first error returned by
/// `on_record`. Malformed lines are skipped inside the decoder.
pub async fn decode_stream<S, B, E, F>(stream: S, mut on_record: F) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
    F: FnMut(Value) -> Result<()>,
{
    pin_mut!(stream);
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::<Error>::into)?;
        for record in decoder.push(chunk.as_ref()) {
            on_record(record)?;
        }
    }

    if !decoder.remainder().trim().is_empty() {
        debug!(
            remainder = %decoder.remainder(),
            "Discarding incomplete trailing line"
        );
    }
    Ok(())
}
