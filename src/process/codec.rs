//! Line codec for probe tool output.
//!
//! Splits the merged output pipe on `\n`, strips a trailing `\r`, and decodes
//! each line lossily so a stray non-UTF-8 byte from the target never ends the
//! session. A trailing line without a newline is delivered at EOF.
//!
//! Lines longer than [`MAX_LINE_BYTES`] are dropped with a warning; decoding
//! resumes after the next newline. The decoder never fails on content, since
//! `FramedRead` ends the stream after a decoder error.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited, lossily decoded log lines.
#[derive(Debug)]
pub struct LogLineCodec {
    max_length: usize,
    /// Offset up to which `src` is known to contain no newline.
    next_index: usize,
    /// Inside an over-long line; drop bytes until the next newline.
    discarding: bool,
    /// Over-long lines dropped so far, reported in each warning.
    dropped_lines: u64,
}

impl LogLineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line length limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            dropped_lines: 0,
        }
    }
}

impl Default for LogLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LogLineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if self.discarding {
                let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                    src.clear();
                    return Ok(None);
                };
                src.advance(pos + 1);
                self.discarding = false;
            }

            let read_to = src.len().min(self.max_length.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match newline {
                Some(offset) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    return Ok(Some(decode_line(&line[..end])));
                }
                None if src.len() > self.max_length => {
                    self.dropped_lines += 1;
                    warn!(
                        limit = self.max_length,
                        dropped = self.dropped_lines,
                        "dropping over-long log line"
                    );
                    self.discarding = true;
                    self.next_index = 0;
                }
                None => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }

        let rest = src.split_to(src.len());
        Ok(Some(decode_line(&rest)))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
