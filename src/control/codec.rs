//! NDJSON framing for the coordinator control channel.
//!
//! Splits the inbound byte stream on `\n` with a maximum line length so a
//! runaway coordinator cannot make the worker buffer an unbounded line.
//! Oversized and non-UTF-8 lines are decoded as [`ControlLine`] variants
//! rather than errors, so the stream keeps flowing and the reader can answer
//! them. Only I/O failures end the stream.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One framed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLine {
    /// A UTF-8 line with the trailing `\r`, if any, removed.
    Text(String),
    /// A line with invalid UTF-8, decoded lossily.
    InvalidUtf8(String),
    /// A line longer than [`MAX_LINE_BYTES`]; its bytes are discarded.
    TooLong,
}

/// Line decoder for the control channel.
#[derive(Debug)]
pub struct ControlCodec(AnyDelimiterCodec);

impl ControlCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            vec![b'\n'],
            vec![b'\n'],
            MAX_LINE_BYTES,
        ))
    }
}

impl Default for ControlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ControlCodec {
    type Item = ControlLine;
    type Error = AppError;

    /// Returns `Ok(None)` while no complete line is buffered.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        frame(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        frame(self.0.decode_eof(src))
    }
}

fn into_line(chunk: &[u8]) -> ControlLine {
    let raw = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    match std::str::from_utf8(raw) {
        Ok(text) => ControlLine::Text(text.to_owned()),
        Err(_) => ControlLine::InvalidUtf8(String::from_utf8_lossy(raw).into_owned()),
    }
}

fn frame(
    decoded: std::result::Result<Option<Bytes>, AnyDelimiterCodecError>,
) -> Result<Option<ControlLine>> {
    match decoded {
        Ok(chunk) => Ok(chunk.as_deref().map(into_line)),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(ControlLine::TooLong)),
        Err(AnyDelimiterCodecError::Io(io_err)) => Err(AppError::Io(io_err.to_string())),
    }
}
