//! Line codec
//!
//! Frames a TCP byte stream into newline-terminated UTF-8 lines. A trailing
//! `\r` is stripped so both `\n` and `\r\n` terminated clients are accepted.
//! Outgoing lines are written with a single `\n`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::DEFAULT_MAX_LINE_LENGTH;

/// Codec error: oversized line, invalid UTF-8, or an I/O error
#[derive(Debug)]
pub enum CodecError {
    /// Line exceeds the configured maximum length
    LineTooLong(usize),
    /// Line is not valid UTF-8
    InvalidUtf8,
    /// Underlying I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::LineTooLong(max) => write!(f, "line exceeds maximum length ({} bytes)", max),
            CodecError::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
            CodecError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::Io(e)
    }
}

/// Newline-delimited text codec
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
}

impl LineCodec {
    /// Create a codec with the default maximum line length
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that rejects lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Maximum line length in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                if pos > self.max_length + 1 {
                    return Err(CodecError::LineTooLong(self.max_length));
                }

                let mut line = src.split_to(pos);
                src.advance(1);

                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                if line.len() > self.max_length {
                    return Err(CodecError::LineTooLong(self.max_length));
                }

                let text = std::str::from_utf8(&line).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Some(text.to_string()))
            }
            None => {
                // Allow room for a trailing \r before the terminator arrives
                if src.len() > self.max_length + 1 {
                    return Err(CodecError::LineTooLong(self.max_length));
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                // Peer closed without a final newline; deliver what we have
                let mut rest = src.split();
                if rest.last() == Some(&b'\r') {
                    rest.truncate(rest.len() - 1);
                }
                if rest.len() > self.max_length {
                    return Err(CodecError::LineTooLong(self.max_length));
                }

                let text = std::str::from_utf8(&rest).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Some(text.to_string()))
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
