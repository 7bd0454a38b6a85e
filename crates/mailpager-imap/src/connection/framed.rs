//! Line and literal framing over an async byte stream.
//!
//! A server response is a CRLF-terminated line, unless that line ends with a
//! `{n}` literal marker, in which case `n` raw bytes and a further line
//! follow. [`FramedStream::read_response`] returns whole responses so the
//! parser never sees a partial literal.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::types::Tag;
use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Longest line accepted outside of literals.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted; bounds memory spent on a single message.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Framed connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response, including embedded literals.
    pub async fn read_response(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();

        loop {
            let line_start = response.len();
            self.read_line(&mut response).await?;

            let Some(literal_len) = literal_length(&response[line_start..]) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let start = response.len();
            response.resize(start + literal_len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response.freeze())
    }

    /// Appends one CRLF-terminated line to `out`.
    async fn read_line(&mut self, out: &mut BytesMut) -> Result<()> {
        let mut consumed = 0usize;

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may have been the last byte of the previous chunk.
            let pending_cr = out.last() == Some(&b'\r') && consumed > 0;
            if pending_cr && buf[0] == b'\n' {
                out.extend_from_slice(&buf[..1]);
                self.reader.consume(1);
                return Ok(());
            }

            if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                out.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(());
            }

            let len = buf.len();
            out.extend_from_slice(buf);
            self.reader.consume(len);
            consumed += len;

            if consumed > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads responses until the completion response for `tag`, which is
    /// included as the last element.
    pub async fn read_until_tagged(&mut self, tag: &Tag) -> Result<Vec<Bytes>> {
        let prefix = tag.as_str().as_bytes();
        let mut responses = Vec::new();

        loop {
            let response = self.read_response().await?;
            let is_tagged = response.starts_with(prefix)
                && response.get(prefix.len()).is_some_and(|&b| b == b' ');
            responses.push(response);
            if is_tagged {
                return Ok(responses);
            }
        }
    }
}

/// Parses a `{n}` or `{n+}` literal marker at the end of a line.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
