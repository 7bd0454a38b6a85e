//! Message tree and body selection.

use chrono::{DateTime, FixedOffset};

use crate::content_type::{ContentType, Disposition};
use crate::encoding::{decode_base64, decode_charset, decode_header_value, decode_quoted_printable};
use crate::header::Headers;
use crate::html::html_to_text;

/// Nesting limit for multipart bodies; deeper parts are kept as opaque
/// leaves.
const MAX_DEPTH: usize = 16;

/// Content transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7bit, 8bit and binary: the body is used as-is.
    #[default]
    Identity,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value. Unknown tokens are
    /// treated as identity.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Identity,
        }
    }
}

/// One node of the MIME tree. Multipart nodes carry children; leaves
/// carry content.
#[derive(Debug, Clone)]
pub struct Part {
    headers: Headers,
    content_type: ContentType,
    body: Vec<u8>,
    children: Vec<Part>,
}

impl Part {
    /// Parses a part (or whole message) from raw bytes.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_at_depth(raw, 0)
    }

    fn parse_at_depth(raw: &[u8], depth: usize) -> Self {
        let (headers, body) = Headers::split(raw);
        let content_type = headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_default();

        let children = match content_type.boundary() {
            Some(boundary) if content_type.is_multipart() && depth < MAX_DEPTH => {
                split_multipart(body, boundary)
                    .into_iter()
                    .map(|part| Self::parse_at_depth(part, depth + 1))
                    .collect()
            }
            _ => Vec::new(),
        };

        Self {
            headers,
            content_type,
            body: body.to_vec(),
            children,
        }
    }

    /// Part headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Content type; `text/plain` when absent or unparseable.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Child parts of a multipart node.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Declared transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::Identity, TransferEncoding::parse)
    }

    /// Declared disposition.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.headers
            .get("content-disposition")
            .map_or(Disposition::Inline, Disposition::parse)
    }

    /// Returns true if the part is marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition() == Disposition::Attachment
    }

    /// Body with the transfer encoding undone. Malformed base64 yields the
    /// raw bytes.
    #[must_use]
    pub fn decoded_body(&self) -> Vec<u8> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => {
                decode_base64(&self.body).unwrap_or_else(|_| self.body.clone())
            }
            TransferEncoding::QuotedPrintable => decode_quoted_printable(&self.body),
            TransferEncoding::Identity => self.body.clone(),
        }
    }

    /// Decoded body as text in the declared charset (UTF-8 by default).
    #[must_use]
    pub fn text(&self) -> String {
        decode_charset(&self.decoded_body(), self.content_type.charset())
    }

    /// This part and all descendants, depth-first in document order.
    #[must_use]
    pub fn walk(&self) -> Vec<&Self> {
        let mut parts = vec![self];
        for child in &self.children {
            parts.extend(child.walk());
        }
        parts
    }
}

/// A parsed message.
#[derive(Debug, Clone)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a complete RFC 5322 message. Never fails; malformed input
    /// produces whatever structure could be recovered.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse(raw),
        }
    }

    /// Top-level part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// `Subject` with encoded words decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.decoded_header("subject")
    }

    /// `From` with encoded words decoded.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.decoded_header("from")
    }

    /// Every `To` field, each with encoded words decoded.
    #[must_use]
    pub fn to(&self) -> Vec<String> {
        self.headers()
            .get_all("to")
            .into_iter()
            .map(decode_header_value)
            .collect()
    }

    /// `Date` parsed as RFC 2822; `None` if absent or unparseable.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers().get("date").and_then(parse_date)
    }

    fn decoded_header(&self, name: &str) -> Option<String> {
        self.headers().get(name).map(decode_header_value)
    }

    /// Readable body text.
    ///
    /// Walks the tree depth-first, skipping attachments. The first non-empty
    /// `text/plain` part wins; otherwise the first non-empty `text/html`
    /// part is rendered to plain text. `None` if neither exists.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        let parts = self.root.walk();
        let candidates = || {
            parts
                .iter()
                .filter(|part| part.children.is_empty() && !part.is_attachment())
        };

        if let Some(text) = candidates()
            .filter(|part| part.content_type.is("text", "plain"))
            .map(|part| part.text())
            .find(|text| !text.is_empty())
        {
            return Some(text);
        }

        candidates()
            .filter(|part| part.content_type.is("text", "html"))
            .map(|part| html_to_text(&part.text()))
            .find(|text| !text.is_empty())
    }
}

/// Parses an RFC 2822 date, tolerating a trailing comment such as `(UTC)`.
fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value).ok().or_else(|| {
        let without_comment = value.split_once('(').map(|(head, _)| head.trim())?;
        DateTime::parse_from_rfc2822(without_comment).ok()
    })
}

/// Splits a multipart body into its parts. The preamble and epilogue are
/// dropped; an unterminated final part is kept.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let line = body[pos..line_end]
            .strip_suffix(b"\r")
            .unwrap_or(&body[pos..line_end]);

        if let Some(tail) = line.strip_prefix(delimiter) {
            let closing = tail.starts_with(b"--");
            if closing || tail.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = current_start {
                    parts.push(&body[start..content_end(body, start, pos)]);
                }
                if closing {
                    return parts;
                }
                current_start = Some((line_end + 1).min(body.len()));
            }
        }

        pos = line_end + 1;
    }

    if let Some(start) = current_start {
        parts.push(&body[start..]);
    }
    parts
}

/// End of a part's content: the line break before the next delimiter
/// belongs to the delimiter.
fn content_end(body: &[u8], start: usize, delimiter_pos: usize) -> usize {
    let mut end = delimiter_pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn split_simple_multipart() {
        let body = b"preamble\r\n--b\r\nA\r\n--b\r\nB\r\nline\r\n--b--\r\nepilogue";
        let parts = split_multipart(body, "b");
        assert_eq!(parts, vec![&b"A"[..], &b"B\r\nline"[..]]);
    }

    #[test]
    fn split_ignores_lookalike_lines() {
        let body = b"--b\nx\n--bogus\ny\n--b--\n";
        let parts = split_multipart(body, "b");
        assert_eq!(parts, vec![&b"x\n--bogus\ny"[..]]);
    }

    #[test]
    fn split_keeps_unterminated_part() {
        let parts = split_multipart(b"--b\r\nonly\r\n", "b");
        assert_eq!(parts, vec![&b"only\r\n"[..]]);
    }

    #[test]
    fn dates() {
        let date = parse_date("Fri, 05 Jul 2024 19:52:00 -0600").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-07-05T19:52:00-06:00");
        assert!(parse_date("Fri, 05 Jul 2024 19:52:00 +0000 (UTC)").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn transfer_encoding_tokens() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("8bit"), TransferEncoding::Identity);
    }

    #[test]
    fn malformed_base64_falls_back_to_raw() {
        let part = Part::parse(b"Content-Transfer-Encoding: base64\r\n\r\n***not base64***");
        assert_eq!(part.decoded_body(), b"***not base64***");
    }

    #[test]
    fn nesting_is_bounded() {
        let mut raw = String::from("Content-Type: text/plain\r\n\r\ndeep");
        for level in 0..(MAX_DEPTH + 4) {
            raw = format!(
                "Content-Type: multipart/mixed; boundary=\"l{level}\"\r\n\r\n--l{level}\r\n{raw}\r\n--l{level}--\r\n"
            );
        }
        let part = Part::parse(raw.as_bytes());
        assert_eq!(part.walk().len(), MAX_DEPTH + 1);
    }
}
