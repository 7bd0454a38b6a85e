//! Transfer-encoding, charset and RFC 2047 encoded-word decoding.
//!
//! Everything here is lenient: mail in the wild is frequently malformed and a
//! best-effort rendering is more useful than an error.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine, alphabet};
use encoding_rs::{Encoding, UTF_8};

use crate::error::Result;

/// Standard alphabet, padding optional, trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes a base64 body, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the data contains bytes outside the base64 alphabet.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(LENIENT_BASE64.decode(cleaned)?)
}

/// Decodes quoted-printable data (RFC 2045 section 6.7).
///
/// Soft line breaks are removed and `=XX` escapes decoded. An `=` that does
/// not start a valid escape is kept as-is.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, allowing trailing whitespace before the newline.
        let mut j = i + 1;
        while j < data.len() && matches!(data[j], b' ' | b'\t') {
            j += 1;
        }
        match data.get(j..) {
            Some([b'\r', b'\n', ..]) => {
                i = j + 2;
                continue;
            }
            Some([b'\n', ..]) => {
                i = j + 1;
                continue;
            }
            _ => {}
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                out.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

/// Decodes bytes in the named charset.
///
/// Unknown or missing labels fall back to UTF-8; invalid sequences become
/// U+FFFD.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Decodes a raw header value: unfolds continuation lines and replaces
/// every RFC 2047 encoded word with its text.
///
/// Whitespace between two adjacent encoded words is dropped; whitespace
/// next to plain text is kept. Words that cannot be decoded are left
/// verbatim.
///
/// ```
/// use mailpager_mime::encoding::decode_header_value;
///
/// assert_eq!(
///     decode_header_value("=?ISO-8859-1?Q?Andr=E9?= =?UTF-8?B?w6k=?= ok"),
///     "Andréé ok"
/// );
/// ```
#[must_use]
pub fn decode_header_value(value: &str) -> String {
    let unfolded: String = value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();

    let mut out = String::with_capacity(unfolded.len());
    let mut rest = unfolded.as_str();
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }
    out.push_str(rest);

    out
}

/// Decodes the encoded word at the start of `s`, returning the text and the
/// number of bytes consumed.
fn decode_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;

    let charset_end = body.find('?')?;
    let charset = &body[..charset_end];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }
    // RFC 2231 language suffix, e.g. `UTF-8*es`.
    let charset = charset.split('*').next().unwrap_or(charset);

    let after_charset = &body[charset_end + 1..];
    let encoding = after_charset.get(..1)?;
    let text_and_tail = after_charset.get(1..)?.strip_prefix('?')?;
    let text_end = text_and_tail.find("?=")?;
    let text = &text_and_tail[..text_end];
    if text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(text.as_bytes()).ok()?,
        "Q" | "q" => {
            let spaced: Vec<u8> = text
                .bytes()
                .map(|b| if b == b'_' { b' ' } else { b })
                .collect();
            decode_quoted_printable(&spaced)
        }
        _ => return None,
    };

    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;
    let decoded = encoding.decode_without_bom_handling(&bytes).0.into_owned();

    // `=?` + charset + `?` + encoding + `?` + text + `?=`
    let consumed = 2 + charset_end + 1 + 1 + 1 + text_end + 2;
    Some((decoded, consumed))
}
