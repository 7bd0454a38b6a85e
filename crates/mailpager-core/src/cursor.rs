//! Opaque pagination cursors.
//!
//! A cursor is the URL-safe, unpadded base64 encoding of
//! `{"page":p,"page_size":s}`. Clients are expected to pass tokens back
//! untouched; the layout is not part of the interface.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A page position: 1-based page number plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// 1-based page number.
    pub page: NonZeroU32,
    /// Items per page.
    pub page_size: NonZeroU32,
}

impl Cursor {
    /// Creates a cursor; `None` if either value is zero.
    #[must_use]
    pub fn new(page: u32, page_size: u32) -> Option<Self> {
        Some(Self {
            page: NonZeroU32::new(page)?,
            page_size: NonZeroU32::new(page_size)?,
        })
    }

    /// First page of the given size.
    #[must_use]
    pub const fn first(page_size: NonZeroU32) -> Self {
        Self {
            page: NonZeroU32::MIN,
            page_size,
        }
    }

    /// Renders the opaque token.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::json!({
            "page": self.page,
            "page_size": self.page_size,
        });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    /// Parses an opaque token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CursorDecode`] if the token is not URL-safe base64,
    /// does not hold the expected JSON object, or carries a page or page
    /// size that is not a positive integer.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().trim_end_matches('='))
            .map_err(|e| Error::CursorDecode(format!("not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::CursorDecode(format!("bad payload: {e}")))
    }

    /// Cursor for the following page.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Some(Self {
            page: self.page.checked_add(1)?,
            page_size: self.page_size,
        })
    }

    /// Cursor for the preceding page; `None` on the first page.
    #[must_use]
    pub fn prev(&self) -> Option<Self> {
        Some(Self {
            page: NonZeroU32::new(self.page.get() - 1)?,
            page_size: self.page_size,
        })
    }

    /// Index of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.get() as usize - 1).saturating_mul(self.page_size.get() as usize)
    }
}

/// Encodes a page position. `None` if either value is zero.
#[must_use]
pub fn encode_cursor(page: u32, page_size: u32) -> Option<String> {
    Cursor::new(page, page_size).map(|cursor| cursor.encode())
}

/// Decodes a token into `(page, page_size)`.
///
/// # Errors
///
/// See [`Cursor::decode`].
pub fn decode_cursor(token: &str) -> Result<(u32, u32)> {
    let cursor = Cursor::decode(token)?;
    Ok((cursor.page.get(), cursor.page_size.get()))
}
