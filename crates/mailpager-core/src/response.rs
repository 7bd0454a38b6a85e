//! Response envelope returned to callers.
//!
//! ```json
//! {
//!   "meta": { "status": 200, "message": "2 Emails retrieved successfully", "elapsed_time": 0.84 },
//!   "data": {
//!     "items": [ ... ],
//!     "pagination": {
//!       "total_items": 23, "total_pages": 3, "page_size": 10, "current_page": 1,
//!       "next_cursor": "eyJwYWdlIjoyLCJwYWdlX3NpemUiOjEwfQ", "prev_cursor": null
//!     }
//!   }
//! }
//! ```
//!
//! `data` is left out entirely for no-content and error responses.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::Error;

/// Outcome class, rendered as its HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200.
    Ok,
    /// 204: nothing matched, or everything was filtered out.
    NoContent,
    /// 206: the page could not be retrieved from the server.
    PartialContent,
    /// 400: the request was malformed.
    BadRequest,
    /// 500: the server or connection failed.
    InternalServerError,
}

impl Status {
    /// Numeric HTTP status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NoContent => 204,
            Self::PartialContent => 206,
            Self::BadRequest => 400,
            Self::InternalServerError => 500,
        }
    }

    /// Returns true for 2xx codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::NoContent | Self::PartialContent)
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// Envelope header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    /// Outcome class.
    pub status: Status,
    /// Human readable summary.
    pub message: String,
    /// Time spent talking to the server, in seconds.
    #[serde(serialize_with = "as_seconds")]
    pub elapsed_time: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Position of a page within the full result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    /// Number of ids the search matched, before any filtering.
    pub total_items: usize,
    /// `ceil(total_items / page_size)`.
    pub total_pages: usize,
    /// Requested page size.
    pub page_size: u32,
    /// Requested page.
    pub current_page: u32,
    /// Cursor for the next page; `null` on the last one.
    pub next_cursor: Option<String>,
    /// Cursor for the previous page; `null` on the first one.
    pub prev_cursor: Option<String>,
}

/// Items of one page plus where it sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// The envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// Status, message and timing.
    pub meta: Meta,
    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Response with a payload.
    #[must_use]
    pub fn with_data(status: Status, message: impl Into<String>, elapsed: Duration, data: T) -> Self {
        Self {
            meta: Meta {
                status,
                message: message.into(),
                elapsed_time: elapsed,
            },
            data: Some(data),
        }
    }

    /// Response without a payload.
    #[must_use]
    pub fn empty(status: Status, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            meta: Meta {
                status,
                message: message.into(),
                elapsed_time: elapsed,
            },
            data: None,
        }
    }

    /// Error envelope. Client mistakes map to 400, everything else to 500.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let status = if error.is_client_error() {
            Status::BadRequest
        } else {
            Status::InternalServerError
        };
        Self::empty(status, error.to_string(), Duration::ZERO)
    }
}
