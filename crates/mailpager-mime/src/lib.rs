//! # mailpager-mime
//!
//! Lenient decoding of RFC 5322 / MIME messages into text.
//!
//! ```
//! use mailpager_mime::Message;
//!
//! let raw = b"Subject: =?UTF-8?B?Q29tcHJvYmFudGUgZGUgdHJhbnNhY2Npw7Nu?=\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject().as_deref(), Some("Comprobante de transacción"));
//! assert_eq!(message.body_text().as_deref(), Some("Hello"));
//! ```
//!
//! Parsing never fails. Broken transfer encodings fall back to the raw
//! bytes, unknown charsets to UTF-8, and invalid byte sequences become
//! U+FFFD.

mod content_type;
mod error;
mod header;
mod html;
mod message;

pub mod encoding;

pub use content_type::{ContentType, Disposition};
pub use error::{Error, Result};
pub use header::Headers;
pub use html::html_to_text;
pub use message::{Message, Part, TransferEncoding};
