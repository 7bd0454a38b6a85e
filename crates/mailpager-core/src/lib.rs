//! # mailpager-core
//!
//! Paginated search over an IMAP mailbox, backed by two LRU caches.
//!
//! This crate provides:
//! - [`SearchCriteria`] - IMAP SEARCH builder
//! - [`cache`] - bounded LRU and the shared single-flight wrapper
//! - [`cursor`] - opaque page tokens
//! - [`StructuredMessage`] - decoded view of a fetched message
//! - [`mailbox`] - scoped read-only sessions on the server
//! - [`QueryService`] - the paginated query itself
//! - [`ApiResponse`] - the JSON envelope handed to callers

pub mod cache;
pub mod config;
pub mod criteria;
pub mod cursor;
mod error;
pub mod mailbox;
pub mod message;
pub mod response;
pub mod service;
pub mod time;

pub use config::{Credentials, ImapServer, Settings};
pub use criteria::{SearchCriteria, define_criteria};
pub use cursor::{Cursor, decode_cursor, encode_cursor};
pub use error::{Error, Result};
pub use mailbox::{FetchedMessage, ImapConnector, MailboxConnector, MailboxSession, with_mailbox};
pub use message::StructuredMessage;
pub use response::{ApiResponse, Meta, Page, PaginationMeta, Status};
pub use service::{MessageFilter, QueryOutcome, QueryReply, QueryRequest, QueryService};
