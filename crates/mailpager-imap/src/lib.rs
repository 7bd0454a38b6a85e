//! # mailpager-imap
//!
//! A small, read-only IMAP client: connect over TLS, LOGIN, EXAMINE a
//! mailbox, run `UID SEARCH` and pull whole messages with
//! `UID FETCH <uid> BODY.PEEK[]`.
//!
//! ```ignore
//! use mailpager_imap::{Client, Config, connection};
//!
//! # async fn run() -> mailpager_imap::Result<()> {
//! let stream = connection::connect(&Config::new("imap.gmail.com")).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user@example.com", "app-password").await?;
//! let mut inbox = client.examine("inbox").await?;
//!
//! for uid in inbox.uid_search("SINCE \"01-Jul-2024\"").await? {
//!     let raw = inbox.uid_fetch_message(uid).await?;
//!     println!("{uid}: {} bytes", raw.map_or(0, |r| r.len()));
//! }
//! inbox.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The connection is modelled with the type-state pattern so that, for
//! example, `uid_search` cannot be called before a mailbox is open.

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, ImapStream, NotAuthenticated,
    Security, Selected,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{MailboxStatus, Status, Tag, Uid};
