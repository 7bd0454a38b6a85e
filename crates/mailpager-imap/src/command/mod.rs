//! IMAP commands issued by the read-only client.
//!
//! Only the commands needed to log in, open a mailbox read-only, search it
//! and pull whole messages are modelled.

mod tag_generator;

pub use tag_generator::TagGenerator;

use crate::types::{Tag, Uid};
use crate::{Error, Result};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to open.
        mailbox: String,
    },
    /// UID SEARCH with a pre-rendered criteria expression.
    UidSearch {
        /// Search keys, sent verbatim.
        criteria: String,
    },
    /// UID FETCH of the complete message without setting `\Seen`.
    UidFetchBody {
        /// Message to fetch.
        uid: Uid,
    },
}

impl Command {
    /// Checks that every argument fits on one command line.
    ///
    /// Quoting does not protect against CR, LF or NUL: any of them would
    /// end the line early and let the rest be read as another command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the offending argument.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Logout | Self::UidFetchBody { .. } => Ok(()),
            Self::Login { username, password } => {
                single_line("username", username)?;
                single_line("password", password)
            }
            Self::Examine { mailbox } => single_line("mailbox", mailbox),
            Self::UidSearch { criteria } => single_line("search criteria", criteria),
        }
    }

    /// Serializes the command to bytes with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &Tag) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_str().as_bytes());
        buf.push(b' ');

        match self {
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_astring(&mut buf, mailbox);
            }
            Self::UidSearch { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                if !criteria.is_ascii() {
                    buf.extend_from_slice(b"CHARSET UTF-8 ");
                }
                buf.extend_from_slice(criteria.as_bytes());
            }
            Self::UidFetchBody { uid } => {
                buf.extend_from_slice(format!("UID FETCH {uid} (UID BODY.PEEK[])").as_bytes());
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Short name used in log output; never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Examine { .. } => "EXAMINE",
            Self::UidSearch { .. } => "UID SEARCH",
            Self::UidFetchBody { .. } => "UID FETCH",
        }
    }
}

fn single_line(what: &str, value: &str) -> Result<()> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(Error::InvalidArgument(format!(
            "{what} contains CR, LF or NUL"
        )));
    }
    Ok(())
}

/// Writes an astring (atom or quoted string).
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}
