//! Connection state markers.

use crate::types::MailboxStatus;

/// Greeting received, not logged in yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox open.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is open read-only.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Name of the open mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Status captured when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> MailboxStatus {
        self.status
    }
}
