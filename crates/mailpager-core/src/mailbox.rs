//! Sessions against the remote mail store.
//!
//! A session is opened for one stage of a query (search, or fetch) and
//! closed at the end of it. [`with_mailbox`] owns that lifecycle so callers
//! cannot forget the LOGOUT, whichever way their stage ends.

use std::future::Future;
use std::pin::Pin;

use mailpager_imap::connection::{self, Config as ImapConfig};
use mailpager_imap::{Client, ImapStream, Selected, Uid};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, warn};

use crate::config::Credentials;
use crate::error::Result;

/// Raw source of one fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// UID it was fetched by.
    pub uid: Uid,
    /// RFC 5322 bytes.
    pub raw: Vec<u8>,
}

/// An open, read-only mailbox.
pub trait MailboxSession: Send {
    /// Runs a search and returns matching UIDs in server order. No match is
    /// an empty list, not an error.
    fn search_ids(&mut self, criteria: &str) -> impl Future<Output = Result<Vec<Uid>>> + Send;

    /// Fetches each UID independently. UIDs that fail or no longer exist
    /// are logged and left out of the result.
    fn fetch_by_ids(&mut self, ids: &[Uid]) -> impl Future<Output = Vec<FetchedMessage>> + Send;

    /// Ends the session.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens sessions.
pub trait MailboxConnector: Send + Sync {
    /// Session type produced by [`MailboxConnector::open`].
    type Session: MailboxSession;

    /// Connects, authenticates and opens `mailbox` read-only. Failures are
    /// fatal to the caller; nothing is retried.
    fn open(&self, mailbox: &str) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Future returned by a [`with_mailbox`] scope.
pub type ScopeFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// Opens `mailbox`, runs `scope` against it and closes the session on every
/// path out of the scope.
///
/// The scope's own result wins over a failed close; a close failure after a
/// successful scope is only logged, since the stage's data is already in
/// hand.
///
/// # Errors
///
/// Returns the error from opening the mailbox or from `scope`.
pub async fn with_mailbox<C, T, F>(connector: &C, mailbox: &str, scope: F) -> Result<T>
where
    C: MailboxConnector + ?Sized,
    F: for<'s> FnOnce(&'s mut C::Session) -> ScopeFuture<'s, T> + Send,
{
    let mut session = connector.open(mailbox).await.inspect_err(|e| {
        error!(mailbox, error = %e, "Failed to open mailbox");
    })?;

    let result = scope(&mut session).await;

    if let Err(e) = session.close().await {
        warn!(mailbox, error = %e, "Logout failed");
    }
    result
}

/// Opens sessions on a real IMAP server.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: ImapConfig,
    credentials: Credentials,
}

impl ImapConnector {
    /// Creates a connector for `config` logging in with `credentials`.
    #[must_use]
    pub const fn new(config: ImapConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

impl MailboxConnector for ImapConnector {
    type Session = ImapSession<ImapStream>;

    async fn open(&self, mailbox: &str) -> Result<Self::Session> {
        debug!(host = %self.config.host, port = self.config.port, mailbox, "Opening mailbox");
        let stream = connection::connect(&self.config).await?;
        let client = Client::from_stream(stream)
            .await?
            .login(&self.credentials.user, &self.credentials.password)
            .await?
            .examine(mailbox)
            .await?;
        debug!(mailbox, exists = client.status().exists, "Mailbox open");
        Ok(ImapSession::new(client))
    }
}

/// Session over an IMAP connection in the selected state.
#[derive(Debug)]
pub struct ImapSession<S> {
    client: Client<S, Selected>,
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a client that already has a mailbox open.
    #[must_use]
    pub const fn new(client: Client<S, Selected>) -> Self {
        Self { client }
    }
}

impl<S> MailboxSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn search_ids(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let ids = self.client.uid_search(criteria).await?;
        debug!(count = ids.len(), "UID SEARCH returned");
        Ok(ids)
    }

    async fn fetch_by_ids(&mut self, ids: &[Uid]) -> Vec<FetchedMessage> {
        let mut messages = Vec::with_capacity(ids.len());
        for &uid in ids {
            match self.client.uid_fetch_message(uid).await {
                Ok(Some(raw)) => messages.push(FetchedMessage { uid, raw }),
                Ok(None) => warn!(%uid, "Message not returned by server, skipping"),
                Err(e) => warn!(%uid, error = %e, "Failed to fetch message, skipping"),
            }
        }
        messages
    }

    async fn close(self) -> Result<()> {
        self.client.logout().await?;
        Ok(())
    }
}
