//! Searching and fetching inside an open mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::Command;
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::types::{MailboxStatus, Uid};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the open mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Status reported when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> MailboxStatus {
        self.state.status()
    }

    /// Runs `UID SEARCH` and returns matching UIDs in server order.
    pub async fn uid_search(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let responses = self
            .run(&Command::UidSearch {
                criteria: criteria.to_string(),
            })
            .await?;

        let mut uids = Vec::new();
        for bytes in &responses {
            if let Ok(Response::Untagged(UntaggedResponse::Search(ids))) =
                ResponseParser::parse(bytes)
            {
                uids.extend(ids);
            }
        }
        Ok(uids)
    }

    /// Fetches the full RFC 5322 source of one message without marking it
    /// seen.
    ///
    /// Returns `None` when the server has no such UID.
    pub async fn uid_fetch_message(&mut self, uid: Uid) -> Result<Option<Vec<u8>>> {
        let responses = self.run(&Command::UidFetchBody { uid }).await?;

        for bytes in &responses {
            let Ok(Response::Untagged(UntaggedResponse::Fetch { items, .. })) =
                ResponseParser::parse(bytes)
            else {
                continue;
            };

            // Some servers send unsolicited FETCH responses (flag updates)
            // for other messages; only accept the one carrying our UID.
            let uid_matches = items
                .iter()
                .any(|item| matches!(item, FetchItem::Uid(u) if *u == uid));
            if !uid_matches {
                continue;
            }

            for item in items {
                match item {
                    FetchItem::Body { section, data } if section.is_empty() => return Ok(data),
                    FetchItem::Rfc822(data) => return Ok(data),
                    _ => {}
                }
            }
        }

        Ok(None)
    }
}
