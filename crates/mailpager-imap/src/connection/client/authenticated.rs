//! Opening a mailbox.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::{Response, ResponseCode, ResponseParser, UntaggedResponse};
use crate::types::MailboxStatus;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a mailbox read-only with EXAMINE.
    pub async fn examine(mut self, mailbox: &str) -> Result<Client<S, Selected>> {
        let responses = self
            .run(&Command::Examine {
                mailbox: mailbox.to_string(),
            })
            .await?;

        let status = mailbox_status(&responses);
        Ok(self.transition(Selected {
            mailbox: mailbox.to_string(),
            status,
        }))
    }
}

fn mailbox_status(responses: &[Bytes]) -> MailboxStatus {
    let mut status = MailboxStatus::default();
    for bytes in responses {
        match ResponseParser::parse(bytes) {
            Ok(Response::Untagged(UntaggedResponse::Exists(n))) => status.exists = n,
            Ok(Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::UidValidity(v)),
                ..
            })) => status.uid_validity = Some(v),
            _ => {}
        }
    }
    status
}
