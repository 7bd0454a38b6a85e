//! Type-state IMAP client.
//!
//! ```text
//! NotAuthenticated --login()--> Authenticated --examine()--> Selected
//! ```
//!
//! Every state can `logout()`. Methods that only make sense in one state
//! are only defined on that state.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseCode, ResponseParser, UntaggedResponse};
use crate::types::{Status, Tag};
use crate::{Error, Result};

/// IMAP client connection in state `State`.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    capabilities: Vec<String>,
    state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Capabilities advertised by the server so far.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks for a capability, case-insensitively.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Sends LOGOUT and consumes the connection.
    ///
    /// The server answers with BYE before the tagged OK; a connection that
    /// closes right after BYE still counts as a clean logout.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        debug!(%tag, "LOGOUT");
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;

        match self.stream.read_until_tagged(&tag).await {
            Ok(responses) => check_tagged_ok(&responses, &tag),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sends a command and returns every response up to and including the
    /// tagged completion, after checking that the completion is OK.
    ///
    /// Commands whose arguments would break the line are refused before
    /// anything is written.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<Vec<Bytes>> {
        command.validate()?;
        let tag = self.tag_gen.next();
        debug!(%tag, command = command.name(), "sending");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let responses = self.stream.read_until_tagged(&tag).await?;
        self.absorb_capabilities(&responses);
        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    fn absorb_capabilities(&mut self, responses: &[Bytes]) {
        for bytes in responses {
            match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::Capability(caps)))
                | Ok(Response::Tagged {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                }) => self.capabilities = caps,
                _ => {}
            }
        }
    }
}

/// Finds the completion for `tag` and maps a non-OK status to an error.
pub(crate) fn check_tagged_ok(responses: &[Bytes], tag: &Tag) -> Result<()> {
    for bytes in responses.iter().rev() {
        if let Ok(Response::Tagged {
            tag: resp_tag,
            status,
            text,
            ..
        }) = ResponseParser::parse(bytes)
            && resp_tag == *tag
        {
            return match status {
                Status::Ok | Status::PreAuth => Ok(()),
                Status::No => Err(Error::No(text)),
                Status::Bad => Err(Error::Bad(text)),
                Status::Bye => Err(Error::Bye(text)),
            };
        }
    }

    Err(Error::Protocol(format!("missing completion for {tag}")))
}
