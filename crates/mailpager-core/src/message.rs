//! Structured view of a fetched message.

use chrono::{DateTime, FixedOffset};
use mailpager_mime::Message;
use mailpager_mime::encoding::decode_header_value;
use serde::{Deserialize, Serialize};

/// A message reduced to the fields the query interface returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredMessage {
    /// Decoded subject; empty when the header is missing.
    pub subject: String,
    /// Bare sender address.
    pub from_email: Option<String>,
    /// Bare recipient addresses from every `To` field, in order.
    pub to_emails: Vec<String>,
    /// Parsed `Date` header.
    pub date: Option<DateTime<FixedOffset>>,
    /// Readable body text.
    pub body: Option<String>,
}

impl StructuredMessage {
    /// Decodes a raw RFC 5322 message. Never fails: missing or malformed
    /// fields come back empty.
    #[must_use]
    pub fn decode(raw: &[u8]) -> Self {
        let message = Message::parse(raw);
        let headers = message.headers();

        Self {
            subject: message.subject().unwrap_or_default(),
            from_email: headers
                .get("from")
                .and_then(|value| addresses(value).into_iter().next()),
            to_emails: headers
                .get_all("to")
                .into_iter()
                .flat_map(addresses)
                .collect(),
            date: message.date(),
            body: message.body_text(),
        }
    }
}

/// Bare addresses in an address-list header, groups flattened.
///
/// Unparseable values fall back to the decoded text when it at least looks
/// like an address.
fn addresses(value: &str) -> Vec<String> {
    match mailparse::addrparse(value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                mailparse::MailAddr::Single(info) => vec![info.addr.clone()],
                mailparse::MailAddr::Group(group) => {
                    group.addrs.iter().map(|info| info.addr.clone()).collect()
                }
            })
            .filter(|addr| !addr.is_empty())
            .collect(),
        Err(_) => {
            let decoded = decode_header_value(value);
            let trimmed = decoded.trim();
            if trimmed.contains('@') {
                vec![trimmed.to_string()]
            } else {
                Vec::new()
            }
        }
    }
}
