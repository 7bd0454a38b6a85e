//! Server response parser.

#![allow(clippy::missing_errors_doc)]

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Status, Tag, Uid};
use crate::{Error, Result};

/// Bracketed response code inside status responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[CAPABILITY ...]`
    Capability(Vec<String>),
    /// `[UIDVALIDITY n]`
    UidValidity(u32),
    /// `[READ-ONLY]`
    ReadOnly,
    /// Any other code, by name.
    Other(String),
}

/// One data item inside a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID n`
    Uid(Uid),
    /// `BODY[section]<origin> nstring`
    Body {
        /// Section specifier between the brackets (empty for the whole message).
        section: String,
        /// Payload, `None` for NIL.
        data: Option<Vec<u8>>,
    },
    /// `RFC822 nstring`
    Rfc822(Option<Vec<u8>>),
    /// `FLAGS (...)`
    Flags(Vec<String>),
    /// Any other item; the value is skipped.
    Other(String),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO`
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH`
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<String>),
    /// `* SEARCH ...`; identifiers are UIDs when answering UID SEARCH.
    Search(Vec<Uid>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// Data this client has no use for (FLAGS, LIST, ...).
    Other(String),
}

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text after `+`.
        text: String,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response as returned by the framed reader.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                let text = String::from_utf8_lossy(lexer.rest_of_line()).into_owned();
                Ok(Response::Continuation { text })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let word = lexer.read_atom_string()?;
        let status = Status::from_keyword(word)
            .ok_or_else(|| lexer.error(&format!("Invalid status: {word}")))?;
        let (code, text) = parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => {
                let upper = keyword.to_ascii_uppercase();
                match upper.as_str() {
                    "OK" | "NO" | "BAD" | "PREAUTH" | "BYE" => {
                        let (code, text) = parse_resp_text(lexer)?;
                        match upper.as_str() {
                            "OK" => UntaggedResponse::Ok { code, text },
                            "NO" => UntaggedResponse::No { code, text },
                            "BAD" => UntaggedResponse::Bad { code, text },
                            "PREAUTH" => UntaggedResponse::PreAuth { code, text },
                            _ => UntaggedResponse::Bye { code, text },
                        }
                    }
                    "CAPABILITY" => UntaggedResponse::Capability(words(lexer.rest_of_line())),
                    "SEARCH" => UntaggedResponse::Search(parse_search(lexer)?),
                    _ => UntaggedResponse::Other(upper),
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?.to_ascii_uppercase();
                match keyword.as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(n),
                    "FETCH" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Fetch {
                            seq: n,
                            items: parse_fetch_items(lexer)?,
                        }
                    }
                    _ => UntaggedResponse::Other(keyword),
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }
}

/// Parses `[code] text` after a status keyword. Both parts are optional.
fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }

    let code = if lexer.peek() == Some(b'[') {
        lexer.advance();
        let name = lexer.read_atom_string()?.to_ascii_uppercase();
        let mut raw = Vec::new();
        while let Some(b) = lexer.peek() {
            if b == b']' || b == b'\r' || b == b'\n' {
                break;
            }
            raw.push(b);
            lexer.advance();
        }
        lexer.expect(Token::RBracket)?;
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = match name.as_str() {
            "CAPABILITY" => ResponseCode::Capability(words(&raw)),
            "UIDVALIDITY" => String::from_utf8_lossy(&raw)
                .trim()
                .parse()
                .map(ResponseCode::UidValidity)
                .map_err(|_| lexer.error("Invalid UIDVALIDITY"))?,
            "READ-ONLY" => ResponseCode::ReadOnly,
            _ => ResponseCode::Other(name),
        };
        Some(code)
    } else {
        None
    };

    let text = String::from_utf8_lossy(lexer.rest_of_line()).into_owned();
    Ok((code, text))
}

fn words(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

/// Parses the identifiers of a SEARCH response, ignoring a trailing
/// `(MODSEQ n)` and any zero values.
fn parse_search(lexer: &mut Lexer<'_>) -> Result<Vec<Uid>> {
    let mut ids = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::Space => {}
            Token::Number(n) => ids.extend(Uid::new(n)),
            _ => break,
        }
    }
    Ok(ids)
}

fn parse_fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => items.push(parse_fetch_item(lexer, name)?),
            token => return Err(lexer.error(&format!("Unexpected token in FETCH: {token:?}"))),
        }
    }

    Ok(items)
}

fn parse_fetch_item(lexer: &mut Lexer<'_>, name: &str) -> Result<FetchItem> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "UID" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            Uid::new(n)
                .map(FetchItem::Uid)
                .ok_or_else(|| lexer.error("Invalid UID 0"))
        }
        "FLAGS" => {
            lexer.expect_space()?;
            lexer.expect(Token::LParen)?;
            let mut flags = Vec::new();
            loop {
                match lexer.next_token()? {
                    Token::RParen => break,
                    Token::Space => {}
                    Token::Atom(flag) => flags.push(flag.to_string()),
                    token => return Err(lexer.error(&format!("Unexpected flag: {token:?}"))),
                }
            }
            Ok(FetchItem::Flags(flags))
        }
        "BODY" | "BINARY" if lexer.peek() == Some(b'[') => {
            lexer.advance();
            let mut section = Vec::new();
            while let Some(b) = lexer.peek() {
                if b == b']' {
                    break;
                }
                section.push(b);
                lexer.advance();
            }
            lexer.expect(Token::RBracket)?;
            // Partial fetch origin, e.g. `<0>`.
            if lexer.peek() == Some(b'<') {
                lexer.read_atom_string()?;
            }
            lexer.expect_space()?;
            Ok(FetchItem::Body {
                section: String::from_utf8_lossy(&section).into_owned(),
                data: read_nstring(lexer)?,
            })
        }
        "RFC822" => {
            lexer.expect_space()?;
            Ok(FetchItem::Rfc822(read_nstring(lexer)?))
        }
        _ => {
            lexer.expect_space()?;
            skip_value(lexer)?;
            Ok(FetchItem::Other(upper))
        }
    }
}

fn read_nstring(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::Literal(data) => Ok(Some(data.to_vec())),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        token => Err(lexer.error(&format!("Expected nstring, got {token:?}"))),
    }
}

/// Skips one value, descending into parenthesized lists.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => depth -= 1,
            Token::RParen | Token::Crlf | Token::Eof => {
                return Err(lexer.error("Unexpected end of FETCH value"));
            }
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
    }
}
