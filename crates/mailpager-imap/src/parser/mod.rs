//! Sans-I/O parser for the server responses this client consumes.
//!
//! ```
//! use mailpager_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* SEARCH 3 5\r\n").unwrap();
//! assert!(matches!(response, Response::Untagged(UntaggedResponse::Search(ids)) if ids.len() == 2));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseCode, ResponseParser, UntaggedResponse};
