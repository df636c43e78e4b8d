//! Incremental Request Parser
//!
//! Clients send requests either as RESP arrays of bulk strings (what
//! `redis-cli` and client libraries emit) or as inline commands: a line of
//! space-separated words, handy from `telnet` or `nc`.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((request, consumed)))` - a full request, `consumed` bytes used
//! - `Ok(None)` - the request is incomplete, wait for more data
//! - `Err(ParseError)` - the stream is malformed; the connection is dropped
//!
//! The caller appends network reads to a buffer, parses in a loop and
//! advances past each request, so pipelined requests and requests split
//! across reads both work. Empty arrays and blank lines are skipped.

use crate::protocol::types::{prefix, Request, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur while framing requests.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// An array element was not a bulk string
    #[error("expected '$', got {0:#04x}")]
    UnexpectedPrefix(u8),

    /// Invalid integer in a length header
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a header or inline command
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative or above the limit
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, unbalanced quotes, ...)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The request exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of words in one request
pub const MAX_ARGS: i64 = 1024 * 1024;

/// Maximum length of an inline command line
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Stateless request parser.
///
/// # Example
///
/// ```
/// use boltkv::protocol::RequestParser;
///
/// let buffer = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
/// let (request, consumed) = RequestParser::new().parse(buffer).unwrap().unwrap();
/// assert_eq!(request.command, "get");
/// assert_eq!(consumed, buffer.len());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one request from the front of `buf`.
    ///
    /// `consumed` includes any skipped empty frames before the request.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
        let mut offset = 0;

        loop {
            let rest = &buf[offset..];
            if rest.is_empty() {
                return Ok(None);
            }

            let frame = if rest[0] == prefix::ARRAY {
                parse_array(rest)?
            } else {
                parse_inline(rest)?
            };

            match frame {
                None => return Ok(None),
                Some((words, consumed)) => {
                    offset += consumed;
                    if let Some(request) = Request::from_words(words) {
                        return Ok(Some((request, offset)));
                    }
                }
            }
        }
    }
}

/// Parses `*<count>\r\n` followed by `count` bulk strings.
fn parse_array(buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    debug_assert!(buf[0] == prefix::ARRAY);

    let Some((count, mut consumed)) = parse_header(buf)? else {
        return Ok(None);
    };

    // Null and empty arrays carry no request
    if count <= 0 {
        if count < -1 {
            return Err(ParseError::InvalidArrayLength(count));
        }
        return Ok(Some((Vec::new(), consumed)));
    }
    if count > MAX_ARGS {
        return Err(ParseError::InvalidArrayLength(count));
    }

    let mut words = Vec::with_capacity(usize::try_from(count).unwrap_or_default().min(1024));

    for _ in 0..count {
        match parse_bulk_string(&buf[consumed..])? {
            Some((word, used)) => {
                words.push(word);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((words, consumed)))
}

/// Parses `$<length>\r\n<data>\r\n`.
fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first != prefix::BULK_STRING {
        return Err(ParseError::UnexpectedPrefix(first));
    }

    let Some((length, data_start)) = parse_header(buf)? else {
        return Ok(None);
    };

    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }
    let length = usize::try_from(length).map_err(|_| ParseError::InvalidBulkLength(length))?;

    if length > MAX_BULK_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total_needed = data_start + length + 2;
    if buf.len() < total_needed {
        return Ok(None);
    }

    if &buf[data_start + length..total_needed] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
    Ok(Some((data, total_needed)))
}

/// Parses the integer of a `<prefix><n>\r\n` header line.
///
/// Returns the integer and the header length including CRLF.
fn parse_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        if buf.len() > MAX_INLINE_SIZE {
            return Err(ParseError::ProtocolError("header line too long".to_string()));
        }
        return Ok(None);
    };

    let text = std::str::from_utf8(&buf[1..1 + pos])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    let n: i64 = text
        .parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))?;

    Ok(Some((n, 1 + pos + 2)))
}

/// Parses one inline command line, terminated by LF or CRLF.
///
/// Words are split on whitespace; double quotes group words containing
/// spaces.
fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    let Some(lf) = buf.iter().position(|&b| b == b'\n') else {
        if buf.len() > MAX_INLINE_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: buf.len(),
                max: MAX_INLINE_SIZE,
            });
        }
        return Ok(None);
    };

    let mut line = &buf[..lf];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }

    let line = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(Some((split_inline(line)?, lf + 1)))
}

fn split_inline(line: &str) -> ParseResult<Vec<Bytes>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    words.push(Bytes::from(std::mem::take(&mut current)));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_quotes {
        return Err(ParseError::ProtocolError(
            "unbalanced quotes in request".to_string(),
        ));
    }
    if in_word {
        words.push(Bytes::from(current));
    }

    Ok(words)
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == CRLF)
}

/// Helper function to parse a single request from bytes.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    RequestParser::new().parse(buf)
}
