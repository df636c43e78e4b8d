//! Request and Reply Types
//!
//! A [`Request`] is a lower-cased command name plus its binary-safe
//! arguments. A [`Reply`] is a kind tag plus zero or more byte-string
//! arguments; the kind decides how the reply is framed on the wire.
//!
//! ## Wire Format
//!
//! Replies are encoded with RESP type prefixes:
//!
//! | Kind | Encoding |
//! |---|---|
//! | `None` | null bulk string `$-1\r\n` |
//! | `Ok` | simple string `+PONG\r\n` |
//! | `Error` | error line `-ERR ...\r\n` |
//! | `String`, `Float` | bulk string `$5\r\nhello\r\n` |
//! | `Integer` | integer `:3\r\n` |
//! | `List`, `Hash`, `Set`, `ZSet` | array of bulk strings |

use bytes::Bytes;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command name, always lower-case
    pub command: String,
    /// Arguments following the command name
    pub args: Vec<Bytes>,
}

impl Request {
    pub fn new(command: &str, args: Vec<Bytes>) -> Self {
        Self {
            command: command.to_lowercase(),
            args,
        }
    }

    /// Builds a request from raw words, the first being the command name.
    ///
    /// Returns `None` for an empty word list.
    pub fn from_words(mut words: Vec<Bytes>) -> Option<Self> {
        if words.is_empty() {
            return None;
        }
        let name = words.remove(0);
        Some(Self {
            command: String::from_utf8_lossy(&name).to_lowercase(),
            args: words,
        })
    }

    /// Number of words including the command name.
    pub fn argc(&self) -> usize {
        self.args.len() + 1
    }
}

/// How a reply's arguments are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    None,
    Ok,
    Error,
    String,
    Integer,
    Hash,
    List,
    Set,
    ZSet,
    Float,
}

/// A command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub args: Vec<Bytes>,
}

impl Reply {
    pub fn new(kind: ReplyKind, args: Vec<Bytes>) -> Self {
        Self { kind, args }
    }

    /// The nil reply.
    pub fn nil() -> Self {
        Self::new(ReplyKind::None, Vec::new())
    }

    /// A status line such as `OK` or `PONG`.
    pub fn status(text: &'static str) -> Self {
        Self::new(ReplyKind::Ok, vec![Bytes::from_static(text.as_bytes())])
    }

    pub fn ok() -> Self {
        Self::status("OK")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Error, vec![Bytes::from(message.into())])
    }

    pub fn bulk(value: Bytes) -> Self {
        Self::new(ReplyKind::String, vec![value])
    }

    /// A bulk reply, or nil when there is no value.
    pub fn bulk_or_nil(value: Option<Bytes>) -> Self {
        value.map(Self::bulk).unwrap_or_else(Self::nil)
    }

    pub fn integer(n: i64) -> Self {
        Self::new(ReplyKind::Integer, vec![Bytes::from(n.to_string())])
    }

    /// Integer reply for a count.
    pub fn count(n: usize) -> Self {
        Self::integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// A score, formatted with two fraction digits.
    pub fn float(value: f64) -> Self {
        Self::new(ReplyKind::Float, vec![Bytes::from(format!("{:.2}", value))])
    }

    /// A collection reply (`List`, `Hash`, `Set` or `ZSet`).
    pub fn collection(kind: ReplyKind, items: Vec<Bytes>) -> Self {
        Self::new(kind, items)
    }

    pub fn is_error(&self) -> bool {
        self.kind == ReplyKind::Error
    }

    /// First argument as text, if any.
    pub fn as_str(&self) -> Option<&str> {
        self.args.first().and_then(|arg| std::str::from_utf8(arg).ok())
    }

    /// Value of an `Integer` reply.
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            ReplyKind::Integer => self.as_str()?.parse().ok(),
            _ => None,
        }
    }

    /// Encodes the reply for the wire.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encodes the reply into an existing buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let first = self.args.first().map(|arg| &arg[..]).unwrap_or_default();

        match self.kind {
            ReplyKind::None => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            ReplyKind::Ok => write_line(buf, prefix::SIMPLE_STRING, first),
            ReplyKind::Error => write_line(buf, prefix::ERROR, first),
            ReplyKind::Integer => write_line(buf, prefix::INTEGER, first),
            ReplyKind::String | ReplyKind::Float => write_bulk(buf, first),
            ReplyKind::Hash | ReplyKind::List | ReplyKind::Set | ReplyKind::ZSet => {
                write_array_header(buf, self.args.len());
                for arg in &self.args {
                    write_bulk(buf, arg);
                }
            }
        }
    }
}

fn write_line(buf: &mut Vec<u8>, prefix: u8, text: &[u8]) {
    buf.push(prefix);
    // A line cannot carry CR or LF
    buf.extend(text.iter().map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b }));
    buf.extend_from_slice(CRLF);
}

fn write_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    buf.push(prefix::BULK_STRING);
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

fn write_array_header(buf: &mut Vec<u8>, len: usize) {
    buf.push(prefix::ARRAY);
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_error_encoding() {
        assert_eq!(Reply::ok().encode(), b"+OK\r\n");
        assert_eq!(Reply::status("PONG").encode(), b"+PONG\r\n");
        assert_eq!(
            Reply::error("ERR unknown command 'foo'").encode(),
            b"-ERR unknown command 'foo'\r\n"
        );
    }

    #[test]
    fn test_error_line_cannot_break_framing() {
        assert_eq!(Reply::error("ERR a\r\nb").encode(), b"-ERR a  b\r\n");
    }

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(Reply::nil().encode(), b"$-1\r\n");
        assert_eq!(Reply::integer(-42).encode(), b":-42\r\n");
        assert_eq!(Reply::bulk(Bytes::from("hello")).encode(), b"$5\r\nhello\r\n");
        assert_eq!(Reply::bulk(Bytes::new()).encode(), b"$0\r\n\r\n");
        assert_eq!(Reply::float(1.5).encode(), b"$4\r\n1.50\r\n");
    }

    #[test]
    fn test_collection_encoding() {
        let reply = Reply::collection(
            ReplyKind::Hash,
            vec![Bytes::from("a"), Bytes::from("1")],
        );
        assert_eq!(reply.encode(), b"*2\r\n$1\r\na\r\n$1\r\n1\r\n");
        assert_eq!(Reply::collection(ReplyKind::List, vec![]).encode(), b"*0\r\n");
    }

    #[test]
    fn test_reply_accessors() {
        assert_eq!(Reply::count(7).as_integer(), Some(7));
        assert_eq!(Reply::bulk(Bytes::from("7")).as_integer(), None);
        assert_eq!(Reply::float(2.0).as_str(), Some("2.00"));
        assert!(Reply::error("ERR x").is_error());
        assert_eq!(Reply::bulk_or_nil(None), Reply::nil());
    }

    #[test]
    fn test_request_from_words_lowercases_command() {
        let request = Request::from_words(vec![
            Bytes::from("SeT"),
            Bytes::from("Key"),
            Bytes::from("Value"),
        ])
        .unwrap();

        assert_eq!(request.command, "set");
        assert_eq!(request.args, vec![Bytes::from("Key"), Bytes::from("Value")]);
        assert_eq!(request.argc(), 3);
        assert!(Request::from_words(vec![]).is_none());
    }
}
