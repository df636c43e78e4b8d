//! Shared plumbing for command handlers: the error type and argument
//! parsing helpers.
//!
//! Every handler has the same shape:
//!
//! ```text
//! fn(&mut Db, &Request) -> Result<Reply, CommandError>
//! ```
//!
//! Arity has already been checked by the table when a handler runs, so
//! handlers index `request.args` directly for the fixed positions.

use crate::protocol::{Reply, Request};
use crate::storage::Db;
use thiserror::Error;

/// Errors a command can fail with. The `Display` text is what the client
/// receives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR index out of range")]
    IndexOutOfRange,
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::error(err.to_string())
    }
}

/// Result type returned by command handlers.
pub type CommandResult = Result<Reply, CommandError>;

/// Signature shared by every command handler.
pub type Handler = fn(&mut Db, &Request) -> CommandResult;

/// Parses a signed 64-bit integer argument.
pub fn parse_integer(arg: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)
}

/// Parses a float argument. `inf`, `+inf` and `-inf` are accepted; NaN is
/// not.
pub fn parse_float(arg: &[u8]) -> Result<f64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
        .ok_or(CommandError::NotFloat)
}

/// Checks that the arguments after the key form complete pairs
/// (`HSET key f v [f v ...]`, `ZADD key s m [s m ...]`).
pub fn check_pairs(request: &Request) -> Result<(), CommandError> {
    if request.args.len() % 2 == 1 {
        Ok(())
    } else {
        Err(CommandError::WrongArity(request.command.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CommandError::WrongArity("get".into()).to_string(),
            "ERR wrong number of arguments for 'get' command"
        );
        assert_eq!(
            CommandError::UnknownCommand("foo".into()).to_string(),
            "ERR unknown command 'foo'"
        );
        assert_eq!(
            Reply::from(CommandError::WrongType),
            Reply::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(b"42"), Ok(42));
        assert_eq!(parse_integer(b"-7"), Ok(-7));
        assert_eq!(parse_integer(b"4.2"), Err(CommandError::NotInteger));
        assert_eq!(parse_integer(b""), Err(CommandError::NotInteger));
        assert_eq!(
            parse_integer(b"99999999999999999999"),
            Err(CommandError::NotInteger)
        );
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(b"1.5"), Ok(1.5));
        assert_eq!(parse_float(b"-3"), Ok(-3.0));
        assert_eq!(parse_float(b"-inf"), Ok(f64::NEG_INFINITY));
        assert_eq!(parse_float(b"+inf"), Ok(f64::INFINITY));
        assert_eq!(parse_float(b"nan"), Err(CommandError::NotFloat));
        assert_eq!(parse_float(b"abc"), Err(CommandError::NotFloat));
    }

    #[test]
    fn test_check_pairs() {
        let even = Request::new("hset", vec![Bytes::from("h"), Bytes::from("a"), Bytes::from("1")]);
        let odd = Request::new("hset", vec![Bytes::from("h"), Bytes::from("a")]);

        assert!(check_pairs(&even).is_ok());
        assert_eq!(
            check_pairs(&odd),
            Err(CommandError::WrongArity("hset".into()))
        );
    }
}
