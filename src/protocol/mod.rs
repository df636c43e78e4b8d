//! Wire Protocol
//!
//! Framing of client requests and encoding of replies.
//!
//! ## Modules
//!
//! - `types`: [`Request`], [`Reply`] and the RESP reply encoding
//! - `parser`: incremental request parser (RESP arrays and inline commands)
//!
//! ## Example
//!
//! ```
//! use boltkv::protocol::{parse_request, Reply};
//! use bytes::Bytes;
//!
//! // Parsing incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (request, consumed) = parse_request(data).unwrap().unwrap();
//! assert_eq!(request.command, "get");
//!
//! // Creating responses
//! let reply = Reply::bulk(Bytes::from("value"));
//! assert_eq!(reply.encode(), b"$5\r\nvalue\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_request, ParseError, ParseResult, RequestParser};
pub use types::{Reply, ReplyKind, Request};
