//! Command Module
//!
//! Executes parsed requests against a [`Db`](crate::storage::Db) and
//! produces exactly one [`Reply`](crate::protocol::Reply) per request.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ RequestParser   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  CommandTable   │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Arity check  │
//! │  - Dispatch     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │       Db        │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Strings and keys
//! - `PING`, `GET`, `SET`, `DEL`, `EXISTS`, `EXPIRE`, `TTL`
//!
//! ### Lists
//! - `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LINDEX`, `LSET`, `LRANGE`
//!
//! ### Hashes
//! - `HSET`, `HGET`, `HEXISTS`, `HDEL`, `HLEN`, `HGETALL`
//!
//! ### Sets
//! - `SADD`, `SCARD`, `SISMEMBER`, `SMEMBERS`, `SREM`
//!
//! ### Sorted sets
//! - `ZADD`, `ZCARD`, `ZCOUNT`, `ZRANGE`, `ZRANK`, `ZREM`, `ZSCORE`

pub mod handler;
pub mod hash;
pub mod list;
pub mod set;
pub mod string;
pub mod table;
pub mod zset;

pub use handler::{CommandError, CommandResult, Handler};
pub use table::{Command, CommandKind, CommandStats, CommandTable};
