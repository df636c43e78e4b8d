//! # boltkv - A Single-Threaded In-Memory Key-Value Database
//!
//! boltkv is a Redis-style key-value server built the classic way: one
//! thread, one `epoll` reactor, and command handlers that run to completion
//! against plain data structures with no locking.
//!
//! ## Features
//!
//! - **Event-driven**: a hand-written reactor over Linux `epoll` multiplexes
//!   client sockets and timers
//! - **Typed values**: strings, lists, hashes, sets and sorted sets
//! - **TTL Support**: lazy expiry on access plus a sampled active sweep
//! - **RESP**: any Redis client (`redis-cli`) can talk to it
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         EventLoop<Server>                        │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐      │
//! │  │  Listener   │───>│   Client    │───>│   CommandTable   │      │
//! │  │ (READABLE)  │    │ read/parse  │    │ lookup + arity   │      │
//! │  └─────────────┘    │ queue/flush │    └────────┬─────────┘      │
//! │                     └─────────────┘             │                │
//! │                                                 ▼                │
//! │  ┌─────────────┐          ┌──────────────────────────────────┐   │
//! │  │ server_cron │─────────>│  Db 0   Db 1   ...   Db N-1      │   │
//! │  │ (time event)│  expire  │  dict: key → Object              │   │
//! │  └─────────────┘          │  expires: key → deadline (ms)    │   │
//! │                           └──────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use boltkv::{Server, ServerConfig};
//!
//! let server = Server::bind(ServerConfig::default())?;
//! server.serve()?;
//! # Ok::<(), boltkv::ServerError>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`reactor`]: the `epoll` event loop (file and time events)
//! - [`storage`]: keyspaces, the object model, linked list and skip list
//! - [`commands`]: the command table and per-type handlers
//! - [`protocol`]: request parsing and reply encoding
//! - [`connection`]: per-client socket buffers
//! - [`server`]: glue between all of the above
//! - [`config`]: command-line configuration

pub mod clock;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod reactor;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandTable};
pub use config::{CliAction, ConfigError, ServerConfig};
pub use connection::{Client, ConnectionError, ConnectionStats};
pub use protocol::{ParseError, Reply, ReplyKind, Request, RequestParser};
pub use reactor::{EventLoop, Mask, ReactorError, TimeEventId, TimeMode};
pub use server::{Server, ServerError};
pub use storage::{Db, ExpiryConfig, Object, ObjectKind, SortedSet};

/// The default port boltkv listens on
pub const DEFAULT_PORT: u16 = 9736;

/// The default host boltkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of boltkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
