//! Connection Module
//!
//! Per-client socket state for the reactor-driven server. A connection is
//! not a task or a thread: it is a [`Client`] value owned by the server and
//! touched only from the reactor's read and write callbacks.
//!
//! ## Lifecycle
//!
//! ```text
//! accept() ──> Client::new (non-blocking) ──> register READABLE
//!                                                  │
//!            ┌─────────────────────────────────────┘
//!            ▼
//!     read_from_socket ──> next_request* ──> execute ──> queue_reply
//!                                                            │
//!                                           register WRITABLE│
//!                                                            ▼
//!                                   flush ──> drop WRITABLE once drained
//!
//! EOF / I/O error ──> deregister fd ──> drop Client (closes socket)
//! ```

pub mod client;

pub use client::{Client, ConnectionError, ConnectionStats, MAX_QUERY_BUFFER};
