//! Reactor Module
//!
//! A single-threaded event loop multiplexing file descriptors and timers,
//! built directly on Linux `epoll`.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────────────────────────┐
//!                 │             EventLoop<S>               │
//!                 │                                        │
//!   epoll_wait ──►│  file events: fd ──► (mask, rproc,     │
//!                 │                        wproc)          │
//!                 │  time events: [id, when, mode, proc]   │
//!                 └──────────────────┬─────────────────────┘
//!                                    │ &mut EventLoop<S>, &mut S
//!                                    ▼
//!                               callbacks
//! ```
//!
//! The loop is generic over the state `S` it hands to every callback, so it
//! knows nothing about the server that drives it. Callbacks receive the
//! loop itself and may register or delete events while they run.
//!
//! ## Example
//!
//! ```
//! use boltkv::reactor::{EventLoop, TimeMode};
//!
//! let mut el: EventLoop<u32> = EventLoop::new(10).unwrap();
//! el.create_time_event(0, TimeMode::Once, |el, ticks, _id| {
//!     *ticks += 1;
//!     el.stop();
//!     0
//! });
//!
//! let mut ticks = 0;
//! el.run(&mut ticks).unwrap();
//! assert_eq!(ticks, 1);
//! ```

pub mod epoll;
pub mod event_loop;

pub use epoll::{Mask, Poller};
pub use event_loop::{EventLoop, FileProc, TimeEventId, TimeMode, TimeProc};

use std::io;
use thiserror::Error;

/// Errors raised by the event loop.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// `delete_time_event` was given an id that is not registered
    #[error("time event {0} not found")]
    TimeEventNotFound(TimeEventId),

    /// An `epoll` call failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for reactor operations.
pub type ReactorResult<T> = Result<T, ReactorError>;
