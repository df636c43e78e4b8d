//! Storage Module
//!
//! The data engine: typed objects, their container implementations and the
//! keyspace that owns them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Db                                │
//! │   dict: key ──► Object            expires: key ──► ms      │
//! └──────────────────────┬─────────────────────────────────────┘
//!                        │
//!     ┌──────────┬───────┴──┬──────────┬─────────────────┐
//!     ▼          ▼          ▼          ▼                 ▼
//!  String     List       Hash        Set          ZSet (SortedSet)
//!  Bytes   LinkedList   HashMap    HashSet      HashMap + SkipList
//! ```
//!
//! Everything here is single-threaded: the reactor thread owns every
//! [`Db`] and hands it to command handlers by `&mut`.
//!
//! ## Example
//!
//! ```
//! use boltkv::storage::{Db, Object, ObjectKind};
//! use bytes::Bytes;
//!
//! let mut db = Db::new(0);
//! db.set(Bytes::from("name"), Object::create(ObjectKind::String, Bytes::from("value")));
//! assert!(db.contains(b"name"));
//! ```

pub mod db;
pub mod expiry;
pub mod list;
pub mod object;
pub mod skiplist;

pub use db::Db;
pub use expiry::{active_expire_cycle, ExpiryConfig};
pub use list::LinkedList;
pub use object::{Object, ObjectKind, SortedSet};
pub use skiplist::SkipList;
