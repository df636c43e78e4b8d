//! Stored Values
//!
//! Every key in the keyspace owns exactly one [`Object`]. The enum is closed:
//! command handlers match on it, and anything that is not the variant they
//! expect is a `WRONGTYPE` error.

use crate::storage::list::LinkedList;
use crate::storage::skiplist::SkipList;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// The kind tag of an [`Object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    String,
    List,
    Hash,
    Set,
    ZSet,
}

/// A value stored under a key.
#[derive(Debug, Clone)]
pub enum Object {
    String(Bytes),
    List(LinkedList<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(SortedSet),
}

impl Object {
    /// Allocates an object of the given kind.
    ///
    /// Strings take `value`; containers ignore it and start empty.
    pub fn create(kind: ObjectKind, value: Bytes) -> Self {
        match kind {
            ObjectKind::String => Object::String(value),
            ObjectKind::List => Object::List(LinkedList::new()),
            ObjectKind::Hash => Object::Hash(HashMap::new()),
            ObjectKind::Set => Object::Set(HashSet::new()),
            ObjectKind::ZSet => Object::ZSet(SortedSet::new()),
        }
    }

    /// Allocates an empty container of the given kind.
    pub fn empty(kind: ObjectKind) -> Self {
        Self::create(kind, Bytes::new())
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::String(_) => ObjectKind::String,
            Object::List(_) => ObjectKind::List,
            Object::Hash(_) => ObjectKind::Hash,
            Object::Set(_) => ObjectKind::Set,
            Object::ZSet(_) => ObjectKind::ZSet,
        }
    }

    /// Name reported to clients (`string`, `list`, ...).
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ObjectKind::String => "string",
            ObjectKind::List => "list",
            ObjectKind::Hash => "hash",
            ObjectKind::Set => "set",
            ObjectKind::ZSet => "zset",
        }
    }

    /// True for a container with no elements left. Strings are never empty
    /// in this sense.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Object::String(_) => false,
            Object::List(list) => list.is_empty(),
            Object::Hash(hash) => hash.is_empty(),
            Object::Set(set) => set.is_empty(),
            Object::ZSet(zset) => zset.is_empty(),
        }
    }
}

/// A sorted set: member→score map plus a skip list ordered by score.
///
/// The map answers membership and score lookups in O(1); the skip list
/// answers rank and range queries. Both are only ever mutated together.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    dict: HashMap<Bytes, f64>,
    zsl: SkipList,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Adds `member` or moves it to `score`.
    ///
    /// Returns true if the member is new.
    pub fn add(&mut self, score: f64, member: Bytes) -> bool {
        match self.dict.get(&member).copied() {
            Some(old) if old == score => false,
            Some(old) => {
                self.zsl.delete(old, &member);
                self.zsl.insert(score, member.clone());
                self.dict.insert(member, score);
                false
            }
            None => {
                self.zsl.insert(score, member.clone());
                self.dict.insert(member, score);
                true
            }
        }
    }

    /// Removes `member`. Returns true if it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.dict.remove(member) {
            Some(score) => {
                self.zsl.delete(score, member);
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.dict.get(member).copied()
    }

    /// 0-based position of `member` in ascending order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.zsl.rank(score, member).map(|rank| rank - 1)
    }

    /// Number of members with `min <= score <= max`.
    pub fn count(&self, min: f64, max: f64) -> usize {
        self.zsl.range_count(min, max)
    }

    /// Members with `min <= score <= max`, ascending.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        let mut out = Vec::new();
        let mut cursor = self.zsl.first_in_range(min, max);

        while let Some(id) = cursor {
            match (self.zsl.member(id), self.zsl.score(id)) {
                (Some(member), Some(score)) if score <= max => {
                    out.push((member.clone(), score));
                }
                _ => break,
            }
            cursor = self.zsl.next(id);
        }

        out
    }

    /// Read access to the ordering index.
    pub fn skiplist(&self) -> &SkipList {
        &self.zsl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_allocates_per_kind() {
        let s = Object::create(ObjectKind::String, Bytes::from("v"));
        assert!(matches!(&s, Object::String(v) if v == "v"));

        for kind in [
            ObjectKind::List,
            ObjectKind::Hash,
            ObjectKind::Set,
            ObjectKind::ZSet,
        ] {
            let obj = Object::create(kind, Bytes::from("ignored"));
            assert_eq!(obj.kind(), kind);
            assert!(obj.is_empty_container());
        }

        assert_eq!(Object::empty(ObjectKind::ZSet).type_name(), "zset");
        assert!(!s.is_empty_container());
    }

    #[test]
    fn test_sorted_set_keeps_map_and_index_in_step() {
        let mut zset = SortedSet::new();
        assert!(zset.add(1.5, Bytes::from("a")));
        assert!(zset.add(2.5, Bytes::from("b")));
        assert!(!zset.add(2.5, Bytes::from("b")));

        assert_eq!(zset.len(), 2);
        assert_eq!(zset.skiplist().len(), 2);
        assert_eq!(zset.score(b"a"), Some(1.5));
        assert_eq!(zset.rank(b"b"), Some(1));

        // Moving a member re-sorts it
        assert!(!zset.add(0.5, Bytes::from("b")));
        assert_eq!(zset.rank(b"b"), Some(0));
        assert_eq!(zset.rank(b"a"), Some(1));
        assert_eq!(zset.skiplist().len(), 2);

        assert!(zset.remove(b"a"));
        assert!(!zset.remove(b"a"));
        assert_eq!(zset.rank(b"a"), None);
        assert_eq!(zset.skiplist().len(), 1);
    }

    #[test]
    fn test_range_by_score() {
        let mut zset = SortedSet::new();
        zset.add(1.5, Bytes::from("a"));
        zset.add(2.5, Bytes::from("b"));
        zset.add(4.0, Bytes::from("c"));

        let members: Vec<_> = zset
            .range_by_score(1.0, 3.0)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(members, vec![Bytes::from("a"), Bytes::from("b")]);

        assert_eq!(zset.count(1.0, 3.0), 2);
        assert_eq!(zset.count(f64::NEG_INFINITY, f64::INFINITY), 3);
        assert!(zset.range_by_score(5.0, 6.0).is_empty());
    }
}
