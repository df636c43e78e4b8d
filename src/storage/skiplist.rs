//! Rank-Indexed Skip List
//!
//! The ordered index behind sorted sets. Entries are ordered by
//! `(score, member)`: ascending score, ties broken by byte-wise member order.
//!
//! ## Structure
//!
//! ```text
//! level 2  HEAD ─────────(3)──────────────> C ──(1)──> None
//! level 1  HEAD ──(1)──> A ──────(2)──────> C ──(1)──> None
//! level 0  HEAD ──(1)──> A ──(1)──> B ──(1)──> C ──(1)──> None
//!                        ▲          │
//!                        └─backward─┘
//! ```
//!
//! Every tier of every node stores a forward handle and a *span*: the number
//! of level-0 positions that link jumps over. Summing spans along a descent
//! yields the 1-based rank of the node reached, which is what makes `rank` and
//! `range_count` O(log n).
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Slot 0 is the
//! sentinel head, which always carries [`MAX_LEVEL`] tiers.
//!
//! ## Uniqueness
//!
//! The list does not look members up by name. Callers must never insert a
//! member that is already present (under any score); `SortedSet` keeps a
//! member→score map and deletes the old entry before re-inserting.

use bytes::Bytes;
use rand::Rng;

/// Maximum number of tiers a node can have.
pub const MAX_LEVEL: usize = 32;

/// Probability of promoting a node to the next tier.
const PROBABILITY: f64 = 0.25;

/// Arena slot of the sentinel head.
const HEAD: usize = 0;

/// Stable handle to a skip list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, Default)]
struct Level {
    forward: Option<usize>,
    span: usize,
}

#[derive(Debug, Clone)]
struct SkipNode {
    member: Bytes,
    score: f64,
    backward: Option<usize>,
    levels: Vec<Level>,
}

/// A skip list of `(score, member)` pairs with per-tier span counters.
#[derive(Debug, Clone)]
pub struct SkipList {
    nodes: Vec<Option<SkipNode>>,
    free: Vec<usize>,
    tail: Option<usize>,
    len: usize,
    level: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    /// Creates an empty skip list with a full-height sentinel head.
    pub fn new() -> Self {
        let head = SkipNode {
            member: Bytes::new(),
            score: 0.0,
            backward: None,
            levels: vec![Level::default(); MAX_LEVEL],
        };

        Self {
            nodes: vec![Some(head)],
            free: Vec::new(),
            tail: None,
            len: 0,
            level: 1,
        }
    }

    /// Number of entries (the sentinel is not counted).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of tiers currently in use.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Lowest-ordered entry.
    pub fn first(&self) -> Option<NodeId> {
        self.forward(HEAD, 0).map(NodeId)
    }

    /// Highest-ordered entry.
    pub fn last(&self) -> Option<NodeId> {
        self.tail.map(NodeId)
    }

    /// Level-0 successor of `id`.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.live(id)?.levels[0].forward.map(NodeId)
    }

    /// Level-0 predecessor of `id`.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.live(id)?.backward.map(NodeId)
    }

    /// Score stored at `id`.
    pub fn score(&self, id: NodeId) -> Option<f64> {
        self.live(id).map(|n| n.score)
    }

    /// Member stored at `id`.
    pub fn member(&self, id: NodeId) -> Option<&Bytes> {
        self.live(id).map(|n| &n.member)
    }

    /// Inserts a new `(score, member)` entry and returns its handle.
    ///
    /// `member` must not already be in the list.
    pub fn insert(&mut self, score: f64, member: Bytes) -> NodeId {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.forward(x, i) {
                if !self.precedes(next, score, &member) {
                    break;
                }
                rank[i] += self.node(x).levels[i].span;
                x = next;
            }
            update[i] = x;
        }

        debug_assert!(
            self.forward(x, 0)
                .map_or(true, |next| !self.matches(next, score, &member)),
            "skip list entry inserted twice"
        );

        let level = random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.node_mut(HEAD).levels[i].span = self.len;
            }
            self.level = level;
        }

        let id = self.alloc(SkipNode {
            member,
            score,
            backward: None,
            levels: vec![Level::default(); level],
        });

        for i in 0..level {
            let prev = self.node(update[i]).levels[i];
            let skipped = rank[0] - rank[i];

            self.node_mut(id).levels[i] = Level {
                forward: prev.forward,
                span: prev.span - skipped,
            };
            self.node_mut(update[i]).levels[i] = Level {
                forward: Some(id),
                span: skipped + 1,
            };
        }

        // Untouched tiers now jump over one more node
        for i in level..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        let backward = (update[0] != HEAD).then_some(update[0]);
        self.node_mut(id).backward = backward;
        match self.node(id).levels[0].forward {
            Some(next) => self.node_mut(next).backward = Some(id),
            None => self.tail = Some(id),
        }

        self.len += 1;
        NodeId(id)
    }

    /// Removes the exact `(score, member)` entry. Returns false if absent.
    pub fn delete(&mut self, score: f64, member: &[u8]) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if !self.precedes(next, score, member) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }

        match self.forward(x, 0) {
            Some(target) if self.matches(target, score, member) => {
                self.unlink(target, &update);
                true
            }
            _ => false,
        }
    }

    fn unlink(&mut self, id: usize, update: &[usize; MAX_LEVEL]) {
        for i in 0..self.level {
            let forward = self.node(update[i]).levels[i].forward;
            if forward == Some(id) {
                let removed = self.node(id).levels[i];
                let prev = &mut self.node_mut(update[i]).levels[i];
                prev.span = prev.span + removed.span - 1;
                prev.forward = removed.forward;
            } else {
                self.node_mut(update[i]).levels[i].span -= 1;
            }
        }

        let (next, backward) = {
            let node = self.node(id);
            (node.levels[0].forward, node.backward)
        };
        match next {
            Some(next) => self.node_mut(next).backward = backward,
            None => self.tail = backward,
        }

        while self.level > 1 && self.forward(HEAD, self.level - 1).is_none() {
            self.level -= 1;
        }

        self.nodes[id] = None;
        self.free.push(id);
        self.len -= 1;
    }

    /// 1-based rank of the `(score, member)` entry, or `None` if absent.
    pub fn rank(&self, score: f64, member: &[u8]) -> Option<usize> {
        let mut rank = 0;
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if !(self.precedes(next, score, member) || self.matches(next, score, member)) {
                    break;
                }
                rank += self.node(x).levels[i].span;
                x = next;
            }

            if x != HEAD && self.matches(x, score, member) {
                return Some(rank);
            }
        }

        None
    }

    /// Number of entries with `min <= score <= max`.
    pub fn range_count(&self, min: f64, max: f64) -> usize {
        let below_min = self.count_while(|score| score < min);
        let up_to_max = self.count_while(|score| score <= max);
        up_to_max.saturating_sub(below_min)
    }

    /// Counts the leading entries whose score satisfies `pred`.
    fn count_while(&self, pred: impl Fn(f64) -> bool) -> usize {
        let mut rank = 0;
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if !pred(self.node(next).score) {
                    break;
                }
                rank += self.node(x).levels[i].span;
                x = next;
            }
        }

        rank
    }

    /// First entry with `score >= min`, provided it is also `<= max`.
    pub fn first_in_range(&self, min: f64, max: f64) -> Option<NodeId> {
        if min > max {
            return None;
        }

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if self.node(next).score >= min {
                    break;
                }
                x = next;
            }
        }

        let candidate = self.forward(x, 0)?;
        (self.node(candidate).score <= max).then_some(NodeId(candidate))
    }

    /// Iterates entries in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.first(),
        }
    }

    #[inline]
    fn forward(&self, id: usize, level: usize) -> Option<usize> {
        self.node(id).levels[level].forward
    }

    /// True if the entry at `id` sorts strictly before `(score, member)`.
    #[inline]
    fn precedes(&self, id: usize, score: f64, member: &[u8]) -> bool {
        let node = self.node(id);
        node.score < score || (node.score == score && node.member.as_ref() < member)
    }

    #[inline]
    fn matches(&self, id: usize, score: f64, member: &[u8]) -> bool {
        let node = self.node(id);
        node.score == score && node.member.as_ref() == member
    }

    fn live(&self, id: NodeId) -> Option<&SkipNode> {
        if id.0 == HEAD {
            return None;
        }
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Links always point at occupied slots.
    fn node(&self, id: usize) -> &SkipNode {
        match self.nodes[id].as_ref() {
            Some(node) => node,
            None => unreachable!("skip list link points at a free slot"),
        }
    }

    fn node_mut(&mut self, id: usize) -> &mut SkipNode {
        match self.nodes[id].as_mut() {
            Some(node) => node,
            None => unreachable!("skip list link points at a free slot"),
        }
    }

    fn alloc(&mut self, node: SkipNode) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }
}

/// Picks a tier count: 1, then +1 with probability 0.25, capped at 32.
fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.gen::<f64>() < PROBABILITY {
        level += 1;
    }
    level
}

/// Ascending iterator over `(member, score)` pairs.
pub struct Iter<'a> {
    list: &'a SkipList,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Bytes, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.list.live(id)?;
        self.cursor = node.levels[0].forward.map(NodeId);
        Some((&node.member, node.score))
    }
}
