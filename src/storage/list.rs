//! Doubly-Linked List
//!
//! The list container behind the `LPUSH`/`RPUSH`/`LRANGE` family of commands.
//!
//! ## Layout
//!
//! Nodes live in a slot arena and refer to their neighbours through stable
//! [`NodeId`] handles instead of pointers:
//!
//! ```text
//!   head                                   tail
//!    │                                      │
//!    ▼                                      ▼
//! ┌──────┐ next ┌──────┐ next ┌──────┐
//! │ id 2 │─────>│ id 0 │─────>│ id 1 │──> None
//! │      │<─────│      │<─────│      │
//! └──────┘ prev └──────┘ prev └──────┘
//! ```
//!
//! Freed slots are recycled, so a handle is only valid until the node it
//! names is removed.
//!
//! ## Indexing
//!
//! Indices may be negative: `-1` is the last element, `-len` the first.
//! Lookups walk from whichever end is closer, so `get(i)` costs
//! `O(min(i, len - i))`.

/// Stable handle to a node of a [`LinkedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node<T> {
    prev: Option<NodeId>,
    next: Option<NodeId>,
    value: T,
}

/// An arena-backed doubly-linked list with O(1) push/pop at both ends.
#[derive(Debug, Clone)]
pub struct LinkedList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of elements in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the first node.
    pub fn front(&self) -> Option<NodeId> {
        self.head
    }

    /// Handle of the last node.
    pub fn back(&self) -> Option<NodeId> {
        self.tail
    }

    /// Handle of the node after `id`.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next)
    }

    /// Handle of the node before `id`.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.prev)
    }

    /// Value stored at `id`, or `None` for a stale handle.
    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.node(id).map(|n| &n.value)
    }

    /// Inserts `value` before the current head.
    pub fn push_front(&mut self, value: T) -> NodeId {
        let id = self.alloc(Node {
            prev: None,
            next: self.head,
            value,
        });

        match self.head {
            Some(old) => self.node_mut_unchecked(old).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
        id
    }

    /// Inserts `value` after the current tail.
    pub fn push_back(&mut self, value: T) -> NodeId {
        let id = self.alloc(Node {
            prev: self.tail,
            next: None,
            value,
        });

        match self.tail {
            Some(old) => self.node_mut_unchecked(old).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        id
    }

    /// Removes and returns the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    /// Removes and returns the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Unlinks the node `id` and returns its value.
    ///
    /// Runs in O(1). Returns `None` if the handle is stale.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let node = self.slots.get_mut(id.0)?.take()?;

        match node.prev {
            Some(prev) => self.node_mut_unchecked(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut_unchecked(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(id.0);
        self.len -= 1;
        Some(node.value)
    }

    /// Translates a possibly negative index into a position in `[0, len)`.
    fn resolve_index(&self, index: i64) -> Option<usize> {
        let len = self.len as i64;
        let index = if index < 0 { len + index } else { index };
        if (0..len).contains(&index) {
            Some(index as usize)
        } else {
            None
        }
    }

    /// Returns true if `index` names an element of the list.
    pub fn test_index(&self, index: i64) -> bool {
        self.resolve_index(index).is_some()
    }

    /// Clamps `index` to the nearest valid position.
    ///
    /// Negative indices are translated first; anything before the head maps
    /// to `0` and anything past the tail maps to `len - 1`. Returns `None`
    /// only for an empty list, which has no valid position.
    pub fn clamp_index(&self, index: i64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let len = self.len as i64;
        let index = if index < 0 { len + index } else { index };
        Some(index.clamp(0, len - 1) as usize)
    }

    /// Finds the node at `index`, walking from the closer end.
    pub fn node_at(&self, index: i64) -> Option<NodeId> {
        let pos = self.resolve_index(index)?;

        if pos <= self.len / 2 {
            let mut cur = self.head?;
            for _ in 0..pos {
                cur = self.next(cur)?;
            }
            Some(cur)
        } else {
            let mut cur = self.tail?;
            for _ in 0..(self.len - 1 - pos) {
                cur = self.prev(cur)?;
            }
            Some(cur)
        }
    }

    /// Returns a reference to the element at `index`.
    pub fn get(&self, index: i64) -> Option<&T> {
        self.node_at(index).and_then(|id| self.value(id))
    }

    /// Returns a mutable reference to the element at `index`.
    pub fn get_mut(&mut self, index: i64) -> Option<&mut T> {
        let id = self.node_at(index)?;
        self.slots
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .map(|n| &mut n.value)
    }

    /// Replaces the element at `index`, returning the previous value.
    pub fn set(&mut self, index: i64, value: T) -> Option<T> {
        self.get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Iterates from head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Links between live nodes always point at occupied slots.
    fn node_mut_unchecked(&mut self, id: NodeId) -> &mut Node<T> {
        match self.slots[id.0].as_mut() {
            Some(node) => node,
            None => unreachable!("list link points at a free slot"),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }
}

impl<T: PartialEq> LinkedList<T> {
    /// Returns the first node holding `value`.
    pub fn find(&self, value: &T) -> Option<NodeId> {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self.node(id)?;
            if &node.value == value {
                return Some(id);
            }
            cursor = node.next;
        }
        None
    }
}

/// Head-to-tail iterator over a [`LinkedList`].
pub struct Iter<'a, T> {
    list: &'a LinkedList<T>,
    cursor: Option<NodeId>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.cursor?)?;
        self.cursor = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> FromIterator<T> for LinkedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = LinkedList::new();
        for value in iter {
            list.push_back(value);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn collect(list: &LinkedList<i32>) -> Vec<i32> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_push_pop_both_ends() {
        let mut list = LinkedList::new();
        list.push_back(2);
        list.push_front(1);
        list.push_back(3);

        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_front(), None);
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn test_negative_indices() {
        let list: LinkedList<i32> = (0..5).collect();

        assert_eq!(list.get(0), Some(&0));
        assert_eq!(list.get(-1), Some(&4));
        assert_eq!(list.get(-5), Some(&0));
        assert_eq!(list.get(3), Some(&3));
        assert_eq!(list.get(5), None);
        assert_eq!(list.get(-6), None);
    }

    #[test]
    fn test_index_helpers() {
        let list: LinkedList<i32> = (0..3).collect();

        assert!(list.test_index(2));
        assert!(list.test_index(-3));
        assert!(!list.test_index(3));
        assert!(!list.test_index(-4));

        assert_eq!(list.clamp_index(-1), Some(2));
        assert_eq!(list.clamp_index(-100), Some(0));
        assert_eq!(list.clamp_index(100), Some(2));

        let empty: LinkedList<i32> = LinkedList::new();
        assert_eq!(empty.clamp_index(0), None);
        assert!(!empty.test_index(0));
    }

    #[test]
    fn test_set_and_find() {
        let mut list: LinkedList<i32> = (0..4).collect();

        assert_eq!(list.set(-1, 42), Some(3));
        assert_eq!(list.set(10, 7), None);
        assert_eq!(collect(&list), vec![0, 1, 2, 42]);

        let id = list.find(&42).unwrap();
        assert_eq!(list.value(id), Some(&42));
        assert_eq!(list.next(id), None);
        assert!(list.find(&99).is_none());
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let mut list: LinkedList<i32> = (0..5).collect();

        let middle = list.node_at(2).unwrap();
        assert_eq!(list.remove(middle), Some(2));
        assert_eq!(collect(&list), vec![0, 1, 3, 4]);

        let head = list.front().unwrap();
        assert_eq!(list.remove(head), Some(0));
        let tail = list.back().unwrap();
        assert_eq!(list.remove(tail), Some(4));

        assert_eq!(collect(&list), vec![1, 3]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.prev(list.front().unwrap()), None);
        assert_eq!(list.next(list.back().unwrap()), None);

        // A stale handle is rejected
        assert_eq!(list.remove(middle), None);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut list = LinkedList::new();
        for i in 0..4 {
            list.push_back(i);
        }
        list.pop_front();
        list.pop_front();
        list.push_back(10);
        list.push_front(11);

        assert_eq!(list.slots.len(), 4);
        assert_eq!(collect(&list), vec![11, 2, 3, 10]);
    }

    #[test]
    fn test_random_push_pop_keeps_ends_consistent() {
        let mut rng = rand::thread_rng();
        let mut list = LinkedList::new();
        let mut model = std::collections::VecDeque::new();
        let (mut pushes, mut pops) = (0usize, 0usize);

        for i in 0..2000 {
            match rng.gen_range(0..4) {
                0 => {
                    list.push_front(i);
                    model.push_front(i);
                    pushes += 1;
                }
                1 => {
                    list.push_back(i);
                    model.push_back(i);
                    pushes += 1;
                }
                2 => {
                    if list.pop_front().is_some() {
                        pops += 1;
                    }
                    model.pop_front();
                }
                _ => {
                    if list.pop_back().is_some() {
                        pops += 1;
                    }
                    model.pop_back();
                }
            }

            assert_eq!(list.len(), pushes - pops);
            assert_eq!(list.get(0), model.front());
            assert_eq!(list.get(-1), model.back());
        }

        assert_eq!(collect(&list), model.into_iter().collect::<Vec<_>>());
    }
}
