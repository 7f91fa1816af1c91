// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A flattened, index-addressed transform hierarchy.
//!
//! Every transform occupies a stable slot identified by a [`TransformIndex`].
//! Parent and child links are stored as indices, so allocating or releasing one
//! slot never changes the identity of another. An instanced scene subtree simply
//! occupies several slots, one per instance.

use crate::dirty::DirtySet;
use std::collections::VecDeque;
use std::fmt;

/// A stable slot in a [`TransformTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformIndex(pub u32);

impl TransformIndex {
    /// The slot as a `usize`, for indexing.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// An error raised when editing the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyError {
    /// The slot is not allocated.
    NotAllocated(TransformIndex),
    /// Re-parenting would make a slot its own ancestor.
    Cycle {
        /// The slot being re-parented.
        index: TransformIndex,
        /// The requested parent, which is a descendant of `index`.
        parent: TransformIndex,
    },
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyError::NotAllocated(index) => {
                write!(f, "Transform slot {} is not allocated", index.0)
            }
            HierarchyError::Cycle { index, parent } => write!(
                f,
                "Cannot parent transform {} to its descendant {}",
                index.0, parent.0
            ),
        }
    }
}

impl std::error::Error for HierarchyError {}

#[derive(Debug, Clone, Default)]
struct Slot {
    parent: Option<TransformIndex>,
    children: Vec<TransformIndex>,
    allocated: bool,
}

/// Stable addressing for the transform hierarchy.
///
/// The tree only knows the shape of the hierarchy. World matrices are computed by
/// the caller, driven by the stale list returned from
/// [`propagate_dirty`](TransformTree::propagate_dirty).
#[derive(Debug, Default)]
pub struct TransformTree {
    slots: Vec<Slot>,
    free: Vec<TransformIndex>,
    live: usize,
}

impl TransformTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a root slot. Released slots are reused first.
    pub fn allocate(&mut self) -> TransformIndex {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index.as_usize()] = Slot {
                allocated: true,
                ..Slot::default()
            };
            return index;
        }
        let index = TransformIndex(self.slots.len() as u32);
        self.slots.push(Slot {
            allocated: true,
            ..Slot::default()
        });
        index
    }

    /// Reserves a slot parented to `parent`.
    pub fn allocate_child(
        &mut self,
        parent: TransformIndex,
    ) -> Result<TransformIndex, HierarchyError> {
        self.check(parent)?;
        let index = self.allocate();
        self.link(index, parent);
        Ok(index)
    }

    /// Frees `index` for reuse. Its children become roots.
    ///
    /// The caller guarantees no observer attachment still refers to `index`.
    pub fn release(&mut self, index: TransformIndex) -> Result<(), HierarchyError> {
        self.check(index)?;
        self.unlink(index);
        let children = std::mem::take(&mut self.slots[index.as_usize()].children);
        for child in children {
            self.slots[child.as_usize()].parent = None;
        }
        self.slots[index.as_usize()].allocated = false;
        self.free.push(index);
        self.live -= 1;
        Ok(())
    }

    /// Re-parents `index`, or makes it a root when `parent` is `None`.
    pub fn set_parent(
        &mut self,
        index: TransformIndex,
        parent: Option<TransformIndex>,
    ) -> Result<(), HierarchyError> {
        self.check(index)?;
        if let Some(parent) = parent {
            self.check(parent)?;
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                if ancestor == index {
                    return Err(HierarchyError::Cycle { index, parent });
                }
                cursor = self.slots[ancestor.as_usize()].parent;
            }
        }
        self.unlink(index);
        if let Some(parent) = parent {
            self.link(index, parent);
        }
        Ok(())
    }

    fn check(&self, index: TransformIndex) -> Result<(), HierarchyError> {
        match self.slots.get(index.as_usize()) {
            Some(slot) if slot.allocated => Ok(()),
            _ => Err(HierarchyError::NotAllocated(index)),
        }
    }

    fn link(&mut self, index: TransformIndex, parent: TransformIndex) {
        self.slots[index.as_usize()].parent = Some(parent);
        self.slots[parent.as_usize()].children.push(index);
    }

    fn unlink(&mut self, index: TransformIndex) {
        if let Some(parent) = self.slots[index.as_usize()].parent.take() {
            self.slots[parent.as_usize()]
                .children
                .retain(|&child| child != index);
        }
    }

    /// The parent of `index`, if any.
    pub fn parent(&self, index: TransformIndex) -> Option<TransformIndex> {
        self.slots.get(index.as_usize()).and_then(|slot| slot.parent)
    }

    /// The children of `index` in insertion order.
    pub fn children(&self, index: TransformIndex) -> &[TransformIndex] {
        self.slots
            .get(index.as_usize())
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` if `index` is allocated.
    pub fn is_allocated(&self, index: TransformIndex) -> bool {
        self.check(index).is_ok()
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no slot is allocated.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Size of the slot index space; dirty sets tracking this tree use this length.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over allocated slots without a parent.
    pub fn roots(&self) -> impl Iterator<Item = TransformIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.allocated && slot.parent.is_none())
            .map(|(i, _)| TransformIndex(i as u32))
    }

    /// Number of ancestors of `index`.
    pub fn depth(&self, index: TransformIndex) -> usize {
        std::iter::successors(self.parent(index), |&p| self.parent(p)).count()
    }

    fn has_marked_ancestor(&self, index: TransformIndex, dirty: &DirtySet) -> bool {
        std::iter::successors(self.parent(index), |&p| self.parent(p))
            .any(|ancestor| dirty.is_set(ancestor.0))
    }

    /// Extends the marks of `dirty` to every descendant of a marked slot.
    ///
    /// Returns every stale slot ordered parent-before-child, ready for a single
    /// world-matrix recomputation pass. Marks on released slots are cleared.
    pub fn propagate_dirty(&self, dirty: &mut DirtySet) -> Vec<TransformIndex> {
        if dirty.index_len() < self.capacity() {
            dirty.resize(self.capacity());
        }

        let mut seeds = Vec::new();
        let mut released = Vec::new();
        for raw in dirty.iter() {
            let index = TransformIndex(raw);
            if !self.is_allocated(index) {
                released.push(raw);
            } else if !self.has_marked_ancestor(index, dirty) {
                seeds.push(index);
            }
        }
        for raw in released {
            dirty.clear(raw);
        }

        let mut stale = Vec::with_capacity(dirty.count());
        let mut queue = VecDeque::new();
        for seed in seeds {
            queue.push_back(seed);
            while let Some(index) = queue.pop_front() {
                dirty.mark(index.0);
                stale.push(index);
                queue.extend(self.children(index).iter().copied());
            }
        }

        log::trace!(
            "TransformTree: {} stale transforms after propagation.",
            stale.len()
        );
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slots_are_reused() {
        let mut tree = TransformTree::new();
        let a = tree.allocate();
        let b = tree.allocate();
        tree.release(a).unwrap();
        assert!(!tree.is_allocated(a));
        let c = tree.allocate();
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.capacity(), 2);
    }

    #[test]
    fn release_orphans_children() {
        let mut tree = TransformTree::new();
        let root = tree.allocate();
        let child = tree.allocate_child(root).unwrap();
        tree.release(root).unwrap();
        assert_eq!(tree.parent(child), None);
        assert_eq!(tree.roots().collect::<Vec<_>>(), vec![child]);
        assert_eq!(
            tree.release(root),
            Err(HierarchyError::NotAllocated(root))
        );
    }

    #[test]
    fn set_parent_moves_between_parents() {
        let mut tree = TransformTree::new();
        let a = tree.allocate();
        let b = tree.allocate();
        let c = tree.allocate_child(a).unwrap();
        tree.set_parent(c, Some(b)).unwrap();
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[c]);
        assert_eq!(tree.depth(c), 1);
        tree.set_parent(c, None).unwrap();
        assert_eq!(tree.parent(c), None);
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut tree = TransformTree::new();
        let a = tree.allocate();
        let b = tree.allocate_child(a).unwrap();
        let c = tree.allocate_child(b).unwrap();
        assert_eq!(
            tree.set_parent(a, Some(c)),
            Err(HierarchyError::Cycle {
                index: a,
                parent: c
            })
        );
        assert_eq!(
            tree.set_parent(a, Some(a)),
            Err(HierarchyError::Cycle {
                index: a,
                parent: a
            })
        );
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn propagation_marks_descendants_parent_first() {
        let mut tree = TransformTree::new();
        let root = tree.allocate();
        let arm = tree.allocate_child(root).unwrap();
        let hand = tree.allocate_child(arm).unwrap();
        let other = tree.allocate();

        let mut dirty = DirtySet::with_len(tree.capacity());
        dirty.mark(hand.0);
        dirty.mark(root.0);

        let stale = tree.propagate_dirty(&mut dirty);
        assert_eq!(stale, vec![root, arm, hand]);
        assert!(dirty.is_set(arm.0));
        assert!(!dirty.is_set(other.0));
    }

    #[test]
    fn propagation_clears_released_slots() {
        let mut tree = TransformTree::new();
        let a = tree.allocate();
        let b = tree.allocate();
        let mut dirty = DirtySet::with_len(tree.capacity());
        dirty.mark(a.0);
        dirty.mark(b.0);
        tree.release(a).unwrap();

        assert_eq!(tree.propagate_dirty(&mut dirty), vec![b]);
        assert!(!dirty.is_set(a.0));
    }

    #[test]
    fn propagation_grows_a_short_dirty_set() {
        let mut tree = TransformTree::new();
        let mut dirty = DirtySet::new();
        let a = tree.allocate();
        let b = tree.allocate_child(a).unwrap();
        dirty.resize(1);
        dirty.mark(a.0);
        assert_eq!(tree.propagate_dirty(&mut dirty), vec![a, b]);
        assert_eq!(dirty.index_len(), 2);
    }
}
