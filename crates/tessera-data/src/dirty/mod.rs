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

//! Implements the dense bitset backing all dirty tracking.

/// A dense set of indices over a fixed index space, one bit per index.
///
/// A set bit means "stale: recompute or re-upload before the next use". Marking
/// and testing are O(1); iteration is linear in the number of 64-bit words and
/// yields indices in ascending order.
///
/// Indices must be below [`index_len`](DirtySet::index_len). Out-of-range access
/// trips a debug assertion (`OutOfBounds`) and is ignored in release builds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirtySet {
    words: Vec<u64>,
    len: usize,
}

#[inline]
fn split(index: u32) -> (usize, u64) {
    ((index / 64) as usize, 1u64 << (index % 64))
}

impl DirtySet {
    /// Creates a set over an empty index space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set over `0..len` with every bit clear.
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Size of the index space.
    pub fn index_len(&self) -> usize {
        self.len
    }

    /// Grows or shrinks the index space.
    ///
    /// Growing keeps every bit and zero-extends; shrinking drops the bits at or
    /// past the new length.
    pub fn resize(&mut self, len: usize) {
        self.words.resize(len.div_ceil(64), 0);
        self.len = len;
        let tail = len % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }

    #[inline]
    fn in_bounds(&self, index: u32) -> bool {
        debug_assert!(
            (index as usize) < self.len,
            "OutOfBounds: index {index} outside dirty set of length {}",
            self.len
        );
        (index as usize) < self.len
    }

    /// Marks `index` as dirty. Marking twice is the same as marking once.
    #[inline]
    pub fn mark(&mut self, index: u32) {
        if self.in_bounds(index) {
            let (word, bit) = split(index);
            self.words[word] |= bit;
        }
    }

    /// Returns `true` if `index` is marked.
    #[inline]
    pub fn is_set(&self, index: u32) -> bool {
        if !self.in_bounds(index) {
            return false;
        }
        let (word, bit) = split(index);
        self.words[word] & bit != 0
    }

    /// Clears the mark of `index`.
    #[inline]
    pub fn clear(&mut self, index: u32) {
        if self.in_bounds(index) {
            let (word, bit) = split(index);
            self.words[word] &= !bit;
        }
    }

    /// Clears every mark without releasing the storage.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Marks every index of the space.
    pub fn mark_all(&mut self) {
        self.words.fill(u64::MAX);
        self.resize(self.len);
    }

    /// Adds every mark of `other`. Marks of `other` past this set's length are dropped.
    pub fn union_with(&mut self, other: &DirtySet) {
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word |= *other_word;
        }
        self.resize(self.len);
    }

    /// Number of marked indices.
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns `true` if no index is marked.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Iterates over the marked indices in ascending order.
    ///
    /// The iterator borrows the set, so it observes a consistent snapshot; calling
    /// `iter` again restarts from the lowest index.
    pub fn iter(&self) -> DirtyIter<'_> {
        DirtyIter {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl<'a> IntoIterator for &'a DirtySet {
    type Item = u32;
    type IntoIter = DirtyIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over the marked indices of a [`DirtySet`].
#[derive(Debug, Clone)]
pub struct DirtyIter<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for DirtyIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros();
                self.current &= self.current - 1;
                return Some((self.word_index * 64) as u32 + bit);
            }
            self.word_index += 1;
            self.current = *self.words.get(self.word_index)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_is_idempotent() {
        let mut once = DirtySet::with_len(130);
        once.mark(5);
        let mut twice = DirtySet::with_len(130);
        twice.mark(5);
        twice.mark(5);
        assert_eq!(once, twice);
        assert_eq!(twice.count(), 1);
    }

    #[test]
    fn iteration_is_ascending_across_words() {
        let mut set = DirtySet::with_len(200);
        for index in [199, 3, 64, 63, 128, 0] {
            set.mark(index);
        }
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 3, 63, 64, 128, 199]);
        // Restartable: a second pass yields the same sequence.
        assert_eq!(set.iter().count(), 6);
    }

    #[test]
    fn clear_and_clear_all() {
        let mut set = DirtySet::with_len(10);
        set.mark(1);
        set.mark(2);
        set.clear(1);
        assert!(!set.is_set(1));
        assert!(set.is_set(2));
        set.clear_all();
        assert!(set.is_empty());
        assert_eq!(set.index_len(), 10);
    }

    #[test]
    fn growing_preserves_bits_and_zero_extends() {
        let mut set = DirtySet::with_len(3);
        set.mark(2);
        set.resize(300);
        assert!(set.is_set(2));
        assert_eq!(set.count(), 1);
        assert!(!set.is_set(299));
    }

    #[test]
    fn shrinking_drops_tail_bits() {
        let mut set = DirtySet::with_len(70);
        set.mark(1);
        set.mark(65);
        set.resize(10);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1]);
        set.resize(70);
        assert!(!set.is_set(65));
    }

    #[test]
    fn mark_all_respects_length() {
        let mut set = DirtySet::with_len(67);
        set.mark_all();
        assert_eq!(set.count(), 67);
        assert_eq!(set.iter().last(), Some(66));
    }

    #[test]
    fn union_merges_marks() {
        let mut a = DirtySet::with_len(100);
        let mut b = DirtySet::with_len(100);
        a.mark(1);
        b.mark(99);
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 99]);
    }

    #[test]
    fn empty_set_iterates_nothing() {
        assert_eq!(DirtySet::new().iter().next(), None);
        assert_eq!(DirtySet::with_len(64).iter().next(), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "OutOfBounds")]
    fn out_of_range_mark_asserts_in_debug() {
        let mut set = DirtySet::with_len(4);
        set.mark(4);
    }
}
