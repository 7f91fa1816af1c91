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

use std::sync::Arc;
use tessera_core::utils::align_up;

/// Alignment of an entry when none is given: one 32-bit scalar.
const DEFAULT_ENTRY_ALIGNMENT: u64 = 4;

/// Position of an entry inside its [`ParameterLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u32);

/// One named parameter inside a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    name: String,
    offset: u64,
    size: u64,
}

impl ParameterEntry {
    /// Name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset from the start of the container.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// The byte layout of a parameter group.
///
/// A layout is shared (through an `Arc`) by every container using it; entry order
/// is byte order. Values are little-endian, floats are 4-byte aligned and
/// matrices are column-major, as the consuming shaders expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    label: String,
    entries: Vec<ParameterEntry>,
    size: u64,
}

impl ParameterLayout {
    /// Starts describing a layout.
    pub fn builder(label: impl Into<String>) -> ParameterLayoutBuilder {
        ParameterLayoutBuilder {
            label: label.into(),
            entries: Vec::new(),
            cursor: 0,
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total bytes of one container using this layout.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the layout has no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry.
    pub fn entry(&self, id: EntryId) -> Option<&ParameterEntry> {
        self.entries.get(id.0 as usize)
    }

    /// Finds an entry by name.
    pub fn entry_id(&self, name: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(|i| EntryId(i as u32))
    }

    /// Iterates over the entries in byte order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &ParameterEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (EntryId(i as u32), entry))
    }
}

/// Builder for [`ParameterLayout`].
#[derive(Debug)]
pub struct ParameterLayoutBuilder {
    label: String,
    entries: Vec<ParameterEntry>,
    cursor: u64,
}

impl ParameterLayoutBuilder {
    /// Appends an entry aligned to 4 bytes.
    pub fn entry(self, name: impl Into<String>, size: u64) -> Self {
        self.entry_aligned(name, size, DEFAULT_ENTRY_ALIGNMENT)
    }

    /// Appends an entry at the next multiple of `alignment` (a power of two).
    ///
    /// Larger alignments model shader packing rules, e.g. 16 bytes for a `vec3`
    /// in a uniform block; the skipped bytes stay zero and are never dirtied.
    pub fn entry_aligned(mut self, name: impl Into<String>, size: u64, alignment: u64) -> Self {
        debug_assert!(size > 0, "parameter entries cannot be empty");
        debug_assert!(
            size % DEFAULT_ENTRY_ALIGNMENT == 0,
            "parameter entries hold whole 32-bit scalars"
        );
        let offset = align_up(self.cursor, alignment.max(DEFAULT_ENTRY_ALIGNMENT));
        self.entries.push(ParameterEntry {
            name: name.into(),
            offset,
            size,
        });
        self.cursor = offset + size;
        self
    }

    /// Finishes the layout.
    pub fn build(self) -> Arc<ParameterLayout> {
        Arc::new(ParameterLayout {
            label: self.label,
            entries: self.entries,
            size: self.cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_packed_in_order() {
        let layout = ParameterLayout::builder("Instance")
            .entry("world", 64)
            .entry("color", 16)
            .build();
        assert_eq!(layout.size(), 80);
        assert_eq!(layout.entry(EntryId(1)).unwrap().offset(), 64);
        assert_eq!(layout.entry_id("color"), Some(EntryId(1)));
        assert_eq!(layout.entry_id("missing"), None);
    }

    #[test]
    fn aligned_entries_leave_gaps() {
        let layout = ParameterLayout::builder("Light")
            .entry("intensity", 4)
            .entry_aligned("direction", 12, 16)
            .entry("range", 4)
            .build();
        let offsets: Vec<u64> = layout.entries().map(|(_, e)| e.offset()).collect();
        assert_eq!(offsets, vec![0, 16, 28]);
        assert_eq!(layout.size(), 32);
    }
}
