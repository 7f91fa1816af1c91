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

use super::error::CacheError;
use super::layout::{EntryId, ParameterLayout};
use super::stream::{ParameterCacheStream, StreamReceipt, StreamedEntry};
use crate::dirty::DirtySet;
use std::sync::Arc;
use tessera_core::renderer::{BufferRange, MIN_UNIFORM_ALIGNMENT};
use tessera_core::settings::{CacheCapacity, StreamSettings};
use tessera_core::utils::align_up;

/// Identifies a parameter container registered with a [`ParameterCache`].
///
/// Ids are assigned in registration order and are never reused, even after
/// [`ParameterCache::remove_container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u32);

#[derive(Debug)]
struct ContainerSlot {
    layout: Arc<ParameterLayout>,
    base: u64,
    dirty: DirtySet,
    versions: Vec<u64>,
    live: bool,
}

impl ContainerSlot {
    fn touch(&mut self, entry: EntryId) {
        self.dirty.mark(entry.0);
        let version = &mut self.versions[entry.0 as usize];
        *version = version.wrapping_add(1);
    }
}

/// The canonical host copy of every parameter container of a rendering context.
///
/// All containers live in one contiguous arena laid out exactly like the device
/// buffer, so a dirty byte range of the cache is also its destination range on the
/// device.
#[derive(Debug)]
pub struct ParameterCache {
    storage: Vec<u8>,
    containers: Vec<ContainerSlot>,
    dirty_containers: DirtySet,
    capacity: CacheCapacity,
    capacity_bytes: u64,
    alignment: u64,
}

impl ParameterCache {
    /// Creates an empty cache with the default container alignment.
    pub fn new(capacity: CacheCapacity) -> Self {
        Self::with_alignment(capacity, MIN_UNIFORM_ALIGNMENT as u64)
    }

    /// Creates an empty cache whose container base offsets are multiples of `alignment`.
    pub fn with_alignment(capacity: CacheCapacity, alignment: u64) -> Self {
        debug_assert!(alignment.is_power_of_two());
        Self {
            storage: Vec::new(),
            containers: Vec::new(),
            dirty_containers: DirtySet::new(),
            capacity,
            capacity_bytes: capacity.initial_bytes(),
            alignment,
        }
    }

    /// Creates an empty cache configured from `settings`.
    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::with_alignment(settings.capacity, settings.container_alignment as u64)
    }

    /// Allocates storage for a new container using `layout`.
    ///
    /// The new container starts fully dirty so its zeroed bytes reach the device.
    pub fn register_container(
        &mut self,
        layout: &Arc<ParameterLayout>,
    ) -> Result<ContainerId, CacheError> {
        let base = align_up(self.storage.len() as u64, self.alignment);
        let end = base + layout.size();
        if end > self.capacity_bytes {
            match self.capacity {
                CacheCapacity::Fixed { bytes } => {
                    return Err(CacheError::CapacityExceeded {
                        requested: end,
                        capacity: bytes,
                    });
                }
                CacheCapacity::Growable { .. } => {
                    let mut grown = self.capacity_bytes.max(self.alignment);
                    while grown < end {
                        grown *= 2;
                    }
                    log::debug!(
                        "ParameterCache: growing from {} to {} bytes.",
                        self.capacity_bytes,
                        grown
                    );
                    self.capacity_bytes = grown;
                }
            }
        }
        self.storage.resize(end as usize, 0);

        let id = ContainerId(self.containers.len() as u32);
        let mut dirty = DirtySet::with_len(layout.len());
        dirty.mark_all();
        self.containers.push(ContainerSlot {
            layout: Arc::clone(layout),
            base,
            dirty,
            versions: vec![0; layout.len()],
            live: true,
        });
        self.dirty_containers.resize(self.containers.len());
        self.dirty_containers.mark(id.0);

        log::trace!(
            "ParameterCache: registered container {} ('{}') at [{}, {}).",
            id.0,
            layout.label(),
            base,
            end
        );
        Ok(id)
    }

    /// Retires a container. Its id and byte range are not reused.
    pub fn remove_container(&mut self, container: ContainerId) -> Result<(), CacheError> {
        let slot = self.slot_mut(container)?;
        slot.live = false;
        slot.dirty.clear_all();
        self.dirty_containers.clear(container.0);
        Ok(())
    }

    fn slot(&self, container: ContainerId) -> Result<&ContainerSlot, CacheError> {
        self.containers
            .get(container.0 as usize)
            .filter(|slot| slot.live)
            .ok_or(CacheError::UnknownContainer(container))
    }

    fn slot_mut(&mut self, container: ContainerId) -> Result<&mut ContainerSlot, CacheError> {
        self.containers
            .get_mut(container.0 as usize)
            .filter(|slot| slot.live)
            .ok_or(CacheError::UnknownContainer(container))
    }

    /// Overwrites one entry and marks it dirty.
    ///
    /// `bytes` must be exactly as long as the entry; otherwise the entry is left
    /// unchanged and [`CacheError::SizeMismatch`] is returned.
    pub fn set_entry(
        &mut self,
        container: ContainerId,
        entry: EntryId,
        bytes: &[u8],
    ) -> Result<(), CacheError> {
        let slot = self
            .containers
            .get_mut(container.0 as usize)
            .filter(|slot| slot.live)
            .ok_or(CacheError::UnknownContainer(container))?;
        let param = slot
            .layout
            .entry(entry)
            .ok_or(CacheError::UnknownEntry { container, entry })?;
        if bytes.len() as u64 != param.size() {
            return Err(CacheError::SizeMismatch {
                container,
                entry,
                expected: param.size(),
                actual: bytes.len() as u64,
            });
        }
        let start = (slot.base + param.offset()) as usize;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
        slot.touch(entry);
        self.dirty_containers.mark(container.0);
        Ok(())
    }

    /// Writes a plain-old-data value, e.g. `[f32; 16]` for a column-major matrix.
    pub fn set_entry_pod<T: bytemuck::Pod>(
        &mut self,
        container: ContainerId,
        entry: EntryId,
        value: &T,
    ) -> Result<(), CacheError> {
        self.set_entry(container, entry, bytemuck::bytes_of(value))
    }

    /// The current bytes of one entry.
    pub fn entry_bytes(&self, container: ContainerId, entry: EntryId) -> Result<&[u8], CacheError> {
        let slot = self.slot(container)?;
        let param = slot
            .layout
            .entry(entry)
            .ok_or(CacheError::UnknownEntry { container, entry })?;
        let start = (slot.base + param.offset()) as usize;
        Ok(&self.storage[start..start + param.size() as usize])
    }

    /// The current bytes of a whole container, padding included.
    pub fn container_bytes(&self, container: ContainerId) -> Result<&[u8], CacheError> {
        let range = self.container_range(container)?;
        Ok(&self.storage[range.offset as usize..range.end() as usize])
    }

    /// The byte range of a container inside the cache and the device buffer.
    pub fn container_range(&self, container: ContainerId) -> Result<BufferRange, CacheError> {
        let slot = self.slot(container)?;
        Ok(BufferRange::new(slot.base, slot.layout.size()))
    }

    /// The layout of a container.
    pub fn layout(&self, container: ContainerId) -> Result<&Arc<ParameterLayout>, CacheError> {
        self.slot(container).map(|slot| &slot.layout)
    }

    /// Returns `true` if the entry waits to be streamed. Unknown entries are never dirty.
    pub fn is_dirty(&self, container: ContainerId, entry: EntryId) -> bool {
        self.slot(container)
            .map(|slot| (entry.0 as usize) < slot.layout.len() && slot.dirty.is_set(entry.0))
            .unwrap_or(false)
    }

    /// Marks every entry of every live container dirty, e.g. after the device buffer
    /// was recreated.
    pub fn mark_all_dirty(&mut self) {
        for (index, slot) in self.containers.iter_mut().enumerate() {
            if !slot.live {
                continue;
            }
            for entry in 0..slot.layout.len() as u32 {
                slot.touch(EntryId(entry));
            }
            self.dirty_containers.mark(index as u32);
        }
    }

    /// Number of dirty entries over all containers.
    pub fn dirty_entry_count(&self) -> usize {
        self.dirty_containers
            .iter()
            .map(|index| self.containers[index as usize].dirty.count())
            .sum()
    }

    /// Number of live containers.
    pub fn container_count(&self) -> usize {
        self.containers.iter().filter(|slot| slot.live).count()
    }

    /// Size the device buffer must have to mirror this cache.
    pub fn required_size(&self) -> u64 {
        self.capacity_bytes
    }

    /// Bytes of the arena in use, removed containers included.
    pub fn used_bytes(&self) -> u64 {
        self.storage.len() as u64
    }

    /// The whole arena.
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    /// Collects every dirty entry into write descriptors.
    ///
    /// Containers are visited in registration order and entries in layout order.
    /// Dirty entries of the same container whose bytes touch are coalesced into a
    /// single descriptor. Nothing is cleared until the stream's receipt is passed to
    /// [`commit`](ParameterCache::commit).
    pub fn stream_dirty(&self) -> ParameterCacheStream<'_> {
        let mut runs: Vec<(ContainerId, BufferRange)> = Vec::new();
        let mut streamed = Vec::with_capacity(self.dirty_entry_count());

        for index in self.dirty_containers.iter() {
            let container = ContainerId(index);
            let slot = &self.containers[index as usize];
            let mut current: Option<BufferRange> = None;

            for raw in slot.dirty.iter() {
                let entry = EntryId(raw);
                let Some(param) = slot.layout.entry(entry) else {
                    continue;
                };
                streamed.push(StreamedEntry {
                    container,
                    entry,
                    version: slot.versions[raw as usize],
                });

                let range = BufferRange::new(slot.base + param.offset(), param.size());
                current = match current {
                    Some(run) if run.is_followed_by(&range) => {
                        Some(BufferRange::new(run.offset, run.size + range.size))
                    }
                    Some(run) => {
                        runs.push((container, run));
                        Some(range)
                    }
                    None => Some(range),
                };
            }
            if let Some(run) = current {
                runs.push((container, run));
            }
        }

        log::trace!(
            "ParameterCache: streaming {} entries as {} descriptors.",
            streamed.len(),
            runs.len()
        );
        ParameterCacheStream::new(&self.storage, runs, streamed)
    }

    /// Clears the dirty flags of a drained stream once its writes succeeded.
    ///
    /// An entry rewritten after the stream was taken keeps its flag, so its new value
    /// is streamed next time. Returns the number of entries cleared.
    pub fn commit(&mut self, receipt: StreamReceipt) -> usize {
        let mut cleared = 0;
        for streamed in receipt.into_entries() {
            let Some(slot) = self
                .containers
                .get_mut(streamed.container.0 as usize)
                .filter(|slot| slot.live)
            else {
                continue;
            };
            if slot.versions[streamed.entry.0 as usize] == streamed.version {
                slot.dirty.clear(streamed.entry.0);
                cleared += 1;
            }
            if slot.dirty.is_empty() {
                self.dirty_containers.clear(streamed.container.0);
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_layout() -> Arc<ParameterLayout> {
        ParameterLayout::builder("Instance")
            .entry("world", 64)
            .entry("color", 16)
            .build()
    }

    #[test]
    fn containers_are_aligned_and_start_dirty() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let layout = instance_layout();
        let a = cache.register_container(&layout).unwrap();
        let b = cache.register_container(&layout).unwrap();

        assert_eq!(cache.container_range(a).unwrap(), BufferRange::new(0, 80));
        assert_eq!(cache.container_range(b).unwrap(), BufferRange::new(256, 80));
        assert!(cache.is_dirty(b, EntryId(1)));
        assert_eq!(cache.dirty_entry_count(), 4);
    }

    #[test]
    fn size_mismatch_leaves_entry_unchanged() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let c = cache.register_container(&instance_layout()).unwrap();
        cache.set_entry_pod(c, EntryId(1), &[1.0f32; 4]).unwrap();

        let err = cache.set_entry(c, EntryId(1), &[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            CacheError::SizeMismatch {
                container: c,
                entry: EntryId(1),
                expected: 16,
                actual: 12,
            }
        );
        assert_eq!(
            cache.entry_bytes(c, EntryId(1)).unwrap(),
            bytemuck::bytes_of(&[1.0f32; 4])
        );
    }

    #[test]
    fn unknown_addresses_are_reported() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let c = cache.register_container(&instance_layout()).unwrap();
        assert_eq!(
            cache.set_entry(ContainerId(7), EntryId(0), &[0; 64]),
            Err(CacheError::UnknownContainer(ContainerId(7)))
        );
        assert_eq!(
            cache.set_entry(c, EntryId(9), &[0; 4]),
            Err(CacheError::UnknownEntry {
                container: c,
                entry: EntryId(9)
            })
        );
    }

    #[test]
    fn fixed_capacity_rejects_overflow() {
        let mut cache = ParameterCache::new(CacheCapacity::Fixed { bytes: 300 });
        let layout = instance_layout();
        cache.register_container(&layout).unwrap();
        assert_eq!(
            cache.register_container(&layout),
            Err(CacheError::CapacityExceeded {
                requested: 336,
                capacity: 300
            })
        );
        assert_eq!(cache.container_count(), 1);
    }

    #[test]
    fn growable_capacity_doubles() {
        let mut cache = ParameterCache::new(CacheCapacity::Growable { initial_bytes: 256 });
        let layout = instance_layout();
        cache.register_container(&layout).unwrap();
        assert_eq!(cache.required_size(), 256);
        cache.register_container(&layout).unwrap();
        assert_eq!(cache.required_size(), 512);
    }

    #[test]
    fn removed_containers_are_skipped() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let layout = instance_layout();
        let a = cache.register_container(&layout).unwrap();
        let b = cache.register_container(&layout).unwrap();
        cache.remove_container(a).unwrap();

        assert_eq!(cache.container_count(), 1);
        assert_eq!(cache.dirty_entry_count(), 2);
        assert!(cache.entry_bytes(a, EntryId(0)).is_err());
        let stream = cache.stream_dirty();
        assert!(stream.descriptors().all(|d| d.container == b));
    }

    #[test]
    fn commit_keeps_entries_rewritten_during_the_drain() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let c = cache.register_container(&instance_layout()).unwrap();

        let receipt = cache.stream_dirty().finish();
        cache.set_entry_pod(c, EntryId(1), &[0.5f32; 4]).unwrap();

        assert_eq!(cache.commit(receipt), 1);
        assert!(!cache.is_dirty(c, EntryId(0)));
        assert!(cache.is_dirty(c, EntryId(1)));
    }

    #[test]
    fn removed_ranges_stay_reserved() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let layout = instance_layout();
        let a = cache.register_container(&layout).unwrap();
        cache.set_entry_pod(a, EntryId(1), &[2.0f32; 4]).unwrap();
        assert_eq!(
            &cache.container_bytes(a).unwrap()[64..80],
            bytemuck::bytes_of(&[2.0f32; 4])
        );
        assert_eq!(cache.container_bytes(a).unwrap().len(), 80);

        cache.remove_container(a).unwrap();
        let b = cache.register_container(&layout).unwrap();
        assert_eq!(cache.container_range(b).unwrap().offset, 256);
        assert_eq!(cache.used_bytes(), 336);
        assert!(cache.container_bytes(a).is_err());
    }

    #[test]
    fn mark_all_dirty_covers_every_live_entry() {
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let c = cache.register_container(&instance_layout()).unwrap();
        let receipt = cache.stream_dirty().finish();
        cache.commit(receipt);
        assert_eq!(cache.dirty_entry_count(), 0);

        cache.mark_all_dirty();
        assert!(cache.is_dirty(c, EntryId(0)));
        assert_eq!(cache.dirty_entry_count(), 2);
    }
}
