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

use super::cache::ContainerId;
use super::layout::EntryId;
use tessera_core::renderer::BufferRange;

/// One contiguous write to the device parameter buffer.
///
/// `offset` is absolute in the device buffer; `data` borrows the cache's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteDescriptor<'a> {
    /// The container the bytes belong to.
    pub container: ContainerId,
    /// Destination offset in the device buffer.
    pub offset: u64,
    /// Bytes to write.
    pub data: &'a [u8],
}

impl WriteDescriptor<'_> {
    /// Number of bytes to write.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns `true` if there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Destination range in the device buffer.
    pub fn range(&self) -> BufferRange {
        BufferRange::new(self.offset, self.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct StreamedEntry {
    pub(super) container: ContainerId,
    pub(super) entry: EntryId,
    pub(super) version: u64,
}

/// The dirty entries of a [`ParameterCache`](super::ParameterCache), ready to be
/// written to a device.
///
/// The stream borrows the cache, so the cache cannot change while descriptors are
/// being consumed. Call [`finish`](ParameterCacheStream::finish) once the writes
/// succeeded and commit the receipt; dropping the stream instead leaves every entry
/// dirty.
#[derive(Debug)]
pub struct ParameterCacheStream<'a> {
    storage: &'a [u8],
    runs: Vec<(ContainerId, BufferRange)>,
    streamed: Vec<StreamedEntry>,
}

impl<'a> ParameterCacheStream<'a> {
    pub(super) fn new(
        storage: &'a [u8],
        runs: Vec<(ContainerId, BufferRange)>,
        streamed: Vec<StreamedEntry>,
    ) -> Self {
        Self {
            storage,
            runs,
            streamed,
        }
    }

    /// Iterates over the coalesced writes in stream order.
    ///
    /// The iterator can be restarted by calling this method again.
    pub fn descriptors(&self) -> impl ExactSizeIterator<Item = WriteDescriptor<'a>> + '_ {
        let storage = self.storage;
        self.runs.iter().map(move |&(container, range)| WriteDescriptor {
            container,
            offset: range.offset,
            data: &storage[range.offset as usize..range.end() as usize],
        })
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns `true` if nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of dirty entries covered by the descriptors.
    pub fn entry_count(&self) -> usize {
        self.streamed.len()
    }

    /// Total bytes over all descriptors.
    pub fn total_bytes(&self) -> u64 {
        self.runs.iter().map(|(_, range)| range.size).sum()
    }

    /// Ends the stream, releasing the borrow of the cache.
    pub fn finish(self) -> StreamReceipt {
        StreamReceipt {
            descriptors: self.runs.len(),
            bytes: self.total_bytes(),
            entries: self.streamed,
        }
    }
}

/// Proof that a stream was drained, to be handed to
/// [`ParameterCache::commit`](super::ParameterCache::commit).
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dirty flags are only cleared when the receipt is committed"]
pub struct StreamReceipt {
    entries: Vec<StreamedEntry>,
    descriptors: usize,
    bytes: u64,
}

impl StreamReceipt {
    /// Number of descriptors the stream produced.
    pub fn descriptor_count(&self) -> usize {
        self.descriptors
    }

    /// Number of entries the stream covered.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes the stream covered.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns `true` if the stream was empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(super) fn into_entries(self) -> Vec<StreamedEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ParameterCache, ParameterLayout};
    use super::*;
    use tessera_core::settings::CacheCapacity;

    #[test]
    fn gaps_split_descriptors() {
        let layout = ParameterLayout::builder("Quad")
            .entry("a", 16)
            .entry("b", 16)
            .entry("pad", 16)
            .entry("c", 16)
            .build();
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let c = cache.register_container(&layout).unwrap();
        let receipt = cache.stream_dirty().finish();
        let _ = cache.commit(receipt);

        cache.set_entry(c, EntryId(0), &[1; 16]).unwrap();
        cache.set_entry(c, EntryId(1), &[2; 16]).unwrap();
        cache.set_entry(c, EntryId(3), &[3; 16]).unwrap();

        let stream = cache.stream_dirty();
        let ranges: Vec<BufferRange> = stream.descriptors().map(|d| d.range()).collect();
        assert_eq!(
            ranges,
            vec![BufferRange::new(0, 32), BufferRange::new(48, 16)]
        );
        assert_eq!(stream.entry_count(), 3);
        assert_eq!(stream.total_bytes(), 48);

        let first = stream.descriptors().next().unwrap();
        assert_eq!(&first.data[..16], &[1; 16]);
        assert_eq!(&first.data[16..], &[2; 16]);
    }

    #[test]
    fn containers_never_coalesce() {
        let layout = ParameterLayout::builder("Tight").entry("v", 16).build();
        let mut cache = ParameterCache::with_alignment(CacheCapacity::default(), 16);
        cache.register_container(&layout).unwrap();
        cache.register_container(&layout).unwrap();

        let stream = cache.stream_dirty();
        assert_eq!(stream.len(), 2);
        let receipt = stream.finish();
        assert_eq!(receipt.descriptor_count(), 2);
        assert_eq!(receipt.total_bytes(), 32);
    }
}
