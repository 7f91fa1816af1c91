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

use tessera_data::{
    CacheError, ContainerId, DirtySet, EntryId, ParameterCache, TransformIndex, TransformTree,
};

/// A 4x4 matrix stored column by column, as shaders read it.
pub type ColumnMajor = [f32; 16];

/// The identity matrix.
pub const IDENTITY: ColumnMajor = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Multiplies two column-major matrices, `a * b`.
pub fn mul_column_major(a: &ColumnMajor, b: &ColumnMajor) -> ColumnMajor {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

/// Where the world matrix of a transform slot lives in the parameter cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformBinding {
    /// The container holding the matrix.
    pub container: ContainerId,
    /// The 64-byte matrix entry.
    pub entry: EntryId,
}

/// Recomputes the world matrices of dirty transform slots and stores them in the
/// parameter cache.
///
/// This is the per-frame consumer of the marks set by
/// [`DirtyMarker`](super::DirtyMarker): marks are propagated to descendants, every
/// stale slot is recomputed parent first, and bound slots get their cache entry
/// rewritten, which in turn dirties it for the render lane.
#[derive(Debug, Default)]
pub struct TransformSync {
    bindings: Vec<Option<TransformBinding>>,
    worlds: Vec<ColumnMajor>,
}

impl TransformSync {
    /// Creates a sync pass without bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes the world matrix of `index` to a cache entry.
    pub fn bind(&mut self, index: TransformIndex, binding: TransformBinding) {
        if index.as_usize() >= self.bindings.len() {
            self.bindings.resize(index.as_usize() + 1, None);
        }
        self.bindings[index.as_usize()] = Some(binding);
    }

    /// Stops routing `index`. Returns the previous binding.
    pub fn unbind(&mut self, index: TransformIndex) -> Option<TransformBinding> {
        self.bindings.get_mut(index.as_usize()).and_then(Option::take)
    }

    /// The binding of `index`, if any.
    pub fn binding(&self, index: TransformIndex) -> Option<TransformBinding> {
        self.bindings.get(index.as_usize()).copied().flatten()
    }

    /// The last computed world matrix of `index`.
    pub fn world(&self, index: TransformIndex) -> ColumnMajor {
        self.worlds.get(index.as_usize()).copied().unwrap_or(IDENTITY)
    }

    /// Runs one sync pass and returns the number of recomputed slots.
    ///
    /// `local` yields the local matrix of a slot. On success every mark of `dirty`
    /// is consumed; if a cache write fails the marks are kept so the next pass
    /// retries.
    pub fn sync<F>(
        &mut self,
        tree: &TransformTree,
        dirty: &mut DirtySet,
        cache: &mut ParameterCache,
        mut local: F,
    ) -> Result<usize, CacheError>
    where
        F: FnMut(TransformIndex) -> ColumnMajor,
    {
        let stale = tree.propagate_dirty(dirty);
        if self.worlds.len() < tree.capacity() {
            self.worlds.resize(tree.capacity(), IDENTITY);
        }

        for &index in &stale {
            let matrix = local(index);
            let world = match tree.parent(index) {
                Some(parent) => mul_column_major(&self.worlds[parent.as_usize()], &matrix),
                None => matrix,
            };
            self.worlds[index.as_usize()] = world;

            if let Some(binding) = self.binding(index) {
                cache.set_entry_pod(binding.container, binding.entry, &world)?;
            }
        }

        dirty.clear_all();
        log::debug!("TransformSync: recomputed {} world matrices.", stale.len());
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::settings::CacheCapacity;
    use tessera_data::ParameterLayout;

    fn translation(x: f32, y: f32, z: f32) -> ColumnMajor {
        let mut m = IDENTITY;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        m
    }

    #[test]
    fn multiplication_composes_translations() {
        let m = mul_column_major(&translation(1.0, 2.0, 3.0), &translation(4.0, 5.0, 6.0));
        assert_eq!(&m[12..15], &[5.0, 7.0, 9.0]);
        assert_eq!(mul_column_major(&IDENTITY, &m), m);
    }

    #[test]
    fn sync_writes_world_matrices_of_bound_slots() {
        let mut tree = TransformTree::new();
        let root = tree.allocate();
        let child = tree.allocate_child(root).unwrap();

        let layout = ParameterLayout::builder("Instance").entry("world", 64).build();
        let mut cache = ParameterCache::new(CacheCapacity::default());
        let container = cache.register_container(&layout).unwrap();
        let receipt = cache.stream_dirty().finish();
        let _ = cache.commit(receipt);

        let mut sync = TransformSync::new();
        sync.bind(
            child,
            TransformBinding {
                container,
                entry: EntryId(0),
            },
        );

        let mut dirty = DirtySet::with_len(tree.capacity());
        dirty.mark(root.0);
        let count = sync
            .sync(&tree, &mut dirty, &mut cache, |index| {
                if index == root {
                    translation(1.0, 0.0, 0.0)
                } else {
                    translation(0.0, 2.0, 0.0)
                }
            })
            .unwrap();

        assert_eq!(count, 2);
        assert!(dirty.is_empty());
        assert!(cache.is_dirty(container, EntryId(0)));
        let world: ColumnMajor =
            bytemuck::pod_read_unaligned(cache.entry_bytes(container, EntryId(0)).unwrap());
        assert_eq!(world, translation(1.0, 2.0, 0.0));
        assert_eq!(sync.world(child), world);
    }

    #[test]
    fn failed_write_keeps_marks() {
        let mut tree = TransformTree::new();
        let slot = tree.allocate();
        let mut cache = ParameterCache::new(CacheCapacity::default());

        let mut sync = TransformSync::new();
        sync.bind(
            slot,
            TransformBinding {
                container: ContainerId(9),
                entry: EntryId(0),
            },
        );
        let mut dirty = DirtySet::with_len(1);
        dirty.mark(slot.0);

        let result = sync.sync(&tree, &mut dirty, &mut cache, |_| IDENTITY);
        assert_eq!(result, Err(CacheError::UnknownContainer(ContainerId(9))));
        assert!(dirty.is_set(slot.0));
    }
}
