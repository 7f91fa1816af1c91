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
use tessera_core::renderer::BufferRange;
use tessera_core::settings::CacheCapacity;
use tessera_data::{
    CacheError, ContainerId, DirtySet, EntryId, ParameterCache, ParameterLayout, TransformTree,
};

fn four_vec4_layout() -> Arc<ParameterLayout> {
    ParameterLayout::builder("Material")
        .entry("albedo", 16)
        .entry("emissive", 16)
        .entry("roughness_metal", 16)
        .entry("tint", 16)
        .build()
}

fn clean_cache_with(layout: &Arc<ParameterLayout>, count: usize) -> (ParameterCache, Vec<ContainerId>) {
    let mut cache = ParameterCache::new(CacheCapacity::default());
    let ids = (0..count)
        .map(|_| cache.register_container(layout).unwrap())
        .collect();
    let receipt = cache.stream_dirty().finish();
    let _ = cache.commit(receipt);
    (cache, ids)
}

#[test]
fn test_adjacent_dirty_entries_coalesce() {
    // --- 1. ARRANGE ---
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 1);
    let c = ids[0];

    // --- 2. ACT ---
    // Dirty [0,16), [16,32) and [48,64).
    cache.set_entry_pod(c, EntryId(0), &[1.0f32, 0.0, 0.0, 1.0]).unwrap();
    cache.set_entry_pod(c, EntryId(1), &[0.0f32; 4]).unwrap();
    cache.set_entry_pod(c, EntryId(3), &[0.5f32; 4]).unwrap();
    let stream = cache.stream_dirty();

    // --- 3. ASSERT ---
    let ranges: Vec<BufferRange> = stream.descriptors().map(|d| d.range()).collect();
    assert_eq!(
        ranges,
        vec![BufferRange::new(0, 32), BufferRange::new(48, 16)],
        "Adjacent entries should merge and the gap should split the run"
    );
}

#[test]
fn test_drain_then_commit_clears_everything() {
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 3);
    for &c in &ids {
        cache.set_entry_pod(c, EntryId(2), &[0.25f32; 4]).unwrap();
    }

    let receipt = cache.stream_dirty().finish();
    assert_eq!(receipt.entry_count(), 3);
    assert_eq!(cache.commit(receipt), 3);

    assert_eq!(cache.dirty_entry_count(), 0);
    assert!(cache.stream_dirty().is_empty(), "A second drain should be empty");
}

#[test]
fn test_entries_dirtied_after_the_drain_began_stay_dirty() {
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 1);
    let c = ids[0];
    cache.set_entry_pod(c, EntryId(0), &[1.0f32; 4]).unwrap();

    let receipt = cache.stream_dirty().finish();
    // A scene edit lands between the device writes and the commit.
    cache.set_entry_pod(c, EntryId(0), &[2.0f32; 4]).unwrap();
    cache.commit(receipt);

    assert!(cache.is_dirty(c, EntryId(0)));
    let stream = cache.stream_dirty();
    let data: Vec<&[u8]> = stream.descriptors().map(|d| d.data).collect();
    assert_eq!(data, vec![bytemuck::bytes_of(&[2.0f32; 4])]);
}

#[test]
fn test_dropped_stream_keeps_dirty_state() {
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 2);
    cache.set_entry_pod(ids[1], EntryId(1), &[3.0f32; 4]).unwrap();

    let first: Vec<(u64, Vec<u8>)> = cache
        .stream_dirty()
        .descriptors()
        .map(|d| (d.offset, d.data.to_vec()))
        .collect();
    let second: Vec<(u64, Vec<u8>)> = cache
        .stream_dirty()
        .descriptors()
        .map(|d| (d.offset, d.data.to_vec()))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[0].0, 256 + 16);
}

#[test]
fn test_stream_order_is_deterministic() {
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 4);

    // Edits arrive in scrambled order.
    cache.set_entry_pod(ids[3], EntryId(0), &[1.0f32; 4]).unwrap();
    cache.set_entry_pod(ids[0], EntryId(3), &[1.0f32; 4]).unwrap();
    cache.set_entry_pod(ids[2], EntryId(1), &[1.0f32; 4]).unwrap();
    cache.set_entry_pod(ids[0], EntryId(1), &[1.0f32; 4]).unwrap();

    let offsets: Vec<u64> = cache.stream_dirty().descriptors().map(|d| d.offset).collect();
    assert_eq!(offsets, vec![16, 48, 512 + 16, 768]);
}

#[test]
fn test_size_is_enforced() {
    let layout = four_vec4_layout();
    let (mut cache, ids) = clean_cache_with(&layout, 1);

    let result = cache.set_entry(ids[0], EntryId(0), &[0u8; 20]);
    assert!(matches!(
        result,
        Err(CacheError::SizeMismatch {
            expected: 16,
            actual: 20,
            ..
        })
    ));
    assert_eq!(cache.dirty_entry_count(), 0, "A rejected write must not dirty");
}

#[test]
fn test_transform_marks_propagate_to_instances() {
    // One scene node instanced under two parents occupies two tree slots.
    let mut tree = TransformTree::new();
    let root = tree.allocate();
    let left = tree.allocate_child(root).unwrap();
    let right = tree.allocate_child(root).unwrap();
    let left_wheel = tree.allocate_child(left).unwrap();
    let right_wheel = tree.allocate_child(right).unwrap();

    let mut dirty = DirtySet::with_len(tree.capacity());
    dirty.mark(root.0);
    let stale = tree.propagate_dirty(&mut dirty);

    assert_eq!(stale.len(), 5);
    let position = |i| stale.iter().position(|&s| s == i).unwrap();
    assert!(position(left) < position(left_wheel));
    assert!(position(right) < position(right_wheel));
    assert_eq!(dirty.count(), 5);
}
