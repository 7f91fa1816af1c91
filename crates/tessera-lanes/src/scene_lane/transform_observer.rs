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

use tessera_core::event::{ChangeEvent, ChangeObserver, NotifyHandler};
use tessera_data::{DirtySet, TransformIndex};

/// Marks the transform slot carried by each notification as dirty.
///
/// The handler owns the rendering context's transform [`DirtySet`]. It does no
/// recomputation: the marks are consumed once per frame by
/// [`TransformSync`](super::TransformSync).
#[derive(Debug, Default)]
pub struct DirtyMarker {
    dirty: DirtySet,
}

impl DirtyMarker {
    /// Creates a marker tracking `capacity` transform slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            dirty: DirtySet::with_len(capacity),
        }
    }

    /// The accumulated marks.
    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    /// Mutable access to the marks, for propagation and clearing.
    pub fn dirty_mut(&mut self) -> &mut DirtySet {
        &mut self.dirty
    }
}

impl NotifyHandler<TransformIndex> for DirtyMarker {
    fn on_notify(&mut self, event: &ChangeEvent, index: &TransformIndex) {
        // Slots allocated after this marker was sized.
        if index.as_usize() >= self.dirty.index_len() {
            self.dirty.resize(index.as_usize() + 1);
        }
        self.dirty.mark(index.0);
        log::trace!("DirtyMarker: {:?} marked slot {}.", event.kind, index.0);
    }
}

/// An observer whose payloads are transform slots.
///
/// A scene node that is instanced several times is attached once per slot it
/// occupies, so one notification dirties every instance.
pub type TransformObserver = ChangeObserver<TransformIndex, DirtyMarker>;

/// Creates a [`TransformObserver`] tracking `capacity` slots.
pub fn transform_observer(capacity: usize) -> TransformObserver {
    ChangeObserver::new(DirtyMarker::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::event::NodeId;

    #[test]
    fn notify_marks_every_instance() {
        let mut observer = transform_observer(8);
        let node = NodeId::new(3, 0);
        observer.attach(node, TransformIndex(1)).unwrap();
        observer.attach(node, TransformIndex(5)).unwrap();

        assert_eq!(observer.notify(node, &ChangeEvent::transform()), 2);
        let marked: Vec<u32> = observer.handler().dirty().iter().collect();
        assert_eq!(marked, vec![1, 5]);
    }

    #[test]
    fn marker_grows_for_new_slots() {
        let mut observer = transform_observer(2);
        let node = NodeId::new(0, 0);
        observer.attach(node, TransformIndex(40)).unwrap();
        observer.notify(node, &ChangeEvent::transform());
        assert!(observer.handler().dirty().is_set(40));
    }

    #[test]
    fn detached_nodes_no_longer_mark() {
        let mut observer = transform_observer(4);
        let node = NodeId::new(1, 0);
        observer.attach(node, TransformIndex(2)).unwrap();
        assert_eq!(observer.detach(node), vec![TransformIndex(2)]);
        assert_eq!(observer.notify(node, &ChangeEvent::transform()), 0);
        assert!(observer.handler().dirty().is_empty());
    }
}
