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

use std::collections::HashMap;
use std::fmt;

/// Identity of a scene entity as seen by the tracking layer.
///
/// The index may be recycled by the scene once the entity is destroyed; the
/// generation distinguishes the old entity from the new one, so a stale id can
/// never reach the payloads of a recycled entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Slot of the entity in the scene's own storage.
    pub index: u32,
    /// Incremented each time the slot is recycled.
    pub generation: u32,
}

impl NodeId {
    /// Creates a new id.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// The category of a scene change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The contents of a data buffer changed.
    Buffer,
    /// A geometry node changed its primitive or parameters.
    GeoNode,
    /// Children were added to or removed from a group.
    Group,
    /// A generic object property changed.
    Object,
    /// Data of a parameter group changed.
    ParameterGroupData,
    /// A local transform changed.
    Transform,
}

/// A tagged change message passed from the scene to the observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    /// What changed.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Creates an event of the given kind.
    pub const fn new(kind: ChangeKind) -> Self {
        Self { kind }
    }

    /// Shorthand for a [`ChangeKind::Transform`] event.
    pub const fn transform() -> Self {
        Self::new(ChangeKind::Transform)
    }
}

/// Receives notifications dispatched by a [`ChangeObserver`].
pub trait NotifyHandler<P> {
    /// Called once per payload attached to the entity that changed.
    fn on_notify(&mut self, event: &ChangeEvent, payload: &P);
}

impl<P, F> NotifyHandler<P> for F
where
    F: FnMut(&ChangeEvent, &P),
{
    fn on_notify(&mut self, event: &ChangeEvent, payload: &P) {
        self(event, payload)
    }
}

/// An error raised by observer registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The same payload is already attached to the entity.
    DuplicateAttachment {
        /// The entity that was attached twice.
        entity: NodeId,
    },
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverError::DuplicateAttachment { entity } => write!(
                f,
                "Entity {}:{} is already attached with this payload",
                entity.index, entity.generation
            ),
        }
    }
}

impl std::error::Error for ObserverError {}

/// A subscription registry mapping scene entities to payloads.
///
/// One entity may carry several distinct payloads: an instanced subtree puts the
/// same scene node at several tracking slots, and each slot must be notified.
/// Attaching an identical `(entity, payload)` pair twice is rejected with
/// [`ObserverError::DuplicateAttachment`].
///
/// The observer never holds a reference to the entity, only its [`NodeId`], so
/// detaching after the entity was destroyed is always safe.
#[derive(Debug)]
pub struct ChangeObserver<P, H> {
    attachments: HashMap<NodeId, Vec<P>>,
    handler: H,
}

impl<P, H> ChangeObserver<P, H>
where
    P: Clone + PartialEq,
    H: NotifyHandler<P>,
{
    /// Creates an observer without attachments.
    pub fn new(handler: H) -> Self {
        Self {
            attachments: HashMap::new(),
            handler,
        }
    }

    /// Attaches `payload` to `entity`.
    ///
    /// ## Errors
    /// * `ObserverError::DuplicateAttachment` - If the same payload is already attached.
    pub fn attach(&mut self, entity: NodeId, payload: P) -> Result<(), ObserverError> {
        let payloads = self.attachments.entry(entity).or_default();
        if payloads.contains(&payload) {
            return Err(ObserverError::DuplicateAttachment { entity });
        }
        payloads.push(payload);
        Ok(())
    }

    /// Removes every payload attached to `entity` and returns them.
    ///
    /// Detaching an entity that is not attached is a no-op.
    pub fn detach(&mut self, entity: NodeId) -> Vec<P> {
        self.attachments.remove(&entity).unwrap_or_default()
    }

    /// Removes a single payload from `entity`. Returns `true` if it was attached.
    pub fn detach_payload(&mut self, entity: NodeId, payload: &P) -> bool {
        let Some(payloads) = self.attachments.get_mut(&entity) else {
            return false;
        };
        let before = payloads.len();
        payloads.retain(|attached| attached != payload);
        let removed = payloads.len() != before;
        if payloads.is_empty() {
            self.attachments.remove(&entity);
        }
        removed
    }

    /// Dispatches `event` to the handler once per payload of `entity`.
    ///
    /// Returns the number of payloads notified; unattached entities are ignored.
    pub fn notify(&mut self, entity: NodeId, event: &ChangeEvent) -> usize {
        let Some(payloads) = self.attachments.get(&entity) else {
            log::trace!("Ignoring {:?} for unattached entity {:?}", event.kind, entity);
            return 0;
        };
        for payload in payloads {
            self.handler.on_notify(event, payload);
        }
        payloads.len()
    }

    /// Returns `true` if at least one payload is attached to `entity`.
    pub fn is_attached(&self, entity: NodeId) -> bool {
        self.attachments.contains_key(&entity)
    }

    /// The payloads attached to `entity`, in attachment order.
    pub fn payloads(&self, entity: NodeId) -> &[P] {
        self.attachments
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of attached entities.
    pub fn attached_count(&self) -> usize {
        self.attachments.len()
    }

    /// Shared access to the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
