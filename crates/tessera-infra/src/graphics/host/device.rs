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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tessera_core::renderer::{
    BufferDescriptor, BufferId, BufferRange, DeviceMask, ParameterDevice, ResourceError,
    MAX_DEVICES,
};

/// One call received by a [`HostDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// A write, to every device or to the devices of `mask`.
    Write {
        /// Target buffer.
        buffer: BufferId,
        /// Destination offset.
        offset: u64,
        /// Bytes written.
        len: u64,
        /// Selected devices.
        mask: DeviceMask,
    },
    /// A range bind.
    Bind {
        /// Binding index.
        binding: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Bound range.
        range: BufferRange,
    },
}

#[derive(Debug)]
struct HostBuffer {
    label: String,
    replicas: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct HostState {
    buffers: HashMap<BufferId, HostBuffer>,
    bindings: HashMap<u32, (BufferId, BufferRange)>,
    calls: Vec<DeviceCall>,
    /// Write calls to let through before the injected failure fires.
    fail_after: Option<(usize, ResourceError)>,
}

/// A parameter device keeping one replica of every buffer per simulated device in
/// host memory.
///
/// Every call is recorded, replicas can be read back per device, and a write
/// failure can be scheduled with [`fail_write_after`](HostDevice::fail_write_after).
#[derive(Debug)]
pub struct HostDevice {
    device_count: u32,
    state: Mutex<HostState>,
    next_buffer_id: AtomicUsize,
}

impl HostDevice {
    /// Creates a group of `device_count` linked devices.
    pub fn new(device_count: u32) -> Self {
        debug_assert!((1..=MAX_DEVICES).contains(&device_count));
        log::info!("HostDevice: created with {device_count} device(s).");
        Self {
            device_count,
            state: Mutex::new(HostState::default()),
            next_buffer_id: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostState>, ResourceError> {
        self.state
            .lock()
            .map_err(|_| ResourceError::BackendError("host device state poisoned".to_string()))
    }

    /// Makes the write call following `successes` successful ones fail with `error`.
    /// The failure fires once.
    pub fn fail_write_after(&self, successes: usize, error: ResourceError) {
        if let Ok(mut state) = self.lock() {
            state.fail_after = Some((successes, error));
        }
    }

    /// Makes the next write call fail once with `error`.
    pub fn fail_next_write(&self, error: ResourceError) {
        self.fail_write_after(0, error);
    }

    /// Copies the replica of `buffer` held by `device`.
    pub fn read_buffer(&self, device: u32, buffer: BufferId) -> Result<Vec<u8>, ResourceError> {
        let state = self.lock()?;
        let entry = state.buffers.get(&buffer).ok_or(ResourceError::NotFound)?;
        entry
            .replicas
            .get(device as usize)
            .cloned()
            .ok_or(ResourceError::DeviceUnavailable(device))
    }

    /// The debug label of `buffer`.
    pub fn buffer_label(&self, buffer: BufferId) -> Option<String> {
        let state = self.lock().ok()?;
        state.buffers.get(&buffer).map(|entry| entry.label.clone())
    }

    /// Every call received since creation or the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().map(|state| state.calls.clone()).unwrap_or_default()
    }

    /// The recorded write calls.
    pub fn write_calls(&self) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, DeviceCall::Write { .. }))
            .collect()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls.clear();
        }
    }

    /// The buffer range last bound at `binding`.
    pub fn bound_range(&self, binding: u32) -> Option<(BufferId, BufferRange)> {
        self.lock().ok()?.bindings.get(&binding).copied()
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.lock().map(|state| state.buffers.len()).unwrap_or(0)
    }

    fn write(
        &self,
        mask: DeviceMask,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;

        if let Some((remaining, error)) = state.fail_after.take() {
            if remaining == 0 {
                log::warn!("HostDevice: injected failure on write to {id:?} at {offset}.");
                return Err(error);
            }
            state.fail_after = Some((remaining - 1, error));
        }

        if let Some(device) = mask.iter().find(|&device| device >= self.device_count) {
            return Err(ResourceError::DeviceUnavailable(device));
        }
        let entry = state.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let end = offset + data.len() as u64;
        let size = entry.replicas.first().map_or(0, |replica| replica.len() as u64);
        if end > size {
            return Err(ResourceError::OutOfBounds);
        }
        for device in mask.iter() {
            entry.replicas[device as usize][offset as usize..end as usize].copy_from_slice(data);
        }

        state.calls.push(DeviceCall::Write {
            buffer: id,
            offset,
            len: data.len() as u64,
            mask,
        });
        log::trace!(
            "HostDevice: wrote {} bytes to {:?} at {} on {:?}.",
            data.len(),
            id,
            offset,
            mask
        );
        Ok(())
    }
}

impl ParameterDevice for HostDevice {
    fn device_count(&self) -> u32 {
        self.device_count
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let label = descriptor.label.as_deref().unwrap_or_default().to_string();
        let replicas = vec![vec![0u8; descriptor.size as usize]; self.device_count as usize];
        self.lock()?
            .buffers
            .insert(id, HostBuffer { label, replicas });
        log::debug!(
            "HostDevice: created buffer {:?} ({} bytes).",
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.bindings.retain(|_, (buffer, _)| *buffer != id);
        state
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError> {
        let state = self.lock()?;
        let entry = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        Ok(entry.replicas.first().map_or(0, |replica| replica.len() as u64))
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.write(DeviceMask::all(self.device_count), id, offset, data)
    }

    fn write_buffer_multicast(
        &self,
        mask: DeviceMask,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        self.write(mask, id, offset, data)
    }

    fn bind_buffer_range(
        &self,
        binding: u32,
        id: BufferId,
        range: BufferRange,
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let entry = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let size = entry.replicas.first().map_or(0, |replica| replica.len() as u64);
        if range.end() > size {
            return Err(ResourceError::OutOfBounds);
        }
        state.bindings.insert(binding, (id, range));
        state.calls.push(DeviceCall::Bind {
            binding,
            buffer: id,
            range,
        });
        Ok(())
    }
}
