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
use std::sync::{Arc, Mutex, MutexGuard};

use tessera_core::renderer::{
    BufferDescriptor, BufferId, BufferRange, DeviceMask, ParameterDevice, ResourceError,
    MAX_DEVICES,
};

use super::conversions::IntoWgpu;

#[derive(Debug)]
struct WgpuBufferEntry {
    /// One replica per device, in device order.
    replicas: Vec<Arc<wgpu::Buffer>>,
    size: u64,
}

/// A parameter device replicating buffers over one or more wgpu devices.
///
/// wgpu has no immediate binding: [`bind_buffer_range`](ParameterDevice::bind_buffer_range)
/// records the range, and the render pass building its bind groups fetches it back
/// with [`bound_buffer`](WgpuParameterDevice::bound_buffer).
#[derive(Debug)]
pub struct WgpuParameterDevice {
    devices: Vec<(wgpu::Device, wgpu::Queue)>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    bindings: Mutex<HashMap<u32, (BufferId, BufferRange)>>,
    next_buffer_id: AtomicUsize,
}

impl WgpuParameterDevice {
    /// Wraps already created devices. Linked GPUs are passed in device-index order.
    pub fn new(devices: Vec<(wgpu::Device, wgpu::Queue)>) -> Result<Self, ResourceError> {
        if devices.is_empty() || devices.len() > MAX_DEVICES as usize {
            return Err(ResourceError::BackendError(format!(
                "expected 1..={MAX_DEVICES} devices, got {}",
                devices.len()
            )));
        }
        log::info!(
            "WgpuParameterDevice: created over {} device(s).",
            devices.len()
        );
        Ok(Self {
            devices,
            buffers: Mutex::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            next_buffer_id: AtomicUsize::new(0),
        })
    }

    fn lock_buffers(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<BufferId, WgpuBufferEntry>>, ResourceError> {
        self.buffers
            .lock()
            .map_err(|_| ResourceError::BackendError("buffer map poisoned".to_string()))
    }

    /// The replica of a buffer on `device` and the range last bound at `binding`.
    pub fn bound_buffer(
        &self,
        binding: u32,
        device: u32,
    ) -> Option<(Arc<wgpu::Buffer>, BufferRange)> {
        let (id, range) = *self.bindings.lock().ok()?.get(&binding)?;
        let buffers = self.lock_buffers().ok()?;
        let replica = buffers.get(&id)?.replicas.get(device as usize)?;
        Some((Arc::clone(replica), range))
    }

    fn write(
        &self,
        mask: DeviceMask,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        // 1. Get the resources
        let buffers = self.lock_buffers()?;
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        if let Some(device) = mask.iter().find(|&d| d as usize >= self.devices.len()) {
            return Err(ResourceError::DeviceUnavailable(device));
        }

        // 2. Check the bounds and the copy alignment
        let end_offset = offset + data.len() as u64;
        if end_offset > entry.size {
            return Err(ResourceError::OutOfBounds);
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0
            || data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0
        {
            return Err(ResourceError::BackendError(format!(
                "write of {} bytes at {} is not {}-byte aligned",
                data.len(),
                offset,
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }

        // 3. Write directly on each selected device.
        for device in mask.iter() {
            let (_, queue) = &self.devices[device as usize];
            queue.write_buffer(&entry.replicas[device as usize], offset, data);
        }

        log::trace!(
            "WgpuParameterDevice: wrote {} bytes to buffer {:?} at {} on {:?}",
            data.len(),
            id,
            offset,
            mask
        );
        Ok(())
    }
}

impl ParameterDevice for WgpuParameterDevice {
    fn device_count(&self) -> u32 {
        self.devices.len() as u32
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let wgpu_descriptor = wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        };
        let replicas = self
            .devices
            .iter()
            .map(|(device, _)| Arc::new(device.create_buffer(&wgpu_descriptor)))
            .collect();

        let id = BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        self.lock_buffers()?.insert(
            id,
            WgpuBufferEntry {
                replicas,
                size: descriptor.size,
            },
        );

        log::info!(
            "WgpuParameterDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        if let Ok(mut bindings) = self.bindings.lock() {
            bindings.retain(|_, (buffer, _)| *buffer != id);
        }
        let entry = self
            .lock_buffers()?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        for replica in &entry.replicas {
            replica.destroy();
        }
        log::debug!("WgpuParameterDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError> {
        self.lock_buffers()?
            .get(&id)
            .map(|entry| entry.size)
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.write(DeviceMask::all(self.device_count()), id, offset, data)
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
        let size = self.buffer_size(id)?;
        if range.end() > size {
            return Err(ResourceError::OutOfBounds);
        }
        self.bindings
            .lock()
            .map_err(|_| ResourceError::BackendError("binding map poisoned".to_string()))?
            .insert(binding, (id, range));
        Ok(())
    }
}
