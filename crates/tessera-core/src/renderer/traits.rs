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

//! The device-side contract consumed by the parameter renderers.

use crate::renderer::api::{BufferDescriptor, BufferId, BufferRange, DeviceMask};
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// A device (or group of linked devices) able to hold parameter buffers.
///
/// All methods are blocking: when a write returns `Ok`, the bytes are visible to
/// the next bind. Implementations use interior mutability so one device can be
/// shared between several renderers.
pub trait ParameterDevice: Send + Sync + Debug + 'static {
    /// Number of physical devices behind this handle. Single-GPU backends return 1.
    fn device_count(&self) -> u32;

    /// Creates a new buffer, replicated on every device.
    /// ## Arguments
    /// * `descriptor` - Size, usage and debug label of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot allocate the buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer on every device.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Returns the size in bytes of a buffer.
    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError>;

    /// Writes `data` at `offset` into the buffer on every device.
    /// ## Errors
    /// * `ResourceError::NotFound` - If the buffer does not exist.
    /// * `ResourceError::OutOfBounds` - If the range exceeds the buffer size.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Writes `data` at `offset` into the buffer replicas of the devices selected by `mask`.
    ///
    /// This is the address-range broadcast primitive: the host describes the write
    /// once and the backend applies it to each selected device.
    /// ## Errors
    /// * `ResourceError::DeviceUnavailable` - If `mask` selects a device that does not exist.
    /// * Any error of [`ParameterDevice::write_buffer`].
    fn write_buffer_multicast(
        &self,
        mask: DeviceMask,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Binds a range of a buffer at a binding index for the next draw.
    fn bind_buffer_range(
        &self,
        binding: u32,
        id: BufferId,
        range: BufferRange,
    ) -> Result<(), ResourceError>;
}
