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

use super::batch::{BatchPolicy, StagingArea};
use super::fan_out::FanOut;
use std::borrow::Cow;
use std::sync::Arc;
use tessera_core::renderer::{
    BufferDescriptor, BufferId, BufferRange, BufferUsage, DeviceMask, ParameterDevice,
    RenderError, ResourceError,
};
use tessera_core::settings::StreamSettings;
use tessera_data::WriteDescriptor;

/// Where a [`ParameterRenderer`] is in its update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// No write in flight; ready for `update` or `render`.
    Idle,
    /// Descriptors are staged but not yet submitted.
    Accumulating,
    /// Every write of the frame reached the device.
    Flushed,
}

/// Counters of the writes a renderer issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Descriptors received through `update`.
    pub descriptors: u64,
    /// Write calls made on the device.
    pub device_calls: u64,
    /// Bytes submitted to the device.
    pub bytes: u64,
    /// Completed flushes. An unbatched `update` counts as one.
    pub flushes: u64,
}

/// Streams parameter descriptors into one device buffer and binds ranges of it.
///
/// The four renderer flavours (batched or not, single device or multicast) are the
/// combinations of a [`BatchPolicy`] and a [`FanOut`]. The device buffer mirrors the
/// layout of the [`ParameterCache`](tessera_data::ParameterCache), so descriptor
/// offsets are used as-is.
#[derive(Debug)]
pub struct ParameterRenderer {
    device: Arc<dyn ParameterDevice>,
    label: String,
    buffer: BufferId,
    buffer_size: u64,
    binding_index: u32,
    policy: BatchPolicy,
    fan_out: FanOut,
    staging: StagingArea,
    state: RendererState,
    stats: WriteStats,
    /// Set when a device rejoined the fan-out and missed earlier writes.
    full_upload_pending: bool,
}

impl ParameterRenderer {
    /// Creates a renderer configured from `settings`, with a device buffer of `size` bytes.
    pub fn new(
        device: Arc<dyn ParameterDevice>,
        settings: &StreamSettings,
        size: u64,
    ) -> Result<Self, RenderError> {
        let policy = if settings.batching {
            BatchPolicy::Batched {
                max_batch_bytes: settings.max_batch_bytes,
            }
        } else {
            BatchPolicy::Unbatched
        };
        let fan_out = FanOut::for_device_count(settings.device_count);
        Self::with_strategies(
            device,
            settings.label.clone(),
            size,
            settings.binding_index,
            policy,
            fan_out,
        )
    }

    /// Creates a renderer from explicit strategies.
    ///
    /// ## Errors
    /// * `ResourceError::DeviceUnavailable` - If the fan-out needs more devices than
    ///   `device` exposes.
    /// * Any error of [`ParameterDevice::create_buffer`].
    pub fn with_strategies(
        device: Arc<dyn ParameterDevice>,
        label: String,
        size: u64,
        binding_index: u32,
        policy: BatchPolicy,
        fan_out: FanOut,
    ) -> Result<Self, RenderError> {
        let available = device.device_count();
        if fan_out.device_count() > available {
            return Err(ResourceError::DeviceUnavailable(available).into());
        }
        let buffer = create_parameter_buffer(device.as_ref(), &label, size)?;
        log::info!(
            "ParameterRenderer '{}': {} bytes, {:?}, {:?}.",
            label,
            size,
            policy,
            fan_out
        );
        Ok(Self {
            device,
            label,
            buffer,
            buffer_size: size,
            binding_index,
            policy,
            fan_out,
            staging: StagingArea::default(),
            state: RendererState::Idle,
            stats: WriteStats::default(),
            full_upload_pending: false,
        })
    }

    /// Applies a stream of descriptors.
    ///
    /// Unbatched, each descriptor becomes one device write right away and the
    /// renderer ends in [`RendererState::Flushed`]. Batched, descriptors are staged
    /// and only submitted when the staging budget is reached or on
    /// [`flush`](Self::flush).
    ///
    /// ## Errors
    /// * `RenderError::DeviceWriteFailed` - The first failing write. The remaining
    ///   descriptors and any staged bytes are discarded and the renderer returns to
    ///   [`RendererState::Idle`].
    pub fn update<'a, I>(&mut self, descriptors: I) -> Result<(), RenderError>
    where
        I: IntoIterator<Item = WriteDescriptor<'a>>,
    {
        match self.policy {
            BatchPolicy::Unbatched => {
                for descriptor in descriptors {
                    self.stats.descriptors += 1;
                    self.submit(descriptor.offset, descriptor.data)?;
                }
                self.state = RendererState::Flushed;
                self.stats.flushes += 1;
            }
            BatchPolicy::Batched { max_batch_bytes } => {
                self.state = RendererState::Accumulating;
                for descriptor in descriptors {
                    self.stats.descriptors += 1;
                    self.staging.push(descriptor.offset, descriptor.data);
                    if self.staging.staged_bytes() >= max_batch_bytes {
                        log::trace!(
                            "ParameterRenderer '{}': staging budget reached, submitting.",
                            self.label
                        );
                        self.submit_staging()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Submits every staged write and completes the frame's update.
    ///
    /// Does nothing if the update is already complete, as after an unbatched `update`.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if self.state == RendererState::Flushed && self.staging.is_empty() {
            return Ok(());
        }
        if !self.staging.is_empty() {
            self.submit_staging()?;
        }
        self.state = RendererState::Flushed;
        self.stats.flushes += 1;
        Ok(())
    }

    fn submit_staging(&mut self) -> Result<(), RenderError> {
        for run in self.staging.take() {
            self.submit(run.offset, &run.data)?;
        }
        Ok(())
    }

    fn submit(&mut self, offset: u64, data: &[u8]) -> Result<(), RenderError> {
        match self
            .fan_out
            .write(self.device.as_ref(), self.buffer, offset, data)
        {
            Ok(calls) => {
                self.stats.device_calls += calls;
                self.stats.bytes += data.len() as u64 * calls;
                log::trace!(
                    "ParameterRenderer '{}': wrote {} bytes at {}.",
                    self.label,
                    data.len(),
                    offset
                );
                Ok(())
            }
            Err(source) => {
                self.staging.clear();
                self.state = RendererState::Idle;
                Err(RenderError::DeviceWriteFailed {
                    offset,
                    len: data.len() as u64,
                    source,
                })
            }
        }
    }

    /// Binds `range` of the parameter buffer at the configured binding index.
    ///
    /// ## Errors
    /// * `RenderError::PendingWrites` - If staged writes were not flushed.
    pub fn render(&mut self, range: BufferRange) -> Result<(), RenderError> {
        if !self.staging.is_empty() {
            return Err(RenderError::PendingWrites {
                staged_bytes: self.staging.staged_bytes(),
            });
        }
        self.device
            .bind_buffer_range(self.binding_index, self.buffer, range)?;
        self.state = RendererState::Idle;
        Ok(())
    }

    /// Recreates the device buffer if it is smaller than `required` bytes.
    ///
    /// Returns `true` if the buffer was replaced; its content is then undefined and
    /// the caller must upload every parameter again.
    pub fn resize(&mut self, required: u64) -> Result<bool, RenderError> {
        if required <= self.buffer_size {
            return Ok(false);
        }
        let buffer = create_parameter_buffer(self.device.as_ref(), &self.label, required)?;
        if let Err(err) = self.device.destroy_buffer(self.buffer) {
            log::warn!(
                "ParameterRenderer '{}': failed to destroy old buffer: {}",
                self.label,
                err
            );
        }
        log::debug!(
            "ParameterRenderer '{}': buffer resized from {} to {} bytes.",
            self.label,
            self.buffer_size,
            required
        );
        self.buffer = buffer;
        self.buffer_size = required;
        self.staging.clear();
        self.state = RendererState::Idle;
        Ok(true)
    }

    /// Includes or excludes one device from subsequent writes.
    ///
    /// A device that is enabled again missed every write made while it was
    /// excluded; the renderer then requests a full upload, see
    /// [`take_full_upload`](Self::take_full_upload).
    pub fn set_device_enabled(&mut self, device: u32, enabled: bool) -> Result<(), RenderError> {
        let was_enabled = self.fan_out.mask().is_some_and(|mask| mask.contains(device));
        self.fan_out.set_device_enabled(device, enabled)?;
        if enabled && !was_enabled && self.fan_out.mask().is_some() {
            log::debug!(
                "ParameterRenderer '{}': device {} rejoined, full upload requested.",
                self.label,
                device
            );
            self.full_upload_pending = true;
        }
        Ok(())
    }

    /// Returns `true` once after a device rejoined the fan-out. The caller must then
    /// upload every parameter again.
    pub fn take_full_upload(&mut self) -> bool {
        std::mem::take(&mut self.full_upload_pending)
    }

    /// Returns `false` if every device is excluded from writes.
    pub fn has_active_device(&self) -> bool {
        self.fan_out.mask().map_or(true, |mask| !mask.is_empty())
    }

    /// The current device mask, or `None` without multicast.
    pub fn device_mask(&self) -> Option<DeviceMask> {
        self.fan_out.mask()
    }

    /// The current state.
    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Write counters since creation or the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Zeroes the write counters.
    pub fn reset_stats(&mut self) {
        self.stats = WriteStats::default();
    }

    /// The device buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Size of the device buffer.
    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    /// The batching strategy.
    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// The device strategy.
    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }
}

impl Drop for ParameterRenderer {
    fn drop(&mut self) {
        if let Err(err) = self.device.destroy_buffer(self.buffer) {
            log::warn!(
                "ParameterRenderer '{}': failed to destroy buffer on drop: {}",
                self.label,
                err
            );
        }
    }
}

fn create_parameter_buffer(
    device: &dyn ParameterDevice,
    label: &str,
    size: u64,
) -> Result<BufferId, ResourceError> {
    device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Borrowed(label)),
        size,
        usage: BufferUsage::UNIFORM | BufferUsage::STORAGE | BufferUsage::COPY_DST,
    })
}
