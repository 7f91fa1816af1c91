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

use super::parameter_renderer::ParameterRenderer;
use anyhow::Context;
use std::sync::Arc;
use tessera_core::renderer::{ParameterDevice, RenderError};
use tessera_core::settings::StreamSettings;
use tessera_data::{CacheError, ContainerId, ParameterCache};

/// An error raised while driving a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The device rejected a write or a bind.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A container passed to the frame is unknown to the cache.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What one [`FrameDriver::flush_dirty`] call pushed to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Write descriptors produced by the cache.
    pub descriptors: usize,
    /// Dirty entries covered by the descriptors.
    pub entries: usize,
    /// Bytes covered by the descriptors.
    pub bytes: u64,
    /// Entries whose dirty flag was cleared.
    pub cleared: usize,
}

/// Owns the parameter cache and renderer of one rendering context and sequences
/// them through a frame: `begin_frame`, `flush_dirty`, then `render` per pass.
#[derive(Debug)]
pub struct FrameDriver {
    cache: ParameterCache,
    renderer: ParameterRenderer,
    frame: u64,
}

impl FrameDriver {
    /// Validates `settings` and builds the cache and renderer of a context.
    pub fn new(
        device: Arc<dyn ParameterDevice>,
        settings: &StreamSettings,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let cache = ParameterCache::from_settings(settings);
        let renderer = ParameterRenderer::new(device, settings, cache.required_size())
            .with_context(|| format!("failed to create renderer '{}'", settings.label))?;
        Ok(Self {
            cache,
            renderer,
            frame: 0,
        })
    }

    /// Prepares a frame: grows the device buffer if the cache outgrew it.
    ///
    /// After a resize, or once a disabled device was enabled again, every cache
    /// entry is marked dirty so the next [`flush_dirty`](Self::flush_dirty) fills
    /// every replica.
    pub fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.frame += 1;
        self.ensure_capacity()?;
        log::trace!("FrameDriver: frame {} begins.", self.frame);
        Ok(())
    }

    fn ensure_capacity(&mut self) -> Result<(), RenderError> {
        let resized = self.renderer.resize(self.cache.required_size())?;
        let rejoined = self.renderer.take_full_upload();
        if resized || rejoined {
            self.cache.mark_all_dirty();
        }
        Ok(())
    }

    /// Streams every dirty cache entry to the device.
    ///
    /// Dirty flags are cleared only once every write succeeded. On failure nothing
    /// is cleared, so the next call retries the same writes. Containers registered
    /// since `begin_frame` may have grown the cache; the buffer is resized first.
    /// With every device excluded nothing is written and nothing is cleared.
    pub fn flush_dirty(&mut self) -> Result<FrameReport, FrameError> {
        self.ensure_capacity()?;
        let stream = self.cache.stream_dirty();
        let mut report = FrameReport {
            descriptors: stream.len(),
            entries: stream.entry_count(),
            bytes: stream.total_bytes(),
            cleared: 0,
        };
        if !stream.is_empty() && !self.renderer.has_active_device() {
            log::warn!(
                "FrameDriver: frame {} has no enabled device, {} entries stay dirty.",
                self.frame,
                report.entries
            );
            return Ok(report);
        }

        let written = self
            .renderer
            .update(stream.descriptors())
            .and_then(|()| self.renderer.flush());
        if let Err(err) = written {
            log::error!(
                "FrameDriver: flush of frame {} failed, dirty state kept: {}",
                self.frame,
                err
            );
            return Err(err.into());
        }

        let receipt = stream.finish();
        report.cleared = self.cache.commit(receipt);
        log::debug!(
            "FrameDriver: frame {} flushed {} entries as {} writes ({} bytes).",
            self.frame,
            report.entries,
            report.descriptors,
            report.bytes
        );
        Ok(report)
    }

    /// Binds the parameter range of each container of a render pass, in order.
    pub fn render(&mut self, pass: &[ContainerId]) -> Result<(), FrameError> {
        for &container in pass {
            let range = self.cache.container_range(container)?;
            self.renderer.render(range)?;
        }
        Ok(())
    }

    /// The parameter cache.
    pub fn cache(&self) -> &ParameterCache {
        &self.cache
    }

    /// Mutable access to the parameter cache, for scene writes.
    pub fn cache_mut(&mut self) -> &mut ParameterCache {
        &mut self.cache
    }

    /// The renderer.
    pub fn renderer(&self) -> &ParameterRenderer {
        &self.renderer
    }

    /// Mutable access to the renderer, e.g. to toggle devices.
    pub fn renderer_mut(&mut self) -> &mut ParameterRenderer {
        &mut self.renderer
    }

    /// Number of frames begun.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}
