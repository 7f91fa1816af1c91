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

//! Construction-time settings of a parameter streaming context.

use crate::renderer::api::{MAX_DEVICES, MIN_UNIFORM_ALIGNMENT};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How much backing storage a parameter cache may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CacheCapacity {
    /// The cache never grows; registering a container past `bytes` fails.
    Fixed {
        /// Total capacity in bytes.
        bytes: u64,
    },
    /// The cache starts at `initial_bytes` and grows on demand.
    Growable {
        /// Initial capacity in bytes.
        initial_bytes: u64,
    },
}

impl CacheCapacity {
    /// The number of bytes to reserve up front.
    pub fn initial_bytes(&self) -> u64 {
        match *self {
            CacheCapacity::Fixed { bytes } => bytes,
            CacheCapacity::Growable { initial_bytes } => initial_bytes,
        }
    }

    /// Returns `true` if the storage may grow past its initial size.
    pub fn is_growable(&self) -> bool {
        matches!(self, CacheCapacity::Growable { .. })
    }
}

impl Default for CacheCapacity {
    fn default() -> Self {
        CacheCapacity::Growable {
            initial_bytes: 64 * 1024,
        }
    }
}

/// Settings of one rendering context's parameter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Debug label used for device buffers and log lines.
    pub label: String,
    /// If `true`, writes are staged and submitted as fewer, larger transfers.
    pub batching: bool,
    /// Staging budget of the batched policy before an intermediate submission.
    pub max_batch_bytes: u64,
    /// Number of devices the parameter buffer is replicated on. `1` disables multicast.
    pub device_count: u32,
    /// Backing-store capacity policy of the parameter cache.
    pub capacity: CacheCapacity,
    /// Alignment of each container's base offset, so containers can be bound as ranges.
    pub container_alignment: u32,
    /// Binding index the parameter buffer ranges are bound at.
    pub binding_index: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            label: "Parameters".to_string(),
            batching: false,
            max_batch_bytes: 256 * 1024,
            device_count: 1,
            capacity: CacheCapacity::default(),
            container_alignment: MIN_UNIFORM_ALIGNMENT,
            binding_index: 0,
        }
    }
}

impl StreamSettings {
    /// Returns `true` if writes fan out to more than one device.
    pub fn is_multicast(&self) -> bool {
        self.device_count > 1
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_DEVICES).contains(&self.device_count),
            "device_count must be within 1..={MAX_DEVICES}, got {}",
            self.device_count
        );
        ensure!(
            self.container_alignment.is_power_of_two(),
            "container_alignment must be a power of two, got {}",
            self.container_alignment
        );
        ensure!(self.max_batch_bytes > 0, "max_batch_bytes must be non-zero");
        Ok(())
    }

    /// Loads settings from a JSON string. Missing fields take their default value.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(json).context("invalid stream settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Saves settings to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
