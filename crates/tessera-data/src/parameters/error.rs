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

use super::cache::ContainerId;
use super::layout::EntryId;
use std::fmt;

/// An error reported by the [`ParameterCache`](super::ParameterCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The supplied bytes do not match the declared entry length.
    SizeMismatch {
        /// The container being written.
        container: ContainerId,
        /// The entry being written.
        entry: EntryId,
        /// Declared length of the entry.
        expected: u64,
        /// Length of the supplied bytes.
        actual: u64,
    },
    /// The container does not exist or was removed.
    UnknownContainer(ContainerId),
    /// The entry is not part of the container's layout.
    UnknownEntry {
        /// The container being addressed.
        container: ContainerId,
        /// The missing entry.
        entry: EntryId,
    },
    /// A fixed-capacity cache cannot hold the new container.
    CapacityExceeded {
        /// Bytes the cache would need.
        requested: u64,
        /// Bytes the cache may use.
        capacity: u64,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::SizeMismatch {
                container,
                entry,
                expected,
                actual,
            } => write!(
                f,
                "Entry {} of container {} expects {expected} bytes, got {actual}",
                entry.0, container.0
            ),
            CacheError::UnknownContainer(container) => {
                write!(f, "Unknown parameter container {}", container.0)
            }
            CacheError::UnknownEntry { container, entry } => write!(
                f,
                "Container {} has no entry {}",
                container.0, entry.0
            ),
            CacheError::CapacityExceeded {
                requested,
                capacity,
            } => write!(
                f,
                "Parameter cache needs {requested} bytes but its capacity is {capacity}"
            ),
        }
    }
}

impl std::error::Error for CacheError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_display() {
        let err = CacheError::SizeMismatch {
            container: ContainerId(2),
            entry: EntryId(1),
            expected: 64,
            actual: 48,
        };
        assert_eq!(
            format!("{err}"),
            "Entry 1 of container 2 expects 64 bytes, got 48"
        );
    }
}
