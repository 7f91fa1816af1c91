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

//! Defines data structures related to GPU buffer resources.

use crate::tessera_bitflags;
use std::borrow::Cow;

tessera_bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    ///
    /// Parameter buffers are always written from the host, so every buffer the
    /// pipeline creates carries [`BufferUsage::COPY_DST`].
    pub struct BufferUsage: u32 {
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 0;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 1;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 3;
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// How the buffer will be used.
    pub usage: BufferUsage,
}

/// An opaque handle to a device buffer.
///
/// On a multi-device backend one handle names the replicated buffer on every
/// device; the device mask of a write selects which replicas are touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// A byte range inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferRange {
    /// Offset of the first byte.
    pub offset: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl BufferRange {
    /// Creates a new range.
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the range.
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Returns `true` if `other` starts exactly where `self` ends.
    pub const fn is_followed_by(&self, other: &BufferRange) -> bool {
        self.end() == other.offset
    }
}
