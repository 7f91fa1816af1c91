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

//! Flattened parameter storage and its dirty-range stream.
//!
//! A [`ParameterLayout`] describes the byte layout of one parameter group
//! (a material block, a per-instance transform block, ...). Every container
//! registered with a [`ParameterCache`] gets its own copy of that layout inside one
//! contiguous arena, at an aligned base offset that doubles as the destination
//! offset in the device buffer.
//!
//! Each frame, [`ParameterCache::stream_dirty`] produces the ordered
//! [`WriteDescriptor`]s for every dirty entry, coalescing byte-adjacent entries of
//! the same container. The dirty flags are only cleared when the resulting
//! [`StreamReceipt`] is committed, i.e. after the device writes succeeded.

mod cache;
mod error;
mod layout;
mod stream;

pub use self::cache::{ContainerId, ParameterCache};
pub use self::error::CacheError;
pub use self::layout::{EntryId, ParameterEntry, ParameterLayout, ParameterLayoutBuilder};
pub use self::stream::{ParameterCacheStream, StreamReceipt, WriteDescriptor};
