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

//! Plain data types exchanged with a [`ParameterDevice`](super::ParameterDevice).

pub mod buffer;
pub mod device;

pub use self::buffer::{BufferDescriptor, BufferId, BufferRange, BufferUsage};
pub use self::device::{DeviceMask, MAX_DEVICES};

/// Minimum offset alignment of a bound uniform range on most APIs.
pub const MIN_UNIFORM_ALIGNMENT: u32 = 256;
