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

//! # Tessera Data
//!
//! Data layouts of the parameter pipeline: the [`DirtySet`] bitset, the flattened
//! [`TransformTree`] and the [`ParameterCache`] with its dirty-range stream.

#![warn(missing_docs)]

pub mod dirty;
pub mod parameters;
pub mod transform;

pub use dirty::DirtySet;
pub use parameters::{
    CacheError, ContainerId, EntryId, ParameterCache, ParameterCacheStream, ParameterLayout,
    StreamReceipt, WriteDescriptor,
};
pub use transform::{HierarchyError, TransformIndex, TransformTree};
