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

//! # Tessera Core
//!
//! Foundational crate containing the traits, core types and interface contracts
//! shared by the incremental parameter pipeline.
//!
//! - [`renderer`] describes the device boundary: buffers, device masks and the
//!   [`ParameterDevice`](renderer::ParameterDevice) trait a backend implements.
//! - [`event`] holds the change-notification machinery that turns scene edits
//!   into dirty marks.
//! - [`settings`] holds the construction-time knobs of a rendering context.

#![warn(missing_docs)]

pub mod event;
pub mod renderer;
pub mod settings;
pub mod utils;

pub use event::{ChangeEvent, ChangeKind, ChangeObserver, NodeId, NotifyHandler};
pub use settings::{CacheCapacity, StreamSettings};
