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

//! # Tessera Lanes
//!
//! Hot paths of the parameter pipeline.
//!
//! - [`scene_lane`] turns scene notifications into dirty transform marks and writes
//!   recomputed world matrices into the parameter cache.
//! - [`render_lane`] drains the cache into device writes through the
//!   [`ParameterRenderer`](render_lane::ParameterRenderer) strategies and drives
//!   one frame at a time.

#![warn(missing_docs)]

pub mod render_lane;
pub mod scene_lane;
