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

//! Provides the primitives that turn scene edits into tracking updates.
//!
//! A scene entity is attached to a [`ChangeObserver`] together with a small
//! payload (usually a slot index of a flattened tracking structure). When the
//! entity signals a [`ChangeEvent`], the observer's [`NotifyHandler`] receives the
//! payload and records the change. Nothing is recomputed at notification time.
//!
//! The [`ChangeFeed`] replicates the stream of notifications to several rendering
//! contexts, each of which keeps its own observer and dirty state.

mod feed;
mod observer;

pub use self::feed::{ChangeFeed, ChangeNotification, ChangeReceiver};
pub use self::observer::{
    ChangeEvent, ChangeKind, ChangeObserver, NodeId, NotifyHandler, ObserverError,
};
