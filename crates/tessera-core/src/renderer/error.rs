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

//! Defines the error types of the device boundary.

use std::fmt;

/// An error related to the creation or use of a device buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The buffer ID does not name a live buffer.
    NotFound,
    /// A write or bind range exceeds the buffer size.
    OutOfBounds,
    /// A write targeted a device that does not exist or was removed.
    DeviceUnavailable(u32),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::DeviceUnavailable(device) => {
                write!(f, "Device {device} is not available.")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// An error raised while pushing parameter data to the device or drawing with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A device write failed during a flush. The flush was aborted and the dirty
    /// state that produced the write is still pending.
    DeviceWriteFailed {
        /// Destination offset of the failed write.
        offset: u64,
        /// Length of the failed write in bytes.
        len: u64,
        /// The device-level cause.
        source: ResourceError,
    },
    /// A resource operation other than a parameter write failed.
    ResourceError(ResourceError),
    /// The renderer was asked to draw while it still holds unsubmitted writes.
    PendingWrites {
        /// Number of bytes waiting in the staging area.
        staged_bytes: u64,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::DeviceWriteFailed {
                offset,
                len,
                source,
            } => write!(
                f,
                "Device write of {len} bytes at offset {offset} failed: {source}"
            ),
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::PendingWrites { staged_bytes } => write!(
                f,
                "Cannot render while {staged_bytes} staged bytes are not flushed."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::DeviceWriteFailed { source, .. } => Some(source),
            RenderError::ResourceError(err) => Some(err),
            RenderError::PendingWrites { .. } => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn resource_error_display() {
        assert_eq!(
            format!("{}", ResourceError::DeviceUnavailable(3)),
            "Device 3 is not available."
        );
        assert_eq!(
            format!("{}", ResourceError::OutOfBounds),
            "Resource access out of bounds."
        );
    }

    #[test]
    fn device_write_failed_keeps_its_cause() {
        let err = RenderError::DeviceWriteFailed {
            offset: 256,
            len: 64,
            source: ResourceError::OutOfBounds,
        };
        assert_eq!(
            format!("{err}"),
            "Device write of 64 bytes at offset 256 failed: Resource access out of bounds."
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn render_error_wraps_resource_error() {
        let err: RenderError = ResourceError::NotFound.into();
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Resource not found with ID."
        );
        assert!(err.source().is_some());
    }
}
