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

use tessera_core::renderer::{BufferId, DeviceMask, ParameterDevice, ResourceError};

/// Which devices receive a parameter write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Every write goes to the device's default target.
    SingleDevice,
    /// Every write is broadcast once to the devices selected by `mask`.
    Multicast {
        /// Number of devices the buffer is replicated on.
        device_count: u32,
        /// The devices currently receiving writes.
        mask: DeviceMask,
    },
}

impl FanOut {
    /// A multicast fan-out to all of `device_count` devices.
    pub fn multicast(device_count: u32) -> Self {
        FanOut::Multicast {
            device_count,
            mask: DeviceMask::all(device_count),
        }
    }

    /// Picks the fan-out for `device_count` devices.
    pub fn for_device_count(device_count: u32) -> Self {
        if device_count > 1 {
            Self::multicast(device_count)
        } else {
            FanOut::SingleDevice
        }
    }

    /// Number of devices written to when every device is enabled.
    pub fn device_count(&self) -> u32 {
        match self {
            FanOut::SingleDevice => 1,
            FanOut::Multicast { device_count, .. } => *device_count,
        }
    }

    /// The current device mask, or `None` for a single device.
    pub fn mask(&self) -> Option<DeviceMask> {
        match self {
            FanOut::SingleDevice => None,
            FanOut::Multicast { mask, .. } => Some(*mask),
        }
    }

    /// Includes or excludes one device from subsequent writes.
    ///
    /// ## Errors
    /// * `ResourceError::DeviceUnavailable` - If `device` is not part of the fan-out.
    pub fn set_device_enabled(&mut self, device: u32, enabled: bool) -> Result<(), ResourceError> {
        match self {
            FanOut::Multicast { device_count, mask } if device < *device_count => {
                if enabled {
                    mask.insert(device);
                } else {
                    mask.remove(device);
                }
                Ok(())
            }
            FanOut::SingleDevice if device == 0 && enabled => Ok(()),
            _ => Err(ResourceError::DeviceUnavailable(device)),
        }
    }

    /// Issues one device call writing `data` at `offset`.
    ///
    /// Returns the number of device calls made: a multicast with an empty mask
    /// writes nothing.
    pub(crate) fn write(
        &self,
        device: &dyn ParameterDevice,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<u64, ResourceError> {
        match self {
            FanOut::SingleDevice => device.write_buffer(buffer, offset, data).map(|_| 1),
            FanOut::Multicast { mask, .. } if mask.is_empty() => Ok(0),
            FanOut::Multicast { mask, .. } => device
                .write_buffer_multicast(*mask, buffer, offset, data)
                .map(|_| 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_device_for_one_device() {
        assert_eq!(FanOut::for_device_count(1), FanOut::SingleDevice);
        assert_eq!(FanOut::SingleDevice.mask(), None);
    }

    #[test]
    fn disabling_devices_updates_the_mask() {
        let mut fan_out = FanOut::for_device_count(4);
        fan_out.set_device_enabled(1, false).unwrap();
        fan_out.set_device_enabled(3, false).unwrap();
        assert_eq!(fan_out.mask(), Some(DeviceMask::from_devices(&[0, 2])));
        assert_eq!(
            fan_out.set_device_enabled(4, true),
            Err(ResourceError::DeviceUnavailable(4))
        );
    }

    #[test]
    fn single_device_cannot_be_disabled() {
        let mut fan_out = FanOut::SingleDevice;
        assert!(fan_out.set_device_enabled(0, true).is_ok());
        assert!(fan_out.set_device_enabled(0, false).is_err());
    }
}
