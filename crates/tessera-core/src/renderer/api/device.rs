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

//! Device selection for multicast writes.

use std::fmt;

/// The largest number of devices a [`DeviceMask`] can address.
pub const MAX_DEVICES: u32 = 32;

/// A set of device indices, one bit per physical device.
///
/// A multicast write is applied to every device whose bit is set. Removing a
/// device from the mask excludes it from future writes without touching the
/// stream of write descriptors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceMask(u32);

impl DeviceMask {
    /// A mask selecting no device.
    pub const NONE: Self = Self(0);

    /// Builds a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// A mask selecting devices `0..count`.
    pub const fn all(count: u32) -> Self {
        if count >= MAX_DEVICES {
            Self(u32::MAX)
        } else {
            Self((1u32 << count) - 1)
        }
    }

    /// A mask selecting exactly one device.
    pub fn single(device: u32) -> Self {
        debug_assert!(device < MAX_DEVICES, "OutOfBounds: device {device}");
        Self(1u32 << device)
    }

    /// Builds a mask from a list of device indices.
    pub fn from_devices(devices: &[u32]) -> Self {
        devices
            .iter()
            .fold(Self::NONE, |mask, &device| mask.with(device))
    }

    /// Returns `true` if `device` is selected.
    pub const fn contains(&self, device: u32) -> bool {
        device < MAX_DEVICES && (self.0 & (1u32 << device)) != 0
    }

    /// Returns a copy with `device` selected.
    #[must_use]
    pub fn with(self, device: u32) -> Self {
        debug_assert!(device < MAX_DEVICES, "OutOfBounds: device {device}");
        Self(self.0 | (1u32 << device))
    }

    /// Selects `device`.
    pub fn insert(&mut self, device: u32) {
        *self = self.with(device);
    }

    /// Deselects `device`.
    pub fn remove(&mut self, device: u32) {
        if device < MAX_DEVICES {
            self.0 &= !(1u32 << device);
        }
    }

    /// Returns the devices selected by both masks.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns `true` if no device is selected.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of selected devices.
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the selected device indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        let bits = self.0;
        (0..MAX_DEVICES).filter(move |device| bits & (1u32 << device) != 0)
    }
}

impl fmt::Debug for DeviceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selects_leading_devices() {
        assert_eq!(DeviceMask::all(0), DeviceMask::NONE);
        assert_eq!(DeviceMask::all(4).bits(), 0b1111);
        assert_eq!(DeviceMask::all(MAX_DEVICES).bits(), u32::MAX);
    }

    #[test]
    fn insert_remove_and_iterate() {
        let mut mask = DeviceMask::from_devices(&[0, 2]);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(2));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2]);

        mask.insert(3);
        mask.remove(0);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(mask.count(), 2);
        assert_eq!(format!("{mask:?}"), "{2, 3}");
    }

    #[test]
    fn intersection_restricts_to_present_devices() {
        let requested = DeviceMask::from_devices(&[0, 2, 5]);
        let present = DeviceMask::all(4);
        assert_eq!(
            requested.intersection(present),
            DeviceMask::from_devices(&[0, 2])
        );
        assert!(!DeviceMask::all(4).contains(40));
    }
}
