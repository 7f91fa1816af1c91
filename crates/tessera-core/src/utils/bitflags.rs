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

//! A macro to declare typed flag sets without pulling in an extra dependency.

/// Declares a `Copy` flag-set newtype with named constants and bitwise operators.
#[macro_export]
#[doc(hidden)]
macro_rules! tessera_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// An empty set of flags.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Builds a flag set from raw bits, keeping unknown bits.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut first = true;
                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    if ($flag_value != 0) && (remaining & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        remaining &= !$flag_value;
                        first = false;
                    }
                )*
                if remaining != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", remaining)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::tessera_bitflags;

    tessera_bitflags! {
        /// Flags used only by these tests.
        pub struct Access: u8 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
        }
    }

    #[test]
    fn combine_and_query() {
        let mut access = Access::READ;
        assert!(!access.contains(Access::WRITE));
        access |= Access::WRITE;
        assert!(access.contains(Access::READ | Access::WRITE));
        access.remove(Access::READ);
        assert_eq!(access, Access::WRITE);
        assert!(access.intersects(Access::WRITE | Access::READ));
    }

    #[test]
    fn debug_lists_named_and_unknown_bits() {
        assert_eq!(format!("{:?}", Access::EMPTY), "Access { EMPTY }");
        assert_eq!(
            format!("{:?}", Access::READ | Access::WRITE),
            "Access { READ | WRITE }"
        );
        assert_eq!(
            format!("{:?}", Access::from_bits_truncate(0b101)),
            "Access { READ | UNKNOWN(0x4) }"
        );
    }
}
