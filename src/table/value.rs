// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

mod private {
    // Sealed trait to prevent external implementations of CounterValue.
    pub trait Sealed {}
}

/// Fixed-width unsigned counter stored in an [`ArrayTable`](super::ArrayTable).
pub trait CounterValue: private::Sealed + Copy + Ord + Default + std::fmt::Debug {
    /// Zero value for counters.
    const ZERO: Self;

    /// Largest representable count; increments saturate here.
    const MAX: Self;

    /// Widens into `u64`.
    fn to_u64(self) -> u64;

    /// Narrows from `u64`, saturating at [`Self::MAX`].
    fn from_u64_saturating(value: u64) -> Self;

    /// Adds a signed amount, clamping into `[0, MAX]`.
    fn add_clamped(self, amount: i64) -> Self;
}

macro_rules! impl_counter {
    ($name:ty) => {
        impl private::Sealed for $name {}

        impl CounterValue for $name {
            const ZERO: Self = 0;
            const MAX: Self = <$name>::MAX;

            #[inline(always)]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn from_u64_saturating(value: u64) -> Self {
                if value > Self::MAX as u64 {
                    Self::MAX
                } else {
                    value as $name
                }
            }

            #[inline(always)]
            fn add_clamped(self, amount: i64) -> Self {
                Self::from_u64_saturating((self as u64).saturating_add_signed(amount))
            }
        }
    };
}

impl_counter!(u8);
impl_counter!(u16);
impl_counter!(u32);
impl_counter!(u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_clamped() {
        assert_eq!(250u8.add_clamped(10), 255);
        assert_eq!(3u8.add_clamped(-10), 0);
        assert_eq!(100u8.add_clamped(1_000), 255);
        assert_eq!(200u8.add_clamped(-1_000), 0);
        assert_eq!(u64::MAX.add_clamped(1), u64::MAX);
        assert_eq!(7u16.add_clamped(-2), 5);
    }

    #[test]
    fn test_from_u64_saturating() {
        assert_eq!(u8::from_u64_saturating(300), 255);
        assert_eq!(u32::from_u64_saturating(300), 300);
    }
}
