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

//! Hash families mapping an item's bytes to one column per table row.
//!
//! - [`IndependentHashing`] evaluates one seeded MurmurHash3 per row.
//! - [`PairedHashing`] evaluates MurmurHash3 once and derives every row's column
//!   from the two 64-bit halves (Kirsch-Mitzenmacher double hashing).
//!
//! A family is configured once by the sketch that owns it and is pure
//! afterwards: the same bytes always produce the same columns.

mod independent;
mod paired;

pub use self::independent::IndependentHashing;
pub use self::paired::PairedHashing;

use crate::error::Error;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 9001;

/// Derives `depth` column indices in `[0, width)` from an item's bytes.
pub trait HashFamily {
    /// Fixes the table shape and seed. Called once by the owning sketch.
    fn configure(&mut self, depth: usize, width: usize, seed: u64);

    /// Returns one column per row for the given item encoding.
    fn hash(&self, bytes: &[u8]) -> Vec<usize>;

    /// Width this family wants for a requested width.
    ///
    /// The sketch calls this before [`configure`](Self::configure); a family
    /// may only widen the table.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if the widened table cannot be addressed.
    fn preferred_width(&self, width: usize) -> Result<usize, Error> {
        Ok(width)
    }

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// Computes both 64-bit halves of MurmurHash3 x64/128.
#[inline]
pub(crate) fn murmur128(bytes: &[u8], seed: u32) -> (u64, u64) {
    mur3::murmurhash3_x64_128(bytes, seed)
}

/// Folds a 64-bit sketch seed into the 32-bit seed MurmurHash3 takes.
#[inline]
pub(crate) fn fold_seed(seed: u64) -> u32 {
    ((seed >> 32) ^ seed) as u32
}

pub(crate) fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn families() -> Vec<Box<dyn HashFamily>> {
        vec![
            Box::new(IndependentHashing::new()),
            Box::new(PairedHashing::new()),
        ]
    }

    #[test]
    fn test_columns_in_range_and_deterministic() {
        for mut family in families() {
            let width = family.preferred_width(28).unwrap();
            family.configure(5, width, DEFAULT_SEED);
            for i in 0..500u32 {
                let bytes = i.to_le_bytes();
                let columns = family.hash(&bytes);
                assert_eq!(columns.len(), 5, "{}", family.name());
                assert!(columns.iter().all(|&c| c < width));
                assert_eq!(columns, family.hash(&bytes));
            }
        }
    }

    #[test]
    fn test_seed_changes_columns() {
        for mut family in families() {
            let mut other = if family.name() == "independent" {
                Box::new(IndependentHashing::new()) as Box<dyn HashFamily>
            } else {
                Box::new(PairedHashing::new())
            };
            family.configure(4, 1009, 1);
            other.configure(4, 1009, 2);
            let differing = (0..100u32)
                .filter(|i| family.hash(&i.to_le_bytes()) != other.hash(&i.to_le_bytes()))
                .count();
            assert!(differing > 90, "{}: {differing}", family.name());
        }
    }

    #[test]
    fn test_splitmix_is_deterministic() {
        let mut a = 42;
        let mut b = 42;
        assert_eq!(splitmix64(&mut a), splitmix64(&mut b));
        assert_ne!(splitmix64(&mut a), 42);
    }
}
