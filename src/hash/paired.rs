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

use crate::error::Error;
use crate::hash::HashFamily;
use crate::hash::fold_seed;
use crate::hash::murmur128;

/// Double hashing: two base hashes, one cheap combination per row.
///
/// Row `i` uses column `(h1 + i * h2) mod width`, where `h1` and `h2` are the
/// two halves of a single MurmurHash3 x64/128 evaluation. `h2` is forced into
/// `[1, width)` and the table width is raised to a prime, so every stride
/// walks all columns before repeating.
///
/// See Kirsch and Mitzenmacher, "Less Hashing, Same Performance: Building a
/// Better Bloom Filter" (2008).
#[derive(Debug, Clone, Default)]
pub struct PairedHashing {
    depth: usize,
    width: usize,
    seed: u32,
}

impl PairedHashing {
    /// Creates an unconfigured family.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashFamily for PairedHashing {
    fn configure(&mut self, depth: usize, width: usize, seed: u64) {
        if depth > width {
            log::warn!(
                "paired hashing with depth {depth} > width {width}: rows will share columns"
            );
        }
        self.depth = depth;
        self.width = width;
        self.seed = fold_seed(seed);
    }

    fn hash(&self, bytes: &[u8]) -> Vec<usize> {
        let width = self.width as u128;
        let (h1, h2) = murmur128(bytes, self.seed);
        let first = h1 as u128 % width;
        let stride = if width > 1 {
            1 + (h2 as u128 % (width - 1))
        } else {
            0
        };
        (0..self.depth as u128)
            .map(|i| ((first + i * stride) % width) as usize)
            .collect()
    }

    fn preferred_width(&self, width: usize) -> Result<usize, Error> {
        next_prime(width).ok_or_else(|| {
            Error::config_invalid("no prime table width fits in usize").with_context("width", width)
        })
    }

    fn name(&self) -> &'static str {
        "paired"
    }
}

/// Smallest prime `>= n` (2 for `n <= 2`), or `None` past `usize::MAX`.
pub(crate) fn next_prime(n: usize) -> Option<usize> {
    if n <= 2 {
        return Some(2);
    }
    let mut candidate = if n % 2 == 0 { n.checked_add(1)? } else { n };
    while !is_prime(candidate) {
        candidate = candidate.checked_add(2)?;
    }
    Some(candidate)
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
