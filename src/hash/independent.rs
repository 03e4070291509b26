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

use crate::hash::HashFamily;
use crate::hash::fold_seed;
use crate::hash::murmur128;
use crate::hash::splitmix64;

/// One independently seeded MurmurHash3 evaluation per row.
///
/// Costs `depth` hash evaluations per item and gives the strongest
/// independence between rows.
#[derive(Debug, Clone, Default)]
pub struct IndependentHashing {
    width: usize,
    row_seeds: Vec<u32>,
}

impl IndependentHashing {
    /// Creates an unconfigured family.
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-row MurmurHash3 seeds, one per row.
    pub fn row_seeds(&self) -> &[u32] {
        &self.row_seeds
    }
}

impl HashFamily for IndependentHashing {
    fn configure(&mut self, depth: usize, width: usize, seed: u64) {
        let mut state = seed;
        let mut row_seeds: Vec<u32> = Vec::with_capacity(depth);
        while row_seeds.len() < depth {
            let candidate = fold_seed(splitmix64(&mut state));
            // two rows sharing a seed would always collide together
            if !row_seeds.contains(&candidate) {
                row_seeds.push(candidate);
            }
        }
        self.width = width;
        self.row_seeds = row_seeds;
    }

    fn hash(&self, bytes: &[u8]) -> Vec<usize> {
        let width = self.width as u64;
        self.row_seeds
            .iter()
            .map(|&seed| {
                let (h1, _) = murmur128(bytes, seed);
                (h1 % width) as usize
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "independent"
    }
}
