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

//! Update rules deciding how much each of an item's cells grows.
//!
//! A rule sees the current values of the `depth` cells an item hashes to and
//! returns one signed delta per cell. It never touches the table itself, so a
//! rejected update leaves the sketch unchanged.

use crate::error::Error;

/// Computes per-cell deltas for an update.
pub trait UpdateRule {
    /// Returns one delta per entry of `current`, or an error if `amount` is not
    /// acceptable for this rule.
    fn deltas(&self, current: &[u64], amount: i64) -> Result<Vec<i64>, Error>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// Adds the full amount to every cell.
///
/// The only rule accepting zero or negative amounts; counters clamp at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularUpdate;

impl UpdateRule for RegularUpdate {
    fn deltas(&self, current: &[u64], amount: i64) -> Result<Vec<i64>, Error> {
        Ok(vec![amount; current.len()])
    }

    fn name(&self) -> &'static str {
        "regular"
    }
}

/// Conservative update: raise only the cells below the new minimum.
///
/// With `m` the smallest current cell, every cell becomes
/// `max(value, m + amount)`. The minimum grows by exactly `amount` while the
/// other cells grow as little as possible, so min-based estimates are never
/// larger than with [`RegularUpdate`].
///
/// See Estan and Varghese (2002); Goyal and Daumé (2010).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeUpdate;

impl UpdateRule for ConservativeUpdate {
    fn deltas(&self, current: &[u64], amount: i64) -> Result<Vec<i64>, Error> {
        if amount <= 0 {
            return Err(Error::invalid_argument(
                "conservative update requires a positive amount",
            )
            .with_context("amount", amount));
        }
        let Some(&min) = current.iter().min() else {
            return Ok(Vec::new());
        };
        let target = min.saturating_add(amount as u64);
        Ok(current
            .iter()
            .map(|&value| {
                if value < target {
                    (target - value).min(i64::MAX as u64) as i64
                } else {
                    0
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "conservative"
    }
}
