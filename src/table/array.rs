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
use crate::table::CounterTable;
use crate::table::CounterValue;
use crate::table::checked_len;
use crate::table::try_zeroed;

/// Row-major matrix of fixed-width counters.
///
/// Row totals are cached so count-mean estimation reads them in O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayTable<C> {
    depth: usize,
    width: usize,
    counters: Box<[C]>,
    row_totals: Box<[u64]>,
}

impl<C: CounterValue> ArrayTable<C> {
    /// Allocates a zero-filled `depth × width` table.
    ///
    /// # Panics
    ///
    /// Panics if `depth * width` overflows or the allocation fails; use
    /// [`try_new`](Self::try_new) for shapes derived from user input.
    pub fn new(depth: usize, width: usize) -> Self {
        Self {
            depth,
            width,
            counters: vec![C::ZERO; depth * width].into_boxed_slice(),
            row_totals: vec![0u64; depth].into_boxed_slice(),
        }
    }

    /// Allocates a zero-filled `depth × width` table, reporting a shape that
    /// does not fit in memory as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `depth * width` overflows or the counters cannot be allocated.
    pub fn try_new(depth: usize, width: usize) -> Result<Self, Error> {
        let len = checked_len(depth, width)?;
        Ok(Self {
            depth,
            width,
            counters: try_zeroed(len, C::ZERO)?,
            row_totals: try_zeroed(depth, 0u64)?,
        })
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.depth && col < self.width);
        row * self.width + col
    }

    /// Returns the counters of one row.
    pub fn row(&self, row: usize) -> &[C] {
        let start = row * self.width;
        &self.counters[start..start + self.width]
    }

    /// Get the total number of bytes used by the counters
    pub fn size_bytes(&self) -> usize {
        self.counters.len() * std::mem::size_of::<C>()
    }
}

impl<C: CounterValue> CounterTable for ArrayTable<C> {
    fn shape(&self) -> (usize, usize) {
        (self.depth, self.width)
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> u64 {
        self.counters[self.index(row, col)].to_u64()
    }

    fn increment(&mut self, row: usize, col: usize, amount: i64) -> u64 {
        let idx = self.index(row, col);
        let old = self.counters[idx];
        let new = old.add_clamped(amount);
        self.counters[idx] = new;

        let (old, new) = (old.to_u64(), new.to_u64());
        let total = &mut self.row_totals[row];
        if new >= old {
            *total = total.saturating_add(new - old);
        } else {
            *total = total.saturating_sub(old - new);
        }
        new
    }

    fn reset(&mut self) {
        self.counters.fill(C::ZERO);
        self.row_totals.fill(0);
    }

    fn max_value(&self) -> u64 {
        C::MAX.to_u64()
    }

    fn set(&mut self, row: usize, col: usize, value: u64) {
        let idx = self.index(row, col);
        let old = self.counters[idx].to_u64();
        let new = C::from_u64_saturating(value);
        self.counters[idx] = new;

        let new = new.to_u64();
        let total = &mut self.row_totals[row];
        if new >= old {
            *total = total.saturating_add(new - old);
        } else {
            *total = total.saturating_sub(old - new);
        }
    }

    fn row_total(&self, row: usize) -> u64 {
        self.row_totals[row]
    }

    fn scale(&mut self, factor: f64) {
        for row in 0..self.depth {
            let start = row * self.width;
            let mut total = 0u64;
            for counter in &mut self.counters[start..start + self.width] {
                let value = counter.to_u64();
                let scaled = ((value as f64) * factor).floor();
                let scaled = if scaled <= 0.0 {
                    0
                } else {
                    (scaled as u64).min(value)
                };
                *counter = C::from_u64_saturating(scaled);
                total = total.saturating_add(scaled);
            }
            self.row_totals[row] = total;
        }
    }
}
