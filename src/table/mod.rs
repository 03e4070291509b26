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

//! Counter tables backing a sketch.
//!
//! A counter table is a dense `depth × width` grid of non-negative counters.
//! Every backend saturates at its largest representable value instead of
//! wrapping and clamps at zero when a negative amount is applied, so update,
//! decay and estimation strategies behave the same on every backend.
//!
//! Two backends are provided, selected through [`TableBackend`]:
//!
//! - [`ArrayTable`]: a contiguous row-major matrix of `u8`, `u16`, `u32` or `u64`
//!   counters.
//! - [`PackedTable`]: counters of any width between 1 and 32 bits packed into
//!   64-bit words.
//!
//! Callers may implement [`CounterTable`] for their own storage and install it
//! with [`SketchBuilder::custom_table`](crate::SketchBuilder::custom_table).

mod array;
mod packed;
mod value;

pub use self::array::ArrayTable;
pub use self::packed::PackedTable;
pub use self::value::CounterValue;

use crate::error::Error;

/// Behavioral contract of a sketch's counter grid.
pub trait CounterTable {
    /// Returns `(depth, width)`.
    fn shape(&self) -> (usize, usize);

    /// Returns the counter at `(row, col)`.
    fn get(&self, row: usize, col: usize) -> u64;

    /// Adds `amount` to the counter at `(row, col)` and returns the new value.
    ///
    /// The result saturates at [`max_value`](Self::max_value) and never drops
    /// below zero.
    fn increment(&mut self, row: usize, col: usize, amount: i64) -> u64;

    /// Zeroes every counter.
    fn reset(&mut self);

    /// Largest value a counter can hold.
    fn max_value(&self) -> u64;

    /// Overwrites the counter at `(row, col)`, saturating at the maximum.
    fn set(&mut self, row: usize, col: usize, value: u64) {
        let target = value.min(self.max_value());
        let mut current = self.get(row, col);
        // a single increment moves at most i64::MAX
        while current != target {
            let next = if target > current {
                self.increment(row, col, clamp_delta(target - current))
            } else {
                self.increment(row, col, -clamp_delta(current - target))
            };
            if next == current {
                break;
            }
            current = next;
        }
    }

    /// Sum of all counters in `row`, saturating.
    fn row_total(&self, row: usize) -> u64 {
        let (_, width) = self.shape();
        (0..width).fold(0u64, |acc, col| acc.saturating_add(self.get(row, col)))
    }

    /// Sum of all counters, saturating.
    fn total(&self) -> u64 {
        let (depth, _) = self.shape();
        (0..depth).fold(0u64, |acc, row| acc.saturating_add(self.row_total(row)))
    }

    /// Replaces every counter `v` with `floor(v * factor)`.
    ///
    /// `factor` is expected in `(0, 1)`; counters never grow.
    fn scale(&mut self, factor: f64) {
        let (depth, width) = self.shape();
        for row in 0..depth {
            for col in 0..width {
                let value = self.get(row, col);
                if value == 0 {
                    continue;
                }
                let scaled = ((value as f64) * factor).floor();
                let scaled = if scaled <= 0.0 {
                    0
                } else {
                    (scaled as u64).min(value)
                };
                self.set(row, col, scaled);
            }
        }
    }

    /// Replaces every counter `v` with `v / 2`, rounding down.
    fn halve(&mut self) {
        let (depth, width) = self.shape();
        for row in 0..depth {
            for col in 0..width {
                let value = self.get(row, col);
                if value > 0 {
                    self.set(row, col, value >> 1);
                }
            }
        }
    }

    /// Decrements by one every counter in `(0, upper]`; `None` means no upper bound.
    fn decrement_range(&mut self, upper: Option<u64>) {
        let upper = upper.unwrap_or(u64::MAX);
        let (depth, width) = self.shape();
        for row in 0..depth {
            for col in 0..width {
                let value = self.get(row, col);
                if value > 0 && value <= upper {
                    self.increment(row, col, -1);
                }
            }
        }
    }

    /// Flattens the table row by row.
    fn to_vec(&self) -> Vec<u64> {
        let (depth, width) = self.shape();
        let mut out = Vec::with_capacity(depth * width);
        for row in 0..depth {
            for col in 0..width {
                out.push(self.get(row, col));
            }
        }
        out
    }
}

/// Counter storage selected when building a sketch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TableBackend {
    /// 8-bit counters, saturating at 255.
    U8,
    /// 16-bit counters.
    U16,
    /// 32-bit counters.
    #[default]
    U32,
    /// 64-bit counters.
    U64,
    /// Bit-packed counters of `bits` bits each, `bits` in `[1, 32]`.
    Packed {
        /// Width of each counter in bits.
        bits: u8,
    },
}

impl TableBackend {
    /// Allocates a zero-filled table of the given shape.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if the shape is empty or too large to allocate, or the packed counter
    /// width is out of range.
    pub fn allocate(self, depth: usize, width: usize) -> Result<Box<dyn CounterTable>, Error> {
        if depth == 0 || width == 0 {
            return Err(Error::config_invalid("table depth and width must be at least 1")
                .with_context("depth", depth)
                .with_context("width", width));
        }
        Ok(match self {
            TableBackend::U8 => Box::new(ArrayTable::<u8>::try_new(depth, width)?),
            TableBackend::U16 => Box::new(ArrayTable::<u16>::try_new(depth, width)?),
            TableBackend::U32 => Box::new(ArrayTable::<u32>::try_new(depth, width)?),
            TableBackend::U64 => Box::new(ArrayTable::<u64>::try_new(depth, width)?),
            TableBackend::Packed { bits } => Box::new(PackedTable::new(depth, width, bits)?),
        })
    }
}

fn clamp_delta(delta: u64) -> i64 {
    delta.min(i64::MAX as u64) as i64
}

/// Returns `rows * per_row`, or an error if it overflows `usize`.
pub(crate) fn checked_len(rows: usize, per_row: usize) -> Result<usize, Error> {
    rows.checked_mul(per_row).ok_or_else(|| {
        Error::config_invalid("table size overflows usize")
            .with_context("rows", rows)
            .with_context("per_row", per_row)
    })
}

/// Allocates `len` copies of `zero` without aborting when memory runs out.
pub(crate) fn try_zeroed<T: Copy>(len: usize, zero: T) -> Result<Box<[T]>, Error> {
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|err| {
        Error::config_invalid("cannot allocate counter table")
            .with_context("len", len)
            .set_source(err)
    })?;
    values.resize(len, zero);
    Ok(values.into_boxed_slice())
}
