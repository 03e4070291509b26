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

//! Estimators turning an item's cells into a single frequency estimate.
//!
//! - [`MinEstimator`]: the classic count-min point query. Never underestimates
//!   and, with probability at least `1 - δ`, overestimates by at most `ε·T`.
//! - [`CountMeanEstimator`]: subtracts each row's expected collision noise and
//!   takes the median; less biased, may underestimate.
//! - [`CountMeanMinEstimator`]: the count-mean estimate capped by the min
//!   estimate (count-mean-min, Goyal and Daumé 2012).
//! - [`LeastSquaresEstimator`]: solves a least-squares system over every item
//!   queried so far. Expensive; meant for offline refinement.

pub mod least_squares;

pub use self::least_squares::LeastSquaresEstimator;

use crate::table::CounterTable;

/// Computes a non-negative estimate from an item's cells.
pub trait Estimator {
    /// Estimates the count of the item hashing to `columns[row]` in each row.
    fn estimate(&self, table: &dyn CounterTable, columns: &[usize]) -> u64;

    /// Drops any state accumulated from earlier queries.
    fn reset(&mut self) {}

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// Minimum over the item's cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinEstimator;

impl Estimator for MinEstimator {
    fn estimate(&self, table: &dyn CounterTable, columns: &[usize]) -> u64 {
        min_cell(table, columns)
    }

    fn name(&self) -> &'static str {
        "min"
    }
}

/// Median of the noise-corrected cells.
///
/// For row `i` with cell value `c` and row total `R`, the candidate is
/// `c - (R - c) / (w - 1)`. The estimate is the median of the candidates
/// (the mean of the two middle ones for an even depth), clamped at zero and
/// rounded down.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountMeanEstimator;

impl Estimator for CountMeanEstimator {
    fn estimate(&self, table: &dyn CounterTable, columns: &[usize]) -> u64 {
        count_mean(table, columns)
    }

    fn name(&self) -> &'static str {
        "count-mean"
    }
}

/// `min(count-mean, min)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountMeanMinEstimator;

impl Estimator for CountMeanMinEstimator {
    fn estimate(&self, table: &dyn CounterTable, columns: &[usize]) -> u64 {
        count_mean(table, columns).min(min_cell(table, columns))
    }

    fn name(&self) -> &'static str {
        "count-mean-min"
    }
}

fn min_cell(table: &dyn CounterTable, columns: &[usize]) -> u64 {
    columns
        .iter()
        .enumerate()
        .map(|(row, &col)| table.get(row, col))
        .min()
        .unwrap_or(0)
}

fn count_mean(table: &dyn CounterTable, columns: &[usize]) -> u64 {
    if columns.is_empty() {
        return 0;
    }
    let (_, width) = table.shape();
    let others = width.saturating_sub(1) as f64;
    let mut candidates: Vec<f64> = columns
        .iter()
        .enumerate()
        .map(|(row, &col)| {
            let cell = table.get(row, col) as f64;
            if others == 0.0 {
                return cell;
            }
            let rest = (table.row_total(row) as f64 - cell).max(0.0);
            cell - rest / others
        })
        .collect();
    candidates.sort_by(f64::total_cmp);

    let mid = candidates.len() / 2;
    let median = if candidates.len() % 2 == 0 {
        (candidates[mid - 1] + candidates[mid]) / 2.0
    } else {
        candidates[mid]
    };
    median.max(0.0).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ArrayTable;

    fn table_from_rows(rows: &[&[u64]]) -> ArrayTable<u64> {
        let mut table = ArrayTable::<u64>::new(rows.len(), rows[0].len());
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                table.set(r, c, *v);
            }
        }
        table
    }

    #[test]
    fn test_min_estimator() {
        let table = table_from_rows(&[&[4, 1, 0], &[0, 9, 2], &[7, 7, 7]]);
        assert_eq!(MinEstimator.estimate(&table, &[0, 1, 2]), 4);
        assert_eq!(MinEstimator.estimate(&table, &[1, 0, 0]), 0);
        assert_eq!(MinEstimator.estimate(&table, &[]), 0);
    }

    #[test]
    fn test_count_mean_subtracts_row_noise() {
        // width 5: noise = (row_total - cell) / 4
        let table = table_from_rows(&[&[10, 2, 2, 2, 2], &[12, 0, 4, 0, 0], &[9, 1, 1, 1, 1]]);
        // candidates: 10 - 8/4 = 8, 12 - 4/4 = 11, 9 - 4/4 = 8  => median 8
        assert_eq!(CountMeanEstimator.estimate(&table, &[0, 0, 0]), 8);
        // capped by min cell 9 -> still 8
        assert_eq!(CountMeanMinEstimator.estimate(&table, &[0, 0, 0]), 8);
    }

    #[test]
    fn test_count_mean_even_depth_and_clamp() {
        let table = table_from_rows(&[&[3, 5], &[6, 0]]);
        // width 2: candidates 3 - 5 = -2 and 6 - 0 = 6 -> median 2
        assert_eq!(CountMeanEstimator.estimate(&table, &[0, 0]), 2);
        // candidates 5 - 3 = 2, 0 - 6 = -6 -> median -2 -> clamped to 0
        assert_eq!(CountMeanEstimator.estimate(&table, &[1, 1]), 0);
    }

    #[test]
    fn test_count_mean_min_caps_at_min() {
        // width 3, light noise: candidates exceed the smallest cell
        let table = table_from_rows(&[&[10, 0, 0], &[4, 0, 0], &[10, 0, 0]]);
        assert_eq!(CountMeanEstimator.estimate(&table, &[0, 0, 0]), 10);
        assert_eq!(CountMeanMinEstimator.estimate(&table, &[0, 0, 0]), 4);
    }

    #[test]
    fn test_count_mean_width_one_has_no_noise() {
        let table = table_from_rows(&[&[6], &[4]]);
        assert_eq!(CountMeanEstimator.estimate(&table, &[0, 0]), 5);
    }
}
