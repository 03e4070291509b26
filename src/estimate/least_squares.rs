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

//! Least-squares reconstruction of item counts from the whole table.
//!
//! Every cell is modelled as a linear equation: the cell equals the sum of
//! the true counts of the candidate items hashing to it plus a noise term
//! shared by all cells. Solving the (usually overdetermined) system in the
//! least-squares sense gives refined estimates for the candidates.
//!
//! See Lee, Lui, Yoon and Zhang, "Improving Sketch Reconstruction Accuracy
//! Using Linear Least Squares Method" (IMC 2005).
//!
//! The normal equations `AᵀA x = Aᵀb` are assembled directly from the column
//! sets, without materialising the `(depth·width) × (n + 1)` design matrix.

use std::cell::RefCell;

use crate::estimate::Estimator;
use crate::table::CounterTable;

// Tikhonov term relative to the largest diagonal entry; keeps rank-deficient
// systems (e.g. width 1) solvable without visibly moving well-posed ones.
const RIDGE: f64 = 1e-9;
const PIVOT_EPSILON: f64 = 1e-12;

/// Solves for the counts of the items hashing to `column_sets`.
///
/// `column_sets[i][row]` is the column item `i` occupies in `row`. Returns
/// one raw (unclamped) value per item, in input order. An empty candidate
/// set yields an empty result.
pub fn solve(table: &dyn CounterTable, column_sets: &[Vec<usize>]) -> Vec<f64> {
    let n = column_sets.len();
    if n == 0 {
        return Vec::new();
    }
    let (depth, width) = table.shape();
    let noise = n;
    let size = n + 1;

    let mut normal = vec![vec![0.0f64; size]; size];
    let mut rhs = vec![0.0f64; size];

    for (i, columns) in column_sets.iter().enumerate() {
        debug_assert_eq!(columns.len(), depth);
        normal[i][i] = depth as f64;
        for j in (i + 1)..n {
            let shared = columns
                .iter()
                .zip(&column_sets[j])
                .filter(|(a, b)| a == b)
                .count() as f64;
            normal[i][j] = shared;
            normal[j][i] = shared;
        }
        normal[i][noise] = depth as f64;
        normal[noise][i] = depth as f64;
        rhs[i] = columns
            .iter()
            .enumerate()
            .map(|(row, &col)| table.get(row, col) as f64)
            .sum();
    }
    normal[noise][noise] = (depth * width) as f64;
    rhs[noise] = (0..depth).map(|row| table.row_total(row) as f64).sum();

    let ridge = RIDGE * normal[noise][noise].max(1.0);
    for (k, row) in normal.iter_mut().enumerate() {
        row[k] += ridge;
    }

    let mut solution = gaussian_elimination(normal, rhs);
    solution.truncate(n);
    solution
}

/// Solves `a x = b` with partial pivoting; unknowns without a usable pivot are 0.
fn gaussian_elimination(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let size = b.len();
    let mut usable = vec![true; size];

    for k in 0..size {
        let pivot = (k..size)
            .max_by(|&x, &y| a[x][k].abs().total_cmp(&a[y][k].abs()))
            .unwrap_or(k);
        if a[pivot][k].abs() < PIVOT_EPSILON {
            usable[k] = false;
            continue;
        }
        a.swap(k, pivot);
        b.swap(k, pivot);

        for r in (k + 1)..size {
            let factor = a[r][k] / a[k][k];
            if factor == 0.0 {
                continue;
            }
            for c in k..size {
                a[r][c] -= factor * a[k][c];
            }
            b[r] -= factor * b[k];
        }
    }

    let mut x = vec![0.0f64; size];
    for k in (0..size).rev() {
        if !usable[k] {
            continue;
        }
        let tail: f64 = ((k + 1)..size).map(|c| a[k][c] * x[c]).sum();
        x[k] = (b[k] - tail) / a[k][k];
    }
    x
}

/// Rounds a raw least-squares value into an estimate.
pub(crate) fn to_estimate(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Re-solves the least-squares system over every distinct item queried so far.
///
/// Items are identified by their column sets: two items that hash to the same
/// column in every row cannot be told apart by the table anyway. With a
/// candidate limit, the oldest candidate is forgotten when a new one arrives.
///
/// Each query costs `O(n²·d + n³)` for `n` remembered candidates, so this is
/// meant for offline refinement of a small candidate set rather than a hot
/// query path. Interior mutability makes sketches using it `!Sync`.
#[derive(Debug, Default)]
pub struct LeastSquaresEstimator {
    candidates: RefCell<Vec<Vec<usize>>>,
    max_candidates: Option<usize>,
}

impl LeastSquaresEstimator {
    /// Creates an estimator remembering every queried item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an estimator remembering at most `max_candidates` items.
    pub fn with_max_candidates(max_candidates: usize) -> Self {
        Self {
            candidates: RefCell::default(),
            max_candidates: Some(max_candidates.max(1)),
        }
    }

    /// Number of distinct items remembered.
    pub fn num_candidates(&self) -> usize {
        self.candidates.borrow().len()
    }
}

impl Estimator for LeastSquaresEstimator {
    fn estimate(&self, table: &dyn CounterTable, columns: &[usize]) -> u64 {
        let mut candidates = self.candidates.borrow_mut();
        let index = match candidates.iter().position(|c| c.as_slice() == columns) {
            Some(index) => index,
            None => {
                if let Some(max) = self.max_candidates {
                    if candidates.len() >= max {
                        candidates.remove(0);
                    }
                }
                candidates.push(columns.to_vec());
                candidates.len() - 1
            }
        };
        let solution = solve(table, &candidates);
        to_estimate(solution[index])
    }

    fn reset(&mut self) {
        self.candidates.get_mut().clear();
    }

    fn name(&self) -> &'static str {
        "least-squares"
    }
}
