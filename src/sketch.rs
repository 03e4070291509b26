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

//! Count-min sketch orchestrating a counter table and its strategies.
//!
//! # Usage
//!
//! ```
//! # use minsketch::Sketch;
//! let mut sketch = Sketch::new(0.1, 0.01).unwrap();
//! assert_eq!((sketch.depth(), sketch.width()), (5, 28));
//!
//! sketch.update_with_weight("apple", 10).unwrap();
//! sketch.update("pear").unwrap();
//! assert!(sketch.query("apple").unwrap() >= 10);
//! assert_eq!(sketch.total_weight(), 11);
//! ```

use std::fmt;

use crate::decay::DecayPolicy;
use crate::decay::NoDecay;
use crate::error::Error;
use crate::estimate::Estimator;
use crate::estimate::MinEstimator;
use crate::estimate::least_squares;
use crate::hash::DEFAULT_SEED;
use crate::hash::HashFamily;
use crate::hash::IndependentHashing;
use crate::item::SketchItem;
use crate::item::encode_to_vec;
use crate::table::CounterTable;
use crate::table::TableBackend;
use crate::update::RegularUpdate;
use crate::update::UpdateRule;

/// Approximate frequency counts over a stream of items.
///
/// The sketch keeps a `depth × width` table of counters. Each item maps to one
/// cell per row through the configured [`HashFamily`]; updates go through the
/// [`UpdateRule`], the [`DecayPolicy`] may shrink the table after each update
/// and queries are answered by the [`Estimator`].
///
/// With the default min estimator and non-negative updates, a query never
/// underestimates, and overestimates by at most [`error_bound`](Self::error_bound)
/// with probability at least `1 - δ`.
pub struct Sketch {
    epsilon: f64,
    delta: f64,
    seed: u64,
    depth: usize,
    width: usize,
    total_weight: u64,
    table: Box<dyn CounterTable>,
    hash_family: Box<dyn HashFamily>,
    update_rule: Box<dyn UpdateRule>,
    decay_policy: Box<dyn DecayPolicy>,
    estimator: Box<dyn Estimator>,
}

impl fmt::Debug for Sketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sketch")
            .field("epsilon", &self.epsilon)
            .field("delta", &self.delta)
            .field("seed", &self.seed)
            .field("depth", &self.depth)
            .field("width", &self.width)
            .field("total_weight", &self.total_weight)
            .field("hash_family", &self.hash_family.name())
            .field("update_rule", &self.update_rule.name())
            .field("decay_policy", &self.decay_policy.name())
            .field("estimator", &self.estimator.name())
            .finish()
    }
}

impl Sketch {
    /// Creates a sketch with default strategies for the given error parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `epsilon` or `delta` is not in `(0, 1)`, or the table they call for
    /// cannot be allocated.
    pub fn new(epsilon: f64, delta: f64) -> Result<Self, Error> {
        Self::builder(epsilon, delta).build()
    }

    /// Starts configuring a sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// # use minsketch::Sketch;
    /// # use minsketch::decay::PeriodicDecay;
    /// # use minsketch::hash::PairedHashing;
    /// # use minsketch::table::TableBackend;
    /// # use minsketch::update::ConservativeUpdate;
    /// let sketch = Sketch::builder(0.01, 0.001)
    ///     .table(TableBackend::U16)
    ///     .hash_family(PairedHashing::new())
    ///     .update_rule(ConservativeUpdate)
    ///     .decay_policy(PeriodicDecay::halving(100_000).unwrap())
    ///     .seed(7)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(sketch.depth(), 7);
    /// // paired hashing widens 272 to the next prime
    /// assert_eq!(sketch.width(), 277);
    /// ```
    pub fn builder(epsilon: f64, delta: f64) -> SketchBuilder {
        SketchBuilder::new(epsilon, delta)
    }

    /// Width giving relative error `epsilon`: `ceil(e / epsilon)`, at least 1.
    ///
    /// Saturates at `usize::MAX`; [`SketchBuilder::build`] rejects such widths.
    pub fn suggest_width(epsilon: f64) -> usize {
        ((std::f64::consts::E / epsilon).ceil() as usize).max(1)
    }

    /// Depth giving failure probability `delta`: `ceil(ln(1 / delta))`, at least 1.
    pub fn suggest_depth(delta: f64) -> usize {
        ((1.0 / delta).ln().ceil() as usize).max(1)
    }

    /// Adds one occurrence of `item`.
    pub fn update<T: SketchItem>(&mut self, item: T) -> Result<(), Error> {
        self.update_with_weight(item, 1)
    }

    /// Adds `amount` occurrences of `item`.
    ///
    /// Negative amounts are only accepted by rules that allow them; counters
    /// clamp at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EncodingFailed`](crate::error::ErrorKind::EncodingFailed)
    /// if the item cannot be encoded, or
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument) if
    /// the update rule rejects `amount`. The sketch is unchanged on error.
    pub fn update_with_weight<T: SketchItem>(&mut self, item: T, amount: i64) -> Result<(), Error> {
        let bytes = encode_to_vec(&item)?;
        self.update_bytes(&bytes, amount)
    }

    /// Adds `amount` occurrences of an already encoded item.
    pub fn update_bytes(&mut self, bytes: &[u8], amount: i64) -> Result<(), Error> {
        let columns = self.hash_family.hash(bytes);
        self.apply(&columns, amount)
    }

    /// Adds one occurrence of every item, in order.
    ///
    /// Stops at the first failing item; the items before it stay applied.
    pub fn update_batch<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: SketchItem,
    {
        for item in items {
            self.update(item)?;
        }
        Ok(())
    }

    /// Adds `weights[i]` occurrences of `items[i]`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// before touching the sketch if the slices differ in length.
    pub fn update_batch_weighted<T: SketchItem>(
        &mut self,
        items: &[T],
        weights: &[i64],
    ) -> Result<(), Error> {
        if items.len() != weights.len() {
            return Err(
                Error::invalid_argument("batch items and weights differ in length")
                    .with_context("items", items.len())
                    .with_context("weights", weights.len()),
            );
        }
        for (item, &amount) in items.iter().zip(weights) {
            self.update_with_weight(item, amount)?;
        }
        Ok(())
    }

    fn apply(&mut self, columns: &[usize], amount: i64) -> Result<(), Error> {
        let current: Vec<u64> = columns
            .iter()
            .enumerate()
            .map(|(row, &col)| self.table.get(row, col))
            .collect();
        let deltas = self.update_rule.deltas(&current, amount)?;

        for (row, (&col, &delta)) in columns.iter().zip(&deltas).enumerate() {
            if delta != 0 {
                self.table.increment(row, col, delta);
            }
        }
        self.total_weight = self.total_weight.saturating_add_signed(amount);

        if let Some(action) = self.decay_policy.on_update() {
            log::debug!(
                "{} decay after {} updates: {action:?}",
                self.decay_policy.name(),
                self.decay_policy.updates()
            );
            action.apply(self.table.as_mut());
            self.total_weight = action.apply_to_weight(self.total_weight);
        }
        Ok(())
    }

    /// Estimates the count of `item`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EncodingFailed`](crate::error::ErrorKind::EncodingFailed)
    /// if the item cannot be encoded.
    pub fn query<T: SketchItem>(&self, item: T) -> Result<u64, Error> {
        let bytes = encode_to_vec(&item)?;
        Ok(self.query_bytes(&bytes))
    }

    /// Estimates the count of an already encoded item.
    pub fn query_bytes(&self, bytes: &[u8]) -> u64 {
        let columns = self.hash_family.hash(bytes);
        self.estimator.estimate(self.table.as_ref(), &columns)
    }

    /// Returns the estimate minus [`error_bound`](Self::error_bound), at least 0.
    pub fn lower_bound<T: SketchItem>(&self, item: T) -> Result<u64, Error> {
        Ok(self.query(item)?.saturating_sub(self.error_bound()))
    }

    /// Returns the estimate plus [`error_bound`](Self::error_bound).
    pub fn upper_bound<T: SketchItem>(&self, item: T) -> Result<u64, Error> {
        Ok(self.query(item)?.saturating_add(self.error_bound()))
    }

    /// Maximum overestimate with probability `1 - δ`: `floor(e / w * T)`.
    pub fn error_bound(&self) -> u64 {
        (self.relative_error() * self.total_weight as f64).floor() as u64
    }

    /// Estimates the inner product of the count vectors of two items.
    ///
    /// Takes the minimum over rows of the product of both items' cells, which
    /// never underestimates `count(a) * count(b)` for non-negative streams.
    pub fn inner_product<A: SketchItem, B: SketchItem>(&self, a: A, b: B) -> Result<u64, Error> {
        let left = self.hash_family.hash(&encode_to_vec(&a)?);
        let right = self.hash_family.hash(&encode_to_vec(&b)?);
        Ok(left
            .iter()
            .zip(&right)
            .enumerate()
            .map(|(row, (&l, &r))| self.table.get(row, l).saturating_mul(self.table.get(row, r)))
            .min()
            .unwrap_or(0))
    }

    /// Re-estimates a set of candidate items jointly by least squares.
    ///
    /// Returns one estimate per item, in input order. The result does not
    /// depend on the configured estimator.
    pub fn refine_estimates<I>(&self, items: I) -> Result<Vec<u64>, Error>
    where
        I: IntoIterator,
        I::Item: SketchItem,
    {
        let column_sets = items
            .into_iter()
            .map(|item| Ok(self.hash_family.hash(&encode_to_vec(&item)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(self.refine_columns(&column_sets))
    }

    pub(crate) fn columns(&self, bytes: &[u8]) -> Vec<usize> {
        self.hash_family.hash(bytes)
    }

    pub(crate) fn refine_columns(&self, column_sets: &[Vec<usize>]) -> Vec<u64> {
        least_squares::solve(self.table.as_ref(), column_sets)
            .into_iter()
            .map(least_squares::to_estimate)
            .collect()
    }

    /// Zeroes all counters, the total weight and the decay and estimator state.
    ///
    /// The shape and the configured strategies are kept.
    pub fn reset(&mut self) {
        log::debug!("resetting {}x{} sketch", self.depth, self.width);
        self.table.reset();
        self.total_weight = 0;
        self.decay_policy.reset();
        self.estimator.reset();
    }

    /// Number of rows.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of columns, after any widening by the hash family.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The requested relative error.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The requested failure probability.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The seed the hash family was configured with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sum of all applied amounts, scaled by decays and never negative.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Returns true if no weight is recorded.
    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    /// Relative error guaranteed by the actual width: `e / w`.
    ///
    /// Never larger than [`epsilon`](Self::epsilon) unless explicit dimensions
    /// were requested.
    pub fn relative_error(&self) -> f64 {
        std::f64::consts::E / self.width as f64
    }

    /// Number of updates applied since construction or the last reset.
    pub fn updates(&self) -> u64 {
        self.decay_policy.updates()
    }

    /// Read access to the counters.
    pub fn table(&self) -> &dyn CounterTable {
        self.table.as_ref()
    }
}

/// Builder for [`Sketch`].
pub struct SketchBuilder {
    epsilon: f64,
    delta: f64,
    seed: u64,
    dimensions: Option<(usize, usize)>,
    backend: TableBackend,
    custom_table: Option<Box<dyn CounterTable>>,
    hash_family: Box<dyn HashFamily>,
    update_rule: Box<dyn UpdateRule>,
    decay_policy: Box<dyn DecayPolicy>,
    estimator: Box<dyn Estimator>,
}

impl fmt::Debug for SketchBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SketchBuilder")
            .field("epsilon", &self.epsilon)
            .field("delta", &self.delta)
            .field("seed", &self.seed)
            .field("dimensions", &self.dimensions)
            .field("backend", &self.backend)
            .field("custom_table", &self.custom_table.is_some())
            .field("hash_family", &self.hash_family.name())
            .field("update_rule", &self.update_rule.name())
            .field("decay_policy", &self.decay_policy.name())
            .field("estimator", &self.estimator.name())
            .finish()
    }
}

impl SketchBuilder {
    fn new(epsilon: f64, delta: f64) -> Self {
        Self {
            epsilon,
            delta,
            seed: DEFAULT_SEED,
            dimensions: None,
            backend: TableBackend::default(),
            custom_table: None,
            hash_family: Box::new(IndependentHashing::new()),
            update_rule: Box::new(RegularUpdate),
            decay_policy: Box::new(NoDecay::new()),
            estimator: Box::new(MinEstimator),
        }
    }

    /// Set the counter storage. Defaults to [`TableBackend::U32`].
    pub fn table(mut self, backend: TableBackend) -> Self {
        self.backend = backend;
        self.custom_table = None;
        self
    }

    /// Install caller-provided counter storage.
    ///
    /// The table is reset on build and its shape must match the shape the
    /// sketch derives, including any widening by the hash family.
    pub fn custom_table(mut self, table: impl CounterTable + 'static) -> Self {
        self.custom_table = Some(Box::new(table));
        self
    }

    /// Set how items map to columns. Defaults to [`IndependentHashing`].
    pub fn hash_family(mut self, family: impl HashFamily + 'static) -> Self {
        self.hash_family = Box::new(family);
        self
    }

    /// Set how updates change counters. Defaults to [`RegularUpdate`].
    pub fn update_rule(mut self, rule: impl UpdateRule + 'static) -> Self {
        self.update_rule = Box::new(rule);
        self
    }

    /// Set when counters are decayed. Defaults to [`NoDecay`].
    pub fn decay_policy(mut self, policy: impl DecayPolicy + 'static) -> Self {
        self.decay_policy = Box::new(policy);
        self
    }

    /// Set how queries combine the cells of an item. Defaults to [`MinEstimator`].
    pub fn estimator(mut self, estimator: impl Estimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Set hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use an explicit `depth × width` instead of deriving them from ε and δ.
    ///
    /// The hash family may still widen the table.
    pub fn dimensions(mut self, depth: usize, width: usize) -> Self {
        self.dimensions = Some((depth, width));
        self
    }

    /// Validates the configuration and allocates the table.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `epsilon` or `delta` is not in `(0, 1)`, explicit dimensions are 0,
    /// the width does not fit in `usize`, the table cannot be allocated, or a
    /// custom table has the wrong shape.
    pub fn build(mut self) -> Result<Sketch, Error> {
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(Error::config_invalid("epsilon must be in (0, 1)")
                .with_context("epsilon", self.epsilon));
        }
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(
                Error::config_invalid("delta must be in (0, 1)").with_context("delta", self.delta)
            );
        }

        let (depth, requested_width) = match self.dimensions {
            Some((depth, width)) => {
                if depth == 0 || width == 0 {
                    return Err(Error::config_invalid("sketch dimensions must be at least 1")
                        .with_context("depth", depth)
                        .with_context("width", width));
                }
                (depth, width)
            }
            None => {
                let width = std::f64::consts::E / self.epsilon;
                if !width.is_finite() || width.ceil() >= usize::MAX as f64 {
                    return Err(Error::config_invalid("epsilon too small for a table width")
                        .with_context("epsilon", self.epsilon));
                }
                (
                    Sketch::suggest_depth(self.delta),
                    Sketch::suggest_width(self.epsilon),
                )
            }
        };
        let width = self.hash_family.preferred_width(requested_width)?;

        let table = match self.custom_table.take() {
            Some(mut table) => {
                if table.shape() != (depth, width) {
                    let (table_depth, table_width) = table.shape();
                    return Err(Error::config_invalid("custom table shape mismatch")
                        .with_context("expected_depth", depth)
                        .with_context("expected_width", width)
                        .with_context("table_depth", table_depth)
                        .with_context("table_width", table_width));
                }
                table.reset();
                table
            }
            None => self.backend.allocate(depth, width)?,
        };

        self.hash_family.configure(depth, width, self.seed);

        if width == 1 && matches!(self.estimator.name(), "count-mean" | "count-mean-min") {
            log::warn!(
                "{} estimator on a width-1 table has no row noise to subtract",
                self.estimator.name()
            );
        }

        log::debug!(
            "building sketch: epsilon={}, delta={}, depth={depth}, width={width}, backend={:?}, \
             hash={}, update={}, decay={}, estimator={}, seed={}",
            self.epsilon,
            self.delta,
            self.backend,
            self.hash_family.name(),
            self.update_rule.name(),
            self.decay_policy.name(),
            self.estimator.name(),
            self.seed
        );

        Ok(Sketch {
            epsilon: self.epsilon,
            delta: self.delta,
            seed: self.seed,
            depth,
            width,
            total_weight: 0,
            table,
            hash_family: self.hash_family,
            update_rule: self.update_rule,
            decay_policy: self.decay_policy,
            estimator: self.estimator,
        })
    }
}
