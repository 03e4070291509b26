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

//! Decay policies that periodically shrink every counter.
//!
//! A policy is consulted once after every applied update. When it fires it
//! returns a [`Decay`] action which the sketch applies to the whole table.
//! No action ever raises a counter or takes one below zero.
//!
//! - [`NoDecay`]: never fires.
//! - [`PeriodicDecay`]: scales every counter by `r` each `N` updates.
//! - [`ProbabilisticDecay`]: scales every counter by `r` with probability `p`
//!   per update.
//! - [`LossyCounting`]: lossy conservative updating (LCU); after every window
//!   of `1/γ` updates, decrements the counters at or below a threshold.
//!   See Goyal and Daumé, "Lossy Conservative Update (LCU) Sketch" (2011).

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::Error;
use crate::table::CounterTable;

/// Table-wide shrink action returned by a firing policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decay {
    /// Replace every counter `v` with `floor(v * r)`.
    Scale(f64),
    /// Replace every counter `v` with `floor(v / 2)`.
    Halve,
    /// Decrement every counter in `(0, upper]` by one; `None` means unbounded.
    Decrement {
        /// Inclusive upper bound of the counters to decrement.
        upper: Option<u64>,
    },
}

impl Decay {
    /// Applies this action to `table`.
    pub fn apply(self, table: &mut dyn CounterTable) {
        match self {
            Decay::Scale(factor) => table.scale(factor),
            Decay::Halve => table.halve(),
            Decay::Decrement { upper } => table.decrement_range(upper),
        }
    }

    /// Applies this action to a scalar such as the sketch's total weight.
    pub(crate) fn apply_to_weight(self, weight: u64) -> u64 {
        match self {
            Decay::Scale(factor) => ((weight as f64) * factor).floor().max(0.0) as u64,
            Decay::Halve => weight >> 1,
            // decrementing only touches small cells; the stream weight is kept
            Decay::Decrement { .. } => weight,
        }
    }
}

/// Decides when the table decays.
pub trait DecayPolicy {
    /// Records one applied update and returns the action to perform, if due.
    fn on_update(&mut self) -> Option<Decay>;

    /// Number of updates recorded since construction or the last reset.
    fn updates(&self) -> u64;

    /// Forgets all recorded updates.
    fn reset(&mut self);

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// Never decays.
#[derive(Debug, Clone, Default)]
pub struct NoDecay {
    updates: u64,
}

impl NoDecay {
    /// Creates the identity policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecayPolicy for NoDecay {
    fn on_update(&mut self) -> Option<Decay> {
        self.updates += 1;
        None
    }

    fn updates(&self) -> u64 {
        self.updates
    }

    fn reset(&mut self) {
        self.updates = 0;
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

fn check_factor(factor: f64) -> Result<(), Error> {
    if factor > 0.0 && factor < 1.0 {
        Ok(())
    } else {
        Err(Error::config_invalid("decay factor must be in (0, 1)").with_context("factor", factor))
    }
}

/// Decays every `period` updates.
#[derive(Debug, Clone)]
pub struct PeriodicDecay {
    period: u64,
    action: Decay,
    updates: u64,
}

impl PeriodicDecay {
    /// Scales every counter by `factor` once every `period` updates.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `period` is zero or `factor` is not in `(0, 1)`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use minsketch::decay::PeriodicDecay;
    /// let policy = PeriodicDecay::new(10_000, 0.5).unwrap();
    /// assert_eq!(policy.period(), 10_000);
    /// assert!(PeriodicDecay::new(10_000, 1.0).is_err());
    /// ```
    pub fn new(period: u64, factor: f64) -> Result<Self, Error> {
        check_factor(factor)?;
        Self::with_action(period, Decay::Scale(factor))
    }

    /// Halves every counter once every `period` updates.
    pub fn halving(period: u64) -> Result<Self, Error> {
        Self::with_action(period, Decay::Halve)
    }

    fn with_action(period: u64, action: Decay) -> Result<Self, Error> {
        if period == 0 {
            return Err(Error::config_invalid("decay period must be at least 1"));
        }
        Ok(Self {
            period,
            action,
            updates: 0,
        })
    }

    /// Number of updates between two decays.
    pub fn period(&self) -> u64 {
        self.period
    }
}

impl DecayPolicy for PeriodicDecay {
    fn on_update(&mut self) -> Option<Decay> {
        self.updates += 1;
        (self.updates % self.period == 0).then_some(self.action)
    }

    fn updates(&self) -> u64 {
        self.updates
    }

    fn reset(&mut self) {
        self.updates = 0;
    }

    fn name(&self) -> &'static str {
        "periodic"
    }
}

/// Decays with a fixed probability after each update.
///
/// The random source is seeded so trigger timing is reproducible for a given
/// update sequence; [`reset`](DecayPolicy::reset) rewinds it.
#[derive(Debug, Clone)]
pub struct ProbabilisticDecay {
    probability: f64,
    factor: f64,
    seed: u64,
    rng: StdRng,
    updates: u64,
}

impl ProbabilisticDecay {
    /// Scales every counter by `factor` with probability `probability` per update.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `probability` is not in `(0, 1]` or `factor` is not in `(0, 1)`.
    pub fn new(probability: f64, factor: f64, seed: u64) -> Result<Self, Error> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(Error::config_invalid("decay probability must be in (0, 1]")
                .with_context("probability", probability));
        }
        check_factor(factor)?;
        Ok(Self {
            probability,
            factor,
            seed,
            rng: StdRng::seed_from_u64(seed),
            updates: 0,
        })
    }

    /// Per-update trigger probability.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl DecayPolicy for ProbabilisticDecay {
    fn on_update(&mut self) -> Option<Decay> {
        self.updates += 1;
        self.rng
            .random_bool(self.probability)
            .then_some(Decay::Scale(self.factor))
    }

    fn updates(&self) -> u64 {
        self.updates
    }

    fn reset(&mut self) {
        self.updates = 0;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn name(&self) -> &'static str {
        "probabilistic"
    }
}

/// Which counters a lossy-counting window decrements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossyThreshold {
    /// Every non-zero counter (LCU-ALL).
    All,
    /// Only counters equal to one (LCU-1).
    One,
    /// Counters up to the number of windows seen so far (LCU-WS).
    WindowCount,
    /// Counters up to the square root of the windows seen so far (LCU-SWS).
    SqrtWindowCount,
}

impl LossyThreshold {
    fn upper(self, windows: u64) -> Option<u64> {
        match self {
            LossyThreshold::All => None,
            LossyThreshold::One => Some(1),
            LossyThreshold::WindowCount => Some(windows),
            LossyThreshold::SqrtWindowCount => Some((windows as f64).sqrt().floor() as u64),
        }
    }
}

/// Lossy counting over fixed windows of `ceil(1 / gamma)` updates.
#[derive(Debug, Clone)]
pub struct LossyCounting {
    window: u64,
    threshold: LossyThreshold,
    in_window: u64,
    windows: u64,
    updates: u64,
}

impl LossyCounting {
    /// Creates a lossy-counting policy with window size `ceil(1 / gamma)`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `gamma` is not in `(0, 1]`.
    pub fn new(gamma: f64, threshold: LossyThreshold) -> Result<Self, Error> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(Error::config_invalid("lossy counting gamma must be in (0, 1]")
                .with_context("gamma", gamma));
        }
        Ok(Self {
            window: (1.0 / gamma).ceil() as u64,
            threshold,
            in_window: 0,
            windows: 0,
            updates: 0,
        })
    }

    /// Number of updates per window.
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Number of completed windows.
    pub fn windows(&self) -> u64 {
        self.windows
    }
}

impl DecayPolicy for LossyCounting {
    fn on_update(&mut self) -> Option<Decay> {
        self.updates += 1;
        self.in_window += 1;
        if self.in_window < self.window {
            return None;
        }
        self.in_window = 0;
        self.windows += 1;
        Some(Decay::Decrement {
            upper: self.threshold.upper(self.windows),
        })
    }

    fn updates(&self) -> u64 {
        self.updates
    }

    fn reset(&mut self) {
        self.in_window = 0;
        self.windows = 0;
        self.updates = 0;
    }

    fn name(&self) -> &'static str {
        "lossy"
    }
}
