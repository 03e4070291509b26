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

use std::collections::HashMap;
use std::error::Error as _;

use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;
use googletest::prelude::ge;
use googletest::prelude::le;
use minsketch::Sketch;
use minsketch::SketchBuilder;
use minsketch::error::Error;
use minsketch::error::ErrorKind;
use minsketch::estimate::CountMeanEstimator;
use minsketch::estimate::CountMeanMinEstimator;
use minsketch::estimate::LeastSquaresEstimator;
use minsketch::hash::IndependentHashing;
use minsketch::hash::PairedHashing;
use minsketch::item::SketchItem;
use minsketch::table::CounterTable;
use minsketch::table::TableBackend;
use minsketch::update::ConservativeUpdate;
use minsketch::update::RegularUpdate;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn skewed_stream(seed: u64, len: usize, distinct: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            // squaring a uniform draw skews the stream towards small keys
            let u: f64 = rng.random();
            ((u * u) * distinct as f64) as u64
        })
        .collect()
}

fn uniform_stream(seed: u64, len: usize, distinct: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(0..distinct)).collect()
}

fn exact_counts(stream: &[u64]) -> HashMap<u64, u64> {
    let mut counts = HashMap::new();
    for &item in stream {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

type Configure = fn(SketchBuilder) -> SketchBuilder;

fn independent(builder: SketchBuilder) -> SketchBuilder {
    builder.hash_family(IndependentHashing::new())
}

fn paired(builder: SketchBuilder) -> SketchBuilder {
    builder.hash_family(PairedHashing::new())
}

fn regular(builder: SketchBuilder) -> SketchBuilder {
    builder.update_rule(RegularUpdate)
}

fn conservative(builder: SketchBuilder) -> SketchBuilder {
    builder.update_rule(ConservativeUpdate)
}

fn families() -> [Configure; 2] {
    [independent, paired]
}

fn rules() -> [Configure; 2] {
    [regular, conservative]
}

fn build(configure: &[Configure], backend: TableBackend, seed: u64) -> Sketch {
    configure
        .iter()
        .fold(Sketch::builder(0.05, 0.01), |builder, f| f(builder))
        .table(backend)
        .seed(seed)
        .build()
        .unwrap()
}

#[test]
fn test_default_shape_and_scenario() {
    let mut sketch = Sketch::new(0.1, 0.01).unwrap();
    assert_eq!(sketch.width(), 28);
    assert_eq!(sketch.depth(), 5);
    assert!(sketch.is_empty());

    sketch.update_with_weight("a", 10).unwrap();
    sketch.update_with_weight("b", 5).unwrap();
    sketch.update_with_weight("a", 3).unwrap();

    assert_that!(sketch.query("a").unwrap(), ge(13));
    assert_that!(sketch.query("b").unwrap(), ge(5));
    assert_eq!(sketch.total_weight(), 18);
    assert_eq!(sketch.updates(), 3);
    assert_eq!(sketch.table().total(), 18 * 5);
}

#[test]
fn test_min_estimate_never_underestimates() {
    let backends = [
        TableBackend::U16,
        TableBackend::U32,
        TableBackend::U64,
        TableBackend::Packed { bits: 20 },
    ];
    let stream = skewed_stream(7, 5_000, 400);
    let counts = exact_counts(&stream);

    for family in families() {
        for rule in rules() {
            for backend in backends {
                let mut sketch = build(&[family, rule], backend, 42);
                sketch.update_batch(&stream).unwrap();
                for (item, &count) in &counts {
                    assert_that!(sketch.query(item).unwrap(), ge(count));
                }
            }
        }
    }
}

#[test]
fn test_conservative_never_exceeds_regular() {
    let stream = skewed_stream(11, 5_000, 400);
    let counts = exact_counts(&stream);
    for family in families() {
        let [plain_rule, conservative_rule] = rules();
        let mut plain = build(&[family, plain_rule], TableBackend::U32, 5);
        let mut careful = build(&[family, conservative_rule], TableBackend::U32, 5);
        plain.update_batch(&stream).unwrap();
        careful.update_batch(&stream).unwrap();

        for item in counts.keys() {
            assert_that!(careful.query(item).unwrap(), le(plain.query(item).unwrap()));
        }
        // cell by cell as well
        for (c, r) in careful.table().to_vec().into_iter().zip(plain.table().to_vec()) {
            assert!(c <= r);
        }
    }
}

#[test]
fn test_identical_configuration_is_deterministic() {
    let stream = skewed_stream(3, 2_000, 100);
    let run = || {
        let mut sketch = Sketch::builder(0.01, 0.001).seed(77).build().unwrap();
        sketch.update_batch(&stream).unwrap();
        sketch
    };
    let a = run();
    let b = run();
    assert_eq!(a.table().to_vec(), b.table().to_vec());
    for item in 0..100u64 {
        assert_eq!(a.query(item).unwrap(), b.query(item).unwrap());
    }

    let mut other = Sketch::builder(0.01, 0.001).seed(78).build().unwrap();
    other.update_batch(&stream).unwrap();
    assert_ne!(a.table().to_vec(), other.table().to_vec());
}

#[test]
fn test_eight_bit_counters_saturate() {
    let mut sketch = Sketch::builder(0.1, 0.01)
        .table(TableBackend::U8)
        .build()
        .unwrap();
    for _ in 0..300 {
        sketch.update("x").unwrap();
    }
    assert_eq!(sketch.query("x").unwrap(), 255);
    sketch.update_with_weight("x", 1_000).unwrap();
    assert_eq!(sketch.query("x").unwrap(), 255);
    // the stream weight is not bounded by the counter width
    assert_eq!(sketch.total_weight(), 1_300);
}

#[test]
fn test_bounds_bracket_the_estimate() {
    let mut sketch = Sketch::new(0.01, 0.01).unwrap();
    let stream = skewed_stream(9, 10_000, 1_000);
    sketch.update_batch(&stream).unwrap();

    let bound = sketch.error_bound();
    assert_eq!(
        bound,
        (std::f64::consts::E / sketch.width() as f64 * 10_000.0).floor() as u64
    );
    let estimate = sketch.query(0u64).unwrap();
    assert_eq!(sketch.upper_bound(0u64).unwrap(), estimate + bound);
    assert_eq!(
        sketch.lower_bound(0u64).unwrap(),
        estimate.saturating_sub(bound)
    );
}

#[test]
fn test_batch_weighted_checks_lengths_first() {
    let mut sketch = Sketch::new(0.1, 0.01).unwrap();
    let err = sketch
        .update_batch_weighted(&["a", "b"], &[1])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(sketch.is_empty());
    assert_eq!(sketch.updates(), 0);

    sketch.update_batch_weighted(&["a", "b"], &[4, 2]).unwrap();
    assert_that!(sketch.query("a").unwrap(), ge(4));
    assert_eq!(sketch.total_weight(), 6);
}

#[test]
fn test_byte_and_typed_updates_agree() {
    let mut typed = Sketch::new(0.1, 0.01).unwrap();
    let mut raw = Sketch::new(0.1, 0.01).unwrap();
    typed.update_with_weight(String::from("key"), 3).unwrap();
    raw.update_bytes(b"key", 3).unwrap();
    assert_eq!(typed.table().to_vec(), raw.table().to_vec());
    assert_eq!(raw.query_bytes(b"key"), typed.query("key").unwrap());
}

struct RawName(Vec<u8>);

impl SketchItem for RawName {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let name = std::str::from_utf8(&self.0)
            .map_err(|e| Error::encoding_failed("name is not valid utf-8").set_source(e))?;
        name.encode(out)
    }
}

#[test]
fn test_encoding_failures_leave_sketch_untouched() {
    let mut sketch = Sketch::new(0.1, 0.01).unwrap();
    sketch.update(RawName(b"alice".to_vec())).unwrap();
    assert_that!(sketch.query("alice").unwrap(), ge(1));

    let err = sketch.update(RawName(vec![0xff, 0xfe])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodingFailed);
    assert!(err.source().is_some());
    assert_that!(err.message(), contains_substring("utf-8"));
    assert!(err.to_string().contains("EncodingFailed"));

    let err = sketch.update(f64::NAN).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodingFailed);
    assert_eq!(sketch.total_weight(), 1);
    assert_eq!(sketch.updates(), 1);
}

#[test]
fn test_signed_zero_is_one_item() {
    let mut sketch = Sketch::new(0.1, 0.01).unwrap();
    sketch.update(0.0f64).unwrap();
    sketch.update(-0.0f64).unwrap();
    assert_that!(sketch.query(0.0f64).unwrap(), ge(2));
}

#[test]
fn test_count_mean_estimators() {
    let stream = uniform_stream(21, 20_000, 2_000);
    let counts = exact_counts(&stream);
    let mut min = Sketch::builder(0.05, 0.01).build().unwrap();
    let mut mean = Sketch::builder(0.05, 0.01)
        .estimator(CountMeanEstimator)
        .build()
        .unwrap();
    let mut mean_min = Sketch::builder(0.05, 0.01)
        .estimator(CountMeanMinEstimator)
        .build()
        .unwrap();
    for sketch in [&mut min, &mut mean, &mut mean_min] {
        sketch.update_batch(&stream).unwrap();
    }

    let mut min_error = 0u64;
    let mut mean_error = 0u64;
    for (item, &count) in &counts {
        let by_min = min.query(item).unwrap();
        let by_mean = mean.query(item).unwrap();
        assert_that!(mean_min.query(item).unwrap(), le(by_min));
        assert_that!(mean_min.query(item).unwrap(), le(by_mean));
        min_error += by_min - count;
        mean_error += by_mean.abs_diff(count);
    }
    // with no heavy hitters the noise correction removes most of the bias
    assert_that!(mean_error, le(min_error));
}

#[test]
fn test_least_squares_refinement() {
    let mut sketch = Sketch::builder(0.001, 0.01)
        .estimator(LeastSquaresEstimator::new())
        .build()
        .unwrap();
    sketch.update_with_weight("a", 50).unwrap();
    sketch.update_with_weight("b", 20).unwrap();

    assert_that!(sketch.query("a").unwrap(), eq(50));
    assert_that!(sketch.query("b").unwrap(), eq(20));
    assert_eq!(sketch.refine_estimates(["a", "b"]).unwrap(), vec![50, 20]);
    assert!(sketch.refine_estimates(Vec::<&str>::new()).unwrap().is_empty());
}

/// Sparse storage for tables that are mostly zero.
#[derive(Default)]
struct SparseTable {
    depth: usize,
    width: usize,
    cells: HashMap<(usize, usize), u64>,
}

impl CounterTable for SparseTable {
    fn shape(&self) -> (usize, usize) {
        (self.depth, self.width)
    }

    fn get(&self, row: usize, col: usize) -> u64 {
        self.cells.get(&(row, col)).copied().unwrap_or(0)
    }

    fn increment(&mut self, row: usize, col: usize, amount: i64) -> u64 {
        let value = self.get(row, col).saturating_add_signed(amount);
        if value == 0 {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
        value
    }

    fn reset(&mut self) {
        self.cells.clear();
    }

    fn max_value(&self) -> u64 {
        u64::MAX
    }
}

#[test]
fn test_custom_table() {
    let table = SparseTable {
        depth: 5,
        width: 28,
        ..Default::default()
    };
    let mut custom = Sketch::builder(0.1, 0.01)
        .custom_table(table)
        .build()
        .unwrap();
    let mut dense = Sketch::new(0.1, 0.01).unwrap();
    for sketch in [&mut custom, &mut dense] {
        sketch.update_batch(["x", "y", "x", "z"]).unwrap();
    }
    assert_eq!(custom.table().to_vec(), dense.table().to_vec());

    let wrong = SparseTable {
        depth: 5,
        width: 10,
        ..Default::default()
    };
    let err = Sketch::builder(0.1, 0.01)
        .custom_table(wrong)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_explicit_dimensions() {
    let sketch = Sketch::builder(0.1, 0.01)
        .dimensions(3, 1)
        .estimator(CountMeanEstimator)
        .build()
        .unwrap();
    assert_eq!((sketch.depth(), sketch.width()), (3, 1));
    assert!(sketch.relative_error() > sketch.epsilon());
}
