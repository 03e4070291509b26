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

use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use minsketch::Sketch;
use minsketch::decay::LossyCounting;
use minsketch::decay::LossyThreshold;
use minsketch::decay::PeriodicDecay;
use minsketch::decay::ProbabilisticDecay;
use minsketch::table::TableBackend;
use minsketch::update::ConservativeUpdate;

#[test]
fn test_periodic_scaling_floors_counters() {
    let mut sketch = Sketch::builder(0.01, 0.01)
        .decay_policy(PeriodicDecay::new(2, 0.5).unwrap())
        .build()
        .unwrap();
    sketch.update_with_weight("a", 5).unwrap();
    assert_eq!(sketch.query("a").unwrap(), 5);

    // 9 * 0.5 = 4.5 rounds down
    sketch.update_with_weight("a", 4).unwrap();
    assert_eq!(sketch.query("a").unwrap(), 4);
    assert_eq!(sketch.total_weight(), 4);
    assert_eq!(sketch.updates(), 2);

    sketch.update_with_weight("a", 1).unwrap();
    sketch.update_with_weight("a", 2).unwrap();
    assert_eq!(sketch.query("a").unwrap(), 3);
}

#[test]
fn test_periodic_halving_matches_scaling_by_half() {
    for backend in [TableBackend::U32, TableBackend::Packed { bits: 10 }] {
        let mut halved = Sketch::builder(0.05, 0.05)
            .table(backend)
            .decay_policy(PeriodicDecay::halving(3).unwrap())
            .build()
            .unwrap();
        let mut scaled = Sketch::builder(0.05, 0.05)
            .table(backend)
            .decay_policy(PeriodicDecay::new(3, 0.5).unwrap())
            .build()
            .unwrap();
        for i in 0..100u32 {
            halved.update_with_weight(i % 7, i64::from(i % 5) + 1).unwrap();
            scaled.update_with_weight(i % 7, i64::from(i % 5) + 1).unwrap();
        }
        assert_eq!(halved.table().to_vec(), scaled.table().to_vec());
        assert_eq!(halved.total_weight(), scaled.total_weight());
    }
}

#[test]
fn test_decay_never_raises_counters() {
    let mut sketch = Sketch::builder(0.05, 0.01)
        .decay_policy(ProbabilisticDecay::new(0.05, 0.9, 17).unwrap())
        .build()
        .unwrap();
    let mut previous = sketch.table().to_vec();
    for i in 0..2_000u64 {
        sketch.update(i % 50).unwrap();
        let current = sketch.table().to_vec();
        let grew = current
            .iter()
            .zip(&previous)
            .filter(|(now, before)| now > before)
            .count();
        // one update touches at most one cell per row
        assert_that!(grew, le(sketch.depth()));
        previous = current;
    }
    // 2000 updates without decay would leave 40 per item
    assert_that!(sketch.query(0u64).unwrap(), le(40));
}

#[test]
fn test_probability_one_halves_after_every_update() {
    let mut sketch = Sketch::builder(0.1, 0.01)
        .decay_policy(ProbabilisticDecay::new(1.0, 0.5, 0).unwrap())
        .build()
        .unwrap();
    sketch.update_with_weight("x", 8).unwrap();
    assert_eq!(sketch.query("x").unwrap(), 4);
    sketch.update_with_weight("x", 1).unwrap();
    assert_eq!(sketch.query("x").unwrap(), 2);
}

#[test]
fn test_lossy_counting_forgets_rare_items() {
    let mut sketch = Sketch::builder(0.01, 0.01)
        .update_rule(ConservativeUpdate)
        .decay_policy(LossyCounting::new(0.5, LossyThreshold::All).unwrap())
        .build()
        .unwrap();
    sketch.update_with_weight("heavy", 3).unwrap();
    sketch.update_with_weight("rare", 1).unwrap();
    // the window of two updates closed: every non-zero counter lost one
    assert_eq!(sketch.query("heavy").unwrap(), 2);
    assert_eq!(sketch.query("rare").unwrap(), 0);
    // decrements only touch small cells, the stream weight is kept
    assert_eq!(sketch.total_weight(), 4);
}

#[test]
fn test_lossy_threshold_one_spares_larger_counters() {
    let mut sketch = Sketch::builder(0.01, 0.01)
        .decay_policy(LossyCounting::new(0.25, LossyThreshold::One).unwrap())
        .build()
        .unwrap();
    sketch.update_with_weight("heavy", 5).unwrap();
    for item in ["x", "y", "z"] {
        sketch.update(item).unwrap();
    }
    assert_eq!(sketch.query("heavy").unwrap(), 5);
    for item in ["x", "y", "z"] {
        assert_eq!(sketch.query(item).unwrap(), 0);
    }
}

#[test]
fn test_reset_rewinds_policy() {
    let mut sketch = Sketch::builder(0.1, 0.01)
        .decay_policy(PeriodicDecay::new(3, 0.5).unwrap())
        .build()
        .unwrap();
    sketch.update_batch(["a", "a"]).unwrap();
    sketch.reset();
    sketch.update_batch(["a", "a"]).unwrap();
    // only two updates since the reset: no decay yet
    assert_that!(sketch.query("a").unwrap(), ge(2));
    assert_eq!(sketch.updates(), 2);
}
