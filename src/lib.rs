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

//! Count-min sketches with pluggable strategies.
//!
//! A [`Sketch`] summarizes a stream of items in a fixed `depth × width` table
//! of counters and answers approximate frequency queries. For relative error
//! `ε` and failure probability `δ` the table has `w = ceil(e / ε)` columns and
//! `d = ceil(ln(1 / δ))` rows, and with probability at least `1 - δ` the min
//! estimate overshoots the true count by at most `ε·T`, where `T` is the total
//! inserted weight.
//!
//! Every step of the sketch is a replaceable strategy:
//!
//! - counter storage: [`table`]
//! - row hashing: [`hash`]
//! - the update rule: [`update`]
//! - decay: [`decay`]
//! - estimation: [`estimate`]
//!
//! [`TopKTracker`] layers exact counts for the heaviest items on top of a
//! sketch.
//!
//! # Examples
//!
//! ```
//! use minsketch::Sketch;
//! use minsketch::TopKTracker;
//!
//! let sketch = Sketch::new(0.1, 0.01).unwrap();
//! let mut tracker = TopKTracker::new(sketch, 2).unwrap();
//! for word in "the cat saw the other cat and the dog".split(' ') {
//!     tracker.update(word).unwrap();
//! }
//! assert_eq!(tracker.most_common(1), vec![("the", 3)]);
//! assert!(tracker.query("dog").unwrap() >= 1);
//! ```

pub mod decay;
pub mod error;
pub mod estimate;
pub mod hash;
pub mod item;
pub mod table;
pub mod topk;
pub mod update;

mod sketch;

pub use self::sketch::Sketch;
pub use self::sketch::SketchBuilder;
pub use self::topk::TopKTracker;
