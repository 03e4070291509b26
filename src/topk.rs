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

//! Exact counts for the K heaviest items on top of a sketch.
//!
//! The tracker keeps an exact counter for at most K items and answers every
//! other query from the sketch. An untracked item is admitted when its sketch
//! estimate plus the new amount beats the smallest tracked count, evicting
//! that entry. Every update is forwarded to the sketch as well, so untracked
//! and evicted items keep their approximate counts.

use std::borrow::Borrow;
use std::borrow::BorrowMut;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::Error;
use crate::item::SketchItem;
use crate::item::encode_to_vec;
use crate::sketch::Sketch;

/// Ranking key: ascending count, then latest first-seen first.
type Rank = (u64, Reverse<u64>);

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    seq: u64,
}

impl Entry {
    fn rank(&self) -> Rank {
        (self.count, Reverse(self.seq))
    }
}

/// Hybrid exact/approximate heavy-hitter tracker.
///
/// `S` is either an owned [`Sketch`] or a `&mut Sketch`, so a tracker can be
/// layered over a sketch the caller keeps using afterwards.
///
/// # Examples
///
/// ```
/// # use minsketch::Sketch;
/// # use minsketch::topk::TopKTracker;
/// let sketch = Sketch::new(0.1, 0.01).unwrap();
/// let mut tracker = TopKTracker::new(sketch, 2).unwrap();
/// tracker.update_with_weight("a", 10).unwrap();
/// tracker.update_with_weight("b", 5).unwrap();
/// tracker.update_with_weight("a", 3).unwrap();
/// assert_eq!(tracker.most_common(2), vec![("a", 13), ("b", 5)]);
/// ```
#[derive(Debug)]
pub struct TopKTracker<K, S = Sketch> {
    sketch: S,
    capacity: usize,
    entries: HashMap<K, Entry>,
    ranking: BTreeMap<Rank, K>,
    next_seq: u64,
}

impl<K, S> TopKTracker<K, S>
where
    K: Hash + Eq + Clone + SketchItem,
    S: BorrowMut<Sketch>,
{
    /// Tracks at most `k` items on top of `sketch`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `k` is zero.
    pub fn new(sketch: S, k: usize) -> Result<Self, Error> {
        if k == 0 {
            return Err(Error::config_invalid("top-k capacity must be at least 1"));
        }
        Ok(Self {
            sketch,
            capacity: k,
            entries: HashMap::with_capacity(k),
            ranking: BTreeMap::new(),
            next_seq: 0,
        })
    }

    /// Adds one occurrence of `item`.
    pub fn update(&mut self, item: K) -> Result<(), Error> {
        self.update_with_weight(item, 1)
    }

    /// Adds `amount` occurrences of `item` to the sketch and the tracked set.
    ///
    /// # Errors
    ///
    /// Propagates the sketch's error; the tracker is unchanged on error.
    pub fn update_with_weight(&mut self, item: K, amount: i64) -> Result<(), Error> {
        let bytes = encode_to_vec(&item)?;
        let estimate = if self.entries.contains_key(&item) {
            0
        } else {
            self.sketch().query_bytes(&bytes)
        };
        self.sketch_mut().update_bytes(&bytes, amount)?;

        if let Some(entry) = self.entries.get_mut(&item) {
            let old = entry.rank();
            entry.count = entry.count.saturating_add_signed(amount);
            let new = entry.rank();
            if let Some(key) = self.ranking.remove(&old) {
                self.ranking.insert(new, key);
            }
            return Ok(());
        }

        if amount <= 0 {
            return Ok(());
        }
        let candidate = estimate.saturating_add(amount as u64);

        if self.entries.len() < self.capacity {
            log::trace!("admitting item with count {candidate} into free slot");
            self.track(item, candidate);
            return Ok(());
        }

        let Some(&weakest) = self.ranking.keys().next() else {
            return Ok(());
        };
        if candidate > weakest.0 {
            if let Some(evicted) = self.ranking.remove(&weakest) {
                self.entries.remove(&evicted);
            }
            log::debug!(
                "evicting tracked item with count {} for item with estimate {candidate}",
                weakest.0
            );
            self.track(item, candidate);
        }
        Ok(())
    }

    fn track(&mut self, item: K, count: u64) {
        let entry = Entry {
            count,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.ranking.insert(entry.rank(), item.clone());
        self.entries.insert(item, entry);
    }

    /// Adds one occurrence of every item, in order.
    pub fn update_batch<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = K>,
    {
        for item in items {
            self.update(item)?;
        }
        Ok(())
    }

    /// Exact count if `item` is tracked, otherwise the sketch estimate.
    pub fn query<Q>(&self, item: &Q) -> Result<u64, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + SketchItem + ?Sized,
    {
        match self.entries.get(item) {
            Some(entry) => Ok(entry.count),
            None => self.sketch().query(item),
        }
    }

    /// Up to `min(k, K)` tracked items by descending exact count.
    ///
    /// Ties go to the item tracked earliest.
    pub fn most_common(&self, k: usize) -> Vec<(K, u64)> {
        self.ranking
            .iter()
            .rev()
            .take(k.min(self.capacity))
            .map(|(&(count, _), item)| (item.clone(), count))
            .collect()
    }

    /// Like [`most_common`](Self::most_common), but ranks the tracked items by a
    /// joint least-squares re-estimate from the sketch instead of their exact
    /// counts.
    pub fn most_common_refined(&self, k: usize) -> Result<Vec<(K, u64)>, Error> {
        let sketch = self.sketch();
        let items: Vec<&K> = self.ranking.values().rev().collect();
        let column_sets = items
            .iter()
            .map(|item| Ok(sketch.columns(&encode_to_vec(*item)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        let refined = sketch.refine_columns(&column_sets);

        let mut ranked: Vec<(K, u64)> = items.into_iter().cloned().zip(refined).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(k.min(self.capacity));
        Ok(ranked)
    }

    /// Forgets every tracked item and resets the sketch.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.ranking.clear();
        self.next_seq = 0;
        self.sketch_mut().reset();
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no item is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of tracked items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if `item` currently holds one of the `k` slots.
    pub fn is_tracked<Q>(&self, item: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(item)
    }

    /// The underlying sketch.
    pub fn sketch(&self) -> &Sketch {
        self.sketch.borrow()
    }

    fn sketch_mut(&mut self) -> &mut Sketch {
        self.sketch.borrow_mut()
    }

    /// Releases the underlying sketch.
    pub fn into_inner(self) -> S {
        self.sketch
    }
}
