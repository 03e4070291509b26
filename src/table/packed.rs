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
use crate::table::checked_len;
use crate::table::try_zeroed;

const WORD_BITS: u32 = u64::BITS;
const MAX_COUNTER_BITS: u8 = 32;

/// Counters of an arbitrary bit width packed into 64-bit words.
///
/// Counters never straddle a word boundary: a word holds `64 / bits` counters
/// and any leftover high bits stay zero. Each row starts on a fresh word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTable {
    depth: usize,
    width: usize,
    bits: u8,
    per_word: usize,
    words_per_row: usize,
    mask: u64,
    words: Box<[u64]>,
}

impl PackedTable {
    /// Allocates a zero-filled table with `bits`-bit counters.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// unless `bits` is in `[1, 32]`, or if the words cannot be allocated.
    pub fn new(depth: usize, width: usize, bits: u8) -> Result<Self, Error> {
        if bits == 0 || bits > MAX_COUNTER_BITS {
            return Err(Error::config_invalid(format!(
                "packed counter width must be in [1, {MAX_COUNTER_BITS}]"
            ))
            .with_context("bits", bits));
        }
        let per_word = (WORD_BITS / bits as u32) as usize;
        let words_per_row = width.div_ceil(per_word);
        let len = checked_len(depth, words_per_row)?;
        Ok(Self {
            depth,
            width,
            bits,
            per_word,
            words_per_row,
            mask: (1u64 << bits) - 1,
            words: try_zeroed(len, 0u64)?,
        })
    }

    /// Width of each counter in bits.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Get the total number of bytes used by the packed words
    pub fn size_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    /// Returns (word index, bit shift) of a counter.
    #[inline]
    fn locate(&self, row: usize, col: usize) -> (usize, u32) {
        debug_assert!(row < self.depth && col < self.width);
        let word = row * self.words_per_row + col / self.per_word;
        let shift = ((col % self.per_word) as u32) * self.bits as u32;
        (word, shift)
    }

    #[inline]
    fn put(&mut self, row: usize, col: usize, value: u64) {
        debug_assert!(value <= self.mask);
        let (word, shift) = self.locate(row, col);
        let cleared = self.words[word] & !(self.mask << shift);
        self.words[word] = cleared | (value << shift);
    }
}

impl CounterTable for PackedTable {
    fn shape(&self) -> (usize, usize) {
        (self.depth, self.width)
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> u64 {
        let (word, shift) = self.locate(row, col);
        (self.words[word] >> shift) & self.mask
    }

    fn increment(&mut self, row: usize, col: usize, amount: i64) -> u64 {
        let new = self.get(row, col).saturating_add_signed(amount).min(self.mask);
        self.put(row, col, new);
        new
    }

    fn reset(&mut self) {
        self.words.fill(0);
    }

    fn max_value(&self) -> u64 {
        self.mask
    }

    fn set(&mut self, row: usize, col: usize, value: u64) {
        self.put(row, col, value.min(self.mask));
    }
}
