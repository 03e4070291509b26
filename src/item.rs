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

//! Canonical byte encoding of sketch items.
//!
//! Sketches never look at the structure of a key: every item is first turned
//! into a byte string by its [`SketchItem`] implementation and only those bytes
//! are hashed. Two values with the same encoding are the same item to a sketch,
//! so `1u32` and `1i32` collide while `1u32` and `1u64` do not.
//!
//! Implement the trait for your own key types:
//!
//! ```rust
//! use minsketch::error::Error;
//! use minsketch::item::SketchItem;
//!
//! struct Endpoint {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl SketchItem for Endpoint {
//!     fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
//!         self.host.encode(out)?;
//!         out.push(b':');
//!         self.port.encode(out)
//!     }
//! }
//! ```

use byteorder::LittleEndian;
use byteorder::WriteBytesExt;

use crate::error::Error;

/// An item that can be counted by a sketch.
pub trait SketchItem {
    /// Appends the canonical byte encoding of `self` to `out`.
    ///
    /// Implementations must be pure: encoding the same value twice yields the
    /// same bytes. Failures are reported as
    /// [`ErrorKind::EncodingFailed`](crate::error::ErrorKind::EncodingFailed).
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error>;
}

/// Encodes `item` into a fresh buffer.
pub fn encode_to_vec<T: SketchItem + ?Sized>(item: &T) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    item.encode(&mut out)?;
    Ok(out)
}

fn write_failed(err: std::io::Error) -> Error {
    Error::encoding_failed("failed to write fixed-width integer").set_source(err)
}

impl<T: SketchItem + ?Sized> SketchItem for &T {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (**self).encode(out)
    }
}

impl<T: SketchItem + ?Sized> SketchItem for Box<T> {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (**self).encode(out)
    }
}

impl SketchItem for str {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl SketchItem for String {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        self.as_str().encode(out)
    }
}

impl SketchItem for [u8] {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        out.extend_from_slice(self);
        Ok(())
    }
}

impl SketchItem for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        self.as_slice().encode(out)
    }
}

impl<const N: usize> SketchItem for [u8; N] {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        self.as_slice().encode(out)
    }
}

impl SketchItem for u8 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        out.write_u8(*self).map_err(write_failed)
    }
}

impl SketchItem for i8 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        out.write_i8(*self).map_err(write_failed)
    }
}

macro_rules! impl_fixed_width {
    ($name:ty, $write:ident) => {
        impl SketchItem for $name {
            fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
                out.$write::<LittleEndian>(*self).map_err(write_failed)
            }
        }
    };
}

impl_fixed_width!(u16, write_u16);
impl_fixed_width!(u32, write_u32);
impl_fixed_width!(u64, write_u64);
impl_fixed_width!(u128, write_u128);
impl_fixed_width!(i16, write_i16);
impl_fixed_width!(i32, write_i32);
impl_fixed_width!(i64, write_i64);
impl_fixed_width!(i128, write_i128);

// Pointer-sized integers widen so the encoding does not depend on the platform.
impl SketchItem for usize {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (*self as u64).encode(out)
    }
}

impl SketchItem for isize {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (*self as i64).encode(out)
    }
}

impl SketchItem for bool {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (*self as u8).encode(out)
    }
}

impl SketchItem for char {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (*self as u32).encode(out)
    }
}

impl SketchItem for f64 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        if self.is_nan() {
            return Err(Error::encoding_failed("NaN has no canonical encoding"));
        }
        // -0.0 == 0.0, so both must count as the same item
        let canonical = if *self == 0.0 { 0.0f64 } else { *self };
        out.write_f64::<LittleEndian>(canonical)
            .map_err(write_failed)
    }
}

impl SketchItem for f32 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        (*self as f64).encode(out)
    }
}
