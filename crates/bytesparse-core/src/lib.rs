// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Address abstraction shared by every `bytesparse` crate.
//!
//! Two families of integer types can address a sparse memory:
//!
//! - **Fixed-width** unsigned integers (`u16`, `u32`, `u64`, `usize`). The
//!   all-ones value is reserved as a *sentinel*: it is never an occupied
//!   address, only the largest legal exclusive end, and it stands for
//!   "unbounded" when reporting spans.
//! - **Wide signed** integers (`i32`, `i64`, `i128`). They carry no sentinel and
//!   allow negative addresses; `i128` is the practical stand-in for an
//!   arbitrary-precision address space.
//!
//! The block-list engine is generic over [`Address`], so both families share a
//! single implementation.

use num_traits::PrimInt;
use std::fmt::{Debug, Display};
use std::hash::Hash;

pub mod iter;
pub mod primitives;

pub use iter::{Tiled, tile_into};
pub use primitives::Span;

/// An integer coordinate in a sparse address space.
///
/// Arithmetic helpers come in two flavours: the `checked_*` methods validate
/// user supplied values, while [`Address::advance`] and [`Address::distance`]
/// are used on values that the container invariants already keep in range.
pub trait Address: PrimInt + Hash + Debug + Display + Default + Send + Sync + 'static {
    /// Width of the address type in bits.
    const WIDTH: u32;

    /// The reserved, never occupied address of fixed-width types.
    fn sentinel() -> Option<Self>;

    /// Lowest occupiable address.
    fn lowest() -> Self;

    /// Largest legal exclusive end.
    fn highest_endex() -> Self;

    /// Largest single payload accepted by one operation: half the address
    /// space, capped by what a `Vec` can hold.
    fn max_block_len() -> usize;

    /// `self + len`, assuming the result is representable.
    fn advance(self, len: usize) -> Self;

    /// `self - len`, assuming the result is representable.
    fn retreat(self, len: usize) -> Self;

    /// `self + len`, or `None` on overflow.
    fn checked_advance(self, len: usize) -> Option<Self>;

    /// `self - len`, or `None` on underflow.
    fn checked_retreat(self, len: usize) -> Option<Self>;

    /// `endex - self` as a length, assuming `self <= endex` and that the
    /// difference fits a block.
    fn distance(self, endex: Self) -> usize;

    /// `endex - self` over the whole address space.
    fn measure(self, endex: Self) -> u128;

    /// Lossless widening used for signed shift arithmetic.
    fn to_wide(self) -> i128;

    /// Narrowing from the wide representation.
    fn from_wide(value: i128) -> Option<Self>;

    /// Whether `self` may be occupied, i.e. is not the sentinel.
    #[inline]
    fn is_occupiable(self) -> bool {
        Self::sentinel() != Some(self)
    }

    /// Whether `self` may be used as an exclusive end.
    #[inline]
    fn is_valid_endex(self) -> bool {
        self >= Self::lowest() && self <= Self::highest_endex()
    }

    /// `self + offset` for a signed offset, or `None` when the result leaves
    /// `[lowest, highest_endex]`.
    #[inline]
    fn checked_offset(self, offset: i128) -> Option<Self> {
        let moved = self.to_wide().checked_add(offset)?;
        let moved = Self::from_wide(moved)?;
        moved.is_valid_endex().then_some(moved)
    }
}

#[inline]
const fn half_space(width: u32) -> usize {
    let half = 1u128 << (width - 1);
    if half > isize::MAX as u128 {
        isize::MAX as usize
    } else {
        half as usize
    }
}

macro_rules! impl_address {
    ($t:ty, $u:ty, sentinel = $sentinel:expr) => {
        impl Address for $t {
            const WIDTH: u32 = <$t>::BITS;

            #[inline]
            fn sentinel() -> Option<Self> {
                $sentinel
            }

            #[inline]
            fn lowest() -> Self {
                <$t>::MIN
            }

            #[inline]
            fn highest_endex() -> Self {
                <$t>::MAX
            }

            #[inline]
            fn max_block_len() -> usize {
                half_space(<$t>::BITS)
            }

            #[inline]
            fn advance(self, len: usize) -> Self {
                (self as $u).wrapping_add(len as $u) as $t
            }

            #[inline]
            fn retreat(self, len: usize) -> Self {
                (self as $u).wrapping_sub(len as $u) as $t
            }

            #[inline]
            fn checked_advance(self, len: usize) -> Option<Self> {
                let moved = self.to_wide().checked_add(i128::try_from(len).ok()?)?;
                <$t>::try_from(moved).ok()
            }

            #[inline]
            fn checked_retreat(self, len: usize) -> Option<Self> {
                let moved = self.to_wide().checked_sub(i128::try_from(len).ok()?)?;
                <$t>::try_from(moved).ok()
            }

            #[inline]
            fn distance(self, endex: Self) -> usize {
                debug_assert!(self <= endex, "distance: {} > {}", self, endex);
                endex.wrapping_sub(self) as $u as usize
            }

            #[inline]
            fn measure(self, endex: Self) -> u128 {
                if endex <= self {
                    0
                } else {
                    endex.wrapping_sub(self) as $u as u128
                }
            }

            #[inline]
            fn to_wide(self) -> i128 {
                self as i128
            }

            #[inline]
            fn from_wide(value: i128) -> Option<Self> {
                <$t>::try_from(value).ok()
            }
        }
    };
}

impl_address!(u16, u16, sentinel = Some(u16::MAX));
impl_address!(u32, u32, sentinel = Some(u32::MAX));
impl_address!(u64, u64, sentinel = Some(u64::MAX));
impl_address!(usize, usize, sentinel = Some(usize::MAX));
impl_address!(i32, u32, sentinel = None);
impl_address!(i64, u64, sentinel = None);
impl_address!(i128, u128, sentinel = None);

/// Address width of the default fixed-width variant.
pub const FIXED_ADDRESS_WIDTH: u32 = u64::BITS;

/// Reserved sentinel of the default fixed-width variant.
pub const FIXED_ADDRESS_SENTINEL: u64 = u64::MAX;
