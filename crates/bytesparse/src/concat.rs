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

//! Concatenation and repetition of whole memories.

use crate::err::{MemoryError, MemoryResult};
use crate::memory::Memory;
use bytesparse_core::Address;
use std::ops::{Add, AddAssign, Mul, MulAssign};
use tracing::instrument;

impl<A: Address> Memory<A> {
    /// `times` back-to-back copies of the content span, the first one in place.
    ///
    /// The copy keeps the bounds and configuration; repetitions past the
    /// bounds are dropped. Zero times gives an empty memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::from_blocks([(2, b"ab".to_vec()), (5, b"c".to_vec())], None, None).unwrap();
    /// let repeated = memory.repeat(2).unwrap();
    /// assert_eq!(
    ///     repeated.to_blocks(),
    ///     vec![(2, b"ab".to_vec()), (5, b"cab".to_vec()), (9, b"c".to_vec())]
    /// );
    /// ```
    #[instrument(level = "debug", skip(self), fields(parts = self.content_parts()), err(Display))]
    pub fn repeat(&self, times: usize) -> MemoryResult<Self, A> {
        let mut repeated = Self {
            config: self.config.clone(),
            ..Self::new()
        };
        repeated.store_bounds(self.bound_start, self.bound_endex);
        if times == 0 || self.blocks.is_empty() {
            return Ok(repeated);
        }
        let (start, endex) = self.content_span();
        let size = start.measure(endex);
        let overflow = || MemoryError::RangeOverflow {
            start,
            len: size.saturating_mul(times as u128),
        };
        let step = i128::try_from(size).map_err(|_| overflow())?;
        let limit = repeated.window().endex();

        let mut offset = 0i128;
        for copy in 0..times {
            if copy > 0 {
                offset = offset.checked_add(step).ok_or_else(overflow)?;
            }
            if start.checked_offset(offset).is_none_or(|at| at >= limit) {
                break;
            }
            for block in self.blocks.iter() {
                let at = block.start().checked_offset(offset).ok_or_else(overflow)?;
                let to = block.endex().checked_offset(offset).ok_or_else(overflow)?;
                if let Some(span) = repeated.clip(at, to) {
                    let data = &block.data()[at.distance(span.start())..at.distance(span.endex())];
                    repeated.blocks.insert_block(span.start(), data)?;
                }
            }
        }
        repeated.finish("repeat");
        Ok(repeated)
    }

    /// Replaces the content with [`Memory::repeat`] of itself.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ResourceBusy`] while any block is pinned by a view.
    pub fn repeat_in_place(&mut self, times: usize) -> MemoryResult<(), A> {
        self.guard(0..self.blocks.len())?;
        self.blocks = self.repeat(times)?.blocks;
        Ok(())
    }
}

impl<A: Address> Add<&Memory<A>> for Memory<A> {
    type Output = Memory<A>;

    /// Appends `rhs` as [`Memory::extend_memory`] does with a zero offset.
    ///
    /// # Panics
    ///
    /// Panics if the appended content leaves the address space or touches a
    /// pinned block.
    #[inline]
    fn add(mut self, rhs: &Memory<A>) -> Self::Output {
        self += rhs;
        self
    }
}

impl<A: Address> Add<&Memory<A>> for &Memory<A> {
    type Output = Memory<A>;

    #[inline]
    fn add(self, rhs: &Memory<A>) -> Self::Output {
        self.copy() + rhs
    }
}

impl<A: Address> AddAssign<&Memory<A>> for Memory<A> {
    /// # Panics
    ///
    /// Panics if the appended content leaves the address space or touches a
    /// pinned block.
    #[inline]
    fn add_assign(&mut self, rhs: &Memory<A>) {
        self.extend_memory(rhs, 0)
            .expect("overflow in Memory += Memory");
    }
}

impl<A: Address> Mul<usize> for &Memory<A> {
    type Output = Memory<A>;

    /// # Panics
    ///
    /// Panics if the repetitions leave the address space.
    #[inline]
    fn mul(self, times: usize) -> Self::Output {
        self.repeat(times).expect("overflow in Memory * usize")
    }
}

impl<A: Address> MulAssign<usize> for Memory<A> {
    /// # Panics
    ///
    /// Panics if the repetitions leave the address space or the memory holds a
    /// pinned block.
    #[inline]
    fn mul_assign(&mut self, times: usize) {
        self.repeat_in_place(times)
            .expect("overflow in Memory *= usize");
    }
}
