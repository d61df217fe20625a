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

//! Bounded addressing: the optional window every memory is confined to, and
//! the span quantities derived from bounds and content.

use crate::err::MemoryResult;
use crate::memory::Memory;
use bytesparse_core::Address;
use tracing::debug;

impl<A: Address> Memory<A> {
    #[inline]
    pub fn bound_start(&self) -> Option<A> {
        self.bound_start
    }

    #[inline]
    pub fn bound_endex(&self) -> Option<A> {
        self.bound_endex
    }

    #[inline]
    pub fn bound_span(&self) -> (Option<A>, Option<A>) {
        (self.bound_start, self.bound_endex)
    }

    /// Stores bounds on a memory known to hold nothing outside them.
    pub(crate) fn store_bounds(&mut self, start: Option<A>, endex: Option<A>) {
        self.bound_start = start;
        self.bound_endex = match (start, endex) {
            (Some(start), Some(endex)) if endex < start => Some(start),
            _ => endex,
        };
    }

    /// Sets both bounds, dropping content outside them.
    ///
    /// An `endex` below `start` is clamped up to `start`.
    pub fn set_bound_span(&mut self, start: Option<A>, endex: Option<A>) -> MemoryResult<(), A> {
        let endex = match (start, endex) {
            (Some(start), Some(endex)) if endex < start => Some(start),
            _ => endex,
        };
        let (lowest, highest) = (A::lowest(), A::highest_endex());
        let lower = start.unwrap_or(lowest);
        let upper = endex.unwrap_or(highest);
        self.guard(self.blocks.find_blocks_overlapping(lowest, lower))?;
        self.guard(self.blocks.find_blocks_overlapping(upper, highest))?;

        self.blocks.remove_range(lowest, lower)?;
        self.blocks.remove_range(upper, highest)?;
        self.bound_start = start;
        self.bound_endex = endex;
        debug!(?start, ?endex, "bounds set");
        self.finish("set_bound_span");
        Ok(())
    }

    /// Sets the lower bound, raising the upper bound if it would fall below.
    pub fn set_bound_start(&mut self, start: Option<A>) -> MemoryResult<(), A> {
        let endex = match (start, self.bound_endex) {
            (Some(start), Some(endex)) if endex < start => Some(start),
            (_, endex) => endex,
        };
        self.set_bound_span(start, endex)
    }

    /// Sets the upper bound, lowering the lower bound if it would rise above.
    pub fn set_bound_endex(&mut self, endex: Option<A>) -> MemoryResult<(), A> {
        let start = match (self.bound_start, endex) {
            (Some(start), Some(endex)) if endex < start => Some(endex),
            (start, _) => start,
        };
        self.set_bound_span(start, endex)
    }

    /// Clamps a range into the bounds.
    ///
    /// Missing ends default to [`Memory::start`] and [`Memory::endex`]; the
    /// result always satisfies `start <= endex`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::with_bounds(Some(11), Some(44));
    /// assert_eq!(memory.bound(Some(0), Some(99)), (11, 44));
    /// assert_eq!(memory.bound(Some(99), Some(0)), (44, 44));
    /// assert_eq!(memory.bound(None, Some(33)), (11, 33));
    /// ```
    pub fn bound(&self, start: Option<A>, endex: Option<A>) -> (A, A) {
        let clamp = |address: A| {
            let address = self.bound_start.map_or(address, |lower| address.max(lower));
            self.bound_endex.map_or(address, |upper| address.min(upper))
        };
        let start = clamp(start.unwrap_or_else(|| self.start()));
        let endex = clamp(endex.unwrap_or_else(|| self.endex()));
        (start, endex.max(start))
    }

    /// First stored address, else the lower bound, else zero.
    #[inline]
    pub fn content_start(&self) -> A {
        match self.blocks.first() {
            Some(block) => block.start(),
            None => self.bound_start.unwrap_or_else(A::zero),
        }
    }

    /// End of the last block, else [`Memory::content_start`].
    #[inline]
    pub fn content_endex(&self) -> A {
        match self.blocks.last() {
            Some(block) => block.endex(),
            None => self.content_start(),
        }
    }

    #[inline]
    pub fn content_span(&self) -> (A, A) {
        (self.content_start(), self.content_endex())
    }

    /// Number of stored bytes.
    #[inline]
    pub fn content_size(&self) -> usize {
        self.blocks.content_size()
    }

    /// Number of blocks.
    #[inline]
    pub fn content_parts(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the whole span is covered by at most one block.
    pub fn contiguous(&self) -> bool {
        match self.blocks.as_slice() {
            [] => self.start() == self.endex(),
            [block] => (block.start(), block.endex()) == self.span(),
            _ => false,
        }
    }

    /// The lower bound, else [`Memory::content_start`].
    #[inline]
    pub fn start(&self) -> A {
        self.bound_start.unwrap_or_else(|| self.content_start())
    }

    /// The upper bound, else [`Memory::content_endex`].
    #[inline]
    pub fn endex(&self) -> A {
        self.bound_endex.unwrap_or_else(|| self.content_endex())
    }

    #[inline]
    pub fn span(&self) -> (A, A) {
        (self.start(), self.endex())
    }

    /// The inclusive end, one below [`Memory::endex`].
    ///
    /// `None` when the end sits on the lowest address, which happens for an
    /// empty unbounded memory of an unsigned address type.
    #[inline]
    pub fn endin(&self) -> Option<A> {
        self.endex().checked_retreat(1)
    }

    /// The inclusive end of the content, one below [`Memory::content_endex`].
    #[inline]
    pub fn content_endin(&self) -> Option<A> {
        self.content_endex().checked_retreat(1)
    }

    /// Length of the span, gaps included.
    #[inline]
    pub fn len(&self) -> u128 {
        self.start().measure(self.endex())
    }

    /// Whether nothing is stored. Bounds may still give a non-zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
