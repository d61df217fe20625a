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

use crate::blocklist::BlockList;
use crate::err::MemoryResult;
use crate::memory::Memory;
use crate::view::ViewRegistry;
use bytesparse_core::Address;
use std::ops::RangeBounds;
use tracing::{instrument, trace};

impl<A: Address> Memory<A> {
    /// Moves the content of the range into a new memory bounded to it.
    ///
    /// Fully covered blocks change owner without copying; edge blocks are
    /// split. Nothing after the range moves.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::from_bytes(b"Hello, World!", 0).unwrap();
    /// let cut = memory.cut(5..7).unwrap();
    /// assert_eq!(cut.to_blocks(), vec![(5, b", ".to_vec())]);
    /// assert_eq!(cut.span(), (5, 7));
    /// assert_eq!(memory.content_parts(), 2);
    ///
    /// memory.write_memory(5, &cut, false).unwrap();
    /// assert_eq!(memory.to_bytes(..), b"Hello, World!");
    /// ```
    #[instrument(level = "debug", skip(self, range), err(Display))]
    pub fn cut<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<Self, A> {
        let (start, endex) = self.resolve(&range)?;
        self.guard(self.blocks.find_blocks_overlapping(start, endex))?;
        let taken = self.blocks.take_range(start, endex)?;
        trace!(%start, %endex, parts = taken.len(), "cut");
        let mut cut = Self {
            blocks: BlockList::from_sorted(taken),
            config: self.config.clone(),
            ..Self::new()
        };
        cut.store_bounds(Some(start), Some(endex));
        self.finish("cut");
        Ok(cut)
    }

    /// Deep copy with the same bounds, configuration and content, but no
    /// pins and no views.
    pub fn copy(&self) -> Self {
        Self {
            blocks: self.blocks.clone(),
            bound_start: self.bound_start,
            bound_endex: self.bound_endex,
            views: ViewRegistry::default(),
            config: self.config.clone(),
        }
    }
}

impl<A: Address> Clone for Memory<A> {
    #[inline]
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Memories compare by bounds and content.
impl<A: Address> PartialEq for Memory<A> {
    fn eq(&self, other: &Self) -> bool {
        self.bound_span() == other.bound_span() && self.blocks == other.blocks
    }
}

impl<A: Address> Eq for Memory<A> {}
