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

use bytesparse_core::{Address, Span};

/// A maximal run of stored bytes starting at `start`.
///
/// Blocks are never empty. The pin count tracks outstanding views aliasing the
/// block's storage; cloning a block yields an unpinned copy.
#[derive(Debug)]
pub struct Block<A> {
    start: A,
    data: Vec<u8>,
    pins: usize,
}

impl<A: Address> Block<A> {
    #[inline]
    pub(crate) fn new(start: A, data: Vec<u8>) -> Self {
        debug_assert!(!data.is_empty(), "empty block at {start}");
        Self {
            start,
            data,
            pins: 0,
        }
    }

    #[inline]
    pub fn start(&self) -> A {
        self.start
    }

    /// Exclusive end address.
    #[inline]
    pub fn endex(&self) -> A {
        self.start.advance(self.data.len())
    }

    #[inline]
    pub fn span(&self) -> Span<A> {
        Span::new(self.start, self.endex())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pins(&self) -> usize {
        self.pins
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    #[inline]
    pub fn contains(&self, address: A) -> bool {
        address >= self.start && address < self.endex()
    }

    /// Offset of `address` into the block data. `address` must lie within
    /// `[start, endex]`.
    #[inline]
    pub(crate) fn offset_of(&self, address: A) -> usize {
        self.start.distance(address)
    }

    /// The stored bytes inside `[start, endex)`, together with the address of
    /// the first returned byte.
    #[inline]
    pub(crate) fn clipped(&self, start: A, endex: A) -> (A, &[u8]) {
        let from = start.max(self.start).min(self.endex());
        let to = endex.min(self.endex()).max(from);
        (from, &self.data[self.offset_of(from)..self.offset_of(to)])
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    #[inline]
    pub(crate) fn set_start(&mut self, start: A) {
        self.start = start;
    }

    #[inline]
    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    #[inline]
    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of an unpinned block at {}", self.start);
        self.pins = self.pins.saturating_sub(1);
    }

    #[inline]
    pub(crate) fn into_parts(self) -> (A, Vec<u8>) {
        (self.start, self.data)
    }
}

impl<A: Clone> Clone for Block<A> {
    fn clone(&self) -> Self {
        Self {
            start: self.start.clone(),
            data: self.data.clone(),
            pins: 0,
        }
    }
}

/// Blocks compare by address and content; pins are ignored.
impl<A: PartialEq> PartialEq for Block<A> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.data == other.data
    }
}

impl<A: Eq> Eq for Block<A> {}
