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

//! Read-only access: lookups, extraction, searching and lazy iteration.
//!
//! Range arguments of queries never fail: a malformed range behaves as an
//! empty one.

use crate::block::Block;
use crate::blocklist::BlockList;
use crate::err::{MemoryError, MemoryResult};
use crate::memory::Memory;
use bytesparse_core::{Address, Span, Tiled};
use std::iter::{FusedIterator, Rev};
use std::ops::{Bound, RangeBounds};

impl<A: Address> Memory<A> {
    /// The byte stored at `address`.
    #[inline]
    pub fn peek(&self, address: A) -> Option<u8> {
        let index = self.blocks.find_block_at(address)?;
        let block = &self.blocks[index];
        Some(block.data()[block.offset_of(address)])
    }

    /// Stored bytes inside the range, in address order, together with their
    /// start addresses.
    fn clipped_slices(&self, start: A, endex: A) -> impl DoubleEndedIterator<Item = (A, &[u8])> {
        let range = self.blocks.find_blocks_overlapping(start, endex);
        self.blocks[range]
            .iter()
            .map(move |block| block.clipped(start, endex))
    }

    /// Unbounded copy of the content inside `[start, endex)`.
    fn copy_range(&self, start: A, endex: A) -> Self {
        let blocks = self
            .clipped_slices(start, endex)
            .map(|(address, data)| Block::new(address, data.to_vec()))
            .collect();
        Self {
            blocks: BlockList::from_sorted(blocks),
            config: self.config.clone(),
            ..Self::new()
        }
    }

    /// Copy of the content inside `[start, endex)`, bounded to that range.
    pub(crate) fn snapshot(&self, start: A, endex: A) -> Self {
        let mut copy = self.copy_range(start, endex);
        copy.store_bounds(Some(start), Some(endex));
        copy
    }

    /// Copies the range into a new memory.
    ///
    /// Gaps are flooded with `pattern` when given. With `bound` set, the copy
    /// is bounded to the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::from_blocks([(1, b"AB".to_vec()), (5, b"C".to_vec())], None, None).unwrap();
    /// let copy = memory.extract(0..7, Some(b".".as_slice()), true).unwrap();
    /// assert_eq!(copy.to_bytes(..), b".AB..C.");
    /// assert_eq!(copy.bound_span(), (Some(0), Some(7)));
    /// ```
    pub fn extract<R: RangeBounds<A>>(
        &self,
        range: R,
        pattern: Option<&[u8]>,
        bound: bool,
    ) -> MemoryResult<Self, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut copy = self.copy_range(start, endex);
        if let Some(pattern) = pattern {
            if pattern.is_empty() {
                return Err(MemoryError::EmptyPattern);
            }
            copy.check_payload(start.measure(endex))?;
            copy.blocks.flood_range(start, endex, pattern, start)?;
        }
        if bound {
            copy.store_bounds(Some(start), Some(endex));
        }
        Ok(copy)
    }

    /// Concatenated stored bytes inside the range; gaps are skipped.
    pub fn to_bytes<R: RangeBounds<A>>(&self, range: R) -> Vec<u8> {
        let (start, endex) = self.resolve_lenient(&range);
        let mut bytes = Vec::new();
        for (_, data) in self.clipped_slices(start, endex) {
            bytes.extend_from_slice(data);
        }
        bytes
    }

    /// Owned `(start, data)` pairs of every block.
    pub fn to_blocks(&self) -> Vec<(A, Vec<u8>)> {
        self.blocks
            .iter()
            .map(|block| (block.start(), block.data().to_vec()))
            .collect()
    }

    /// Address of the first occurrence of `pattern` inside the range.
    ///
    /// Matches never span a gap. An empty pattern matches at the range start.
    pub fn find<R: RangeBounds<A>>(&self, pattern: impl AsRef<[u8]>, range: R) -> Option<A> {
        let pattern = pattern.as_ref();
        let (start, endex) = self.resolve_lenient(&range);
        if pattern.is_empty() {
            return Some(start);
        }
        self.clipped_slices(start, endex).find_map(|(address, data)| {
            data.windows(pattern.len())
                .position(|window| window == pattern)
                .map(|offset| address.advance(offset))
        })
    }

    /// Address of the last occurrence of `pattern` inside the range.
    pub fn rfind<R: RangeBounds<A>>(&self, pattern: impl AsRef<[u8]>, range: R) -> Option<A> {
        let pattern = pattern.as_ref();
        let (start, endex) = self.resolve_lenient(&range);
        if pattern.is_empty() {
            return Some(start);
        }
        self.clipped_slices(start, endex).rev().find_map(|(address, data)| {
            data.windows(pattern.len())
                .rposition(|window| window == pattern)
                .map(|offset| address.advance(offset))
        })
    }

    /// Like [`Memory::find`], failing with [`MemoryError::NotFound`].
    #[inline]
    pub fn index<R: RangeBounds<A>>(&self, pattern: impl AsRef<[u8]>, range: R) -> MemoryResult<A, A> {
        self.find(pattern, range).ok_or(MemoryError::NotFound)
    }

    /// Like [`Memory::rfind`], failing with [`MemoryError::NotFound`].
    #[inline]
    pub fn rindex<R: RangeBounds<A>>(&self, pattern: impl AsRef<[u8]>, range: R) -> MemoryResult<A, A> {
        self.rfind(pattern, range).ok_or(MemoryError::NotFound)
    }

    /// Number of non-overlapping occurrences of `pattern` inside the range.
    pub fn count<R: RangeBounds<A>>(&self, pattern: impl AsRef<[u8]>, range: R) -> usize {
        let pattern = pattern.as_ref();
        if pattern.is_empty() {
            return 0;
        }
        let (start, endex) = self.resolve_lenient(&range);
        self.clipped_slices(start, endex)
            .map(|(_, data)| count_disjoint(data, pattern))
            .sum()
    }

    /// Whether `pattern` occurs anywhere in the stored content.
    #[inline]
    pub fn contains(&self, pattern: impl AsRef<[u8]>) -> bool {
        self.find(pattern, ..).is_some()
    }

    /// Spans of the blocks inside the range, clipped to it.
    pub fn intervals<R: RangeBounds<A>>(&self, range: R) -> Intervals<'_, A> {
        let (start, endex) = self.resolve_lenient(&range);
        let range = self.blocks.find_blocks_overlapping(start, endex);
        Intervals {
            blocks: self.blocks[range].iter(),
            start,
            endex,
        }
    }

    /// Gaps between blocks inside the range.
    ///
    /// Open range ends default to the bounds. A `None` end means the gap runs
    /// to the unbounded edge of the address space.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::from_blocks([(2, b"ab".to_vec()), (6, b"c".to_vec())], None, None).unwrap();
    /// let gaps: Vec<_> = memory.gaps(..).collect();
    /// assert_eq!(gaps, vec![(None, Some(2)), (Some(4), Some(6)), (Some(7), None)]);
    /// ```
    pub fn gaps<R: RangeBounds<A>>(&self, range: R) -> Gaps<'_, A> {
        let lower = match range.start_bound() {
            Bound::Included(&start) => Some(start),
            Bound::Excluded(&start) => Some(start.checked_advance(1).unwrap_or(start)),
            Bound::Unbounded => self.bound_start,
        };
        let upper = match range.end_bound() {
            Bound::Included(&last) => Some(last.checked_advance(1).unwrap_or(last)),
            Bound::Excluded(&endex) => Some(endex),
            Bound::Unbounded => self.bound_endex,
        };
        let upper = match (lower, upper) {
            (Some(lower), Some(upper)) => Some(upper.max(lower)),
            (_, upper) => upper,
        };
        let range = self.blocks.find_blocks_overlapping(
            lower.unwrap_or_else(A::lowest),
            upper.unwrap_or_else(A::highest_endex),
        );
        Gaps {
            blocks: self.blocks[range].iter(),
            cursor: lower,
            lower,
            upper,
            done: false,
        }
    }

    /// Like [`Memory::gaps`], without the gaps running to an unbounded edge
    /// of the address space.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::from_blocks([(2, b"ab".to_vec()), (6, b"c".to_vec())], None, None).unwrap();
    /// let gaps: Vec<_> = memory.bounded_gaps(..).collect();
    /// assert_eq!(gaps, vec![(4, 6)]);
    /// ```
    #[inline]
    pub fn bounded_gaps<R: RangeBounds<A>>(&self, range: R) -> BoundedGaps<'_, A> {
        BoundedGaps {
            gaps: self.gaps(range),
        }
    }

    /// Every address in the range.
    pub fn keys<R: RangeBounds<A>>(&self, range: R) -> Keys<A> {
        let (start, endex) = self.resolve_lenient(&range);
        Keys { next: start, endex }
    }

    /// The value at every address in the range.
    ///
    /// Gaps yield `None`, or the configured gap pattern tiled from the range
    /// start.
    pub fn values<R: RangeBounds<A>>(&self, range: R) -> Values<'_, A> {
        let (start, endex) = self.resolve_lenient(&range);
        let pattern = self.config.gap_pattern.as_deref();
        Values {
            blocks: self.blocks.as_slice(),
            front: self.blocks.find_first_ending_after(start),
            back: self.blocks.find_first_starting_at_or_after(endex),
            next: start,
            endex,
            anchor: start,
            tiles: pattern.map(|pattern| Tiled::new(pattern, 0)),
            pattern,
        }
    }

    /// The values of the range from its last address down to its start.
    ///
    /// The gap pattern keeps the phase it has in [`Memory::values`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let memory = Memory::<u64>::from_bytes(b"ab", 1).unwrap();
    /// let values: Vec<_> = memory.rvalues(0..4).collect();
    /// assert_eq!(values, vec![None, Some(b'b'), Some(b'a'), None]);
    /// ```
    #[inline]
    pub fn rvalues<R: RangeBounds<A>>(&self, range: R) -> Rev<Values<'_, A>> {
        self.values(range).rev()
    }

    /// `(address, value)` pairs over the range.
    pub fn items<R: RangeBounds<A>>(&self, range: R) -> Items<'_, A> {
        let (start, endex) = self.resolve_lenient(&range);
        Items {
            keys: self.keys(start..endex),
            values: self.values(start..endex),
        }
    }

    /// The block holding `address` and the byte there, or the gap around it.
    pub fn block_span(&self, address: A) -> (Option<A>, Option<A>, Option<u8>) {
        match self.blocks.find_block_at(address) {
            Some(index) => {
                let block = &self.blocks[index];
                let value = block.data()[block.offset_of(address)];
                (Some(block.start()), Some(block.endex()), Some(value))
            }
            None => self.gap_around(address),
        }
    }

    /// The run of equal bytes holding `address`, or the gap around it.
    pub fn equal_span(&self, address: A) -> (Option<A>, Option<A>, Option<u8>) {
        let Some(index) = self.blocks.find_block_at(address) else {
            return self.gap_around(address);
        };
        let block = &self.blocks[index];
        let data = block.data();
        let offset = block.offset_of(address);
        let value = data[offset];
        let lo = data[..offset]
            .iter()
            .rposition(|&byte| byte != value)
            .map_or(0, |i| i + 1);
        let hi = data[offset..]
            .iter()
            .position(|&byte| byte != value)
            .map_or(data.len(), |i| offset + i);
        (
            Some(block.start().advance(lo)),
            Some(block.start().advance(hi)),
            Some(value),
        )
    }

    fn gap_around(&self, address: A) -> (Option<A>, Option<A>, Option<u8>) {
        let index = self.blocks.find_first_starting_at_or_after(address);
        let before = index
            .checked_sub(1)
            .and_then(|i| self.blocks.get(i))
            .map(Block::endex);
        let after = self.blocks.get(index).map(Block::start);
        (before, after, None)
    }
}

fn count_disjoint(haystack: &[u8], needle: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            count += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }
    count
}

/// Block spans clipped to a range. See [`Memory::intervals`].
#[derive(Debug, Clone)]
pub struct Intervals<'a, A> {
    blocks: std::slice::Iter<'a, Block<A>>,
    start: A,
    endex: A,
}

impl<A: Address> Intervals<'_, A> {
    #[inline]
    fn clip(&self, block: &Block<A>) -> Span<A> {
        block.span().clamp(&Span::new(self.start, self.endex))
    }
}

impl<A: Address> Iterator for Intervals<'_, A> {
    type Item = Span<A>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.next()?;
        Some(self.clip(block))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.blocks.size_hint()
    }
}

impl<A: Address> DoubleEndedIterator for Intervals<'_, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        let block = self.blocks.next_back()?;
        Some(self.clip(block))
    }
}

impl<A: Address> ExactSizeIterator for Intervals<'_, A> {}
impl<A: Address> FusedIterator for Intervals<'_, A> {}

/// Gaps between blocks. See [`Memory::gaps`].
#[derive(Debug, Clone)]
pub struct Gaps<'a, A> {
    blocks: std::slice::Iter<'a, Block<A>>,
    cursor: Option<A>,
    lower: Option<A>,
    upper: Option<A>,
    done: bool,
}

impl<A: Address> Iterator for Gaps<'_, A> {
    type Item = (Option<A>, Option<A>);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.blocks.next() {
                Some(block) => {
                    let start = self.lower.map_or(block.start(), |l| block.start().max(l));
                    let endex = self.upper.map_or(block.endex(), |u| block.endex().min(u));
                    let cursor = self.cursor.replace(endex);
                    if cursor.is_none_or(|c| c < start) {
                        return Some((cursor, Some(start)));
                    }
                }
                None => {
                    self.done = true;
                    return match (self.cursor, self.upper) {
                        (Some(cursor), Some(upper)) if cursor >= upper => None,
                        gap => Some(gap),
                    };
                }
            }
        }
        None
    }
}

impl<A: Address> FusedIterator for Gaps<'_, A> {}

/// Gaps with both ends known. See [`Memory::bounded_gaps`].
#[derive(Debug, Clone)]
pub struct BoundedGaps<'a, A> {
    gaps: Gaps<'a, A>,
}

impl<A: Address> Iterator for BoundedGaps<'_, A> {
    type Item = (A, A);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.gaps.find_map(|gap| match gap {
            (Some(start), Some(endex)) => Some((start, endex)),
            _ => None,
        })
    }
}

impl<A: Address> FusedIterator for BoundedGaps<'_, A> {}

/// Addresses of a range. See [`Memory::keys`].
#[derive(Debug, Clone)]
pub struct Keys<A> {
    next: A,
    endex: A,
}

impl<A: Address> Iterator for Keys<A> {
    type Item = A;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.endex {
            return None;
        }
        let key = self.next;
        self.next = key.advance(1);
        Some(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.measure(self.endex);
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl<A: Address> DoubleEndedIterator for Keys<A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.endex {
            return None;
        }
        self.endex = self.endex.retreat(1);
        Some(self.endex)
    }
}

impl<A: Address> FusedIterator for Keys<A> {}

/// Values of a range. See [`Memory::values`].
///
/// Walks from both ends; `front` and `back` bracket the blocks still ahead.
#[derive(Debug, Clone)]
pub struct Values<'a, A> {
    blocks: &'a [Block<A>],
    front: usize,
    back: usize,
    next: A,
    endex: A,
    anchor: A,
    tiles: Option<Tiled<'a>>,
    pattern: Option<&'a [u8]>,
}

impl<A: Address> Iterator for Values<'_, A> {
    type Item = Option<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.endex {
            return None;
        }
        let address = self.next;
        self.next = address.advance(1);
        let tile = self.tiles.as_mut().and_then(Iterator::next);
        while self.front < self.back && self.blocks[self.front].endex() <= address {
            self.front += 1;
        }
        match self.blocks.get(self.front) {
            Some(block) if self.front < self.back && block.start() <= address => {
                Some(Some(block.data()[block.offset_of(address)]))
            }
            _ => Some(tile),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.measure(self.endex);
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl<A: Address> DoubleEndedIterator for Values<'_, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.endex {
            return None;
        }
        let address = self.endex.retreat(1);
        self.endex = address;
        while self.back > self.front && self.blocks[self.back - 1].start() > address {
            self.back -= 1;
        }
        match self.back.checked_sub(1).map(|index| &self.blocks[index]) {
            Some(block) if self.back > self.front && block.endex() > address => {
                Some(Some(block.data()[block.offset_of(address)]))
            }
            _ => Some(
                self.pattern
                    .and_then(|pattern| Tiled::byte_at(pattern, self.anchor.measure(address))),
            ),
        }
    }
}

impl<A: Address> FusedIterator for Values<'_, A> {}

/// `(address, value)` pairs of a range. See [`Memory::items`].
#[derive(Debug, Clone)]
pub struct Items<'a, A> {
    keys: Keys<A>,
    values: Values<'a, A>,
}

impl<A: Address> Iterator for Items<'_, A> {
    type Item = (A, Option<u8>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        Some((self.keys.next()?, self.values.next()?))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<A: Address> DoubleEndedIterator for Items<'_, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        Some((self.keys.next_back()?, self.values.next_back()?))
    }
}

impl<A: Address> FusedIterator for Items<'_, A> {}
