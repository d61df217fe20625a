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

//! BlockList: the sorted run storage behind a sparse memory.
//!
//! Invariants (held between public calls, except right after
//! [`BlockList::split_block`]):
//!    - blocks are sorted by `start()`
//!    - blocks neither overlap nor touch
//!    - no block is empty
//!
//! Complexity:
//!    - point and range lookups: `O(log n)`
//!    - insert, remove, flood: `O(log n + k)` plus the vector shift

use crate::block::Block;
use crate::err::{MemoryError, MemoryResult};
use bytesparse_core::{Address, Span, tile_into};
use core::ops::{Deref, Range};
use tracing::trace;

/// Ordered storage of non-empty, non-overlapping, non-adjacent blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockList<A> {
    blocks: Vec<Block<A>>,
}

impl<A> BlockList<A> {
    #[inline]
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Block<A>] {
        &self.blocks
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Block<A>> {
        self.blocks.get_mut(index)
    }

    #[inline]
    pub(crate) fn into_blocks(self) -> Vec<Block<A>> {
        self.blocks
    }
}

impl<A: Address> BlockList<A> {
    /// Wraps blocks that already satisfy the list invariants.
    #[inline]
    pub(crate) fn from_sorted(blocks: Vec<Block<A>>) -> Self {
        debug_assert!(Self::are_invariants_held(&blocks));
        Self { blocks }
    }

    /// Span from the first block start to the last block end.
    #[inline]
    pub fn content_span(&self) -> Option<Span<A>> {
        let first = self.blocks.first()?;
        let last = self.blocks.last()?;
        Some(Span::new(first.start(), last.endex()))
    }

    /// Total number of stored bytes.
    #[inline]
    pub fn content_size(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }

    /// Index of the first block `i` with `blocks[i].start() >= address`.
    #[inline]
    pub(crate) fn find_first_starting_at_or_after(&self, address: A) -> usize {
        self.blocks.partition_point(|b| b.start() < address)
    }

    /// Index of the first block `i` with `blocks[i].start() > address`.
    #[inline]
    pub(crate) fn find_first_starting_after(&self, address: A) -> usize {
        self.blocks.partition_point(|b| b.start() <= address)
    }

    /// Index of the first block `i` with `blocks[i].endex() > address`.
    #[inline]
    pub(crate) fn find_first_ending_after(&self, address: A) -> usize {
        self.blocks.partition_point(|b| b.endex() <= address)
    }

    /// Index of the first block `i` with `blocks[i].endex() >= address`.
    #[inline]
    pub(crate) fn find_first_ending_at_or_after(&self, address: A) -> usize {
        self.blocks.partition_point(|b| b.endex() < address)
    }

    /// Index of the block containing `address`.
    #[inline]
    pub fn find_block_at(&self, address: A) -> Option<usize> {
        let index = self.find_first_ending_after(address);
        let block = self.blocks.get(index)?;
        (block.start() <= address).then_some(index)
    }

    /// Indices of the blocks sharing at least one address with `[start, endex)`.
    ///
    /// An empty range yields the empty index range at its insertion point.
    #[inline]
    pub fn find_blocks_overlapping(&self, start: A, endex: A) -> Range<usize> {
        if start >= endex {
            let index = self.find_first_starting_at_or_after(start);
            return index..index;
        }
        let range = self.find_first_ending_after(start)..self.find_first_starting_at_or_after(endex);
        debug_assert!(
            self.blocks[range.clone()]
                .iter()
                .all(|b| b.span().intersects(&Span::new(start, endex)))
        );
        range
    }

    /// Indices of the blocks that overlap or are adjacent to `[start, endex)`,
    /// i.e. the blocks a write of that range would merge with.
    #[inline]
    pub fn find_blocks_touching(&self, start: A, endex: A) -> Range<usize> {
        let endex = endex.max(start);
        let range = self.find_first_ending_at_or_after(start)..self.find_first_starting_after(endex);
        debug_assert!(
            self.blocks[range.clone()]
                .iter()
                .all(|b| b.span().touches(&Span::new(start, endex)))
        );
        range
    }

    /// The first pinned block among `blocks[range]`.
    #[inline]
    pub fn pinned_in(&self, range: Range<usize>) -> Option<&Block<A>> {
        self.blocks.get(range)?.iter().find(|b| b.is_pinned())
    }

    /// Fails with [`MemoryError::ResourceBusy`] if any block in `range` is pinned.
    #[inline]
    pub(crate) fn ensure_unpinned(&self, range: Range<usize>) -> MemoryResult<(), A> {
        match self.pinned_in(range) {
            Some(block) => Err(MemoryError::ResourceBusy {
                start: block.start(),
                endex: block.endex(),
                pins: block.pins(),
            }),
            None => Ok(()),
        }
    }

    /// Overwrites `[start, start + data.len())` with `data`.
    ///
    /// Straddling edge blocks are trimmed, covered blocks dropped and adjacent
    /// neighbours merged in a single pass. The left neighbour's buffer is reused
    /// when the write begins inside or right after it.
    pub fn insert_block(&mut self, start: A, data: &[u8]) -> MemoryResult<(), A> {
        if data.is_empty() {
            return Ok(());
        }
        if !start.is_occupiable() {
            return Err(MemoryError::AddressNotOccupiable { address: start });
        }
        let endex = Span::with_len(start, data.len())
            .ok_or(MemoryError::RangeOverflow {
                start,
                len: data.len() as u128,
            })?
            .endex();

        let touching = self.find_blocks_touching(start, endex);
        self.ensure_unpinned(touching.clone())?;

        if touching.is_empty() {
            self.blocks
                .insert(touching.start, Block::new(start, data.to_vec()));
            trace!(%start, %endex, index = touching.start, "insert new block");
            debug_assert!(Self::are_invariants_held(&self.blocks));
            return Ok(());
        }

        let first = touching.start;
        let last = touching.end - 1;

        // Fast path: the write lands inside a single block.
        {
            let block = &mut self.blocks[first];
            if first == last && block.start() <= start && endex <= block.endex() {
                let offset = block.offset_of(start);
                block.data_mut()[offset..offset + data.len()].copy_from_slice(data);
                trace!(%start, %endex, index = first, "overwrite in place");
                return Ok(());
            }
        }

        let tail = {
            let block = &self.blocks[last];
            if block.endex() > endex {
                block.data()[block.offset_of(endex)..].to_vec()
            } else {
                Vec::new()
            }
        };

        let head = &mut self.blocks[first];
        let (merged_start, mut buffer) = if head.start() < start {
            let keep = head.offset_of(start);
            let mut buffer = std::mem::take(head.data_mut());
            buffer.truncate(keep);
            (head.start(), buffer)
        } else {
            (start, Vec::with_capacity(data.len() + tail.len()))
        };
        buffer.extend_from_slice(data);
        buffer.extend_from_slice(&tail);

        self.blocks[first] = Block::new(merged_start, buffer);
        self.blocks.drain(first + 1..touching.end);
        trace!(%start, %endex, merged = touching.len(), "insert and merge");
        debug_assert!(Self::are_invariants_held(&self.blocks));
        Ok(())
    }

    /// Removes every stored byte inside `[start, endex)`.
    ///
    /// A block strictly containing the range is split in two; no empty block is
    /// ever left behind.
    pub fn remove_range(&mut self, start: A, endex: A) -> MemoryResult<(), A> {
        if start >= endex {
            return Ok(());
        }
        let overlapping = self.find_blocks_overlapping(start, endex);
        if overlapping.is_empty() {
            return Ok(());
        }
        self.ensure_unpinned(overlapping.clone())?;

        let first = overlapping.start;
        let last = overlapping.end - 1;

        {
            let block = &mut self.blocks[first];
            if first == last && block.start() < start && endex < block.endex() {
                let keep = block.offset_of(start);
                let cut = block.offset_of(endex);
                let tail = block.data_mut().split_off(cut);
                block.data_mut().truncate(keep);
                self.blocks.insert(first + 1, Block::new(endex, tail));
                trace!(%start, %endex, index = first, "punch hole");
                debug_assert!(Self::are_invariants_held(&self.blocks));
                return Ok(());
            }
        }

        let mut drain_from = first;
        let mut drain_to = overlapping.end;

        let head = &mut self.blocks[first];
        if head.start() < start {
            let keep = head.offset_of(start);
            head.data_mut().truncate(keep);
            drain_from += 1;
        }
        if drain_to > drain_from {
            let tail = &mut self.blocks[last];
            if tail.endex() > endex {
                let cut = tail.offset_of(endex);
                tail.data_mut().drain(..cut);
                tail.set_start(endex);
                drain_to -= 1;
            }
        }
        self.blocks.drain(drain_from..drain_to);
        trace!(%start, %endex, dropped = drain_to - drain_from, "remove range");
        debug_assert!(Self::are_invariants_held(&self.blocks));
        Ok(())
    }

    /// Splits the block strictly containing `address` so that a block starts
    /// there, returning the index of the right half.
    ///
    /// Returns `None` when `address` lies in a gap or on a block start. The two
    /// halves are left adjacent; [`BlockList::merge_adjacent`] joins them back.
    pub fn split_block(&mut self, address: A) -> MemoryResult<Option<usize>, A> {
        let Some(index) = self.find_block_at(address) else {
            return Ok(None);
        };
        if self.blocks[index].start() == address {
            return Ok(None);
        }
        self.ensure_unpinned(index..index + 1)?;
        let block = &mut self.blocks[index];
        let offset = block.offset_of(address);
        let right = block.data_mut().split_off(offset);
        self.blocks.insert(index + 1, Block::new(address, right));
        trace!(%address, index, "split block");
        Ok(Some(index + 1))
    }

    /// Index of the first block starting at or after `address`, after
    /// splitting a block straddling it.
    #[inline]
    pub(crate) fn split_point(&mut self, address: A) -> MemoryResult<usize, A> {
        match self.split_block(address)? {
            Some(index) => Ok(index),
            None => Ok(self.find_first_starting_at_or_after(address)),
        }
    }

    /// Merges every pair of adjacent blocks, returning the number of merges.
    pub fn merge_adjacent(&mut self) -> MemoryResult<usize, A> {
        for pair in self.blocks.windows(2) {
            if pair[0].endex() == pair[1].start() {
                for block in pair {
                    if block.is_pinned() {
                        return Err(MemoryError::ResourceBusy {
                            start: block.start(),
                            endex: block.endex(),
                            pins: block.pins(),
                        });
                    }
                }
            }
        }

        let mut merges = 0;
        let mut merged: Vec<Block<A>> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            if let Some(previous) = merged.last_mut()
                && previous.endex() == block.start()
            {
                let (_, mut data) = block.into_parts();
                previous.data_mut().append(&mut data);
                merges += 1;
            } else {
                merged.push(block);
            }
        }
        self.blocks = merged;
        if merges > 0 {
            trace!(merges, "merge adjacent blocks");
        }
        debug_assert!(Self::are_invariants_held(&self.blocks));
        Ok(merges)
    }

    /// Merges `blocks[index - 1]` and `blocks[index]` if they touch.
    pub(crate) fn merge_seam(&mut self, index: usize) -> MemoryResult<bool, A> {
        if index == 0 || index >= self.blocks.len() {
            return Ok(false);
        }
        if self.blocks[index - 1].endex() != self.blocks[index].start() {
            return Ok(false);
        }
        self.ensure_unpinned(index - 1..index + 1)?;
        let (_, mut data) = self.blocks.remove(index).into_parts();
        self.blocks[index - 1].data_mut().append(&mut data);
        trace!(index, "merge seam");
        Ok(true)
    }

    /// Re-addresses `blocks[index..]` by `offset`.
    ///
    /// Ordering among the moved blocks is preserved; the caller restores
    /// non-adjacency with the blocks before `index`.
    pub(crate) fn shift_from(&mut self, index: usize, offset: i128) -> MemoryResult<(), A> {
        if offset == 0 || index >= self.blocks.len() {
            return Ok(());
        }
        let moved = index..self.blocks.len();
        self.ensure_unpinned(moved.clone())?;
        let lowest = self.blocks[index].start().checked_offset(offset);
        let highest = self.blocks[moved.end - 1].endex().checked_offset(offset);
        let fits = lowest.is_some_and(|s| s.is_occupiable()) && highest.is_some();
        if !fits {
            return Err(MemoryError::ShiftOverflow { offset });
        }
        for block in &mut self.blocks[moved.clone()] {
            let start = block
                .start()
                .checked_offset(offset)
                .ok_or(MemoryError::ShiftOverflow { offset })?;
            block.set_start(start);
        }
        trace!(index, offset, moved = moved.len(), "shift blocks");
        Ok(())
    }

    /// Fills the gaps inside `[start, endex)` with `pattern`, tiled so that the
    /// byte at `anchor` is the first pattern byte, merging everything touched
    /// into one block.
    pub fn flood_range(
        &mut self,
        start: A,
        endex: A,
        pattern: &[u8],
        anchor: A,
    ) -> MemoryResult<(), A> {
        if pattern.is_empty() {
            return Err(MemoryError::EmptyPattern);
        }
        if start >= endex {
            return Ok(());
        }
        let touching = self.find_blocks_touching(start, endex);
        self.ensure_unpinned(touching.clone())?;

        let fill = |buffer: &mut Vec<u8>, from: A, to: A| {
            tile_into(buffer, pattern, anchor.measure(from), from.distance(to));
        };

        if touching.is_empty() {
            let mut buffer = Vec::with_capacity(start.distance(endex));
            fill(&mut buffer, start, endex);
            self.blocks.insert(touching.start, Block::new(start, buffer));
            trace!(%start, %endex, "flood empty range");
            return Ok(());
        }

        let first = touching.start;
        let head = &mut self.blocks[first];
        let head_start = head.start();
        let mut cursor = head.endex();
        let head_data = std::mem::take(head.data_mut());
        let (merged_start, mut buffer) = if head_start <= start {
            (head_start, head_data)
        } else {
            let mut buffer = Vec::with_capacity(start.distance(endex.max(cursor)));
            fill(&mut buffer, start, head_start);
            buffer.extend_from_slice(&head_data);
            (start, buffer)
        };

        for block in &self.blocks[first + 1..touching.end] {
            fill(&mut buffer, cursor, block.start());
            buffer.extend_from_slice(block.data());
            cursor = block.endex();
        }
        if cursor < endex {
            fill(&mut buffer, cursor, endex);
        }

        self.blocks[first] = Block::new(merged_start, buffer);
        self.blocks.drain(first + 1..touching.end);
        trace!(%start, %endex, merged = touching.len(), "flood range");
        debug_assert!(Self::are_invariants_held(&self.blocks));
        Ok(())
    }

    /// Moves the stored bytes inside `[start, endex)` out of the list.
    ///
    /// Fully covered blocks are moved without copying; edge blocks are split.
    pub(crate) fn take_range(&mut self, start: A, endex: A) -> MemoryResult<Vec<Block<A>>, A> {
        if start >= endex {
            return Ok(Vec::new());
        }
        self.ensure_unpinned(self.find_blocks_overlapping(start, endex))?;
        let from = self.split_point(start)?;
        let to = self.split_point(endex)?;
        let taken: Vec<Block<A>> = self.blocks.drain(from..to).collect();
        trace!(%start, %endex, taken = taken.len(), "take range");
        debug_assert!(Self::are_invariants_held(&self.blocks));
        Ok(taken)
    }

    /// Checks every list invariant, reporting the first offending block.
    pub fn validate(&self) -> MemoryResult<(), A> {
        for (index, block) in self.blocks.iter().enumerate() {
            let invalid = |reason| MemoryError::InvalidBlock {
                index,
                start: block.start(),
                reason,
            };
            if block.is_empty() {
                return Err(invalid("empty block"));
            }
            if !block.start().is_occupiable() || Span::with_len(block.start(), block.len()).is_none() {
                return Err(invalid("block exceeds the address space"));
            }
            if index > 0 {
                let previous = &self.blocks[index - 1];
                if previous.endex() > block.start() {
                    return Err(invalid("block overlaps or precedes its predecessor"));
                }
                if previous.span().touches(&block.span()) {
                    return Err(invalid("block is adjacent to its predecessor"));
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn are_invariants_held(blocks: &[Block<A>]) -> bool {
        blocks.iter().all(|b| !b.is_empty())
            && blocks.windows(2).all(|w| w[0].endex() < w[1].start())
    }
}

impl<A> Deref for BlockList<A> {
    type Target = [Block<A>];
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.blocks
    }
}

impl<'a, A> IntoIterator for &'a BlockList<A> {
    type Item = &'a Block<A>;
    type IntoIter = core::slice::Iter<'a, Block<A>>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
