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

//! The sparse memory container and its mutation API.
//!
//! Every mutation validates first and applies second: a call that returns an
//! error leaves the memory untouched. Target ranges are clipped to the bounds
//! before anything happens; a range entirely outside them is a no-op.

use crate::block::Block;
use crate::blocklist::BlockList;
use crate::config::MemoryConfig;
use crate::err::{MemoryError, MemoryResult};
use crate::view::ViewRegistry;
use bytesparse_core::{Address, Span, tile_into};
use std::ops::{Bound, Range, RangeBounds};
use tracing::{error, instrument, warn};

/// A byte container over a sparse address space.
///
/// Content is stored as ordered, non-overlapping, non-adjacent [`Block`]s.
/// Optional bounds restrict the addressable window; content never lies
/// outside it.
///
/// # Examples
///
/// ```
/// use bytesparse::Memory;
///
/// let mut memory = Memory::<u64>::from_bytes(b"Hello, World!", 0).unwrap();
/// memory.clear(5..7).unwrap();
/// assert_eq!(memory.content_parts(), 2);
/// assert_eq!(memory.peek(5), None);
/// assert_eq!(memory.peek(7), Some(b'W'));
/// ```
#[derive(Debug)]
pub struct Memory<A: Address = u64> {
    pub(crate) blocks: BlockList<A>,
    pub(crate) bound_start: Option<A>,
    pub(crate) bound_endex: Option<A>,
    pub(crate) views: ViewRegistry<A>,
    pub(crate) config: MemoryConfig,
}

/// Where a reservation opens its gap and what it pushes out of the bounds.
#[derive(Debug, Clone, Copy)]
struct ReservePlan<A> {
    at: A,
    size: usize,
    discard: Option<Span<A>>,
}

impl<A: Address> Default for Memory<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Address> Memory<A> {
    /// An empty, unbounded memory.
    #[inline]
    pub fn new() -> Self {
        Self {
            blocks: BlockList::new(),
            bound_start: None,
            bound_endex: None,
            views: ViewRegistry::default(),
            config: MemoryConfig::default(),
        }
    }

    pub fn with_config(config: MemoryConfig) -> MemoryResult<Self, A> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// An empty memory restricted to `[start, endex)`. Either side may be open.
    pub fn with_bounds(start: Option<A>, endex: Option<A>) -> Self {
        let mut memory = Self::new();
        memory.store_bounds(start, endex);
        memory
    }

    /// A memory holding `data` at `offset`.
    pub fn from_bytes(data: impl AsRef<[u8]>, offset: A) -> MemoryResult<Self, A> {
        let data = data.as_ref();
        let mut memory = Self::new();
        if data.is_empty() {
            return Ok(memory);
        }
        memory.check_address(offset)?;
        memory.check_payload(data.len() as u128)?;
        Span::with_len(offset, data.len()).ok_or(MemoryError::RangeOverflow {
            start: offset,
            len: data.len() as u128,
        })?;
        memory.blocks = BlockList::from_sorted(vec![Block::new(offset, data.to_vec())]);
        Ok(memory)
    }

    /// A memory built from `(start, data)` blocks, then clipped to the bounds.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidBlock`] when blocks are empty, unordered,
    /// overlapping or adjacent.
    pub fn from_blocks<I, D>(blocks: I, start: Option<A>, endex: Option<A>) -> MemoryResult<Self, A>
    where
        I: IntoIterator<Item = (A, D)>,
        D: Into<Vec<u8>>,
    {
        let mut memory = Self::new();
        let mut list: Vec<Block<A>> = Vec::new();
        for (index, (address, data)) in blocks.into_iter().enumerate() {
            let data: Vec<u8> = data.into();
            let invalid = |reason| MemoryError::InvalidBlock {
                index,
                start: address,
                reason,
            };
            if data.is_empty() {
                return Err(invalid("empty block"));
            }
            memory.check_address(address)?;
            memory.check_payload(data.len() as u128)?;
            let span = Span::with_len(address, data.len()).ok_or(MemoryError::RangeOverflow {
                start: address,
                len: data.len() as u128,
            })?;
            if let Some(previous) = list.last() {
                if previous.endex() > address {
                    return Err(invalid("block overlaps or precedes its predecessor"));
                }
                if previous.span().touches(&span) {
                    return Err(invalid("block is adjacent to its predecessor"));
                }
            }
            list.push(Block::new(address, data));
        }
        memory.blocks = BlockList::from_sorted(list);
        memory.set_bound_span(start, endex)?;
        Ok(memory)
    }

    /// A memory holding `values` from `start` on; `None` leaves a gap.
    pub fn from_values<I>(start: A, values: I) -> MemoryResult<Self, A>
    where
        I: IntoIterator<Item = Option<u8>>,
    {
        let mut memory = Self::new();
        let limit = memory.block_len_limit();
        let mut list: Vec<Block<A>> = Vec::new();
        let mut run: Vec<u8> = Vec::new();
        let mut run_start = start;
        let mut address = start;

        for (index, value) in values.into_iter().enumerate() {
            if index > 0 {
                address = address
                    .checked_advance(1)
                    .ok_or(MemoryError::RangeOverflow {
                        start,
                        len: index as u128 + 1,
                    })?;
            }
            match value {
                Some(byte) => {
                    if run.is_empty() {
                        memory.check_address(address)?;
                        run_start = address;
                    } else if !address.is_occupiable() {
                        return Err(MemoryError::AddressNotOccupiable { address });
                    }
                    if run.len() == limit {
                        return Err(MemoryError::PayloadTooLarge {
                            len: limit as u128 + 1,
                            max: limit,
                        });
                    }
                    run.push(byte);
                }
                None if !run.is_empty() => {
                    list.push(Block::new(run_start, std::mem::take(&mut run)));
                }
                None => {}
            }
        }
        if !run.is_empty() {
            list.push(Block::new(run_start, run));
        }
        memory.blocks = BlockList::from_sorted(list);
        Ok(memory)
    }

    #[inline]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The underlying block list.
    #[inline]
    pub fn blocks(&self) -> &BlockList<A> {
        &self.blocks
    }

    /// Checks every container invariant.
    pub fn validate(&self) -> MemoryResult<(), A> {
        self.blocks.validate()?;
        if let (Some(start), Some(endex)) = (self.bound_start, self.bound_endex)
            && endex < start
        {
            return Err(MemoryError::InvalidRange { start, endex });
        }
        let window = self.window();
        if let Some(span) = self.blocks.content_span()
            && !window.contains_span(&span)
        {
            let (index, start) = if span.start() < window.start() {
                (0, span.start())
            } else {
                let index = self.blocks.len() - 1;
                (index, self.blocks[index].start())
            };
            return Err(MemoryError::InvalidBlock {
                index,
                start,
                reason: "block lies outside the bounds",
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Shared helpers
    // ---------------------------------------------------------------------

    #[inline]
    pub(crate) fn block_len_limit(&self) -> usize {
        self.config.block_len_limit::<A>()
    }

    #[inline]
    pub(crate) fn check_address(&self, address: A) -> MemoryResult<(), A> {
        if address.is_occupiable() {
            Ok(())
        } else {
            Err(MemoryError::AddressNotOccupiable { address })
        }
    }

    #[inline]
    pub(crate) fn check_payload(&self, len: u128) -> MemoryResult<(), A> {
        let max = self.block_len_limit();
        if len > max as u128 {
            Err(MemoryError::PayloadTooLarge { len, max })
        } else {
            Ok(())
        }
    }

    /// The addressable window.
    #[inline]
    pub(crate) fn window(&self) -> Span<A> {
        Span::new(
            self.bound_start.unwrap_or_else(A::lowest),
            self.bound_endex.unwrap_or_else(A::highest_endex),
        )
    }

    /// `[start, endex)` clipped to the window, or `None` if nothing remains.
    #[inline]
    pub(crate) fn clip(&self, start: A, endex: A) -> Option<Span<A>> {
        if start >= endex {
            return None;
        }
        Span::new(start, endex).intersection(&self.window())
    }

    /// Resolves a range argument. Open ends default to `start()` and `endex()`.
    pub(crate) fn resolve<R: RangeBounds<A>>(&self, range: &R) -> MemoryResult<(A, A), A> {
        let start = match range.start_bound() {
            Bound::Included(&start) => Some(start),
            Bound::Excluded(&start) => Some(start.checked_advance(1).ok_or(
                MemoryError::RangeOverflow { start, len: 1 },
            )?),
            Bound::Unbounded => None,
        };
        let endex = match range.end_bound() {
            Bound::Included(&last) => Some(last.checked_advance(1).ok_or(
                MemoryError::RangeOverflow {
                    start: last,
                    len: 1,
                },
            )?),
            Bound::Excluded(&endex) => Some(endex),
            Bound::Unbounded => None,
        };
        match (start, endex) {
            (Some(start), Some(endex)) if endex < start => {
                Err(MemoryError::InvalidRange { start, endex })
            }
            (Some(start), Some(endex)) => Ok((start, endex)),
            (Some(start), None) => Ok((start, self.endex().max(start))),
            (None, Some(endex)) => Ok((self.start().min(endex), endex)),
            (None, None) => Ok((self.start(), self.endex())),
        }
    }

    /// Like [`Memory::resolve`], but saturating: malformed ranges collapse to
    /// empty ones. Used by read-only queries.
    pub(crate) fn resolve_lenient<R: RangeBounds<A>>(&self, range: &R) -> (A, A) {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.checked_advance(1).unwrap_or(start),
            Bound::Unbounded => self.start(),
        };
        let endex = match range.end_bound() {
            Bound::Included(&last) => last.checked_advance(1).unwrap_or(last),
            Bound::Excluded(&endex) => endex,
            Bound::Unbounded => self.endex(),
        };
        (start, endex.max(start))
    }

    /// Refuses the mutation if a block in `range` is pinned.
    #[inline]
    pub(crate) fn guard(&self, range: Range<usize>) -> MemoryResult<(), A> {
        self.blocks
            .ensure_unpinned(range)
            .inspect_err(|err| warn!(%err, "mutation refused"))
    }

    /// Post-mutation invariant check, enabled by the configuration.
    #[inline]
    pub(crate) fn finish(&self, op: &'static str) {
        if !self.config.check_invariants {
            return;
        }
        if let Err(err) = self.validate() {
            error!(op, %err, "invariant violated");
            debug_assert!(false, "invariant violated after {op}: {err}");
        }
    }

    #[inline]
    fn record(&self, backup: &mut Option<&mut Vec<Self>>, start: A, endex: A) {
        if let Some(backup) = backup.as_mut() {
            backup.push(self.snapshot(start, endex));
        }
    }

    // ---------------------------------------------------------------------
    // Write
    // ---------------------------------------------------------------------

    /// Overwrites `[address, address + data.len())` with `data`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::new();
    /// memory.write(4, b"abc").unwrap();
    /// memory.write(7, b"de").unwrap();
    /// assert_eq!(memory.content_parts(), 1);
    /// assert_eq!(memory.to_bytes(..), b"abcde");
    /// ```
    #[inline]
    pub fn write(&mut self, address: A, data: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        self.write_impl(address, data.as_ref(), None)
    }

    /// [`Memory::write`], returning the overwritten content.
    pub fn write_backup(
        &mut self,
        address: A,
        data: impl AsRef<[u8]>,
    ) -> MemoryResult<Vec<Self>, A> {
        let mut backup = Vec::new();
        self.write_impl(address, data.as_ref(), Some(&mut backup))?;
        Ok(backup)
    }

    fn write_impl(
        &mut self,
        address: A,
        data: &[u8],
        mut backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        self.check_address(address)?;
        self.check_payload(data.len() as u128)?;
        let placed = Span::with_len(address, data.len()).ok_or(MemoryError::RangeOverflow {
            start: address,
            len: data.len() as u128,
        })?;
        let Some(span) = self.clip(placed.start(), placed.endex()) else {
            return Ok(());
        };
        self.guard(self.blocks.find_blocks_touching(span.start(), span.endex()))?;
        self.record(&mut backup, span.start(), span.endex());

        let from = address.distance(span.start());
        let to = address.distance(span.endex());
        self.blocks.insert_block(span.start(), &data[from..to])?;
        self.finish("write");
        Ok(())
    }

    /// Writes the content of `source` so that `source.start()` lands on
    /// `address`.
    ///
    /// Gaps of `source` leave this memory untouched, unless `clear` is set: then
    /// `[address, address + source.len())` is cleared first.
    #[instrument(level = "debug", skip(self, source), fields(parts = source.content_parts()), err(Display))]
    pub fn write_memory(&mut self, address: A, source: &Memory<A>, clear: bool) -> MemoryResult<(), A> {
        self.check_address(address)?;
        let overflow = MemoryError::RangeOverflow {
            start: address,
            len: source.len(),
        };
        let offset = address
            .to_wide()
            .checked_sub(source.start().to_wide())
            .ok_or_else(|| overflow.clone())?;
        self.write_displaced(source, offset, clear.then_some(address), overflow, "write_memory")
    }

    /// Writes every block of `source` moved by `offset`.
    ///
    /// With `clear_from` set, `[clear_from, source.endex() + offset)` is
    /// cleared first.
    fn write_displaced(
        &mut self,
        source: &Memory<A>,
        offset: i128,
        clear_from: Option<A>,
        error: MemoryError<A>,
        op: &'static str,
    ) -> MemoryResult<(), A> {
        let overflow = || error.clone();
        let mut placements: Vec<(Span<A>, &[u8])> = Vec::with_capacity(source.blocks.len());
        for block in source.blocks.iter() {
            let start = block.start().checked_offset(offset).ok_or_else(overflow)?;
            let endex = block.endex().checked_offset(offset).ok_or_else(overflow)?;
            if let Some(span) = self.clip(start, endex) {
                let data = &block.data()[start.distance(span.start())..start.distance(span.endex())];
                placements.push((span, data));
            }
        }
        let cleared = match clear_from {
            Some(address) => {
                let endex = source.endex().checked_offset(offset).ok_or_else(overflow)?;
                self.clip(address, endex)
            }
            None => None,
        };

        if let Some(span) = cleared {
            self.guard(self.blocks.find_blocks_touching(span.start(), span.endex()))?;
        }
        for (span, _) in &placements {
            self.guard(self.blocks.find_blocks_touching(span.start(), span.endex()))?;
        }

        if let Some(span) = cleared {
            self.blocks.remove_range(span.start(), span.endex())?;
        }
        for (span, data) in placements {
            self.blocks.insert_block(span.start(), data)?;
        }
        self.finish(op);
        Ok(())
    }

    /// Writes a single byte, or clears the address with `None`.
    pub fn poke(&mut self, address: A, value: Option<u8>) -> MemoryResult<(), A> {
        match value {
            Some(byte) => self.write_impl(address, &[byte], None),
            None => {
                self.check_address(address)?;
                self.clear_impl(address, address.advance(1), None)
            }
        }
    }

    /// Writes one byte right after the content.
    #[inline]
    pub fn append(&mut self, value: u8) -> MemoryResult<(), A> {
        self.write_impl(self.content_endex(), &[value], None)
    }

    /// Writes `data` right after the content.
    #[inline]
    pub fn extend(&mut self, data: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        self.write_impl(self.content_endex(), data.as_ref(), None)
    }

    /// Writes `source` after the content: its address `x` lands on
    /// `content_endex() + offset + x`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NegativeOffset`] when `offset` is negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::from_bytes(b"Hello", 0).unwrap();
    /// let tail = Memory::<u64>::from_bytes(b"World", 0).unwrap();
    /// memory.extend_memory(&tail, 2).unwrap();
    /// assert_eq!(memory.to_blocks(), vec![(0, b"Hello".to_vec()), (7, b"World".to_vec())]);
    /// ```
    #[instrument(level = "debug", skip(self, source), fields(parts = source.content_parts()), err(Display))]
    pub fn extend_memory(&mut self, source: &Memory<A>, offset: i128) -> MemoryResult<(), A> {
        if offset < 0 {
            return Err(MemoryError::NegativeOffset { offset });
        }
        let base = self.content_endex();
        let overflow = MemoryError::RangeOverflow {
            start: base,
            len: source.len(),
        };
        let displacement = base
            .to_wide()
            .checked_add(offset)
            .ok_or_else(|| overflow.clone())?;
        self.write_displaced(source, displacement, None, overflow, "extend_memory")
    }

    // ---------------------------------------------------------------------
    // Clear, delete, crop
    // ---------------------------------------------------------------------

    /// Removes content in the range without moving anything else.
    #[inline]
    pub fn clear<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        self.clear_impl(start, endex, None)
    }

    pub fn clear_backup<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<Vec<Self>, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut backup = Vec::new();
        self.clear_impl(start, endex, Some(&mut backup))?;
        Ok(backup)
    }

    fn clear_impl(
        &mut self,
        start: A,
        endex: A,
        mut backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        let Some(span) = self.clip(start, endex) else {
            return Ok(());
        };
        self.guard(self.blocks.find_blocks_overlapping(span.start(), span.endex()))?;
        self.record(&mut backup, span.start(), span.endex());
        self.blocks.remove_range(span.start(), span.endex())?;
        self.finish("clear");
        Ok(())
    }

    /// Removes the range and moves the following content left to close it.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::from_bytes(b"Hello, World!", 0).unwrap();
    /// memory.delete(5..7).unwrap();
    /// assert_eq!(memory.to_bytes(..), b"HelloWorld!");
    /// ```
    #[instrument(level = "debug", skip(self, range), err(Display))]
    pub fn delete<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        self.delete_impl(start, endex, None)
    }

    pub fn delete_backup<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<Vec<Self>, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut backup = Vec::new();
        self.delete_impl(start, endex, Some(&mut backup))?;
        Ok(backup)
    }

    fn delete_impl(
        &mut self,
        start: A,
        endex: A,
        mut backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        let Some(span) = self.clip(start, endex) else {
            return Ok(());
        };
        let (start, endex) = (span.start(), span.endex());
        let offset = i128::try_from(span.measure())
            .map(|measure| -measure)
            .map_err(|_| MemoryError::ShiftOverflow { offset: i128::MIN })?;

        let mut guarded = self.blocks.find_blocks_overlapping(start, A::highest_endex());
        if self.blocks.find_block_at(endex).is_some() {
            guarded.start = guarded
                .start
                .min(self.blocks.find_first_ending_at_or_after(start));
        }
        self.guard(guarded)?;
        self.record(&mut backup, start, endex);

        self.blocks.remove_range(start, endex)?;
        let index = self.blocks.find_first_starting_at_or_after(endex);
        self.blocks.shift_from(index, offset)?;
        self.blocks.merge_seam(index)?;
        self.finish("delete");
        Ok(())
    }

    /// Keeps only the content inside the range. Bounds are left as they are.
    pub fn crop<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        self.crop_impl(start, endex, None)
    }

    pub fn crop_backup<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<Vec<Self>, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut backup = Vec::new();
        self.crop_impl(start, endex, Some(&mut backup))?;
        Ok(backup)
    }

    fn crop_impl(
        &mut self,
        start: A,
        endex: A,
        mut backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        let (lowest, highest) = (A::lowest(), A::highest_endex());
        self.guard(self.blocks.find_blocks_overlapping(lowest, start))?;
        self.guard(self.blocks.find_blocks_overlapping(endex, highest))?;
        if let Some(content) = self.blocks.content_span() {
            if content.start() < start {
                self.record(&mut backup, content.start(), start.min(content.endex()));
            }
            if endex < content.endex() {
                self.record(&mut backup, endex.max(content.start()), content.endex());
            }
        }
        self.blocks.remove_range(lowest, start)?;
        self.blocks.remove_range(endex, highest)?;
        self.finish("crop");
        Ok(())
    }

    /// Removes and returns the byte at `address`, or the last stored byte when
    /// `address` is `None`, moving the following content left by one.
    pub fn pop(&mut self, address: Option<A>) -> MemoryResult<Option<u8>, A> {
        let address = match address {
            Some(address) => address,
            None => match self.blocks.last() {
                Some(block) => block.endex().retreat(1),
                None => return Ok(None),
            },
        };
        self.check_address(address)?;
        let value = self.peek(address);
        self.delete_impl(address, address.advance(1), None)?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Reserve, insert, replace
    // ---------------------------------------------------------------------

    /// Opens an empty gap of `size` addresses at `address`, moving the content
    /// at and after it right.
    ///
    /// Content pushed past the upper bound is discarded. Without an upper bound
    /// the call fails instead of losing data.
    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn reserve(&mut self, address: A, size: usize) -> MemoryResult<(), A> {
        if let Some(plan) = self.plan_reserve(address, size)? {
            self.apply_reserve(&plan)?;
            self.finish("reserve");
        }
        Ok(())
    }

    pub fn reserve_backup(&mut self, address: A, size: usize) -> MemoryResult<Vec<Self>, A> {
        let mut backup = Vec::new();
        if let Some(plan) = self.plan_reserve(address, size)? {
            if let Some(discard) = plan.discard {
                backup.push(self.snapshot(discard.start(), discard.endex()));
            }
            self.apply_reserve(&plan)?;
            self.finish("reserve");
        }
        Ok(backup)
    }

    fn plan_reserve(&self, address: A, size: usize) -> MemoryResult<Option<ReservePlan<A>>, A> {
        if size == 0 {
            return Ok(None);
        }
        self.check_address(address)?;
        let endex = address
            .checked_advance(size)
            .ok_or(MemoryError::RangeOverflow {
                start: address,
                len: size as u128,
            })?;
        let Some(span) = self.clip(address, endex) else {
            return Ok(None);
        };
        let (at, size) = (span.start(), span.len());
        self.guard(self.blocks.find_blocks_overlapping(at, A::highest_endex()))?;

        let discard = match self.bound_endex {
            Some(upper) => {
                let cutoff = upper.checked_retreat(size).map_or(at, |cutoff| cutoff.max(at));
                (cutoff < upper).then(|| Span::new(cutoff, upper))
            }
            None => {
                if let Some(last) = self.blocks.last()
                    && last.endex() > at
                    && last.endex().checked_advance(size).is_none()
                {
                    return Err(MemoryError::RangeOverflow {
                        start: last.start(),
                        len: last.len() as u128 + size as u128,
                    });
                }
                None
            }
        };
        Ok(Some(ReservePlan { at, size, discard }))
    }

    fn apply_reserve(&mut self, plan: &ReservePlan<A>) -> MemoryResult<(), A> {
        if let Some(discard) = plan.discard {
            self.blocks.remove_range(discard.start(), discard.endex())?;
        }
        let index = self.blocks.split_point(plan.at)?;
        self.blocks.shift_from(index, plan.size as i128)
    }

    /// Inserts `data` at `address`, moving the content at and after it right.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::from_bytes(b"Hello!", 0).unwrap();
    /// memory.insert(5, b", World").unwrap();
    /// assert_eq!(memory.to_bytes(..), b"Hello, World!");
    /// ```
    #[instrument(level = "debug", skip(self, data), err(Display))]
    pub fn insert(&mut self, address: A, data: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        let data = data.as_ref();
        if let Some(plan) = self.plan_insert(address, data.len())? {
            self.apply_insert(&plan, address, data)?;
            self.finish("insert");
        }
        Ok(())
    }

    fn plan_insert(&self, address: A, len: usize) -> MemoryResult<Option<ReservePlan<A>>, A> {
        self.check_address(address)?;
        self.check_payload(len as u128)?;
        let plan = self.plan_reserve(address, len)?;
        if let Some(plan) = &plan {
            self.guard(self.blocks.find_blocks_touching(plan.at, A::highest_endex()))?;
        }
        Ok(plan)
    }

    fn apply_insert(&mut self, plan: &ReservePlan<A>, address: A, data: &[u8]) -> MemoryResult<(), A> {
        self.apply_reserve(plan)?;
        let from = address.distance(plan.at);
        self.blocks.insert_block(plan.at, &data[from..from + plan.size])
    }

    /// Slice assignment: afterwards the range holds exactly `data`, and the
    /// content after it moved by `data.len() - (endex - start)`.
    pub fn replace<R: RangeBounds<A>>(&mut self, range: R, data: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        let data = data.as_ref();
        self.check_payload(data.len() as u128)?;
        let size = start.measure(endex);
        self.guard(self.blocks.find_blocks_touching(start, A::highest_endex()))?;

        if data.len() as u128 <= size {
            self.write_impl(start, data, None)?;
            self.delete_impl(start.advance(data.len()), endex, None)?;
        } else {
            let size = size as usize;
            let (head, tail) = data.split_at(size);
            let plan = self.plan_insert(endex, tail.len())?;
            self.write_impl(start, head, None)?;
            if let Some(plan) = plan {
                self.apply_insert(&plan, endex, tail)?;
            }
        }
        self.finish("replace");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Fill, flood
    // ---------------------------------------------------------------------

    /// Overwrites the whole range with `pattern`, tiled from the range start.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let mut memory = Memory::<u64>::from_bytes(b"ABCDEFGH", 0).unwrap();
    /// memory.fill(1..6, b"12").unwrap();
    /// assert_eq!(memory.to_bytes(..), b"A12121GH");
    /// ```
    pub fn fill<R: RangeBounds<A>>(&mut self, range: R, pattern: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        self.fill_impl(start, endex, pattern.as_ref(), None)
    }

    pub fn fill_backup<R: RangeBounds<A>>(
        &mut self,
        range: R,
        pattern: impl AsRef<[u8]>,
    ) -> MemoryResult<Vec<Self>, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut backup = Vec::new();
        self.fill_impl(start, endex, pattern.as_ref(), Some(&mut backup))?;
        Ok(backup)
    }

    fn fill_impl(
        &mut self,
        start: A,
        endex: A,
        pattern: &[u8],
        mut backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        if pattern.is_empty() {
            return Err(MemoryError::EmptyPattern);
        }
        let Some(span) = self.clip(start, endex) else {
            return Ok(());
        };
        self.check_payload(span.measure())?;
        self.guard(self.blocks.find_blocks_touching(span.start(), span.endex()))?;
        self.record(&mut backup, span.start(), span.endex());

        let mut data = Vec::with_capacity(span.len());
        tile_into(&mut data, pattern, start.measure(span.start()), span.len());
        self.blocks.insert_block(span.start(), &data)?;
        self.finish("fill");
        Ok(())
    }

    /// Fills only the gaps inside the range with `pattern`, tiled so that the
    /// range start gets the first pattern byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse::Memory;
    ///
    /// let blocks = [(1, &b"AB"[..]), (5, &b"C"[..])];
    /// let mut memory = Memory::<u64>::from_blocks(blocks, None, None).unwrap();
    /// memory.flood(0..8, b"xyz").unwrap();
    /// assert_eq!(memory.to_bytes(..), b"xABxyCxy");
    /// ```
    pub fn flood<R: RangeBounds<A>>(&mut self, range: R, pattern: impl AsRef<[u8]>) -> MemoryResult<(), A> {
        let (start, endex) = self.resolve(&range)?;
        self.flood_impl(start, endex, pattern.as_ref(), None)
    }

    /// [`Memory::flood`], returning one empty memory bounded to each filled gap.
    pub fn flood_backup<R: RangeBounds<A>>(
        &mut self,
        range: R,
        pattern: impl AsRef<[u8]>,
    ) -> MemoryResult<Vec<Self>, A> {
        let (start, endex) = self.resolve(&range)?;
        let mut backup = Vec::new();
        self.flood_impl(start, endex, pattern.as_ref(), Some(&mut backup))?;
        Ok(backup)
    }

    fn flood_impl(
        &mut self,
        start: A,
        endex: A,
        pattern: &[u8],
        backup: Option<&mut Vec<Self>>,
    ) -> MemoryResult<(), A> {
        if pattern.is_empty() {
            return Err(MemoryError::EmptyPattern);
        }
        let Some(span) = self.clip(start, endex) else {
            return Ok(());
        };
        self.check_payload(span.measure())?;
        self.guard(self.blocks.find_blocks_touching(span.start(), span.endex()))?;
        if let Some(backup) = backup {
            for (gap_start, gap_endex) in self.gaps(span.start()..span.endex()) {
                backup.push(Self::with_bounds(gap_start, gap_endex));
            }
        }
        self.blocks
            .flood_range(span.start(), span.endex(), pattern, start)?;
        self.finish("flood");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Shift
    // ---------------------------------------------------------------------

    /// Moves every block by `offset`.
    ///
    /// Content pushed outside the bounds is discarded; on an unbounded side the
    /// call fails instead of losing data.
    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn shift(&mut self, offset: i128) -> MemoryResult<(), A> {
        self.shift_impl(offset, None)
    }

    pub fn shift_backup(&mut self, offset: i128) -> MemoryResult<Vec<Self>, A> {
        let mut backup = Vec::new();
        self.shift_impl(offset, Some(&mut backup))?;
        Ok(backup)
    }

    fn shift_impl(&mut self, offset: i128, mut backup: Option<&mut Vec<Self>>) -> MemoryResult<(), A> {
        let (Some(first), Some(last)) = (self.blocks.first(), self.blocks.last()) else {
            return Ok(());
        };
        if offset == 0 {
            return Ok(());
        }
        self.guard(0..self.blocks.len())?;

        let overflow = MemoryError::ShiftOverflow { offset };
        let discard = if offset > 0 {
            match self.bound_endex {
                Some(upper) => {
                    let cutoff = upper
                        .to_wide()
                        .checked_sub(offset)
                        .and_then(A::from_wide)
                        .map_or(A::lowest(), |cutoff| cutoff.max(A::lowest()));
                    (cutoff < upper).then(|| Span::new(cutoff, upper))
                }
                None if last.endex().checked_offset(offset).is_none() => return Err(overflow),
                None => None,
            }
        } else {
            match self.bound_start {
                Some(lower) => {
                    let limit = lower
                        .to_wide()
                        .checked_sub(offset)
                        .and_then(A::from_wide)
                        .map_or(A::highest_endex(), |limit| limit.min(A::highest_endex()));
                    (lower < limit).then(|| Span::new(lower, limit))
                }
                None if first.start().checked_offset(offset).is_none() => return Err(overflow),
                None => None,
            }
        };

        if let Some(discard) = discard {
            self.record(&mut backup, discard.start(), discard.endex());
            self.blocks.remove_range(discard.start(), discard.endex())?;
        }
        self.blocks.shift_from(0, offset)?;
        self.finish("shift");
        Ok(())
    }
}

/// Overlays `blocks` in order, later blocks overwriting earlier ones, and
/// returns the normalized block list.
///
/// # Examples
///
/// ```
/// use bytesparse::collapse_blocks;
///
/// let blocks = collapse_blocks::<u64, _, _>([(0, b"0123456789".to_vec()), (3, b"ABC".to_vec()), (12, b"x".to_vec())]).unwrap();
/// assert_eq!(blocks, vec![(0, b"012ABC6789".to_vec()), (12, b"x".to_vec())]);
/// ```
pub fn collapse_blocks<A, I, D>(blocks: I) -> MemoryResult<Vec<(A, Vec<u8>)>, A>
where
    A: Address,
    I: IntoIterator<Item = (A, D)>,
    D: AsRef<[u8]>,
{
    let mut memory = Memory::<A>::new();
    for (address, data) in blocks {
        memory.write(address, data)?;
    }
    Ok(memory.to_blocks())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::ErrorKind;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    macro_rules! test_memory_impl {
        ($modname:ident, $A:ty) => {
            mod $modname {
                use super::*;

                type Mem = Memory<$A>;

                fn blocks(memory: &Mem) -> Vec<($A, Vec<u8>)> {
                    memory.to_blocks()
                }

                fn hello() -> Mem {
                    Mem::from_bytes(b"Hello, World!", 0).unwrap()
                }

                #[test]
                fn test_hello_world_walkthrough() {
                    let mut m = hello();
                    m.extend(b"!!").unwrap();
                    assert_eq!(m.to_bytes(..), b"Hello, World!!!");
                    m.replace(0..5, b"Ciao").unwrap();
                    assert_eq!(m.to_bytes(..), b"Ciao, World!!!");
                    m.clear(4..6).unwrap();
                    assert_eq!(m.content_parts(), 2);
                    assert_eq!(m.to_bytes(..), b"CiaoWorld!!!");
                    assert_eq!(m.content_size(), 12);
                }

                #[test]
                fn test_bounded_blocks_and_flood() {
                    let mut m = Mem::from_blocks(
                        [(4, b"ABC".to_vec()), (9, b"xy".to_vec())],
                        Some(2),
                        Some(15),
                    )
                    .unwrap();
                    assert_eq!(m.content_span(), (4, 11));
                    assert_eq!(m.span(), (2, 15));
                    assert_eq!(m.len(), 13);
                    assert_eq!(m.content_size(), 5);
                    m.flood(.., b".").unwrap();
                    assert_eq!(blocks(&m), vec![(2, b"..ABC..xy....".to_vec())]);
                    assert!(m.contiguous());
                }

                #[test]
                fn test_write_merges_and_overwrites() {
                    let mut m = Mem::new();
                    m.write(5, b"xyz").unwrap();
                    m.write(0, b"abc").unwrap();
                    m.write(3, b"de").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abcdexyz".to_vec())]);
                    m.write(6, b"123").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abcdex123".to_vec())]);
                    m.write(20, b"").unwrap();
                    assert_eq!(m.content_parts(), 1);
                }

                #[test]
                fn test_write_is_clipped_by_bounds() {
                    let mut m = Mem::with_bounds(Some(2), Some(6));
                    m.write(0, b"abcdefgh").unwrap();
                    assert_eq!(blocks(&m), vec![(2, b"cdef".to_vec())]);
                    m.write(10, b"zz").unwrap();
                    assert_eq!(m.content_parts(), 1);
                }

                #[test]
                fn test_write_backup_returns_overwritten() {
                    let mut m = hello();
                    let backup = m.write_backup(7, b"Earth").unwrap();
                    assert_eq!(backup.len(), 1);
                    assert_eq!(backup[0].to_blocks(), vec![(7, b"World".to_vec())]);
                    assert_eq!(backup[0].span(), (7, 12));
                    let mut restore = m.copy();
                    restore.write_memory(7, &backup[0], false).unwrap();
                    assert_eq!(restore, hello());
                }

                #[test]
                fn test_write_memory_with_clear() {
                    let mut src = Mem::from_blocks([(10, b"AB".to_vec()), (14, b"C".to_vec())], None, None).unwrap();
                    src.set_bound_span(Some(10), Some(16)).unwrap();
                    let mut m = Mem::from_bytes(b"0123456789", 0).unwrap();
                    m.write_memory(2, &src, false).unwrap();
                    assert_eq!(m.to_bytes(..), b"01AB45C789");
                    let mut m = Mem::from_bytes(b"0123456789", 0).unwrap();
                    m.write_memory(2, &src, true).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"01AB".to_vec()), (6, b"C".to_vec()), (8, b"89".to_vec())]);
                }

                #[test]
                fn test_insert_moves_following_content() {
                    let mut m = Mem::from_blocks([(0, b"abc".to_vec()), (5, b"de".to_vec())], None, None).unwrap();
                    m.insert(1, b"XY").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"aXYbc".to_vec()), (7, b"de".to_vec())]);
                    m.insert(6, b"!").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"aXYbc".to_vec()), (6, b"!".to_vec()), (8, b"de".to_vec())]);
                    m.insert(5, b"?").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"aXYbc?".to_vec()), (7, b"!".to_vec()), (9, b"de".to_vec())]);
                }

                #[test]
                fn test_insert_into_bounded_memory_drops_overflow() {
                    let mut m = Mem::from_bytes(b"abcdef", 0).unwrap();
                    m.set_bound_endex(Some(6)).unwrap();
                    m.insert(2, b"XY").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abXYcd".to_vec())]);
                    m.insert(5, b"123").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abXYc1".to_vec())]);
                }

                #[test]
                fn test_reserve_opens_gap() {
                    let mut m = hello();
                    m.reserve(5, 3).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"Hello".to_vec()), (8, b", World!".to_vec())]);
                    m.reserve(100, 3).unwrap();
                    assert_eq!(m.content_endex(), 16);
                    m.reserve(3, 0).unwrap();
                    assert_eq!(m.content_endex(), 16);
                }

                #[test]
                fn test_reserve_backup_returns_discarded() {
                    let mut m = Mem::from_bytes(b"abcdef", 0).unwrap();
                    m.set_bound_span(None, Some(6)).unwrap();
                    let backup = m.reserve_backup(1, 2).unwrap();
                    assert_eq!(backup.len(), 1);
                    assert_eq!(backup[0].to_blocks(), vec![(4, b"ef".to_vec())]);
                    assert_eq!(blocks(&m), vec![(0, b"a".to_vec()), (3, b"bcd".to_vec())]);
                }

                #[test]
                fn test_delete_closes_gap_and_merges() {
                    let mut m = Mem::from_blocks([(0, b"abc".to_vec()), (6, b"def".to_vec())], None, None).unwrap();
                    m.delete(3..6).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abcdef".to_vec())]);
                    m.delete(1..3).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"adef".to_vec())]);
                    m.delete(10..20).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"adef".to_vec())]);
                }

                #[test]
                fn test_delete_backup_and_bounds() {
                    let mut m = Mem::from_bytes(b"0123456789", 0).unwrap();
                    m.set_bound_start(Some(2)).unwrap();
                    let backup = m.delete_backup(0..4).unwrap();
                    assert_eq!(backup[0].to_blocks(), vec![(2, b"23".to_vec())]);
                    assert_eq!(backup[0].span(), (2, 4));
                    assert_eq!(blocks(&m), vec![(2, b"456789".to_vec())]);
                }

                #[test]
                fn test_clear_and_clear_backup() {
                    let mut m = hello();
                    let backup = m.clear_backup(2..4).unwrap();
                    assert_eq!(backup[0].to_blocks(), vec![(2, b"ll".to_vec())]);
                    assert_eq!(blocks(&m), vec![(0, b"He".to_vec()), (4, b"o, World!".to_vec())]);
                    m.clear(..).unwrap();
                    assert!(m.is_empty());
                }

                #[test]
                fn test_reversed_range_is_rejected() {
                    let mut m = hello();
                    let err = m.clear((Bound::Included(5), Bound::Excluded(2))).unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::InvalidRange);
                    assert_eq!(m, hello());
                }

                #[test]
                fn test_fill_tiles_from_range_start() {
                    let mut m = Mem::from_bytes(b"0123456789", 0).unwrap();
                    m.fill(2..7, b"ab").unwrap();
                    assert_eq!(m.to_bytes(..), b"01ababa789");
                    let mut m = Mem::new();
                    m.fill(3..6, b"xyz").unwrap();
                    assert_eq!(blocks(&m), vec![(3, b"xyz".to_vec())]);
                    assert_eq!(m.fill(0..2, b"").unwrap_err(), MemoryError::EmptyPattern);
                }

                #[test]
                fn test_fill_clipped_keeps_phase() {
                    let mut m = Mem::with_bounds(Some(3), None);
                    m.fill(0..8, b"0123").unwrap();
                    assert_eq!(blocks(&m), vec![(3, b"30123".to_vec())]);
                    let backup = m.fill_backup(4..6, b"-").unwrap();
                    assert_eq!(backup[0].to_blocks(), vec![(4, b"01".to_vec())]);
                }

                #[test]
                fn test_flood_only_fills_gaps() {
                    let mut m = Mem::from_blocks([(2, b"AB".to_vec()), (6, b"C".to_vec())], None, None).unwrap();
                    let backup = m.flood_backup(0..9, b"xyz").unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"xyAByzCyz".to_vec())]);
                    let spans: Vec<_> = backup.iter().map(|b| b.span()).collect();
                    assert_eq!(spans, vec![(0, 2), (4, 6), (7, 9)]);
                    assert!(backup.iter().all(|b| b.is_empty()));
                }

                #[test]
                fn test_shift_unbounded_and_bounded() {
                    let mut m = Mem::from_bytes(b"abc", 5).unwrap();
                    m.shift(3).unwrap();
                    assert_eq!(blocks(&m), vec![(8, b"abc".to_vec())]);
                    m.shift(-8).unwrap();
                    assert_eq!(blocks(&m), vec![(0, b"abc".to_vec())]);

                    let mut m = Mem::from_bytes(b"abcdef", 2).unwrap();
                    m.set_bound_span(Some(1), Some(8)).unwrap();
                    let backup = m.shift_backup(2).unwrap();
                    assert_eq!(backup[0].to_blocks(), vec![(6, b"ef".to_vec())]);
                    assert_eq!(blocks(&m), vec![(4, b"abcd".to_vec())]);
                    m.shift(-4).unwrap();
                    assert_eq!(blocks(&m), vec![(1, b"bcd".to_vec())]);
                    m.shift(-10).unwrap();
                    assert!(m.is_empty());
                }

                #[test]
                fn test_crop_keeps_range() {
                    let mut m = hello();
                    let backup = m.crop_backup(2..9).unwrap();
                    assert_eq!(m.to_bytes(..), b"llo, Wo");
                    assert_eq!(m.bound_span(), (None, None));
                    let parts: Vec<_> = backup.iter().map(|b| b.to_bytes(..)).collect();
                    assert_eq!(parts, vec![b"He".to_vec(), b"rld!".to_vec()]);
                }

                #[test]
                fn test_poke_append_pop() {
                    let mut m = Mem::new();
                    m.poke(3, Some(b'a')).unwrap();
                    m.append(b'b').unwrap();
                    assert_eq!(blocks(&m), vec![(3, b"ab".to_vec())]);
                    m.poke(3, None).unwrap();
                    assert_eq!(blocks(&m), vec![(4, b"b".to_vec())]);
                    m.extend(b"cd").unwrap();
                    assert_eq!(m.pop(None).unwrap(), Some(b'd'));
                    assert_eq!(m.pop(Some(4)).unwrap(), Some(b'b'));
                    assert_eq!(blocks(&m), vec![(4, b"c".to_vec())]);
                    assert_eq!(m.pop(Some(0)).unwrap(), None);
                    assert_eq!(blocks(&m), vec![(3, b"c".to_vec())]);
                    assert_eq!(Mem::new().pop(None).unwrap(), None);
                }

                #[test]
                fn test_replace_grows_and_shrinks() {
                    let mut m = Mem::from_bytes(b"0123456789", 0).unwrap();
                    m.replace(2..4, b"abcd").unwrap();
                    assert_eq!(m.to_bytes(..), b"01abcd456789");
                    m.replace(2..8, b"X").unwrap();
                    assert_eq!(m.to_bytes(..), b"01X6789");
                    m.replace(3..3, b"--").unwrap();
                    assert_eq!(m.to_bytes(..), b"01X--6789");
                    m.replace(0..9, b"").unwrap();
                    assert!(m.is_empty());
                }

                #[test]
                fn test_from_values_and_collapse() {
                    let m = Mem::from_values(2, [Some(b'a'), Some(b'b'), None, Some(b'c')]).unwrap();
                    assert_eq!(blocks(&m), vec![(2, b"ab".to_vec()), (5, b"c".to_vec())]);
                    let collapsed = collapse_blocks::<$A, _, _>([
                        (0, b"0123456789".to_vec()),
                        (3, b"ABC".to_vec()),
                        (11, b"x".to_vec()),
                        (10, b"y".to_vec()),
                    ])
                    .unwrap();
                    assert_eq!(collapsed, vec![(0, b"012ABC6789yx".to_vec())]);
                }

                #[test]
                fn test_from_blocks_rejects_malformed_input() {
                    let cases: [Vec<($A, Vec<u8>)>; 4] = [
                        vec![(0, b"ab".to_vec()), (2, b"c".to_vec())],
                        vec![(0, b"ab".to_vec()), (1, b"c".to_vec())],
                        vec![(5, b"ab".to_vec()), (0, b"c".to_vec())],
                        vec![(0, Vec::new())],
                    ];
                    for case in cases {
                        let err = Mem::from_blocks(case, None, None).unwrap_err();
                        assert_eq!(err.kind(), ErrorKind::InvalidRange);
                        assert!(matches!(err, MemoryError::InvalidBlock { .. }));
                    }
                    let m = Mem::from_blocks([(0, b"abcdef".to_vec())], Some(2), Some(4)).unwrap();
                    assert_eq!(blocks(&m), vec![(2, b"cd".to_vec())]);
                }

                #[test]
                fn test_payload_limit_from_config() {
                    let config = MemoryConfig::default().with_max_block_len(4);
                    let mut m = Mem::with_config(config).unwrap();
                    m.write(0, b"abcd").unwrap();
                    let err = m.write(10, b"abcde").unwrap_err();
                    assert!(matches!(err, MemoryError::PayloadTooLarge { len: 5, max: 4 }));
                    assert_eq!(m.fill(0..5, b"x").unwrap_err().kind(), ErrorKind::InvalidRange);
                    m.write(4, b"efgh").unwrap();
                    assert_eq!(m.content_size(), 8);
                }
            }
        };
    }

    test_memory_impl!(fixed_u64, u64);
    test_memory_impl!(fixed_u32, u32);
    test_memory_impl!(fixed_u16, u16);
    test_memory_impl!(wide_i64, i64);
    test_memory_impl!(wide_i128, i128);

    #[test]
    fn test_sentinel_is_never_occupied() {
        let mut m = Memory::<u32>::new();
        let err = m.write(u32::MAX, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        let err = m.write(u32::MAX - 1, b"xy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        m.write(u32::MAX - 2, b"xy").unwrap();
        assert_eq!(m.endex(), u32::MAX);
        assert_eq!(m.poke(u32::MAX, None).unwrap_err().kind(), ErrorKind::OutOfBounds);
    }

    #[test]
    fn test_unbounded_overflow_fails_without_loss() {
        let mut m = Memory::<u16>::new();
        m.write(u16::MAX - 4, b"abc").unwrap();
        let before = m.copy();
        assert_eq!(m.shift(5).unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert_eq!(m.reserve(0, 3).unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert_eq!(m.insert(u16::MAX - 4, b"zzz").unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert_eq!(m, before);
        assert_eq!(m.shift(2).unwrap_err().kind(), ErrorKind::OutOfBounds);
        m.shift(1).unwrap();
        assert_eq!(m.content_span(), (u16::MAX - 3, u16::MAX));
        assert_eq!(m.shift(-(i128::from(u16::MAX))).unwrap_err().kind(), ErrorKind::OutOfBounds);
    }

    #[test]
    fn test_wide_addresses_go_negative() {
        let mut m = Memory::<i128>::from_bytes(b"abc", 0).unwrap();
        m.shift(-10).unwrap();
        assert_eq!(m.content_span(), (-10, -7));
        m.insert(-20, b"zz").unwrap();
        assert_eq!(m.to_blocks(), vec![(-20, b"zz".to_vec()), (-8, b"abc".to_vec())]);
        m.delete(-19..-8).unwrap();
        assert_eq!(m.to_blocks(), vec![(-20, b"zabc".to_vec())]);
    }

    fn model_delete(model: &mut BTreeMap<u64, u8>, start: u64, endex: u64) {
        let size = endex - start;
        *model = model
            .iter()
            .filter(|(k, _)| **k < start || **k >= endex)
            .map(|(k, v)| (if *k >= endex { k - size } else { *k }, *v))
            .collect();
    }

    fn model_reserve(model: &mut BTreeMap<u64, u8>, at: u64, size: u64) {
        *model = model
            .iter()
            .map(|(k, v)| (if *k >= at { k + size } else { *k }, *v))
            .collect();
    }

    #[test]
    fn test_randomized_against_byte_map() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xb17e5);
        let mut m = Memory::<u64>::new();
        let mut model: BTreeMap<u64, u8> = BTreeMap::new();

        for step in 0..1_500 {
            let start = rng.random_range(0..128u64);
            let len = rng.random_range(0..10u64);
            let endex = start + len;
            let data: Vec<u8> = (0..len).map(|_| rng.random_range(b'a'..=b'z')).collect();
            match rng.random_range(0..8) {
                0 => {
                    m.write(start, &data).unwrap();
                    for (i, byte) in data.iter().enumerate() {
                        model.insert(start + i as u64, *byte);
                    }
                }
                1 => {
                    m.clear(start..endex).unwrap();
                    model.retain(|k, _| *k < start || *k >= endex);
                }
                2 => {
                    m.delete(start..endex).unwrap();
                    model_delete(&mut model, start, endex);
                }
                3 => {
                    m.insert(start, &data).unwrap();
                    if len > 0 {
                        model_reserve(&mut model, start, len);
                        for (i, byte) in data.iter().enumerate() {
                            model.insert(start + i as u64, *byte);
                        }
                    }
                }
                4 if len > 0 => {
                    m.fill(start..endex, b"123").unwrap();
                    for x in start..endex {
                        model.insert(x, b"123"[((x - start) % 3) as usize]);
                    }
                }
                5 if len > 0 => {
                    m.flood(start..endex, b"XY").unwrap();
                    for x in start..endex {
                        model.entry(x).or_insert(b"XY"[((x - start) % 2) as usize]);
                    }
                }
                6 => {
                    m.reserve(start, len as usize).unwrap();
                    model_reserve(&mut model, start, len);
                }
                _ => {
                    let value = m.pop(Some(start)).unwrap();
                    assert_eq!(value, model.get(&start).copied());
                    model_delete(&mut model, start, start + 1);
                }
            }

            m.validate().unwrap();
            let flat: BTreeMap<u64, u8> = m.items(..).filter_map(|(k, v)| v.map(|v| (k, v))).collect();
            assert_eq!(flat, model, "diverged at step {step}");
        }
    }

    const LOWER: u64 = 16;
    const UPPER: u64 = 160;

    fn model_clip(start: u64, endex: u64) -> Option<(u64, u64)> {
        let (start, endex) = (start.max(LOWER), endex.min(UPPER));
        (start < endex).then_some((start, endex))
    }

    fn model_write_bounded(model: &mut BTreeMap<u64, u8>, start: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let at = start + i as u64;
            if (LOWER..UPPER).contains(&at) {
                model.insert(at, *byte);
            }
        }
    }

    fn model_delete_bounded(model: &mut BTreeMap<u64, u8>, start: u64, endex: u64) {
        if let Some((start, endex)) = model_clip(start, endex) {
            model_delete(model, start, endex);
        }
    }

    /// Opens the clipped gap and drops what falls past the upper bound.
    /// Returns where the gap starts and how long it is.
    fn model_reserve_bounded(model: &mut BTreeMap<u64, u8>, start: u64, len: u64) -> Option<(u64, u64)> {
        let (at, endex) = model_clip(start, start + len)?;
        let size = endex - at;
        model.retain(|k, _| *k < UPPER - size);
        model_reserve(model, at, size);
        Some((at, size))
    }

    fn model_insert_bounded(model: &mut BTreeMap<u64, u8>, start: u64, data: &[u8]) {
        if let Some((at, size)) = model_reserve_bounded(model, start, data.len() as u64) {
            let from = (at - start) as usize;
            for (i, byte) in data[from..from + size as usize].iter().enumerate() {
                model.insert(at + i as u64, *byte);
            }
        }
    }

    #[test]
    fn test_randomized_bounded_against_byte_map() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_b0d5);
        let mut m = Memory::<u64>::with_bounds(Some(LOWER), Some(UPPER));
        let mut model: BTreeMap<u64, u8> = BTreeMap::new();

        for step in 0..1_500 {
            let start = rng.random_range(0..UPPER + 16);
            let len = rng.random_range(0..10u64);
            let endex = start + len;
            let data: Vec<u8> = (0..len).map(|_| rng.random_range(b'a'..=b'z')).collect();
            match rng.random_range(0..11) {
                0 => {
                    m.write(start, &data).unwrap();
                    model_write_bounded(&mut model, start, &data);
                }
                1 => {
                    m.clear(start..endex).unwrap();
                    model.retain(|k, _| *k < start || *k >= endex);
                }
                2 => {
                    m.delete(start..endex).unwrap();
                    model_delete_bounded(&mut model, start, endex);
                }
                3 => {
                    m.insert(start, &data).unwrap();
                    model_insert_bounded(&mut model, start, &data);
                }
                4 if len > 0 => {
                    m.fill(start..endex, b"123").unwrap();
                    if let Some((from, to)) = model_clip(start, endex) {
                        for x in from..to {
                            model.insert(x, b"123"[((x - start) % 3) as usize]);
                        }
                    }
                }
                5 if len > 0 => {
                    m.flood(start..endex, b"XY").unwrap();
                    if let Some((from, to)) = model_clip(start, endex) {
                        for x in from..to {
                            model.entry(x).or_insert(b"XY"[((x - start) % 2) as usize]);
                        }
                    }
                }
                6 => {
                    m.reserve(start, len as usize).unwrap();
                    model_reserve_bounded(&mut model, start, len);
                }
                7 => {
                    let value = m.pop(Some(start)).unwrap();
                    assert_eq!(value, model.get(&start).copied());
                    model_delete_bounded(&mut model, start, start + 1);
                }
                8 => {
                    let offset = rng.random_range(-12i128..=12);
                    m.shift(offset).unwrap();
                    model = model
                        .iter()
                        .filter_map(|(k, v)| {
                            let moved = *k as i128 + offset;
                            (LOWER as i128..UPPER as i128)
                                .contains(&moved)
                                .then_some((moved as u64, *v))
                        })
                        .collect();
                }
                9 => {
                    let cut = m.cut(start..endex).unwrap();
                    cut.validate().unwrap();
                    assert_eq!(cut.bound_span(), (Some(start), Some(endex)));
                    let taken: BTreeMap<u64, u8> = model.range(start..endex).map(|(k, v)| (*k, *v)).collect();
                    model.retain(|k, _| *k < start || *k >= endex);
                    let flat: BTreeMap<u64, u8> =
                        cut.items(..).filter_map(|(k, v)| v.map(|v| (k, v))).collect();
                    assert_eq!(flat, taken, "cut diverged at step {step}");
                    if rng.random_bool(0.5) {
                        m.write_memory(start, &cut, false).unwrap();
                        model.extend(taken);
                    }
                }
                10 => {
                    let stop = start + rng.random_range(0..10u64);
                    m.replace(start..stop, &data).unwrap();
                    let size = stop - start;
                    if len <= size {
                        model_write_bounded(&mut model, start, &data);
                        model_delete_bounded(&mut model, start + len, stop);
                    } else {
                        let (head, tail) = data.split_at(size as usize);
                        model_write_bounded(&mut model, start, head);
                        model_insert_bounded(&mut model, stop, tail);
                    }
                }
                _ => {}
            }

            m.validate().unwrap();
            assert!(model.keys().all(|k| (LOWER..UPPER).contains(k)));
            let flat: BTreeMap<u64, u8> = m.items(..).filter_map(|(k, v)| v.map(|v| (k, v))).collect();
            assert_eq!(flat, model, "diverged at step {step}");
        }
    }
}
