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

//! Views: pinned, generation-checked windows into block storage.
//!
//! A [`View`] is a plain handle. The bytes stay owned by the [`Memory`] and
//! are reached through [`Memory::view_bytes`] and [`Memory::view_bytes_mut`].
//! While a view is outstanding its block is pinned and every structural
//! mutation touching that block fails with `ResourceBusy`.
//!
//! Released slots are recycled with a bumped generation, so a stale handle
//! is detected instead of silently aliasing a newer view. Every registry
//! carries a process-unique owner id and rejects handles issued by another
//! memory, including copies and cuts of the issuing one.

use crate::err::{MemoryError, MemoryResult};
use crate::memory::Memory;
use bytesparse_core::{Address, Span};
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Generation counter for detecting stale view handles.
pub type Generation = u32;

/// First generation handed out for a fresh slot.
const FIRST_GENERATION: Generation = 1;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_owner() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a window `[start, endex)` inside a single block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct View<A> {
    owner: u64,
    slot: usize,
    generation: Generation,
    span: Span<A>,
}

impl<A: Address> View<A> {
    #[inline]
    pub fn start(&self) -> A {
        self.span.start()
    }

    #[inline]
    pub fn endex(&self) -> A {
        self.span.endex()
    }

    #[inline]
    pub fn span(&self) -> Span<A> {
        self.span
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.span.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    fn released(&self) -> MemoryError<A> {
        MemoryError::ReleasedView {
            slot: self.slot,
            generation: self.generation,
        }
    }

    #[inline]
    fn foreign(&self) -> MemoryError<A> {
        MemoryError::ForeignView {
            slot: self.slot,
            generation: self.generation,
        }
    }
}

#[derive(Debug)]
struct Slot<A> {
    generation: Generation,
    live: Option<Span<A>>,
}

/// Slot table of the views handed out by one memory.
#[derive(Debug)]
pub(crate) struct ViewRegistry<A> {
    owner: u64,
    slots: Vec<Slot<A>>,
    free: Vec<usize>,
    outstanding: usize,
}

impl<A> Default for ViewRegistry<A> {
    fn default() -> Self {
        Self {
            owner: next_owner(),
            slots: Vec::new(),
            free: Vec::new(),
            outstanding: 0,
        }
    }
}

impl<A: Address> ViewRegistry<A> {
    pub(crate) fn acquire(&mut self, span: Span<A>) -> View<A> {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].live = Some(span);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: FIRST_GENERATION,
                    live: Some(span),
                });
                self.slots.len() - 1
            }
        };
        self.outstanding += 1;
        View {
            owner: self.owner,
            slot,
            generation: self.slots[slot].generation,
            span,
        }
    }

    /// The window of a live view issued by this registry.
    pub(crate) fn lookup(&self, view: &View<A>) -> MemoryResult<Span<A>, A> {
        if view.owner != self.owner {
            return Err(view.foreign());
        }
        match self.slots.get(view.slot) {
            Some(Slot {
                generation,
                live: Some(span),
            }) if *generation == view.generation && *span == view.span => Ok(*span),
            _ => Err(view.released()),
        }
    }

    /// Retires a live view and bumps its slot generation.
    pub(crate) fn release(&mut self, view: &View<A>) -> MemoryResult<Span<A>, A> {
        let span = self.lookup(view)?;
        let slot = &mut self.slots[view.slot];
        slot.live = None;
        slot.generation = slot.generation.wrapping_add(1).max(FIRST_GENERATION);
        self.free.push(view.slot);
        self.outstanding -= 1;
        Ok(span)
    }

    #[inline]
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl<A: Address> Memory<A> {
    /// Pins the non-empty range, which must lie inside a single block.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotContiguous`] when the range is empty, touches a gap or
    /// spans more than one block.
    pub fn view<R: RangeBounds<A>>(&mut self, range: R) -> MemoryResult<View<A>, A> {
        let (start, endex) = self.resolve(&range)?;
        let not_contiguous = MemoryError::NotContiguous { start, endex };
        if start >= endex {
            return Err(not_contiguous);
        }
        let index = self
            .blocks
            .find_block_at(start)
            .filter(|&index| self.blocks[index].endex() >= endex)
            .ok_or(not_contiguous)?;
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(MemoryError::NotContiguous { start, endex })?;
        block.pin();
        let pins = block.pins();
        let view = self.views.acquire(Span::new(start, endex));
        debug!(slot = view.slot, %start, %endex, pins, "view acquired");
        Ok(view)
    }

    /// The bytes seen through a live view.
    pub fn view_bytes(&self, view: &View<A>) -> MemoryResult<&[u8], A> {
        let span = self.views.lookup(view)?;
        let index = self
            .blocks
            .find_block_at(span.start())
            .ok_or_else(|| view.released())?;
        let block = &self.blocks[index];
        Ok(&block.data()[block.offset_of(span.start())..block.offset_of(span.endex())])
    }

    /// Mutable access to the bytes seen through a live view.
    ///
    /// Writes land in place; the block layout never changes.
    pub fn view_bytes_mut(&mut self, view: &View<A>) -> MemoryResult<&mut [u8], A> {
        let span = self.views.lookup(view)?;
        let index = self
            .blocks
            .find_block_at(span.start())
            .ok_or_else(|| view.released())?;
        let block = self.blocks.get_mut(index).ok_or_else(|| view.released())?;
        let from = block.offset_of(span.start());
        let to = block.offset_of(span.endex());
        Ok(&mut block.data_mut()[from..to])
    }

    /// Releases a view, unpinning its block.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ReleasedView`] on double release or a stale handle,
    /// [`MemoryError::ForeignView`] for a handle issued by another memory.
    pub fn release(&mut self, view: &View<A>) -> MemoryResult<(), A> {
        let span = self.views.release(view)?;
        if let Some(index) = self.blocks.find_block_at(span.start())
            && let Some(block) = self.blocks.get_mut(index)
        {
            block.unpin();
        }
        debug!(slot = view.slot, start = %span.start(), endex = %span.endex(), "view released");
        Ok(())
    }

    #[inline]
    pub fn views_outstanding(&self) -> usize {
        self.views.outstanding()
    }

    /// Whether the block holding `address` is pinned by a view.
    #[inline]
    pub fn is_pinned(&self, address: A) -> bool {
        self.blocks
            .find_block_at(address)
            .is_some_and(|index| self.blocks[index].is_pinned())
    }
}
