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

use std::fmt::Display;
use thiserror::Error;

/// The coarse failure categories of a sparse memory operation.
///
/// Every [`MemoryError`] maps to exactly one kind through [`MemoryError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An address or range lies outside the representable space.
    OutOfBounds,
    /// A range is malformed, or a payload is too large or empty.
    InvalidRange,
    /// A structural mutation would touch storage pinned by a view.
    ResourceBusy,
    /// A view was used after it was released, or on a memory that did not
    /// issue it.
    ReleasedViewUse,
    /// A searched pattern is absent.
    NotFound,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::OutOfBounds => "out of bounds",
            ErrorKind::InvalidRange => "invalid range",
            ErrorKind::ResourceBusy => "resource busy",
            ErrorKind::ReleasedViewUse => "released view use",
            ErrorKind::NotFound => "not found",
        };
        f.write_str(name)
    }
}

/// Errors raised by [`crate::Memory`] operations.
///
/// Failing operations leave the memory exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError<A> {
    #[error("address {address} is reserved and cannot be occupied")]
    AddressNotOccupiable { address: A },

    #[error("range of {len} bytes starting at {start} overflows the address space")]
    RangeOverflow { start: A, len: u128 },

    #[error("shifting by {offset} moves content outside the address space")]
    ShiftOverflow { offset: i128 },

    #[error("negative extension offset {offset}")]
    NegativeOffset { offset: i128 },

    #[error("invalid range: endex {endex} precedes start {start}")]
    InvalidRange { start: A, endex: A },

    #[error("payload of {len} bytes exceeds the maximum block length {max}")]
    PayloadTooLarge { len: u128, max: usize },

    #[error("invalid block #{index} at {start}: {reason}")]
    InvalidBlock {
        index: usize,
        start: A,
        reason: &'static str,
    },

    #[error("non-empty pattern required")]
    EmptyPattern,

    #[error("range [{start}, {endex}) is not inside a single block")]
    NotContiguous { start: A, endex: A },

    #[error("block [{start}, {endex}) is pinned by {pins} outstanding view(s)")]
    ResourceBusy { start: A, endex: A, pins: usize },

    #[error("view #{slot} (generation {generation}) was already released")]
    ReleasedView { slot: usize, generation: u32 },

    #[error("view #{slot} (generation {generation}) was issued by another memory")]
    ForeignView { slot: usize, generation: u32 },

    #[error("subsection not found")]
    NotFound,
}

impl<A> MemoryError<A> {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::AddressNotOccupiable { .. }
            | MemoryError::RangeOverflow { .. }
            | MemoryError::ShiftOverflow { .. } => ErrorKind::OutOfBounds,
            MemoryError::InvalidRange { .. }
            | MemoryError::NegativeOffset { .. }
            | MemoryError::PayloadTooLarge { .. }
            | MemoryError::InvalidBlock { .. }
            | MemoryError::EmptyPattern
            | MemoryError::NotContiguous { .. } => ErrorKind::InvalidRange,
            MemoryError::ResourceBusy { .. } => ErrorKind::ResourceBusy,
            MemoryError::ReleasedView { .. } | MemoryError::ForeignView { .. } => {
                ErrorKind::ReleasedViewUse
            }
            MemoryError::NotFound => ErrorKind::NotFound,
        }
    }
}

pub type MemoryResult<T, A> = Result<T, MemoryError<A>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_covers_all_categories() {
        let e: MemoryError<u64> = MemoryError::AddressNotOccupiable { address: u64::MAX };
        assert_eq!(e.kind(), ErrorKind::OutOfBounds);
        let e: MemoryError<u64> = MemoryError::ShiftOverflow { offset: 3 };
        assert_eq!(e.kind(), ErrorKind::OutOfBounds);
        let e: MemoryError<u64> = MemoryError::NegativeOffset { offset: -1 };
        assert_eq!(e.kind(), ErrorKind::InvalidRange);
        let e: MemoryError<u64> = MemoryError::EmptyPattern;
        assert_eq!(e.kind(), ErrorKind::InvalidRange);
        let e: MemoryError<u64> = MemoryError::NotContiguous { start: 1, endex: 9 };
        assert_eq!(e.kind(), ErrorKind::InvalidRange);
        let e: MemoryError<u64> = MemoryError::ResourceBusy {
            start: 0,
            endex: 4,
            pins: 1,
        };
        assert_eq!(e.kind(), ErrorKind::ResourceBusy);
        let e: MemoryError<u64> = MemoryError::ReleasedView {
            slot: 0,
            generation: 1,
        };
        assert_eq!(e.kind(), ErrorKind::ReleasedViewUse);
        let e: MemoryError<u64> = MemoryError::ForeignView {
            slot: 0,
            generation: 1,
        };
        assert_eq!(e.kind(), ErrorKind::ReleasedViewUse);
        assert_eq!(MemoryError::<u64>::NotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_display_messages() {
        let e: MemoryError<i64> = MemoryError::InvalidRange { start: 5, endex: 2 };
        assert_eq!(e.to_string(), "invalid range: endex 2 precedes start 5");
        let e: MemoryError<u32> = MemoryError::ResourceBusy {
            start: 0,
            endex: 13,
            pins: 2,
        };
        assert_eq!(
            e.to_string(),
            "block [0, 13) is pinned by 2 outstanding view(s)"
        );
        assert_eq!(ErrorKind::ResourceBusy.to_string(), "resource busy");
    }
}
