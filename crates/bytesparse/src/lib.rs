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

//! A sparse, byte-addressable memory.
//!
//! [`Memory`] stores bytes over a sparse integer address space as an ordered
//! list of non-overlapping, non-adjacent [`Block`]s, with optional bounds that
//! confine all content to a window. It supports overwrite, insertion,
//! deletion, pattern fill and flood, shifting, cutting, searching and lazy
//! iteration over content, gaps and values.
//!
//! Two address families are available through [`bytesparse_core::Address`]:
//! fixed-width unsigned addresses with a reserved all-ones sentinel
//! ([`FixedMemory`]) and wide signed addresses that may be negative
//! ([`WideMemory`]).
//!
//! # Examples
//!
//! ```
//! use bytesparse::FixedMemory;
//!
//! let mut memory = FixedMemory::from_bytes(b"Hello, World!", 0).unwrap();
//! memory.extend(b"!!").unwrap();
//! memory.replace(0..5, b"Ciao").unwrap();
//! assert_eq!(memory.to_bytes(..), b"Ciao, World!!!");
//! memory.clear(4..6).unwrap();
//! assert_eq!(memory.content_parts(), 2);
//! ```

pub mod block;
pub mod blocklist;
pub mod bounds;
pub mod concat;
pub mod config;
pub mod cut;
pub mod err;
pub mod memory;
pub mod query;
pub mod view;

pub use block::Block;
pub use blocklist::BlockList;
pub use bytesparse_core::{Address, Span};
pub use config::MemoryConfig;
pub use err::{ErrorKind, MemoryError, MemoryResult};
pub use memory::{Memory, collapse_blocks};
pub use query::{BoundedGaps, Gaps, Intervals, Items, Keys, Values};
pub use view::{Generation, View};

/// Memory over 64-bit addresses with `u64::MAX` as sentinel.
pub type FixedMemory = Memory<u64>;

/// Memory over signed 128-bit addresses, negative addresses included.
pub type WideMemory = Memory<i128>;
