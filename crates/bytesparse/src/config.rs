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

use crate::err::{MemoryError, MemoryResult};
use bytesparse_core::Address;

/// Per-memory configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Pattern synthesized for empty addresses by `values` and `items`,
    /// tiled from the start of the iterated range. `None` yields `None` values.
    pub gap_pattern: Option<Vec<u8>>,
    /// Upper limit on a single payload, below the address-derived maximum.
    pub max_block_len: Option<usize>,
    /// Re-validate every invariant after each mutation.
    pub check_invariants: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            gap_pattern: None,
            max_block_len: None,
            check_invariants: cfg!(debug_assertions),
        }
    }
}

impl MemoryConfig {
    #[inline]
    pub fn with_gap_pattern(mut self, pattern: impl Into<Vec<u8>>) -> Self {
        self.gap_pattern = Some(pattern.into());
        self
    }

    #[inline]
    pub fn with_max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = Some(max_block_len);
        self
    }

    #[inline]
    pub fn with_check_invariants(mut self, check_invariants: bool) -> Self {
        self.check_invariants = check_invariants;
        self
    }

    /// The effective payload limit for address type `A`.
    #[inline]
    pub fn block_len_limit<A: Address>(&self) -> usize {
        let natural = A::max_block_len();
        self.max_block_len.map_or(natural, |limit| limit.min(natural))
    }

    pub fn validate<A>(&self) -> MemoryResult<(), A> {
        if self.gap_pattern.as_ref().is_some_and(|p| p.is_empty()) {
            return Err(MemoryError::EmptyPattern);
        }
        Ok(())
    }
}
