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

//! Pattern tiling used to synthesize bytes for empty address ranges.

/// Endless repetition of a byte pattern, starting `phase` bytes into it.
///
/// An empty pattern yields nothing.
#[derive(Debug, Clone)]
pub struct Tiled<'a> {
    pattern: &'a [u8],
    index: usize,
}

impl<'a> Tiled<'a> {
    #[inline]
    pub fn new(pattern: &'a [u8], phase: u128) -> Self {
        Self {
            pattern,
            index: phase_index(pattern.len(), phase),
        }
    }

    /// The byte emitted `phase` bytes into the tiling.
    #[inline]
    pub fn byte_at(pattern: &[u8], phase: u128) -> Option<u8> {
        pattern.get(phase_index(pattern.len(), phase)).copied()
    }
}

#[inline]
fn phase_index(len: usize, phase: u128) -> usize {
    if len == 0 {
        0
    } else {
        (phase % len as u128) as usize
    }
}

impl Iterator for Tiled<'_> {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let byte = *self.pattern.get(self.index)?;
        self.index += 1;
        if self.index == self.pattern.len() {
            self.index = 0;
        }
        Some(byte)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.pattern.is_empty() {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}

impl std::iter::FusedIterator for Tiled<'_> {}

/// Appends `len` bytes of `pattern` tiled from `phase` to `buf`.
///
/// Copies whole pattern repetitions at once. Does nothing for an empty pattern.
pub fn tile_into(buf: &mut Vec<u8>, pattern: &[u8], phase: u128, len: usize) {
    if pattern.is_empty() || len == 0 {
        return;
    }
    buf.reserve(len);
    let mut index = phase_index(pattern.len(), phase);
    let mut remaining = len;
    while remaining > 0 {
        let chunk = &pattern[index..];
        let take = chunk.len().min(remaining);
        buf.extend_from_slice(&chunk[..take]);
        remaining -= take;
        index = 0;
    }
}
