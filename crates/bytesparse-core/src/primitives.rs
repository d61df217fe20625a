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

//! # Core Primitives
//!
//! Half-open address spans used to describe blocks, gaps and operation
//! windows throughout the workspace.

use crate::Address;
use std::cmp::Ordering;
use std::fmt;

/// A half-open span `[start, endex)`.
///
/// The start is inclusive and the end ("endex") exclusive, so a span covers all
/// addresses `x` with `start <= x < endex`.
///
/// # Examples
///
/// ```
/// use bytesparse_core::primitives::Span;
/// let span = Span::new(1u64, 5);
/// assert_eq!(span.start(), 1);
/// assert_eq!(span.endex(), 5);
/// assert!(span.contains(3));
/// assert!(!span.contains(5));
/// assert_eq!(span.measure(), 4);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span<A> {
    start: A,
    endex: A,
}

impl<A> Span<A> {
    /// Creates a new half-open span, swapping the bounds if `b < a`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// let span = Span::new(5u32, 3);
    /// assert_eq!(span.start(), 3);
    /// assert_eq!(span.endex(), 5);
    /// ```
    #[inline]
    pub fn new(a: A, b: A) -> Self
    where
        A: Ord + Copy,
    {
        let (start, endex) = match a.cmp(&b) {
            Ordering::Greater => (b, a),
            _ => (a, b),
        };
        Self { start, endex }
    }

    /// Returns the inclusive start.
    #[inline]
    pub fn start(&self) -> A
    where
        A: Copy,
    {
        self.start
    }

    /// Returns the exclusive end.
    #[inline]
    pub fn endex(&self) -> A
    where
        A: Copy,
    {
        self.endex
    }

    /// Checks if the span covers no address.
    #[inline]
    pub fn is_empty(&self) -> bool
    where
        A: PartialEq,
    {
        self.start == self.endex
    }

    /// Checks if the span covers `x`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// let span = Span::new(1i64, 5);
    /// assert!(span.contains(1)); // start is inclusive
    /// assert!(!span.contains(5)); // endex is exclusive
    /// ```
    #[inline]
    pub fn contains(&self, x: A) -> bool
    where
        A: PartialOrd,
    {
        x >= self.start && x < self.endex
    }

    /// Checks if `other` lies entirely inside this span.
    #[inline]
    pub fn contains_span(&self, other: &Self) -> bool
    where
        A: PartialOrd,
    {
        other.start >= self.start && other.endex <= self.endex
    }

    /// Checks if the two spans share at least one address.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// let a = Span::new(1u64, 5);
    /// assert!(a.intersects(&Span::new(4, 6)));
    /// assert!(!a.intersects(&Span::new(5, 7))); // touching is not intersecting
    /// ```
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool
    where
        A: Ord + Copy,
    {
        self.start.max(other.start) < self.endex.min(other.endex)
    }

    /// Checks if the spans intersect or are adjacent, i.e. whether storing both
    /// would produce a single run.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// let a = Span::new(1u64, 5);
    /// assert!(a.touches(&Span::new(5, 7)));
    /// assert!(!a.touches(&Span::new(6, 7)));
    /// ```
    #[inline]
    pub fn touches(&self, other: &Self) -> bool
    where
        A: Ord + Copy,
    {
        self.start <= other.endex && other.start <= self.endex
    }

    /// Returns the overlap of the two spans, or `None` if they do not intersect.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Option<Self>
    where
        A: Ord + Copy,
    {
        let start = self.start.max(other.start);
        let endex = self.endex.min(other.endex);
        (start < endex).then_some(Self { start, endex })
    }

    /// Clamps the span into `boundary`.
    ///
    /// Unlike [`Span::intersection`], a span that merely touches the boundary
    /// collapses to an empty span on the boundary edge instead of `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// let boundary = Span::new(10u32, 20);
    /// assert_eq!(Span::new(5, 15).clamp(&boundary), Span::new(10, 15));
    /// assert_eq!(Span::new(25, 30).clamp(&boundary), Span::new(20, 20));
    /// ```
    #[inline]
    pub fn clamp(&self, boundary: &Self) -> Self
    where
        A: Ord + Copy,
    {
        let start = self.start.max(boundary.start).min(boundary.endex);
        let endex = self.endex.min(boundary.endex).max(start);
        Self { start, endex }
    }
}

impl<A: Address> Span<A> {
    /// Number of addresses covered, measured over the whole address space.
    #[inline]
    pub fn measure(&self) -> u128 {
        self.start.measure(self.endex)
    }

    /// Number of addresses covered, as a block length.
    ///
    /// Only meaningful for spans no longer than [`Address::max_block_len`].
    #[inline]
    pub fn len(&self) -> usize {
        self.start.distance(self.endex)
    }

    /// The span of `len` addresses starting at `start`, or `None` on overflow.
    #[inline]
    pub fn with_len(start: A, len: usize) -> Option<Self> {
        start
            .checked_advance(len)
            .map(|endex| Self { start, endex })
    }
}

impl<A: fmt::Display> fmt::Display for Span<A> {
    /// Formats the span as `[start, endex)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytesparse_core::primitives::Span;
    ///
    /// assert_eq!(Span::new(1u64, 5).to_string(), "[1, 5)");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.endex)
    }
}

impl<A: Ord + Copy> From<std::ops::Range<A>> for Span<A> {
    #[inline]
    fn from(r: std::ops::Range<A>) -> Self {
        Span::new(r.start, r.end)
    }
}

impl<A: Ord + Copy> From<(A, A)> for Span<A> {
    #[inline]
    fn from((start, endex): (A, A)) -> Self {
        Span::new(start, endex)
    }
}
