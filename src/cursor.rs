//! Back-to-front cursors over compile-time sized tables.
//!
//! Both the decomposition writer and the scanner walk their tables from the
//! last index down to the first. [`Countdown`] keeps the position in
//! `0..=N` so it can never index past either end of an `[T; N]`.

/// A descending cursor over `N` slots that wraps back to the top.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Countdown<const N: usize> {
    pos: usize,
}

impl<const N: usize> Countdown<N> {
    /// A cursor whose next [`take`](Self::take) yields `N - 1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { pos: N }
    }

    /// A cursor whose next [`take`](Self::take) yields `index - 1`, or wraps
    /// to `N - 1` when `index` is 0.
    ///
    /// # Panics
    ///
    /// Panics if `index > N`.
    #[must_use]
    pub const fn starting_at(index: usize) -> Self {
        assert!(index <= N);
        Self { pos: index }
    }

    /// Moves down one slot and returns its index, wrapping past zero.
    #[inline]
    pub fn take(&mut self) -> usize {
        if self.pos == 0 {
            self.pos = N;
        }
        self.pos -= 1;
        self.pos
    }

    /// Whether the last [`take`](Self::take) returned index 0.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.pos == 0
    }

    /// Moves back to the top of the table.
    #[inline]
    pub fn reset(&mut self) {
        self.pos = N;
    }

    /// The index the next [`take`](Self::take) will return.
    #[must_use]
    pub const fn peek(&self) -> usize {
        if self.pos == 0 {
            N - 1
        } else {
            self.pos - 1
        }
    }
}

impl<const N: usize> Default for Countdown<N> {
    fn default() -> Self {
        Self::new()
    }
}
