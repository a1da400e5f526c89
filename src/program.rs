//! The shared BCM schedule.
//!
//! Every line is played back as [`PROGRAM_SIZE`] time slices. Slice 0 shows
//! the line's *first entry*, in which lane `i` tests threshold bit
//! `(LANES - 1 - i) % BITS`. Each following slice applies one
//! [`Transition`]: every lane of one *lane class* (lanes that are `BITS`
//! apart) moves on to test a different bit. The intervals are chosen so that
//! every class spends exactly `2^(b + 1)` timer ticks on bit `b` over the
//! modulation part of the program.
//!
//! The remaining `2 * BITS` slots form a blanking tail that moves every
//! class to bit `BITS`, which is never lit, so the line is dark while the
//! channel select lines change.
//!
//! The table also carries the channel select toggle masks that walk the
//! multiplexer through [`LINE_SEQUENCE`].

use crate::{BITS, LANES, LINES, PROGRAM_SIZE};

/// Order in which the multiplexer visits the physical lines, with the first
/// line repeated at the end. Neighbours differ in as few select bits as
/// possible to keep ghosting down.
pub const LINE_SEQUENCE: [u8; LINES + 1] = [4, 6, 3, 1, 0, 2, 7, 5, 4];

/// Number of channel select outputs.
pub const SELECT_LINES: usize = 3;

/// Transitions that walk every lane class through every bit-plane.
pub const MODULATION_STEPS: usize = BITS * (BITS - 1);

const fn line_sequence_is_cycle() -> bool {
    if LINE_SEQUENCE[0] != LINE_SEQUENCE[LINES] {
        return false;
    }
    let mut seen = 0u32;
    let mut i = 0;
    while i < LINES {
        let line = LINE_SEQUENCE[i] as usize;
        if line >= LINES || seen & (1 << line) != 0 {
            return false;
        }
        seen |= 1 << line;
        i += 1;
    }
    true
}

const _: () = assert!(
    line_sequence_is_cycle(),
    "line sequence must visit every line once and return to the start"
);
const _: () = assert!(LINES <= 1 << SELECT_LINES);
const _: () = assert!(MODULATION_STEPS + BITS <= PROGRAM_SIZE - 1);

/// One program step: the lane class whose highest lane is `position` starts
/// testing threshold bit `bit`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    /// Highest lane of the class.
    pub position: u8,
    /// Threshold bit to test. `BITS` means dark.
    pub bit: u8,
}

impl Transition {
    /// Lanes of the class, from `position` down in steps of `BITS`.
    pub fn lanes(self) -> impl Iterator<Item = usize> {
        (0..=usize::from(self.position)).rev().step_by(BITS)
    }

    /// The class index of this transition.
    #[must_use]
    pub const fn class(self) -> usize {
        (LANES - 1 - self.position as usize) % BITS
    }
}

/// Intervals, transitions and select toggles shared by every line.
///
/// Build it once, ideally in a `static`:
///
/// ```rust
/// use bcm_matrix::program::ProgramTable;
///
/// static PROGRAM: ProgramTable = ProgramTable::new();
/// assert_eq!(PROGRAM.intervals().len(), bcm_matrix::PROGRAM_SIZE);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ProgramTable {
    intervals: [u16; PROGRAM_SIZE],
    transitions: [Transition; PROGRAM_SIZE - 1],
    channel_select: [u8; LINES],
    line_zero_index: usize,
}

impl ProgramTable {
    /// Generates the tables.
    #[must_use]
    pub const fn new() -> Self {
        let mut intervals = [0u16; PROGRAM_SIZE];
        let mut transitions = [Transition {
            position: 0,
            bit: 0,
        }; PROGRAM_SIZE - 1];
        let mut idx = 0;

        // Rising pass: class j moves up to bit i.
        let mut i = 1;
        while i < BITS {
            let mut j = i;
            while j > 0 {
                j -= 1;
                let weight: u16 = if j == 0 { 1 } else { 1 << (j - 1) };
                intervals[PROGRAM_SIZE - idx - 2] = weight * 2 - 1;
                transitions[idx] = Transition {
                    position: (LANES - 1 - j) as u8,
                    bit: i as u8,
                };
                idx += 1;
            }
            i += 1;
        }

        // Falling pass: class i walks back down from bit 0.
        let mut i = BITS - 1;
        while i > 0 {
            let mut j = 0;
            while j < i {
                let weight: u16 = if j + 1 == i { 1 } else { 1 << j };
                intervals[PROGRAM_SIZE - idx - 2] = weight * 2 - 1;
                transitions[idx] = Transition {
                    position: (LANES - 1 - i) as u8,
                    bit: j as u8,
                };
                idx += 1;
                j += 1;
            }
            i -= 1;
        }

        // Blanking tail. Class c ends the modulation part on bit c - 1, so
        // blanking from class 1 upwards keeps the overshoot on the most
        // significant bits.
        while idx < PROGRAM_SIZE - 1 {
            let class = (idx - MODULATION_STEPS + 1) % BITS;
            transitions[idx] = Transition {
                position: (LANES - 1 - class) as u8,
                bit: BITS as u8,
            };
            idx += 1;
        }
        intervals[PROGRAM_SIZE - 1] = 1;

        let mut channel_select = [0u8; LINES];
        let mut i = 0;
        while i < LINES {
            let toggled = LINE_SEQUENCE[i] ^ LINE_SEQUENCE[i + 1];
            channel_select[i] = toggled & ((1 << SELECT_LINES) - 1);
            i += 1;
        }

        let mut line_zero_index = 1;
        while line_zero_index < LINES && LINE_SEQUENCE[line_zero_index] != 0 {
            line_zero_index += 1;
        }

        Self {
            intervals,
            transitions,
            channel_select,
            line_zero_index,
        }
    }

    /// Slice durations in timer ticks minus one. Playback consumes them from
    /// the last index down; `intervals()[PROGRAM_SIZE - 1 - k]` is the length
    /// of the slice showing entry `k`.
    #[must_use]
    pub const fn intervals(&self) -> &[u16; PROGRAM_SIZE] {
        &self.intervals
    }

    /// The transition producing entry `k + 1` from entry `k` is at index `k`.
    #[must_use]
    pub const fn transitions(&self) -> &[Transition; PROGRAM_SIZE - 1] {
        &self.transitions
    }

    /// Select toggle masks. Bit `n` toggles select line `n`. Consumed from
    /// the last index down, like the intervals.
    #[must_use]
    pub const fn channel_select(&self) -> &[u8; LINES] {
        &self.channel_select
    }

    /// Index of line 0 in [`LINE_SEQUENCE`]. The select lines come out of
    /// reset at 0, so the scanner starts its first cycle here to line up with
    /// the start of the sequence.
    #[must_use]
    pub const fn line_zero_index(&self) -> usize {
        self.line_zero_index
    }

    /// The threshold bit lane `lane` tests in a line's first entry.
    #[must_use]
    pub const fn initial_bit(lane: usize) -> usize {
        (LANES - 1 - lane) % BITS
    }

    /// Physical select value frame line `line` is shown on once scanning has
    /// settled.
    #[must_use]
    pub const fn physical_line(line: usize) -> u8 {
        LINE_SEQUENCE[LINES - line]
    }

    /// Total timer ticks for one line.
    #[must_use]
    pub const fn line_ticks(&self) -> u32 {
        let mut total = 0;
        let mut i = 0;
        while i < PROGRAM_SIZE {
            total += self.intervals[i] as u32 + 1;
            i += 1;
        }
        total
    }
}

impl Default for ProgramTable {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ProgramTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgramTable")
            .field("slices", &self.intervals.len())
            .field("line_ticks", &self.line_ticks())
            .field("channel_select", &self.channel_select)
            .field("line_zero_index", &self.line_zero_index)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProgramTable {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ProgramTable slices: {} line_ticks: {} line_zero_index: {}",
            self.intervals.len(),
            self.line_ticks(),
            self.line_zero_index
        );
    }
}
