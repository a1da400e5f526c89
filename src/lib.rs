//! Binary-coded-modulation engine for a multiplexed LED matrix panel.
//!
//! ## How the panel works
//!
//! The panel is driven over two independent serial links:
//!
//! - **Host link** – 16-bit words from an upstream controller carrying
//!   commands and pixel data. Several panels may share one host link as a
//!   daisy chain; each one parses every word and only acts on commands that
//!   are broadcast or addressed to it.
//! - **Driver link** – 16-bit words to a pair of current-sink driver chips.
//!   Each bit of a word is one output *lane*: one channel of one column.
//!
//! The display is multiplexed across [`LINES`] physical lines selected by
//! three channel-select outputs. Only one line is lit at a time; the scanner
//! cycles through them fast enough that the eye sees a steady image.
//!
//! ### Brightness (Binary Code Modulation)
//! Each 8-bit channel value is mapped through a roughly quadratic gamma curve
//! to a [`BITS`]-bit threshold. The line is then lit as a sequence of
//! non-uniform time slices, where bit `b` of the threshold is shown for a
//! duration proportional to `2^b`. Instead of re-sending every lane at each
//! bit-plane boundary, the lanes are staggered: lane classes start on
//! different bit-planes and each slice boundary changes exactly one class.
//! The shared [`program::ProgramTable`] describes that schedule once for
//! every line.
//!
//! ### Data flow
//! ```text
//!  host words ─► HostProtocol ─► PixelPipeline ─► stage frame
//!                                                   │ commit / swap
//!  driver link ◄─ DriverScanner ◄─ active frame ◄───┘
//! ```
//!
//! - [`protocol::HostProtocol`] runs from the host link receive interrupt.
//! - [`pipeline::PixelPipeline`] decomposes pixels into [`LineWord`]s a few
//!   program steps at a time, so no single receive interrupt runs long.
//! - [`scanner::DriverScanner`] runs from a timer compare interrupt with a
//!   strictly higher priority and plays the active frame back.
//! - [`frame::FrameStore`] holds three frames; the active, stage and spare
//!   roles rotate without copying.
//!
//! ## Example
//! ```rust
//! use bcm_matrix::frame::FrameStore;
//! use bcm_matrix::program::ProgramTable;
//! use bcm_matrix::protocol::HostProtocol;
//! use bcm_matrix::scanner::DriverScanner;
//!
//! static PROGRAM: ProgramTable = ProgramTable::new();
//!
//! let mut store = FrameStore::new();
//! let (writer, reader) = store.split();
//! let mut protocol = HostProtocol::new(&PROGRAM, writer);
//! let mut scanner = DriverScanner::new(&PROGRAM, reader);
//! # let _ = (&mut protocol, &mut scanner);
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Logs through the `defmt` framework and implements `defmt::Format` for the
//! public data types.
//!
//! ### `log` Feature
//! Logs through the `log` facade. Only one of `defmt` and `log` should be
//! enabled.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

mod fmt;
#[cfg(test)]
mod mock;

pub mod config;
pub mod cursor;
pub mod frame;
pub mod gamma;
pub mod hal;
pub mod host;
pub mod iref;
pub mod pipeline;
pub mod program;
pub mod protocol;
pub mod scanner;

use bitfield::bitfield;

/// Significant bits of each gamma-corrected channel value.
pub const BITS: usize = 9;
/// Colour channels per pixel (red and green).
pub const CHANNELS: usize = 2;
/// Pixels per line.
pub const WIDTH: usize = 8;
/// Multiplexed display lines.
pub const LINES: usize = 8;
/// Frames in the active/stage/spare ring.
pub const BUFFERS: usize = 3;
/// Source lines buffered while decomposing.
pub const SRC_BUFFERS: usize = 2;

/// Output lanes per line word.
pub const LANES: usize = compute_lanes(CHANNELS, WIDTH);
/// Time slices in one line's program.
pub const PROGRAM_SIZE: usize = compute_program_size(BITS);
/// Program transitions decomposed per received pixel.
pub const PROGRAM_STEP: usize = compute_program_step(PROGRAM_SIZE, WIDTH);
/// Line words in one frame.
pub const FRAME_WORDS: usize = LINES * PROGRAM_SIZE;

/// Computes the number of output lanes for a channel count and line width.
#[must_use]
pub const fn compute_lanes(channels: usize, width: usize) -> usize {
    channels * width
}

/// Computes the number of time slices in a line's program for a bit depth.
///
/// `BITS * (BITS - 1)` transitions walk every lane class through every
/// bit-plane, `2 * BITS` more form the blanking tail, and one more slice
/// holds the first entry.
#[must_use]
pub const fn compute_program_size(bits: usize) -> usize {
    (bits + 1) * bits + 1
}

/// Computes how many program transitions each received pixel must decompose
/// so that a line's whole program is done before the next line completes.
///
/// The pixel completing a line only computes the first entry, leaving
/// `width - 1` pixels to share the remaining `program_size - 1` transitions.
#[must_use]
pub const fn compute_program_step(program_size: usize, width: usize) -> usize {
    (program_size - 1).div_ceil(width - 1)
}

const _: () = assert!(LANES <= u16::BITS as usize, "lanes must fit a line word");
const _: () = assert!(BITS < 16, "bit index BITS is used as the dark bit-plane");
const _: () = assert!(PROGRAM_STEP * (WIDTH - 1) >= PROGRAM_SIZE - 1);
const _: () = assert!(BUFFERS == 3 && SRC_BUFFERS == 2);

bitfield! {
    /// A received pixel: two 8-bit channels packed as `0xBBAA`.
    ///
    /// - Bits 15-8: channel B (green)
    /// - Bits 7-0: channel A (red)
    #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct Pixel(u16);
    impl Debug;
    /// Channel B intensity.
    pub u8, channel_b, set_channel_b: 15, 8;
    /// Channel A intensity.
    pub u8, channel_a, set_channel_a: 7, 0;
}

impl Pixel {
    /// A pixel with both channels dark.
    pub const BLACK: Self = Self(0);

    /// Create a pixel from its two channel intensities.
    #[must_use]
    pub const fn new(channel_a: u8, channel_b: u8) -> Self {
        Self(((channel_b as u16) << 8) | channel_a as u16)
    }

    /// The raw wire value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for Pixel {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Pixel {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Pixel({=u16:#06x})", self.0);
    }
}

/// One driver link word: a lit/dark bit for each output lane.
///
/// Lane `2 * column + channel` maps to bit `2 * column + channel`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct LineWord(pub u16);

impl LineWord {
    /// All lanes dark.
    pub const DARK: Self = Self(0);

    /// Whether `lane` is lit.
    #[must_use]
    pub const fn lane(self, lane: usize) -> bool {
        self.0 & (1 << lane) != 0
    }

    /// A copy of this word with `lane` set to `lit`.
    #[must_use]
    pub const fn with_lane(self, lane: usize, lit: bool) -> Self {
        Self((self.0 & !(1 << lane)) | ((lit as u16) << lane))
    }
}

pub use frame::{FrameStore, Slot};
pub use gamma::GammaPixel;
pub use hal::{DriverHal, HostHal};
pub use pipeline::PixelPipeline;
pub use program::ProgramTable;
pub use protocol::HostProtocol;
pub use scanner::DriverScanner;
