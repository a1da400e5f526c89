//! Upstream controller side of the host link.
//!
//! [`HostCommand`] encodes single commands. [`HostFrame`] is an
//! `embedded-graphics` canvas the size of one panel, and [`FrameStream`] is
//! the complete word sequence that streams a [`HostFrame`] to a panel and
//! flips it, ready to hand to a DMA engine.
//!
//! # Example
//! ```rust
//! use bcm_matrix::host::{FrameStream, HostFrame};
//! use embedded_graphics::pixelcolor::Rgb888;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{Line, PrimitiveStyle};
//!
//! let mut frame = HostFrame::new();
//! Line::new(Point::new(0, 0), Point::new(7, 7))
//!     .into_styled(PrimitiveStyle::with_stroke(Rgb888::RED, 1))
//!     .draw(&mut frame)
//!     .unwrap();
//! let stream = FrameStream::new(&frame, 0).unwrap();
//! assert_eq!(stream.words().len(), 2 + 64 + 1);
//! ```

use core::convert::Infallible;

use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Point, Size};

use crate::iref::IREF_LEVELS;
use crate::protocol::{Header, LengthClass, Opcode, MAX_ADDRESS};
use crate::{Pixel, LINES, WIDTH};

/// Why a command could not be encoded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The address does not fit the 12-bit header field.
    AddressOutOfRange(u16),
    /// The brightness level is past the last reference level.
    LevelOutOfRange(u8),
    /// The output buffer is shorter than the encoded command.
    BufferTooSmall {
        /// Words the command needs.
        needed: usize,
    },
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressOutOfRange(address) => {
                write!(f, "address {address} exceeds {MAX_ADDRESS}")
            }
            Self::LevelOutOfRange(level) => {
                write!(f, "brightness level {level} exceeds {}", IREF_LEVELS - 1)
            }
            Self::BufferTooSmall { needed } => {
                write!(f, "buffer too small, {needed} words needed")
            }
        }
    }
}

impl core::error::Error for EncodeError {}

/// One command to a panel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// Does nothing.
    NoOp,
    /// Gives the addressed panel the header address. Send it to
    /// [`BROADCAST`](crate::protocol::BROADCAST) to clear an address.
    AssignAddress,
    /// Shows the frame streamed so far.
    FlipFrame,
    /// Blanks or unblanks the outputs.
    SetBlanking(bool),
    /// Selects a current reference level.
    SetBrightness(u8),
    /// Fills the stage frame with one pixel.
    FillFrame(Pixel),
    /// Header and length of a pixel stream; the pixels follow as raw words.
    StreamFrame {
        /// Number of pixel words that follow.
        pixels: u16,
    },
}

impl HostCommand {
    /// The opcode this command is sent as.
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        match self {
            Self::NoOp => Opcode::NoOp,
            Self::AssignAddress => Opcode::AssignAddress,
            Self::FlipFrame => Opcode::FlipFrame,
            Self::SetBlanking(_) => Opcode::SetBlanking,
            Self::SetBrightness(_) => Opcode::SetBrightness,
            Self::FillFrame(_) => Opcode::FillFrame,
            Self::StreamFrame { .. } => Opcode::StreamFrame,
        }
    }

    /// Words [`encode`](Self::encode) writes.
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        match self.opcode().length_class() {
            LengthClass::Zero => 1,
            LengthClass::One => 2,
            LengthClass::Two => 3,
            // Header and length; the pixels are sent separately.
            LengthClass::Variable => 2,
        }
    }

    /// Header word for this command sent to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::AddressOutOfRange`] if `address` does not fit
    /// the header.
    pub fn header(self, address: u16) -> Result<Header, EncodeError> {
        if address > MAX_ADDRESS {
            return Err(EncodeError::AddressOutOfRange(address));
        }
        Ok(Header::new(self.opcode(), address))
    }

    /// Writes the command for `address` to the start of `out`.
    ///
    /// Returns the number of words written.
    ///
    /// # Errors
    ///
    /// Fails if the address or brightness level is out of range or `out` is
    /// too short.
    pub fn encode(self, address: u16, out: &mut [u16]) -> Result<usize, EncodeError> {
        let header = self.header(address)?;
        if let Self::SetBrightness(level) = self {
            if usize::from(level) >= IREF_LEVELS {
                return Err(EncodeError::LevelOutOfRange(level));
            }
        }
        let needed = self.encoded_len();
        if out.len() < needed {
            return Err(EncodeError::BufferTooSmall { needed });
        }
        out[0] = header.raw();
        match self {
            Self::NoOp | Self::AssignAddress | Self::FlipFrame => {}
            Self::SetBlanking(blanked) => out[1] = u16::from(blanked),
            Self::SetBrightness(level) => out[1] = u16::from(level),
            Self::FillFrame(pixel) => out[1] = pixel.raw(),
            Self::StreamFrame { pixels } => out[1] = pixels,
        }
        Ok(needed)
    }
}

/// Pixels of one panel, drawable with `embedded-graphics`.
///
/// Red drives channel A and green drives channel B. Blue has no LEDs and
/// is dropped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HostFrame {
    pixels: [[Pixel; WIDTH]; LINES],
}

impl HostFrame {
    /// A black frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pixels: [[Pixel::BLACK; WIDTH]; LINES],
        }
    }

    /// Sets every pixel to black.
    pub fn clear(&mut self) {
        self.pixels = [[Pixel::BLACK; WIDTH]; LINES];
    }

    /// Sets one pixel. Points outside the panel are ignored.
    pub fn set_pixel(&mut self, p: Point, color: Rgb888) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        if x >= WIDTH || y >= LINES {
            return;
        }
        self.pixels[y][x] = Pixel::new(color.r(), color.g());
    }

    /// The pixel at column `x` of line `y`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Pixel> {
        self.pixels.get(y)?.get(x).copied()
    }

    /// Pixels in the order they are streamed: line by line, column by column.
    pub fn iter(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.pixels.iter().flatten().copied()
    }
}

impl Default for HostFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for HostFrame {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, LINES as u32)
    }
}

impl DrawTarget for HostFrame {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels = [[Pixel::new(color.r(), color.g()); WIDTH]; LINES];
        Ok(())
    }
}

/// Words in a [`FrameStream`].
pub const STREAM_WORDS: usize = 2 + LINES * WIDTH + 1;

/// The words that stream one frame to a panel and flip it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(C)]
#[repr(align(4))]
pub struct FrameStream {
    words: [u16; STREAM_WORDS],
}

impl FrameStream {
    /// Encodes `frame` for the panel at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::AddressOutOfRange`] if `address` does not fit
    /// the header.
    pub fn new(frame: &HostFrame, address: u16) -> Result<Self, EncodeError> {
        let mut words = [0u16; STREAM_WORDS];
        let stream = HostCommand::StreamFrame {
            pixels: (LINES * WIDTH) as u16,
        };
        let mut at = stream.encode(address, &mut words)?;
        for pixel in frame.iter() {
            words[at] = pixel.raw();
            at += 1;
        }
        HostCommand::FlipFrame.encode(address, &mut words[at..])?;
        Ok(Self { words })
    }

    /// The encoded words.
    #[must_use]
    pub const fn words(&self) -> &[u16; STREAM_WORDS] {
        &self.words
    }
}

unsafe impl ReadBuffer for FrameStream {
    type Word = u16;

    unsafe fn read_buffer(&self) -> (*const u16, usize) {
        (self.words.as_ptr(), self.words.len())
    }
}

unsafe impl ReadBuffer for &mut FrameStream {
    type Word = u16;

    unsafe fn read_buffer(&self) -> (*const u16, usize) {
        (self.words.as_ptr(), self.words.len())
    }
}
