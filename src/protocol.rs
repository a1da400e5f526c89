//! Host link command protocol.
//!
//! Every command starts with a [`Header`] word:
//!
//! - Bits 15-14: length class (0, 1 or 2 data words, or variable)
//! - Bits 13-12: opcode within the length class
//! - Bits 11-0: target address, [`BROADCAST`] for every panel
//!
//! A variable length command is followed by a word count and then that many
//! data words. [`HostProtocol`] tracks the length of every command, including
//! ones addressed to other panels and ones it does not understand, so all
//! panels on a shared link stay in step and find the next header.

use bitfield::bitfield;

use crate::fmt::{debug, info, trace, warning};
use crate::frame::StageWriter;
use crate::hal::HostHal;
use crate::iref::clip_level;
use crate::pipeline::PixelPipeline;
use crate::program::ProgramTable;
use crate::Pixel;

/// Header address every panel accepts.
pub const BROADCAST: u16 = 0;

/// Highest assignable panel address.
pub const MAX_ADDRESS: u16 = (1 << 12) - 1;

/// Number of data words that follow a header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LengthClass {
    /// No data.
    Zero,
    /// One data word.
    One,
    /// Two data words.
    Two,
    /// A word count followed by that many data words.
    Variable,
}

impl LengthClass {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Zero,
            1 => Self::One,
            2 => Self::Two,
            _ => Self::Variable,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Variable => 3,
        }
    }

    /// Fixed number of data words, or `None` for [`Variable`](Self::Variable).
    #[must_use]
    pub const fn words(self) -> Option<u16> {
        match self {
            Self::Variable => None,
            class => Some(class.bits()),
        }
    }
}

/// A decoded command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    /// Does nothing. Also what every unknown code decodes to.
    NoOp,
    /// Adopt the header address as this panel's address.
    AssignAddress,
    /// Finish the stage frame and show it.
    FlipFrame,
    /// Blank (non-zero) or unblank (zero) the outputs.
    SetBlanking,
    /// Set the current reference level.
    SetBrightness,
    /// Fill the stage frame with one pixel value.
    FillFrame,
    /// Stream pixels into the stage frame, one per data word.
    StreamFrame,
}

impl Opcode {
    /// Header word for this opcode with a broadcast address.
    #[must_use]
    pub const fn code(self) -> u16 {
        let (class, op) = match self {
            Self::NoOp => (LengthClass::Zero, 0),
            Self::AssignAddress => (LengthClass::Zero, 1),
            Self::FlipFrame => (LengthClass::Zero, 2),
            Self::SetBlanking => (LengthClass::One, 0),
            Self::SetBrightness => (LengthClass::One, 1),
            Self::FillFrame => (LengthClass::One, 2),
            Self::StreamFrame => (LengthClass::Variable, 0),
        };
        (class.bits() << 14) | (op << 12)
    }

    /// Length class this opcode is sent with.
    #[must_use]
    pub const fn length_class(self) -> LengthClass {
        LengthClass::from_bits((self.code() >> 14) as u8)
    }

    const fn decode(class: LengthClass, op: u8) -> Self {
        match (class, op) {
            (LengthClass::Zero, 1) => Self::AssignAddress,
            (LengthClass::Zero, 2) => Self::FlipFrame,
            (LengthClass::One, 0) => Self::SetBlanking,
            (LengthClass::One, 1) => Self::SetBrightness,
            (LengthClass::One, 2) => Self::FillFrame,
            (LengthClass::Variable, 0) => Self::StreamFrame,
            _ => Self::NoOp,
        }
    }
}

bitfield! {
    /// The first word of every command.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Header(u16);
    impl Debug;
    /// Raw length class.
    pub u8, length_bits, set_length_bits: 15, 14;
    /// Raw opcode within the length class.
    pub u8, opcode_bits, set_opcode_bits: 13, 12;
    /// Target address.
    pub u16, address, set_address: 11, 0;
}

impl Header {
    /// Builds a header for `opcode` sent to `address`.
    #[must_use]
    pub fn new(opcode: Opcode, address: u16) -> Self {
        let mut header = Self(opcode.code());
        header.set_address(address);
        header
    }

    /// The length class.
    #[must_use]
    pub fn length_class(&self) -> LengthClass {
        LengthClass::from_bits(self.length_bits())
    }

    /// The opcode. Unknown codes decode as [`Opcode::NoOp`].
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        Opcode::decode(self.length_class(), self.opcode_bits())
    }

    /// The raw word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for Header {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Header {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Header {{ opcode: {}, address: {} }}",
            self.opcode(),
            self.address()
        );
    }
}

/// Where the parser is within the current command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolState {
    /// The next word is a header.
    AwaitingHeader,
    /// This many fixed data words are still to come.
    AwaitingFixedData(u16),
    /// The next word is the data word count of a variable command.
    AwaitingVariableLength,
    /// This many variable data words are still to come.
    AwaitingVariableData(u16),
}

const MAX_FIXED_WORDS: usize = 2;

/// Parses the host word stream and drives the pixel pipeline.
pub struct HostProtocol<'a> {
    pipeline: PixelPipeline<'a>,
    state: ProtocolState,
    header: Header,
    data: [u16; MAX_FIXED_WORDS],
    received: usize,
    address: u16,
}

impl<'a> HostProtocol<'a> {
    /// Creates an unaddressed panel writing into `stage`.
    #[must_use]
    pub fn new(program: &'a ProgramTable, stage: StageWriter<'a>) -> Self {
        Self {
            pipeline: PixelPipeline::new(program, stage),
            state: ProtocolState::AwaitingHeader,
            header: Header::default(),
            data: [0; MAX_FIXED_WORDS],
            received: 0,
            address: BROADCAST,
        }
    }

    /// Current parser state.
    #[must_use]
    pub const fn state(&self) -> ProtocolState {
        self.state
    }

    /// This panel's address, [`BROADCAST`] until one is assigned.
    #[must_use]
    pub const fn address(&self) -> u16 {
        self.address
    }

    /// The pipeline fed by this parser.
    #[must_use]
    pub const fn pipeline(&self) -> &PixelPipeline<'a> {
        &self.pipeline
    }

    /// Handles one word from the host link.
    ///
    /// A [`FlipFrame`](Opcode::FlipFrame) blocks until the scanner has
    /// released the next stage slot; see [`PixelPipeline::commit`].
    pub fn receive<H: HostHal>(&mut self, word: u16, hal: &mut H) {
        match self.state {
            ProtocolState::AwaitingHeader => {
                self.header = Header(word);
                self.received = 0;
                trace!("header {}", word);
                match self.header.length_class() {
                    LengthClass::Variable => self.state = ProtocolState::AwaitingVariableLength,
                    LengthClass::Zero => self.dispatch(hal),
                    class => self.state = ProtocolState::AwaitingFixedData(class.bits()),
                }
            }
            ProtocolState::AwaitingVariableLength => {
                self.state = if word == 0 {
                    ProtocolState::AwaitingHeader
                } else {
                    ProtocolState::AwaitingVariableData(word)
                };
            }
            ProtocolState::AwaitingFixedData(remaining) => {
                self.data[self.received] = word;
                self.received += 1;
                if remaining > 1 {
                    self.state = ProtocolState::AwaitingFixedData(remaining - 1);
                } else {
                    self.state = ProtocolState::AwaitingHeader;
                    self.dispatch(hal);
                }
            }
            ProtocolState::AwaitingVariableData(remaining) => {
                self.state = if remaining > 1 {
                    ProtocolState::AwaitingVariableData(remaining - 1)
                } else {
                    ProtocolState::AwaitingHeader
                };
                if self.header.opcode() == Opcode::StreamFrame && self.accepts() {
                    self.pipeline.absorb(Pixel::from(word));
                }
            }
        }
    }

    fn accepts(&self) -> bool {
        let target = self.header.address();
        target == BROADCAST || self.address == BROADCAST || target == self.address
    }

    fn dispatch<H: HostHal>(&mut self, hal: &mut H) {
        if !self.accepts() {
            return;
        }
        match self.header.opcode() {
            Opcode::NoOp => {
                if self.header.raw() & !MAX_ADDRESS != Opcode::NoOp.code() {
                    debug!("ignoring unknown command {}", self.header.raw());
                }
            }
            Opcode::AssignAddress => {
                self.address = self.header.address();
                info!("assigned address {}", self.address);
                hal.set_chain_enable(self.address == BROADCAST);
            }
            Opcode::FlipFrame => self.pipeline.commit(hal),
            Opcode::SetBlanking => hal.set_blanking(self.data[0] != 0),
            Opcode::SetBrightness => {
                let requested = self.data[0];
                let level = clip_level(usize::from(requested));
                if u16::from(level) != requested {
                    warning!("brightness {} clipped to {}", requested, level);
                }
                hal.set_brightness_reference(level);
            }
            Opcode::FillFrame => self.pipeline.fill(Pixel::from(self.data[0])),
            // Pixels were absorbed as they arrived.
            Opcode::StreamFrame => {}
        }
    }
}

impl core::fmt::Debug for HostProtocol<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostProtocol")
            .field("state", &self.state)
            .field("header", &self.header)
            .field("address", &self.address)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
