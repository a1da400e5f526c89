//! Driver current reference levels.
//!
//! The driver chips' output current is set by a resistor ladder on seven
//! `VREF` pins. Each pin is either driven (output, high or low) or left
//! floating (input), giving [`IREF_LEVELS`] usable steps from dimmest to
//! brightest. A [`HostHal`](crate::hal::HostHal) implementation applies the
//! masks from [`IrefSetting::for_level`].

/// Number of `VREF` pins.
pub const VREF_PINS: usize = 7;

/// Number of brightness levels.
pub const IREF_LEVELS: usize = IREF_DIR.len();

/// Direction mask per level. Bit `n` set drives `VREF` pin `n` as an output.
const IREF_DIR: [u8; 32] = [
    0b1111_1111,
    0b1000_1111,
    0b1000_0111,
    0b1000_0011,
    0b1111_1111,
    0b1000_0001,
    0b1101_1111,
    0b1000_0000,
    0b1100_1111,
    0b1100_0111,
    0b1100_0011,
    0b1100_0001,
    0b1111_1111,
    0b1100_0000,
    0b1110_1111,
    0b1110_0111,
    0b1110_0011,
    0b1110_0001,
    0b1110_0000,
    0b1111_1111,
    0b1111_0111,
    0b1111_0011,
    0b1111_0001,
    0b1111_0000,
    0b1111_1111,
    0b1111_1011,
    0b1111_1001,
    0b1111_1000,
    0b1111_1111,
    0b1111_1101,
    0b1111_1100,
    0b1111_1111,
];

/// Output level mask per level. Bit `n` set drives `VREF` pin `n` high.
const IREF_OUT: [u8; 32] = [
    0b1000_0000,
    0b1000_0000,
    0b1000_0000,
    0b1000_0000,
    0b1100_0000,
    0b1000_0000,
    0b1100_0000,
    0b1000_0000,
    0b1100_0000,
    0b1100_0000,
    0b1100_0000,
    0b1100_0000,
    0b1110_0000,
    0b1100_0000,
    0b1110_0000,
    0b1110_0000,
    0b1110_0000,
    0b1110_0000,
    0b1110_0000,
    0b1111_0000,
    0b1111_0000,
    0b1111_0000,
    0b1111_0000,
    0b1111_0000,
    0b1111_1000,
    0b1111_1000,
    0b1111_1000,
    0b1111_1000,
    0b1111_1100,
    0b1111_1100,
    0b1111_1100,
    0b1111_1110,
];

/// Pin masks for one brightness level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrefSetting {
    /// Bit `n` set: `VREF` pin `n` is an output.
    pub direction: u8,
    /// Bit `n` set: `VREF` pin `n` is driven high when it is an output.
    pub output: u8,
}

impl IrefSetting {
    /// Looks up `level`, clipping it to the brightest level.
    #[must_use]
    pub const fn for_level(level: usize) -> Self {
        let level = clip_level(level);
        Self {
            direction: IREF_DIR[level as usize],
            output: IREF_OUT[level as usize],
        }
    }

    /// Whether `VREF` pin `pin` is an output.
    #[must_use]
    pub const fn is_output(self, pin: usize) -> bool {
        self.direction & (1 << pin) != 0
    }

    /// Whether `VREF` pin `pin` is driven high.
    #[must_use]
    pub const fn is_high(self, pin: usize) -> bool {
        self.output & (1 << pin) != 0
    }
}

/// Clips a requested brightness level to the table.
#[must_use]
pub const fn clip_level(level: usize) -> u8 {
    if level >= IREF_LEVELS {
        (IREF_LEVELS - 1) as u8
    } else {
        level as u8
    }
}
