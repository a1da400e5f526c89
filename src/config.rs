//! Board timing and pin configuration used by HAL bring-up code.

use crate::program::SELECT_LINES;
use crate::BITS;

/// Host link serial clock in Hz.
pub const HOST_SPI_CLK: u32 = 4_000_000;

/// Driver link serial clock in Hz.
pub const DRIVER_SPI_CLK: u32 = 12_000_000;

/// Driver timer tick rate in Hz. Program intervals count these ticks.
pub const DRIVER_LINE_CLK: u32 = 600_000;

/// Ticks after which the driver timer resets itself if a compare is ever
/// missed. Longer than any single slice.
pub const DRIVER_TIMER_SAFEGUARD: u32 = (1 << (BITS - 1)) * 2;

/// Compare value the driver timer starts with before the first tick.
pub const DRIVER_TIMER_FIRST_MATCH: u32 = 1;

/// Interrupt priority of the driver timer. Lower is more urgent.
pub const PRIORITY_DRIVER_TIMER: u8 = 0;

/// Interrupt priority of the host link receive handler.
pub const PRIORITY_HOST_LINK: u8 = 3;

/// GPIO pin of each channel select line. All three share one port.
pub const CSEL_PINS: [u8; SELECT_LINES] = [22, 8, 7];

const _: () = assert!(PRIORITY_DRIVER_TIMER < PRIORITY_HOST_LINK);

/// Maps a channel select toggle mask to a port mask for [`CSEL_PINS`].
#[must_use]
pub const fn select_port_mask(mask: u8) -> u32 {
    let mut port = 0;
    let mut line = 0;
    while line < SELECT_LINES {
        if mask & (1 << line) != 0 {
            port |= 1 << CSEL_PINS[line];
        }
        line += 1;
    }
    port
}

/// Driver timer prescaler for a given core clock.
#[must_use]
pub const fn driver_timer_prescale(core_clock: u32) -> u32 {
    core_clock / DRIVER_LINE_CLK / 2 - 1
}
