//! Hardware seams.
//!
//! The engine never touches peripherals directly. Board support code
//! implements these two traits, one per interrupt context, and passes them
//! into [`HostProtocol::receive`](crate::protocol::HostProtocol::receive) and
//! [`DriverScanner::tick`](crate::scanner::DriverScanner::tick).
//!
//! All methods are infallible: a peripheral that can fail must deal with it
//! on its own side of the seam.

use crate::LineWord;

/// Outputs driven from the host link receive handler.
pub trait HostHal {
    /// Enables the pass-through of the host link to the next panel in the
    /// chain.
    fn set_chain_enable(&mut self, enabled: bool);

    /// Suppresses (`true`) or restores (`false`) every driver output.
    fn set_blanking(&mut self, blanked: bool);

    /// Trims the driver current reference. `level` is already clipped to
    /// `IREF_LEVELS - 1`; see [`IrefSetting`](crate::iref::IrefSetting).
    fn set_brightness_reference(&mut self, level: u8);

    /// Sleeps until the next interrupt. Used while a committed frame waits
    /// for the scanner.
    fn sleep_until_interrupt(&mut self);
}

/// Outputs driven from the driver timer handler.
pub trait DriverHal {
    /// Sends one word to the driver chips.
    fn driver_link_send(&mut self, word: LineWord);

    /// Toggles the channel select outputs set in `mask`. Bit `n` is select
    /// line `n`.
    fn channel_select_toggle(&mut self, mask: u8);

    /// Arms the next timer compare. The compare fires `interval + 1` ticks
    /// of the driver line clock after the current one.
    fn schedule_next_deadline(&mut self, interval: u16);
}

impl<T: HostHal + ?Sized> HostHal for &mut T {
    fn set_chain_enable(&mut self, enabled: bool) {
        (**self).set_chain_enable(enabled);
    }

    fn set_blanking(&mut self, blanked: bool) {
        (**self).set_blanking(blanked);
    }

    fn set_brightness_reference(&mut self, level: u8) {
        (**self).set_brightness_reference(level);
    }

    fn sleep_until_interrupt(&mut self) {
        (**self).sleep_until_interrupt();
    }
}

impl<T: DriverHal + ?Sized> DriverHal for &mut T {
    fn driver_link_send(&mut self, word: LineWord) {
        (**self).driver_link_send(word);
    }

    fn channel_select_toggle(&mut self, mask: u8) {
        (**self).channel_select_toggle(mask);
    }

    fn schedule_next_deadline(&mut self, interval: u16) {
        (**self).schedule_next_deadline(interval);
    }
}
