//! Recording HAL doubles shared by the unit tests.

extern crate std;

use std::vec::Vec;

use crate::hal::{DriverHal, HostHal};
use crate::scanner::DriverScanner;
use crate::LineWord;

/// Everything a [`DriverHal`] was asked to do.
#[derive(Default, Debug)]
pub(crate) struct RecordingDriver {
    pub words: Vec<LineWord>,
    pub deadlines: Vec<u16>,
    pub toggles: Vec<u8>,
    /// Select line state each word was sent under.
    pub selects: Vec<u8>,
    /// Current select line state. Starts at 0 like the pins out of reset.
    pub select: u8,
}

impl RecordingDriver {
    pub fn clear(&mut self) {
        self.words.clear();
        self.deadlines.clear();
        self.toggles.clear();
        self.selects.clear();
    }
}

impl DriverHal for RecordingDriver {
    fn driver_link_send(&mut self, word: LineWord) {
        self.words.push(word);
        self.selects.push(self.select);
    }

    fn channel_select_toggle(&mut self, mask: u8) {
        self.toggles.push(mask);
        self.select ^= mask;
    }

    fn schedule_next_deadline(&mut self, interval: u16) {
        self.deadlines.push(interval);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum HostEvent {
    ChainEnable(bool),
    Blanking(bool),
    Brightness(u8),
    Sleep,
}

/// Records host-side outputs. Sleeping panics after `sleep_limit` sleeps
/// so a commit that can never finish fails the test instead of hanging.
#[derive(Default, Debug)]
pub(crate) struct RecordingHost {
    pub events: Vec<HostEvent>,
    pub sleep_limit: Option<usize>,
}

impl HostHal for RecordingHost {
    fn set_chain_enable(&mut self, enabled: bool) {
        self.events.push(HostEvent::ChainEnable(enabled));
    }

    fn set_blanking(&mut self, blanked: bool) {
        self.events.push(HostEvent::Blanking(blanked));
    }

    fn set_brightness_reference(&mut self, level: u8) {
        self.events.push(HostEvent::Brightness(level));
    }

    fn sleep_until_interrupt(&mut self) {
        self.events.push(HostEvent::Sleep);
        let sleeps = self.events.iter().filter(|&&e| e == HostEvent::Sleep).count();
        assert!(
            sleeps < self.sleep_limit.unwrap_or(usize::MAX),
            "slept {sleeps} times"
        );
    }
}

/// A host HAL whose sleep is woken by one driver timer tick, standing in
/// for the higher priority scanner interrupt.
pub(crate) struct ScanningHost<'s, 'a> {
    pub host: RecordingHost,
    pub driver: RecordingDriver,
    pub scanner: &'s mut DriverScanner<'a>,
}

impl<'s, 'a> ScanningHost<'s, 'a> {
    pub fn new(scanner: &'s mut DriverScanner<'a>) -> Self {
        Self {
            host: RecordingHost::default(),
            driver: RecordingDriver::default(),
            scanner,
        }
    }

    pub fn tick(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.scanner.tick(&mut self.driver);
        }
    }
}

impl HostHal for ScanningHost<'_, '_> {
    fn set_chain_enable(&mut self, enabled: bool) {
        self.host.set_chain_enable(enabled);
    }

    fn set_blanking(&mut self, blanked: bool) {
        self.host.set_blanking(blanked);
    }

    fn set_brightness_reference(&mut self, level: u8) {
        self.host.set_brightness_reference(level);
    }

    fn sleep_until_interrupt(&mut self) {
        self.host.sleep_until_interrupt();
        self.scanner.tick(&mut self.driver);
    }
}
