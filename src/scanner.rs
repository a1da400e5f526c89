//! Timer-driven playback of the active frame.
//!
//! [`DriverScanner::tick`] runs from the driver timer compare interrupt.
//! Each tick sends one [`LineWord`](crate::LineWord) and arms the next
//! compare with that slice's interval. After the last slice of a line the
//! channel select lines move to the next physical line, and after the last
//! line of a cycle the scanner picks up a pending frame, if there is one.
//! A frame swap therefore never lands in the middle of a line cycle.

use crate::cursor::Countdown;
use crate::fmt::debug;
use crate::frame::{ActiveReader, Frame, Slot};
use crate::hal::DriverHal;
use crate::program::ProgramTable;
use crate::{LINES, PROGRAM_SIZE};

/// Plays the active frame onto the driver link.
pub struct DriverScanner<'a> {
    program: &'a ProgramTable,
    reader: ActiveReader<'a>,
    intervals: Countdown<PROGRAM_SIZE>,
    select: Countdown<LINES>,
}

impl<'a> DriverScanner<'a> {
    /// Creates a scanner reading from `reader`.
    ///
    /// The select lines are assumed to be at 0, so the first cycle is
    /// shortened to bring them round to the start of the line sequence.
    #[must_use]
    pub fn new(program: &'a ProgramTable, reader: ActiveReader<'a>) -> Self {
        Self {
            program,
            reader,
            intervals: Countdown::new(),
            select: Countdown::starting_at(program.line_zero_index()),
        }
    }

    /// Handles one timer compare.
    pub fn tick<H: DriverHal>(&mut self, hal: &mut H) {
        hal.driver_link_send(self.reader.next_word());
        hal.schedule_next_deadline(self.program.intervals()[self.intervals.take()]);
        if !self.intervals.is_exhausted() {
            return;
        }
        self.intervals.reset();

        hal.channel_select_toggle(self.program.channel_select()[self.select.take()]);
        if !self.select.is_exhausted() {
            return;
        }
        self.select.reset();

        if let Some(slot) = self.reader.adopt_pending() {
            debug!("frame {} active", slot.index());
        }
        self.reader.rewind();
    }

    /// The slot being scanned out.
    #[must_use]
    pub const fn active_slot(&self) -> Slot {
        self.reader.slot()
    }

    /// The frame being scanned out.
    #[must_use]
    pub fn active_frame(&self) -> &Frame {
        self.reader.frame()
    }
}

impl core::fmt::Debug for DriverScanner<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriverScanner")
            .field("reader", &self.reader)
            .field("intervals", &self.intervals)
            .field("select", &self.select)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::frame::{FrameStore, StageWriter};
    use crate::mock::RecordingDriver;
    use crate::{LineWord, FRAME_WORDS};

    static PROGRAM: ProgramTable = ProgramTable::new();

    const PARTIAL_LINES: usize = 4;

    fn publish_counting(writer: &mut StageWriter<'_>, offset: u16) {
        for i in 0..FRAME_WORDS {
            writer.push(LineWord(offset + i as u16));
        }
        writer.publish();
    }

    fn run(scanner: &mut DriverScanner<'_>, driver: &mut RecordingDriver, ticks: usize) {
        for _ in 0..ticks {
            scanner.tick(driver);
        }
    }

    #[test]
    fn test_first_line_timing() {
        let mut store = FrameStore::new();
        let (_writer, reader) = store.split();
        let mut scanner = DriverScanner::new(&PROGRAM, reader);
        let mut driver = RecordingDriver::default();

        run(&mut scanner, &mut driver, PROGRAM_SIZE - 1);
        assert!(driver.toggles.is_empty());
        scanner.tick(&mut driver);
        assert_eq!(driver.toggles, [PROGRAM.channel_select()[PARTIAL_LINES - 1]]);

        let expected: Vec<u16> = PROGRAM.intervals().iter().rev().copied().collect();
        assert_eq!(driver.deadlines, expected);
        assert_eq!(driver.words.len(), PROGRAM_SIZE);
    }

    #[test]
    fn test_partial_first_cycle_then_sequence() {
        let mut store = FrameStore::new();
        let (mut writer, reader) = store.split();
        publish_counting(&mut writer, 0);
        let mut scanner = DriverScanner::new(&PROGRAM, reader);
        let mut driver = RecordingDriver::default();

        run(&mut scanner, &mut driver, PARTIAL_LINES * PROGRAM_SIZE);
        assert!(driver.words.iter().all(|&w| w == LineWord::DARK));
        assert_eq!(driver.toggles, [1, 2, 5, 2]);
        let selects: Vec<u8> = driver.selects.iter().step_by(PROGRAM_SIZE).copied().collect();
        assert_eq!(selects, [0, 1, 3, 6]);
        assert_eq!(driver.select, ProgramTable::physical_line(0));
        assert_eq!(scanner.active_slot(), Slot::new(1));

        driver.clear();
        run(&mut scanner, &mut driver, FRAME_WORDS);
        let expected: Vec<LineWord> = (0..FRAME_WORDS).map(|i| LineWord(i as u16)).collect();
        assert_eq!(driver.words, expected);
        for line in 0..LINES {
            let during = &driver.selects[line * PROGRAM_SIZE..(line + 1) * PROGRAM_SIZE];
            assert!(
                during.iter().all(|&s| s == ProgramTable::physical_line(line)),
                "line {line}"
            );
        }
        assert_eq!(driver.select, ProgramTable::physical_line(0));
    }

    #[test]
    fn test_every_line_visited_once_per_cycle() {
        let mut store = FrameStore::new();
        let (_writer, reader) = store.split();
        let mut scanner = DriverScanner::new(&PROGRAM, reader);
        let mut driver = RecordingDriver::default();
        run(&mut scanner, &mut driver, PARTIAL_LINES * PROGRAM_SIZE);

        for _ in 0..3 {
            driver.clear();
            run(&mut scanner, &mut driver, FRAME_WORDS);
            let mut visited: Vec<u8> = driver.selects.iter().step_by(PROGRAM_SIZE).copied().collect();
            visited.sort_unstable();
            assert_eq!(visited, (0..LINES as u8).collect::<Vec<_>>());
            assert_eq!(driver.toggles.len(), LINES);
        }
    }

    #[test]
    fn test_swap_deferred_to_cycle_boundary() {
        let mut store = FrameStore::new();
        let (mut writer, reader) = store.split();
        let mut scanner = DriverScanner::new(&PROGRAM, reader);
        let mut driver = RecordingDriver::default();
        run(&mut scanner, &mut driver, PARTIAL_LINES * PROGRAM_SIZE);
        assert_eq!(scanner.active_slot(), Slot::new(0));

        let mid = 3 * PROGRAM_SIZE + 10;
        run(&mut scanner, &mut driver, mid);
        publish_counting(&mut writer, 1);

        driver.clear();
        run(&mut scanner, &mut driver, FRAME_WORDS - mid - 1);
        assert_eq!(scanner.active_slot(), Slot::new(0));
        scanner.tick(&mut driver);
        assert_eq!(scanner.active_slot(), Slot::new(1));
        assert!(driver.words.iter().all(|&w| w == LineWord::DARK));

        driver.clear();
        scanner.tick(&mut driver);
        assert_eq!(driver.words, [LineWord(1)]);
    }

    #[test]
    fn test_newest_pending_frame_wins() {
        let mut store = FrameStore::new();
        let (mut writer, reader) = store.split();
        let mut scanner = DriverScanner::new(&PROGRAM, reader);
        let mut driver = RecordingDriver::default();

        publish_counting(&mut writer, 100);
        publish_counting(&mut writer, 200);
        run(&mut scanner, &mut driver, PARTIAL_LINES * PROGRAM_SIZE);
        assert_eq!(scanner.active_slot(), Slot::new(2));
        assert_eq!(scanner.active_frame()[LINES - 1][PROGRAM_SIZE - 1], LineWord(200));
        assert!(!writer.is_blocked());
    }
}
