//! Incremental decomposition of received pixels into line words.
//!
//! Pixels arrive one host word at a time. Each call to
//! [`PixelPipeline::absorb`] gamma-corrects one pixel into the line being
//! filled and then does a bounded slice of work on the *previous* line:
//!
//! - The pixel that completes a line computes that line's first program
//!   entry and makes the line the one being decomposed.
//! - Every other pixel applies up to [`PROGRAM_STEP`] transitions to the
//!   line being decomposed, each producing one more [`LineWord`].
//!
//! A line's [`PROGRAM_SIZE`] words are therefore spread over the `WIDTH`
//! pixels of the next line, and no single call does more than
//! `PROGRAM_STEP` transitions.

use crate::fmt::debug;
use crate::frame::{Slot, StageWriter};
use crate::gamma::GammaPixel;
use crate::hal::HostHal;
use crate::program::{ProgramTable, Transition};
use crate::{
    LineWord, Pixel, CHANNELS, LANES, LINES, PROGRAM_SIZE, PROGRAM_STEP, SRC_BUFFERS, WIDTH,
};

type SourceLine = [GammaPixel; WIDTH];

const DARK_LINE: SourceLine = [GammaPixel(u32::MAX); WIDTH];

fn lane_lit(line: &SourceLine, lane: usize, bit: usize) -> bool {
    line[lane / CHANNELS].is_lit(lane % CHANNELS, bit)
}

fn first_entry(line: &SourceLine) -> LineWord {
    (0..LANES).fold(LineWord::DARK, |word, lane| {
        word.with_lane(lane, lane_lit(line, lane, ProgramTable::initial_bit(lane)))
    })
}

fn apply(word: LineWord, transition: Transition, line: &SourceLine) -> LineWord {
    let bit = usize::from(transition.bit);
    transition
        .lanes()
        .fold(word, |word, lane| word.with_lane(lane, lane_lit(line, lane, bit)))
}

/// Turns a stream of pixels into the stage frame.
pub struct PixelPipeline<'a> {
    program: &'a ProgramTable,
    stage: StageWriter<'a>,
    source: [SourceLine; SRC_BUFFERS],
    incoming: usize,
    column: usize,
    decomposing: usize,
    progress: usize,
    last: LineWord,
}

impl<'a> PixelPipeline<'a> {
    /// Creates a pipeline writing into `stage`.
    #[must_use]
    pub fn new(program: &'a ProgramTable, stage: StageWriter<'a>) -> Self {
        let mut pipeline = Self {
            program,
            stage,
            source: [DARK_LINE; SRC_BUFFERS],
            incoming: 0,
            column: 0,
            decomposing: 0,
            progress: 0,
            last: LineWord::DARK,
        };
        pipeline.reset_source();
        pipeline
    }

    fn reset_source(&mut self) {
        self.incoming = SRC_BUFFERS - 1;
        self.decomposing = SRC_BUFFERS - 1;
        self.column = 0;
        self.progress = PROGRAM_SIZE - 1;
    }

    /// The slot currently being filled.
    #[must_use]
    pub const fn stage_slot(&self) -> Slot {
        self.stage.slot()
    }

    /// Program entries already produced for the line being decomposed,
    /// not counting its first entry.
    #[must_use]
    pub const fn progress(&self) -> usize {
        self.progress
    }

    /// Absorbs one pixel.
    pub fn absorb(&mut self, pixel: Pixel) {
        self.source[self.incoming][self.column] = GammaPixel::correct(pixel);
        self.column += 1;

        if self.column == WIDTH {
            self.column = 0;
            self.decomposing = self.incoming;
            self.incoming = (self.incoming + 1) % SRC_BUFFERS;
            self.progress = 0;
            self.last = first_entry(&self.source[self.decomposing]);
            self.stage.push(self.last);
            return;
        }

        let steps = (PROGRAM_SIZE - 1 - self.progress).min(PROGRAM_STEP);
        let line = &self.source[self.decomposing];
        let transitions = &self.program.transitions()[self.progress..self.progress + steps];
        for &transition in transitions {
            self.last = apply(self.last, transition, line);
            self.stage.push(self.last);
        }
        self.progress += steps;
    }

    /// Fills the whole frame with one pixel value.
    pub fn fill(&mut self, pixel: Pixel) {
        for _ in 0..LINES * WIDTH {
            self.absorb(pixel);
        }
    }

    /// Finishes the stage frame and hands it to the scanner.
    ///
    /// Blocks in [`HostHal::sleep_until_interrupt`] until the next stage slot
    /// is no longer being scanned out.
    pub fn commit<H: HostHal>(&mut self, hal: &mut H) {
        for _ in 1..WIDTH {
            self.absorb(Pixel::BLACK);
        }
        let committed = self.stage.slot();
        self.stage.publish();
        self.reset_source();
        debug!(
            "frame {} committed, staging {}",
            committed.index(),
            self.stage.slot().index()
        );

        while self.stage.is_blocked() {
            hal.sleep_until_interrupt();
        }
    }
}

impl core::fmt::Debug for PixelPipeline<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelPipeline")
            .field("stage", &self.stage)
            .field("incoming", &self.incoming)
            .field("column", &self.column)
            .field("decomposing", &self.decomposing)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::frame::{playback, Frame, FrameStore};
    use crate::mock::{HostEvent, RecordingHost};
    use crate::BITS;

    static PROGRAM: ProgramTable = ProgramTable::new();

    /// Program entries for one line, straight from the gamma curve and
    /// the program table.
    fn reference_line(pixels: &[Pixel; WIDTH]) -> Vec<LineWord> {
        let lit = |lane: usize, bit: usize| {
            let pixel = pixels[lane / 2];
            let value = if lane % 2 == 0 {
                pixel.channel_a()
            } else {
                pixel.channel_b()
            };
            bit < BITS && crate::gamma::threshold(value) & (1 << bit) != 0
        };
        let mut bits: Vec<usize> = (0..LANES).map(|lane| (LANES - 1 - lane) % BITS).collect();
        let word = |bits: &[usize]| {
            let mut raw = 0u16;
            for (lane, &bit) in bits.iter().enumerate() {
                if lit(lane, bit) {
                    raw |= 1 << lane;
                }
            }
            LineWord(raw)
        };
        let mut out = std::vec![word(bits.as_slice())];
        for t in PROGRAM.transitions() {
            for lane in 0..LANES {
                if lane <= usize::from(t.position)
                    && (usize::from(t.position) - lane) % BITS == 0
                {
                    bits[lane] = usize::from(t.bit);
                }
            }
            out.push(word(bits.as_slice()));
        }
        out
    }

    fn committed_frame(feed: impl FnOnce(&mut PixelPipeline<'_>)) -> Frame {
        let mut store = FrameStore::new();
        let (writer, mut reader) = store.split();
        let mut pipeline = PixelPipeline::new(&PROGRAM, writer);
        feed(&mut pipeline);
        let mut hal = RecordingHost::default();
        pipeline.commit(&mut hal);
        assert!(hal.events.is_empty());
        assert!(reader.adopt_pending().is_some());
        *reader.frame()
    }

    #[test]
    fn test_mid_gray_line() {
        let frame = committed_frame(|p| {
            for _ in 0..LINES * WIDTH {
                p.absorb(Pixel::from(0x8080));
            }
        });
        let words: Vec<LineWord> = playback(&frame, 0).collect();
        assert_eq!(words[0], LineWord(0x4120));
        assert_eq!(words[1], LineWord(0xc160));
        assert_eq!(words[2], LineWord(0x8140));
        assert_eq!(words[3], LineWord(0x0100));
        assert_eq!(words[PROGRAM_SIZE - 1], LineWord::DARK);
        assert_eq!(words, reference_line(&[Pixel::from(0x8080); WIDTH]));
        for line in 1..LINES {
            assert!(playback(&frame, line).eq(playback(&frame, 0)), "line {line}");
        }
    }

    #[test]
    fn test_white_line() {
        let frame = committed_frame(|p| p.fill(Pixel::from(0xffff)));
        let words: Vec<LineWord> = playback(&frame, 3).collect();
        assert_eq!(words[0], LineWord(0xffff));
        assert_eq!(words[crate::program::MODULATION_STEPS], LineWord(0xffff));
        assert_eq!(words[PROGRAM_SIZE - 1], LineWord::DARK);
    }

    #[test]
    fn test_black_frame_is_dark() {
        let frame = committed_frame(|p| p.fill(Pixel::BLACK));
        assert!(frame.iter().flatten().all(|&w| w == LineWord::DARK));
    }

    #[test]
    fn test_fill_matches_streaming() {
        for raw in [0x0000u16, 0x0102, 0x8080, 0x40c0, 0xffff] {
            let filled = committed_frame(|p| p.fill(Pixel::from(raw)));
            let streamed = committed_frame(|p| {
                for _ in 0..LINES * WIDTH {
                    p.absorb(Pixel::from(raw));
                }
            });
            assert_eq!(filled, streamed, "pixel {raw:#06x}");
        }
    }

    #[test]
    fn test_distinct_lines() {
        let pixel_at = |line: usize, column: usize| {
            Pixel::new((line * 32 + column * 4) as u8, (255 - line * 30 - column) as u8)
        };
        let frame = committed_frame(|p| {
            for line in 0..LINES {
                for column in 0..WIDTH {
                    p.absorb(pixel_at(line, column));
                }
            }
        });
        for line in 0..LINES {
            let pixels: [Pixel; WIDTH] = core::array::from_fn(|column| pixel_at(line, column));
            let words: Vec<LineWord> = playback(&frame, line).collect();
            assert_eq!(words, reference_line(&pixels), "line {line}");
        }
    }

    #[test]
    fn test_work_is_bounded() {
        let mut store = FrameStore::new();
        let (writer, _reader) = store.split();
        let mut pipeline = PixelPipeline::new(&PROGRAM, writer);
        for _ in 0..WIDTH - 1 {
            pipeline.absorb(Pixel::from(0x1234));
            assert_eq!(pipeline.progress(), PROGRAM_SIZE - 1);
        }
        pipeline.absorb(Pixel::from(0x1234));
        assert_eq!(pipeline.progress(), 0);
        let mut previous = 0;
        for _ in 0..WIDTH - 1 {
            pipeline.absorb(Pixel::from(0x1234));
            assert!(pipeline.progress() - previous <= PROGRAM_STEP);
            previous = pipeline.progress();
        }
        assert_eq!(pipeline.progress(), PROGRAM_SIZE - 1);
    }

    #[test]
    fn test_commit_advances_stage() {
        let mut store = FrameStore::new();
        let (writer, mut reader) = store.split();
        let mut pipeline = PixelPipeline::new(&PROGRAM, writer);
        assert_eq!(pipeline.stage_slot(), Slot::new(1));
        let mut hal = RecordingHost::default();
        pipeline.commit(&mut hal);
        assert_eq!(pipeline.stage_slot(), Slot::new(2));
        assert_eq!(pipeline.progress(), PROGRAM_SIZE - 1);
        assert!(hal.events.is_empty());
        assert_eq!(reader.adopt_pending(), Some(Slot::new(1)));
    }

    #[test]
    fn test_commit_sleeps_while_stage_is_active() {
        let mut store = FrameStore::new();
        let (writer, _reader) = store.split();
        let mut pipeline = PixelPipeline::new(&PROGRAM, writer);
        let mut hal = RecordingHost::default();
        pipeline.commit(&mut hal);
        assert!(hal.events.is_empty());

        // Nothing adopts, so the second commit would wait forever; the
        // recording HAL gives up after a few sleeps.
        hal.sleep_limit = Some(3);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pipeline.commit(&mut hal);
        }));
        assert!(result.is_err());
        assert_eq!(hal.events, [HostEvent::Sleep; 3]);
    }
}
