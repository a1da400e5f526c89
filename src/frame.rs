//! Triple-buffered frame storage and the active/stage handoff.
//!
//! [`FrameStore`] owns [`BUFFERS`] frames. At any time one [`Slot`] is
//! *active* (read by the scanner), one is *stage* (written by the pipeline)
//! and the third is spare. Roles move by index; frames are never copied.
//!
//! The store is split into a [`StageWriter`] for the host side and an
//! [`ActiveReader`] for the scanner side. The only state both halves touch
//! is the [`SwapState`], kept behind a [`critical_section::Mutex`] so the
//! pending slot and the active slot always change together.
//!
//! Words are written back to front: the first word pushed for a frame lands
//! at the last index and the scanner plays the frame from the last index
//! down, so production order matches playback order.

use core::cell::{Cell, UnsafeCell};

use critical_section::Mutex;

use crate::cursor::Countdown;
use crate::{LineWord, BUFFERS, FRAME_WORDS, LINES, PROGRAM_SIZE};

/// One frame: `LINES` lines of `PROGRAM_SIZE` words, in storage order.
///
/// Frame line `n` is stored in `frame[LINES - 1 - n]`, with its program
/// entry `k` at index `PROGRAM_SIZE - 1 - k`. Use [`playback`] to walk a
/// line in display order.
pub type Frame = [[LineWord; PROGRAM_SIZE]; LINES];

/// Words of frame line `line` in the order they are shown.
///
/// # Panics
///
/// Panics if `line >= LINES`.
pub fn playback(frame: &Frame, line: usize) -> impl Iterator<Item = LineWord> + '_ {
    frame[LINES - 1 - line].iter().rev().copied()
}

/// Index of a frame within the ring.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot(u8);

impl Slot {
    /// Creates a slot, wrapping `index` into the ring.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self((index % BUFFERS) as u8)
    }

    /// The next slot around the ring.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::new(self.0 as usize + 1)
    }

    /// Position in the ring.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// State shared by both halves of a split [`FrameStore`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwapState {
    /// Slot being scanned out.
    pub active: Slot,
    /// Committed slot waiting to become active at the next cycle boundary.
    pub pending: Option<Slot>,
}

impl SwapState {
    const INITIAL: Self = Self {
        active: Slot::new(0),
        pending: None,
    };
}

/// Storage for every frame in the ring.
///
/// ```rust
/// use bcm_matrix::frame::FrameStore;
///
/// let mut store = FrameStore::new();
/// let (writer, reader) = store.split();
/// assert_ne!(writer.slot(), reader.slot());
/// ```
pub struct FrameStore {
    frames: UnsafeCell<[Frame; BUFFERS]>,
    swap: Mutex<Cell<SwapState>>,
}

// SAFETY: the frames are only reachable through `StageWriter` and
// `ActiveReader`, and `split` hands out exactly one of each. The reader only
// touches the active slot. The writer only touches its stage slot, and only
// after checking under the critical section that it is not the active slot.
// Once that holds it keeps holding until the next `publish`: the active slot
// only moves to the pending slot, and the pending slot is never the stage
// slot.
unsafe impl Sync for FrameStore {}

impl FrameStore {
    /// Creates a store with every frame dark, slot 0 active and slot 1 stage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: UnsafeCell::new([[[LineWord::DARK; PROGRAM_SIZE]; LINES]; BUFFERS]),
            swap: Mutex::new(Cell::new(SwapState::INITIAL)),
        }
    }

    /// Splits the store into its host-side writer and scanner-side reader.
    pub fn split(&mut self) -> (StageWriter<'_>, ActiveReader<'_>) {
        self.swap = Mutex::new(Cell::new(SwapState::INITIAL));
        let store: &Self = self;
        (
            StageWriter {
                store,
                slot: SwapState::INITIAL.active.next(),
                cursor: Countdown::new(),
                blocked: false,
            },
            ActiveReader {
                store,
                slot: SwapState::INITIAL.active,
                cursor: Countdown::new(),
            },
        )
    }

    fn swap_state(&self) -> SwapState {
        critical_section::with(|cs| self.swap.borrow(cs).get())
    }

    fn word_ptr(&self, slot: Slot, index: usize) -> *mut LineWord {
        debug_assert!(index < FRAME_WORDS);
        // SAFETY: `Frame` is a contiguous array of `FRAME_WORDS` words and
        // `slot` and `index` are both in range.
        unsafe {
            self.frames
                .get()
                .cast::<LineWord>()
                .add(slot.index() * FRAME_WORDS + index)
        }
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameStore")
            .field("size", &core::mem::size_of::<[Frame; BUFFERS]>())
            .field("frame_count", &BUFFERS)
            .field("frame_size", &core::mem::size_of::<Frame>())
            .field("swap", &self.swap_state())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameStore {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "FrameStore size: {} frame_size: {} swap: {}",
            core::mem::size_of::<[Frame; BUFFERS]>(),
            core::mem::size_of::<Frame>(),
            self.swap_state()
        );
    }
}

/// Host-side half of a [`FrameStore`]: fills the stage frame.
pub struct StageWriter<'a> {
    store: &'a FrameStore,
    slot: Slot,
    cursor: Countdown<FRAME_WORDS>,
    blocked: bool,
}

impl StageWriter<'_> {
    /// The slot being written.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Writes the next word of the stage frame, moving back to front and
    /// wrapping after `FRAME_WORDS` words.
    ///
    /// Returns `false`, and writes nothing, while the stage slot is still
    /// being scanned out (see [`is_blocked`](Self::is_blocked)).
    #[inline]
    pub fn push(&mut self, word: LineWord) -> bool {
        if self.blocked {
            self.blocked = self.is_blocked();
            if self.blocked {
                return false;
            }
        }
        let ptr = self.store.word_ptr(self.slot, self.cursor.take());
        // SAFETY: the stage slot is not the active slot and cannot become it
        // before the next `publish`, so the reader never looks at this word.
        unsafe { ptr.write(word) };
        true
    }

    /// Hands the stage frame to the scanner and moves on to the next slot.
    ///
    /// The previous pending frame, if the scanner has not adopted it yet, is
    /// dropped in favour of this one. If the next slot is still active,
    /// [`push`](Self::push) writes nothing until the scanner moves off it.
    pub fn publish(&mut self) {
        let committed = self.slot;
        let next = committed.next();
        self.blocked = critical_section::with(|cs| {
            let swap = self.store.swap.borrow(cs);
            let mut state = swap.get();
            state.pending = Some(committed);
            swap.set(state);
            state.active == next
        });
        self.slot = next;
        self.cursor.reset();
    }

    /// Whether the current stage slot is still being scanned out.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.store.swap_state().active == self.slot
    }
}

impl core::fmt::Debug for StageWriter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StageWriter")
            .field("slot", &self.slot)
            .field("cursor", &self.cursor)
            .field("blocked", &self.blocked)
            .finish_non_exhaustive()
    }
}

/// Scanner-side half of a [`FrameStore`]: plays back the active frame.
pub struct ActiveReader<'a> {
    store: &'a FrameStore,
    slot: Slot,
    cursor: Countdown<FRAME_WORDS>,
}

impl ActiveReader<'_> {
    /// The slot being read.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Reads the next word of the active frame, moving back to front and
    /// wrapping after `FRAME_WORDS` words.
    #[inline]
    pub fn next_word(&mut self) -> LineWord {
        let ptr = self.store.word_ptr(self.slot, self.cursor.take());
        // SAFETY: the writer never writes the active slot.
        unsafe { ptr.read() }
    }

    /// Moves the read position back to the start of the frame.
    pub fn rewind(&mut self) {
        self.cursor.reset();
    }

    /// Adopts the pending frame, if any, as the active frame.
    ///
    /// Returns the newly active slot.
    pub fn adopt_pending(&mut self) -> Option<Slot> {
        let adopted = critical_section::with(|cs| {
            let swap = self.store.swap.borrow(cs);
            let mut state = swap.get();
            let pending = state.pending.take()?;
            state.active = pending;
            swap.set(state);
            Some(pending)
        });
        if let Some(slot) = adopted {
            self.slot = slot;
        }
        adopted
    }

    /// The whole active frame.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        // SAFETY: the active slot cannot change while `self` is borrowed and
        // the writer never writes the active slot.
        unsafe { &*self.store.word_ptr(self.slot, 0).cast::<Frame>() }
    }
}

impl core::fmt::Debug for ActiveReader<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveReader")
            .field("slot", &self.slot)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
