//! Per-snapshot mode bookkeeping: `ModeState` records in a fixed arena.
//!
//! A snapshot is a plain value.  Copying the host state copies the arena
//! with it, and that copy is the "old" side of every old/new comparison the
//! propagation pass makes.  Nothing in here points anywhere else.

use cadence_core::{Millis, SlotId};

/// Number of `ModeState` slots in every snapshot.
pub const MODE_CAPACITY: usize = 32;

// ── ModeState ─────────────────────────────────────────────────────────────────

/// Runtime record for one mode in one snapshot.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeState {
    /// Frame at which the mode activated; 0 while inactive.  Because every
    /// frame id is distinct, this doubles as an invocation token.
    pub start_frame:             u32,
    pub start_millis:            Millis,
    /// When the mode last deactivated.
    pub end_millis:              Option<Millis>,
    /// Last periodic or delayed trigger.  `None` means "fire as soon as the
    /// mode is active".
    pub last_trigger:            Option<Millis>,
    /// Set while the mode's action runs; cleared only by completion or
    /// forced termination.
    pub invocation_active:       bool,
    /// Activations since the last reset, compared against the repeat limit.
    pub invocation_count:        u8,
    /// Children newly inspired during the current activation.
    pub child_inspiration_count: u8,
}

impl ModeState {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.start_frame != 0
    }
}

// ── ModeArena ─────────────────────────────────────────────────────────────────

/// Fixed-capacity array of `ModeState` plus the frame counter and the clock
/// reading of the current frame.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeArena {
    frame:     u32,
    millis:    Millis,
    allocated: u8,
    states:    [ModeState; MODE_CAPACITY],
}

impl Default for ModeArena {
    fn default() -> Self {
        Self {
            frame:     1,
            millis:    Millis::ZERO,
            allocated: 0,
            states:    [ModeState::default(); MODE_CAPACITY],
        }
    }
}

impl ModeArena {
    /// Current frame id.  Never 0.
    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    #[inline]
    pub fn millis(&self) -> Millis {
        self.millis
    }

    #[inline]
    pub fn set_millis(&mut self, millis: Millis) {
        self.millis = millis;
    }

    /// Start a new frame at `millis`.
    pub fn new_frame(&mut self, millis: Millis) {
        self.frame = self.frame.wrapping_add(1);
        if self.frame == 0 {
            self.frame = 1;
        }
        self.millis = millis;
    }

    /// Forget every slot and restart the frame counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated as usize
    }

    /// Hand out the next free slot.
    ///
    /// # Panics
    /// Panics when all `MODE_CAPACITY` slots are taken.  This happens at
    /// attach time, i.e. at boot, and means the tree is too large for the
    /// arena.
    pub fn allocate(&mut self) -> SlotId {
        assert!(
            self.allocated() < MODE_CAPACITY,
            "mode arena exhausted: all {MODE_CAPACITY} slots are attached"
        );
        let slot = SlotId(self.allocated);
        self.allocated += 1;
        slot
    }

    #[inline]
    pub fn get(&self, slot: SlotId) -> &ModeState {
        &self.states[slot.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: SlotId) -> &mut ModeState {
        &mut self.states[slot.index()]
    }

    /// The allocated slots in slot order.
    pub fn states(&self) -> &[ModeState] {
        &self.states[..self.allocated()]
    }
}
