//! Per-node runtime bookkeeping that is not part of any snapshot.
//!
//! A `ModeTree` is immutable, and `ModeState` is copied with every
//! snapshot.  What remains is owned once by the context: which arena slot
//! a mode occupies, how many parents reach it, the per-frame supportive
//! parent countdown, and the un-triggered wait clock used by persistence.

use cadence_core::{Millis, ModeId, SlotId};

/// Cumulative time a persisted mode has waited since its last trigger.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct WaitAccount {
    /// Seconds credited at earlier checkpoints (and loaded at boot).
    pub cumulative_secs: u32,
    /// Start of the interval not yet credited.
    pub since:           Millis,
}

impl WaitAccount {
    /// Credit the whole seconds elapsed since the last credit.
    pub fn credit(&mut self, now: Millis) -> u32 {
        let secs = now.since(self.since) / 1_000;
        self.cumulative_secs = self.cumulative_secs.saturating_add(secs);
        self.since = self.since.after(secs * 1_000);
        self.cumulative_secs
    }

    pub fn restart(&mut self, now: Millis) {
        self.cumulative_secs = 0;
        self.since = now;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Attachment {
    pub slot:         Option<SlotId>,
    /// Number of parent links through which the mode was attached.
    pub parents:      u8,
    supportive_frame: u32,
    supportive:       u8,
    pub wait:         Option<WaitAccount>,
}

impl Attachment {
    /// A fresh attachment in `slot`, reached through one parent so far.
    pub fn attached(slot: SlotId) -> Self {
        Self { slot: Some(slot), parents: 1, ..Self::default() }
    }
}

/// Attachment table indexed by `ModeId`.
#[derive(Clone, Debug, Default)]
pub struct Attachments {
    entries: Vec<Attachment>,
}

impl Attachments {
    pub fn new(mode_count: usize) -> Self {
        Self { entries: vec![Attachment::default(); mode_count] }
    }

    #[inline]
    pub fn get(&self, id: ModeId) -> &Attachment {
        &self.entries[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: ModeId) -> &mut Attachment {
        &mut self.entries[id.index()]
    }

    #[inline]
    pub fn is_attached(&self, id: ModeId) -> bool {
        self.entries.get(id.index()).is_some_and(|a| a.slot.is_some())
    }

    /// Arena slot of an attached mode.
    ///
    /// # Panics
    /// Panics if the mode was never attached, which only happens when a
    /// mode outside the attached tree is queried.
    #[inline]
    pub fn slot(&self, id: ModeId) -> SlotId {
        match self.entries[id.index()].slot {
            Some(slot) => slot,
            None => panic!("{id} is not attached to the running tree"),
        }
    }

    /// Record that one parent of `id` is unsupportive this frame and return
    /// how many parents may still support it.
    pub fn release_parent(&mut self, id: ModeId, frame: u32) -> u8 {
        let entry = &mut self.entries[id.index()];
        if entry.supportive_frame != frame {
            entry.supportive = entry.parents;
            entry.supportive_frame = frame;
        }
        entry.supportive = entry.supportive.saturating_sub(1);
        entry.supportive
    }

    /// Modes carrying a wait account, in id order.
    pub fn waiting(&mut self) -> impl Iterator<Item = (ModeId, &mut WaitAccount)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, a)| a.wait.as_mut().map(|w| (ModeId(i as u16), w)))
    }
}
