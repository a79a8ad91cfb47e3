//! Identifier newtypes.
//!
//! `ModeId` indexes a node in a built mode tree; `SlotId` indexes a
//! `ModeState` inside a snapshot's fixed arena.

use std::fmt;

/// Index of a node in a `ModeTree`, handed out by the tree builder in
/// declaration order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeId(pub u16);

impl ModeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode #{}", self.0)
    }
}

/// Index of a `ModeState` slot in a snapshot arena.  Slots are assigned the
/// first time a mode is attached and never move afterwards.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotId(pub u8);

impl SlotId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
