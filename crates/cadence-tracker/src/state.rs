//! The tracker's snapshot.

use tracing::trace;

use cadence_mode::{Executor, Host, ModeArena};

use crate::TrackerAction;

/// Everything the tracker's modes decide on.
///
/// Set the input fields through the context's `mutate`; `gps_power` is
/// recomputed before every propagation pass.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackerState {
    /// External power present.
    pub usb_power:    bool,
    /// LoRaWAN session established.
    pub joined:       bool,
    pub gps_fix:      bool,
    /// A location has been read since the fix.
    pub gps_location: bool,
    gps_power:        bool,
    modes:            ModeArena,
}

impl TrackerState {
    #[inline]
    pub fn gps_power(&self) -> bool {
        self.gps_power
    }

    // ── Predicates ────────────────────────────────────────────────────────

    pub(crate) fn low_power_join(&self) -> bool {
        !self.usb_power && !self.joined
    }

    pub(crate) fn low_power_gps_search(&self) -> bool {
        !self.usb_power && self.joined && !self.gps_fix
    }

    pub(crate) fn low_power_send(&self) -> bool {
        !self.usb_power && self.joined && self.gps_fix
    }

    pub(crate) fn periodic_join(&self) -> bool {
        self.usb_power && !self.joined
    }

    pub(crate) fn periodic_send(&self) -> bool {
        self.usb_power && self.joined && self.gps_fix
    }

    pub(crate) fn can_read_gps(&self) -> bool {
        self.joined && self.gps_fix
    }

    pub(crate) fn can_send(&self) -> bool {
        self.joined && self.gps_location
    }
}

impl Host for TrackerState {
    type Action = TrackerAction;

    fn modes(&self) -> &ModeArena {
        &self.modes
    }

    fn modes_mut(&mut self) -> &mut ModeArena {
        &mut self.modes
    }

    fn update_derived(&mut self, _old: &Self) {
        self.gps_power = self.usb_power || self.joined;
    }

    fn on_change(&self, old: &Self, executor: &mut dyn Executor<Self>) {
        if self.gps_power != old.gps_power {
            trace!(target: "cadence::tracker", on = self.gps_power, "gps power");
            executor.exec(TrackerAction::ChangeGpsPower, self, old, None);
        }
    }
}
