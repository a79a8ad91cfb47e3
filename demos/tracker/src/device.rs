//! Simulated tracker hardware.
//!
//! [`Device`] is the executor handed to the context.  Radio and GPS
//! operations take simulated time, so `exec` only queues them; the main loop
//! drains finished operations with [`Device::due`] and reports them back as
//! completions.

use serde::Serialize;
use tracing::{debug, info};

use cadence_core::{Millis, ModeId, MILLIS_PER_SECOND};
use cadence_mode::{Executor, Host, Outcome};
use cadence_tracker::{TrackerAction, TrackerState};

// ── Timing ────────────────────────────────────────────────────────────────────

const JOIN_MILLIS:      u32 = 8 * MILLIS_PER_SECOND;
const READ_GPS_MILLIS:  u32 = MILLIS_PER_SECOND;
const SEND_ACK_MILLIS:  u32 = 3 * MILLIS_PER_SECOND;

/// Starting position; each read drifts north-east a little.
const ORIGIN: (f64, f64) = (30.695, -88.050);
const DRIFT:  f64        = 0.000_4;

// ── Effects ───────────────────────────────────────────────────────────────────

/// What a finished operation changes in the snapshot.
#[derive(Copy, Clone, Debug)]
pub enum Effect {
    Joined(bool),
    Fix,
    Location,
    Sent,
}

impl Effect {
    pub fn apply(self, state: &mut TrackerState) {
        match self {
            Effect::Joined(ok) => state.joined |= ok,
            // The module lost power before it locked on.
            Effect::Fix => state.gps_fix |= state.gps_power(),
            Effect::Location => state.gps_location = true,
            Effect::Sent => {}
        }
    }
}

/// An operation in flight.
#[derive(Copy, Clone, Debug)]
pub struct Pending {
    pub due:    Millis,
    /// Mode to complete, or `None` for a plain state change.
    pub mode:   Option<ModeId>,
    pub effect: Effect,
}

/// One line of the uplink log.
#[derive(Serialize, Debug)]
pub struct UplinkRow {
    pub at_secs:   u32,
    pub confirmed: bool,
    pub lat:       f64,
    pub lon:       f64,
}

// ── Device ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Device {
    /// Join attempts that fail before one succeeds.
    failed_joins: u32,
    fix_millis:   u32,
    attempts:     u32,
    reads:        u32,
    position:     (f64, f64),
    pending:      Vec<Pending>,
    pub uplinks:  Vec<UplinkRow>,
    pub sleeps:   u32,
}

impl Device {
    pub fn new(failed_joins: u32, fix_secs: u32) -> Self {
        Self {
            failed_joins,
            fix_millis: fix_secs * MILLIS_PER_SECOND,
            attempts: 0,
            reads: 0,
            position: ORIGIN,
            pending: Vec::new(),
            uplinks: Vec::new(),
            sleeps: 0,
        }
    }

    /// Remove and return every operation finished by `now`, oldest first.
    pub fn due(&mut self, now: Millis) -> Vec<Pending> {
        // Anything scheduled within the last half wrap counts as elapsed.
        let (done, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now.since(p.due) < u32::MAX / 2);
        self.pending = waiting;
        done
    }

    fn schedule(&mut self, now: Millis, after: u32, mode: Option<ModeId>, effect: Effect) {
        self.pending.push(Pending { due: now.after(after), mode, effect });
    }

    fn uplink(&mut self, now: Millis, confirmed: bool) {
        let (lat, lon) = self.position;
        info!(target: "tracker::radio", confirmed, lat, lon, "uplink");
        self.uplinks.push(UplinkRow { at_secs: now.0 / MILLIS_PER_SECOND, confirmed, lat, lon });
    }
}

impl Executor<TrackerState> for Device {
    fn exec(
        &mut self,
        action:  TrackerAction,
        state:   &TrackerState,
        _old:    &TrackerState,
        trigger: Option<ModeId>,
    ) -> Outcome {
        let now = state.modes().millis();
        debug!(target: "tracker::device", %action, at = now.0, "exec");
        match action {
            TrackerAction::ChangeSleep => {
                // Sleeping lasts until the tree ends the Sleep mode.
                self.sleeps += 1;
                Outcome::Pending
            }
            TrackerAction::AttemptJoin => {
                self.attempts += 1;
                let ok = self.attempts > self.failed_joins;
                self.schedule(now, JOIN_MILLIS, trigger, Effect::Joined(ok));
                Outcome::Pending
            }
            TrackerAction::ChangeGpsPower => {
                if state.gps_power() {
                    self.schedule(now, self.fix_millis, None, Effect::Fix);
                }
                Outcome::Pending
            }
            TrackerAction::ReadGps => {
                self.reads += 1;
                let step = DRIFT * f64::from(self.reads);
                self.position = (ORIGIN.0 + step, ORIGIN.1 + step);
                self.schedule(now, READ_GPS_MILLIS, trigger, Effect::Location);
                Outcome::Pending
            }
            TrackerAction::SendAck => {
                self.uplink(now, true);
                self.schedule(now, SEND_ACK_MILLIS, trigger, Effect::Sent);
                Outcome::Pending
            }
            TrackerAction::SendNoAck => {
                // Unconfirmed uplinks are fire-and-forget.
                self.uplink(now, false);
                Outcome::Done
            }
        }
    }
}
