//! Construction of the tracker's mode tree.

use cadence_core::{ModeId, TimeUnit, MILLIS_PER_DAY, MILLIS_PER_MINUTE};
use cadence_mode::{ModeResult, ModeTree, TreeBuilder};

use crate::{TrackerAction, TrackerState};

/// How long a battery-powered search for a fix may run.
pub const GPS_SEARCH_MILLIS: u32 = 5 * MILLIS_PER_MINUTE;

/// Ids of every node in the tracker tree, in declaration order.
#[derive(Copy, Clone, Debug)]
pub struct TrackerModes {
    pub main:                 ModeId,
    pub sleep:                ModeId,
    pub low_power_join:       ModeId,
    pub attempt_join:         ModeId,
    pub low_power_gps_search: ModeId,
    pub low_power_send:       ModeId,
    pub read_and_send:        ModeId,
    pub read_gps:             ModeId,
    pub send:                 ModeId,
    pub send_ack:             ModeId,
    pub send_no_ack:          ModeId,
    pub periodic_join:        ModeId,
    pub periodic_send:        ModeId,
}

/// Build the tracker tree.  `Main` is the root.
///
/// `AttemptJoin` and `ReadAndSend` each hang under two parents, so the
/// low-power and periodic branches share their running invocations.
pub fn tracker_tree() -> ModeResult<(ModeTree<TrackerState>, TrackerModes)> {
    let mut b = TreeBuilder::<TrackerState>::new();
    let m = TrackerModes {
        main:                 b.declare("Main"),
        sleep:                b.declare("Sleep"),
        low_power_join:       b.declare("LowPowerJoin"),
        attempt_join:         b.declare("AttemptJoin"),
        low_power_gps_search: b.declare("LowPowerGpsSearch"),
        low_power_send:       b.declare("LowPowerSend"),
        read_and_send:        b.declare("ReadAndSend"),
        read_gps:             b.declare("ReadGps"),
        send:                 b.declare("Send"),
        send_ack:             b.declare("SendAck"),
        send_no_ack:          b.declare("SendNoAck"),
        periodic_join:        b.declare("PeriodicJoin"),
        periodic_send:        b.declare("PeriodicSend"),
    };

    b.mode(m.main)
        .repeat_limit(1)
        .child(m.sleep)
        .child(m.low_power_join)
        .child(m.low_power_gps_search)
        .child(m.low_power_send)
        .child(m.periodic_join)
        .child(m.periodic_send)
        .idle(m.sleep);
    b.mode(m.sleep).action(TrackerAction::ChangeSleep);

    // Battery branch: every step runs at most once per boot.
    b.mode(m.low_power_join)
        .repeat_limit(1)
        .required(TrackerState::low_power_join)
        .child(m.attempt_join);
    b.mode(m.attempt_join).action(TrackerAction::AttemptJoin);
    b.mode(m.low_power_gps_search)
        .repeat_limit(1)
        .min_duration(GPS_SEARCH_MILLIS)
        .max_duration(GPS_SEARCH_MILLIS)
        .required(TrackerState::low_power_gps_search);
    b.mode(m.low_power_send)
        .repeat_limit(1)
        .required(TrackerState::low_power_send)
        .child(m.read_and_send);

    // USB branch.
    b.mode(m.periodic_join)
        .periodic(12, TimeUnit::Hour)
        .storage_tag("pjoin")
        .required(TrackerState::periodic_join)
        .child(m.attempt_join);
    b.mode(m.periodic_send)
        .periodic(6, TimeUnit::Hour)
        .storage_tag("psend")
        .required(TrackerState::periodic_send)
        .child(m.read_and_send);

    b.mode(m.read_and_send).child(m.read_gps).child(m.send);
    b.mode(m.read_gps)
        .required(TrackerState::can_read_gps)
        .action(TrackerAction::ReadGps);
    b.mode(m.send)
        .required(TrackerState::can_send)
        .child_activation_limit(1)
        .child_simultaneous_limit(1)
        .child(m.send_ack)
        .child(m.send_no_ack);
    b.mode(m.send_ack)
        .min_gap(MILLIS_PER_DAY)
        .storage_tag("sack")
        .action(TrackerAction::SendAck);
    b.mode(m.send_no_ack).action(TrackerAction::SendNoAck);

    Ok((b.build()?, m))
}
