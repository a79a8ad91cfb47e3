use std::fmt;

/// Side effects the tracker's modes can request.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackerAction {
    /// Enter or leave deep sleep.
    ChangeSleep,
    AttemptJoin,
    ReadGps,
    /// Confirmed uplink of the current location.
    SendAck,
    SendNoAck,
    /// Power the GPS module up or down to match `gps_power`.
    ChangeGpsPower,
}

impl fmt::Display for TrackerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChangeSleep    => "change-sleep",
            Self::AttemptJoin    => "attempt-join",
            Self::ReadGps        => "read-gps",
            Self::SendAck        => "send-ack",
            Self::SendNoAck      => "send-no-ack",
            Self::ChangeGpsPower => "change-gps-power",
        };
        f.write_str(name)
    }
}
