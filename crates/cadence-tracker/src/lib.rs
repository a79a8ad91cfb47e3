//! `cadence-tracker` — the tracker's snapshot host and behavior tree.
//!
//! ```text
//! Main (repeat 1, idle Sleep)
//! ├── Sleep                                   → ChangeSleep
//! ├── LowPowerJoin       !usb ∧ !joined
//! │   └── AttemptJoin                         → AttemptJoin
//! ├── LowPowerGpsSearch  !usb ∧ joined ∧ !fix   (5 min, fixed)
//! ├── LowPowerSend       !usb ∧ joined ∧ fix
//! │   └── ReadAndSend
//! ├── PeriodicJoin       usb ∧ !joined          12/hour
//! │   └── AttemptJoin    (shared)
//! └── PeriodicSend       usb ∧ joined ∧ fix     6/hour
//!     └── ReadAndSend    (shared)
//!         ├── ReadGps    joined ∧ fix         → ReadGps
//!         └── Send       joined ∧ location      one child per activation
//!             ├── SendAck     (1 day gap)     → SendAck
//!             └── SendNoAck                   → SendNoAck
//! ```
//!
//! GPS power is derived (`usb ∨ joined`) and every flip emits
//! `ChangeGpsPower` independently of the tree.

pub mod action;
pub mod state;
pub mod tree;


pub use action::TrackerAction;
pub use state::TrackerState;
pub use tree::{tracker_tree, TrackerModes};
