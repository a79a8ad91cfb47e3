//! `cadence-core` — foundational types for the cadence propagation engine.
//!
//! This crate is a dependency of every other `cadence-*` crate.  It has no
//! `cadence-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                     |
//! |------------|--------------------------------------------------------------|
//! | [`ids`]    | `ModeId`, `SlotId`                                           |
//! | [`time`]   | `Millis`, `TimeUnit`, `Periodic`, `Clock`, `FakeClock`, `SystemClock` |
//! | [`rng`]    | `JitterRng`                                                  |
//! | [`config`] | `EngineConfig`                                               |
//! | [`error`]  | `CoreError`, `CoreResult`                                    |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public data types.   |

pub mod config;
pub mod error;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};
pub use ids::{ModeId, SlotId};
pub use rng::JitterRng;
pub use time::{
    Clock, FakeClock, Millis, Periodic, SystemClock, TimeUnit, MILLIS_PER_DAY, MILLIS_PER_HOUR,
    MILLIS_PER_MINUTE, MILLIS_PER_SECOND,
};
