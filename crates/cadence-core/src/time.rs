//! Millisecond time model and injectable clocks.
//!
//! # Design
//!
//! Engine time is a 32-bit millisecond counter, the width of a
//! microcontroller `millis()` register.  It wraps after ~49.7 days, so no
//! code compares two readings with `<` directly: every elapsed-time test goes
//! through [`Millis::since`], which is a wrapping subtraction and stays
//! correct across a rollover as long as the interval itself is shorter than
//! the wrap period.
//!
//! Wall-clock time (when known) is carried separately as Unix seconds; see
//! [`EngineConfig::real_time_epoch`](crate::EngineConfig::real_time_epoch).

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

pub const MILLIS_PER_SECOND: u32 = 1_000;
pub const MILLIS_PER_MINUTE: u32 = 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_HOUR:   u32 = 60 * MILLIS_PER_MINUTE;
pub const MILLIS_PER_DAY:    u32 = 24 * MILLIS_PER_HOUR;

// ── Millis ───────────────────────────────────────────────────────────────────

/// A reading of the monotonic millisecond clock.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    /// Milliseconds elapsed from `earlier` to `self`, modulo 2^32.
    #[inline]
    pub fn since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// The reading `ms` milliseconds after `self`.
    #[inline]
    pub fn after(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_add(ms))
    }

    /// The reading `ms` milliseconds before `self`.
    #[inline]
    pub fn before(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_sub(ms))
    }
}

impl std::ops::Add<u32> for Millis {
    type Output = Millis;
    #[inline]
    fn add(self, rhs: u32) -> Millis {
        self.after(rhs)
    }
}

impl std::ops::Sub for Millis {
    type Output = u32;
    #[inline]
    fn sub(self, rhs: Millis) -> u32 {
        self.since(rhs)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ── TimeUnit ─────────────────────────────────────────────────────────────────

/// Unit of a "N times per unit" periodic cadence.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeUnit {
    Hour,
    Day,
}

impl TimeUnit {
    #[inline]
    pub fn millis(self) -> u32 {
        match self {
            TimeUnit::Hour => MILLIS_PER_HOUR,
            TimeUnit::Day  => MILLIS_PER_DAY,
        }
    }
}

/// `times` triggers per `unit`, evenly spaced.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Periodic {
    pub times: u16,
    pub unit:  TimeUnit,
}

impl Periodic {
    pub fn new(times: u16, unit: TimeUnit) -> Self {
        Self { times, unit }
    }

    /// Milliseconds between consecutive triggers; 0 when `times` is 0.
    #[inline]
    pub fn period(self) -> u32 {
        if self.times == 0 {
            return 0;
        }
        self.unit.millis() / self.times as u32
    }
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Monotonic millisecond source driving every frame.
pub trait Clock {
    fn millis(&self) -> Millis;
}

/// Process-uptime clock backed by [`Instant`].
#[derive(Clone, Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { started: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> Millis {
        // Truncation is the rollover a hardware counter would show.
        Millis(self.started.elapsed().as_millis() as u32)
    }
}

/// Manually advanced clock for tests and simulations.
///
/// Clones share the same reading, so a test keeps one handle while the
/// context owns another.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    now: Rc<Cell<u32>>,
}

impl FakeClock {
    pub fn starting_at(ms: u32) -> Self {
        Self { now: Rc::new(Cell::new(ms)) }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance_millis(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn advance_seconds(&self, secs: u32) {
        self.advance_millis(secs * MILLIS_PER_SECOND);
    }

    pub fn advance_minutes(&self, minutes: u32) {
        self.advance_millis(minutes * MILLIS_PER_MINUTE);
    }
}

impl Clock for FakeClock {
    fn millis(&self) -> Millis {
        Millis(self.now.get())
    }
}
