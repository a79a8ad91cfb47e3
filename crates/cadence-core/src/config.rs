//! Engine configuration.

use crate::{CoreError, CoreResult, MILLIS_PER_DAY};

/// Runtime knobs for a propagation context.
///
/// Typically embedded in the application's own config file and passed to
/// the context builder.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Unix seconds at the moment `init` runs, when a trustworthy wall clock
    /// is available.  `None` makes persisted trigger times unusable and
    /// switches seeding to the randomized fallback.
    pub real_time_epoch: Option<u32>,

    /// Seed for the first-trigger jitter.  The same seed always produces
    /// identical offsets.
    pub jitter_seed: u64,

    /// Persist cumulative waits every N milliseconds from `tick`.
    /// 0 disables automatic checkpoints.
    pub checkpoint_interval_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            real_time_epoch:        None,
            jitter_seed:            0,
            checkpoint_interval_ms: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.real_time_epoch == Some(0) {
            return Err(CoreError::Config(
                "real_time_epoch of 0 is indistinguishable from an unset clock; use None".into(),
            ));
        }
        if self.checkpoint_interval_ms > MILLIS_PER_DAY {
            return Err(CoreError::Config(format!(
                "checkpoint_interval_ms {} exceeds one day",
                self.checkpoint_interval_ms
            )));
        }
        Ok(())
    }
}
