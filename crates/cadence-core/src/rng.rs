//! Deterministic jitter source for reboot-survivable scheduling.
//!
//! When a device boots without a trustworthy wall clock, every periodic mode
//! would otherwise fire at the same instant on every unit in a fleet.  The
//! engine spreads the first trigger uniformly across one period using this
//! RNG.  The seed comes from [`EngineConfig::jitter_seed`](crate::EngineConfig);
//! firmware feeds it from a hardware entropy source, tests pin it.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seeded RNG producing bounded millisecond offsets.
pub struct JitterRng(SmallRng);

impl JitterRng {
    /// Derive a generator for one storage tag so adding a tagged mode does
    /// not shift the offsets of the others.
    pub fn for_tag(seed: u64, tag: &str) -> Self {
        let mixed = tag
            .bytes()
            .fold(seed, |acc, b| (acc ^ b as u64).wrapping_mul(MIXING_CONSTANT));
        JitterRng(SmallRng::seed_from_u64(mixed))
    }

    /// Uniform value in `0..bound`; 0 when `bound` is 0.
    #[inline]
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.0.gen_range(0..bound)
    }
}
