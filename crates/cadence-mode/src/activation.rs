//! The per-frame signal a mode hands to each of its children.

use std::fmt;

/// How a parent currently stands towards its children.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Activation {
    /// Parent or its trigger just became true; children may start and their
    /// repeat budget is reset.
    Inspiring,
    /// Steady continuation.
    Active,
    /// Alive but not newly triggering; only an edge on the child's own
    /// predicates can start it.
    Sustaining,
    /// Parent went inactive this frame.
    Expiring,
    Inactive,
    /// Fallback activation for an idle child whose siblings are all inactive.
    IdleCell,
}

impl Activation {
    /// Whether a child may stay active under this signal.
    #[inline]
    pub fn is_supportive(self) -> bool {
        !matches!(self, Activation::Expiring | Activation::Inactive)
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Inspiring  => "inspiring",
            Activation::Active     => "active",
            Activation::Sustaining => "sustaining",
            Activation::Expiring   => "expiring",
            Activation::Inactive   => "inactive",
            Activation::IdleCell   => "idle-cell",
        };
        f.write_str(name)
    }
}
