//! The immutable behavior node and its state-local predicates.

use cadence_core::{Millis, ModeId, Periodic};

use crate::{Host, ModeState};

/// Pure predicate over the current snapshot.
pub type RequiredFn<S> = fn(&S) -> bool;

/// Pure predicate over the current and previous snapshot.
pub type InspirationFn<S> = fn(&S, &S) -> bool;

/// Length of the storage tag fragment that goes into persisted keys.
pub const STORAGE_TAG_LEN: usize = 5;

/// One node of a mode tree.
///
/// Built once through [`TreeBuilder`](crate::TreeBuilder) and never mutated
/// afterwards; everything that changes at run time lives in [`ModeState`]
/// or in the context's [`Attachments`](crate::Attachments).
pub struct Mode<S: Host> {
    pub name:                     &'static str,
    pub storage_tag:              Option<String>,

    /// Activations allowed until the next reset; 0 is unlimited.
    pub repeat_limit:             u8,
    /// Milliseconds; 0 disables each constraint.
    pub min_duration:             u32,
    pub max_duration:             u32,
    pub min_gap:                  u32,
    pub invoke_delay:             u32,
    pub periodic:                 Option<Periodic>,

    pub children:                 Vec<ModeId>,
    pub idle:                     Option<ModeId>,
    pub follow:                   Option<ModeId>,
    /// Children that may be newly inspired per activation; 0 is unlimited.
    pub child_activation_limit:   u8,
    /// Children that may be active at once; 0 is unlimited.
    pub child_simultaneous_limit: u8,

    pub required:                 Option<RequiredFn<S>>,
    pub inspiration:              Option<InspirationFn<S>>,
    pub action:                   Option<S::Action>,
}

impl<S: Host> Mode<S> {
    pub(crate) fn named(name: &'static str) -> Self {
        Self {
            name,
            storage_tag:              None,
            repeat_limit:             0,
            min_duration:             0,
            max_duration:             0,
            min_gap:                  0,
            invoke_delay:             0,
            periodic:                 None,
            children:                 Vec::new(),
            idle:                     None,
            follow:                   None,
            child_activation_limit:   0,
            child_simultaneous_limit: 0,
            required:                 None,
            inspiration:              None,
            action:                   None,
        }
    }

    /// Milliseconds between periodic triggers, 0 if not periodic.
    #[inline]
    pub fn period(&self) -> u32 {
        self.periodic.map_or(0, Periodic::period)
    }

    /// Whether the mode can change state from the passage of time alone.
    pub fn is_time_dependent(&self) -> bool {
        self.period() != 0
            || self.max_duration != 0
            || self.min_duration != 0
            || self.invoke_delay != 0
    }

    /// Whether a store should carry this mode's schedule across reboots.
    pub fn is_persisted(&self) -> bool {
        self.storage_tag.is_some() && (self.period() != 0 || self.min_gap != 0)
    }

    /// Store key of the last trigger epoch.
    pub fn trigger_key(&self) -> Option<String> {
        self.storage_tag.as_ref().map(|tag| format!("R{tag}LT"))
    }

    /// Store key of the cumulative un-triggered wait.
    pub fn wait_key(&self) -> Option<String> {
        self.storage_tag.as_ref().map(|tag| format!("R{tag}CW"))
    }

    // ── Predicates ────────────────────────────────────────────────────────

    #[inline]
    pub fn required_state(&self, state: &S) -> bool {
        self.required.is_none_or(|required| required(state))
    }

    /// Inspiration predicate fired, or the required predicate just turned
    /// true.
    pub fn inspired(&self, state: &S, old: &S) -> bool {
        self.inspiration.is_some_and(|inspiration| inspiration(state, old))
            || (self.required_state(state) && !self.required_state(old))
    }

    #[inline]
    pub fn hit_repeat_limit(&self, ms: &ModeState) -> bool {
        self.repeat_limit != 0 && ms.invocation_count >= self.repeat_limit
    }

    /// The running action signalled completion since `old`.
    #[inline]
    pub fn invocation_terminated(&self, ms: &ModeState, old: &ModeState) -> bool {
        self.action.is_some() && old.invocation_active && !ms.invocation_active
    }

    pub fn insufficient_gap(&self, ms: &ModeState, now: Millis) -> bool {
        self.min_gap != 0 && ms.end_millis.is_some_and(|end| now.since(end) < self.min_gap)
    }

    pub fn expired(&self, ms: &ModeState, now: Millis) -> bool {
        ms.is_active() && self.max_duration != 0 && now.since(ms.start_millis) >= self.max_duration
    }

    /// An invoke delay elapsed (once per activation) or a period came due.
    pub fn triggered(&self, ms: &ModeState, now: Millis) -> bool {
        if !ms.is_active() {
            return false;
        }
        if self.invoke_delay != 0 {
            return ms.last_trigger.is_none() && now.since(ms.start_millis) >= self.invoke_delay;
        }
        let period = self.period();
        period != 0 && ms.last_trigger.is_none_or(|last| now.since(last) >= period)
    }

    /// Still inside the minimum-duration window.
    #[inline]
    pub fn within_min_duration(&self, ms: &ModeState, now: Millis) -> bool {
        self.min_duration != 0 && now.since(ms.start_millis) < self.min_duration
    }
}
