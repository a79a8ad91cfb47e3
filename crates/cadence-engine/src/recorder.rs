//! An [`Executor`] that records what it is asked to run.

use std::fmt;

use tracing::trace;

use cadence_core::ModeId;
use cadence_mode::{Executor, Host, Outcome};

/// Records every dispatched action with its triggering mode.
///
/// Actions listed through [`completing`][Self::completing] report
/// [`Outcome::Done`], so the context completes them right after dispatch;
/// everything else stays pending until the caller completes it.
#[derive(Clone, Debug)]
pub struct Recorder<A> {
    calls:  Vec<(A, Option<ModeId>)>,
    inline: Vec<A>,
}

impl<A> Default for Recorder<A> {
    fn default() -> Self {
        Self { calls: Vec::new(), inline: Vec::new() }
    }
}

impl<A: Copy + Eq + fmt::Debug> Recorder<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `action` as instantaneous.
    pub fn completing(mut self, action: A) -> Self {
        self.inline.push(action);
        self
    }

    /// Every call so far, in dispatch order.
    pub fn calls(&self) -> &[(A, Option<ModeId>)] {
        &self.calls
    }

    pub fn actions(&self) -> Vec<A> {
        self.calls.iter().map(|&(action, _)| action).collect()
    }

    /// Drain the recorded actions.
    pub fn take(&mut self) -> Vec<A> {
        self.calls.drain(..).map(|(action, _)| action).collect()
    }

    pub fn count(&self, action: A) -> usize {
        self.calls.iter().filter(|&&(a, _)| a == action).count()
    }
}

impl<S: Host> Executor<S> for Recorder<S::Action> {
    fn exec(&mut self, action: S::Action, _state: &S, _old: &S, trigger: Option<ModeId>) -> Outcome {
        trace!(target: "cadence::dispatch", ?action, ?trigger, "recorded");
        self.calls.push((action, trigger));
        if self.inline.contains(&action) { Outcome::Done } else { Outcome::Pending }
    }
}
