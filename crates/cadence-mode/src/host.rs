//! Capabilities the application provides: the snapshot host and the action
//! executor.

use std::fmt;

use cadence_core::ModeId;

use crate::ModeArena;

/// Result of handing an action to an [`Executor`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// The operation continues elsewhere; the caller reports back through
    /// the context's `complete` when it finishes.
    Pending,
    /// The action finished inline.  The context completes the triggering
    /// mode right after the current dispatch round.
    Done,
}

/// The application's state snapshot.
///
/// A host is a plain value holding the domain fields plus one [`ModeArena`].
/// `Clone` must produce a fully independent copy; `Default` is the
/// zero-valued reference snapshot the boot frame compares against.
///
/// # Hooks
///
/// Only the arena accessors are required.  The rest run at fixed points of
/// every frame:
///
/// | Hook             | When                                                  |
/// |------------------|-------------------------------------------------------|
/// | `update_derived` | after a mutation, before propagation                  |
/// | `on_change`      | at dispatch, before any mode action                   |
/// | `did_actions`    | after all mode actions of a dispatch round            |
/// | `did_update`     | at the end of every frame, dispatched or held         |
pub trait Host: Clone + Default {
    /// The application's action vocabulary.
    type Action: Copy + Eq + fmt::Debug;

    fn modes(&self) -> &ModeArena;

    fn modes_mut(&mut self) -> &mut ModeArena;

    /// Recompute fields that are pure functions of other fields.
    fn update_derived(&mut self, _old: &Self) {}

    /// Emit state-wide side effects that belong to no single mode, e.g.
    /// powering a peripheral whenever any of several flags is set.
    ///
    /// Actions issued here carry no triggering mode, so their [`Outcome`] is
    /// ignored.
    fn on_change(&self, _old: &Self, _executor: &mut dyn Executor<Self>) {}

    fn did_actions(&self, _old: &Self) {}

    /// `hold_level` is non-zero when dispatch was deferred by an open
    /// transaction.
    fn did_update(&self, _old: &Self, _hold_level: u16) {}
}

/// Sink for actions chosen by the propagation pass.
pub trait Executor<S: Host> {
    /// Run `action`.  `trigger` is the mode whose activation caused it, or
    /// `None` for actions issued by [`Host::on_change`].
    fn exec(&mut self, action: S::Action, state: &S, old: &S, trigger: Option<ModeId>) -> Outcome;
}
