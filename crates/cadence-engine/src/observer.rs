//! Context observer trait for diagnostics and data collection.

use cadence_core::ModeId;
use cadence_mode::Host;

/// Callbacks invoked by a [`Context`][crate::Context] at key points of every
/// frame.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example — frame counter
///
/// ```rust,ignore
/// struct Frames(u32);
///
/// impl<S: Host> ContextObserver<S> for Frames {
///     fn on_frame(&mut self, _frame: u32, _state: &S, _held: bool) {
///         self.0 += 1;
///     }
/// }
/// ```
pub trait ContextObserver<S: Host> {
    /// Called after each propagation pass.  `held` is true when dispatch was
    /// deferred by an open transaction.
    fn on_frame(&mut self, _frame: u32, _state: &S, _held: bool) {}

    /// Called right before a mode's action is handed to the executor.
    fn on_dispatch(&mut self, _mode: ModeId, _action: S::Action) {}

    /// Called when a running invocation is marked complete.
    fn on_complete(&mut self, _mode: ModeId) {}

    /// Called after a checkpoint wrote `modes` wait accounts.
    fn on_checkpoint(&mut self, _modes: usize) {}
}

/// A [`ContextObserver`] that does nothing.
pub struct NoopObserver;

impl<S: Host> ContextObserver<S> for NoopObserver {}
