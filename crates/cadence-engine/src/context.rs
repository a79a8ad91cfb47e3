//! The `Context` orchestrator and its transaction guard.

use std::ops::{Deref, DerefMut};

use tracing::{debug, trace, warn};

use cadence_core::{Clock, CoreError, EngineConfig, Millis, ModeId};
use cadence_mode::{Activation, Attachments, Executor, Host, ModeState, ModeTree, Outcome};
use cadence_store::Store;

use crate::persistence::{self, Seeder};
use crate::{ContextObserver, EngineError, EngineResult};

// ── Context ───────────────────────────────────────────────────────────────────

/// Drives frames over one live snapshot and dispatches the actions they
/// select.
///
/// Every externally visible change goes through [`mutate`][Self::mutate],
/// [`complete`][Self::complete] or [`tick`][Self::tick].  Each copies the
/// snapshot, applies the change, runs one propagation pass comparing the
/// two, then (unless a [`Transaction`] is open) hands newly activated
/// actions to the executor in the fixed order collected at `init`.
///
/// Create via [`ContextBuilder`][crate::ContextBuilder].
pub struct Context<S: Host, C: Clock, E: Executor<S>> {
    pub(crate) tree:     ModeTree<S>,
    pub(crate) root:     ModeId,
    pub(crate) state:    S,
    pub(crate) clock:    C,
    pub(crate) executor: E,
    pub(crate) store:    Option<Box<dyn Store>>,
    pub(crate) observer: Option<Box<dyn ContextObserver<S>>>,
    pub(crate) config:   EngineConfig,

    pub(crate) links:           Attachments,
    /// Action-bearing modes in dispatch order.
    pub(crate) invoke:          Vec<ModeId>,
    /// Modes polled by `tick`.
    pub(crate) timed:           Vec<ModeId>,
    /// Starts at 1; `begin` releases the boot hold.
    pub(crate) hold_level:      u16,
    pub(crate) initialized:     bool,
    pub(crate) boot_millis:     Millis,
    pub(crate) last_checkpoint: Millis,
}

impl<S: Host, C: Clock, E: Executor<S>> Context<S, C, E> {
    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Reset the snapshot, attach the tree, activate the root and run the
    /// boot frame against the zero-valued reference snapshot.
    ///
    /// Dispatch stays held until [`begin`][Self::begin].
    ///
    /// # Panics
    /// Panics if the tree has more modes than the arena has slots.
    pub fn init(&mut self) {
        let now = self.clock.millis();
        debug!(
            target: "cadence::context",
            at = now.0,
            epoch = ?self.config.real_time_epoch,
            modes = self.tree.len(),
            "init"
        );

        self.state.modes_mut().reset();
        self.state.modes_mut().set_millis(now);

        let collected = self.tree.collect(self.root);
        self.invoke = collected.invoke;
        self.timed = collected.timed;
        self.links = Attachments::new(self.tree.len());
        self.boot_millis = now;
        self.last_checkpoint = now;

        let mut seeder = Seeder {
            store:       self.store.as_mut(),
            epoch:       self.config.real_time_epoch,
            jitter_seed: self.config.jitter_seed,
            now,
        };
        self.tree.attach(self.root, &mut self.links, &mut self.state, &mut |_, mode, ms, link| {
            seeder.seed(mode, ms, link)
        });

        self.tree.activate(self.root, &self.links, &mut self.state);
        self.on_update(&S::default());
        self.initialized = true;
    }

    /// Release the boot hold: dispatch everything that became active since
    /// the zero-valued snapshot, including mutations made after `init`.
    ///
    /// # Panics
    /// Panics if called twice, since the hold level would drop below zero.
    pub fn begin(&mut self) -> EngineResult<()> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        self.resume_actions(&S::default());
        Ok(())
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Apply `f` to the snapshot and run one frame.
    pub fn mutate<F: FnOnce(&mut S)>(&mut self, f: F) {
        let old = self.state.clone();
        f(&mut self.state);
        self.on_update(&old);
    }

    /// Mark the running invocation of `mode` finished.
    pub fn complete(&mut self, mode: ModeId) {
        self.complete_with(mode, |_| {});
    }

    /// Mark the running invocation of `mode` finished and apply `update` in
    /// the same frame.
    ///
    /// Ignored when the invocation is not running, e.g. because the mode was
    /// force-terminated while its operation was in flight.
    pub fn complete_with<F: FnOnce(&mut S)>(&mut self, mode: ModeId, update: F) {
        let running = self.links.is_attached(mode)
            && self.state.modes().get(self.links.slot(mode)).invocation_active;
        if !running {
            let name = self.tree.get(mode).map_or("?", |m| m.name);
            warn!(target: "cadence::dispatch", mode = name, "completion for an invocation that is not running");
            return;
        }

        self.hold_actions();
        let initial = self.state.clone();
        update(&mut self.state);
        let slot = self.links.slot(mode);
        self.state.modes_mut().get_mut(slot).invocation_active = false;
        debug!(target: "cadence::dispatch", mode = self.tree.mode(mode).name, "complete");
        if let Some(observer) = self.observer.as_mut() {
            observer.on_complete(mode);
        }
        self.on_update(&initial);
        self.resume_actions(&initial);
    }

    /// Clear the repeat count of `mode` and run a frame, so the next edge
    /// (or Inspiring signal) may activate it again.
    pub fn rearm(&mut self, mode: ModeId) -> EngineResult<()> {
        if !self.links.is_attached(mode) {
            return Err(CoreError::ModeNotFound(mode).into());
        }
        let old = self.state.clone();
        let slot = self.links.slot(mode);
        self.state.modes_mut().get_mut(slot).invocation_count = 0;
        trace!(target: "cadence::context", mode = self.tree.mode(mode).name, "rearm");
        self.on_update(&old);
        Ok(())
    }

    /// Open a scope in which dispatch is deferred.  Dropping the guard
    /// dispatches once against the snapshot captured here.
    pub fn transaction(&mut self) -> Transaction<'_, S, C, E> {
        self.hold_actions();
        let initial = self.state.clone();
        Transaction { ctx: self, initial }
    }

    pub fn hold_actions(&mut self) {
        self.hold_level += 1;
    }

    /// Undo one [`hold_actions`][Self::hold_actions]; the outermost resume
    /// dispatches against `old`.
    ///
    /// # Panics
    /// Panics when no hold is outstanding.
    pub fn resume_actions(&mut self, old: &S) {
        assert!(self.hold_level > 0, "resume_actions without a matching hold");
        self.hold_level -= 1;
        if self.hold_level == 0 {
            self.perform_actions(old);
        }
    }

    // ── Time ──────────────────────────────────────────────────────────────

    /// Advance the snapshot clock and run a frame only if a time-dependent
    /// mode expired, came due, or left its minimum-duration window since the
    /// previous reading.  Returns whether a frame ran.
    ///
    /// Also writes a checkpoint once `checkpoint_interval_ms` has elapsed;
    /// checkpoint failures are logged, never returned.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.millis();
        let last = self.state.modes().millis();
        self.state.modes_mut().set_millis(now);

        let due = self.timed.iter().any(|&id| {
            let mode = self.tree.mode(id);
            let ms = self.state.modes().get(self.links.slot(id));
            // A minimum-duration window that closed since the last reading
            // may leave the mode barren.
            let window_closed = ms.is_active()
                && mode.within_min_duration(ms, last)
                && !mode.within_min_duration(ms, now);
            mode.expired(ms, now) || mode.triggered(ms, now) || window_closed
        });
        if due {
            let old = self.state.clone();
            self.on_update(&old);
        }

        let interval = self.config.checkpoint_interval_ms;
        if interval != 0 && now.since(self.last_checkpoint) >= interval {
            if let Err(err) = self.checkpoint() {
                warn!(target: "cadence::store", %err, "checkpoint failed");
            }
        }
        due
    }

    /// How long the host may sleep before a time-dependent mode needs a
    /// frame, capped at `limit_ms`.  Measured from the last frame or tick.
    pub fn max_sleep(&self, limit_ms: u32) -> u32 {
        if !self.initialized {
            return limit_ms;
        }
        self.tree.max_sleep(self.root, &self.links, &self.state, limit_ms)
    }

    /// Persist every wait account, and with a known epoch every last
    /// trigger, in one store transaction.  A failed write rolls the whole
    /// transaction back.  Returns the number of modes
    /// written; 0 without a store.
    pub fn checkpoint(&mut self) -> EngineResult<usize> {
        let now = self.clock.millis();
        self.last_checkpoint = now;
        let Some(store) = self.store.as_mut() else {
            return Ok(0);
        };
        let epoch_now = self
            .config
            .real_time_epoch
            .map(|epoch| epoch.saturating_add(now.since(self.boot_millis) / 1_000));

        store.begin()?;
        let written =
            persistence::write_checkpoint(&mut **store, &self.tree, &mut self.links, &self.state, now, epoch_now);
        let written = match written {
            Ok(written) => {
                store.commit()?;
                written
            }
            Err(err) => {
                if let Err(rollback) = store.rollback() {
                    warn!(target: "cadence::store", %rollback, "checkpoint rollback failed");
                }
                return Err(err.into());
            }
        };

        debug!(target: "cadence::store", modes = written, epoch = ?epoch_now, "checkpoint");
        if let Some(observer) = self.observer.as_mut() {
            observer.on_checkpoint(written);
        }
        Ok(written)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_active(&self, mode: ModeId) -> bool {
        self.mode_state(mode).is_some_and(ModeState::is_active)
    }

    /// Live runtime record of `mode`, `None` before `init` or for modes
    /// outside the attached tree.
    pub fn mode_state(&self, mode: ModeId) -> Option<&ModeState> {
        self.links
            .is_attached(mode)
            .then(|| self.state.modes().get(self.links.slot(mode)))
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tree(&self) -> &ModeTree<S> {
        &self.tree
    }

    pub fn root(&self) -> ModeId {
        self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn frame(&self) -> u32 {
        self.state.modes().frame()
    }

    #[inline]
    pub fn hold_level(&self) -> u16 {
        self.hold_level
    }

    /// Action-bearing modes in dispatch order.
    pub fn invoke_modes(&self) -> &[ModeId] {
        &self.invoke
    }

    /// Modes polled by [`tick`][Self::tick].
    pub fn timed_modes(&self) -> &[ModeId] {
        &self.timed
    }

    /// Log the tree with each mode's state at `debug` level.
    pub fn dump(&self) {
        if self.initialized {
            self.tree.dump(self.root, &self.links, &self.state);
        }
    }

    // ── Frame ─────────────────────────────────────────────────────────────

    fn on_update(&mut self, old: &S) {
        let now = self.clock.millis();
        self.state.modes_mut().new_frame(now);
        self.state.update_derived(old);
        let frame = self.state.modes().frame();
        trace!(target: "cadence::context", frame, at = now.0, hold = self.hold_level, "frame");

        self.tree.propagate(self.root, Activation::Active, &mut self.links, &mut self.state, old);

        let held = self.hold_level > 0;
        if !held {
            self.perform_actions(old);
        }
        self.state.did_update(old, self.hold_level);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_frame(frame, &self.state, held);
        }
    }

    fn perform_actions(&mut self, old: &S) {
        self.state.on_change(old, &mut self.executor);

        let now = self.state.modes().millis();
        let mut done = Vec::new();
        for &id in &self.invoke {
            let mode = self.tree.mode(id);
            let Some(action) = mode.action else {
                continue;
            };
            let slot = self.links.slot(id);
            let ms = self.state.modes().get(slot);
            let was = old.modes().get(slot);
            let invoke = if mode.invoke_delay == 0 {
                ms.is_active() && ms.start_frame != was.start_frame
            } else {
                ms.last_trigger == Some(now) && was.last_trigger != Some(now)
            };
            if !invoke {
                continue;
            }

            debug!(target: "cadence::dispatch", mode = mode.name, ?action, "dispatch");
            if let Some(observer) = self.observer.as_mut() {
                observer.on_dispatch(id, action);
            }
            if self.executor.exec(action, &self.state, old, Some(id)) == Outcome::Done {
                done.push(id);
            }
        }

        self.state.did_actions(old);
        for id in done {
            self.complete(id);
        }
    }
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// Scope guard from [`Context::transaction`].
///
/// Derefs to the context, so mutations and completions made through it are
/// propagated immediately but dispatched once, on drop, against the
/// snapshot taken when the guard opened.
///
/// ```rust,ignore
/// {
///     let mut tx = ctx.transaction();
///     tx.complete(join);
///     tx.mutate(|s| s.joined = true);
/// } // one dispatch round here
/// ```
pub struct Transaction<'a, S: Host, C: Clock, E: Executor<S>> {
    ctx:     &'a mut Context<S, C, E>,
    initial: S,
}

impl<S: Host, C: Clock, E: Executor<S>> Transaction<'_, S, C, E> {
    /// The snapshot dispatch will compare against.
    pub fn initial(&self) -> &S {
        &self.initial
    }
}

impl<S: Host, C: Clock, E: Executor<S>> Deref for Transaction<'_, S, C, E> {
    type Target = Context<S, C, E>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<S: Host, C: Clock, E: Executor<S>> DerefMut for Transaction<'_, S, C, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl<S: Host, C: Clock, E: Executor<S>> Drop for Transaction<'_, S, C, E> {
    fn drop(&mut self) {
        let initial = std::mem::take(&mut self.initial);
        self.ctx.resume_actions(&initial);
    }
}
