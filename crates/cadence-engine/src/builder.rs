//! Fluent builder for constructing a [`Context`].

use cadence_core::{Clock, CoreError, EngineConfig, Millis, ModeId};
use cadence_mode::{Attachments, Executor, Host, ModeTree};
use cadence_store::Store;

use crate::{Context, ContextObserver, EngineResult};

/// Fluent builder for [`Context<S, C, E>`].
///
/// # Required inputs
///
/// - [`ModeTree`] and its root, from [`cadence_mode::TreeBuilder`]
/// - `S: Host`: the initial snapshot (usually `S::default()`)
/// - `C: Clock`: [`cadence_core::SystemClock`] on a device, `FakeClock` in tests
/// - `E: Executor<S>`: runs the selected actions
///
/// # Optional inputs (have defaults)
///
/// | Method         | Default                                     |
/// |----------------|---------------------------------------------|
/// | `.store(s)`    | none: schedules restart from scratch        |
/// | `.observer(o)` | none                                        |
/// | `.config(c)`   | `EngineConfig::default()`                   |
///
/// # Example
///
/// ```rust,ignore
/// let (tree, modes) = tracker_tree()?;
/// let mut ctx = ContextBuilder::new(tree, modes.main, TrackerState::default(), clock, executor)
///     .store(MemoryStore::new())
///     .config(config)
///     .build()?;
/// ctx.init();
/// ctx.begin()?;
/// ```
pub struct ContextBuilder<S: Host, C: Clock, E: Executor<S>> {
    tree:     ModeTree<S>,
    root:     ModeId,
    state:    S,
    clock:    C,
    executor: E,
    store:    Option<Box<dyn Store>>,
    observer: Option<Box<dyn ContextObserver<S>>>,
    config:   EngineConfig,
}

impl<S: Host, C: Clock, E: Executor<S>> ContextBuilder<S, C, E> {
    /// Create a builder with all required inputs.
    pub fn new(tree: ModeTree<S>, root: ModeId, state: S, clock: C, executor: E) -> Self {
        Self {
            tree,
            root,
            state,
            clock,
            executor,
            store:    None,
            observer: None,
            config:   EngineConfig::default(),
        }
    }

    /// Persist periodic and min-gap schedules in `store`.
    pub fn store(mut self, store: impl Store + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn observer(mut self, observer: impl ContextObserver<S> + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate inputs and return a context ready for `init`.
    pub fn build(self) -> EngineResult<Context<S, C, E>> {
        self.config.validate()?;
        if self.tree.get(self.root).is_none() {
            return Err(CoreError::ModeNotFound(self.root).into());
        }

        Ok(Context {
            tree:            self.tree,
            root:            self.root,
            state:           self.state,
            clock:           self.clock,
            executor:        self.executor,
            store:           self.store,
            observer:        self.observer,
            config:          self.config,
            links:           Attachments::default(),
            invoke:          Vec::new(),
            timed:           Vec::new(),
            hold_level:      1,
            initialized:     false,
            boot_millis:     Millis::ZERO,
            last_checkpoint: Millis::ZERO,
        })
    }
}
