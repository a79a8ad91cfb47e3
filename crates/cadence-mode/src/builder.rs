//! Two-phase builder for [`ModeTree`].
//!
//! Phase one declares every node and hands out its [`ModeId`]; phase two
//! configures nodes, freely referring to ids declared after them.  `build`
//! validates the structure and freezes it.
//!
//! ```rust,ignore
//! let mut b = TreeBuilder::<Tracker>::new();
//! let main  = b.declare("Main");
//! let sleep = b.declare("Sleep");
//! let join  = b.declare("Join");
//!
//! b.mode(main).repeat_limit(1).child(sleep).idle(sleep).child(join);
//! b.mode(sleep).action(TrackerAction::ChangeSleep);
//! b.mode(join).required(|s| !s.joined).action(TrackerAction::AttemptJoin);
//! let tree = b.build()?;
//! ```

use rustc_hash::FxHashSet;

use cadence_core::{ModeId, Periodic, TimeUnit};

use crate::mode::{InspirationFn, RequiredFn, STORAGE_TAG_LEN};
use crate::{Host, Mode, ModeError, ModeResult, ModeTree};

pub struct TreeBuilder<S: Host> {
    modes: Vec<Mode<S>>,
}

impl<S: Host> Default for TreeBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Host> TreeBuilder<S> {
    pub fn new() -> Self {
        Self { modes: Vec::new() }
    }

    /// Reserve a node.  Its configuration defaults to "no constraints, no
    /// children, no action".
    pub fn declare(&mut self, name: &'static str) -> ModeId {
        let id = ModeId(self.modes.len().min(u16::MAX as usize) as u16);
        self.modes.push(Mode::named(name));
        id
    }

    /// Configure a declared node.
    ///
    /// # Panics
    /// Panics if `id` was not returned by this builder's `declare`.
    pub fn mode(&mut self, id: ModeId) -> ModeBuilder<'_, S> {
        ModeBuilder { mode: &mut self.modes[id.index()] }
    }

    /// Validate and freeze the tree.
    pub fn build(self) -> ModeResult<ModeTree<S>> {
        let count = self.modes.len();
        if count >= u16::MAX as usize {
            return Err(ModeError::TooManyModes(count));
        }

        let name_of = |id: ModeId| self.modes[id.index()].name;
        let mut idle_targets = FxHashSet::default();

        for mode in &self.modes {
            let linked = mode
                .children
                .iter()
                .map(|&c| (c, "child"))
                .chain(mode.idle.map(|i| (i, "idle mode")))
                .chain(mode.follow.map(|f| (f, "follow mode")));
            for (id, what) in linked {
                if id.index() >= count {
                    return Err(ModeError::Dangling { mode: mode.name, id, what });
                }
            }

            let mut seen = FxHashSet::default();
            for &child in &mode.children {
                if !seen.insert(child) {
                    return Err(ModeError::DuplicateChild { mode: mode.name, child: name_of(child) });
                }
            }

            if let Some(idle) = mode.idle {
                if !mode.children.contains(&idle) {
                    return Err(ModeError::IdleNotChild { mode: mode.name, idle: name_of(idle) });
                }
                idle_targets.insert(idle);
            }

            if let Some(tag) = &mode.storage_tag {
                let valid = !tag.is_empty()
                    && tag.len() <= STORAGE_TAG_LEN
                    && tag.bytes().all(|b| b.is_ascii_alphanumeric());
                if !valid {
                    return Err(ModeError::InvalidStorageTag { mode: mode.name, tag: tag.clone() });
                }
            }
        }

        for (i, mode) in self.modes.iter().enumerate() {
            let id = ModeId(i as u16);
            if mode.follow == Some(id) {
                return Err(ModeError::SelfFollow(mode.name));
            }
            if mode.follow.is_some() && idle_targets.contains(&id) {
                return Err(ModeError::IdleFollower(mode.name));
            }
        }

        // Iterative three-colour DFS over child links.
        const WHITE: u8 = 0;
        const GREY:  u8 = 1;
        const BLACK: u8 = 2;
        let mut colour = vec![WHITE; count];
        for start in 0..count {
            if colour[start] != WHITE {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            colour[start] = GREY;
            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                top.1 += 1;
                if let Some(&child) = self.modes[node].children.get(next) {
                    match colour[child.index()] {
                        GREY => return Err(ModeError::Cycle(name_of(child))),
                        WHITE => {
                            colour[child.index()] = GREY;
                            stack.push((child.index(), 0));
                        }
                        _ => {}
                    }
                } else {
                    colour[node] = BLACK;
                    stack.pop();
                }
            }
        }

        Ok(ModeTree::new(self.modes))
    }
}

// ── ModeBuilder ───────────────────────────────────────────────────────────────

/// Fluent configuration of one declared node.
pub struct ModeBuilder<'b, S: Host> {
    mode: &'b mut Mode<S>,
}

impl<S: Host> ModeBuilder<'_, S> {
    /// Append a child; children are visited in the order they are added.
    pub fn child(self, child: ModeId) -> Self {
        self.mode.children.push(child);
        self
    }

    /// Designate one of the children as the fallback activated when all
    /// other children are inactive.
    pub fn idle(self, idle: ModeId) -> Self {
        self.mode.idle = Some(idle);
        self
    }

    /// Activate only when `mode` has just finished.
    pub fn follow(self, mode: ModeId) -> Self {
        self.mode.follow = Some(mode);
        self
    }

    pub fn repeat_limit(self, limit: u8) -> Self {
        self.mode.repeat_limit = limit;
        self
    }

    pub fn min_duration(self, ms: u32) -> Self {
        self.mode.min_duration = ms;
        self
    }

    pub fn max_duration(self, ms: u32) -> Self {
        self.mode.max_duration = ms;
        self
    }

    pub fn min_gap(self, ms: u32) -> Self {
        self.mode.min_gap = ms;
        self
    }

    pub fn invoke_delay(self, ms: u32) -> Self {
        self.mode.invoke_delay = ms;
        self
    }

    pub fn periodic(self, times: u16, unit: TimeUnit) -> Self {
        self.mode.periodic = Some(Periodic::new(times, unit));
        self
    }

    pub fn child_activation_limit(self, limit: u8) -> Self {
        self.mode.child_activation_limit = limit;
        self
    }

    pub fn child_simultaneous_limit(self, limit: u8) -> Self {
        self.mode.child_simultaneous_limit = limit;
        self
    }

    pub fn required(self, required: RequiredFn<S>) -> Self {
        self.mode.required = Some(required);
        self
    }

    pub fn inspiration(self, inspiration: InspirationFn<S>) -> Self {
        self.mode.inspiration = Some(inspiration);
        self
    }

    pub fn action(self, action: S::Action) -> Self {
        self.mode.action = Some(action);
        self
    }

    /// Persist this mode's schedule under `tag` (at most 5 characters).
    pub fn storage_tag(self, tag: &str) -> Self {
        self.mode.storage_tag = Some(tag.to_owned());
        self
    }
}
