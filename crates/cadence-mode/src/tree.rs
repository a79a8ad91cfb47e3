//! The built mode tree and the propagation pass.
//!
//! # Frame
//!
//! Every frame visits the tree top-down from the root, exactly once per
//! parent link, in declaration order:
//!
//! ```text
//! propagate(mode, signal):
//!   ① active   → terminate on expiry, finished action, or required == false
//!                otherwise, if signal is unsupportive, count down parents;
//!                the last unsupportive parent terminates, earlier ones defer
//!   ② inactive → activate on IdleCell, Inspiring + required, or an edge
//!                under Active/Sustaining (or when the followed mode ends)
//!   ③ derive the outgoing signal from (active now, active before, persistent)
//!   ④ active   → visit children under the concurrency caps, idle mode last
//!   ⑤ active   → self-terminate when barren and not persistent
//!   ⑥ stamp the trigger time when a period or invoke delay fired
//! ```
//!
//! All decisions compare the live snapshot against the `old` snapshot taken
//! before the mutation that started the frame.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use cadence_core::ModeId;

use crate::{Activation, Attachment, Attachments, Host, Mode, ModeState};

/// Modes gathered once at init, each list in first-visit pre-order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Collected {
    /// Modes with an action, in dispatch order.
    pub invoke: Vec<ModeId>,
    /// Modes that can change state from the passage of time alone.
    pub timed:  Vec<ModeId>,
}

/// Immutable mode DAG produced by [`TreeBuilder`](crate::TreeBuilder).
pub struct ModeTree<S: Host> {
    modes: Vec<Mode<S>>,
}

impl<S: Host> ModeTree<S> {
    pub(crate) fn new(modes: Vec<Mode<S>>) -> Self {
        Self { modes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    #[inline]
    pub fn mode(&self, id: ModeId) -> &Mode<S> {
        &self.modes[id.index()]
    }

    pub fn get(&self, id: ModeId) -> Option<&Mode<S>> {
        self.modes.get(id.index())
    }

    /// Look a mode up by name.
    pub fn find(&self, name: &str) -> Option<ModeId> {
        self.modes.iter().position(|m| m.name == name).map(|i| ModeId(i as u16))
    }

    /// Walk the tree below `root` collecting invoke and time-dependent modes.
    pub fn collect(&self, root: ModeId) -> Collected {
        let mut seen = FxHashSet::default();
        let mut out = Collected::default();
        self.collect_into(root, &mut seen, &mut out);
        out
    }

    fn collect_into(&self, id: ModeId, seen: &mut FxHashSet<ModeId>, out: &mut Collected) {
        if !seen.insert(id) {
            return;
        }
        let mode = self.mode(id);
        if mode.action.is_some() {
            out.invoke.push(id);
        }
        if mode.is_time_dependent() {
            out.timed.push(id);
        }
        for &child in &mode.children {
            self.collect_into(child, seen, out);
        }
    }

    /// Give every mode below `root` an arena slot.
    ///
    /// A mode reached again through another parent only gains a parent
    /// count.  `seed` runs once per newly attached mode with its zeroed
    /// state, so persisted schedules can be restored.
    ///
    /// # Panics
    /// Panics if the arena runs out of slots.
    pub fn attach<F>(&self, id: ModeId, links: &mut Attachments, state: &mut S, seed: &mut F)
    where
        F: FnMut(ModeId, &Mode<S>, &mut ModeState, &mut Attachment),
    {
        let link = links.get_mut(id);
        if link.slot.is_some() {
            link.parents = link.parents.saturating_add(1);
            return;
        }
        let slot = state.modes_mut().allocate();
        *link = Attachment::attached(slot);

        let mode = self.mode(id);
        let ms = state.modes_mut().get_mut(slot);
        *ms = ModeState::default();
        seed(id, mode, ms, link);
        trace!(target: "cadence::mode", mode = mode.name, slot = slot.0, "attached");

        for &child in &mode.children {
            self.attach(child, links, state, seed);
        }
    }

    /// Start `id` now, subject to repeat limit and minimum gap.
    pub fn activate(&self, id: ModeId, links: &Attachments, state: &mut S) -> bool {
        let mode = self.mode(id);
        let frame = state.modes().frame();
        let now = state.modes().millis();
        let ms = state.modes_mut().get_mut(links.slot(id));

        if ms.is_active() {
            return false;
        }
        if mode.hit_repeat_limit(ms) {
            trace!(target: "cadence::mode", mode = mode.name, count = ms.invocation_count, "repeat limit reached");
            return false;
        }
        if mode.insufficient_gap(ms, now) {
            trace!(target: "cadence::mode", mode = mode.name, "minimum gap not elapsed");
            return false;
        }

        ms.start_frame = frame;
        ms.start_millis = now;
        ms.invocation_count = ms.invocation_count.saturating_add(1);
        ms.child_inspiration_count = 0;
        if mode.action.is_some() {
            ms.invocation_active = true;
        }
        if mode.action.is_some() || mode.invoke_delay != 0 {
            ms.last_trigger = None;
        }
        debug!(target: "cadence::mode", mode = mode.name, frame, count = ms.invocation_count, "activate");
        true
    }

    /// Stop `id` now.  A running action is not notified; only its flag is
    /// cleared.
    pub fn terminate(&self, id: ModeId, links: &Attachments, state: &mut S) {
        let now = state.modes().millis();
        let ms = state.modes_mut().get_mut(links.slot(id));
        ms.start_frame = 0;
        ms.end_millis = Some(now);
        ms.invocation_active = false;
        debug!(target: "cadence::mode", mode = self.mode(id).name, "terminate");
    }

    /// Run one propagation pass from `id` with incoming `signal`.
    pub fn propagate(
        &self,
        id:     ModeId,
        signal: Activation,
        links:  &mut Attachments,
        state:  &mut S,
        old:    &S,
    ) -> bool {
        Pass { tree: self, links, old }.propagate(id, signal, state)
    }

    /// Milliseconds until the next expiry, minimum-duration end, invoke
    /// delay, or periodic trigger of any active mode below `id`, capped at
    /// `limit`.
    pub fn max_sleep(&self, id: ModeId, links: &Attachments, state: &S, limit: u32) -> u32 {
        let mode = self.mode(id);
        let ms = state.modes().get(links.slot(id));
        if !ms.is_active() {
            return limit;
        }
        let now = state.modes().millis();
        let elapsed = now.since(ms.start_millis);
        let mut sleep = limit;

        if mode.max_duration != 0 {
            sleep = sleep.min(mode.max_duration.saturating_sub(elapsed));
        }
        if mode.within_min_duration(ms, now) {
            sleep = sleep.min(mode.min_duration - elapsed);
        }
        if mode.invoke_delay != 0 {
            if ms.last_trigger.is_none() {
                sleep = sleep.min(mode.invoke_delay.saturating_sub(elapsed));
            }
        } else if mode.period() != 0 {
            let due = match ms.last_trigger {
                None       => 0,
                Some(last) => mode.period().saturating_sub(now.since(last)),
            };
            sleep = sleep.min(due);
        }

        mode.children
            .iter()
            .fold(sleep, |acc, &child| self.max_sleep(child, links, state, acc))
    }

    /// Log the tree below `id` with each mode's state, one line per mode.
    pub fn dump(&self, id: ModeId, links: &Attachments, state: &S) {
        self.dump_at(id, links, state, 0);
    }

    fn dump_at(&self, id: ModeId, links: &Attachments, state: &S, depth: usize) {
        let mode = self.mode(id);
        let ms = state.modes().get(links.slot(id));
        let pad = "  ".repeat(depth);
        debug!(
            target: "cadence::dump",
            "{pad}{} active={} start={} end={:?} trigger={:?} running={} count={} inspired={}",
            mode.name,
            ms.is_active(),
            ms.start_millis,
            ms.end_millis.map(|m| m.0),
            ms.last_trigger.map(|m| m.0),
            ms.invocation_active,
            ms.invocation_count,
            ms.child_inspiration_count,
        );
        for &child in &mode.children {
            self.dump_at(child, links, state, depth + 1);
        }
    }
}

// ── Pass ──────────────────────────────────────────────────────────────────────

/// One frame's traversal.
struct Pass<'a, S: Host> {
    tree:  &'a ModeTree<S>,
    links: &'a mut Attachments,
    old:   &'a S,
}

impl<'a, S: Host> Pass<'a, S> {
    #[inline]
    fn ms(&self, id: ModeId, state: &S) -> ModeState {
        *state.modes().get(self.links.slot(id))
    }

    #[inline]
    fn ms_mut<'s>(&self, id: ModeId, state: &'s mut S) -> &'s mut ModeState {
        state.modes_mut().get_mut(self.links.slot(id))
    }

    #[inline]
    fn is_active(&self, id: ModeId, state: &S) -> bool {
        self.ms(id, state).is_active()
    }

    #[inline]
    fn was_active(&self, id: ModeId) -> bool {
        self.ms(id, self.old).is_active()
    }

    fn persistent(&self, id: ModeId, state: &S) -> bool {
        let tree = self.tree;
        let mode = tree.mode(id);
        let ms = self.ms(id, state);
        let now = state.modes().millis();

        (mode.action.is_some() && ms.invocation_active)
            || mode.within_min_duration(&ms, now)
            || (mode.period() != 0
                && mode
                    .children
                    .iter()
                    .any(|&c| !tree.mode(c).hit_repeat_limit(&self.ms(c, state))))
    }

    fn inspiring(&self, id: ModeId, parent: Activation, state: &S) -> bool {
        let mode = self.tree.mode(id);
        if !mode.required_state(state) {
            return false;
        }
        match mode.follow {
            None => match parent {
                Activation::IdleCell | Activation::Inspiring => true,
                Activation::Active | Activation::Sustaining => mode.inspired(state, self.old),
                Activation::Expiring | Activation::Inactive => false,
            },
            Some(followed) => {
                parent.is_supportive() && self.was_active(followed) && !self.is_active(followed, state)
            }
        }
    }

    /// The signal this mode passes on to its children.
    fn activation(&self, id: ModeId, state: &S) -> Activation {
        let now = state.modes().millis();
        let active = self.is_active(id, state);
        let was = self.was_active(id);

        match (active, was) {
            (true, _) if self.persistent(id, state) => {
                if self.tree.mode(id).triggered(&self.ms(id, state), now) {
                    Activation::Inspiring
                } else {
                    Activation::Sustaining
                }
            }
            (true, true)   => Activation::Active,
            (true, false)  => Activation::Inspiring,
            (false, true)  => Activation::Expiring,
            (false, false) => Activation::Inactive,
        }
    }

    fn propagate(&mut self, id: ModeId, parent: Activation, state: &mut S) -> bool {
        let tree = self.tree;
        let mode = tree.mode(id);
        let now = state.modes().millis();

        if self.is_active(id, state) {
            let ms = self.ms(id, state);
            let old_ms = self.ms(id, self.old);
            if mode.expired(&ms, now)
                || mode.invocation_terminated(&ms, &old_ms)
                || !mode.required_state(state)
            {
                tree.terminate(id, self.links, state);
            } else if !parent.is_supportive() {
                let frame = state.modes().frame();
                if self.links.release_parent(id, frame) == 0 {
                    tree.terminate(id, self.links, state);
                } else {
                    // Another parent still supports it this frame.
                    return false;
                }
            }
        } else {
            assert!(
                !(parent == Activation::IdleCell && mode.follow.is_some()),
                "mode `{}` received an idle-cell activation but has a follow mode",
                mode.name
            );
            if self.inspiring(id, parent, state) {
                if parent == Activation::Inspiring {
                    self.ms_mut(id, state).invocation_count = 0;
                }
                tree.activate(id, self.links, state);
            }
        }

        let signal = self.activation(id, state);
        if self.is_active(id, state) {
            return self.propagate_active(id, parent, signal, state);
        }
        for &child in &mode.children {
            self.propagate(child, signal, state);
        }
        false
    }

    fn propagate_active(
        &mut self,
        id:     ModeId,
        parent: Activation,
        signal: Activation,
        state:  &mut S,
    ) -> bool {
        let tree = self.tree;
        let mode = tree.mode(id);
        let now = state.modes().millis();

        let mut barren = true;
        let mut limit = i32::MAX;
        let mut remaining = i32::MAX;
        if mode.child_simultaneous_limit != 0 {
            let running = mode.children.iter().filter(|&&c| self.is_active(c, state)).count() as i32;
            limit = mode.child_simultaneous_limit as i32 - running;
        }
        if mode.child_activation_limit != 0 {
            remaining = mode.child_activation_limit as i32
                - self.ms(id, state).child_inspiration_count as i32;
            limit = limit.min(remaining);
        }

        let mut child_signal = if limit <= 0 { Activation::Sustaining } else { signal };
        let mut skipped_idle = false;

        for &child in &mode.children {
            if Some(child) == mode.idle && child_signal != Activation::Sustaining {
                skipped_idle = true;
                continue;
            }
            let was_active = self.is_active(child, state);
            let active = self.propagate(child, child_signal, state);
            barren &= !active;
            if active && !was_active {
                let ms = self.ms_mut(id, state);
                ms.child_inspiration_count = ms.child_inspiration_count.saturating_add(1);
                remaining -= 1;
                limit -= 1;
                if limit <= 0 {
                    child_signal = Activation::Sustaining;
                    if skipped_idle {
                        if let Some(idle) = mode.idle {
                            self.propagate(idle, Activation::Sustaining, state);
                        }
                    }
                }
            }
        }

        let persistent = self.persistent(id, state);
        if !mode.children.is_empty() && remaining <= 0 && barren && !persistent {
            trace!(target: "cadence::mode", mode = mode.name, "barren with no activation budget");
            tree.terminate(id, self.links, state);
        } else if child_signal != Activation::Sustaining {
            match mode.idle {
                Some(idle) if barren => {
                    if limit > 0 {
                        let was_active = self.is_active(idle, state);
                        if self.propagate(idle, Activation::IdleCell, state) && !was_active {
                            let ms = self.ms_mut(id, state);
                            ms.child_inspiration_count = ms.child_inspiration_count.saturating_add(1);
                        }
                    }
                }
                Some(idle) => {
                    self.propagate(idle, Activation::Inactive, state);
                }
                None => {
                    if barren && parent != Activation::IdleCell && !persistent {
                        tree.terminate(id, self.links, state);
                    }
                }
            }
        }

        if mode.triggered(&self.ms(id, state), now) {
            self.ms_mut(id, state).last_trigger = Some(now);
            if let Some(wait) = self.links.get_mut(id).wait.as_mut() {
                wait.restart(now);
            }
            debug!(target: "cadence::mode", mode = mode.name, at = now.0, "triggered");
        }

        self.is_active(id, state)
    }
}
