//! Integration tests for cadence-engine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_core::{CoreError, EngineConfig, FakeClock, ModeId, TimeUnit};
use cadence_mode::{Executor, Host, ModeArena, ModeTree, TreeBuilder};
use cadence_store::{MemoryStore, Store, StoreError, StoreResult, StoreTag};

use crate::{Context, ContextBuilder, ContextObserver, EngineError, Recorder};

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Clone, Default, Debug)]
struct Bench {
    a:     bool,
    b:     bool,
    power: bool,
    modes: ModeArena,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Act {
    Ping,
    Pong,
    Rest,
    Power,
}

impl Host for Bench {
    type Action = Act;

    fn modes(&self) -> &ModeArena {
        &self.modes
    }

    fn modes_mut(&mut self) -> &mut ModeArena {
        &mut self.modes
    }

    fn on_change(&self, old: &Self, executor: &mut dyn Executor<Self>) {
        if self.power != old.power {
            executor.exec(Act::Power, self, old, None);
        }
    }
}

type Ctx = Context<Bench, FakeClock, Recorder<Act>>;

const BOOT: u32 = 1_000;

fn req_a(s: &Bench) -> bool {
    s.a
}

fn req_b(s: &Bench) -> bool {
    s.b
}

/// Hang `children` under a fresh root whose idle child `Rest` runs
/// `Act::Rest`.
fn rooted(mut b: TreeBuilder<Bench>, children: &[ModeId]) -> (ModeTree<Bench>, ModeId) {
    let root = b.declare("Root");
    let rest = b.declare("Rest");
    let mut m = b.mode(root);
    for &child in children {
        m = m.child(child);
    }
    m.child(rest).idle(rest);
    b.mode(rest).action(Act::Rest);
    (b.build().unwrap(), root)
}

fn builder(
    (tree, root): (ModeTree<Bench>, ModeId),
    clock: &FakeClock,
    executor: Recorder<Act>,
) -> ContextBuilder<Bench, FakeClock, Recorder<Act>> {
    ContextBuilder::new(tree, root, Bench::default(), clock.clone(), executor)
}

fn boot(builder: ContextBuilder<Bench, FakeClock, Recorder<Act>>) -> Ctx {
    let mut ctx = builder.build().unwrap();
    ctx.init();
    ctx.begin().unwrap();
    ctx
}

fn take(ctx: &mut Ctx) -> Vec<Act> {
    ctx.executor_mut().take()
}

fn id(ctx: &Ctx, name: &str) -> ModeId {
    ctx.tree().find(name).unwrap()
}

/// root → [Ping (required a), Rest].
fn ping_tree(setup: impl FnOnce(&mut TreeBuilder<Bench>, ModeId)) -> (ModeTree<Bench>, ModeId) {
    let mut b = TreeBuilder::new();
    let ping = b.declare("Ping");
    b.mode(ping).required(req_a).action(Act::Ping);
    setup(&mut b, ping);
    rooted(b, &[ping])
}

/// root → [Beat (6/hour, tag "beat") → [Ping], Rest].
fn beat_tree() -> (ModeTree<Bench>, ModeId) {
    let mut b = TreeBuilder::new();
    let beat = b.declare("Beat");
    let ping = b.declare("Ping");
    b.mode(beat).periodic(6, TimeUnit::Hour).storage_tag("beat").child(ping);
    b.mode(ping).action(Act::Ping);
    rooted(b, &[beat])
}

const BEAT_PERIOD: u32 = 600_000;
const EPOCH: u32 = 1_700_000_000;

/// A store the test can still read after handing a clone to the context.
#[derive(Clone, Default)]
struct Shared(Rc<RefCell<MemoryStore>>);

impl Shared {
    fn with_u32(tag: &str, value: u32) -> Self {
        Shared(Rc::new(RefCell::new(MemoryStore::new().with_u32(tag, value).unwrap())))
    }

    fn committed(&self, tag: &str) -> Option<u32> {
        self.0.borrow().committed_u32(tag)
    }
}

impl Store for Shared {
    fn begin(&mut self) -> StoreResult<()> {
        self.0.borrow_mut().begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.0.borrow_mut().commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.0.borrow_mut().rollback()
    }

    fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
        self.0.borrow_mut().load(tag)
    }

    fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()> {
        self.0.borrow_mut().save(tag, value)
    }
}

/// Every load and save fails.
struct Broken;

impl Store for Broken {
    fn begin(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn load(&mut self, _tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
        Err(StoreError::Io(std::io::Error::other("flash offline")))
    }

    fn save(&mut self, _tag: &StoreTag, _value: &[u8]) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("flash offline")))
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn rejects_invalid_config() {
        let clock = FakeClock::starting_at(BOOT);
        let config = EngineConfig { real_time_epoch: Some(0), ..EngineConfig::default() };
        let result = builder(ping_tree(|_, _| {}), &clock, Recorder::new()).config(config).build();
        assert!(matches!(result.err(), Some(EngineError::Core(CoreError::Config(_)))));
    }

    #[test]
    fn rejects_unknown_root() {
        let clock = FakeClock::starting_at(BOOT);
        let (tree, _) = ping_tree(|_, _| {});
        let result = builder((tree, ModeId(40)), &clock, Recorder::new()).build();
        assert!(matches!(result.err(), Some(EngineError::Core(CoreError::ModeNotFound(_)))));
    }

    #[test]
    fn begin_requires_init() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = builder(ping_tree(|_, _| {}), &clock, Recorder::new()).build().unwrap();
        assert!(matches!(ctx.begin(), Err(EngineError::NotInitialized)));
        assert_eq!(ctx.hold_level(), 1);
    }

    #[test]
    fn init_collects_modes_in_declaration_order() {
        let clock = FakeClock::starting_at(BOOT);
        let ctx = boot(builder(beat_tree(), &clock, Recorder::new()));
        let names: Vec<_> = ctx.invoke_modes().iter().map(|&m| ctx.tree().mode(m).name).collect();
        assert_eq!(names, ["Ping", "Rest"]);
        let timed: Vec<_> = ctx.timed_modes().iter().map(|&m| ctx.tree().mode(m).name).collect();
        assert_eq!(timed, ["Beat"]);
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[test]
    fn boot_dispatches_idle_mode() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        assert_eq!(take(&mut ctx), [Act::Rest]);
        assert!(ctx.is_active(id(&ctx, "Rest")));
        assert_eq!(ctx.hold_level(), 0);
    }

    #[test]
    fn edge_dispatches_once_and_idle_returns_on_completion() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let ping = id(&ctx, "Ping");
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping]);
        assert!(!ctx.is_active(id(&ctx, "Rest")));

        // Steady-true required predicate does not re-trigger.
        ctx.mutate(|s| s.b = true);
        ctx.mutate(|s| s.b = false);
        assert!(take(&mut ctx).is_empty());
        assert!(ctx.mode_state(ping).unwrap().invocation_active);

        ctx.complete(ping);
        assert_eq!(take(&mut ctx), [Act::Rest]);
        assert!(!ctx.is_active(ping));
    }

    #[test]
    fn mutations_before_begin_coalesce_into_boot_dispatch() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = builder(ping_tree(|_, _| {}), &clock, Recorder::new()).build().unwrap();
        ctx.init();
        ctx.mutate(|s| s.a = true);
        assert!(ctx.executor().calls().is_empty());

        ctx.begin().unwrap();
        assert_eq!(take(&mut ctx), [Act::Ping]);
    }

    #[test]
    fn dispatch_records_triggering_mode() {
        let clock = FakeClock::starting_at(BOOT);
        let ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let rest = id(&ctx, "Rest");
        assert_eq!(ctx.executor().calls(), [(Act::Rest, Some(rest))]);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let ping = id(&ctx, "Ping");
        let frame = ctx.frame();
        ctx.complete(ping);
        assert_eq!(ctx.frame(), frame);
        assert_eq!(ctx.hold_level(), 0);
    }

    #[test]
    fn complete_with_applies_mutation_in_one_frame() {
        let clock = FakeClock::starting_at(BOOT);
        let mut b = TreeBuilder::new();
        let ping = b.declare("Ping");
        let pong = b.declare("Pong");
        b.mode(ping).required(req_a).action(Act::Ping);
        b.mode(pong).required(req_b).action(Act::Pong);
        let mut ctx = boot(builder(rooted(b, &[ping, pong]), &clock, Recorder::new()));
        ctx.mutate(|s| s.a = true);
        take(&mut ctx);

        let frame = ctx.frame();
        ctx.complete_with(ping, |s| s.b = true);
        assert_eq!(ctx.frame(), frame + 1);
        assert_eq!(take(&mut ctx), [Act::Pong]);
        assert!(!ctx.is_active(ping));
        assert!(ctx.is_active(pong));
    }

    #[test]
    fn inline_completion_runs_after_dispatch() {
        let clock = FakeClock::starting_at(BOOT);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, executor));
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping, Act::Rest]);
        assert!(!ctx.is_active(id(&ctx, "Ping")));
        assert_eq!(ctx.hold_level(), 0);
    }
}

// ── Limits ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod limit_tests {
    use super::*;

    #[test]
    fn repeat_limit_blocks_until_rearm() {
        let clock = FakeClock::starting_at(BOOT);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(ping_tree(|b, m| { b.mode(m).repeat_limit(1); }), &clock, executor));
        let ping = id(&ctx, "Ping");
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping, Act::Rest]);

        ctx.mutate(|s| s.a = false);
        let before = *ctx.mode_state(ping).unwrap();
        ctx.mutate(|s| s.a = true);
        assert!(take(&mut ctx).is_empty());
        assert_eq!(*ctx.mode_state(ping).unwrap(), before);

        ctx.rearm(ping).unwrap();
        assert_eq!(ctx.mode_state(ping).unwrap().invocation_count, 0);
        ctx.mutate(|s| s.a = false);
        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping, Act::Rest]);
        assert_eq!(ctx.mode_state(ping).unwrap().invocation_count, 1);
    }

    #[test]
    fn rearm_unknown_mode_errors() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        assert!(matches!(ctx.rearm(ModeId(99)), Err(EngineError::Core(CoreError::ModeNotFound(_)))));
    }

    #[test]
    fn min_gap_delays_reactivation() {
        let clock = FakeClock::starting_at(BOOT);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(ping_tree(|b, m| { b.mode(m).min_gap(60_000); }), &clock, executor));
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping, Act::Rest]);
        ctx.mutate(|s| s.a = false);

        clock.advance_seconds(30);
        ctx.mutate(|s| s.a = true);
        assert!(take(&mut ctx).is_empty());
        ctx.mutate(|s| s.a = false);

        clock.advance_seconds(30);
        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping, Act::Rest]);
    }

    #[test]
    fn child_limits_allow_one_child_per_activation() {
        let clock = FakeClock::starting_at(BOOT);
        let mut b = TreeBuilder::new();
        let pair = b.declare("Pair");
        let left = b.declare("Left");
        let right = b.declare("Right");
        b.mode(pair)
            .required(req_a)
            .child_activation_limit(1)
            .child_simultaneous_limit(1)
            .child(left)
            .child(right);
        b.mode(left).action(Act::Ping);
        b.mode(right).action(Act::Pong);
        let mut ctx = boot(builder(rooted(b, &[pair]), &clock, Recorder::new()));
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert_eq!(take(&mut ctx), [Act::Ping]);
        assert!(ctx.is_active(left));
        assert!(!ctx.is_active(right));

        // Budget spent: the pair ends instead of starting its second child.
        ctx.complete(left);
        assert_eq!(take(&mut ctx), [Act::Rest]);
        assert!(!ctx.is_active(pair));
        assert!(!ctx.is_active(right));
        assert_eq!(ctx.executor().count(Act::Pong), 0);
    }

    #[test]
    fn shared_child_ends_with_its_last_parent() {
        let clock = FakeClock::starting_at(BOOT);
        let mut b = TreeBuilder::new();
        let left = b.declare("Left");
        let right = b.declare("Right");
        let shared = b.declare("Shared");
        b.mode(left).required(req_a).child(shared);
        b.mode(right).required(req_b).child(shared);
        b.mode(shared).action(Act::Ping);
        let mut ctx = boot(builder(rooted(b, &[left, right]), &clock, Recorder::new()));
        take(&mut ctx);

        ctx.mutate(|s| {
            s.a = true;
            s.b = true;
        });
        assert_eq!(take(&mut ctx), [Act::Ping]);

        ctx.mutate(|s| s.a = false);
        assert!(!ctx.is_active(left));
        assert!(ctx.is_active(shared));

        ctx.mutate(|s| s.b = false);
        assert!(!ctx.is_active(shared));
        assert!(!ctx.mode_state(shared).unwrap().invocation_active);
        assert_eq!(take(&mut ctx), [Act::Rest]);
    }
}

// ── Time ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod time_tests {
    use super::*;

    #[test]
    fn periodic_fires_at_activation_then_every_period() {
        let clock = FakeClock::starting_at(BOOT);
        let mut b = TreeBuilder::new();
        let beat = b.declare("Beat");
        let ping = b.declare("Ping");
        b.mode(beat).periodic(4, TimeUnit::Hour).child(ping);
        b.mode(ping).action(Act::Ping);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(rooted(b, &[beat]), &clock, executor));
        assert_eq!(take(&mut ctx), [Act::Ping]);
        assert_eq!(ctx.max_sleep(u32::MAX), 900_000);

        clock.advance_millis(899_999);
        assert!(!ctx.tick());
        assert!(take(&mut ctx).is_empty());
        assert_eq!(ctx.max_sleep(u32::MAX), 1);

        clock.advance_millis(1);
        assert!(ctx.tick());
        assert_eq!(take(&mut ctx), [Act::Ping]);
        assert!(ctx.is_active(beat));
    }

    #[test]
    fn idle_ticks_run_no_frame() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let frame = ctx.frame();
        for _ in 0..10 {
            clock.advance_seconds(1);
            assert!(!ctx.tick());
        }
        assert_eq!(ctx.frame(), frame);
    }

    #[test]
    fn invoke_delay_fires_once() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|b, m| { b.mode(m).invoke_delay(5_000); }), &clock, Recorder::new()));
        let ping = id(&ctx, "Ping");
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert!(take(&mut ctx).is_empty());
        assert!(ctx.is_active(ping));
        assert_eq!(ctx.max_sleep(u32::MAX), 5_000);

        clock.advance_millis(4_999);
        assert!(!ctx.tick());

        clock.advance_millis(1);
        assert!(ctx.tick());
        assert_eq!(take(&mut ctx), [Act::Ping]);

        clock.advance_seconds(10);
        assert!(!ctx.tick());
        assert!(take(&mut ctx).is_empty());
        assert!(ctx.is_active(ping));
    }

    #[test]
    fn min_duration_end_releases_a_barren_mode_on_tick() {
        let clock = FakeClock::starting_at(BOOT);
        let mut b = TreeBuilder::new();
        let hold = b.declare("Hold");
        b.mode(hold).required(req_a).min_duration(60_000);
        let mut ctx = boot(builder(rooted(b, &[hold]), &clock, Recorder::new()));
        take(&mut ctx);

        ctx.mutate(|s| s.a = true);
        assert!(ctx.is_active(hold));
        assert_eq!(ctx.max_sleep(u32::MAX), 60_000);

        clock.advance_seconds(59);
        assert!(!ctx.tick());
        assert!(ctx.is_active(hold));

        clock.advance_seconds(2);
        assert!(ctx.tick());
        assert!(!ctx.is_active(hold));
        assert_eq!(take(&mut ctx), [Act::Rest]);

        clock.advance_minutes(60);
        assert!(!ctx.tick());
    }

    #[test]
    fn max_duration_expires_on_tick() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|b, m| { b.mode(m).max_duration(60_000); }), &clock, Recorder::new()));
        let ping = id(&ctx, "Ping");
        ctx.mutate(|s| s.a = true);
        take(&mut ctx);

        clock.advance_seconds(59);
        assert!(!ctx.tick());
        assert!(ctx.is_active(ping));

        clock.advance_seconds(1);
        assert!(ctx.tick());
        assert!(!ctx.is_active(ping));
        assert_eq!(take(&mut ctx), [Act::Rest]);
    }
}

// ── Transactions ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod transaction_tests {
    use super::*;

    #[test]
    fn dispatch_deferred_until_guard_drops() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        take(&mut ctx);

        {
            let mut tx = ctx.transaction();
            tx.mutate(|s| s.power = true);
            tx.mutate(|s| s.a = true);
            assert!(tx.executor().calls().is_empty());
            assert_eq!(tx.hold_level(), 1);
            assert!(!tx.initial().power);
        }
        assert_eq!(take(&mut ctx), [Act::Power, Act::Ping]);
        assert_eq!(ctx.hold_level(), 0);
    }

    #[test]
    fn net_zero_change_dispatches_nothing() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        take(&mut ctx);

        {
            let mut tx = ctx.transaction();
            tx.mutate(|s| s.power = true);
            tx.mutate(|s| s.power = false);
        }
        assert!(take(&mut ctx).is_empty());
    }

    #[test]
    fn nested_transactions_dispatch_once() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        take(&mut ctx);

        {
            let mut outer = ctx.transaction();
            {
                let mut inner = outer.transaction();
                inner.mutate(|s| s.a = true);
            }
            assert!(outer.executor().calls().is_empty());
            outer.mutate(|s| s.power = true);
        }
        assert_eq!(take(&mut ctx), [Act::Power, Act::Ping]);
    }

    #[test]
    fn completion_inside_transaction_coalesces() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let ping = id(&ctx, "Ping");
        ctx.mutate(|s| s.a = true);
        take(&mut ctx);

        {
            let mut tx = ctx.transaction();
            tx.complete(ping);
            tx.mutate(|s| s.power = true);
        }
        assert_eq!(take(&mut ctx), [Act::Power, Act::Rest]);
    }

    #[test]
    #[should_panic(expected = "resume_actions without a matching hold")]
    fn double_begin_panics() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, Recorder::new()));
        let _ = ctx.begin();
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod persistence_tests {
    use super::*;

    fn epoch_config() -> EngineConfig {
        EngineConfig { real_time_epoch: Some(EPOCH), ..EngineConfig::default() }
    }

    #[test]
    fn known_epoch_resumes_schedule() {
        let clock = FakeClock::starting_at(BOOT);
        let store = Shared::with_u32("RbeatLT", EPOCH - 300);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(beat_tree(), &clock, executor).store(store).config(epoch_config()));
        assert!(take(&mut ctx).is_empty());
        assert_eq!(ctx.max_sleep(u32::MAX), 300_000);

        clock.advance_millis(299_999);
        assert!(!ctx.tick());
        clock.advance_millis(1);
        assert!(ctx.tick());
        assert_eq!(take(&mut ctx), [Act::Ping]);
    }

    #[test]
    fn stale_epoch_falls_back_to_jitter() {
        let clock = FakeClock::starting_at(BOOT);
        // Persisted trigger in the future: the clock must have jumped.
        let store = Shared::with_u32("RbeatLT", EPOCH + 10);
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(store).config(epoch_config()));
        assert!(take(&mut ctx).is_empty());
        let sleep = ctx.max_sleep(u32::MAX);
        assert!(sleep > 0 && sleep <= BEAT_PERIOD, "{sleep}");
    }

    #[test]
    fn accumulated_wait_fires_at_boot() {
        let clock = FakeClock::starting_at(BOOT);
        let store = Shared::with_u32("RbeatCW", BEAT_PERIOD / 1_000);
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(store));
        assert_eq!(take(&mut ctx), [Act::Ping]);
    }

    #[test]
    fn fresh_store_fires_within_one_period() {
        let clock = FakeClock::starting_at(BOOT);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(beat_tree(), &clock, executor).store(Shared::default()));
        assert!(take(&mut ctx).is_empty());
        let sleep = ctx.max_sleep(u32::MAX);
        assert!(sleep > 0 && sleep <= BEAT_PERIOD, "{sleep}");

        clock.advance_millis(BEAT_PERIOD);
        assert!(ctx.tick());
        assert_eq!(take(&mut ctx), [Act::Ping]);
    }

    #[test]
    fn jitter_is_deterministic_per_seed() {
        let sleep_for = |seed: u64| {
            let clock = FakeClock::starting_at(BOOT);
            let config = EngineConfig { jitter_seed: seed, ..EngineConfig::default() };
            let ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(Shared::default()).config(config));
            ctx.max_sleep(u32::MAX)
        };
        assert_eq!(sleep_for(7), sleep_for(7));
    }

    #[test]
    fn failing_store_degrades_to_fresh_schedule() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(Broken).config(epoch_config()));
        assert!(take(&mut ctx).is_empty());
        assert!(ctx.is_active(id(&ctx, "Beat")));
        assert!(matches!(ctx.checkpoint(), Err(EngineError::Store(_))));
    }

    #[test]
    fn checkpoint_writes_wait_and_trigger_epoch() {
        let clock = FakeClock::starting_at(BOOT);
        let store = Shared::with_u32("RbeatLT", EPOCH);
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx =
            boot(builder(beat_tree(), &clock, executor).store(store.clone()).config(epoch_config()));

        clock.advance_millis(BEAT_PERIOD);
        assert!(ctx.tick());
        assert_eq!(take(&mut ctx), [Act::Ping]);

        clock.advance_seconds(120);
        assert_eq!(ctx.checkpoint().unwrap(), 1);
        assert_eq!(store.committed("RbeatCW"), Some(120));
        assert_eq!(store.committed("RbeatLT"), Some(EPOCH + 600));
    }

    #[test]
    fn tick_checkpoints_on_interval() {
        let clock = FakeClock::starting_at(BOOT);
        let store = Shared::with_u32("RbeatLT", EPOCH);
        let config = EngineConfig { checkpoint_interval_ms: 60_000, ..epoch_config() };
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(store.clone()).config(config));

        clock.advance_seconds(59);
        ctx.tick();
        assert_eq!(store.committed("RbeatCW"), None);

        clock.advance_seconds(1);
        ctx.tick();
        assert_eq!(store.committed("RbeatCW"), Some(60));
        assert_eq!(store.committed("RbeatLT"), Some(EPOCH));
    }

    /// Fails only the `fail_at`-th save (1-based).
    struct FlakySave {
        inner:   Shared,
        saves:   u32,
        fail_at: u32,
    }

    impl Store for FlakySave {
        fn begin(&mut self) -> StoreResult<()> {
            self.inner.begin()
        }

        fn commit(&mut self) -> StoreResult<()> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> StoreResult<()> {
            self.inner.rollback()
        }

        fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
            self.inner.load(tag)
        }

        fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()> {
            self.saves += 1;
            if self.saves == self.fail_at {
                return Err(StoreError::Io(std::io::Error::other("write interrupted")));
            }
            self.inner.save(tag, value)
        }
    }

    #[test]
    fn failed_checkpoint_commits_nothing() {
        let clock = FakeClock::starting_at(BOOT);
        let shared = Shared::with_u32("RbeatLT", EPOCH);
        let store = FlakySave { inner: shared.clone(), saves: 0, fail_at: 2 };
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()).store(store).config(epoch_config()));

        clock.advance_seconds(120);
        assert!(matches!(ctx.checkpoint(), Err(EngineError::Store(_))));
        assert_eq!(shared.committed("RbeatCW"), None);
        assert_eq!(shared.committed("RbeatLT"), Some(EPOCH));
        assert!(!shared.0.borrow().in_transaction());

        // The store is usable again and the credited wait is not lost.
        assert_eq!(ctx.checkpoint().unwrap(), 1);
        assert_eq!(shared.committed("RbeatCW"), Some(120));
        assert_eq!(shared.committed("RbeatLT"), Some(EPOCH));
    }

    #[test]
    fn checkpoint_without_store_is_a_no_op() {
        let clock = FakeClock::starting_at(BOOT);
        let mut ctx = boot(builder(beat_tree(), &clock, Recorder::new()));
        assert_eq!(ctx.checkpoint().unwrap(), 0);
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer_tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Counts {
        frames:     Rc<Cell<u32>>,
        held:       Rc<Cell<u32>>,
        dispatches: Rc<Cell<u32>>,
        completes:  Rc<Cell<u32>>,
    }

    impl ContextObserver<Bench> for Counts {
        fn on_frame(&mut self, _frame: u32, _state: &Bench, held: bool) {
            self.frames.set(self.frames.get() + 1);
            if held {
                self.held.set(self.held.get() + 1);
            }
        }

        fn on_dispatch(&mut self, _mode: ModeId, _action: Act) {
            self.dispatches.set(self.dispatches.get() + 1);
        }

        fn on_complete(&mut self, _mode: ModeId) {
            self.completes.set(self.completes.get() + 1);
        }
    }

    #[test]
    fn observer_sees_frames_and_dispatches() {
        let clock = FakeClock::starting_at(BOOT);
        let counts = Counts::default();
        let executor = Recorder::new().completing(Act::Ping);
        let mut ctx = boot(builder(ping_tree(|_, _| {}), &clock, executor).observer(counts.clone()));

        // Boot frame ran held; begin dispatched Rest.
        assert_eq!(counts.frames.get(), 1);
        assert_eq!(counts.held.get(), 1);
        assert_eq!(counts.dispatches.get(), 1);

        ctx.mutate(|s| s.a = true);
        assert_eq!(counts.dispatches.get(), 3);
        assert_eq!(counts.completes.get(), 1);
        assert_eq!(counts.frames.get(), 3);
    }
}
