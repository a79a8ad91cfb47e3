//! tracker — drives the GPS/LoRaWAN tracker tree against simulated hardware.
//!
//! Reads an optional JSON config (first argument, default `tracker.json`),
//! runs the context on a fake clock one step at a time and writes every
//! uplink to a CSV log.  Mode schedules persist in SQLite when
//! `sqlite_path` is set, so a second run resumes the send cadence.
//!
//! Logging goes to stderr; set `RUST_LOG=cadence=debug` to watch frames.

mod device;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cadence_core::{Clock, EngineConfig, FakeClock, ModeId, MILLIS_PER_MINUTE};
use cadence_engine::{ContextBuilder, ContextObserver};
use cadence_store::{MemoryStore, SqliteStore, Store};
use cadence_tracker::{tracker_tree, TrackerAction, TrackerState};

use device::Device;

// ── Config ────────────────────────────────────────────────────────────────────

const DEFAULT_CONFIG: &str = "tracker.json";

/// Fixed boot reading so runs are reproducible.
const BOOT_MILLIS: u32 = 1_000;

#[derive(Deserialize, Debug)]
#[serde(default)]
struct DemoConfig {
    engine:            EngineConfig,
    duration_mins:     u32,
    step_secs:         u32,
    usb_power:         bool,
    /// Pull the USB cable this many minutes in.
    unplug_after_mins: Option<u32>,
    failed_joins:      u32,
    fix_secs:          u32,
    sqlite_path:       Option<PathBuf>,
    csv_path:          Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            engine:            EngineConfig::default(),
            duration_mins:     60,
            step_secs:         1,
            usb_power:         true,
            unplug_after_mins: None,
            failed_joins:      1,
            fix_secs:          45,
            sqlite_path:       None,
            csv_path:          None,
        }
    }
}

fn load_config(path: &Path) -> Result<DemoConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return Ok(DemoConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default, Debug)]
struct Counts {
    frames:      u32,
    held:        u32,
    dispatches:  u32,
    completions: u32,
    checkpoints: u32,
}

/// Tallies engine events into a handle `main` keeps.
struct CountingObserver(Rc<RefCell<Counts>>);

impl ContextObserver<TrackerState> for CountingObserver {
    fn on_frame(&mut self, _frame: u32, _state: &TrackerState, held: bool) {
        let mut counts = self.0.borrow_mut();
        counts.frames += 1;
        counts.held += u32::from(held);
    }

    fn on_dispatch(&mut self, _mode: ModeId, _action: TrackerAction) {
        self.0.borrow_mut().dispatches += 1;
    }

    fn on_complete(&mut self, _mode: ModeId) {
        self.0.borrow_mut().completions += 1;
    }

    fn on_checkpoint(&mut self, _modes: usize) {
        self.0.borrow_mut().checkpoints += 1;
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = load_config(&config_path)?;
    anyhow::ensure!(config.step_secs > 0, "step_secs must be positive");

    println!("=== tracker — cadence propagation demo ===");
    println!(
        "Duration: {} min  |  Step: {} s  |  USB: {}  |  Epoch: {:?}",
        config.duration_mins, config.step_secs, config.usb_power, config.engine.real_time_epoch
    );
    println!();

    // 1. Tree and store.
    let (tree, modes) = tracker_tree()?;
    let store: Box<dyn Store> = match &config.sqlite_path {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            println!("Store: sqlite at {}", path.display());
            Box::new(SqliteStore::open(path)?)
        }
        None => {
            println!("Store: in memory");
            Box::new(MemoryStore::new())
        }
    };

    // 2. Context.
    let clock = FakeClock::starting_at(BOOT_MILLIS);
    let counts = Rc::new(RefCell::new(Counts::default()));
    let mut ctx = ContextBuilder::new(
        tree,
        modes.main,
        TrackerState::default(),
        clock.clone(),
        Device::new(config.failed_joins, config.fix_secs),
    )
    .store(store)
    .observer(CountingObserver(Rc::clone(&counts)))
    .config(config.engine.clone())
    .build()?;

    // 3. Boot.  Power state known at boot joins the boot dispatch.
    ctx.init();
    let usb_power = config.usb_power;
    ctx.mutate(|s| s.usb_power = usb_power);
    ctx.begin()?;

    // 4. Run.
    let t0 = Instant::now();
    let end = BOOT_MILLIS + config.duration_mins * MILLIS_PER_MINUTE;
    let unplug_at = config.unplug_after_mins.map(|m| BOOT_MILLIS + m * MILLIS_PER_MINUTE);
    while clock.millis().0 < end {
        clock.advance_seconds(config.step_secs);
        let now = clock.millis();

        if unplug_at.is_some_and(|at| now.0 >= at) && ctx.state().usb_power {
            info!(at = now.0, "usb unplugged");
            ctx.mutate(|s| s.usb_power = false);
        }

        ctx.tick();

        for op in ctx.executor_mut().due(now) {
            match op.mode {
                Some(mode) => ctx.complete_with(mode, |s| op.effect.apply(s)),
                None => ctx.mutate(|s| op.effect.apply(s)),
            }
        }
    }
    let elapsed = t0.elapsed();
    let persisted = ctx.checkpoint()?;
    ctx.dump();

    // 5. Uplink log.
    let device = ctx.executor();
    if let Some(path) = &config.csv_path {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in &device.uplinks {
            writer.serialize(row)?;
        }
        writer.flush()?;
        println!("Uplinks written to {}", path.display());
    }

    // 6. Summary.
    let counts = counts.borrow();
    println!("Simulation complete in {:.3} s", elapsed.as_secs_f64());
    println!("  frames      : {} ({} held)", counts.frames, counts.held);
    println!("  dispatches  : {}", counts.dispatches);
    println!("  completions : {}", counts.completions);
    println!("  checkpoints : {} (+ final, {} modes)", counts.checkpoints, persisted);
    println!("  sleeps      : {}", device.sleeps);
    println!();

    println!("{:<10} {:<10} {:<12} {:<12}", "Seconds", "Confirmed", "Lat", "Lon");
    println!("{}", "-".repeat(46));
    for row in &device.uplinks {
        println!("{:<10} {:<10} {:<12.5} {:<12.5}", row.at_secs, row.confirmed, row.lat, row.lon);
    }
    println!();

    let state = ctx.state();
    println!(
        "Final: usb={} joined={} fix={} gps_power={}",
        state.usb_power, state.joined, state.gps_fix, state.gps_power()
    );
    for id in [modes.sleep, modes.periodic_send, modes.low_power_send, modes.low_power_gps_search] {
        println!("  {:<20} {}", ctx.tree().mode(id).name, if ctx.is_active(id) { "active" } else { "-" });
    }

    Ok(())
}
