//! `cadence-engine` — the frame driver for cadence mode trees.
//!
//! # Frame
//!
//! ```text
//! mutate / complete / tick
//!   ① copy the snapshot as `old`, apply the change
//!   ② new frame: bump the frame id, stamp the clock, update derived fields
//!   ③ propagate from the root with Active (whole tree, one pass)
//!   ④ unless held by a transaction:
//!        on_change(old)       → state-wide actions
//!        each invoke mode     → exec(action) if newly active this frame
//!                               (invoke-delay modes: if the delay fired now)
//!        did_actions(old)
//!        Outcome::Done modes  → complete, in dispatch order
//!   ⑤ did_update(old, hold_level)
//! ```
//!
//! `tick` only runs ②–⑤ when some time-dependent mode expired or came due,
//! so polling cost scales with the number of timed modes, not tree size.
//!
//! # Boot
//!
//! ```rust,ignore
//! let mut ctx = ContextBuilder::new(tree, root, Host::default(), clock, executor)
//!     .store(store)
//!     .config(config)
//!     .build()?;
//! ctx.init();       // boot frame, dispatch held
//! ctx.mutate(...);  // optional: coalesced into the boot dispatch
//! ctx.begin()?;     // dispatch against the zero-valued snapshot
//! loop {
//!     ctx.tick();
//!     sleep(ctx.max_sleep(60_000));
//! }
//! ```
//!
//! # Cargo features
//!
//! | Feature  | Effect                                       |
//! |----------|----------------------------------------------|
//! | `sqlite` | Re-enables `cadence-store/sqlite`.           |

pub mod builder;
pub mod context;
pub mod error;
pub mod observer;
pub mod recorder;

mod persistence;

#[cfg(test)]
mod tests;

pub use builder::ContextBuilder;
pub use context::{Context, Transaction};
pub use error::{EngineError, EngineResult};
pub use observer::{ContextObserver, NoopObserver};
pub use recorder::Recorder;
