//! `cadence-mode` — the mode tree and its propagation algorithm.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                      |
//! |----------------|---------------------------------------------------------------|
//! | [`activation`] | `Activation` — signal passed parent → child each frame        |
//! | [`state`]      | `ModeState`, `ModeArena` (fixed `MODE_CAPACITY` slots)         |
//! | [`host`]       | `Host` snapshot capability, `Executor`, `Outcome`             |
//! | [`mode`]       | `Mode` — immutable node with timing and concurrency policy    |
//! | [`builder`]    | `TreeBuilder`, `ModeBuilder` — two-phase construction         |
//! | [`tree`]       | `ModeTree` — collect, attach, propagate, max_sleep, dump      |
//! | [`attach`]     | `Attachments` — slots, parent counts, wait accounts           |
//! | [`error`]      | `ModeError`, `ModeResult<T>`                                  |
//!
//! # Design notes
//!
//! Nothing in the tree changes after `build`.  Runtime data is split by
//! lifetime:
//!
//! - **Per snapshot** (`ModeState` inside the host's `ModeArena`): copied with
//!   every old/new comparison.
//! - **Per context** (`Attachments`): slot assignment, parent counts and
//!   wait clocks; shared by every snapshot of one running tree.
//!
//! The pass only reads the old snapshot and only writes the live one, so a
//! frame is a pure function of (tree, old, new-before-pass, clock).

pub mod activation;
pub mod attach;
pub mod builder;
pub mod error;
pub mod host;
pub mod mode;
pub mod state;
pub mod tree;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use activation::Activation;
pub use attach::{Attachment, Attachments, WaitAccount};
pub use builder::{ModeBuilder, TreeBuilder};
pub use error::{ModeError, ModeResult};
pub use host::{Executor, Host, Outcome};
pub use mode::{InspirationFn, Mode, RequiredFn, STORAGE_TAG_LEN};
pub use state::{MODE_CAPACITY, ModeArena, ModeState};
pub use tree::{Collected, ModeTree};
