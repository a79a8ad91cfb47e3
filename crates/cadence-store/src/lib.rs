//! `cadence-store` — persistent tag/value storage for the cadence engine.
//!
//! The engine only ever persists two `u32`s per scheduled mode: the epoch of
//! its last trigger and its cumulative un-triggered wait.  Backends:
//!
//! | Feature   | Backend       | Persistence                                  |
//! |-----------|---------------|----------------------------------------------|
//! | *(none)*  | `MemoryStore` | process lifetime                             |
//! | `sqlite`  | `SqliteStore` | one `cells` table in a database file         |
//!
//! All backends implement [`Store`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use cadence_store::{MemoryStore, Store, StoreTag};
//!
//! let mut store = MemoryStore::new();
//! let tag = StoreTag::new("RpsendCW")?;
//! store.begin()?;
//! store.save_u32(&tag, 120)?;
//! store.commit()?;
//! ```

pub mod error;
pub mod memory;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{MAX_TAG_LEN, Store, StoreTag};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
