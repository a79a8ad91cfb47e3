//! In-memory store backend.

use std::collections::BTreeMap;

use tracing::trace;

use crate::store::{Store, StoreTag};
use crate::{StoreError, StoreResult};

/// Map-backed [`Store`].  Writes inside a transaction are staged and only
/// become visible to a fresh `MemoryStore::entries` read after the
/// outermost commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    committed: BTreeMap<StoreTag, Vec<u8>>,
    staged:    BTreeMap<StoreTag, Vec<u8>>,
    depth:     u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a `u32` value, as if persisted by an earlier boot.
    pub fn with_u32(mut self, tag: &str, value: u32) -> StoreResult<Self> {
        self.committed.insert(StoreTag::new(tag)?, value.to_le_bytes().to_vec());
        Ok(self)
    }

    /// Committed contents.
    pub fn entries(&self) -> &BTreeMap<StoreTag, Vec<u8>> {
        &self.committed
    }

    /// Committed `u32` under `tag`, if present and well-formed.
    pub fn committed_u32(&self, tag: &str) -> Option<u32> {
        let tag = StoreTag::new(tag).ok()?;
        let bytes: [u8; 4] = self.committed.get(&tag)?.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }
}

impl Store for MemoryStore {
    fn begin(&mut self) -> StoreResult<()> {
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            return Err(StoreError::NoTransaction);
        }
        self.depth -= 1;
        if self.depth == 0 {
            let staged = std::mem::take(&mut self.staged);
            trace!(writes = staged.len(), "memory store commit");
            self.committed.extend(staged);
        }
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            return Err(StoreError::NoTransaction);
        }
        let dropped = std::mem::take(&mut self.staged);
        trace!(writes = dropped.len(), "memory store rollback");
        self.depth = 0;
        Ok(())
    }

    fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.staged.get(tag).or_else(|| self.committed.get(tag)).cloned())
    }

    fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()> {
        let target = if self.depth > 0 { &mut self.staged } else { &mut self.committed };
        target.insert(tag.clone(), value.to_vec());
        Ok(())
    }
}
