//! The `Store` trait and its key type.

use std::fmt;

use crate::{StoreError, StoreResult};

/// Longest accepted tag, the key width of the smallest supported flash
/// key/value layout.
pub const MAX_TAG_LEN: usize = 8;

/// A validated store key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StoreTag(String);

impl StoreTag {
    pub fn new(tag: &str) -> StoreResult<Self> {
        let valid = !tag.is_empty()
            && tag.len() <= MAX_TAG_LEN
            && tag.bytes().all(|b| b.is_ascii_graphic());
        if !valid {
            return Err(StoreError::InvalidTag(tag.to_owned()));
        }
        Ok(Self(tag.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transactional load/store of small named values.
///
/// Writes between [`begin`][Self::begin] and [`commit`][Self::commit] land
/// together or not at all.  Transactions nest; only the outermost commit
/// writes through.
pub trait Store {
    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    /// Discard every write since the outermost `begin` and close the
    /// transaction at all nesting levels.
    fn rollback(&mut self) -> StoreResult<()>;

    fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>>;

    fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()>;

    /// Load a little-endian `u32`.
    fn load_u32(&mut self, tag: &StoreTag) -> StoreResult<Option<u32>> {
        match self.load(tag)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
                    tag:      tag.to_string(),
                    len:      bytes.len(),
                    expected: 4,
                })?;
                Ok(Some(u32::from_le_bytes(raw)))
            }
        }
    }

    /// Store a little-endian `u32`.
    fn save_u32(&mut self, tag: &StoreTag, value: u32) -> StoreResult<()> {
        self.save(tag, &value.to_le_bytes())
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn begin(&mut self) -> StoreResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        (**self).rollback()
    }

    fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
        (**self).load(tag)
    }

    fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()> {
        (**self).save(tag, value)
    }
}
