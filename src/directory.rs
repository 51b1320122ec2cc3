//! The directory is an ordinary file owned by descriptor 0. Its single block is
//! kept resident in open file table slot 0, and [`Directory`] interprets those
//! bytes as 64 entries of `name (4 bytes) | descriptor index (4 bytes)`.
//! An all-zero name marks a free entry.

use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{EfsError, EfsResult};
use crate::layout::{DIR_ENTRY_SIZE, MAX_DIR_ENTRIES, NAME_LEN};

/// A file name of 1 to 4 bytes, zero padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileName([u8; NAME_LEN]);

impl FileName {
    pub fn new(name: &str) -> EfsResult<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_LEN || bytes.contains(&0) {
            return Err(EfsError::InvalidName);
        }
        let mut raw = [0u8; NAME_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    fn from_raw(raw: [u8; NAME_LEN]) -> Option<Self> {
        (raw != [0; NAME_LEN]).then_some(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.0[..len]).unwrap_or("?")
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl TryFrom<String> for FileName {
    type Error = EfsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FileName::new(&value)
    }
}

impl From<FileName> for String {
    fn from(value: FileName) -> Self {
        String::from(value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: FileName,
    pub descriptor: usize,
}

/// View over the directory block bytes.
pub struct Directory<B> {
    block: B,
}

impl<B: AsRef<[u8]>> Directory<B> {
    pub fn new(block: B) -> Self {
        Self { block }
    }

    fn raw_name(&self, slot: usize) -> [u8; NAME_LEN] {
        let start = slot * DIR_ENTRY_SIZE;
        let mut raw = [0u8; NAME_LEN];
        raw.copy_from_slice(&self.block.as_ref()[start..start + NAME_LEN]);
        raw
    }

    /// The entry stored in `slot`, `None` when the slot is free.
    pub fn entry(&self, slot: usize) -> EfsResult<Option<DirEntry>> {
        if slot >= MAX_DIR_ENTRIES {
            return Err(EfsError::OutOfRange);
        }
        let Some(name) = FileName::from_raw(self.raw_name(slot)) else {
            return Ok(None);
        };
        let offset = slot * DIR_ENTRY_SIZE + NAME_LEN;
        Ok(codec::read_field(self.block.as_ref(), offset).map(|fd| DirEntry {
            name,
            descriptor: fd as usize,
        }))
    }

    /// Occupied entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, DirEntry)> + '_ {
        (0..MAX_DIR_ENTRIES).filter_map(|slot| match self.entry(slot) {
            Ok(Some(entry)) => Some((slot, entry)),
            _ => None,
        })
    }

    /// Returns `(slot, descriptor)` of `name`.
    pub fn find(&self, name: &FileName) -> Option<(usize, usize)> {
        self.entries()
            .find(|(_, entry)| entry.name == *name)
            .map(|(slot, entry)| (slot, entry.descriptor))
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        (0..MAX_DIR_ENTRIES).find(|&slot| self.raw_name(slot) == [0; NAME_LEN])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Directory<B> {
    pub fn write_entry(&mut self, slot: usize, name: &FileName, descriptor: usize) -> EfsResult<()> {
        if slot >= MAX_DIR_ENTRIES {
            return Err(EfsError::OutOfRange);
        }
        let start = slot * DIR_ENTRY_SIZE;
        let block = self.block.as_mut();
        block[start..start + NAME_LEN].copy_from_slice(name.as_bytes());
        codec::write_field(block, start + NAME_LEN, Some(descriptor as u32));
        Ok(())
    }

    /// Zeroes both the name and the descriptor index.
    pub fn clear_entry(&mut self, slot: usize) -> EfsResult<()> {
        if slot >= MAX_DIR_ENTRIES {
            return Err(EfsError::OutOfRange);
        }
        let start = slot * DIR_ENTRY_SIZE;
        self.block.as_mut()[start..start + DIR_ENTRY_SIZE].fill(0);
        Ok(())
    }
}
