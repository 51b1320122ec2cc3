//! Open file table.
//!
//! Slot 0 permanently holds the directory file: its buffer is the resident
//! copy of the directory block. Slots 1..=3 serve user files, each caching one
//! block of the file together with the cursor and a snapshot of the size.

use alloc::boxed::Box;

use crate::block_store::{Block, BlockStore};
use crate::directory::Directory;
use crate::error::{EfsError, EfsResult, Resource};
use crate::layout::{BLOCK_SIZE, DIRECTORY_BLOCK, DIRECTORY_DESCRIPTOR, DIRECTORY_SLOT, OFT_SLOTS};

#[derive(Clone, PartialEq, Eq)]
pub struct OftEntry {
    pub(crate) buffer: Box<Block>,
    pub(crate) position: usize,
    pub(crate) size: usize,
    pub(crate) descriptor: Option<usize>,
    /// Logical block (0..3) currently held by `buffer`
    pub(crate) cached_block: Option<usize>,
}

impl OftEntry {
    fn closed() -> Self {
        Self {
            buffer: Box::new([0u8; BLOCK_SIZE]),
            position: 0,
            size: 0,
            descriptor: None,
            cached_block: None,
        }
    }

    fn directory() -> Self {
        Self {
            descriptor: Some(DIRECTORY_DESCRIPTOR),
            cached_block: Some(0),
            ..Self::closed()
        }
    }

    pub fn is_open(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn descriptor(&self) -> Option<usize> {
        self.descriptor
    }

    pub fn cached_block(&self) -> Option<usize> {
        self.cached_block
    }

    pub fn buffer(&self) -> &Block {
        &self.buffer
    }

    pub(crate) fn bind(&mut self, descriptor: usize, size: usize) {
        self.descriptor = Some(descriptor);
        self.position = 0;
        self.size = size;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::closed();
    }
}

impl core::fmt::Debug for OftEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OftEntry")
            .field("descriptor", &self.descriptor)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("cached_block", &self.cached_block)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFileTable {
    entries: [OftEntry; OFT_SLOTS],
}

impl OpenFileTable {
    pub fn new() -> Self {
        let mut entries: [OftEntry; OFT_SLOTS] = core::array::from_fn(|_| OftEntry::closed());
        entries[DIRECTORY_SLOT] = OftEntry::directory();
        Self { entries }
    }

    /// Closes every user slot and empties the directory buffer.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn directory(&self) -> Directory<&[u8]> {
        Directory::new(&self.entries[DIRECTORY_SLOT].buffer[..])
    }

    pub fn directory_mut(&mut self) -> Directory<&mut [u8]> {
        Directory::new(&mut self.entries[DIRECTORY_SLOT].buffer[..])
    }

    pub fn directory_bytes(&self) -> &Block {
        &self.entries[DIRECTORY_SLOT].buffer
    }

    pub fn load_directory(&mut self, disk: &BlockStore) -> EfsResult<()> {
        disk.read_block(DIRECTORY_BLOCK, &mut self.entries[DIRECTORY_SLOT].buffer)
    }

    pub fn store_directory(&self, disk: &mut BlockStore) -> EfsResult<()> {
        disk.write_block(DIRECTORY_BLOCK, &self.entries[DIRECTORY_SLOT].buffer)
    }

    fn check_user_slot(slot: usize) -> EfsResult<()> {
        if slot == DIRECTORY_SLOT || slot >= OFT_SLOTS {
            return Err(EfsError::OutOfRange);
        }
        Ok(())
    }

    /// A user slot (1..=3), open or not.
    pub fn entry(&self, slot: usize) -> EfsResult<&OftEntry> {
        Self::check_user_slot(slot)?;
        Ok(&self.entries[slot])
    }

    pub(crate) fn entry_mut(&mut self, slot: usize) -> EfsResult<&mut OftEntry> {
        Self::check_user_slot(slot)?;
        Ok(&mut self.entries[slot])
    }

    /// A user slot that must currently be open.
    pub fn open_entry(&self, slot: usize) -> EfsResult<&OftEntry> {
        let entry = self.entry(slot)?;
        if !entry.is_open() {
            return Err(EfsError::NotFound);
        }
        Ok(entry)
    }

    pub(crate) fn open_entry_mut(&mut self, slot: usize) -> EfsResult<&mut OftEntry> {
        let entry = self.entry_mut(slot)?;
        if !entry.is_open() {
            return Err(EfsError::NotFound);
        }
        Ok(entry)
    }

    /// User slot that has `descriptor` open.
    pub fn slot_of(&self, descriptor: usize) -> Option<usize> {
        (1..OFT_SLOTS).find(|&slot| self.entries[slot].descriptor == Some(descriptor))
    }

    pub fn free_slot(&self) -> EfsResult<usize> {
        (1..OFT_SLOTS)
            .find(|&slot| !self.entries[slot].is_open())
            .ok_or(EfsError::ResourceExhausted(Resource::OftSlot))
    }

    pub fn open_count(&self) -> usize {
        (1..OFT_SLOTS).filter(|&slot| self.entries[slot].is_open()).count()
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}
