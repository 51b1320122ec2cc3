//! One emulated file system instance, the unit the coordinator replicates.
//!
//! The bitmap, the descriptor table and the directory are worked on in memory
//! and written back to the block store when an operation succeeds. A failed
//! operation reloads them from the block store instead, so a half-applied
//! change never reaches the disk.

use alloc::boxed::Box;
use alloc::vec::Vec;

use bitflags::bitflags;
use log::{debug, info};
use serde::Serialize;

use crate::bitmap::Bitmap;
use crate::block_store::BlockStore;
use crate::common::{NodeStats, NodeStatus, TimeSpec};
use crate::descriptor::{Descriptor, DescriptorTable, Field};
use crate::directory::FileName;
use crate::error::{EfsError, EfsResult, Resource};
use crate::layout::{CHECKPOINT_INTERVAL, MEMORY_SIZE};
use crate::oft::OpenFileTable;
use crate::wal::{WalEntry, WriteAheadLog};

bitflags! {
    /// Working copies modified by the operation in progress.
    pub(crate) struct Dirty: u8 {
        const BITMAP = 0b001;
        const DESCRIPTORS = 0b010;
        const DIRECTORY = 0b100;
    }
}

/// One line of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    pub name: FileName,
    pub descriptor: usize,
    pub size: Option<u32>,
}

pub struct FileSystemNode {
    pub(crate) id: usize,
    pub(crate) disk: BlockStore,
    pub(crate) bitmap: Bitmap,
    pub(crate) descriptors: DescriptorTable,
    pub(crate) oft: OpenFileTable,
    pub(crate) memory: Box<[u8; MEMORY_SIZE]>,
    pub(crate) dirty: Dirty,
    wal: WriteAheadLog,
    stats: NodeStats,
    status: NodeStatus,
}

impl FileSystemNode {
    /// A freshly initialized node.
    pub fn new(id: usize) -> EfsResult<Self> {
        let mut node = Self {
            id,
            disk: BlockStore::new(),
            bitmap: Bitmap::formatted(),
            descriptors: DescriptorTable::formatted(),
            oft: OpenFileTable::new(),
            memory: Box::new([0u8; MEMORY_SIZE]),
            dirty: Dirty::empty(),
            wal: WriteAheadLog::new(),
            stats: NodeStats::new(),
            status: NodeStatus::Active,
        };
        node.init()?;
        Ok(node)
    }

    /// Formats the disk and resets every table, the log and the counters.
    pub fn init(&mut self) -> EfsResult<()> {
        self.disk.format();
        self.bitmap = Bitmap::formatted();
        self.descriptors = DescriptorTable::formatted();
        self.oft.reset();
        self.memory.fill(0);
        self.dirty = Dirty::all();
        self.flush()?;

        self.wal.clear();
        self.stats = NodeStats::new();
        self.status = NodeStatus::Active;
        info!("node {} initialized", self.id);
        Ok(())
    }

    /// Runs `op` against the working copies, then writes back what it
    /// changed, or reloads it if `op` failed.
    pub(crate) fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> EfsResult<T>,
    ) -> EfsResult<T> {
        self.dirty = Dirty::empty();
        let result = op(self);
        match result {
            Ok(_) => self.flush()?,
            Err(_) => self.discard()?,
        }
        result
    }

    fn flush(&mut self) -> EfsResult<()> {
        if self.dirty.contains(Dirty::BITMAP) {
            self.bitmap.store(&mut self.disk)?;
        }
        if self.dirty.contains(Dirty::DESCRIPTORS) {
            self.descriptors.store(&mut self.disk)?;
        }
        if self.dirty.contains(Dirty::DIRECTORY) {
            self.oft.store_directory(&mut self.disk)?;
        }
        self.dirty = Dirty::empty();
        Ok(())
    }

    fn discard(&mut self) -> EfsResult<()> {
        if self.dirty.contains(Dirty::BITMAP) {
            self.bitmap.reload(&self.disk)?;
        }
        if self.dirty.contains(Dirty::DESCRIPTORS) {
            self.descriptors.reload(&self.disk)?;
        }
        if self.dirty.contains(Dirty::DIRECTORY) {
            self.oft.load_directory(&self.disk)?;
        }
        self.dirty = Dirty::empty();
        Ok(())
    }

    /// Creates an empty file and returns its descriptor index.
    pub fn create(&mut self, name: &FileName) -> EfsResult<usize> {
        self.transact(|fs| {
            let directory = fs.oft.directory();
            if directory.find(name).is_some() {
                return Err(EfsError::AlreadyExists);
            }
            let slot = directory
                .first_free_slot()
                .ok_or(EfsError::ResourceExhausted(Resource::DirectorySlot))?;
            let fd = fs
                .descriptors
                .find_free()
                .ok_or(EfsError::ResourceExhausted(Resource::Descriptor))?;

            fs.dirty |= Dirty::DESCRIPTORS | Dirty::DIRECTORY;
            let descriptor = Descriptor {
                size: Some(0),
                ..Descriptor::FREE
            };
            fs.descriptors.set_descriptor(fd, &descriptor)?;
            fs.oft.directory_mut().write_entry(slot, name, fd)?;
            debug!("node {}: created {} as descriptor {} in slot {}", fs.id, name, fd, slot);
            Ok(fd)
        })
    }

    /// Removes a file that no user slot has open, releasing its blocks.
    pub fn destroy(&mut self, name: &FileName) -> EfsResult<()> {
        self.transact(|fs| {
            let (slot, fd) = fs.oft.directory().find(name).ok_or(EfsError::NotFound)?;
            if fs.oft.slot_of(fd).is_some() {
                return Err(EfsError::Conflict);
            }
            let descriptor = fs.descriptors.descriptor(fd)?;

            fs.dirty |= Dirty::all();
            for block in descriptor.allocated_blocks() {
                fs.bitmap.set(block, false)?;
            }
            fs.descriptors.set_descriptor(fd, &Descriptor::FREE)?;
            fs.oft.directory_mut().clear_entry(slot)?;
            debug!("node {}: destroyed {} (descriptor {})", fs.id, name, fd);
            Ok(())
        })
    }

    /// Opens `name` in a free user slot and returns the slot.
    ///
    /// A file that has never owned a block gets its first block here.
    pub fn open(&mut self, name: &FileName) -> EfsResult<usize> {
        self.transact(|fs| {
            let (_, fd) = fs.oft.directory().find(name).ok_or(EfsError::NotFound)?;
            if fs.oft.slot_of(fd).is_some() {
                return Err(EfsError::Conflict);
            }
            let slot = fs.oft.free_slot()?;
            let descriptor = fs.descriptors.descriptor(fd)?;
            let size = descriptor.size.ok_or(EfsError::NotFound)? as usize;

            let first = match descriptor.block(0) {
                Some(block) => Some(block),
                None if size == 0 => {
                    fs.dirty |= Dirty::BITMAP | Dirty::DESCRIPTORS;
                    let block = fs.bitmap.allocate()?;
                    fs.descriptors.set_field(fd, Field::Block0, Some(block as u32))?;
                    fs.disk.zero_block(block)?;
                    debug!("node {}: allocated block {} for descriptor {}", fs.id, block, fd);
                    Some(block)
                }
                None => None,
            };

            let entry = fs.oft.entry_mut(slot)?;
            match first {
                Some(block) => {
                    fs.disk.read_block(block, &mut entry.buffer)?;
                    entry.cached_block = Some(0);
                }
                None => {
                    entry.buffer.fill(0);
                    entry.cached_block = None;
                }
            }
            entry.bind(fd, size);
            debug!("node {}: opened {} in slot {} ({} bytes)", fs.id, name, slot, size);
            Ok(slot)
        })
    }

    /// Writes back the cached block and the file size, then frees the slot.
    pub fn close(&mut self, slot: usize) -> EfsResult<()> {
        self.transact(|fs| {
            let entry = fs.oft.open_entry_mut(slot)?;
            let fd = entry.descriptor.ok_or(EfsError::NotFound)?;
            let descriptor = fs.descriptors.descriptor(fd)?;
            if let Some(block) = entry.cached_block.and_then(|b| descriptor.block(b)) {
                fs.disk.write_block(block, &entry.buffer)?;
            }

            fs.dirty |= Dirty::DESCRIPTORS;
            fs.descriptors
                .set_field(fd, Field::Size, Some(entry.size as u32))?;
            debug!("node {}: closed slot {} ({} bytes)", fs.id, slot, entry.size);
            entry.reset();
            Ok(())
        })
    }

    /// Files in directory order with their recorded sizes.
    pub fn directory(&self) -> Vec<DirectoryListing> {
        self.oft
            .directory()
            .entries()
            .map(|(_, entry)| DirectoryListing {
                name: entry.name,
                descriptor: entry.descriptor,
                size: self
                    .descriptors
                    .get_field(entry.descriptor, Field::Size)
                    .ok()
                    .flatten(),
            })
            .collect()
    }

    /// Up to `n` bytes of scratch memory starting at `offset`.
    pub fn read_memory(&self, offset: usize, n: usize) -> EfsResult<&[u8]> {
        if offset >= MEMORY_SIZE {
            return Err(EfsError::OutOfRange);
        }
        let end = offset.saturating_add(n).min(MEMORY_SIZE);
        Ok(&self.memory[offset..end])
    }

    /// Copies `data` into scratch memory, truncated at the end of the buffer.
    pub fn write_memory(&mut self, offset: usize, data: &[u8]) -> EfsResult<usize> {
        if offset >= MEMORY_SIZE {
            return Err(EfsError::OutOfRange);
        }
        let len = data.len().min(MEMORY_SIZE - offset);
        self.memory[offset..offset + len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    pub fn append_log(&mut self, entry: WalEntry) -> EfsResult<()> {
        self.wal.append(entry)
    }

    /// Applies one logged entry and accounts for the outcome.
    pub fn apply(&mut self, entry: &WalEntry) -> EfsResult<usize> {
        let result = entry.operation.apply(self);
        self.stats.last_applied = Some(entry.sequence);
        self.stats.since_checkpoint += 1;
        match &result {
            Ok(_) => self.stats.applied += 1,
            Err(e) => {
                self.stats.failed += 1;
                debug!(
                    "node {}: {} #{} failed: {}",
                    self.id,
                    entry.kind(),
                    entry.sequence,
                    e
                );
            }
        }
        if self.stats.since_checkpoint >= CHECKPOINT_INTERVAL {
            self.checkpoint();
        }
        result
    }

    /// Applies `entry` after the older logged entries this node skipped, so
    /// entries are consumed in sequence order.
    pub fn apply_in_order(&mut self, entry: &WalEntry) -> EfsResult<usize> {
        let behind: Vec<WalEntry> = self
            .wal
            .pending_after(self.stats.last_applied)
            .filter(|e| e.sequence < entry.sequence)
            .cloned()
            .collect();
        if !behind.is_empty() {
            self.stats.replays += 1;
            info!(
                "node {}: replaying {} skipped entries before #{}",
                self.id,
                behind.len(),
                entry.sequence
            );
            for earlier in &behind {
                self.apply(earlier)?;
            }
        }
        self.apply(entry)
    }

    /// Drops every consumed entry from the log.
    pub fn checkpoint(&mut self) -> usize {
        let dropped = self
            .stats
            .last_applied
            .map_or(0, |seq| self.wal.truncate_through(seq));
        self.stats.last_checkpoint = TimeSpec::now();
        self.stats.since_checkpoint = 0;
        info!("node {}: checkpoint dropped {} log entries", self.id, dropped);
        dropped
    }

    /// Applies the logged entries this node has not consumed yet.
    ///
    /// Stops at the first entry that fails; that entry counts as consumed.
    pub fn replay_pending(&mut self) -> EfsResult<usize> {
        let pending: Vec<WalEntry> = self
            .wal
            .pending_after(self.stats.last_applied)
            .cloned()
            .collect();
        self.stats.replays += 1;
        info!("node {}: replaying {} log entries", self.id, pending.len());
        for entry in &pending {
            self.apply(entry)?;
        }
        Ok(pending.len())
    }

    /// Whether bitmap, descriptor table and directory match `other` byte for
    /// byte.
    pub fn state_eq(&self, other: &FileSystemNode) -> bool {
        self.bitmap == other.bitmap
            && self.descriptors == other.descriptors
            && self.oft.directory_bytes() == other.oft.directory_bytes()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn disk(&self) -> &BlockStore {
        &self.disk
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn oft(&self) -> &OpenFileTable {
        &self.oft
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn wal(&self) -> &WriteAheadLog {
        &self.wal
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
    }
}

impl core::fmt::Debug for FileSystemNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileSystemNode")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("open", &self.oft.open_count())
            .field("free_blocks", &self.bitmap.free_count())
            .field("wal", &self.wal.len())
            .finish()
    }
}
