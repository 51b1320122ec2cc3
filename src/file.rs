//! Byte-level file access through the open file table.
//!
//! An open slot caches one logical block of its file. The cache moves only
//! when the next byte lives in another block: the held block is written back
//! to its pointer first, then the target is loaded, or allocated when a write
//! runs past the last block.

use log::debug;

use crate::bitmap::Bitmap;
use crate::block_store::BlockStore;
use crate::descriptor::{DescriptorTable, Field};
use crate::error::{EfsError, EfsResult};
use crate::layout::{BLOCK_SIZE, MAX_FILE_SIZE, MEMORY_SIZE};
use crate::node::{Dirty, FileSystemNode};
use crate::oft::OftEntry;

/// Moves the cache of `entry` to logical block `target`.
///
/// Fails with `NotFound` when the target has no pointer and `allocate` is
/// off, leaving the cache untouched.
fn switch_block(
    entry: &mut OftEntry,
    descriptors: &mut DescriptorTable,
    bitmap: &mut Bitmap,
    disk: &mut BlockStore,
    target: usize,
    allocate: bool,
) -> EfsResult<()> {
    let fd = entry.descriptor.ok_or(EfsError::NotFound)?;
    let field = Field::block(target)?;
    let descriptor = descriptors.descriptor(fd)?;
    let existing = descriptor.block(target);
    if existing.is_none() && !allocate {
        return Err(EfsError::NotFound);
    }

    if let Some(current) = entry.cached_block.and_then(|b| descriptor.block(b)) {
        disk.write_block(current, &entry.buffer)?;
    }
    match existing {
        Some(block) => disk.read_block(block, &mut entry.buffer)?,
        None => {
            let block = bitmap.allocate()?;
            descriptors.set_field(fd, field, Some(block as u32))?;
            disk.zero_block(block)?;
            entry.buffer.fill(0);
        }
    }
    entry.cached_block = Some(target);
    Ok(())
}

impl FileSystemNode {
    /// Reads from the cursor into `dest` and returns the bytes read.
    ///
    /// Stops at end of file, or early when the block chain has a hole.
    pub fn read_into(&mut self, slot: usize, dest: &mut [u8]) -> EfsResult<usize> {
        let entry = self.oft.open_entry_mut(slot)?;
        let mut count = 0;
        while count < dest.len() && entry.position < entry.size {
            let target = entry.position / BLOCK_SIZE;
            if entry.cached_block != Some(target) {
                match switch_block(
                    entry,
                    &mut self.descriptors,
                    &mut self.bitmap,
                    &mut self.disk,
                    target,
                    false,
                ) {
                    Ok(()) => {}
                    Err(EfsError::NotFound) | Err(EfsError::CapacityExceeded) => {
                        debug!(
                            "node {}: slot {} has no block {}, read stops at {}",
                            self.id, slot, target, entry.position
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            dest[count] = entry.buffer[entry.position % BLOCK_SIZE];
            entry.position += 1;
            count += 1;
        }
        Ok(count)
    }

    /// Writes `data` at the cursor and returns the bytes written.
    ///
    /// Short when the file reaches three blocks or the disk runs out of
    /// free blocks.
    pub fn write_from(&mut self, slot: usize, data: &[u8]) -> EfsResult<usize> {
        self.transact(|fs| {
            let entry = fs.oft.open_entry_mut(slot)?;
            fs.dirty |= Dirty::BITMAP | Dirty::DESCRIPTORS;
            let mut written = 0;
            for &byte in data {
                if entry.position >= MAX_FILE_SIZE {
                    debug!("node {}: slot {} is at the file size limit", fs.id, slot);
                    break;
                }
                let target = entry.position / BLOCK_SIZE;
                if entry.cached_block != Some(target) {
                    match switch_block(
                        entry,
                        &mut fs.descriptors,
                        &mut fs.bitmap,
                        &mut fs.disk,
                        target,
                        true,
                    ) {
                        Ok(()) => {}
                        Err(EfsError::ResourceExhausted(_)) | Err(EfsError::CapacityExceeded) => {
                            debug!("node {}: no block for slot {}, write truncated", fs.id, slot);
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                entry.buffer[entry.position % BLOCK_SIZE] = byte;
                entry.position += 1;
                entry.size = entry.size.max(entry.position);
                written += 1;
            }
            Ok(written)
        })
    }

    /// Reads up to `n` bytes into scratch memory at `dest`.
    pub fn read(&mut self, slot: usize, dest: usize, n: usize) -> EfsResult<usize> {
        if dest >= MEMORY_SIZE {
            return Err(EfsError::OutOfRange);
        }
        let len = n.min(MEMORY_SIZE - dest);
        let mut staged = [0u8; MEMORY_SIZE];
        let count = self.read_into(slot, &mut staged[..len])?;
        self.memory[dest..dest + count].copy_from_slice(&staged[..count]);
        Ok(count)
    }

    /// Writes up to `n` bytes of scratch memory starting at `src`.
    pub fn write(&mut self, slot: usize, src: usize, n: usize) -> EfsResult<usize> {
        if src >= MEMORY_SIZE {
            return Err(EfsError::OutOfRange);
        }
        let len = n.min(MEMORY_SIZE - src);
        let mut staged = [0u8; MEMORY_SIZE];
        staged[..len].copy_from_slice(&self.memory[src..src + len]);
        self.write_from(slot, &staged[..len])
    }

    /// Moves the cursor, at most to the end of file.
    ///
    /// The cache follows when the target block exists. A target on a block
    /// boundary at end of file keeps the current cache; the next write
    /// allocates.
    pub fn seek(&mut self, slot: usize, position: usize) -> EfsResult<()> {
        let entry = self.oft.open_entry_mut(slot)?;
        if position > entry.size {
            return Err(EfsError::OutOfRange);
        }
        let target = position / BLOCK_SIZE;
        if entry.cached_block != Some(target) {
            match switch_block(
                entry,
                &mut self.descriptors,
                &mut self.bitmap,
                &mut self.disk,
                target,
                false,
            ) {
                Ok(()) | Err(EfsError::NotFound) | Err(EfsError::CapacityExceeded) => {}
                Err(e) => return Err(e),
            }
        }
        entry.position = position;
        Ok(())
    }
}
