//! Block occupancy bitmap.
//! The node keeps a working copy of block 0 here and writes it back at the end
//! of each operation. Block `b` is bit `b % 8` of byte `b / 8`.

use alloc::boxed::Box;

use crate::block_store::{Block, BlockStore};
use crate::error::{EfsError, EfsResult, Resource};
use crate::layout::{BITMAP_BLOCK, BLOCK_SIZE, DATA_START, N_BLOCKS};

#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Box<Block>,
}

impl Bitmap {
    /// Bitmap of a freshly formatted disk: blocks 0..8 used, the rest free.
    pub fn formatted() -> Self {
        let mut bits = Box::new([0u8; BLOCK_SIZE]);
        bits[0] = 0xFF;
        Self { bits }
    }

    pub fn load(disk: &BlockStore) -> EfsResult<Self> {
        let mut bits = Box::new([0u8; BLOCK_SIZE]);
        disk.read_block(BITMAP_BLOCK, &mut bits)?;
        Ok(Self { bits })
    }

    pub fn reload(&mut self, disk: &BlockStore) -> EfsResult<()> {
        disk.read_block(BITMAP_BLOCK, &mut self.bits)
    }

    pub fn store(&self, disk: &mut BlockStore) -> EfsResult<()> {
        disk.write_block(BITMAP_BLOCK, &self.bits)
    }

    pub fn as_bytes(&self) -> &Block {
        &self.bits
    }

    /// Blocks past the end of the disk are never free.
    pub fn is_free(&self, block: usize) -> bool {
        block < N_BLOCKS && self.bits[block / 8] & (1 << (block % 8)) == 0
    }

    /// Marks a data block used or free. Reserved blocks stay set forever.
    pub fn set(&mut self, block: usize, used: bool) -> EfsResult<()> {
        if !(DATA_START..N_BLOCKS).contains(&block) {
            return Err(EfsError::OutOfRange);
        }
        let mask = 1 << (block % 8);
        if used {
            self.bits[block / 8] |= mask;
        } else {
            self.bits[block / 8] &= !mask;
        }
        Ok(())
    }

    /// First free data block, scanning upward from `DATA_START`.
    pub fn find_free(&self) -> Option<usize> {
        (DATA_START..N_BLOCKS).find(|&b| self.is_free(b))
    }

    pub fn allocate(&mut self) -> EfsResult<usize> {
        let block = self
            .find_free()
            .ok_or(EfsError::ResourceExhausted(Resource::Block))?;
        self.set(block, true)?;
        Ok(block)
    }

    pub fn free_count(&self) -> usize {
        (DATA_START..N_BLOCKS).filter(|&b| self.is_free(b)).count()
    }
}

impl core::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bitmap")
            .field("head", &&self.bits[..N_BLOCKS / 8])
            .finish()
    }
}
