//! The emulated disk: a fixed array of blocks, the only durable state a node
//! has.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{EfsError, EfsResult};
use crate::layout::{BLOCK_SIZE, N_BLOCKS};

pub type Block = [u8; BLOCK_SIZE];

#[derive(Clone, PartialEq, Eq)]
pub struct BlockStore {
    blocks: Vec<Block>,
}

impl BlockStore {
    /// A zero-filled store of `N_BLOCKS` blocks.
    pub fn new() -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; N_BLOCKS],
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, block_id: usize) -> EfsResult<&Block> {
        self.blocks.get(block_id).ok_or(EfsError::OutOfRange)
    }

    pub fn read_block(&self, block_id: usize, buf: &mut Block) -> EfsResult<()> {
        buf.copy_from_slice(self.block(block_id)?);
        Ok(())
    }

    pub fn write_block(&mut self, block_id: usize, buf: &Block) -> EfsResult<()> {
        let block = self.blocks.get_mut(block_id).ok_or(EfsError::OutOfRange)?;
        block.copy_from_slice(buf);
        Ok(())
    }

    pub fn zero_block(&mut self, block_id: usize) -> EfsResult<()> {
        self.write_block(block_id, &[0u8; BLOCK_SIZE])
    }

    /// Zeroes every block.
    pub fn format(&mut self) {
        self.blocks.iter_mut().for_each(|b| b.fill(0));
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockStore")
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_are_bounded() {
        let mut disk = BlockStore::new();
        let buf = [7u8; BLOCK_SIZE];
        assert_eq!(disk.write_block(N_BLOCKS, &buf), Err(EfsError::OutOfRange));
        assert!(disk.block(N_BLOCKS).is_err());

        disk.write_block(N_BLOCKS - 1, &buf).expect("write last block");
        let mut out = [0u8; BLOCK_SIZE];
        disk.read_block(N_BLOCKS - 1, &mut out).expect("read last block");
        assert_eq!(out, buf);

        disk.format();
        assert!(disk.block(N_BLOCKS - 1).unwrap().iter().all(|&b| b == 0));
    }
}
