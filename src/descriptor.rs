//! File descriptor table, the working copy of blocks 1..=6.
//!
//! Each descriptor is 16 bytes: size, then three block pointers, every field a
//! 4-byte value packed by [`crate::codec`]. A descriptor whose size is empty is
//! free.

use alloc::boxed::Box;

use crate::block_store::{Block, BlockStore};
use crate::codec;
use crate::error::{EfsError, EfsResult};
use crate::layout::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Size,
    Block0,
    Block1,
    Block2,
}

impl Field {
    /// Pointer field for logical block `index` of a file.
    pub fn block(index: usize) -> EfsResult<Self> {
        match index {
            0 => Ok(Field::Block0),
            1 => Ok(Field::Block1),
            2 => Ok(Field::Block2),
            _ => Err(EfsError::CapacityExceeded),
        }
    }

    fn offset(self) -> usize {
        match self {
            Field::Size => 0,
            Field::Block0 => 4,
            Field::Block1 => 8,
            Field::Block2 => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub size: Option<u32>,
    pub blocks: [Option<u32>; MAX_FILE_BLOCKS],
}

impl Descriptor {
    pub const FREE: Descriptor = Descriptor {
        size: None,
        blocks: [None; MAX_FILE_BLOCKS],
    };

    pub fn is_free(&self) -> bool {
        self.size.is_none()
    }

    /// Disk block backing logical block `index`, if allocated.
    pub fn block(&self, index: usize) -> Option<usize> {
        self.blocks.get(index).copied().flatten().map(|b| b as usize)
    }

    pub fn allocated_blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().flatten().map(|&b| b as usize)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DescriptorTable {
    blocks: Box<[Block; DESCRIPTOR_BLOCKS]>,
}

impl DescriptorTable {
    /// Every descriptor free except the directory's, which owns block 7.
    pub fn formatted() -> Self {
        let mut table = Self {
            blocks: Box::new([[0xFF; BLOCK_SIZE]; DESCRIPTOR_BLOCKS]),
        };
        let directory = Descriptor {
            size: Some(0),
            blocks: [Some(DIRECTORY_BLOCK as u32), None, None],
        };
        table.store_descriptor(DIRECTORY_DESCRIPTOR, &directory);
        table
    }

    pub fn load(disk: &BlockStore) -> EfsResult<Self> {
        let mut table = Self {
            blocks: Box::new([[0u8; BLOCK_SIZE]; DESCRIPTOR_BLOCKS]),
        };
        table.reload(disk)?;
        Ok(table)
    }

    pub fn reload(&mut self, disk: &BlockStore) -> EfsResult<()> {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            disk.read_block(DESCRIPTOR_START + i, block)?;
        }
        Ok(())
    }

    pub fn store(&self, disk: &mut BlockStore) -> EfsResult<()> {
        for (i, block) in self.blocks.iter().enumerate() {
            disk.write_block(DESCRIPTOR_START + i, block)?;
        }
        Ok(())
    }

    fn locate(fd: usize, field: Field) -> EfsResult<(usize, usize)> {
        if fd >= N_DESCRIPTORS {
            return Err(EfsError::OutOfRange);
        }
        Ok((
            descriptor_block(fd) - DESCRIPTOR_START,
            descriptor_offset(fd) + field.offset(),
        ))
    }

    pub fn get_field(&self, fd: usize, field: Field) -> EfsResult<Option<u32>> {
        let (block, offset) = Self::locate(fd, field)?;
        Ok(codec::read_field(&self.blocks[block], offset))
    }

    pub fn set_field(&mut self, fd: usize, field: Field, value: Option<u32>) -> EfsResult<()> {
        let (block, offset) = Self::locate(fd, field)?;
        codec::write_field(&mut self.blocks[block], offset, value);
        Ok(())
    }

    pub fn descriptor(&self, fd: usize) -> EfsResult<Descriptor> {
        Ok(Descriptor {
            size: self.get_field(fd, Field::Size)?,
            blocks: [
                self.get_field(fd, Field::Block0)?,
                self.get_field(fd, Field::Block1)?,
                self.get_field(fd, Field::Block2)?,
            ],
        })
    }

    pub fn set_descriptor(&mut self, fd: usize, descriptor: &Descriptor) -> EfsResult<()> {
        if fd >= N_DESCRIPTORS {
            return Err(EfsError::OutOfRange);
        }
        self.store_descriptor(fd, descriptor);
        Ok(())
    }

    fn store_descriptor(&mut self, fd: usize, descriptor: &Descriptor) {
        let block = &mut self.blocks[descriptor_block(fd) - DESCRIPTOR_START];
        let base = descriptor_offset(fd);
        codec::write_field(block, base, descriptor.size);
        for (i, ptr) in descriptor.blocks.iter().enumerate() {
            codec::write_field(block, base + 4 * (i + 1), *ptr);
        }
    }

    /// Lowest free descriptor; descriptor 0 belongs to the directory.
    pub fn find_free(&self) -> Option<usize> {
        (1..N_DESCRIPTORS).find(|&fd| matches!(self.get_field(fd, Field::Size), Ok(None)))
    }

    pub fn as_blocks(&self) -> &[Block; DESCRIPTOR_BLOCKS] {
        &self.blocks
    }
}

impl core::fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let used = (0..N_DESCRIPTORS)
            .filter(|&fd| !matches!(self.get_field(fd, Field::Size), Ok(None)))
            .count();
        f.debug_struct("DescriptorTable").field("used", &used).finish()
    }
}
