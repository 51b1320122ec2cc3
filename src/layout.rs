//! On-disk geometry of an emulated node.
//!
//! Block 0 holds the bitmap, blocks 1..=6 the descriptor table, block 7 the
//! directory and blocks 8..64 are the user data pool.

pub const N_BLOCKS: usize = 64;
pub const BLOCK_SIZE: usize = 512;

pub const BITMAP_BLOCK: usize = 0;

pub const DESCRIPTOR_START: usize = 1;
pub const DESCRIPTOR_BLOCKS: usize = 6;
pub const DESCRIPTOR_SIZE: usize = 16;
pub const DESCRIPTORS_PER_BLOCK: usize = BLOCK_SIZE / DESCRIPTOR_SIZE;
pub const N_DESCRIPTORS: usize = DESCRIPTOR_BLOCKS * DESCRIPTORS_PER_BLOCK;
/// Descriptor reserved for the directory file
pub const DIRECTORY_DESCRIPTOR: usize = 0;

pub const DIRECTORY_BLOCK: usize = 7;
pub const DIR_ENTRY_SIZE: usize = 8;
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const NAME_LEN: usize = 4;

/// First block handed out by the allocator
pub const DATA_START: usize = 8;

pub const MAX_FILE_BLOCKS: usize = 3;
pub const MAX_FILE_SIZE: usize = MAX_FILE_BLOCKS * BLOCK_SIZE;

/// Slot 0 is the directory, 1..=3 serve user files
pub const OFT_SLOTS: usize = 4;
pub const DIRECTORY_SLOT: usize = 0;

/// Scratch memory buffer used to stage file data
pub const MEMORY_SIZE: usize = 512;

pub const WAL_CAPACITY: usize = 256;
pub const NUM_NODES: usize = 3;
/// Applied entries between two automatic checkpoints
pub const CHECKPOINT_INTERVAL: u64 = 10;

/// Disk block holding descriptor `fd`
#[inline]
pub const fn descriptor_block(fd: usize) -> usize {
    fd * DESCRIPTOR_SIZE / BLOCK_SIZE + DESCRIPTOR_START
}

/// Byte offset of descriptor `fd` inside its block
#[inline]
pub const fn descriptor_offset(fd: usize) -> usize {
    fd * DESCRIPTOR_SIZE % BLOCK_SIZE
}
