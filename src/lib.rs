//! An emulated block file system with write-ahead replication.
//!
//! Each [`FileSystemNode`] owns a 64-block in-memory disk laid out as a
//! bitmap, a descriptor table, a directory and a data pool, plus a small
//! open file table and a scratch buffer. A [`ReplicationCoordinator`] runs a
//! fixed set of nodes and applies every descriptor-mutating operation to all
//! of them through a sequenced write-ahead log.
extern crate alloc;

pub mod bitmap;
pub mod block_store;
pub mod codec;
pub mod common;
pub mod descriptor;
pub mod directory;
pub mod error;
mod file;
pub mod layout;
pub mod node;
pub mod oft;
pub mod operation;
pub mod replication;
pub mod shell;
pub mod wal;

#[cfg(test)]
mod dfs_test;
#[cfg(test)]
mod shell_test;

pub use common::{NodeStats, NodeStatus, TimeSpec};
pub use directory::FileName;
pub use error::{EfsError, EfsResult, Resource};
pub use node::{DirectoryListing, FileSystemNode};
pub use operation::{Operation, OperationKind};
pub use replication::ReplicationCoordinator;
pub use shell::Shell;
pub use wal::{WalEntry, WriteAheadLog};

#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
