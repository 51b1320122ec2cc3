use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::directory::FileName;
use crate::error::EfsResult;
use crate::node::FileSystemNode;

/// A descriptor-mutating call, as recorded in the write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create {
        name: FileName,
    },
    Destroy {
        name: FileName,
    },
    Write {
        slot: usize,
        /// Where the payload is published in the node's memory buffer
        offset: usize,
        data: Vec<u8>,
    },
    Seek {
        slot: usize,
        position: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Destroy,
    Write,
    Seek,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Destroy => "destroy",
            OperationKind::Write => "write",
            OperationKind::Seek => "seek",
        };
        f.write_str(name)
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Destroy { .. } => OperationKind::Destroy,
            Operation::Write { .. } => OperationKind::Write,
            Operation::Seek { .. } => OperationKind::Seek,
        }
    }

    /// Apply the operation to one node's storage engine.
    ///
    /// Returns the descriptor for a create, the bytes written for a write and
    /// zero otherwise.
    pub fn apply(&self, node: &mut FileSystemNode) -> EfsResult<usize> {
        match self {
            Operation::Create { name } => node.create(name),
            Operation::Destroy { name } => node.destroy(name).map(|_| 0),
            Operation::Write { slot, offset, data } => {
                // Publish the payload, then write it out of memory.
                let staged = node.write_memory(*offset, data)?;
                node.write(*slot, *offset, staged)
            }
            Operation::Seek { slot, position } => node.seek(*slot, *position).map(|_| 0),
        }
    }
}
