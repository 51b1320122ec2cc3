use alloc::boxed::Box;
use core::fmt;

/// Fixed-size tables a request can run out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    DirectorySlot,
    Descriptor,
    Block,
    OftSlot,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::DirectorySlot => "directory slot",
            Resource::Descriptor => "file descriptor",
            Resource::Block => "data block",
            Resource::OftSlot => "open file table slot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, onlyerror::Error)]
pub enum EfsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("no free {0}")]
    ResourceExhausted(Resource),
    #[error("file is open")]
    Conflict,
    #[error("out of range")]
    OutOfRange,
    #[error("file size limit reached")]
    CapacityExceeded,
    #[error("write-ahead log is full")]
    LogFull,
    #[error("replication failed on node {0}: {1}")]
    ReplicationFailure(usize, Box<EfsError>),
    #[error("invalid file name")]
    InvalidName,
    #[error("serialization failed")]
    Serialization,
}

impl EfsError {
    /// Wraps `cause` as the failure reported for `node`.
    pub fn replication(node: usize, cause: EfsError) -> Self {
        EfsError::ReplicationFailure(node, Box::new(cause))
    }
}

pub type EfsResult<T> = Result<T, EfsError>;
