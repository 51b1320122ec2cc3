//! Write-ahead replication over a fixed set of nodes.
//!
//! Every descriptor-mutating operation is logged with one global sequence
//! number on all nodes, then applied to the nodes in index order. A node that
//! rejects the entry aborts the round: nodes before it keep the change, nodes
//! after it are left lagging with the entry pending in their logs. Nothing is
//! rolled back. A lagging node replays its pending entries before the next
//! one it is given, and `catch_up` replays them on demand.

use alloc::vec::Vec;

use log::{debug, info, warn};
use spin::{Mutex, MutexGuard};

use crate::common::NodeStatus;
use crate::directory::FileName;
use crate::error::{EfsError, EfsResult};
use crate::node::{DirectoryListing, FileSystemNode};
use crate::operation::Operation;
use crate::wal::WalEntry;

pub struct ReplicationCoordinator {
    nodes: Vec<Mutex<FileSystemNode>>,
    leader: Mutex<usize>,
    /// Next sequence number. Held across log and apply by `submit`.
    sequencer: Mutex<u64>,
}

impl ReplicationCoordinator {
    pub fn new(count: usize) -> EfsResult<Self> {
        if count == 0 {
            return Err(EfsError::OutOfRange);
        }
        let nodes = (0..count)
            .map(|id| FileSystemNode::new(id).map(Mutex::new))
            .collect::<EfsResult<Vec<_>>>()?;
        info!("coordinator started with {} nodes", count);
        Ok(Self {
            nodes,
            leader: Mutex::new(0),
            sequencer: Mutex::new(0),
        })
    }

    /// Re-initializes every node and restarts sequencing from zero.
    pub fn init(&self) -> EfsResult<()> {
        let mut sequencer = self.sequencer.lock();
        for node in &self.nodes {
            node.lock().init()?;
        }
        *self.leader.lock() = 0;
        *sequencer = 0;
        info!("cluster of {} nodes initialized", self.nodes.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leader(&self) -> usize {
        *self.leader.lock()
    }

    pub fn set_leader(&self, id: usize) -> EfsResult<()> {
        if id >= self.nodes.len() {
            return Err(EfsError::OutOfRange);
        }
        *self.leader.lock() = id;
        Ok(())
    }

    pub fn node(&self, id: usize) -> EfsResult<MutexGuard<'_, FileSystemNode>> {
        self.nodes
            .get(id)
            .map(|node| node.lock())
            .ok_or(EfsError::OutOfRange)
    }

    pub fn next_sequence(&self) -> u64 {
        *self.sequencer.lock()
    }

    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.nodes.iter().map(|node| node.lock().status()).collect()
    }

    /// Assigns the next sequence number and appends the entry to every log.
    pub fn log_operation(&self, operation: Operation) -> EfsResult<WalEntry> {
        let mut sequencer = self.sequencer.lock();
        self.log_with(&mut sequencer, operation)
    }

    fn log_with(&self, sequencer: &mut u64, operation: Operation) -> EfsResult<WalEntry> {
        for (id, node) in self.nodes.iter().enumerate() {
            if node.lock().wal().is_full() {
                warn!("node {}: log full, {} not logged", id, operation.kind());
                return Err(EfsError::LogFull);
            }
        }
        let entry = WalEntry::new(*sequencer, operation);
        *sequencer += 1;
        for node in &self.nodes {
            node.lock().append_log(entry.clone())?;
        }
        debug!("logged {} as #{}", entry.kind(), entry.sequence);
        Ok(entry)
    }

    /// Applies `entry` to every node in index order and returns each
    /// node's result. A lagging node first replays the entries it skipped.
    pub fn replicate(&self, entry: &WalEntry) -> EfsResult<Vec<usize>> {
        let mut results = Vec::with_capacity(self.nodes.len());
        for (id, node) in self.nodes.iter().enumerate() {
            let mut node = node.lock();
            match node.apply_in_order(entry) {
                Ok(value) => {
                    node.set_status(NodeStatus::Active);
                    results.push(value);
                }
                Err(cause) => {
                    node.set_status(NodeStatus::Failed);
                    drop(node);
                    warn!(
                        "{} #{} rejected by node {}: {}",
                        entry.kind(),
                        entry.sequence,
                        id,
                        cause
                    );
                    for skipped in &self.nodes[id + 1..] {
                        skipped.lock().set_status(NodeStatus::Lagging);
                    }
                    return Err(EfsError::replication(id, cause));
                }
            }
        }
        Ok(results)
    }

    /// Logs and replicates `operation` as one step.
    pub fn submit(&self, operation: Operation) -> EfsResult<Vec<usize>> {
        let mut sequencer = self.sequencer.lock();
        let entry = self.log_with(&mut sequencer, operation)?;
        self.replicate(&entry)
    }

    fn leader_result(&self, results: Vec<usize>) -> EfsResult<usize> {
        results
            .get(self.leader())
            .copied()
            .ok_or(EfsError::OutOfRange)
    }

    pub fn create(&self, name: &FileName) -> EfsResult<usize> {
        let results = self.submit(Operation::Create { name: *name })?;
        self.leader_result(results)
    }

    pub fn destroy(&self, name: &FileName) -> EfsResult<()> {
        self.submit(Operation::Destroy { name: *name }).map(|_| ())
    }

    /// Writes `n` bytes of the leader's scratch memory at `src` to `slot` on
    /// every node.
    pub fn write(&self, slot: usize, src: usize, n: usize) -> EfsResult<usize> {
        let data = self.node(self.leader())?.read_memory(src, n)?.to_vec();
        let results = self.submit(Operation::Write {
            slot,
            offset: src,
            data,
        })?;
        self.leader_result(results)
    }

    pub fn seek(&self, slot: usize, position: usize) -> EfsResult<()> {
        self.submit(Operation::Seek { slot, position }).map(|_| ())
    }

    pub fn open(&self, node: usize, name: &FileName) -> EfsResult<usize> {
        self.node(node)?.open(name)
    }

    pub fn close(&self, node: usize, slot: usize) -> EfsResult<()> {
        self.node(node)?.close(slot)
    }

    pub fn read(&self, node: usize, slot: usize, dest: usize, n: usize) -> EfsResult<usize> {
        self.node(node)?.read(slot, dest, n)
    }

    pub fn directory(&self, node: usize) -> EfsResult<Vec<DirectoryListing>> {
        Ok(self.node(node)?.directory())
    }

    pub fn read_memory(&self, node: usize, offset: usize, n: usize) -> EfsResult<Vec<u8>> {
        Ok(self.node(node)?.read_memory(offset, n)?.to_vec())
    }

    pub fn write_memory(&self, node: usize, offset: usize, data: &[u8]) -> EfsResult<usize> {
        self.node(node)?.write_memory(offset, data)
    }

    /// Replays the entries `node` has not consumed and returns how many.
    pub fn catch_up(&self, node: usize) -> EfsResult<usize> {
        let _sequencer = self.sequencer.lock();
        let mut guard = self.node(node)?;
        guard.set_status(NodeStatus::Recovering);
        match guard.replay_pending() {
            Ok(count) => {
                guard.set_status(NodeStatus::Active);
                info!("node {} caught up with {} entries", node, count);
                Ok(count)
            }
            Err(e) => {
                guard.set_status(NodeStatus::Failed);
                warn!("node {} failed to catch up: {}", node, e);
                Err(e)
            }
        }
    }

    /// Whether every node's metadata matches the leader's.
    pub fn converged(&self) -> bool {
        let leader_id = self.leader();
        let Some(leader) = self.nodes.get(leader_id) else {
            return false;
        };
        let leader = leader.lock();
        self.nodes
            .iter()
            .enumerate()
            .filter(|(id, _)| *id != leader_id)
            .all(|(_, node)| node.lock().state_eq(&leader))
    }
}

impl core::fmt::Debug for ReplicationCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReplicationCoordinator")
            .field("nodes", &self.nodes.len())
            .field("leader", &self.leader())
            .field("next_sequence", &self.next_sequence())
            .finish()
    }
}
