use alloc::collections::VecDeque;
use alloc::string::String;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::common::TimeSpec;
use crate::error::{EfsError, EfsResult};
use crate::layout::WAL_CAPACITY;
use crate::operation::{Operation, OperationKind};

/// One logged operation. Every node holds an identical copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    pub sequence: u64,
    pub timestamp: TimeSpec,
    pub operation: Operation,
}

impl WalEntry {
    pub fn new(sequence: u64, operation: Operation) -> Self {
        Self {
            sequence,
            timestamp: TimeSpec::now(),
            operation,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

/// Bounded ring buffer of entries, oldest first.
#[derive(Debug, Clone)]
pub struct WriteAheadLog {
    entries: VecDeque<WalEntry>,
}

impl WriteAheadLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(WAL_CAPACITY),
        }
    }

    pub fn append(&mut self, entry: WalEntry) -> EfsResult<()> {
        if self.is_full() {
            warn!("WAL full, rejecting entry {}", entry.sequence);
            return Err(EfsError::LogFull);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= WAL_CAPACITY
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalEntry> {
        self.entries.iter()
    }

    /// Entries newer than `sequence` (all of them for `None`).
    pub fn pending_after(&self, sequence: Option<u64>) -> impl Iterator<Item = &WalEntry> {
        self.entries
            .iter()
            .filter(move |e| sequence.map_or(true, |s| e.sequence > s))
    }

    /// Drops entries up to and including `sequence`, returns how many.
    pub fn truncate_through(&mut self, sequence: u64) -> usize {
        let mut dropped = 0;
        while self.entries.front().is_some_and(|e| e.sequence <= sequence) {
            self.entries.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// One JSON object per line, oldest first.
    pub fn to_json_lines(&self) -> EfsResult<String> {
        let mut out = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry).map_err(|_| EfsError::Serialization)?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

impl Default for WriteAheadLog {
    fn default() -> Self {
        Self::new()
    }
}
