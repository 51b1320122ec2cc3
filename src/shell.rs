//! Line-oriented command shell over a single node or a replicated cluster.
//!
//! Commands are two-letter opcodes followed by space-separated arguments.
//! Every failure prints the single line `error`; the cause is logged at debug
//! level.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::debug;

use crate::directory::FileName;
use crate::error::EfsError;
use crate::node::{DirectoryListing, FileSystemNode};
use crate::replication::ReplicationCoordinator;

pub const DIRECTORY_HEADER: &str = "=================== directory ====================";

#[derive(Debug, onlyerror::Error)]
enum ShellError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("wrong arguments for `{0}`")]
    Usage(String),
    #[error("file system not initialized")]
    Uninitialized,
    #[error("file system already initialized")]
    AlreadyInitialized,
    #[error("{0}")]
    Fs(EfsError),
}

impl From<EfsError> for ShellError {
    fn from(e: EfsError) -> Self {
        ShellError::Fs(e)
    }
}

type ShellResult = Result<String, ShellError>;

enum Backend {
    Single {
        node: FileSystemNode,
        initialized: bool,
    },
    Cluster(ReplicationCoordinator),
}

pub struct Shell {
    backend: Backend,
}

fn number(arg: &str) -> Result<usize, ShellError> {
    arg.parse()
        .map_err(|_| ShellError::Usage(arg.to_string()))
}

fn name(arg: &str) -> Result<FileName, ShellError> {
    Ok(FileName::new(arg)?)
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

fn listing(entries: &[DirectoryListing]) -> String {
    let mut out = String::from(DIRECTORY_HEADER);
    for entry in entries {
        let size = entry.size.map_or(-1, i64::from);
        out.push_str(&format!(
            "\nfile_name: {} | index_field: {} | file size: {}",
            entry.name, entry.descriptor, size
        ));
    }
    out
}

impl Shell {
    /// Shell over one node; `in` must come first.
    pub fn single() -> Result<Self, EfsError> {
        Ok(Self {
            backend: Backend::Single {
                node: FileSystemNode::new(0)?,
                initialized: false,
            },
        })
    }

    pub fn cluster(nodes: usize) -> Result<Self, EfsError> {
        Ok(Self {
            backend: Backend::Cluster(ReplicationCoordinator::new(nodes)?),
        })
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.backend, Backend::Cluster(_))
    }

    /// Runs one command line. Blank lines produce no output.
    pub fn execute(&mut self, line: &str) -> Option<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (&command, args) = tokens.split_first()?;
        let result = match &mut self.backend {
            Backend::Single { node, initialized } => single(node, initialized, command, args),
            Backend::Cluster(cluster) => clustered(cluster, command, args),
        };
        Some(result.unwrap_or_else(|e| {
            debug!("`{}` failed: {}", line.trim(), e);
            String::from("error")
        }))
    }
}

fn single(
    node: &mut FileSystemNode,
    initialized: &mut bool,
    command: &str,
    args: &[&str],
) -> ShellResult {
    if command == "in" {
        if !args.is_empty() {
            return Err(ShellError::Usage(command.to_string()));
        }
        if *initialized {
            return Err(ShellError::AlreadyInitialized);
        }
        node.init()?;
        *initialized = true;
        return Ok(String::from("system initialized"));
    }
    if !*initialized {
        return Err(ShellError::Uninitialized);
    }

    match (command, args) {
        ("wm", [offset, text @ ..]) if !text.is_empty() => {
            let n = node.write_memory(number(offset)?, text.join(" ").as_bytes())?;
            Ok(format!("{} bytes written to M", n))
        }
        ("cr", [file]) => {
            node.create(&name(file)?)?;
            Ok(format!("{} created", file))
        }
        ("de", [file]) => {
            node.destroy(&name(file)?)?;
            Ok(format!("{} destroyed", file))
        }
        ("op", [file]) => {
            let slot = node.open(&name(file)?)?;
            Ok(format!("{} opened {}", file, slot))
        }
        ("cl", [slot]) => {
            let slot = number(slot)?;
            node.close(slot)?;
            Ok(format!("{} closed", slot))
        }
        ("wr", [slot, src, n]) => {
            let slot = number(slot)?;
            let written = node.write(slot, number(src)?, number(n)?)?;
            Ok(format!("{} bytes written to {}", written, slot))
        }
        ("rd", [slot, dest, n]) => {
            let slot = number(slot)?;
            let count = node.read(slot, number(dest)?, number(n)?)?;
            Ok(format!("{} bytes read from {}", count, slot))
        }
        ("sk", [slot, position]) => {
            let position = number(position)?;
            node.seek(number(slot)?, position)?;
            Ok(format!("position is {}", position))
        }
        ("dr", []) => Ok(listing(&node.directory())),
        ("rm", [offset, n]) => Ok(printable(node.read_memory(number(offset)?, number(n)?)?)),
        ("wm" | "cr" | "de" | "op" | "cl" | "wr" | "rd" | "sk" | "dr" | "rm", _) => {
            Err(ShellError::Usage(command.to_string()))
        }
        _ => Err(ShellError::Unknown(command.to_string())),
    }
}

fn clustered(cluster: &ReplicationCoordinator, command: &str, args: &[&str]) -> ShellResult {
    match (command, args) {
        ("in", []) => {
            cluster.init()?;
            Ok(String::from("distributed system initialized"))
        }
        ("wm", [node, offset, text @ ..]) if !text.is_empty() => {
            let node = number(node)?;
            let n = cluster.write_memory(node, number(offset)?, text.join(" ").as_bytes())?;
            Ok(format!("{} bytes written to M on node {}", n, node))
        }
        ("cr", [file]) => {
            cluster.create(&name(file)?)?;
            Ok(format!("{} created on all nodes", file))
        }
        ("de", [file]) => {
            cluster.destroy(&name(file)?)?;
            Ok(format!("{} destroyed on all nodes", file))
        }
        ("op", [node, file]) => {
            let node = number(node)?;
            let slot = cluster.open(node, &name(file)?)?;
            Ok(format!("{} opened at {} on node {}", file, slot, node))
        }
        ("cl", [node, slot]) => {
            let (node, slot) = (number(node)?, number(slot)?);
            cluster.close(node, slot)?;
            Ok(format!("{} closed on node {}", slot, node))
        }
        ("wr", [slot, src, n]) => {
            let written = cluster.write(number(slot)?, number(src)?, number(n)?)?;
            Ok(format!("{} bytes written to all nodes", written))
        }
        ("rd", [node, slot, dest, n]) => {
            let node = number(node)?;
            let count = cluster.read(node, number(slot)?, number(dest)?, number(n)?)?;
            Ok(format!("{} bytes read from node {}", count, node))
        }
        ("sk", [slot, position]) => {
            let position = number(position)?;
            cluster.seek(number(slot)?, position)?;
            Ok(format!("position is {} on all nodes", position))
        }
        ("dr", [node]) => Ok(listing(&cluster.directory(number(node)?)?)),
        ("rm", [node, offset, n]) => {
            let bytes = cluster.read_memory(number(node)?, number(offset)?, number(n)?)?;
            Ok(printable(&bytes))
        }
        ("wl", []) => wal_dump(cluster, cluster.leader()),
        ("wl", [node]) => wal_dump(cluster, number(node)?),
        ("st", []) => stats_dump(cluster, cluster.leader()),
        ("st", [node]) => stats_dump(cluster, number(node)?),
        ("cu", [node]) => {
            let node = number(node)?;
            let count = cluster.catch_up(node)?;
            Ok(format!("node {} caught up with {} entries", node, count))
        }
        ("in" | "wm" | "cr" | "de" | "op" | "cl" | "wr" | "rd" | "sk" | "dr" | "rm" | "wl"
        | "st" | "cu", _) => Err(ShellError::Usage(command.to_string())),
        _ => Err(ShellError::Unknown(command.to_string())),
    }
}

fn wal_dump(cluster: &ReplicationCoordinator, node: usize) -> ShellResult {
    let dump = cluster.node(node)?.wal().to_json_lines()?;
    Ok(dump.trim_end().to_string())
}

fn stats_dump(cluster: &ReplicationCoordinator, node: usize) -> ShellResult {
    let guard = cluster.node(node)?;
    let value = serde_json::json!({
        "node": node,
        "status": guard.status(),
        "wal_entries": guard.wal().len(),
        "stats": guard.stats(),
    });
    serde_json::to_string(&value).map_err(|_| ShellError::Fs(EfsError::Serialization))
}
