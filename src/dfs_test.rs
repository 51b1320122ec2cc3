#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use crate::common::NodeStatus;
    use crate::directory::FileName;
    use crate::error::EfsError;
    use crate::layout::*;
    use crate::node::FileSystemNode;
    use crate::operation::{Operation, OperationKind};
    use crate::replication::ReplicationCoordinator;

    fn name(s: &str) -> FileName {
        FileName::new(s).expect("valid name")
    }

    fn cluster() -> ReplicationCoordinator {
        crate::init_test_logger();
        ReplicationCoordinator::new(NUM_NODES).expect("cluster init")
    }

    fn open_everywhere(dfs: &ReplicationCoordinator, file: &str) -> usize {
        let slots: Vec<usize> = (0..dfs.len())
            .map(|node| dfs.open(node, &name(file)).expect("open"))
            .collect();
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
        slots[0]
    }

    fn sequences(dfs: &ReplicationCoordinator, node: usize) -> Vec<u64> {
        dfs.node(node).unwrap().wal().iter().map(|e| e.sequence).collect()
    }

    #[test]
    fn test_sequencing_identical_on_all_nodes() {
        let dfs = cluster();
        assert_eq!(dfs.create(&name("A")), Ok(1));
        assert_eq!(dfs.create(&name("B")), Ok(2));
        let slot = open_everywhere(&dfs, "A");
        dfs.write_memory(dfs.leader(), 0, b"hello").unwrap();
        assert_eq!(dfs.write(slot, 0, 5), Ok(5));
        dfs.seek(slot, 1).unwrap();
        dfs.destroy(&name("B")).unwrap();

        assert_eq!(sequences(&dfs, 0), [0, 1, 2, 3, 4]);
        let leader: Vec<_> = dfs.node(0).unwrap().wal().iter().cloned().collect();
        for node in 1..dfs.len() {
            let log: Vec<_> = dfs.node(node).unwrap().wal().iter().cloned().collect();
            assert_eq!(log, leader);
        }
        assert_eq!(leader[2].kind(), OperationKind::Write);
        assert_eq!(dfs.next_sequence(), 5);
        assert!(dfs.converged());
    }

    #[test]
    fn test_write_payload_reaches_followers() {
        let dfs = cluster();
        dfs.create(&name("W")).unwrap();
        let slot = open_everywhere(&dfs, "W");
        dfs.write_memory(0, 10, b"replica").unwrap();
        dfs.write(slot, 10, 7).unwrap();

        for node in 0..dfs.len() {
            dfs.seek(slot, 0).unwrap();
            assert_eq!(dfs.read(node, slot, 100, 16), Ok(7));
            assert_eq!(dfs.read_memory(node, 100, 7).unwrap(), b"replica");
            assert_eq!(dfs.node(node).unwrap().oft().entry(slot).unwrap().size(), 7);
        }
    }

    #[test]
    fn test_replay_on_fresh_node_is_deterministic() {
        let dfs = cluster();
        dfs.create(&name("A")).unwrap();
        dfs.create(&name("B")).unwrap();
        dfs.destroy(&name("A")).unwrap();
        dfs.create(&name("C")).unwrap();
        let slot = open_everywhere(&dfs, "C");
        dfs.write_memory(0, 0, &[5u8; 300]).unwrap();
        dfs.write(slot, 0, 300).unwrap();
        dfs.write(slot, 0, 300).unwrap();

        let log: Vec<_> = dfs.node(0).unwrap().wal().iter().cloned().collect();
        let mut replica = FileSystemNode::new(9).unwrap();
        for entry in &log {
            if entry.kind() == OperationKind::Write && replica.oft().open_count() == 0 {
                replica.open(&name("C")).unwrap();
            }
            replica.apply(entry).unwrap();
        }
        for node in 0..dfs.len() {
            assert!(dfs.node(node).unwrap().state_eq(&replica));
        }
        assert_eq!(replica.stats().applied, log.len() as u64);
    }

    #[test]
    fn test_full_log_rejects_without_mutation() {
        let dfs = cluster();
        for i in 0..WAL_CAPACITY {
            dfs.log_operation(Operation::Seek {
                slot: 1,
                position: i,
            })
            .unwrap();
        }
        assert_eq!(
            dfs.log_operation(Operation::Create { name: name("X") }),
            Err(EfsError::LogFull)
        );
        assert_eq!(dfs.next_sequence(), WAL_CAPACITY as u64);
        for node in 0..dfs.len() {
            assert_eq!(dfs.node(node).unwrap().wal().len(), WAL_CAPACITY);
        }
    }

    #[test]
    fn test_one_full_log_blocks_every_node() {
        let dfs = cluster();
        {
            let mut last = dfs.node(2).unwrap();
            for seq in 0..WAL_CAPACITY as u64 {
                let entry = crate::wal::WalEntry::new(seq, Operation::Create { name: name("Z") });
                last.append_log(entry).unwrap();
            }
        }
        assert_eq!(dfs.create(&name("A")), Err(EfsError::LogFull));
        assert_eq!(dfs.next_sequence(), 0);
        assert!(dfs.node(0).unwrap().wal().is_empty());
        assert!(dfs.node(1).unwrap().wal().is_empty());
        assert!(dfs.node(0).unwrap().directory().is_empty());
    }

    #[test]
    fn test_replication_failure_leaves_gap() {
        let dfs = cluster();
        dfs.create(&name("A")).unwrap();
        let slot = dfs.open(0, &name("A")).unwrap();
        dfs.write_memory(0, 0, b"12345").unwrap();

        let err = dfs.write(slot, 0, 5).unwrap_err();
        assert_eq!(err, EfsError::replication(1, EfsError::NotFound));
        assert_eq!(
            dfs.statuses(),
            [NodeStatus::Active, NodeStatus::Failed, NodeStatus::Lagging]
        );
        // no rollback on the node that already applied
        assert_eq!(dfs.node(0).unwrap().oft().entry(slot).unwrap().size(), 5);
        assert_eq!(dfs.node(1).unwrap().stats().failed, 1);
        assert_eq!(dfs.node(2).unwrap().stats().last_applied, Some(0));
        assert_eq!(dfs.node(2).unwrap().wal().pending_after(Some(0)).count(), 1);
    }

    #[test]
    fn test_catch_up_converges_lagging_node() {
        let dfs = cluster();
        dfs.create(&name("A")).unwrap();
        let slot = dfs.open(0, &name("A")).unwrap();
        dfs.write_memory(0, 0, b"12345").unwrap();
        assert!(dfs.write(slot, 0, 5).is_err());

        dfs.open(2, &name("A")).unwrap();
        assert_eq!(dfs.catch_up(2), Ok(1));
        assert_eq!(dfs.node(2).unwrap().status(), NodeStatus::Active);
        assert_eq!(dfs.node(2).unwrap().stats().replays, 1);
        assert_eq!(dfs.node(2).unwrap().oft().entry(slot).unwrap().size(), 5);
        // the failed entry counts as consumed on node 1
        assert_eq!(dfs.catch_up(1), Ok(0));
        assert_eq!(dfs.catch_up(7), Err(EfsError::OutOfRange));
    }

    #[test]
    fn test_lagging_node_replays_skipped_entries() {
        let dfs = cluster();
        dfs.create(&name("A")).unwrap();
        let slot = dfs.open(0, &name("A")).unwrap();
        assert_eq!(dfs.open(2, &name("A")), Ok(slot));
        dfs.write_memory(0, 0, b"12345").unwrap();
        assert!(dfs.write(slot, 0, 5).is_err());
        assert_eq!(dfs.node(2).unwrap().status(), NodeStatus::Lagging);

        assert_eq!(dfs.create(&name("B")), Ok(2));
        let node = dfs.node(2).unwrap();
        assert_eq!(node.status(), NodeStatus::Active);
        assert_eq!(node.stats().last_applied, Some(2));
        assert_eq!(node.stats().replays, 1);
        assert_eq!(node.oft().entry(slot).unwrap().size(), 5);
        assert_eq!(node.directory().len(), 2);
        assert!(node.state_eq(&dfs.node(0).unwrap()));
        drop(node);
        assert_eq!(dfs.catch_up(2), Ok(0));
    }

    #[test]
    fn test_checkpoint_trims_log() {
        let dfs = cluster();
        for i in 0..CHECKPOINT_INTERVAL + 2 {
            dfs.create(&name(&format!("F{}", i))).unwrap();
        }
        for node in 0..dfs.len() {
            let node = dfs.node(node).unwrap();
            assert_eq!(node.stats().applied, CHECKPOINT_INTERVAL + 2);
            assert_eq!(node.stats().since_checkpoint, 2);
            assert_eq!(node.wal().len(), 2);
            assert_eq!(node.directory().len(), CHECKPOINT_INTERVAL as usize + 2);
        }
        assert_eq!(sequences(&dfs, 1), [10, 11]);
    }

    #[test]
    fn test_init_restarts_cluster() {
        let dfs = cluster();
        dfs.create(&name("A")).unwrap();
        dfs.set_leader(2).unwrap();
        assert_eq!(dfs.set_leader(3), Err(EfsError::OutOfRange));
        dfs.init().unwrap();
        assert_eq!(dfs.leader(), 0);
        assert_eq!(dfs.next_sequence(), 0);
        assert!(dfs.directory(1).unwrap().is_empty());
        assert!(dfs.node(1).unwrap().wal().is_empty());
        assert!(dfs.node(3).is_err());
        assert!(ReplicationCoordinator::new(0).is_err());
    }

    #[test]
    fn test_concurrent_submitters() {
        let dfs = Arc::new(cluster());
        let workers: Vec<_> = (0..4)
            .map(|t| {
                let dfs = dfs.clone();
                std::thread::spawn(move || {
                    for i in 0..5 {
                        dfs.create(&name(&format!("{}{}", t, i))).expect("create");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }

        assert_eq!(dfs.next_sequence(), 20);
        assert!(dfs.converged());
        for node in 0..dfs.len() {
            let node = dfs.node(node).unwrap();
            assert_eq!(node.stats().applied, 20);
            assert_eq!(node.directory().len(), 20);
            assert!(node.wal().is_empty());
        }
    }
}
