#[cfg(test)]
mod tests {
    use alloc::string::String;

    use crate::shell::{Shell, DIRECTORY_HEADER};

    fn run(shell: &mut Shell, line: &str) -> String {
        shell.execute(line).expect("command produces output")
    }

    #[test]
    fn test_single_node_session() {
        crate::init_test_logger();
        let mut shell = Shell::single().unwrap();
        assert_eq!(run(&mut shell, "cr AAAA"), "error");
        assert_eq!(run(&mut shell, "in"), "system initialized");
        assert_eq!(run(&mut shell, "in"), "error");

        assert_eq!(run(&mut shell, "cr AAAA"), "AAAA created");
        assert_eq!(run(&mut shell, "op AAAA"), "AAAA opened 1");
        assert_eq!(run(&mut shell, "wm 0 hello world"), "11 bytes written to M");
        assert_eq!(run(&mut shell, "wr 1 0 11"), "11 bytes written to 1");
        assert_eq!(run(&mut shell, "sk 1 6"), "position is 6");
        assert_eq!(run(&mut shell, "rd 1 20 5"), "5 bytes read from 1");
        assert_eq!(run(&mut shell, "rm 20 5"), "world");
        assert_eq!(run(&mut shell, "cl 1"), "1 closed");
        assert_eq!(
            run(&mut shell, "dr"),
            format!(
                "{}\nfile_name: AAAA | index_field: 1 | file size: 11",
                DIRECTORY_HEADER
            )
        );
        assert_eq!(run(&mut shell, "de AAAA"), "AAAA destroyed");
        assert_eq!(run(&mut shell, "dr"), DIRECTORY_HEADER);
    }

    #[test]
    fn test_single_node_errors() {
        let mut shell = Shell::single().unwrap();
        run(&mut shell, "in");
        assert_eq!(shell.execute("   "), None);
        assert_eq!(run(&mut shell, "xx"), "error");
        assert_eq!(run(&mut shell, "cr ABCDE"), "error");
        assert_eq!(run(&mut shell, "cr"), "error");
        assert_eq!(run(&mut shell, "cl 0"), "error");
        assert_eq!(run(&mut shell, "cl one"), "error");
        assert_eq!(run(&mut shell, "wm 600 late"), "error");
        assert_eq!(run(&mut shell, "de none"), "error");
        assert_eq!(run(&mut shell, "rd 1 0 4"), "error");
    }

    #[test]
    fn test_cluster_session() {
        crate::init_test_logger();
        let mut shell = Shell::cluster(3).unwrap();
        assert!(shell.is_cluster());
        assert_eq!(run(&mut shell, "in"), "distributed system initialized");
        assert_eq!(run(&mut shell, "cr A"), "A created on all nodes");
        for node in 0..3 {
            assert_eq!(
                run(&mut shell, &format!("op {} A", node)),
                format!("A opened at 1 on node {}", node)
            );
        }
        assert_eq!(run(&mut shell, "op 5 A"), "error");
        assert_eq!(run(&mut shell, "wm 0 0 abc"), "3 bytes written to M on node 0");
        assert_eq!(run(&mut shell, "wr 1 0 3"), "3 bytes written to all nodes");
        assert_eq!(run(&mut shell, "sk 1 0"), "position is 0 on all nodes");
        assert_eq!(run(&mut shell, "rd 2 1 10 3"), "3 bytes read from node 2");
        assert_eq!(run(&mut shell, "rm 2 10 3"), "abc");
        assert_eq!(run(&mut shell, "cl 2 1"), "1 closed on node 2");
        assert!(run(&mut shell, "dr 2").ends_with("file_name: A | index_field: 1 | file size: 3"));

        let wal = run(&mut shell, "wl 1");
        assert_eq!(wal.lines().count(), 3);
        assert!(wal.lines().all(|line| line.starts_with('{')));
        let stats = run(&mut shell, "st 1");
        assert!(stats.contains("\"applied\":3"), "{}", stats);
        assert_eq!(run(&mut shell, "cu 1"), "node 1 caught up with 0 entries");
        assert_eq!(run(&mut shell, "de A"), "error");
        assert_eq!(run(&mut shell, "wl 9"), "error");
    }
}
