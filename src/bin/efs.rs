use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::Parser;
use efs::layout::NUM_NODES;
use efs::Shell;

#[derive(Parser)]
#[command(version, about = "Emulated file system shell")]
struct Cli {
    /// Run the replicated cluster instead of a single node
    #[arg(long, short)]
    cluster: bool,

    /// Number of nodes in cluster mode
    #[arg(long, short, default_value_t = NUM_NODES)]
    nodes: usize,

    /// Command script to run instead of reading stdin
    script: Option<PathBuf>,
}

fn run(shell: &mut Shell, input: impl BufRead, interactive: bool) -> io::Result<()> {
    let mut stdout = io::stdout();
    if interactive {
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    for line in input.lines() {
        let line = line?;
        if line.trim() == "exit" {
            break;
        }
        if let Some(output) = shell.execute(&line) {
            writeln!(stdout, "{}", output)?;
        }
        if interactive {
            write!(stdout, "> ")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let shell = if cli.cluster {
        Shell::cluster(cli.nodes)
    } else {
        Shell::single()
    };
    let mut shell = shell.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    match cli.script {
        Some(path) => run(&mut shell, BufReader::new(File::open(path)?), false),
        None => {
            println!("File System Shell");
            println!("Type 'exit' to quit");
            run(&mut shell, io::stdin().lock(), true)
        }
    }
}
