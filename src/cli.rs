use crate::config::load_config;
use crate::dump::LayoutDump;
use crate::layout::{EngineKind, GraphDocument};
use crate::runtime::LayoutRuntime;
use crate::snapshot::Snapshot;
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "vgr",
    version,
    about = "Layout runtime for hierarchical entity graphs"
)]
pub struct Args {
    /// Input document (entities + relationships JSON) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Layout engine tag (containment | flat)
    #[arg(short = 'e', long = "engine", default_value = "containment")]
    pub engine: String,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Restore a previously saved snapshot instead of running a layout
    #[arg(long = "snapshotIn")]
    pub snapshot_in: Option<PathBuf>,

    /// Write the resulting graph as a snapshot
    #[arg(long = "snapshotOut")]
    pub snapshot_out: Option<PathBuf>,

    /// Layout dump output path. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let engine = EngineKind::from_tag(&args.engine)?;

    let mut runtime = LayoutRuntime::new(engine, config);

    if let Some(snapshot_path) = args.snapshot_in.as_deref() {
        let contents = std::fs::read_to_string(snapshot_path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        runtime.restore(snapshot)?;
    } else {
        let input = read_input(args.input.as_deref())?;
        let document: GraphDocument = serde_json::from_str(&input)?;
        runtime.load(&document);
    }

    if let Some(snapshot_out) = args.snapshot_out.as_deref() {
        let snapshot = runtime.save();
        std::fs::write(snapshot_out, serde_json::to_string_pretty(&snapshot)?)?;
    }

    let dump = LayoutDump::from_graph(runtime.graph());
    match args.output.as_deref() {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&dump)?)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dump)?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
