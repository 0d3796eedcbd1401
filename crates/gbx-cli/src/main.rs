use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gbx::header::HeaderBasic;
use gbx::ref_table::RefTable;
use gbx::settings::{ReadSettings, WriteSettings};
use gbx::{Chunk, Epoch, Gbx, Registry};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gbx", about = "Inspect and round-trip Gbx files")]
struct Cli {
    /// JSON file with read settings.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Log every chunk record.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print header fields and the chunk list.
    Info {
        file: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Stop after the header; the body is left undecoded.
        #[arg(long)]
        header_only: bool,
    },
    /// List the built-in classes.
    Classes,
    /// Read a file, write it back and compare.
    Roundtrip {
        file: PathBuf,
        /// Where to store the re-encoded file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ChunkSummary {
    id: String,
    kind: &'static str,
    skippable: bool,
    heavy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: format!("0x{:08X}", chunk.id),
            kind: chunk.kind.name(),
            skippable: chunk.skippable,
            heavy: chunk.heavy,
            version: chunk.version(),
            size: chunk.data.as_ref().map(Vec::len),
        }
    }
}

#[derive(Serialize)]
struct FileSummary<'a> {
    class_id: String,
    class_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<&'static str>,
    epoch: Epoch,
    basic: HeaderBasic,
    num_nodes: u32,
    refs: &'a RefTable,
    header_chunks: Vec<ChunkSummary>,
    body_chunks: Vec<ChunkSummary>,
    raw_body: Option<usize>,
}

fn load_settings(path: Option<&Path>) -> Result<ReadSettings> {
    let Some(path) = path else {
        return Ok(ReadSettings::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("failed to read settings: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse settings: {}", path.display()))
}

fn parse_file(path: &Path, registry: &Registry, settings: &ReadSettings) -> Result<(Vec<u8>, Gbx)> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let gbx = Gbx::parse(&data, registry, settings).with_context(|| format!("failed to decode {}", path.display()))?;
    Ok((data, gbx))
}

fn summarize<'a>(gbx: &'a Gbx, registry: &Registry) -> FileSummary<'a> {
    let class_id = gbx.class_id();
    FileSummary {
        class_id: format!("0x{class_id:08X}"),
        class_name: registry.class_name(class_id),
        extension: registry.class_extension(class_id),
        epoch: gbx.epoch(),
        basic: gbx.header.basic,
        num_nodes: gbx.header.num_nodes,
        refs: &gbx.refs,
        header_chunks: gbx.header_chunks().map(ChunkSummary::from).collect(),
        body_chunks: gbx
            .node()
            .map(|node| node.chunks.body().map(ChunkSummary::from).collect())
            .unwrap_or_default(),
        raw_body: gbx.raw_body().map(<[u8]>::len),
    }
}

fn print_chunks(title: &str, chunks: &[ChunkSummary]) {
    println!("{title} ({}):", chunks.len());
    for chunk in chunks {
        let mut line = format!("  {} {:<10}", chunk.id, chunk.kind);
        if chunk.skippable {
            line.push_str(" skippable");
        }
        if chunk.heavy {
            line.push_str(" heavy");
        }
        if let Some(version) = chunk.version {
            line.push_str(&format!(" v{version}"));
        }
        if let Some(size) = chunk.size {
            line.push_str(&format!(" {size} bytes"));
        }
        println!("{line}");
    }
}

fn cmd_info(path: &Path, json: bool, header_only: bool, mut settings: ReadSettings) -> Result<()> {
    settings.header_only |= header_only;
    let registry = gbx::engines::builtin()?;
    let (_, gbx) = parse_file(path, &registry, &settings)?;
    let summary = summarize(&gbx, &registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let basic = &summary.basic;
    println!("File: {}", path.display());
    println!(
        "Class: {} ({})",
        summary.class_id,
        summary.class_name.unwrap_or("unknown")
    );
    println!(
        "Version: {} format {} refs {} body {}",
        basic.version, basic.format, basic.ref_table_compression, basic.body_compression
    );
    if let Some(extension) = summary.extension {
        println!("Type: .{extension}.Gbx");
    }
    println!("Epoch: {}", summary.epoch);
    println!("Nodes: {}", summary.num_nodes);
    if !summary.refs.is_empty() {
        println!("External refs: {}", summary.refs.nodes.len());
    }
    print_chunks("Header chunks", &summary.header_chunks);
    match summary.raw_body {
        Some(len) => println!("Body: {len} raw bytes"),
        None => print_chunks("Body chunks", &summary.body_chunks),
    }
    Ok(())
}

fn cmd_classes() -> Result<()> {
    let registry = gbx::engines::builtin()?;
    let mut classes: Vec<_> = registry.classes().collect();
    classes.sort_by_key(|c| c.id);
    for class in classes {
        let mut line = format!("0x{:08X} {}", class.id, class.name);
        if let Some(parent) = class.parent.and_then(|id| registry.class_name(id)) {
            line.push_str(&format!(" : {parent}"));
        }
        if let Some(extension) = class.extension {
            line.push_str(&format!(" (.{extension}.Gbx)"));
        }
        if !class.is_concrete() {
            line.push_str(" abstract");
        }
        println!("{line}");
    }
    Ok(())
}

fn cmd_roundtrip(path: &Path, output: Option<&Path>, settings: ReadSettings) -> Result<()> {
    let registry = gbx::engines::builtin()?;
    let (original, mut gbx) = parse_file(path, &registry, &settings)?;
    let written = gbx
        .write(&registry, &WriteSettings::default())
        .with_context(|| format!("failed to encode {}", path.display()))?;

    if let Some(out) = output {
        fs::write(out, &written).with_context(|| format!("failed to write {}", out.display()))?;
        info!(path = %out.display(), len = written.len(), "wrote output");
    }

    if written == original {
        println!("{}: identical ({} bytes)", path.display(), written.len());
        return Ok(());
    }
    let first_diff = original
        .iter()
        .zip(&written)
        .position(|(a, b)| a != b)
        .unwrap_or(original.len().min(written.len()));
    warn!(offset = first_diff, "output diverges");
    bail!(
        "{}: output differs at offset {first_diff} ({} bytes in, {} bytes out)",
        path.display(),
        original.len(),
        written.len()
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = load_settings(cli.settings.as_deref())?;
    match cli.command {
        Command::Info {
            file,
            json,
            header_only,
        } => cmd_info(&file, json, header_only, settings),
        Command::Classes => cmd_classes(),
        Command::Roundtrip { file, output } => cmd_roundtrip(&file, output.as_deref(), settings),
    }
}
