//! CLI for simdump signal dumps.
//!
//! Provides commands for inspecting, printing, and benchmarking dumps.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use simdump::hierarchy::Group;
use simdump::{
    Container, ContainerConfig, DumpReader, ElementType, SignalData, SignalInfo, StorageKind,
};
use tracing_subscriber::EnvFilter;

/// simdump - Buffered recorder for hierarchical simulation signal dumps.
#[derive(Parser)]
#[command(name = "simdump", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display the signal tree with storage kind, shape, and attributes.
    Info {
        /// Path to the dump directory.
        dump_path: PathBuf,
    },

    /// Print the records of one signal.
    Dump {
        /// Path to the dump directory.
        dump_path: PathBuf,

        /// Dotted signal name.
        signal: String,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Print at most this many records.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a write-path benchmark against a temporary dump.
    Bench {
        /// Number of records to write per signal.
        #[arg(long, default_value = "1000000")]
        records: u64,

        /// Number of signals to create.
        #[arg(long, default_value = "10")]
        signals: usize,

        /// Payload dimensions, comma separated (empty for a scalar).
        #[arg(long, default_value = "2,3")]
        dims: String,

        /// Storage kind of the benchmark signals.
        #[arg(long, default_value = "sync")]
        kind: KindArg,

        /// JSON file with container configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Output format for records.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON document.
    Json,
}

/// Storage kind selectable on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// Payload only.
    Sync,
    /// Timestamp and payload.
    Async,
    /// Simulation time.
    Time,
}

impl From<KindArg> for StorageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sync => Self::Sync,
            KindArg::Async => Self::Async,
            KindArg::Time => Self::SimTime,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { dump_path } => cmd_info(&dump_path),
        Commands::Dump {
            dump_path,
            signal,
            format,
            limit,
        } => cmd_dump(&dump_path, &signal, &format, limit),
        Commands::Bench {
            records,
            signals,
            dims,
            kind,
            config,
        } => cmd_bench(records, signals, &dims, kind.into(), config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `simdump info <dump_path>`.
fn cmd_info(dump_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reader = DumpReader::open(dump_path)?;
    let config = reader.config();

    println!("Dump: {}", dump_path.display());
    println!(
        "  Status: {}",
        if reader.is_complete() { "complete" } else { "incomplete" }
    );
    println!("  Chunk size: {} records", config.chunk_size);
    println!("  Signals: {}", reader.signals().len());
    println!("  Disk usage: {}", format_bytes(dir_size(dump_path)?));

    let attributes = reader.attributes()?;
    if !attributes.is_empty() {
        println!("  Attributes:");
        for (name, value) in &attributes {
            println!("    {name} = {value}");
        }
    }
    println!();

    println!(".");
    print_tree(&reader, reader.root(), "")?;
    Ok(())
}

/// A member of a group, for tree printing.
enum Member {
    Group(Group),
    Signal(String),
}

impl Member {
    fn label(&self) -> &str {
        match self {
            Self::Group(group) => group.name().rsplit('.').next().unwrap_or_default(),
            Self::Signal(leaf) => leaf,
        }
    }
}

/// Prints the members of `group` with box-drawing prefixes.
fn print_tree(
    reader: &DumpReader,
    group: &Group,
    prefix: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut members: Vec<Member> = group
        .children()?
        .into_iter()
        .map(Member::Group)
        .chain(group.signals()?.into_iter().map(Member::Signal))
        .collect();
    members.sort_by(|a, b| a.label().cmp(b.label()));

    let count = members.len();
    for (i, member) in members.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, extension) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };

        match member {
            Member::Group(child) => {
                println!("{prefix}{branch}{}", member.label());
                print_tree(reader, child, &format!("{prefix}{extension}"))?;
            }
            Member::Signal(leaf) => {
                let name = if group.is_root() {
                    leaf.clone()
                } else {
                    format!("{}.{leaf}", group.name())
                };
                match reader.signal(&name) {
                    Some(info) => println!("{prefix}{branch}{leaf}   {}", describe(info)),
                    None => println!("{prefix}{branch}{leaf}   (unreadable)"),
                }
            }
        }
    }
    Ok(())
}

/// One-line description of a signal: shape, kind, element, attributes.
fn describe(info: &SignalInfo) -> String {
    let shape = std::iter::once(info.records.to_string())
        .chain(info.dims.iter().map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(", ");

    let mut line = match (info.kind, info.element) {
        (StorageKind::SimTime, _) | (_, None) => format!("({shape}):(time)"),
        (StorageKind::Async, Some(element)) => format!("({shape}):(async {element})"),
        (StorageKind::Sync, Some(element)) => format!("({shape}):(sync {element})"),
    };

    if !info.complete {
        line.push_str(" [incomplete]");
    }
    for (name, value) in &info.attributes {
        if name != "storage" {
            line.push_str(&format!(" {name}={value}"));
        }
    }
    line
}

/// Implements `simdump dump <dump_path> <signal>`.
fn cmd_dump(
    dump_path: &Path,
    signal: &str,
    format: &OutputFormat,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = DumpReader::open(dump_path)?;
    let data = reader.read(signal)?;
    let rows = rows(&data)?;
    let shown = limit.map_or(rows.len(), |l| l.min(rows.len()));

    match format {
        OutputFormat::Csv => {
            println!(
                "# signal={}, kind={}, records={}",
                data.name(),
                data.kind().attribute_value(),
                data.records()
            );
            println!("{}", columns(&data).join(","));
            for row in &rows[..shown] {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Json => {
            let header = columns(&data);
            let records: Vec<serde_json::Value> = rows[..shown]
                .iter()
                .map(|row| {
                    serde_json::Value::Object(
                        header.iter().cloned().zip(row.iter().cloned()).collect(),
                    )
                })
                .collect();

            let output = serde_json::json!({
                "signal": data.name(),
                "kind": data.kind().attribute_value(),
                "dims": data.schema().dims(),
                "records": data.records(),
                "data": records,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Column names of a record: index, the f64 column if any, then the payload.
fn columns(data: &SignalData) -> Vec<String> {
    let mut header = vec!["index".to_string()];
    match data.kind() {
        StorageKind::SimTime => {
            header.push("ns".to_string());
            header.push("rem".to_string());
        }
        kind => {
            if kind == StorageKind::Async {
                header.push("time".to_string());
            }
            let dims = data.schema().dims();
            if dims.is_empty() {
                header.push("data".to_string());
            } else {
                let flat: usize = dims.iter().product();
                header.extend((0..flat).map(|i| format!("data[{i}]")));
            }
        }
    }
    header
}

/// Decodes every record into a row of JSON values matching `columns`.
fn rows(data: &SignalData) -> Result<Vec<Vec<serde_json::Value>>, Box<dyn std::error::Error>> {
    if let Some(times) = data.sim_times() {
        return Ok(times
            .iter()
            .enumerate()
            .map(|(i, t)| vec![serde_json::Value::from(i), t.ns.into(), t.rem.into()])
            .collect());
    }

    let values = match data.schema().element() {
        Some(ElementType::I8) => to_json(data.values::<i8>()?),
        Some(ElementType::I16) => to_json(data.values::<i16>()?),
        Some(ElementType::I32) => to_json(data.values::<i32>()?),
        Some(ElementType::I64) => to_json(data.values::<i64>()?),
        Some(ElementType::U8) => to_json(data.values::<u8>()?),
        Some(ElementType::U16) => to_json(data.values::<u16>()?),
        Some(ElementType::U32) => to_json(data.values::<u32>()?),
        Some(ElementType::U64) => to_json(data.values::<u64>()?),
        Some(ElementType::F32) => to_json(data.values::<f32>()?),
        Some(ElementType::F64) => to_json(data.values::<f64>()?),
        None => return Err(format!("signal '{}' has no payload", data.name()).into()),
    };

    let flat = data.schema().dims().iter().product::<usize>().max(1);
    let times = data.times();
    Ok(values
        .chunks(flat)
        .enumerate()
        .map(|(i, record)| {
            let mut row = vec![serde_json::Value::from(i)];
            if let Some(t) = times.and_then(|t| t.get(i)) {
                row.push((*t).into());
            }
            row.extend_from_slice(record);
            row
        })
        .collect())
}

fn to_json<T: Into<serde_json::Value>>(values: Vec<T>) -> Vec<serde_json::Value> {
    values.into_iter().map(Into::into).collect()
}

/// Implements `simdump bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(
    records: u64,
    signal_count: usize,
    dims: &str,
    kind: StorageKind,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => ContainerConfig::load(path)?,
        None => ContainerConfig::default(),
    };
    let dims = parse_dims(dims)?;
    let flat: usize = dims.iter().product();

    println!("simdump write-path benchmark");
    println!("  Records per signal: {records}");
    println!("  Signals: {signal_count}");
    println!("  Kind: {}", kind.attribute_value());
    println!("  Dims: {dims:?} (i64)");
    println!("  Chunk size: {}", config.chunk_size);
    println!();

    let temp_dir = tempfile::tempdir()?;
    let dump_path = temp_dir.path().join("bench_dump");
    let mut container = Container::open(&dump_path, config)?;

    let mut handles = Vec::with_capacity(signal_count);
    for i in 0..signal_count {
        handles.push(container.add_signal(
            &format!("bench.u{i}.data"),
            kind,
            &dims,
            ElementType::I64,
        )?);
    }

    println!("Writing {records} records across {signal_count} signals...");

    let mut payload = vec![0i64; flat];
    let start = Instant::now();

    for step in 0..records {
        let value = i64::try_from(step)?;
        payload.fill(value);
        for handle in &handles {
            match kind {
                StorageKind::SimTime => container.write_time(*handle, value, 0.0)?,
                StorageKind::Sync | StorageKind::Async => {
                    container.write_values(*handle, step as f64, &payload)?;
                }
            }
        }
    }

    let write_elapsed = start.elapsed();
    let summary = container.close()?;
    let total_elapsed = start.elapsed();

    let total_writes = summary.total_records();
    let ns_per_write = write_elapsed.as_nanos() as f64 / total_writes.max(1) as f64;
    let writes_per_sec = total_writes as f64 / total_elapsed.as_secs_f64();
    let full_flushes: u64 = summary.signals.iter().map(|s| s.stats.full_flushes).sum();

    println!();
    println!("Results:");
    println!("  Total writes: {total_writes}");
    println!("  Full flushes: {full_flushes}");
    println!("  Write time: {write_elapsed:.3?}");
    println!("  Total time (incl. close): {total_elapsed:.3?}");
    println!("  Avg latency: {ns_per_write:.1} ns/write");
    println!("  Throughput: {writes_per_sec:.0} writes/sec");
    println!("  Dump size: {}", format_bytes(dir_size(&dump_path)?));
    println!();

    Ok(())
}

/// Parses a comma-separated dimension list such as `2,3`.
fn parse_dims(s: &str) -> Result<Vec<usize>, Box<dyn std::error::Error>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid dimension '{d}': {e}").into())
        })
        .collect()
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

/// Recursively calculates directory size.
fn dir_size(path: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let mut total = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                total += dir_size(&path)?;
            } else {
                total += entry.metadata()?.len();
            }
        }
    }
    Ok(total)
}
