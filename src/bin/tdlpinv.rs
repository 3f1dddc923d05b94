//! tdlpinv - TDLPACK Inventory
//!
//! Lists the records of an archive, optionally with unpacked statistics, and
//! can copy the selected records into a new sequential archive.

use std::process;

use clap::Parser;
use tdlpack::archive::{Record, RecordKind, WriteRecord};
use tdlpack::codec::PayloadContext;
use tdlpack::{Archive, ArchiveWriter, Config, Layout, OpenMode, ScaledIntegerCodec, TdlpackError};
use tracing_subscriber::{fmt, EnvFilter};

/// TDLPACK archive inventory
#[derive(Parser, Debug)]
#[command(name = "tdlpinv")]
#[command(about = "Inventory MOS-2000 TDLPACK sequential and random-access archives")]
#[command(version)]
struct Args {
    /// Archive to inventory
    file: String,

    /// Quiet mode: suppress inventory output, report errors only
    #[arg(short, long)]
    quiet: bool,

    /// Records to inventory: comma list of numbers and/or ranges (e.g. 1,2,5,10-20)
    #[arg(short, long = "rec")]
    rec: Option<String>,

    /// Unpack data records and print max/min/mean and missing-value counts
    #[arg(short, long)]
    verbose: bool,

    /// Print one JSON object per record instead of inventory lines
    #[arg(long)]
    json: bool,

    /// Copy the selected records to a new sequential archive
    #[arg(long, value_name = "FILE")]
    copy: Option<String>,

    /// Allow --copy to replace an existing file
    #[arg(long)]
    force: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose { "info,tdlpack=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        tracing::error!("tdlpinv failed: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> tdlpack::Result<()> {
    let config = Config::default();
    let archive = Archive::open_with_config(&args.file, &config)?;

    let records: Vec<&Record> = match &args.rec {
        Some(expr) => parse_selection(expr)?
            .into_iter()
            .map(|index| archive.get(index))
            .collect::<tdlpack::Result<_>>()?,
        None => archive.iter().collect(),
    };

    let mut writer = match &args.copy {
        Some(path) => {
            let mode = if args.force { OpenMode::Overwrite } else { OpenMode::Create };
            Some(ArchiveWriter::create(path, Layout::Sequential, mode, &config)?)
        }
        None => None,
    };

    let codec = ScaledIntegerCodec::new();
    for record in records {
        if !args.quiet {
            if args.json {
                let line = serde_json::to_string(&record.summary())
                    .map_err(|e| TdlpackError::Format(e.to_string()))?;
                println!("{}", line);
            } else {
                println!("{}", record.summary());
            }
        }

        if args.verbose && !args.quiet {
            if let Some(data) = record.as_data() {
                let values = archive.decode_values(record, &codec)?;
                let ctx = PayloadContext::from_header(data.header());
                println!("{}", Statistics::compute(&values, &ctx));
            }
        }

        if let Some(writer) = writer.as_mut() {
            match record.kind() {
                RecordKind::Data(_) => {
                    let message = archive.materialize_payload(record)?;
                    writer.append(WriteRecord::Message(&message))?;
                }
                RecordKind::StationList(list) => {
                    writer.append(WriteRecord::StationList(list))?;
                }
                RecordKind::Trailer => {
                    writer.append(WriteRecord::Trailer)?;
                }
            }
        }
    }

    if let Some(writer) = writer {
        let summary = writer.close()?;
        tracing::info!(
            "Copied {} records ({} bytes) to {}",
            summary.records,
            summary.bytes,
            summary.path.display()
        );
    }

    Ok(())
}

/// Parse `1,2,5,10-20` into record indices; ranges are inclusive
fn parse_selection(expr: &str) -> tdlpack::Result<Vec<usize>> {
    let invalid = |part: &str| TdlpackError::Validation(format!("invalid record selection '{}'", part));

    let mut indices = Vec::new();
    for part in expr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, stop)) => {
                let start: usize = start.trim().parse().map_err(|_| invalid(part))?;
                let stop: usize = stop.trim().parse().map_err(|_| invalid(part))?;
                if stop < start {
                    return Err(invalid(part));
                }
                indices.extend(start..=stop);
            }
            None => indices.push(part.parse().map_err(|_| invalid(part))?),
        }
    }
    Ok(indices)
}

/// Verbose per-record statistics
struct Statistics {
    max: f32,
    min: f32,
    mean: f32,
    primary_missing: f32,
    secondary_missing: f32,
    count: usize,
    primary_count: usize,
    secondary_count: usize,
}

impl Statistics {
    fn compute(values: &[f32], ctx: &PayloadContext) -> Self {
        let mut stats = Self {
            max: f32::NAN,
            min: f32::NAN,
            mean: f32::NAN,
            primary_missing: ctx.primary_missing,
            secondary_missing: ctx.secondary_missing,
            count: values.len(),
            primary_count: 0,
            secondary_count: 0,
        };

        let mut sum = 0f64;
        let mut valid = 0usize;
        for &value in values {
            if value == ctx.primary_missing {
                stats.primary_count += 1;
            } else if ctx.secondary_missing != 0.0 && value == ctx.secondary_missing {
                stats.secondary_count += 1;
            } else if !value.is_nan() {
                stats.max = if stats.max.is_nan() { value } else { stats.max.max(value) };
                stats.min = if stats.min.is_nan() { value } else { stats.min.min(value) };
                sum += f64::from(value);
                valid += 1;
            }
        }
        if valid > 0 {
            stats.mean = (sum / valid as f64) as f32;
        }
        stats
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "    MAX = {:.3}:MIN = {:.3}:MEAN = {:.3}",
            self.max, self.min, self.mean
        )?;
        writeln!(
            f,
            "    PMISS = {:.0}:SMISS = {:.0}",
            self.primary_missing, self.secondary_missing
        )?;
        write!(
            f,
            "    NDATA = {}:NPMISS = {}:NSMISS = {}",
            self.count, self.primary_count, self.secondary_count
        )
    }
}
