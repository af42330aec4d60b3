use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use isp_trace_parser::archive::parse_archive;
use isp_trace_parser::config::load_filter;
use isp_trace_parser::{parse_traces, Family, ParseConfig, ParseReport, TraceFilter};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "isp-trace-parser")]
#[command(about = "Restructure AEMO ISP trace CSVs into a partitioned parquet store")]
struct Args {
    /// Trace family to parse
    #[arg(short, long, value_enum)]
    family: FamilyArg,

    /// Directory of raw trace CSVs, or a local .zip archive of them
    #[arg(short, long)]
    input: PathBuf,

    /// Root directory of the parsed store
    #[arg(short, long)]
    output: PathBuf,

    /// JSON metadata filter (with a "family" tag matching --family)
    #[arg(long)]
    filters: Option<PathBuf>,

    /// JSON parse configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Solar,
    Wind,
    Demand,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Solar => Family::Solar,
            FamilyArg::Wind => Family::Wind,
            FamilyArg::Demand => Family::Demand,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let family = Family::from(args.family);

    let mut config = match &args.config {
        Some(path) => ParseConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ParseConfig::default(),
    };
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.quiet {
        config.show_progress = false;
    }

    let filter: Option<TraceFilter> = match &args.filters {
        Some(path) => Some(
            load_filter(path)
                .with_context(|| format!("Failed to load filters {}", path.display()))?,
        ),
        None => None,
    };

    println!("🚀 ISP {} trace parser", family);
    println!("Using {} worker threads", config.worker_count());
    println!("{}", "=".repeat(60));

    let is_archive = args
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));

    info!("Parsing {} into {}", args.input.display(), args.output.display());
    let report = if is_archive {
        parse_archive(&args.input, family, &args.output, filter.as_ref(), &config)
    } else {
        parse_traces(family, &args.input, &args.output, filter.as_ref(), &config)
    }
    .with_context(|| format!("Failed to parse {}", args.input.display()))?;

    print_report(&report);

    if !report.is_clean() {
        anyhow::bail!("{} files failed to parse", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &ParseReport) {
    println!("\n📊 Parse summary");
    println!("{}", "=".repeat(60));
    println!("  Files discovered:   {}", report.files_discovered);
    println!("  Files filtered out: {}", report.files_skipped);
    println!("  Files parsed:       {}", report.files_parsed);
    println!("  Partitions written: {}", report.partitions_written.len());
    println!("  Rows written:       {}", report.rows_written);
    println!("  Entities kept:      {}", report.entities_kept);

    if report.failures.is_empty() {
        println!("\n✅ All files parsed");
        return;
    }

    println!("\n⚠️  {} failures:", report.failures.len());
    for failure in &report.failures {
        println!("  ❌ {}: {}", failure.path.display(), failure.error);
    }
}
