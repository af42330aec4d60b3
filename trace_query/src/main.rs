use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use isp_trace_parser::{Family, PartitionKey};
use log::info;
use std::collections::BTreeSet;
use std::path::PathBuf;
use trace_query::{
    construct_reference_year_mapping, EntitySelector, ReferenceYearMapping, TraceQuery,
    YearSelection, YearType,
};

#[derive(Parser)]
#[command(name = "trace_query")]
#[command(about = "Read multi-year traces out of a parsed ISP trace store")]
struct Args {
    /// Root directory of one family's parsed store
    #[arg(short, long)]
    store: PathBuf,

    /// Trace family held by the store
    #[arg(short, long, value_enum)]
    family: FamilyArg,

    /// Entity selector as JSON, e.g. '{"kind":"solar_project","name":"Woolooga"}'.
    /// Repeat for a batch query.
    #[arg(long = "selector", required_unless_present = "list_entities")]
    selectors: Vec<String>,

    /// Print the entities held by the store and exit
    #[arg(long)]
    list_entities: bool,

    /// First modelled year
    #[arg(long)]
    start_year: Option<i32>,

    /// Last modelled year
    #[arg(long)]
    end_year: Option<i32>,

    /// Reference years, cycled across the modelled years
    #[arg(long, value_delimiter = ',')]
    reference_years: Vec<i32>,

    /// JSON object of modelled year -> reference year (instead of a range)
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Year boundaries
    #[arg(long, value_enum, default_value = "calendar")]
    year_type: YearTypeArg,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Solar,
    Wind,
    Demand,
}

#[derive(Clone, Copy, ValueEnum)]
enum YearTypeArg {
    Calendar,
    Financial,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let family = match args.family {
        FamilyArg::Solar => Family::Solar,
        FamilyArg::Wind => Family::Wind,
        FamilyArg::Demand => Family::Demand,
    };
    let year_type = match args.year_type {
        YearTypeArg::Calendar => YearType::Calendar,
        YearTypeArg::Financial => YearType::Financial,
    };

    info!("Indexing store {}", args.store.display());
    let query = TraceQuery::open(&args.store, family)?.with_year_type(year_type);
    info!("Store holds {} entities", query.index().len());

    if args.list_entities {
        println!("Entities in {}", args.store.display());
        println!("===================");
        for identity in query.index().entities() {
            let fields: Vec<String> = identity
                .iter()
                .map(|(column, value)| format!("{}={}", column, value))
                .collect();
            let years: BTreeSet<i32> = query
                .index()
                .partitions_for(identity)
                .filter_map(PartitionKey::reference_year)
                .collect();
            println!("  {} (reference years {:?})", fields.join(", "), years);
        }
        return Ok(());
    }

    let selectors = args
        .selectors
        .iter()
        .map(|s| {
            serde_json::from_str::<EntitySelector>(s)
                .with_context(|| format!("Invalid selector {}", s))
        })
        .collect::<Result<Vec<_>>>()?;

    let mapping = match (&args.mapping, args.start_year, args.end_year) {
        (Some(path), _, _) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mapping {}", path.display()))?;
            serde_json::from_str::<ReferenceYearMapping>(&text)?
        }
        (None, Some(start), Some(end)) => {
            construct_reference_year_mapping(start, end, &args.reference_years)?
        }
        _ => anyhow::bail!("Provide --mapping or --start-year, --end-year and --reference-years"),
    };

    let traces = query.get_traces(&selectors, &YearSelection::Mapping(mapping.clone()))?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&traces)?);
        }
        OutputFormat::Csv => {
            println!("entity,datetime,value");
            for (label, trace) in &traces {
                for record in &trace.records {
                    let value = record.value.map(|v| v.to_string()).unwrap_or_default();
                    println!("{},{},{}", label, record.timestamp, value);
                }
            }
        }
        OutputFormat::Summary => {
            println!("Trace Query Summary");
            println!("===================");
            println!("Years: {:?}", mapping.iter().collect::<Vec<_>>());
            println!();
            for (label, trace) in &traces {
                let present: Vec<f64> = trace.records.iter().filter_map(|r| r.value).collect();
                let mean = if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                };
                match (trace.records.first(), trace.records.last()) {
                    (Some(first), Some(last)) => println!(
                        "  {}: {} records from {} to {} (mean {:.3}, {} missing)",
                        label,
                        trace.len(),
                        first.timestamp,
                        last.timestamp,
                        mean,
                        trace.len() - present.len()
                    ),
                    _ => println!("  {}: no records", label),
                }
            }
        }
    }

    Ok(())
}
