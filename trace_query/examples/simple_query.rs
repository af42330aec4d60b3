use chrono::{Datelike, Duration, NaiveDate};
use isp_trace_parser::{parse_solar_traces, ParseConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use trace_query::{construct_reference_year_mapping, EntitySelector, TraceQuery};

fn write_year(dir: &Path, filename: &str, year: i32) -> std::io::Result<()> {
    let labels: Vec<String> = (1..=48).map(|i| format!("{:02}", i)).collect();
    let mut csv = format!("Year,Month,Day,{}\n", labels.join(","));
    let mut date = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
    while date.year() == year {
        // A rough daylight shape: zero overnight, peak at midday.
        let cells: Vec<String> = (0..48)
            .map(|i| {
                let hour = i as f64 / 2.0;
                (1.0 - ((hour - 12.0) / 6.0).powi(2)).max(0.0).to_string()
            })
            .collect();
        csv.push_str(&format!(
            "{},{},{},{}\n",
            date.year(),
            date.month(),
            date.day(),
            cells.join(",")
        ));
        date += Duration::days(1);
    }
    fs::write(dir.join(filename), csv)
}

fn main() -> anyhow::Result<()> {
    let raw = TempDir::new()?;
    let store = TempDir::new()?;

    for reference_year in [2011, 2012] {
        write_year(
            raw.path(),
            &format!("Woolooga_SAT_RefYear{}.csv", reference_year),
            reference_year,
        )?;
    }

    let config = ParseConfig {
        show_progress: false,
        ..ParseConfig::default()
    };
    let report = parse_solar_traces(raw.path(), store.path(), None, &config)?;
    println!(
        "Parsed {} files into {} partitions",
        report.files_parsed,
        report.partitions_written.len()
    );

    // 2030..2033 alternate between the two reference years.
    let mapping = construct_reference_year_mapping(2030, 2033, &[2011, 2012])?;
    let query = TraceQuery::open(store.path(), isp_trace_parser::Family::Solar)?;
    let selector = EntitySelector::SolarProject {
        name: "Woolooga".to_string(),
    };
    let trace = query.get_trace_with_mapping(&selector, &mapping)?;

    println!("Trace Query Results");
    println!("===================");
    println!("Entity: {}", trace.label);
    println!("Records: {}", trace.len());
    if let (Some(first), Some(last)) = (trace.records.first(), trace.records.last()) {
        println!("Span: {} to {}", first.timestamp, last.timestamp);
    }
    println!();
    println!("{}", trace.to_dataframe()?.head(Some(5)));

    Ok(())
}
