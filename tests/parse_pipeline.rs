use chrono::{Duration, NaiveDate};
use isp_trace_parser::partition::{part_files, PartitionKey};
use isp_trace_parser::{
    parse_demand_traces, parse_solar_traces, parse_traces, parse_wind_traces, AcceptSet,
    DemandScenario, EntityKind, Family, ParseConfig, SolarMetadataFilter, SolarTechnology,
    TraceError, TraceFilter, WindMetadataFilter, WindResourceQuality,
};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn quiet_config() -> ParseConfig {
    ParseConfig {
        workers: Some(2),
        show_progress: false,
        ..ParseConfig::default()
    }
}

/// Write a half-hourly raw trace covering `days` days from `start`.
fn write_trace(dir: &Path, filename: &str, start: NaiveDate, days: i64, value: f64) -> PathBuf {
    let labels: Vec<String> = (1..=48).map(|i| format!("{:02}", i)).collect();
    let mut csv = format!("Year,Month,Day,{}\n", labels.join(","));
    for offset in 0..days {
        let date = start + Duration::days(offset);
        let cells: Vec<String> = (0..48).map(|_| value.to_string()).collect();
        csv.push_str(&format!(
            "{},{},{},{}\n",
            date.format("%Y"),
            date.format("%-m"),
            date.format("%-d"),
            cells.join(",")
        ));
    }
    let path = dir.join(filename);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, csv).unwrap();
    path
}

fn jan_1(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
}

fn read_partition(root: &Path, key: &PartitionKey) -> DataFrame {
    let frames: Vec<DataFrame> = part_files(&key.dir_in(root))
        .unwrap()
        .into_iter()
        .map(|path| {
            ParquetReader::new(fs::File::open(path).unwrap())
                .finish()
                .unwrap()
        })
        .collect();
    let mut combined = frames[0].clone();
    for frame in &frames[1..] {
        combined.vstack_mut(frame).unwrap();
    }
    combined
}

fn names_in(df: &DataFrame) -> Vec<String> {
    let mut names: Vec<String> = df
        .column("name")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    names.dedup();
    names
}

#[test]
fn solar_traces_land_in_hive_partitions() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 3, 0.5);
    write_trace(raw.path(), "nested/Darling_Downs_SAT_RefYear2011.csv", jan_1(2011), 3, 0.25);
    write_trace(raw.path(), "REZ_N0_NSW_Non-REZ_CST_RefYear2011.csv", jan_1(2011), 2, 0.1);

    let report = parse_solar_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.files_discovered, 3);
    assert_eq!(report.files_parsed, 3);
    assert_eq!(report.rows_written, (3 + 3 + 2) * 48);
    assert_eq!(report.partitions_written.len(), 2);

    let projects = isp_trace_parser::solar::partition_key(
        EntityKind::Project,
        2011,
        SolarTechnology::Sat,
    );
    assert!(store
        .path()
        .join("entity_kind=project/reference_year=2011/technology=SAT/part-00000.parquet")
        .is_file());

    let df = read_partition(store.path(), &projects);
    assert_eq!(df.height(), 6 * 48);
    assert_eq!(names_in(&df), vec!["Darling_Downs", "Woolooga"]);
    for column in ["name", "entity_kind", "reference_year", "technology", "datetime", "value"] {
        assert!(df.column(column).is_ok(), "missing column {column}");
    }
}

#[test]
fn bad_files_are_reported_without_stopping_siblings() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 2, 1.0);
    fs::write(raw.path().join("not_a_trace.csv"), "Year,Month,Day\n").unwrap();

    // Rows out of order.
    let good = fs::read_to_string(raw.path().join("Woolooga_SAT_RefYear2011.csv")).unwrap();
    let mut lines: Vec<&str> = good.lines().collect();
    lines.swap(1, 2);
    fs::write(
        raw.path().join("Bungala_SAT_RefYear2011.csv"),
        lines.join("\n"),
    )
    .unwrap();

    let report = parse_solar_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.failures.len(), 2);

    let failed: Vec<String> = report
        .failures
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(failed, vec!["Bungala_SAT_RefYear2011.csv", "not_a_trace.csv"]);
    assert!(matches!(report.failures[0].error, TraceError::UnsortedInput { .. }));
    assert!(matches!(
        report.failures[1].error,
        TraceError::MalformedFilename { .. }
    ));

    let key = isp_trace_parser::solar::partition_key(EntityKind::Project, 2011, SolarTechnology::Sat);
    let df = read_partition(store.path(), &key);
    assert_eq!(names_in(&df), vec!["Woolooga"]);
}

#[test]
fn filters_skip_files_without_loading_them() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 1, 1.0);
    write_trace(raw.path(), "Woolooga_SAT_RefYear2012.csv", jan_1(2012), 1, 1.0);
    // Unreadable contents, but the filter excludes it before it is opened.
    fs::write(raw.path().join("Bungala_FFP_RefYear2011.csv"), "garbage").unwrap();

    let filter = SolarMetadataFilter {
        name: AcceptSet::only(["Woolooga".to_string()]),
        reference_year: AcceptSet::only([2011]),
        ..Default::default()
    };
    let report =
        parse_solar_traces(raw.path(), store.path(), Some(&filter), &quiet_config()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.files_skipped, 2);
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.partitions_written.len(), 1);
    assert!(!store.path().join("entity_kind=project/reference_year=2012").exists());
}

#[test]
fn reruns_produce_identical_stores() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "ARWF1_RefYear2011.csv", jan_1(2011), 4, 0.3);
    write_trace(raw.path(), "N8_WH_Cooma-Monaro_RefYear2011.csv", jan_1(2011), 4, 0.6);

    let snapshot = |root: &Path| -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<(PathBuf, Vec<u8>)> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    };

    parse_wind_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    let first = snapshot(store.path());
    parse_wind_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    let second = snapshot(store.path());

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert!(store
        .path()
        .join("entity_kind=zone/reference_year=2011/resource_quality=WH/part-00000.parquet")
        .is_file());
}

#[test]
fn rerun_replaces_partition_contents() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "ARWF1_RefYear2011.csv", jan_1(2011), 1, 0.3);
    let second = write_trace(raw.path(), "CAPTL_WF_RefYear2011.csv", jan_1(2011), 1, 0.4);
    parse_wind_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();

    fs::remove_file(second).unwrap();
    parse_wind_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();

    let key = isp_trace_parser::wind::partition_key(EntityKind::Project, 2011, None);
    let df = read_partition(store.path(), &key);
    assert_eq!(names_in(&df), vec!["ARWF1"]);
    assert_eq!(df.height(), 48);
}

#[test]
fn large_partitions_are_split_into_parts() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    for name in ["Alpha", "Bravo", "Charlie"] {
        write_trace(raw.path(), &format!("{name}_FFP_RefYear2011.csv"), jan_1(2011), 2, 1.0);
    }
    let config = ParseConfig {
        max_rows_per_file: 96,
        ..quiet_config()
    };

    let report = parse_solar_traces(raw.path(), store.path(), None, &config).unwrap();
    assert_eq!(report.rows_written, 3 * 96);

    let key = isp_trace_parser::solar::partition_key(EntityKind::Project, 2011, SolarTechnology::Ffp);
    let parts = part_files(&key.dir_in(store.path())).unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(read_partition(store.path(), &key).height(), 3 * 96);
}

#[test]
fn aliased_duplicates_are_averaged() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "CAPTL_WF_RefYear2011.csv", jan_1(2011), 1, 1.0);
    write_trace(raw.path(), "CAPTL_WF2_RefYear2011.csv", jan_1(2011), 1, 3.0);

    let mut config = quiet_config();
    for raw_name in ["CAPTL_WF", "CAPTL_WF2"] {
        config
            .name_aliases
            .insert(raw_name.to_string(), "Capital Wind Farm".to_string());
    }

    let report = parse_wind_traces(raw.path(), store.path(), None, &config).unwrap();
    assert_eq!(report.files_parsed, 2);
    assert_eq!(report.rows_written, 48);

    let key = isp_trace_parser::wind::partition_key(EntityKind::Project, 2011, None);
    let df = read_partition(store.path(), &key);
    assert_eq!(names_in(&df), vec!["Capital Wind Farm"]);
    let values = df.column("value").unwrap().f64().unwrap();
    assert!(values.into_iter().all(|v| v == Some(2.0)));
}

#[test]
fn demand_traces_partition_by_scenario_label() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(
        raw.path(),
        "CNSW_RefYear_2011_HYDROGEN_EXPORT_POE10_OPSO_MODELLING.csv",
        jan_1(2011),
        1,
        500.0,
    );
    write_trace(
        raw.path(),
        "CNSW_RefYear_2011_HYDROGEN_EXPORT_POE50_OPSO_MODELLING.csv",
        jan_1(2011),
        1,
        400.0,
    );

    let report = parse_demand_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    assert!(report.is_clean());

    let key = isp_trace_parser::demand::partition_key(DemandScenario::GreenEnergyExports, 2011);
    assert_eq!(key.to_string(), "scenario=Green_Energy_Exports/reference_year=2011");
    let df = read_partition(store.path(), &key);
    assert_eq!(df.height(), 96);
    let poes: Vec<&str> = df.column("poe").unwrap().str().unwrap().into_iter().flatten().collect();
    assert_eq!(poes[0], "POE10");
    assert_eq!(poes[95], "POE50");
}

#[test]
fn dispatch_rejects_filter_of_another_family() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    let filter = TraceFilter::Wind(WindMetadataFilter {
        resource_quality: AcceptSet::only([WindResourceQuality::Low]),
        ..Default::default()
    });
    let err = parse_traces(Family::Solar, raw.path(), store.path(), Some(&filter), &quiet_config())
        .unwrap_err();
    assert!(matches!(
        err,
        TraceError::FilterFamilyMismatch { expected: Family::Solar, found: Family::Wind }
    ));
}

#[test]
fn missing_input_directory_is_an_error() {
    let store = TempDir::new().unwrap();
    let missing = store.path().join("does-not-exist");
    let err = parse_solar_traces(&missing, store.path(), None, &quiet_config()).unwrap_err();
    assert!(matches!(err, TraceError::InvalidInputDirectory(_)));
}

fn values_for(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let names = df.column("name").unwrap().str().unwrap();
    let values = df.column("value").unwrap().f64().unwrap();
    names
        .into_iter()
        .zip(values.into_iter())
        .filter(|(n, _)| *n == Some(name))
        .map(|(_, v)| v)
        .collect()
}

#[test]
fn filtered_rerun_keeps_entities_it_did_not_parse() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 2, 1.0);
    write_trace(raw.path(), "Bungala_SAT_RefYear2011.csv", jan_1(2011), 2, 2.0);
    parse_solar_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();

    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 2, 5.0);
    let filter = SolarMetadataFilter {
        name: AcceptSet::only(["Woolooga".to_string()]),
        ..Default::default()
    };
    let report =
        parse_solar_traces(raw.path(), store.path(), Some(&filter), &quiet_config()).unwrap();
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.entities_kept, 1);

    let key = isp_trace_parser::solar::partition_key(EntityKind::Project, 2011, SolarTechnology::Sat);
    let df = read_partition(store.path(), &key);
    assert_eq!(df.height(), 4 * 48);
    let mut names = names_in(&df);
    names.sort();
    assert_eq!(names, vec!["Bungala", "Woolooga"]);
    assert!(values_for(&df, "Woolooga").iter().all(|v| *v == Some(5.0)));
    let bungala = values_for(&df, "Bungala");
    assert_eq!(bungala.len(), 2 * 48);
    assert!(bungala.iter().all(|v| *v == Some(2.0)));
}

#[test]
fn entity_whose_file_fails_keeps_its_stored_rows() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "Woolooga_SAT_RefYear2011.csv", jan_1(2011), 2, 1.0);
    let bungala = write_trace(raw.path(), "Bungala_SAT_RefYear2011.csv", jan_1(2011), 2, 2.0);
    parse_solar_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();

    // Rows out of order on the second run.
    let text = fs::read_to_string(&bungala).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.swap(1, 2);
    fs::write(&bungala, lines.join("\n")).unwrap();

    let report = parse_solar_traces(raw.path(), store.path(), None, &quiet_config()).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, TraceError::UnsortedInput { .. }));
    assert_eq!(report.entities_kept, 1);

    let key = isp_trace_parser::solar::partition_key(EntityKind::Project, 2011, SolarTechnology::Sat);
    let df = read_partition(store.path(), &key);
    assert_eq!(values_for(&df, "Bungala").len(), 2 * 48);
    assert_eq!(values_for(&df, "Woolooga").len(), 2 * 48);
}

#[test]
fn filters_match_the_aliased_entity_name() {
    let raw = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_trace(raw.path(), "CAPTL_WF_RefYear2011.csv", jan_1(2011), 1, 1.0);
    write_trace(raw.path(), "ARWF1_RefYear2011.csv", jan_1(2011), 1, 1.0);

    let mut config = quiet_config();
    config
        .name_aliases
        .insert("CAPTL_WF".to_string(), "Capital Wind Farm".to_string());
    let filter = WindMetadataFilter {
        name: AcceptSet::only(["Capital Wind Farm".to_string()]),
        ..Default::default()
    };

    let report = parse_wind_traces(raw.path(), store.path(), Some(&filter), &config).unwrap();
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.files_skipped, 1);

    let key = isp_trace_parser::wind::partition_key(EntityKind::Project, 2011, None);
    let df = read_partition(store.path(), &key);
    assert_eq!(names_in(&df), vec!["Capital Wind Farm"]);
}
