use crate::config::ParseConfig;
use crate::error::Result;
use crate::family::Family;
use crate::filters::TraceFilter;
use crate::parser::{parse_traces, ParseReport};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;

/// Unpack a local zip of raw traces into `extract_to`, descending into nested
/// zips. Returns the number of CSV files written.
pub fn extract_archive(zip_path: &Path, extract_to: &Path) -> Result<usize> {
    let file = fs::File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut csv_count = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        // Entries that would escape the target directory are ignored.
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            log::warn!("skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let outpath = extract_to.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;
        drop(outfile);

        match outpath.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => {
                let nested_dir = outpath.with_extension("");
                fs::create_dir_all(&nested_dir)?;
                csv_count += extract_archive(&outpath, &nested_dir)?;
                fs::remove_file(&outpath)?;
            }
            Some(ext) if ext.eq_ignore_ascii_case("csv") => csv_count += 1,
            _ => {}
        }
    }

    Ok(csv_count)
}

/// Parse the traces of one family straight out of a local zip archive.
pub fn parse_archive(
    zip_path: &Path,
    family: Family,
    parsed_directory: &Path,
    filter: Option<&TraceFilter>,
    config: &ParseConfig,
) -> Result<ParseReport> {
    let staging = TempDir::new()?;
    let csv_count = extract_archive(zip_path, staging.path())?;
    log::info!(
        "extracted {} CSV files from {}",
        csv_count,
        zip_path.display()
    );
    parse_traces(family, staging.path(), parsed_directory, filter, config)
}
