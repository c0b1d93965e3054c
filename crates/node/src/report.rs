//! Export of the lookup log, one CSV row per lookup.
use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use chordsim_core::lookup::LookupReport;
use chordsim_core::lookup::LookupSummary;
use chordsim_core::lookup::LookupTracker;
use chrono::DateTime;
use chrono::Local;

use crate::error::Error;
use crate::error::Result;
use crate::util::ensure_parent_dir;
use crate::util::expand_home;

pub const CSV_HEADER: &str =
    "completed,duration,owner_correct,key_present,owner_crashed,hop_count,timeout_count,contact_count";

pub fn csv_row(r: &LookupReport) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        r.completed,
        r.duration_ms,
        r.owner_correct,
        r.key_present,
        r.owner_crashed,
        r.hop_count,
        r.timeout_count,
        r.contact_count
    )
}

/// Write the header and a row per lookup, in issue order. Returns the number of rows.
pub fn write_csv<W>(lookups: &LookupTracker, writer: W) -> Result<usize>
where W: Write {
    let mut writer = io::BufWriter::new(writer);
    writeln!(writer, "{}", CSV_HEADER)?;
    let mut rows = 0;
    for lookup in lookups.iter() {
        writeln!(writer, "{}", csv_row(&lookup.report()))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// `YYYYmmdd_HHMMSS_lookup.csv` in the working directory.
pub fn timestamped_path(at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}_lookup.csv", at.format("%Y%m%d_%H%M%S")))
}

/// Write the report to `path`, or to a timestamped file when `path` is None.
pub fn write_report(lookups: &LookupTracker, path: Option<&str>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => expand_home(p)?,
        None => timestamped_path(Local::now()),
    };
    ensure_parent_dir(&path)?;
    let f = fs::File::create(&path).map_err(|e| Error::CreateFileError(e.to_string()))?;
    let rows = write_csv(lookups, f)?;
    tracing::info!("{} lookups written to {:?}", rows, path);
    Ok(path)
}

pub fn log_summary(summary: &LookupSummary) {
    let pending = summary.issued - summary.completed;
    tracing::info!(
        "lookups: {} issued, {} completed, {} pending",
        summary.issued,
        summary.completed,
        pending
    );
    tracing::info!(
        "lookups: {} succeeded, {} failed, mean hops {:.2}, mean duration {:.1}ms",
        summary.succeeded,
        summary.failed,
        summary.mean_hops,
        summary.mean_duration_ms
    );
    if summary.completed > summary.succeeded {
        tracing::warn!(
            "{} completed lookups did not reach a right owner",
            summary.completed - summary.succeeded
        );
    }
}
