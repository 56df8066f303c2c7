use crate::report::Report;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn report_file_name(title: &str) -> String {
    let stem = title
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>();

    format!("{}.csv", stem.trim())
}

/// Writes `<title>.csv` into `report_dir` and returns its path.
pub fn save_report_csv(report: &Report, title: &str, report_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let csv_path = report_dir.join(report_file_name(title));
    write_report_csv(report, &csv_path)?;

    Ok(csv_path)
}

pub fn write_report_csv(report: &Report, csv_path: &Path) -> Result<()> {
    let file = File::create(csv_path)
        .with_context(|| format!("Failed to create CSV report: {}", csv_path.display()))?;

    write_rows(report, file)
        .with_context(|| format!("Failed to write CSV report: {}", csv_path.display()))?;

    info!(path = %csv_path.display(), rows = report.records.len(), "CSV report written");
    Ok(())
}

fn write_rows<W: Write>(report: &Report, sink: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(sink);

    writer.write_record(report.kind.columns())?;
    report
        .records
        .iter()
        .try_for_each(|record| writer.write_record(record.fields()))?;

    writer.flush()?;
    Ok(())
}
