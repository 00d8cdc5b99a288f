use std::collections::HashSet;
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use harvester_core::{Record, RunSummary};
use serde_json::json;

use crate::persist::{OutputTarget, PersistError};

#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Joins the items of repeated fields into one cell.
    pub value_separator: String,
    /// Also write `<stem>.manifest.json` with the run summary and columns.
    pub write_manifest: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            value_separator: "; ".to_string(),
            write_manifest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub output_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Union of field names over all records, in first-seen order.
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for name in records.iter().flat_map(|record| record.field_names()) {
        if seen.insert(name) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// Renders records as CSV: header row, then one row per record; missing fields are empty.
pub fn render_csv(records: &[Record], separator: &str) -> Result<(Vec<String>, Vec<u8>), ExportError> {
    let columns = collect_columns(records);
    if columns.is_empty() {
        return Ok((columns, Vec::new()));
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|column| {
            record
                .get(column)
                .map(|value| value.render(separator))
                .unwrap_or_default()
        }))?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok((columns, bytes))
}

pub fn write_csv(
    path: &Path,
    records: &[Record],
    summary: &RunSummary,
    options: &CsvOptions,
) -> Result<ExportSummary, ExportError> {
    let target = OutputTarget::from_path(path)?;
    let (columns, table) = render_csv(records, &options.value_separator)?;
    let output_path = target.write_table(&table)?;
    engine_info!(
        "Wrote {} row(s) x {} column(s) to {}",
        records.len(),
        columns.len(),
        output_path.display()
    );

    let manifest_path = if options.write_manifest {
        let manifest = json!({
            "output": target.table_name(),
            "rows": records.len(),
            "columns": columns,
            "summary": summary,
        });
        let content = serde_json::to_string_pretty(&manifest)?;
        Some(target.write_manifest(content)?)
    } else {
        None
    };

    Ok(ExportSummary {
        rows: records.len(),
        columns,
        output_path,
        manifest_path,
    })
}
