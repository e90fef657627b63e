use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::infra::sqlite::queries::create_dataset_from_rows;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportResult {
    pub dataset_id: i64,
    pub row_count: i64,
}

pub fn import_csv_to_sqlite(db_path: &Path, csv_path: &Path) -> Result<ImportResult> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open csv: {}", csv_path.display()))?;
    let dataset_name = csv_path
        .file_stem()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("dataset")
        .to_string();
    let source_path = csv_path.to_string_lossy().into_owned();
    import_csv_reader(db_path, &dataset_name, &source_path, file)
}

/// Imports CSV text from any reader. The header row is required; short
/// records are padded with empty cells.
pub fn import_csv_reader<R: Read>(
    db_path: &Path,
    dataset_name: &str,
    source_path: &str,
    input: R,
) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read headers from csv: {source_path}"))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        anyhow::bail!("csv header is required")
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to parse csv record")?;
        rows.push(
            (0..headers.len())
                .map(|col_idx| record.get(col_idx).unwrap_or("").to_string())
                .collect::<Vec<_>>(),
        );
    }

    let dataset_id = create_dataset_from_rows(db_path, dataset_name, source_path, &headers, &rows)?;
    Ok(ImportResult {
        dataset_id,
        row_count: rows.len() as i64,
    })
}
