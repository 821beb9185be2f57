//! Table file inspection without a compiled row type

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::id::Ksid;

use super::table::read_line;
use super::{Column, ColumnType, SchemaHeader, FORMAT_VERSION};

/// Summary of one table file
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub version: String,
    pub columns: Vec<Column>,
    pub rows: usize,
    pub first_id: Option<Ksid>,
    pub last_id: Option<Ksid>,

    /// Non-null values in `blob_ref` columns
    pub blob_refs: usize,
}

/// Check the structure of a table file and summarize it
///
/// Applies the same header, ID and ordering checks as `Table::open`; row
/// validation is skipped since no row type is known.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<FileReport> {
    let path = path.as_ref();
    let corrupt = |line: usize, reason: String| StoreError::Corruption {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = BufReader::new(File::open(path)?).lines();
    let header = match lines.next() {
        Some(line) => read_line(line, 1, &corrupt)?,
        None => return Err(corrupt(1, "missing schema header".to_string())),
    };
    let header = SchemaHeader::parse_line(path, 1, &header)?;
    if header.version != FORMAT_VERSION {
        return Err(StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!(
                "format version {:?}, expected {:?}",
                header.version, FORMAT_VERSION
            ),
        });
    }

    let blob_columns: Vec<&str> = header
        .columns
        .iter()
        .filter(|c| c.column_type == ColumnType::BlobRef)
        .map(|c| c.name.as_str())
        .collect();

    let mut report = FileReport {
        version: header.version.clone(),
        columns: header.columns.clone(),
        rows: 0,
        first_id: None,
        last_id: None,
        blob_refs: 0,
    };

    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        let line = read_line(line, line_no, &corrupt)?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line)
            .map_err(|e| corrupt(line_no, format!("unreadable row: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| corrupt(line_no, "row is not a JSON object".to_string()))?;

        let id = match object.get("id").and_then(Value::as_str) {
            Some(text) => Ksid::decode(text).map_err(|e| corrupt(line_no, e.to_string()))?,
            None => return Err(corrupt(line_no, "row has no string \"id\" field".to_string())),
        };
        if id.is_zero() {
            return Err(corrupt(line_no, "row has no ID".to_string()));
        }
        if let Some(last) = report.last_id {
            if id <= last {
                return Err(corrupt(line_no, format!("ID {} is not after {}", id, last)));
            }
        }

        report.blob_refs += blob_columns
            .iter()
            .filter(|name| object.get(**name).map_or(false, |v| !v.is_null()))
            .count();
        report.first_id.get_or_insert(id);
        report.last_id = Some(id);
        report.rows += 1;
    }

    Ok(report)
}
