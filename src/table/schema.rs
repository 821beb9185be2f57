//! Schema header
//!
//! Line 1 of every table file:
//! `{"version":"1.0","columns":[{"name":"id","type":"id"},...]}`

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

use super::Row;

/// Current table file format version
pub const FORMAT_VERSION: &str = "1.0";

/// Column types recognized in a schema header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Id,
    String,
    Int,
    Float,
    Bool,
    Time,
    BlobRef,
}

/// One column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// First record of a table file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHeader {
    pub version: String,
    pub columns: Vec<Column>,
}

impl SchemaHeader {
    /// The header a table of `T` is written with
    pub fn for_row<T: Row>() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            columns: T::columns(),
        }
    }

    /// Parse the header line of `path`
    ///
    /// Text that is not a JSON object is corruption; a JSON object that is
    /// not a valid header is a schema mismatch.
    pub(crate) fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| StoreError::Corruption {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("unreadable schema header: {}", e),
            })?;
        if !value.is_object() {
            return Err(StoreError::Corruption {
                path: path.to_path_buf(),
                line: line_no,
                reason: "schema header is not a JSON object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("invalid schema header: {}", e),
        })
    }

    /// Require this header (read from `path`) to equal `expected`
    pub(crate) fn ensure_matches(&self, expected: &SchemaHeader, path: &Path) -> Result<()> {
        let mismatch = |reason: String| StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            reason,
        };

        if self.version != expected.version {
            return Err(mismatch(format!(
                "format version {:?}, expected {:?}",
                self.version, expected.version
            )));
        }
        if self.columns.len() != expected.columns.len() {
            return Err(mismatch(format!(
                "{} columns on disk, row type has {}",
                self.columns.len(),
                expected.columns.len()
            )));
        }
        for (found, wanted) in self.columns.iter().zip(&expected.columns) {
            if found != wanted {
                return Err(mismatch(format!(
                    "column {:?} ({:?}) on disk, row type has {:?} ({:?})",
                    found.name, found.column_type, wanted.name, wanted.column_type
                )));
            }
        }
        Ok(())
    }
}
