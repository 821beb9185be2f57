//! # linestore
//!
//! An embedded, file-per-table row store with:
//! - Time-ordered 64-bit IDs with a sortable text form
//! - Human-readable JSONL table files, sorted by ID
//! - Content-addressed, deduplicated blob storage with GC
//! - Atomic whole-file replacement on every mutation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Table<T: Row>                        │
//! │        (RwLock over sorted rows, observers, indexes)        │
//! └──────────┬──────────────────────┬───────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │   IdGenerator   │    │    BlobStore    │
//!   │ (Mutex, slices) │    │ (sha256 fan-out)│
//!   └─────────────────┘    └────────┬────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │   table.jsonl   │    │  table.blobs/   │
//!   │ header + rows   │    │   XX/<hash>     │
//!   └─────────────────┘    └─────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use linestore::{blob_fields, Blob, Column, ColumnType, Ksid, Row, Table};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Note {
//!     id: Ksid,
//!     title: String,
//!     body: Blob,
//! }
//!
//! blob_fields!(Note { body });
//!
//! impl Row for Note {
//!     fn id(&self) -> Ksid { self.id }
//!     fn set_id(&mut self, id: Ksid) { self.id = id }
//!     fn columns() -> Vec<Column> {
//!         vec![
//!             Column::new("id", ColumnType::Id),
//!             Column::new("title", ColumnType::String),
//!             Column::new("body", ColumnType::BlobRef),
//!         ]
//!     }
//! }
//!
//! # fn main() -> linestore::Result<()> {
//! let notes = Table::<Note>::open_path("data/notes.jsonl")?;
//! let note = notes.append(Note {
//!     id: Ksid::ZERO,
//!     title: "hello".into(),
//!     body: Blob::from_bytes("hello"),
//! })?;
//! assert_eq!(notes.get(note.id)?.body.read_to_vec()?, b"hello");
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod id;
pub mod blob;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{Config, ConfigBuilder, SyncStrategy};
pub use id::{IdGenerator, IdList, Ksid};
pub use blob::{Blob, BlobFields, BlobReader, BlobRef, BlobStore, BlobWriter, GcStats};
pub use table::{
    inspect_file, Column, ColumnType, FileReport, Index, Row, RowIter, SchemaHeader, Table,
    TableObserver, UniqueIndex,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of linestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
