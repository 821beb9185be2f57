//! Table Module
//!
//! Generic JSONL tables of typed rows.
//!
//! ## Responsibilities
//! - Check the file's schema header against the row type on open
//! - Keep rows sorted by ID with no duplicates, on disk and in memory
//! - Route blob fields through the table's blob store
//! - Replace the file atomically on every mutation
//!
//! ## File Format
//! ```text
//! notes.jsonl
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ {"version":"1.0","columns":[{"name":"id","type":"id"},...]}      │ line 1
//! │ {"id":"0B2N4XK9A0G00","title":"a","body":"sha256:...-5"}         │ line 2
//! │ {"id":"0B2N4XK9A0G01","title":"b","body":null}                   │ line 3
//! │ ...                                                              │ ascending IDs
//! └──────────────────────────────────────────────────────────────────┘
//! notes.blobs/XX/<50 chars>       (see `blob`)
//! ```

mod index;
mod inspect;
mod row;
mod schema;
#[allow(clippy::module_inception)]
mod table;

pub use index::{Index, TableObserver, UniqueIndex};
pub use inspect::{inspect_file, FileReport};
pub use row::Row;
pub use schema::{Column, ColumnType, SchemaHeader, FORMAT_VERSION};
pub use table::{RowIter, Table};
