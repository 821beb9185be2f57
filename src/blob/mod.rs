//! Blob Module
//!
//! Content-addressed, deduplicated storage for large row fields.
//!
//! ## Responsibilities
//! - Stream writes through SHA-256, publish with a rename
//! - Store each distinct content exactly once
//! - Resolve references back to readers
//! - Reclaim files no row references (GC)
//!
//! ## Reference Format
//! ```text
//! sha256:<52 base32hex chars>-<size in bytes>
//!        └┬┘└──────┬───────┘
//!   fan-out dir   file name
//! ```

mod field;
mod reference;
mod store;
mod writer;

pub use field::{Blob, BlobFields};
pub use reference::{BlobRef, HASH_LEN, REF_PREFIX};
pub use store::{BlobReader, BlobStore, GcStats};
pub use writer::BlobWriter;
