//! ID Module
//!
//! Time-sortable 64-bit row identifiers ("KSIDs").
//!
//! ## Responsibilities
//! - Mint strictly increasing IDs, safely across threads
//! - Partition the ID space across cooperating instances
//! - Reversible text encoding that sorts like the numbers it encodes
//!
//! ## Bit Layout
//! ```text
//! ┌───────┬──────────────────────────────────┬──────────────┐
//! │ 0 (1) │ time10us since 2026-01-01Z (51)  │  slice (12)  │
//! └───────┴──────────────────────────────────┴──────────────┘
//!  bit 63   bits 62..12                        bits 11..0
//! ```
//!
//! ## Text Encoding
//! Crockford base32 (`0-9A-Z` minus `I L O U`), 13 characters for every
//! non-zero ID. The zero ID encodes as the single character `"0"`.

mod generator;
mod ksid;
mod list;

pub use generator::IdGenerator;
pub use ksid::{Ksid, ENCODED_LEN, EPOCH_MICROS, SLICE_BITS, SLICE_MASK, TIME_MASK};
pub use list::IdList;
