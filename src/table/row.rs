//! Row trait

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blob::BlobFields;
use crate::error::Result;
use crate::id::Ksid;

use super::Column;

/// A record stored in a `Table`
///
/// `Clone` must be a deep copy: the table hands out clones and never its
/// own instances. Blob fields are found through `BlobFields`.
pub trait Row: Clone + Serialize + DeserializeOwned + BlobFields + Send + Sync + 'static {
    /// Row identifier; zero until assigned
    fn id(&self) -> Ksid;

    fn set_id(&mut self, id: Ksid);

    /// Called on load and before every write
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Column descriptors written to (and checked against) the header line
    fn columns() -> Vec<Column>;
}
