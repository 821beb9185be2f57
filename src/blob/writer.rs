//! Blob Writer
//!
//! Streams bytes into a temp file while hashing them, then publishes the
//! file under its content address with a rename.

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;

use super::store::TMP_DIR;
use super::{Blob, BlobRef, BlobStore};

/// Scoped write handle returned by `BlobStore::new_blob` / `Table::new_blob`
///
/// Call `finish()` to publish. Dropping the writer (or calling `abort()`)
/// discards everything written so far.
pub struct BlobWriter {
    store: Arc<BlobStore>,
    file: NamedTempFile,
    hasher: Sha256,
    size: u64,
}

impl BlobWriter {
    pub(crate) fn create(store: Arc<BlobStore>) -> Result<Self> {
        let tmp_dir = store.dir().join(TMP_DIR);
        fs::create_dir_all(&tmp_dir)?;
        let file = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(&tmp_dir)?;

        Ok(Self {
            store,
            file,
            hasher: Sha256::new(),
            size: 0,
        })
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Publish the content and return a blob bound to this store
    ///
    /// If identical content is already stored, the new copy is discarded.
    pub fn finish(self) -> Result<Blob> {
        let store = Arc::clone(&self.store);
        let reference = self.commit()?;
        Ok(Blob::stored(reference, store))
    }

    /// Discard the pending content
    pub fn abort(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }

    pub(crate) fn commit(self) -> Result<BlobRef> {
        if self.size == 0 {
            self.file.close()?;
            return Ok(BlobRef::empty());
        }

        let reference = BlobRef::from_digest(&self.hasher.finalize(), self.size);
        let target = self.store.path_for(&reference);

        if target.exists() {
            debug!(blob = %reference, "Blob already stored, discarding duplicate");
            self.file.close()?;
            return Ok(reference);
        }

        self.file.as_file().sync_all()?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match self.file.persist_noclobber(&target) {
            Ok(_) => debug!(blob = %reference, "Published blob"),
            // Lost a race against an identical write
            Err(e) if target.exists() => drop(e.file),
            Err(e) => return Err(e.error.into()),
        }
        Ok(reference)
    }
}

impl Write for BlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
