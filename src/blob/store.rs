//! Blob Store
//!
//! Content-addressed files under a fan-out directory tree.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

use super::reference::{is_base32hex, FANOUT_LEN};
use super::{BlobRef, BlobWriter};

/// Directory holding in-flight writes
pub(crate) const TMP_DIR: &str = "tmp";

/// Deduplicating store rooted at one directory
///
/// ## Layout
/// ```text
/// {dir}/
///   ├── tmp/                 (in-flight writes, cleared by GC)
///   ├── 0A/
///   │   └── <50 chars>       (content of sha256:0A<50 chars>-<size>)
///   └── ...
/// ```
///
/// Nothing is created on disk until the first non-empty write.
#[derive(Debug)]
pub struct BlobStore {
    dir: PathBuf,
}

/// Outcome of a garbage collection pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    /// Blob files examined
    pub scanned: usize,

    /// Orphans (and stray files) deleted
    pub removed: usize,

    /// Deletions that failed and were skipped
    pub failed: usize,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a streaming write
    pub fn new_blob(self: &Arc<Self>) -> Result<BlobWriter> {
        BlobWriter::create(Arc::clone(self))
    }

    /// Store an in-memory payload and return its reference
    pub fn put(self: &Arc<Self>, data: &[u8]) -> Result<BlobRef> {
        let mut writer = self.new_blob()?;
        writer.write_all(data)?;
        writer.commit()
    }

    /// Open the content behind `reference` for streaming reads
    ///
    /// A missing backing file is `BlobNotFound`.
    pub fn open(&self, reference: &BlobRef) -> Result<BlobReader> {
        if reference.size() == 0 {
            return Ok(BlobReader::empty());
        }
        match File::open(self.path_for(reference)) {
            Ok(file) => Ok(BlobReader {
                source: Source::File(BufReader::new(file)),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the content behind `reference` is present
    pub fn contains(&self, reference: &BlobRef) -> bool {
        reference.size() == 0 || self.path_for(reference).is_file()
    }

    /// On-disk location of a reference
    pub fn path_for(&self, reference: &BlobRef) -> PathBuf {
        self.dir.join(reference.fanout()).join(reference.file_name())
    }

    /// Delete every blob file whose hash is not in `live`
    ///
    /// Best effort: individual failures are logged and counted, never
    /// returned. Also clears leftover temp files. Blobs written through a
    /// `BlobWriter` but not yet attached to a row count as orphans, so only
    /// run this while no writer is open.
    pub fn gc(&self, live: &HashSet<BlobRef>) -> GcStats {
        let mut stats = GcStats::default();
        let live: HashSet<&str> = live.iter().map(BlobRef::hash).collect();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return stats,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot read blob directory");
                stats.failed += 1;
                return stats;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if name == TMP_DIR {
                Self::clear_tmp(&path, &mut stats);
            } else if is_fanout_name(&name) && path.is_dir() {
                Self::sweep_fanout(&path, &name, &live, &mut stats);
            } else {
                warn!(path = %path.display(), "Ignoring unknown entry in blob directory");
            }
        }

        info!(
            dir = %self.dir.display(),
            scanned = stats.scanned,
            removed = stats.removed,
            failed = stats.failed,
            "Blob GC finished"
        );
        stats
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sweep_fanout(dir: &Path, prefix: &str, live: &HashSet<&str>, stats: &mut GcStats) {
        let files = match fs::read_dir(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read fan-out directory");
                stats.failed += 1;
                return;
            }
        };

        for file in files.flatten() {
            let path = file.path();
            if path.is_dir() {
                warn!(path = %path.display(), "Ignoring directory inside fan-out directory");
                continue;
            }
            stats.scanned += 1;

            let hash = format!("{}{}", prefix, file.file_name().to_string_lossy());
            if live.contains(hash.as_str()) {
                continue;
            }
            Self::remove(&path, stats);
        }
    }

    fn clear_tmp(dir: &Path, stats: &mut GcStats) {
        let files = match fs::read_dir(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read blob temp directory");
                stats.failed += 1;
                return;
            }
        };
        for file in files.flatten() {
            let path = file.path();
            if path.is_file() {
                Self::remove(&path, stats);
            }
        }
    }

    fn remove(path: &Path, stats: &mut GcStats) {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed orphaned blob");
                stats.removed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove orphaned blob");
                stats.failed += 1;
            }
        }
    }
}

fn is_fanout_name(name: &str) -> bool {
    name.len() == FANOUT_LEN && name.bytes().all(is_base32hex)
}

/// Streaming reader over stored or pending blob content
pub struct BlobReader {
    source: Source,
}

enum Source {
    File(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
    Empty,
}

impl BlobReader {
    pub(crate) fn empty() -> Self {
        Self {
            source: Source::Empty,
        }
    }

    pub(crate) fn memory(data: Arc<[u8]>) -> Self {
        Self {
            source: Source::Memory(Cursor::new(data)),
        }
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::File(reader) => reader.read(buf),
            Source::Memory(cursor) => cursor.read(buf),
            Source::Empty => Ok(0),
        }
    }
}
