//! Table Engine
//!
//! Typed rows kept sorted by ID in memory and in one JSONL file.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::blob::{BlobRef, BlobStore, BlobWriter, GcStats};
use crate::config::{Config, SyncStrategy};
use crate::error::{Result, StoreError};
use crate::id::{IdGenerator, Ksid};

use super::{Row, SchemaHeader, TableObserver};

/// A durable, ID-ordered collection of `T`
///
/// ## Concurrency Model
///
/// - **Writes** (append/update/delete): serialized by the state write lock.
///   The whole file is rewritten into a temp file and renamed over the old
///   one; the in-memory rows are swapped only after the rename succeeded.
/// - **Reads** (get/iter): shared read lock. Iterators hold an `Arc`
///   snapshot and never block writers.
///
/// One process owns a table file. Opening the same file from two processes
/// is not detected and loses writes.
pub struct Table<T: Row> {
    path: PathBuf,
    schema: SchemaHeader,
    config: Config,
    blobs: Arc<BlobStore>,
    state: RwLock<TableState<T>>,
}

struct TableState<T> {
    /// Sorted by ID, strictly increasing
    rows: Arc<Vec<T>>,
    observers: Vec<Arc<dyn TableObserver<T>>>,
}

impl<T: Row> Table<T> {
    /// Open or create the table described by `config`
    ///
    /// On startup:
    /// 1. Create the parent directory
    /// 2. Remove temp files an interrupted rewrite of this table left behind
    /// 3. Read and check the schema header (written if the file is new)
    /// 4. Load rows, failing on order, ID or validation errors
    /// 5. Delete unreferenced blobs (unless `gc_on_open` is off)
    pub fn open(config: Config) -> Result<Self> {
        let path = config.path.clone();
        fs::create_dir_all(parent_dir(&path))?;
        remove_stale_temp_files(&path);

        let schema = SchemaHeader::for_row::<T>();
        let blobs = Arc::new(BlobStore::new(config.resolved_blob_dir()));

        let rows = match Self::load(&path, &schema, &blobs)? {
            Some(rows) => rows,
            None => {
                write_table_file(&path, &schema, &[] as &[T], config.sync_strategy)?;
                debug!(path = %path.display(), "Initialized table file");
                Vec::new()
            }
        };

        if config.gc_on_open {
            blobs.gc(&live_refs(&rows));
        }

        info!(path = %path.display(), rows = rows.len(), "Opened table");

        Ok(Self {
            path,
            schema,
            config,
            blobs,
            state: RwLock::new(TableState {
                rows: Arc::new(rows),
                observers: Vec::new(),
            }),
        })
    }

    /// Open with default config at the given path
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a row, assigning a fresh ID if its ID is zero
    ///
    /// Pending blob fields are written to the blob store first. Returns the
    /// row as stored.
    #[doc(alias = "insert")]
    pub fn append(&self, mut row: T) -> Result<T> {
        let mut state = self.state.write();

        if row.id().is_zero() {
            row.set_id(self.config.id_generator.new_id());
        }
        let id = row.id();
        let pos = match state.rows.binary_search_by_key(&id, |r| r.id()) {
            Ok(_) => return Err(StoreError::DuplicateId(id)),
            Err(pos) => pos,
        };

        row.validate()?;
        self.store_blobs(&mut row)?;

        let mut rows = Vec::with_capacity(state.rows.len() + 1);
        rows.extend_from_slice(&state.rows[..pos]);
        rows.push(row.clone());
        rows.extend_from_slice(&state.rows[pos..]);
        self.persist(&rows)?;
        state.rows = Arc::new(rows);

        for observer in &state.observers {
            observer.on_append(&row);
        }
        debug!(table = %self.path.display(), id = %id, "Appended row");
        Ok(row)
    }

    /// Apply `f` to a copy of row `id` and store the result
    ///
    /// `f` may not change the ID. Nothing is written if `f` or validation
    /// fails. Blobs the old version referenced are left for the next GC.
    pub fn update<F>(&self, id: Ksid, f: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let mut state = self.state.write();
        let pos = Self::position(&state.rows, id)?;

        let prev = state.rows[pos].clone();
        let mut row = prev.clone();
        f(&mut row)?;
        if row.id() != id {
            return Err(StoreError::invalid(format!(
                "update of {} changed its ID to {}",
                id,
                row.id()
            )));
        }
        row.validate()?;
        self.store_blobs(&mut row)?;

        let mut rows = Vec::clone(&state.rows);
        rows[pos] = row.clone();
        self.persist(&rows)?;
        state.rows = Arc::new(rows);

        for observer in &state.observers {
            observer.on_update(&prev, &row);
        }
        debug!(table = %self.path.display(), id = %id, "Updated row");
        Ok(row)
    }

    /// Store `row` in place of the row with the same ID
    ///
    /// Returns the version it replaced. The ID must already exist; a zero
    /// ID is never found. Blob and observer handling match `update`.
    pub fn replace(&self, row: T) -> Result<T> {
        let id = row.id();
        let mut prev = None;
        self.update(id, |current| {
            prev = Some(std::mem::replace(current, row));
            Ok(())
        })?;
        prev.ok_or(StoreError::NotFound(id))
    }

    /// Remove row `id` and return it
    ///
    /// Its blobs stay on disk until the next GC.
    pub fn delete(&self, id: Ksid) -> Result<T> {
        let mut state = self.state.write();
        let pos = Self::position(&state.rows, id)?;

        let mut rows = Vec::clone(&state.rows);
        let removed = rows.remove(pos);
        self.persist(&rows)?;
        state.rows = Arc::new(rows);

        for observer in &state.observers {
            observer.on_delete(&removed);
        }
        debug!(table = %self.path.display(), id = %id, "Deleted row");
        Ok(removed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A copy of row `id`
    pub fn get(&self, id: Ksid) -> Result<T> {
        let state = self.state.read();
        let pos = Self::position(&state.rows, id)?;
        Ok(state.rows[pos].clone())
    }

    pub fn contains(&self, id: Ksid) -> bool {
        let state = self.state.read();
        state.rows.binary_search_by_key(&id, |r| r.id()).is_ok()
    }

    /// All rows in ascending ID order, as of this call
    pub fn iter(&self) -> RowIter<T> {
        RowIter::new(Arc::clone(&self.state.read().rows), 0)
    }

    /// Rows with an ID strictly greater than `start`, ascending
    pub fn iter_after(&self, start: Ksid) -> RowIter<T> {
        let rows = Arc::clone(&self.state.read().rows);
        let from = rows.partition_point(|r| r.id() <= start);
        RowIter::new(rows, from)
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Blobs and Observers
    // =========================================================================

    /// Start a streaming blob write into this table's store
    ///
    /// `BlobWriter::finish` yields a `Blob` to put in a row field.
    pub fn new_blob(&self) -> Result<BlobWriter> {
        self.blobs.new_blob()
    }

    pub fn blob_store(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Delete blob files no row references
    ///
    /// Holds the write lock for the whole pass. Blobs from a `BlobWriter`
    /// that are not yet in a row are deleted too.
    pub fn collect_garbage(&self) -> GcStats {
        let state = self.state.write();
        self.blobs.gc(&live_refs(&state.rows))
    }

    /// Register `observer` for future mutations
    ///
    /// Every existing row is first replayed through `on_append`.
    pub fn add_observer(&self, observer: Arc<dyn TableObserver<T>>) {
        let mut state = self.state.write();
        for row in state.rows.iter() {
            observer.on_append(row);
        }
        state.observers.push(observer);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generator `append` draws from, for minting IDs ahead of insertion
    pub fn id_generator(&self) -> &Arc<IdGenerator> {
        &self.config.id_generator
    }

    pub fn schema(&self) -> &SchemaHeader {
        &self.schema
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn position(rows: &[T], id: Ksid) -> Result<usize> {
        rows.binary_search_by_key(&id, |r| r.id())
            .map_err(|_| StoreError::NotFound(id))
    }

    /// Write pending blob fields and bind all of them to this table's store
    fn store_blobs(&self, row: &mut T) -> Result<()> {
        let mut result = Ok(());
        row.for_each_blob_mut(&mut |blob| {
            if result.is_ok() {
                result = blob.persist_into(&self.blobs);
            }
        });
        result
    }

    fn persist(&self, rows: &[T]) -> Result<()> {
        write_table_file(&self.path, &self.schema, rows, self.config.sync_strategy)
    }

    /// Read the table file; `None` if it is missing or empty
    fn load(path: &Path, expected: &SchemaHeader, blobs: &Arc<BlobStore>) -> Result<Option<Vec<T>>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |line: usize, reason: String| StoreError::Corruption {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lines = BufReader::new(file).lines();
        let header = match lines.next() {
            None => return Ok(None),
            Some(line) => read_line(line, 1, &corrupt)?,
        };
        SchemaHeader::parse_line(path, 1, &header)?.ensure_matches(expected, path)?;

        let mut rows: Vec<T> = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line_no = idx + 2;
            let line = read_line(line, line_no, &corrupt)?;
            if line.trim().is_empty() {
                continue;
            }

            let mut row: T = serde_json::from_str(&line)
                .map_err(|e| corrupt(line_no, format!("unreadable row: {}", e)))?;
            let id = row.id();
            if id.is_zero() {
                return Err(corrupt(line_no, "row has no ID".to_string()));
            }
            if let Some(last) = rows.last().map(|r| r.id()) {
                if id == last {
                    return Err(corrupt(line_no, format!("duplicate ID {}", id)));
                }
                if id < last {
                    return Err(corrupt(line_no, format!("ID {} is not after {}", id, last)));
                }
            }
            row.validate()
                .map_err(|e| corrupt(line_no, format!("row {} failed validation: {}", id, e)))?;

            row.for_each_blob_mut(&mut |blob| blob.bind(blobs));
            rows.push(row);
        }

        Ok(Some(rows))
    }
}

impl<T: Row> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("blob_dir", &self.blobs.dir())
            .field("rows", &self.len())
            .finish()
    }
}

/// Snapshot iterator over a table's rows
///
/// Yields clones in ascending ID order. Mutations made after the iterator
/// was created are not visible; `rewind` restarts the same snapshot.
#[derive(Clone)]
pub struct RowIter<T> {
    rows: Arc<Vec<T>>,
    start: usize,
    next: usize,
}

impl<T> RowIter<T> {
    fn new(rows: Arc<Vec<T>>, start: usize) -> Self {
        Self {
            rows,
            start,
            next: start,
        }
    }

    /// Restart from the first row of the snapshot
    pub fn rewind(&mut self) {
        self.next = self.start;
    }
}

impl<T: Clone> Iterator for RowIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let row = self.rows.get(self.next)?.clone();
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for RowIter<T> {}

// =============================================================================
// File Helpers
// =============================================================================

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Unwrap one line from `BufRead::lines`, reporting bad UTF-8 as corruption
pub(super) fn read_line(
    line: io::Result<String>,
    line_no: usize,
    corrupt: &dyn Fn(usize, String) -> StoreError,
) -> Result<String> {
    match line {
        Ok(line) => Ok(line),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Err(corrupt(line_no, "line is not valid UTF-8".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// References held by any blob field of any row
fn live_refs<T: Row>(rows: &[T]) -> HashSet<BlobRef> {
    let mut live = HashSet::new();
    for row in rows {
        row.for_each_blob(&mut |blob| {
            if let Some(reference) = blob.reference() {
                live.insert(reference.clone());
            }
        });
    }
    live
}

/// Temp file names used while rewriting `path`: `.{file_name}-XXXXXX.tmp`
fn temp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{}-", name)
}

const TEMP_SUFFIX: &str = ".tmp";

/// Delete rewrite temp files of `path` left by a crash
///
/// Best effort: failures are logged and the open continues. Temp files of
/// other tables in the same directory are not touched.
fn remove_stale_temp_files(path: &Path) {
    let prefix = temp_prefix(path);
    let entries = match fs::read_dir(parent_dir(path)) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot scan for stale temp files");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) || !name.ends_with(TEMP_SUFFIX) {
            continue;
        }
        let stale = entry.path();
        if !stale.is_file() {
            continue;
        }
        match fs::remove_file(&stale) {
            Ok(()) => debug!(file = %stale.display(), "Removed stale temp file"),
            Err(e) => warn!(file = %stale.display(), error = %e, "Failed to remove stale temp file"),
        }
    }
}

/// Replace `path` with header + rows, atomically
///
/// The content goes to a temp file in the same directory which is then
/// renamed over `path`, so readers see either the old or the new file.
fn write_table_file<T: Row>(
    path: &Path,
    schema: &SchemaHeader,
    rows: &[T],
    sync: SyncStrategy,
) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(&temp_prefix(path))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent_dir(path))?;

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut out, schema).map_err(serialization_error)?;
        out.write_all(b"\n")?;
        for row in rows {
            serde_json::to_writer(&mut out, row).map_err(serialization_error)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    if sync == SyncStrategy::EveryWrite {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

fn serialization_error(e: serde_json::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}
