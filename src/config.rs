//! Configuration for linestore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::sync::Arc;

use crate::id::IdGenerator;

/// Configuration for opening one table
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Table file. Its blobs live next to it:
    ///   {dir}/
    ///     ├── notes.jsonl      (header + one row per line)
    ///     └── notes.blobs/     (content-addressed blob files)
    pub path: PathBuf,

    /// Override for the blob directory (default: derived from `path`)
    pub blob_dir: Option<PathBuf>,

    /// Durability of table rewrites
    pub sync_strategy: SyncStrategy,

    /// Delete unreferenced blobs when the table is opened
    pub gc_on_open: bool,

    // -------------------------------------------------------------------------
    // ID Configuration
    // -------------------------------------------------------------------------
    /// Source of IDs for rows appended without one
    /// (default: the process-wide [`IdGenerator::global`])
    pub id_generator: Arc<IdGenerator>,
}

/// When table rewrites reach stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync the new file before it replaces the old one (safest)
    EveryWrite,

    /// Rename without fsync; a crash may lose recent writes but never
    /// exposes a partially written file
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./linestore_data/table.jsonl"),
            blob_dir: None,
            sync_strategy: SyncStrategy::EveryWrite,
            gc_on_open: true,
            id_generator: IdGenerator::global(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Blob directory in effect: `notes.jsonl` → `notes.blobs`
    pub fn resolved_blob_dir(&self) -> PathBuf {
        match &self.blob_dir {
            Some(dir) => dir.clone(),
            None => self.path.with_extension("blobs"),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the table file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Store blobs somewhere other than next to the table file
    pub fn blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.blob_dir = Some(dir.into());
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable blob GC on open
    pub fn gc_on_open(mut self, enabled: bool) -> Self {
        self.config.gc_on_open = enabled;
        self
    }

    /// Share an ID generator (e.g. one configured with `init_slice`)
    pub fn id_generator(mut self, generator: Arc<IdGenerator>) -> Self {
        self.config.id_generator = generator;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
