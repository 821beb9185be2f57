//! Tests for the blob store
//!
//! These tests verify:
//! - Content addressing and deduplication
//! - Streaming writes, abort and drop
//! - The empty-blob shortcut
//! - Not-found reporting for missing files
//! - Garbage collection
//! - Reference parsing and Blob field serialization

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use linestore::blob::{Blob, BlobRef, BlobStore, GcStats};
use linestore::StoreError;
use tempfile::TempDir;

const HELLO_HASH: &str = "5JP4REIVM2HGS9N87CLCBEF2JODHC7IS3UJK4NJJ0GPM54SBJ0I0";
const EMPTY_HASH: &str = "SEOC8GKOVGE196NRUJ49IRTP4GJQSGF4CIDP6J54IMCHMU2IN1AG";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Arc<BlobStore>) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(BlobStore::new(temp_dir.path().join("notes.blobs")));
    (temp_dir, store)
}

/// Every file under the fan-out directories (temp files excluded)
fn blob_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        if entry.file_name() == "tmp" || !entry.path().is_dir() {
            continue;
        }
        for file in fs::read_dir(entry.path()).unwrap().flatten() {
            files.push(file.path());
        }
    }
    files.sort();
    files
}

fn tmp_files(dir: &Path) -> usize {
    fs::read_dir(dir.join("tmp"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

fn read_all(store: &BlobStore, reference: &BlobRef) -> Vec<u8> {
    let mut data = Vec::new();
    store.open(reference).unwrap().read_to_end(&mut data).unwrap();
    data
}

// =============================================================================
// Content Addressing Tests
// =============================================================================

#[test]
fn test_put_hello_reference_and_layout() {
    let (_temp, store) = setup_temp_store();

    let reference = store.put(b"hello").unwrap();

    assert_eq!(reference.as_str(), format!("sha256:{}-5", HELLO_HASH));
    assert_eq!(reference.hash(), HELLO_HASH);
    assert_eq!(reference.size(), 5);

    let expected = store.dir().join(&HELLO_HASH[..2]).join(&HELLO_HASH[2..]);
    assert_eq!(store.path_for(&reference), expected);
    assert_eq!(fs::read(&expected).unwrap(), b"hello");
    assert_eq!(blob_files(store.dir()), vec![expected]);
}

#[test]
fn test_identical_content_stored_once() {
    let (_temp, store) = setup_temp_store();

    let first = store.put(b"same bytes").unwrap();
    let second = store.put(b"same bytes").unwrap();

    assert_eq!(first, second);
    assert_eq!(blob_files(store.dir()).len(), 1);
    assert_eq!(tmp_files(store.dir()), 0);
}

#[test]
fn test_distinct_content_distinct_references() {
    let (_temp, store) = setup_temp_store();

    let a = store.put(b"alpha").unwrap();
    let b = store.put(b"beta").unwrap();

    assert_ne!(a, b);
    assert_eq!(blob_files(store.dir()).len(), 2);
    assert_eq!(read_all(&store, &a), b"alpha");
    assert_eq!(read_all(&store, &b), b"beta");
}

#[test]
fn test_missing_file_is_not_found() {
    let (_temp, store) = setup_temp_store();
    let reference = store.put(b"short-lived").unwrap();

    fs::remove_file(store.path_for(&reference)).unwrap();

    assert!(!store.contains(&reference));
    match store.open(&reference) {
        Err(StoreError::BlobNotFound(msg)) => assert!(msg.contains(reference.as_str())),
        Err(e) => panic!("expected BlobNotFound, got {:?}", e),
        Ok(_) => panic!("expected BlobNotFound, got a reader"),
    }
}

// =============================================================================
// Streaming Writer Tests
// =============================================================================

#[test]
fn test_streaming_write_matches_put() {
    let (_temp, store) = setup_temp_store();

    let mut writer = store.new_blob().unwrap();
    writer.write_all(b"hel").unwrap();
    writer.write_all(b"lo").unwrap();
    assert_eq!(writer.size(), 5);
    let blob = writer.finish().unwrap();

    assert_eq!(blob.reference(), Some(&store.put(b"hello").unwrap()));
    assert_eq!(blob.read_to_vec().unwrap(), b"hello");
    assert_eq!(blob_files(store.dir()).len(), 1);
}

#[test]
fn test_abort_discards_content() {
    let (_temp, store) = setup_temp_store();

    let mut writer = store.new_blob().unwrap();
    writer.write_all(b"never published").unwrap();
    writer.abort().unwrap();

    assert!(blob_files(store.dir()).is_empty());
    assert_eq!(tmp_files(store.dir()), 0);
}

#[test]
fn test_dropped_writer_discards_content() {
    let (_temp, store) = setup_temp_store();

    {
        let mut writer = store.new_blob().unwrap();
        writer.write_all(b"dropped").unwrap();
    }

    assert!(blob_files(store.dir()).is_empty());
    assert_eq!(tmp_files(store.dir()), 0);
}

#[test]
fn test_empty_blob_has_no_file() {
    let (_temp, store) = setup_temp_store();

    let reference = store.put(b"").unwrap();

    assert_eq!(reference, BlobRef::empty());
    assert_eq!(reference.as_str(), format!("sha256:{}-0", EMPTY_HASH));
    assert!(blob_files(store.dir()).is_empty());
    assert!(store.contains(&reference));
    assert!(read_all(&store, &reference).is_empty());
}

// =============================================================================
// Garbage Collection Tests
// =============================================================================

#[test]
fn test_gc_removes_unreferenced_blobs() {
    let (_temp, store) = setup_temp_store();
    let keep = store.put(b"keep me").unwrap();
    let orphan = store.put(b"drop me").unwrap();

    let live: HashSet<BlobRef> = [keep.clone()].into_iter().collect();
    let stats = store.gc(&live);

    assert_eq!(
        stats,
        GcStats {
            scanned: 2,
            removed: 1,
            failed: 0
        }
    );
    assert!(store.contains(&keep));
    assert!(!store.contains(&orphan));
    assert_eq!(read_all(&store, &keep), b"keep me");
}

#[test]
fn test_gc_clears_temp_and_ignores_unknown_entries() {
    let (_temp, store) = setup_temp_store();
    let keep = store.put(b"keep me").unwrap();
    fs::write(store.dir().join("tmp").join("leftover.tmp"), b"partial").unwrap();
    fs::write(store.dir().join("README"), b"not a blob").unwrap();

    let live: HashSet<BlobRef> = [keep.clone()].into_iter().collect();
    let stats = store.gc(&live);

    assert_eq!(stats.removed, 1);
    assert_eq!(tmp_files(store.dir()), 0);
    assert!(store.dir().join("README").exists());
    assert!(store.contains(&keep));
}

#[test]
fn test_gc_on_missing_directory() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(store.gc(&HashSet::new()), GcStats::default());
}

// =============================================================================
// Reference and Field Tests
// =============================================================================

#[test]
fn test_reference_parse_round_trip() {
    let text = format!("sha256:{}-5", HELLO_HASH);
    let reference = BlobRef::parse(&text).unwrap();

    assert_eq!(reference.to_string(), text);
    assert_eq!(reference.size(), 5);
    assert_eq!(text.parse::<BlobRef>().unwrap(), reference);
}

#[test]
fn test_reference_parse_rejections() {
    let bad = [
        String::new(),
        format!("md5:{}-5", HELLO_HASH),
        format!("sha256:{}-5", HELLO_HASH.to_lowercase()),
        format!("sha256:{}", HELLO_HASH),
        format!("sha256:{}-", HELLO_HASH),
        format!("sha256:{}-05", HELLO_HASH),
        format!("sha256:{}-0", HELLO_HASH),
        format!("sha256:{}-5", &HELLO_HASH[1..]),
        format!("sha256:{}W-5", &HELLO_HASH[1..]),
    ];
    for text in bad {
        assert!(
            matches!(BlobRef::parse(&text), Err(StoreError::InvalidBlobRef(_))),
            "accepted {:?}",
            text
        );
    }
}

#[test]
fn test_blob_field_json() {
    let unset = Blob::default();
    assert!(unset.is_zero());
    assert_eq!(serde_json::to_string(&unset).unwrap(), "null");

    let text = format!("sha256:{}-5", HELLO_HASH);
    let stored = Blob::from_ref(BlobRef::parse(&text).unwrap());
    assert_eq!(serde_json::to_string(&stored).unwrap(), format!("\"{}\"", text));

    let back: Blob = serde_json::from_str(&format!("\"{}\"", text)).unwrap();
    assert_eq!(back, stored);
    assert!(serde_json::from_str::<Blob>("null").unwrap().is_zero());
    assert!(serde_json::from_str::<Blob>("\"sha256:nope-1\"").is_err());
}

#[test]
fn test_pending_blob_reads_from_memory_but_cannot_serialize() {
    let pending = Blob::from_bytes("in memory");

    assert!(pending.is_pending());
    assert_eq!(pending.reference(), None);
    assert_eq!(pending.read_to_vec().unwrap(), b"in memory");
    assert!(serde_json::to_string(&pending).is_err());
}

#[test]
fn test_unbound_reference_is_not_readable() {
    let stored = Blob::from_ref(BlobRef::parse(&format!("sha256:{}-5", HELLO_HASH)).unwrap());

    assert!(matches!(stored.reader(), Err(StoreError::BlobNotFound(_))));
}
