//! Tests for KSIDs, the ID generator and ID lists
//!
//! These tests verify:
//! - Text round trip and sort order of the encoding
//! - Rejection of malformed text
//! - JSON accepts strings only, including as map keys
//! - Slice partitioning and monotonic generation across threads
//! - Default configs share the process-wide generator
//! - IdList text form

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use linestore::id::{IdGenerator, IdList, Ksid, ENCODED_LEN, SLICE_MASK};
use linestore::{Config, StoreError};
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

fn id(text: &str) -> Ksid {
    Ksid::decode(text).unwrap()
}

fn assert_decode_error(text: &str) {
    match Ksid::decode(text) {
        Err(StoreError::Decode(_)) => {}
        other => panic!("expected decode error for {:?}, got {:?}", text, other),
    }
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_zero_encodes_as_single_char() {
    assert_eq!(Ksid::ZERO.to_string(), "0");
    assert_eq!(id("0"), Ksid::ZERO);
    assert_eq!(id(""), Ksid::ZERO);
}

#[test]
fn test_max_round_trip() {
    let text = Ksid::MAX.to_string();

    assert_eq!(text, "7ZZZZZZZZZZZZ");
    assert_eq!(id(&text), Ksid::MAX);
}

#[test]
fn test_nonzero_ids_have_fixed_width() {
    assert_eq!(Ksid::try_from(1u64).unwrap().to_string(), "0000000000001");
    assert_eq!(Ksid::try_from(32u64).unwrap().to_string(), "0000000000010");
    assert_eq!(Ksid::try_from(1u64).unwrap().to_string().len(), ENCODED_LEN);
}

#[test]
fn test_short_text_decodes_as_left_padded() {
    assert_eq!(id("A"), id("000000000000A"));
    assert_eq!(id("A").as_u64(), 10);
    assert_eq!(id("10").as_u64(), 32);
}

#[test]
fn test_try_from_rejects_64_bit_values() {
    assert!(Ksid::try_from(u64::MAX).is_err());
    assert!(Ksid::try_from(1u64 << 63).is_err());
    assert_eq!(Ksid::try_from(i64::MAX as u64).unwrap(), Ksid::MAX);
}

#[test]
fn test_parts_round_trip() {
    let ksid = Ksid::from_parts(123_456, 789);

    assert_eq!(ksid.time10us(), 123_456);
    assert_eq!(ksid.slice(), 789);
    assert_eq!(ksid.as_u64(), (123_456 << 12) | 789);
}

#[test]
fn test_from_time() {
    let instant = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
    let ksid = Ksid::from_time(instant, 5).unwrap();

    assert_eq!(ksid.time10us(), 100_000);
    assert_eq!(ksid.slice(), 5);
    assert_eq!(ksid.time(), instant);

    let before_epoch = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
    assert_eq!(Ksid::from_time(before_epoch, 0), None);
    assert_eq!(Ksid::from_time(instant, SLICE_MASK + 1), None);
}

#[test]
fn test_zero_id_time_is_epoch() {
    let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    assert_eq!(Ksid::ZERO.time(), epoch);
    assert_eq!(Ksid::from_time(epoch, 0), Some(Ksid::ZERO));
}

#[test]
fn test_crockford_digits_decode_in_order() {
    // The alphabet skips I, L, O and U, so W..Z are the top four digits
    assert_eq!(id("H").as_u64(), 17);
    assert_eq!(id("J").as_u64(), 18);
    assert_eq!(id("V").as_u64(), 27);
    assert_eq!(id("W").as_u64(), 28);
    assert_eq!(id("Z").as_u64(), 31);
}

// =============================================================================
// Decode Rejection Tests
// =============================================================================

#[test]
fn test_decode_rejects_too_long() {
    assert_decode_error("00000000000001");
}

#[test]
fn test_decode_rejects_lowercase() {
    assert_decode_error("abc");
    assert_decode_error("000000000000a");
}

#[test]
fn test_decode_rejects_excluded_letters() {
    for text in ["I", "L", "O", "U", "-", " 1"] {
        assert_decode_error(text);
    }
}

#[test]
fn test_decode_rejects_non_ascii() {
    assert_decode_error("é");
    assert_decode_error("00000000000\u{80}");
}

#[test]
fn test_decode_rejects_overflow() {
    assert_decode_error("8000000000000");
    assert_decode_error("ZZZZZZZZZZZZZ");
}

// =============================================================================
// JSON Tests
// =============================================================================

#[test]
fn test_json_round_trip() {
    for ksid in [Ksid::ZERO, id("1"), id("B2N4XK9A0G"), Ksid::MAX] {
        let json = serde_json::to_string(&ksid).unwrap();
        let back: Ksid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ksid);
    }
    assert_eq!(serde_json::to_string(&Ksid::ZERO).unwrap(), "\"0\"");
}

#[test]
fn test_json_rejects_non_strings() {
    assert!(serde_json::from_str::<Ksid>("123").is_err());
    assert!(serde_json::from_str::<Ksid>("{}").is_err());
    assert!(serde_json::from_str::<Ksid>("null").is_err());
    assert!(serde_json::from_str::<Ksid>("\"abc\"").is_err());
}

#[test]
fn test_json_map_key_round_trip() {
    let first = id("B2N4XK9A0G");
    let mut map = HashMap::new();
    map.insert(first, "first".to_string());
    map.insert(Ksid::MAX, "last".to_string());

    let json = serde_json::to_string(&map).unwrap();
    assert!(json.contains("\"000B2N4XK9A0G\":\"first\""));
    assert!(json.contains("\"7ZZZZZZZZZZZZ\":\"last\""));

    let back: HashMap<Ksid, String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, map);
    assert!(serde_json::from_str::<HashMap<Ksid, String>>("{\"abc\":\"x\"}").is_err());
}

// =============================================================================
// Generator Tests
// =============================================================================

#[test]
fn test_generated_ids_strictly_increase() {
    let generator = IdGenerator::new();
    let ids: Vec<Ksid> = (0..10_000).map(|_| generator.new_id()).collect();

    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1]);
        assert!(pair[0].to_string() < pair[1].to_string());
    }
}

#[test]
fn test_slice_residue_after_init() {
    let generator = IdGenerator::new();
    generator.new_id();
    generator.init_slice(3, 8).unwrap();

    for _ in 0..5_000 {
        assert_eq!(generator.new_id().slice() % 8, 3);
    }
    assert_eq!(generator.slice_config(), (3, 8));
}

#[test]
fn test_init_slice_rejects_bad_arguments() {
    let generator = IdGenerator::new();

    assert!(matches!(generator.init_slice(0, 0), Err(StoreError::Config(_))));
    assert!(matches!(generator.init_slice(4, 4), Err(StoreError::Config(_))));
    assert!(matches!(generator.init_slice(0, 4097), Err(StoreError::Config(_))));
    assert!(generator.init_slice(4095, 4096).is_ok());
}

#[test]
fn test_concurrent_generation_is_unique_and_monotonic() {
    let generator = Arc::new(IdGenerator::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || (0..2_000).map(|_| generator.new_id()).collect::<Vec<_>>())
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        all.extend(ids);
    }
    assert_eq!(all.len(), 8_000);
}

#[test]
fn test_default_config_shares_global_generator() {
    let a = Config::default();
    let b = Config::builder().build();

    assert!(Arc::ptr_eq(&a.id_generator, &IdGenerator::global()));
    assert!(Arc::ptr_eq(&a.id_generator, &b.id_generator));

    let first = a.id_generator.new_id();
    let second = b.id_generator.new_id();
    assert!(second > first);
}

// =============================================================================
// IdList Tests
// =============================================================================

#[test]
fn test_id_list_drops_zero_and_empty_elements() {
    let list: IdList = "A,0,,B".parse().unwrap();

    assert_eq!(list.as_slice(), &[id("A"), id("B")]);
}

#[test]
fn test_id_list_round_trip() {
    let lists = [
        IdList::new(),
        IdList::from(vec![id("A")]),
        IdList::from(vec![id("A"), id("B2N4XK9A0G"), Ksid::MAX]),
    ];
    for list in lists {
        let text = list.to_string();
        let back: IdList = text.parse().unwrap();
        assert_eq!(back, list);
    }
    assert_eq!(IdList::new().to_string(), "");
}

#[test]
fn test_id_list_rejects_malformed_element() {
    assert!("A,b".parse::<IdList>().is_err());
    assert!("A,00000000000001".parse::<IdList>().is_err());
}

#[test]
fn test_id_list_json() {
    let list = IdList::from(vec![id("1"), id("2")]);
    let json = serde_json::to_string(&list).unwrap();

    assert_eq!(json, "\"0000000000001,0000000000002\"");
    assert_eq!(serde_json::from_str::<IdList>(&json).unwrap(), list);
    assert!(serde_json::from_str::<IdList>("[1,2]").is_err());
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_text_round_trip(value in 0..=i64::MAX as u64) {
        let ksid = Ksid::try_from(value).unwrap();
        prop_assert_eq!(Ksid::decode(&ksid.to_string()).unwrap(), ksid);
    }

    #[test]
    fn prop_text_order_matches_numeric_order(
        a in 0..=i64::MAX as u64,
        b in 0..=i64::MAX as u64,
    ) {
        let (x, y) = (Ksid::try_from(a).unwrap(), Ksid::try_from(b).unwrap());
        prop_assert_eq!(x.to_string().cmp(&y.to_string()), a.cmp(&b));
    }

    #[test]
    fn prop_decode_never_panics(text in "\\PC{0,16}") {
        let _ = Ksid::decode(&text);
    }
}
