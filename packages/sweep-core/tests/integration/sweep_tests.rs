//! Pull-mode sweeps against real snapshot files.

use std::fs;

use ntest::timeout;
use tempfile::tempdir;

use sweep_core::key::{decode_i32, Direction, OrdinalCollation};
use sweep_core::merge::CollectingSink;
use sweep_core::{
    Change, ChangeKind, Converter, ItemChange, Key, Record, RecordFormat, ReplaceStrategy,
    SweepConfig, Sweeper,
};

use super::helpers::{config, read_snapshot, rec};

#[timeout(5000)]
#[test]
fn test_first_run_inserts_everything() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "orders").unwrap();
    let source: Vec<Record> = (1..=50).map(|i| rec(i, "row")).collect();

    let mut sink = CollectingSink::new();
    let stats = sweeper.run(source.clone(), &mut sink).unwrap();

    assert_eq!(stats.inserted, 50);
    assert_eq!(stats.snapshot_records, 0);
    assert_eq!(sink.count(ChangeKind::Insert), 50);
    assert!(sweeper.paths().snapshot.exists());
    assert!(!sweeper.paths().next.exists());
    assert_eq!(read_snapshot(&sweeper), source);
}

#[timeout(5000)]
#[test]
fn test_second_run_reports_differences() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "orders").unwrap();
    sweeper
        .run(
            vec![rec(1, "A"), rec(2, "B"), rec(4, "D")],
            CollectingSink::new(),
        )
        .unwrap();

    let source = vec![rec(1, "A"), rec(2, "Z"), rec(3, "C")];
    let mut sink = CollectingSink::new();
    let stats = sweeper.run(source.clone(), &mut sink).unwrap();

    assert_eq!(
        sink.changes,
        vec![
            Change::Update {
                key: Key::i64(2).into_bytes(),
                old: b"B".to_vec(),
                new: b"Z".to_vec(),
            },
            Change::Insert { record: rec(3, "C") },
            Change::Delete {
                key: Key::i64(4).into_bytes(),
            },
        ]
    );
    assert_eq!(stats.unchanged, 1);
    assert_eq!(read_snapshot(&sweeper), source);
}

#[timeout(5000)]
#[test]
fn test_repeated_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    let source: Vec<Record> = (0..200).map(|i| rec(i * 3, &format!("v{}", i))).collect();

    sweeper.run(source.clone(), CollectingSink::new()).unwrap();
    let first = fs::read(&sweeper.paths().snapshot).unwrap();

    let mut sink = CollectingSink::new();
    let stats = sweeper.run(source, &mut sink).unwrap();
    let second = fs::read(&sweeper.paths().snapshot).unwrap();

    assert!(sink.changes.is_empty());
    assert!(!stats.has_changes());
    assert_eq!(stats.unchanged, 200);
    assert_eq!(first, second);
}

#[timeout(5000)]
#[test]
fn test_empty_source_deletes_snapshot_contents() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    sweeper
        .run(vec![rec(1, "a"), rec(2, "b")], CollectingSink::new())
        .unwrap();

    let mut sink = CollectingSink::new();
    let stats = sweeper.run(Vec::<Record>::new(), &mut sink).unwrap();

    assert_eq!(stats.deleted, 2);
    assert!(read_snapshot(&sweeper).is_empty());
    assert_eq!(fs::metadata(&sweeper.paths().snapshot).unwrap().len(), 0);
}

#[timeout(5000)]
#[test]
fn test_fixed_width_pads_short_keys() {
    let dir = tempdir().unwrap();
    let cfg = SweepConfig {
        format: RecordFormat::FixedWidth {
            id_size: 8,
            data_size: 2,
        },
        ..config(dir.path())
    };
    let sweeper = Sweeper::new(cfg, "fixed").unwrap();
    // 4-byte keys stored in 8-byte slots.
    let source: Vec<Record> = (0..5)
        .map(|i| Record::keyed(Key::i32(i), vec![i as u8, 0xAA]))
        .collect();

    sweeper.run(source.clone(), CollectingSink::new()).unwrap();
    assert_eq!(fs::metadata(&sweeper.paths().snapshot).unwrap().len(), 50);

    let stored = read_snapshot(&sweeper);
    assert_eq!(stored[0].key.len(), 8);

    // Short source keys still match their padded snapshot counterparts.
    let mut sink = CollectingSink::new();
    let stats = sweeper.run(source, &mut sink).unwrap();
    assert!(sink.changes.is_empty());
    assert_eq!(stats.unchanged, 5);
}

#[timeout(5000)]
#[test]
fn test_run_items_with_converter() {
    #[derive(Debug, Clone, PartialEq)]
    struct Customer {
        id: i32,
        name: &'static str,
    }

    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "customers").unwrap();
    let converter = Converter::new(
        |c: &Customer| Key::i32(c.id),
        |c: &Customer| c.name.as_bytes().to_vec(),
    );

    let before = vec![
        Customer { id: 1, name: "ada" },
        Customer { id: 2, name: "bob" },
    ];
    sweeper
        .run_items(before, &converter, CollectingSink::new())
        .unwrap();

    let after = vec![
        Customer { id: 1, name: "ada" },
        Customer { id: 2, name: "rob" },
        Customer { id: 3, name: "cy" },
    ];
    let mut sink = CollectingSink::new();
    let stats = sweeper.run_items(after, &converter, &mut sink).unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.inserted, 1);
    assert_eq!(sink.changes[0].key(), Key::i32(2).as_slice());

    // With a key decoder the same sweep reports typed identities.
    let converter = converter.with_key_decoder(|key: &[u8]| decode_i32(key).unwrap_or_default());
    let last = vec![
        Customer { id: 2, name: "rob" },
        Customer { id: 3, name: "cyd" },
        Customer { id: 4, name: "dee" },
    ];
    let mut changes: Vec<ItemChange<i32, Customer>> = Vec::new();
    let stats = sweeper.run_typed(last, &converter, &mut changes).unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(
        changes,
        vec![
            ItemChange::Deleted(1),
            ItemChange::Updated(3, Customer { id: 3, name: "cyd" }),
            ItemChange::Added(4, Customer { id: 4, name: "dee" }),
        ]
    );
}

#[timeout(5000)]
#[test]
fn test_run_typed_decodes_padded_fixed_width_keys() {
    let dir = tempdir().unwrap();
    let cfg = SweepConfig {
        format: RecordFormat::FixedWidth {
            id_size: 8,
            data_size: 1,
        },
        ..config(dir.path())
    };
    let sweeper = Sweeper::new(cfg, "typed").unwrap();
    let converter = Converter::new(|v: &(i32, u8)| Key::i32(v.0), |v: &(i32, u8)| vec![v.1])
        .with_key_decoder(|key: &[u8]| decode_i32(key));

    sweeper
        .run_typed(vec![(1, 1u8), (2, 2)], &converter, Vec::<ItemChange<_, _>>::new())
        .unwrap();

    let mut changes: Vec<ItemChange<Option<i32>, (i32, u8)>> = Vec::new();
    sweeper
        .run_typed(vec![(2, 9u8)], &converter, &mut changes)
        .unwrap();

    assert_eq!(
        changes,
        vec![ItemChange::Deleted(Some(1)), ItemChange::Updated(Some(2), (2, 9))]
    );
}

#[timeout(5000)]
#[test]
fn test_composite_text_keys() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "composite").unwrap();
    let key = |region: &str, id: i32| {
        Key::composite(&[
            Key::text(region, 4, &OrdinalCollation, Direction::Ascending),
            Key::i32(id),
        ])
    };

    let first = vec![
        Record::keyed(key("eu", 1), b"x".to_vec()),
        Record::keyed(key("eu", 2), b"x".to_vec()),
        Record::keyed(key("us", 1), b"x".to_vec()),
    ];
    sweeper.run(first, CollectingSink::new()).unwrap();

    let second = vec![
        Record::keyed(key("eu", 1), b"x".to_vec()),
        Record::keyed(key("us", 1), b"y".to_vec()),
    ];
    let mut sink = CollectingSink::new();
    let stats = sweeper.run(second, &mut sink).unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(sink.changes[0].kind(), ChangeKind::Delete);
    assert_eq!(sink.changes[0].key(), key("eu", 2).into_bytes().as_slice());
}

#[timeout(5000)]
#[test]
fn test_descending_text_source_with_prefixes() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "desc").unwrap();
    let record = |s: &str, payload: &str| {
        Record::keyed(
            Key::text(s, 8, &OrdinalCollation, Direction::Descending),
            payload.as_bytes().to_vec(),
        )
    };

    sweeper
        .run(
            vec![record("abc", "1"), record("ab", "1"), record("a", "1")],
            CollectingSink::new(),
        )
        .unwrap();

    let mut sink = CollectingSink::new();
    let stats = sweeper
        .run(vec![record("abc", "1"), record("a", "2")], &mut sink)
        .unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.out_of_order, 0);
    assert_eq!(sink.changes[0].kind(), ChangeKind::Delete);
    assert_eq!(sink.changes[0].key(), record("ab", "").key.as_slice());
}

#[timeout(5000)]
#[test]
fn test_atomic_rename_strategy() {
    let dir = tempdir().unwrap();
    let cfg = SweepConfig {
        replace_strategy: ReplaceStrategy::AtomicRename,
        sync_on_finish: true,
        ..config(dir.path())
    };
    let sweeper = Sweeper::new(cfg, "atomic").unwrap();
    sweeper.run(vec![rec(1, "a")], CollectingSink::new()).unwrap();
    sweeper.run(vec![rec(2, "b")], CollectingSink::new()).unwrap();

    assert_eq!(read_snapshot(&sweeper), vec![rec(2, "b")]);
    assert!(!sweeper.paths().next.exists());
}

#[timeout(5000)]
#[test]
fn test_inspect_after_run() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    assert!(!sweeper.inspect().unwrap().exists);

    sweeper
        .run((0..10).map(|i| rec(i, "p")), CollectingSink::new())
        .unwrap();

    let info = sweeper.inspect().unwrap();
    let raw = fs::read(&sweeper.paths().snapshot).unwrap();
    assert!(info.exists);
    assert_eq!(info.records, 10);
    assert_eq!(info.crc32, crc32fast::hash(&raw));
}

#[timeout(5000)]
#[test]
fn test_stale_next_file_is_overwritten() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    fs::write(&sweeper.paths().next, b"garbage from a crashed run").unwrap();

    sweeper.run(vec![rec(1, "a")], CollectingSink::new()).unwrap();

    assert_eq!(read_snapshot(&sweeper), vec![rec(1, "a")]);
    assert!(!sweeper.paths().next.exists());
}

#[test]
fn test_invalid_name_rejected() {
    let dir = tempdir().unwrap();
    assert!(Sweeper::new(config(dir.path()), "../escape").is_err());
}
