//! Push-mode sweeps.

use std::fs;
use std::sync::mpsc;
use std::thread;

use ntest::timeout;
use tempfile::tempdir;

use sweep_core::merge::{ChannelSink, CollectingSink};
use sweep_core::{ChangeKind, Signal, SweepError, Sweeper};

use super::helpers::{config, read_snapshot, rec};

#[timeout(5000)]
#[test]
fn test_push_matches_pull() {
    let pull_dir = tempdir().unwrap();
    let push_dir = tempdir().unwrap();
    let pull = Sweeper::new(config(pull_dir.path()), "t").unwrap();
    let push = Sweeper::new(config(push_dir.path()), "t").unwrap();

    let seed = vec![rec(1, "A"), rec(2, "B"), rec(4, "D")];
    pull.run(seed.clone(), CollectingSink::new()).unwrap();
    push.run(seed, CollectingSink::new()).unwrap();

    let source = vec![rec(1, "A"), rec(2, "Z"), rec(3, "C")];
    let mut pull_sink = CollectingSink::new();
    let pull_stats = pull.run(source.clone(), &mut pull_sink).unwrap();

    let mut push_sink = CollectingSink::new();
    let mut sweep = push.subscribe(&mut push_sink).unwrap();
    for record in source {
        sweep.on_next(record).unwrap();
    }
    assert_eq!(sweep.stats().source_records, 3);
    let push_stats = sweep.on_completed().unwrap();

    assert_eq!(push_stats, pull_stats);
    assert_eq!(push_sink.changes, pull_sink.changes);
    assert_eq!(
        fs::read(&push.paths().snapshot).unwrap(),
        fs::read(&pull.paths().snapshot).unwrap()
    );
}

#[timeout(5000)]
#[test]
fn test_on_error_leaves_snapshot() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    sweeper.run(vec![rec(1, "a")], CollectingSink::new()).unwrap();
    let original = fs::read(&sweeper.paths().snapshot).unwrap();

    let mut sweep = sweeper.subscribe(CollectingSink::new()).unwrap();
    sweep.on_next(rec(1, "changed")).unwrap();
    sweep.on_next(rec(2, "new")).unwrap();
    let err = sweep.on_error("producer crashed");

    assert!(matches!(err, SweepError::Aborted(ref msg) if msg == "producer crashed"));
    assert_eq!(fs::read(&sweeper.paths().snapshot).unwrap(), original);
    assert!(!sweeper.paths().next.exists());
}

#[timeout(5000)]
#[test]
fn test_dropped_sweep_discards_next() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    sweeper.run(vec![rec(1, "a")], CollectingSink::new()).unwrap();

    let mut sweep = sweeper.subscribe(CollectingSink::new()).unwrap();
    sweep.on_next(rec(5, "e")).unwrap();
    assert!(sweeper.paths().next.exists());
    drop(sweep);

    assert!(!sweeper.paths().next.exists());
    assert_eq!(read_snapshot(&sweeper), vec![rec(1, "a")]);
}

#[timeout(5000)]
#[test]
fn test_failed_on_next_poisons_completion() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    sweeper.run(vec![rec(1, "a")], CollectingSink::new()).unwrap();

    let mut sweep = sweeper.subscribe(CollectingSink::new()).unwrap();
    sweep.on_next(rec(5, "e")).unwrap();
    assert!(matches!(
        sweep.on_next(rec(4, "d")),
        Err(SweepError::OutOfOrder { .. })
    ));
    assert!(matches!(sweep.on_completed(), Err(SweepError::Poisoned)));
    assert_eq!(read_snapshot(&sweeper), vec![rec(1, "a")]);
}

#[timeout(5000)]
#[test]
fn test_drive_channel_from_producer_thread() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();
    sweeper
        .run((0..100).map(|i| rec(i, "old")), CollectingSink::new())
        .unwrap();

    let (change_tx, change_rx) = mpsc::channel();
    let (signal_tx, signal_rx) = mpsc::channel();
    let producer = thread::spawn(move || {
        for i in (0..100).filter(|i| i % 2 == 0) {
            signal_tx.send(Signal::Next(rec(i, "old"))).unwrap();
        }
        signal_tx.send(Signal::Next(rec(500, "new"))).unwrap();
        signal_tx.send(Signal::Completed).unwrap();
    });

    let stats = sweeper
        .subscribe(ChannelSink::new(change_tx))
        .unwrap()
        .drive_channel(signal_rx)
        .unwrap();
    producer.join().unwrap();

    let changes: Vec<_> = change_rx.try_iter().collect();
    assert_eq!(stats.deleted, 50);
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.unchanged, 50);
    assert_eq!(changes.len(), 51);
    assert_eq!(changes.last().unwrap().kind(), ChangeKind::Insert);
    assert_eq!(read_snapshot(&sweeper).len(), 51);
}

#[timeout(5000)]
#[test]
fn test_drive_channel_error_signal() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();

    let (tx, rx) = mpsc::channel();
    tx.send(Signal::Next(rec(1, "a"))).unwrap();
    tx.send(Signal::Error("query timed out".into())).unwrap();

    let err = sweeper
        .subscribe(CollectingSink::new())
        .unwrap()
        .drive_channel(rx)
        .unwrap_err();

    assert!(matches!(err, SweepError::Aborted(ref msg) if msg == "query timed out"));
    assert!(!sweeper.paths().snapshot.exists());
    assert!(!sweeper.paths().next.exists());
}

#[timeout(5000)]
#[test]
fn test_drive_channel_disconnect_aborts() {
    let dir = tempdir().unwrap();
    let sweeper = Sweeper::new(config(dir.path()), "t").unwrap();

    let (tx, rx) = mpsc::channel();
    tx.send(Signal::Next(rec(1, "a"))).unwrap();
    drop(tx);

    let err = sweeper
        .subscribe(CollectingSink::new())
        .unwrap()
        .drive_channel(rx)
        .unwrap_err();

    assert!(matches!(err, SweepError::Aborted(_)));
    assert!(!sweeper.paths().snapshot.exists());
}
