//! Async push driver.

use tempfile::tempdir;
use tokio::sync::mpsc;

use sweep_core::merge::CollectingSink;
use sweep_core::{Signal, SweepError, Sweeper};

use super::helpers::{config, read_snapshot, rec};

#[tokio::test(flavor = "multi_thread")]
async fn test_drive_async_completes() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let sweeper = Sweeper::new(config(dir.path()), "t")?;
    sweeper.run(vec![rec(1, "a"), rec(2, "b")], CollectingSink::new())?;

    let (tx, rx) = mpsc::channel(16);
    let producer = tokio::spawn(async move {
        for record in [rec(2, "b"), rec(3, "c")] {
            tx.send(Signal::Next(record)).await.ok();
        }
        tx.send(Signal::Completed).await.ok();
    });

    let stats = sweeper.subscribe(CollectingSink::new())?.drive_async(rx).await?;
    producer.await?;

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.inserted, 1);
    assert_eq!(read_snapshot(&sweeper), vec![rec(2, "b"), rec(3, "c")]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drive_async_dropped_sender_aborts() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let sweeper = Sweeper::new(config(dir.path()), "t")?;

    let (tx, rx) = mpsc::channel(4);
    tx.send(Signal::Next(rec(1, "a"))).await?;
    drop(tx);

    let result = sweeper.subscribe(CollectingSink::new())?.drive_async(rx).await;

    assert!(matches!(result, Err(SweepError::Aborted(_))));
    assert!(!sweeper.paths().snapshot.exists());
    assert!(!sweeper.paths().next.exists());
    Ok(())
}
