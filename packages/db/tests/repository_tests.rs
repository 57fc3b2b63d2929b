#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures_util::future::join_all;
use queue_core::{Job, JobId, QueueCounts, QueueEntry, QueueStore, lease_cutoff};
use serde_json::json;

use db::{DbError, JobRepository, SurrealQueueStore};

#[tokio::test]
async fn test_insert_and_get() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);

    let entry = QueueEntry::new("default", "1");
    let created = store.insert(entry.clone()).await?;
    assert_eq!(created, entry);

    let loaded = store.get(entry.id).await?.expect("entry exists");
    assert_eq!(loaded.queue, "default");
    assert_eq!(loaded.job_id, JobId::from("1"));
    assert!(loaded.fetched_at.is_none());
    assert_eq!(loaded.version, 0);

    let leased_at = Utc::now() - TimeDelta::hours(2);
    let leased = store
        .insert(QueueEntry::new("default", "2").with_fetched_at(leased_at))
        .await?;
    let loaded = store.get(leased.id).await?.expect("entry exists");
    // Datetimes round-trip at nanosecond precision.
    assert_eq!(loaded.fetched_at, Some(leased_at));

    assert!(store.get(queue_core::EntryId::new()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_find_eligible() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);
    let now = Utc::now();

    store.insert(QueueEntry::new("default", "d1")).await?;
    store.insert(QueueEntry::new("critical", "c1")).await?;
    store
        .insert(QueueEntry::new("critical", "fresh").with_fetched_at(now))
        .await?;
    store
        .insert(QueueEntry::new("critical", "stale").with_fetched_at(now - TimeDelta::days(1)))
        .await?;
    store.insert(QueueEntry::new("other", "o1")).await?;

    let cutoff = lease_cutoff(now, Duration::from_secs(300));
    let critical = store.find_eligible_in("critical", cutoff, 10).await?;
    let mut ids: Vec<&str> = critical.iter().map(|e| e.job_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["c1", "stale"]);

    let limited = store.find_eligible_in("critical", cutoff, 1).await?;
    assert_eq!(limited.len(), 1);

    let across = store
        .find_eligible(&["critical", "default"], Duration::from_secs(300), now)
        .await?;
    let queues: Vec<&str> = across.iter().map(|e| e.queue.as_str()).collect();
    assert_eq!(queues, vec!["critical", "critical", "default"]);

    assert!(store.find_eligible_in("missing", cutoff, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_conditional_writes() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);
    let entry = store.insert(QueueEntry::new("default", "1")).await?;
    let now = Utc::now();

    let leased = store.try_lease(entry.id, 0, now).await?.expect("lease wins");
    assert_eq!(leased.version, 1);
    assert_eq!(leased.fetched_at, Some(now));

    // Stale version loses every conditional write.
    assert!(store.try_lease(entry.id, 0, Utc::now()).await?.is_none());
    assert!(!store.release(entry.id, 0).await?);
    assert!(!store.remove(entry.id, 0).await?);
    assert_eq!(store.get(entry.id).await?.expect("still there").version, 1);

    assert!(store.release(entry.id, 1).await?);
    let released = store.get(entry.id).await?.expect("still there");
    assert!(released.fetched_at.is_none());
    assert_eq!(released.version, 2);

    assert!(store.remove(entry.id, 2).await?);
    assert!(store.get(entry.id).await?.is_none());

    // Missing records never match.
    assert!(store.try_lease(entry.id, 2, Utc::now()).await?.is_none());
    assert!(!store.remove(entry.id, 2).await?);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_leases_have_one_winner() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);
    let entry = store.insert(QueueEntry::new("default", "1")).await?;

    let attempts = (0..12).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.try_lease(entry.id, 0, Utc::now()).await })
    });

    let mut winners = 0;
    for attempt in join_all(attempts).await {
        if attempt??.is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.get(entry.id).await?.expect("entry").version, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lease_races_never_double_lease() -> Result<(), Box<dyn Error>> {
    let mut double_leases = Vec::new();

    for round in 0..200 {
        let store = SurrealQueueStore::new(common::open_db().await?);
        let entry = store.insert(QueueEntry::new("default", "1")).await?;

        let attempts = (0..12).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.try_lease(entry.id, 0, Utc::now()).await })
        });

        let mut winners = 0;
        for attempt in join_all(attempts).await {
            if attempt??.is_some() {
                winners += 1;
            }
        }
        if winners != 1 {
            double_leases.push((round, winners));
        }
    }

    assert!(double_leases.is_empty(), "rounds without exactly one winner: {double_leases:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_release_and_remove_have_one_winner() -> Result<(), Box<dyn Error>> {
    for _ in 0..50 {
        let store = SurrealQueueStore::new(common::open_db().await?);
        let entry = store.insert(QueueEntry::new("default", "1")).await?;
        store.try_lease(entry.id, 0, Utc::now()).await?.expect("lease wins");

        let releases = (0..6).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.release(entry.id, 1).await })
        });
        let removes = (0..6).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.remove(entry.id, 1).await })
        });

        let mut winners = 0;
        for outcome in join_all(releases.chain(removes)).await {
            if outcome?? {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_unbounded_limits() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);
    let now = Utc::now();
    for id in ["1", "2", "3"] {
        store.insert(QueueEntry::new("default", id)).await?;
    }
    let leased = store.insert(QueueEntry::new("default", "4")).await?;
    store.try_lease(leased.id, 0, now).await?;

    let cutoff = lease_cutoff(now, Duration::from_secs(300));
    assert_eq!(store.find_eligible_in("default", cutoff, usize::MAX).await?.len(), 3);

    let all = store.enqueued_job_ids("default", 0, usize::MAX).await?;
    assert_eq!(all, vec![JobId::from("1"), JobId::from("2"), JobId::from("3")]);
    let tail = store.enqueued_job_ids("default", 1, usize::MAX).await?;
    assert_eq!(tail, vec![JobId::from("2"), JobId::from("3")]);
    assert_eq!(store.fetched_job_ids("default", 0, usize::MAX).await?, vec![JobId::from("4")]);
    assert!(store.enqueued_job_ids("default", usize::MAX, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_monitoring() -> Result<(), Box<dyn Error>> {
    let store = SurrealQueueStore::new(common::open_db().await?);
    let now = Utc::now();

    for id in ["1", "2", "3"] {
        store.insert(QueueEntry::new("default", id)).await?;
    }
    store
        .insert(QueueEntry::new("default", "4").with_fetched_at(now))
        .await?;
    store.insert(QueueEntry::new("alpha", "5")).await?;

    assert_eq!(store.queue_names().await?, vec!["alpha", "default"]);

    let all = store.enqueued_job_ids("default", 0, 10).await?;
    assert_eq!(all.len(), 3);
    let page = store.enqueued_job_ids("default", 1, 1).await?;
    assert_eq!(page.len(), 1);
    assert!(all.contains(&page[0]));
    assert_eq!(store.enqueued_job_ids("default", 3, 10).await?.len(), 0);

    assert_eq!(
        store.fetched_job_ids("default", 0, 10).await?,
        vec![JobId::from("4")]
    );

    assert_eq!(
        store.counts("default").await?,
        QueueCounts {
            enqueued: 3,
            fetched: 1
        }
    );
    assert_eq!(store.counts("missing").await?, QueueCounts::default());
    Ok(())
}

#[tokio::test]
async fn test_job_repository() -> Result<(), Box<dyn Error>> {
    let jobs = JobRepository::new(common::open_db().await?);

    let job = Job::new(json!({ "type": "email", "to": ["a@example.com"] }));
    let created = jobs.create(&job).await?;
    assert_eq!(created.id, job.id);

    let loaded = jobs.get(&job.id).await?;
    assert_eq!(loaded.payload, job.payload);
    assert!(jobs.exists(&job.id).await?);

    jobs.delete(&job.id).await?;
    assert!(!jobs.exists(&job.id).await?);
    let missing = jobs.get(&job.id).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_global_connection() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_global_db().await?;

    let store = SurrealQueueStore::global()?;
    let entry = store.insert(QueueEntry::new("default", "1")).await?;

    // Same datastore through a second handle.
    let again = SurrealQueueStore::global()?;
    assert_eq!(again.get(entry.id).await?.map(|e| e.id), Some(entry.id));
    Ok(())
}
