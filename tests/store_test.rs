use chrono::{DateTime, Duration, TimeZone, Utc};
use medminder::{FixedClock, PrescriptionStore, StoreError, SystemClock};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

struct TestStore {
    store: PrescriptionStore,
    clock: Arc<FixedClock>,
    _temp: TempDir,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, 9, 30, 0).unwrap()
}

async fn setup_store() -> TestStore {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(t0()));
    let store = PrescriptionStore::open(temp_dir.path().join("test.db"), clock.clone())
        .await
        .expect("open failed");

    TestStore {
        store,
        clock,
        _temp: temp_dir,
    }
}

#[tokio::test]
async fn test_empty_store() {
    let t = setup_store().await;

    assert!(t.store.read_all().await.unwrap().is_empty());
    assert!(matches!(
        t.store.read("foo").await,
        Err(StoreError::NotFound(name)) if name == "foo"
    ));
}

#[tokio::test]
async fn test_create_then_read() {
    let t = setup_store().await;

    let created = t.store.create("foo", 123.45, 12.34).await.unwrap();
    assert_eq!(created.name, "foo");
    assert_eq!(created.updated, t0());

    let read = t.store.read("foo").await.unwrap();
    assert_eq!(read, created);
    assert_eq!(read.quantity, 123.45);
    assert_eq!(read.rate, 12.34);
}

#[tokio::test]
async fn test_create_with_system_clock_stamps_now() {
    let temp_dir = TempDir::new().unwrap();
    let store = PrescriptionStore::open(temp_dir.path().join("test.db"), Arc::new(SystemClock))
        .await
        .unwrap();

    let before = Utc::now();
    store.create("foo", 1.0, 1.0).await.unwrap();
    let read = store.read("foo").await.unwrap();

    let drift = (read.updated - before).num_milliseconds().abs();
    assert!(drift < 5_000, "updated drifted {}ms from creation", drift);
}

#[tokio::test]
async fn test_duplicate_create_leaves_record_untouched() {
    let t = setup_store().await;
    t.store.create("bar", 543.21, 43.21).await.unwrap();
    let before = t.store.read("bar").await.unwrap();

    t.clock.advance(Duration::days(1));
    match t.store.create("bar", 1.0, 1.0).await {
        Err(StoreError::AlreadyExists(name)) => assert_eq!(name, "bar"),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }

    assert_eq!(t.store.read("bar").await.unwrap(), before);
    assert_eq!(t.store.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let t = setup_store().await;

    assert!(matches!(t.store.read("ghost").await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        t.store.update_quantity("ghost", 1.0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        t.store.update_rate("ghost", 1.0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(t.store.delete("ghost").await, Err(StoreError::NotFound(_))));

    t.store.create("gone", 1.0, 1.0).await.unwrap();
    assert_ok!(t.store.delete("gone").await);

    assert!(matches!(t.store.read("gone").await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        t.store.update_quantity("gone", 1.0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        t.store.update_rate("gone", 1.0).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(t.store.delete("gone").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_update_quantity_refreshes_updated_but_rate_does_not() {
    let t = setup_store().await;
    t.store.create("foo", 123.45, 12.34).await.unwrap();

    t.clock.advance(Duration::hours(30));
    t.store.update_quantity("foo", 444.44).await.unwrap();
    let after_quantity = t.store.read("foo").await.unwrap();
    assert_eq!(after_quantity.quantity, 444.44);
    assert_eq!(after_quantity.rate, 12.34);
    assert_eq!(after_quantity.updated, t0() + Duration::hours(30));

    t.clock.advance(Duration::hours(30));
    t.store.update_rate("foo", 33.33).await.unwrap();
    let after_rate = t.store.read("foo").await.unwrap();
    assert_eq!(after_rate.rate, 33.33);
    assert_eq!(after_rate.quantity, 444.44);
    assert_eq!(after_rate.updated, after_quantity.updated);
}

#[tokio::test]
async fn test_zero_values_are_stored() {
    let t = setup_store().await;
    t.store.create("foo", 10.0, 2.0).await.unwrap();

    t.store.update_quantity("foo", 0.0).await.unwrap();
    t.store.update_rate("foo", 0.0).await.unwrap();

    let read = t.store.read("foo").await.unwrap();
    assert_eq!(read.quantity, 0.0);
    assert_eq!(read.rate, 0.0);
    assert_eq!(read.refill_date(), None);
}

#[tokio::test]
async fn test_delete_shrinks_read_all_by_one() {
    let t = setup_store().await;
    t.store.create("foo", 1.0, 1.0).await.unwrap();
    t.store.create("bar", 2.0, 2.0).await.unwrap();
    t.store.create("baz", 3.0, 3.0).await.unwrap();

    let before = t.store.read_all().await.unwrap().len();
    t.store.delete("bar").await.unwrap();
    let after = t.store.read_all().await.unwrap();

    assert_eq!(after.len(), before - 1);
    assert!(after.iter().all(|p| p.name != "bar"));
    assert!(matches!(t.store.read("bar").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_derived_values_follow_clock() {
    let t = setup_store().await;
    let created = t.store.create("foo", 100.0, 10.0).await.unwrap();

    t.clock.advance(Duration::days(5));
    let read = t.store.read("foo").await.unwrap();
    assert_eq!(read.expected_count(t.store.now()), 50.0);

    t.clock.advance(Duration::days(15));
    assert_eq!(read.expected_count(t.store.now()), 0.0);
    assert_eq!(read.refill_date(), Some(created.updated + Duration::days(10)));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    let clock = Arc::new(FixedClock::new(t0()));

    let store = PrescriptionStore::open(&path, clock.clone()).await.unwrap();
    store.create("foo", 123.45, 12.34).await.unwrap();
    store.close().await;

    assert!(matches!(store.read("foo").await, Err(StoreError::Storage(_))));

    let reopened = PrescriptionStore::open(&path, clock).await.unwrap();
    let read = reopened.read("foo").await.unwrap();
    assert_eq!(read.quantity, 123.45);
    assert_eq!(read.updated, t0());
}

#[tokio::test]
async fn test_concurrent_duplicate_creates_yield_one_winner() {
    let t = setup_store().await;
    let store = Arc::new(t.store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create("race", i as f64, 1.0).await })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(StoreError::AlreadyExists(_)) => duplicates += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
}

#[tokio::test]
async fn test_end_to_end_flow() {
    let t = setup_store().await;

    t.store.create("foo", 123.45, 543.21).await.unwrap();

    let all = t.store.read_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "foo");

    let read = t.store.read("foo").await.unwrap();
    assert_eq!(read.quantity, 123.45);
    assert_eq!(read.rate, 543.21);

    t.store.update_quantity("foo", 333.33).await.unwrap();
    t.store.update_rate("foo", 222.22).await.unwrap();
    let read = t.store.read("foo").await.unwrap();
    assert_eq!(read.quantity, 333.33);
    assert_eq!(read.rate, 222.22);

    t.store.delete("foo").await.unwrap();
    assert!(matches!(t.store.read("foo").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_other_constraint_violations_are_storage_failures() {
    let t = setup_store().await;

    // SQLite binds NaN as NULL, tripping the NOT NULL constraint rather than the key
    match t.store.create("nan", f64::NAN, 1.0).await {
        Err(StoreError::Storage(_)) => {}
        other => panic!("Expected Storage, got {:?}", other),
    }
    assert!(matches!(t.store.read("nan").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_ping() {
    let t = setup_store().await;
    assert_ok!(t.store.ping().await);

    t.store.close().await;
    assert!(matches!(t.store.ping().await, Err(StoreError::Storage(_))));
}
