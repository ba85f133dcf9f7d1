use crate::error::StorageError;
use crate::store::WorkerStore;
use apiserver_common::types::WorkerPayload;
use tempfile::TempDir;

async fn setup() -> (TempDir, WorkerStore) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("workers.db").display());
    let store = WorkerStore::connect(&url, chrono_tz::Asia::Dhaka, false)
        .await
        .unwrap();
    store.ensure_schema().await.unwrap();
    (dir, store)
}

fn payload(username: &str) -> WorkerPayload {
    WorkerPayload {
        username: username.to_string(),
        first_name: "Masudur".to_string(),
        last_name: "Rahman".to_string(),
        city: "Madaripur".to_string(),
        division: "Dhaka".to_string(),
        position: "Software Engineer".to_string(),
        salary: 55,
    }
}

#[tokio::test]
async fn ensure_schema_creates_table_once() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("fresh.db").display());
    let store = WorkerStore::connect(&url, chrono_tz::UTC, false)
        .await
        .unwrap();

    assert!(!store.table_exists().await.unwrap());
    store.ensure_schema().await.unwrap();
    assert!(store.table_exists().await.unwrap());
    // Second run is a no-op.
    store.ensure_schema().await.unwrap();
    assert!(store.table_exists().await.unwrap());
}

#[tokio::test]
async fn connect_to_unreachable_database_is_a_connection_error() {
    let err = WorkerStore::connect(
        "sqlite:///nonexistent-dir/definitely/missing.db?mode=ro",
        chrono_tz::UTC,
        false,
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(err, StorageError::Connection(_)));
}

#[tokio::test]
async fn create_then_get_returns_same_attributes() {
    let (_dir, store) = setup().await;

    let created = store.create_worker(&payload("masud")).await.unwrap();
    assert_eq!(created.version, 1);
    assert!(created.deleted_at.is_none());

    let fetched = store.get_worker("masud").await.unwrap();
    assert_eq!(WorkerPayload::from(&fetched), payload("masud"));
    assert_eq!(fetched.version, 1);
    assert!(fetched.created_at <= fetched.updated_at);
    // Reported in the configured timezone (UTC+06:00).
    assert_eq!(fetched.created_at.offset().local_minus_utc(), 6 * 3600);
}

#[tokio::test]
async fn get_unknown_worker_is_not_found() {
    let (_dir, store) = setup().await;
    let err = store.get_worker("abcd").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn create_rejects_blank_username() {
    let (_dir, store) = setup().await;
    let err = store.create_worker(&payload("  ")).await.unwrap_err();
    assert!(matches!(err, StorageError::BlankUsername));
}

#[tokio::test]
async fn create_rejects_live_duplicate() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("masud")).await.unwrap();

    let err = store.create_worker(&payload("masud")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));
}

#[tokio::test]
async fn create_rejects_soft_deleted_username() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("fahim")).await.unwrap();
    store.delete_worker("fahim").await.unwrap();

    let err = store.create_worker(&payload("fahim")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));
}

#[tokio::test]
async fn update_overwrites_mutable_fields_and_bumps_version() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("tahsin")).await.unwrap();

    let mut change = payload("tahsin");
    change.first_name = "Tahsin".to_string();
    change.city = "Chittagong".to_string();
    change.division = "Chittagong".to_string();
    change.salary = 70;
    change.position = "Manager".to_string();

    let updated = store.update_worker("tahsin", &change).await.unwrap();
    assert_eq!(updated.first_name, "Tahsin");
    assert_eq!(updated.city, "Chittagong");
    assert_eq!(updated.salary, 70);
    // Position is not updatable.
    assert_eq!(updated.position, "Software Engineer");
    assert_eq!(updated.version, 2);

    let again = store.update_worker("tahsin", &change).await.unwrap();
    assert_eq!(again.version, 3);
}

#[tokio::test]
async fn update_with_different_username_is_rejected() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("jenny")).await.unwrap();

    let err = store
        .update_worker("jenny", &payload("someone-else"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UsernameChanged { .. }));

    // Even a blank username counts as a change.
    let err = store.update_worker("jenny", &payload("")).await.unwrap_err();
    assert!(matches!(err, StorageError::UsernameChanged { .. }));

    let untouched = store.get_worker("jenny").await.unwrap();
    assert_eq!(untouched.version, 1);
}

#[tokio::test]
async fn update_unknown_worker_is_not_found() {
    let (_dir, store) = setup().await;
    let err = store
        .update_worker("ghost", &payload("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn delete_hides_worker_but_unscoped_lookup_still_finds_it() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("masud")).await.unwrap();

    store.delete_worker("masud").await.unwrap();

    let err = store.get_worker("masud").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    let unscoped = store.find_worker_unscoped("masud").await.unwrap().unwrap();
    assert!(unscoped.is_deleted());

    // Deleting twice reports the record as gone.
    let err = store.delete_worker("masud").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    // Deleted workers cannot be updated either.
    let err = store
        .update_worker("masud", &payload("masud"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn list_returns_only_live_workers() {
    let (_dir, store) = setup().await;
    for name in ["a", "b", "c", "d", "e"] {
        store.create_worker(&payload(name)).await.unwrap();
    }
    store.delete_worker("b").await.unwrap();
    store.delete_worker("d").await.unwrap();

    let workers = store.list_workers().await.unwrap();
    let mut names: Vec<_> = workers.iter().map(|w| w.username.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "c", "e"]);
    assert!(workers.iter().all(|w| !w.is_deleted()));
}

#[tokio::test]
async fn seed_skips_existing_and_deleted_usernames() {
    let (_dir, store) = setup().await;
    store.create_worker(&payload("masud")).await.unwrap();
    store.create_worker(&payload("jenny")).await.unwrap();
    store.delete_worker("jenny").await.unwrap();

    let seeds = vec![payload("masud"), payload("fahim"), payload("jenny")];
    let inserted = store.seed_workers(&seeds).await.unwrap();
    assert_eq!(inserted, 1);

    // Idempotent on a second run.
    assert_eq!(store.seed_workers(&seeds).await.unwrap(), 0);
    assert_eq!(store.list_workers().await.unwrap().len(), 2);
}

#[tokio::test]
async fn close_releases_the_pool() {
    let (_dir, store) = setup().await;
    store.close().await.unwrap();
    assert!(store.list_workers().await.is_err());
}
