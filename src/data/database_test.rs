//! Database tests

use super::*;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tempfile::TempDir;

/// Helper to create a test cache database
async fn create_test_store() -> (SqliteCacheStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("profile_cache.db");
    let store = SqliteCacheStore::connect(&db_path).await.unwrap();
    (store, temp_dir)
}

fn sample_payload(username: &str, gift_count: usize) -> ProfilePayload {
    let gifts = (0..gift_count)
        .map(|i| GiftRecord {
            id: i.to_string(),
            slug: Some(format!("plush-pepe-{i}")),
            number: Some(i as i64),
            external_id: None,
            is_upgraded: i % 2 == 0,
            price: Some(12.5),
            preview_url: None,
            external_link: None,
        })
        .collect();

    ProfilePayload {
        gifts,
        profile: ProfileInfo {
            id: Some(42),
            username: username.to_string(),
            display_name: "Test User".to_string(),
            photo_data_url: None,
            decoration_colors: Some(DecorationColors {
                center_color: ColorValue::Rgb(Rgb::new(10, 20, 30)),
                edge_color: ColorValue::Text("#000000".to_string()),
                pattern_color: None,
                text_color: None,
            }),
        },
        total: gift_count as u64,
        nft_count: 0,
        total_value: 99.5,
        decoration_colors: None,
        fetched_at: now_millis(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (store, _temp_dir) = create_test_store().await;
    assert_eq!(store.backend(), "sqlite");
}

#[tokio::test]
async fn test_get_missing_entry() {
    let (store, _temp_dir) = create_test_store().await;
    let key = AccountHandle::parse("nobody").unwrap();

    assert!(store.get(&key).await.is_none());
}

#[tokio::test]
async fn test_set_and_get() {
    let (store, _temp_dir) = create_test_store().await;
    let key = AccountHandle::parse("@Alice").unwrap();
    let payload = sample_payload("alice", 3);

    let updated_at = store.set(&key, &payload).await;

    let entry = store.get(&key).await.unwrap();
    assert_eq!(entry.key, key);
    assert_eq!(entry.updated_at, updated_at);
    assert_eq!(entry.payload, payload);
}

#[tokio::test]
async fn test_set_overwrites_in_place() {
    let (store, _temp_dir) = create_test_store().await;
    let key = AccountHandle::parse("alice").unwrap();

    let first = store.set(&key, &sample_payload("alice", 3)).await;
    let second = store.set(&key, &sample_payload("alice", 7)).await;
    assert!(second >= first);

    let entry = store.get(&key).await.unwrap();
    assert_eq!(entry.payload.gifts.len(), 7);
    assert_eq!(entry.updated_at, second);
}

#[tokio::test]
async fn test_entries_are_keyed_per_account() {
    let (store, _temp_dir) = create_test_store().await;
    let alice = AccountHandle::parse("alice").unwrap();
    let bob = AccountHandle::parse("bob").unwrap();

    store.set(&alice, &sample_payload("alice", 1)).await;
    store.set(&bob, &sample_payload("bob", 2)).await;

    assert_eq!(store.get(&alice).await.unwrap().payload.gifts.len(), 1);
    assert_eq!(store.get(&bob).await.unwrap().payload.gifts.len(), 2);
}

#[tokio::test]
async fn test_reopen_keeps_entries() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("profile_cache.db");
    let key = AccountHandle::parse("alice").unwrap();

    {
        let store = SqliteCacheStore::connect(&db_path).await.unwrap();
        store.set(&key, &sample_payload("alice", 2)).await;
    }

    let store = SqliteCacheStore::connect(&db_path).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().payload.gifts.len(), 2);
}

/// Second connection to the store's file, for tampering with its rows
async fn side_pool(temp_dir: &TempDir) -> SqlitePool {
    let db_path = temp_dir.path().join("data").join("profile_cache.db");
    SqlitePool::connect_with(SqliteConnectOptions::new().filename(db_path))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_unreadable_payload_reads_as_miss() {
    let (store, temp_dir) = create_test_store().await;
    let key = AccountHandle::parse("alice").unwrap();

    let pool = side_pool(&temp_dir).await;
    sqlx::query("INSERT INTO profile_cache (profile, payload, updated_at) VALUES (?, ?, ?)")
        .bind(key.as_str())
        .bind("{not json")
        .bind(1_i64)
        .execute(&pool)
        .await
        .unwrap();

    assert!(store.get(&key).await.is_none());
}

#[tokio::test]
async fn test_failed_write_still_returns_timestamp() {
    let (store, temp_dir) = create_test_store().await;
    let key = AccountHandle::parse("alice").unwrap();

    let pool = side_pool(&temp_dir).await;
    sqlx::query("DROP TABLE profile_cache")
        .execute(&pool)
        .await
        .unwrap();

    let before = now_millis();
    let updated_at = store.set(&key, &sample_payload("alice", 1)).await;
    assert!(updated_at >= before);
    assert!(store.get(&key).await.is_none());
}
