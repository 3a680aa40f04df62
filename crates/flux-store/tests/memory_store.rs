//! Behavioural tests for the in-memory store through the `Store` trait.

use flux_store::{MemoryStore, Store, keys};

#[tokio::test]
async fn test_sadd_reports_first_insert_only() {
    let store = MemoryStore::new();
    let badges = keys::user_badges(4);

    assert!(store.sadd(&badges, "theOcho").await.unwrap());
    assert!(!store.sadd(&badges, "theOcho").await.unwrap());
    assert_eq!(store.smembers(&badges).await.unwrap(), vec!["theOcho"]);
}

#[tokio::test]
async fn test_sunionstore_merges_into_destination() {
    let store = MemoryStore::new();
    store.sadd("team:1:users", "1").await.unwrap();
    store.sadd("team:1:users", "2").await.unwrap();
    store.sadd("team:2:users", "3").await.unwrap();

    let size = store
        .sunionstore("team:1:users", &["team:1:users", "team:2:users"])
        .await
        .unwrap();

    assert_eq!(size, 3);
    assert_eq!(
        store.smembers("team:1:users").await.unwrap(),
        vec!["1", "2", "3"]
    );
    // Sources other than the destination are left alone.
    assert_eq!(store.smembers("team:2:users").await.unwrap(), vec!["3"]);
}

#[tokio::test]
async fn test_zrangebyscore_is_inclusive_and_ordered() {
    let store = MemoryStore::new();
    store.zadd(keys::CLIENTS, "7", 100).await.unwrap();
    store.zadd(keys::CLIENTS, "3", 90).await.unwrap();
    store.zadd(keys::CLIENTS, "9", 120).await.unwrap();

    let stale = store.zrangebyscore(keys::CLIENTS, 0, 100).await.unwrap();
    assert_eq!(stale, vec!["3", "7"]);
}

#[tokio::test]
async fn test_zadd_rescores_existing_member() {
    let store = MemoryStore::new();
    store.zadd(keys::CLIENTS, "7", 10).await.unwrap();
    store.zadd(keys::CLIENTS, "7", 500).await.unwrap();

    assert!(store.zrangebyscore(keys::CLIENTS, 0, 100).await.unwrap().is_empty());
    assert!(store.zrem(keys::CLIENTS, "7").await.unwrap());
    assert!(!store.zrem(keys::CLIENTS, "7").await.unwrap());
}

#[tokio::test]
async fn test_clones_share_data() {
    let store = MemoryStore::new();
    let other = store.clone();

    store.set(&keys::user_name(1), "ada").await.unwrap();
    assert_eq!(
        other.get(&keys::user_name(1)).await.unwrap().as_deref(),
        Some("ada")
    );
    assert!(other.del(&keys::user_name(1)).await.unwrap());
    assert_eq!(store.get(&keys::user_name(1)).await.unwrap(), None);
}
