//! SeaOrmStorage 的 UrlStore 实现

mod common;

use chrono::{TimeZone, Utc};

use snaplink::errors::SnaplinkError;
use snaplink::storage::UrlStore;

use common::temp_storage;

#[tokio::test]
async fn test_insert_if_absent_returns_existing_id() {
    let (_dir, storage) = temp_storage().await;

    let first = storage.insert_if_absent("https://example.com/x").await.unwrap();
    let second = storage.insert_if_absent("https://example.com/x").await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(storage.count().await.unwrap(), 1);

    assert_eq!(
        storage.find_id_by_url("https://example.com/x").await.unwrap(),
        Some(first.id)
    );
    assert_eq!(
        storage.find_url_by_id(first.id).await.unwrap().as_deref(),
        Some("https://example.com/x")
    );
    assert_eq!(storage.find_id_by_url("https://example.com/y").await.unwrap(), None);
    assert_eq!(storage.find_url_by_id(first.id + 100).await.unwrap(), None);
}

#[tokio::test]
async fn test_record_click_updates_stats() {
    let (_dir, storage) = temp_storage().await;
    let id = storage
        .insert_if_absent("https://example.com/c")
        .await
        .unwrap()
        .id;

    let stats = storage.fetch_stats(id).await.unwrap().unwrap();
    assert_eq!(stats.total_clicks, 0);
    assert_eq!(stats.last_visited, None);

    let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 1, 2, 12, 30, 0).unwrap();
    storage.record_click(id, t1).await.unwrap();
    storage.record_click(id, t2).await.unwrap();

    let stats = storage.fetch_stats(id).await.unwrap().unwrap();
    assert_eq!(stats.long_url, "https://example.com/c");
    assert_eq!(stats.total_clicks, 2);
    assert_eq!(stats.last_visited, Some(t2));
}

#[tokio::test]
async fn test_record_click_unknown_id_creates_nothing() {
    let (_dir, storage) = temp_storage().await;

    let result = storage.record_click(9_999, Utc::now()).await;
    assert!(matches!(result, Err(SnaplinkError::NotFound(_))));
    assert_eq!(storage.count().await.unwrap(), 0);
    assert!(storage.fetch_stats(9_999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_url_page_walks_all_rows() {
    let (_dir, storage) = temp_storage().await;
    for i in 0..25 {
        storage
            .insert_if_absent(&format!("https://example.com/{}", i))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut after = 0;
    loop {
        let page = storage.load_url_page(after, 10).await.unwrap();
        if page.is_empty() {
            break;
        }
        assert!(page.len() <= 10);
        after = page.last().unwrap().id;
        seen.extend(page.into_iter().map(|e| e.long_url));
    }
    assert_eq!(seen.len(), 25);
    assert_eq!(seen[0], "https://example.com/0");
}

#[tokio::test]
async fn test_ping_and_backend_name() {
    let (_dir, storage) = temp_storage().await;
    storage.ping().await.unwrap();
    assert_eq!(storage.backend_name(), "sqlite");
}
