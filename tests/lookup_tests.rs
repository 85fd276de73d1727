//! 缩短 / 跳转的端到端行为

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use snaplink::analytics::ClickPublisher;
use snaplink::cache::{BloomExistenceFilter, ExistenceFilter, HotCache};
use snaplink::codec;
use snaplink::errors::SnaplinkError;
use snaplink::services::LinkService;
use snaplink::storage::UrlStore;
use snaplink::utils::StandardUrlSafety;

use common::{hot_cache, link_service, memory_kv, temp_storage};

#[tokio::test]
async fn test_shorten_resolve_scenario() {
    let (_dir, storage) = temp_storage().await;
    let service = link_service(storage, ClickPublisher::disabled());
    service.populate_filter().await.unwrap();

    let c1 = service.shorten("https://example.com/a").await.unwrap().code;
    let again = service.shorten("https://example.com/a").await.unwrap().code;
    assert_eq!(c1, again);

    assert_eq!(service.resolve(&c1).await.unwrap(), "https://example.com/a");
    assert!(matches!(
        service.resolve("not-a-real-code").await,
        Err(SnaplinkError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_distinct_urls_get_distinct_codes() {
    let (_dir, storage) = temp_storage().await;
    let service = link_service(storage, ClickPublisher::disabled());

    let mut codes = HashSet::new();
    for i in 0..50 {
        let outcome = service
            .shorten(&format!("https://example.com/page/{}", i))
            .await
            .unwrap();
        assert!(outcome.created);
        assert_eq!(codec::decode(&outcome.code).unwrap(), outcome.id);
        assert!(codes.insert(outcome.code));
    }
}

#[tokio::test]
async fn test_concurrent_shorten_converges_to_one_row() {
    let (_dir, storage) = temp_storage().await;
    let service = Arc::new(link_service(storage.clone(), ClickPublisher::disabled()));
    service.populate_filter().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.shorten("https://example.com/race").await.unwrap()
        }));
    }

    let mut codes = HashSet::new();
    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.created {
            created += 1;
        }
        codes.insert(outcome.code);
    }

    assert_eq!(codes.len(), 1);
    assert_eq!(created, 1);
    assert_eq!(storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_resolve_backfills_cache_from_store() {
    let (_dir, storage) = temp_storage().await;
    // 绕过服务直接写库，缓存里没有这条映射
    let inserted = storage
        .insert_if_absent("https://example.com/cold")
        .await
        .unwrap();
    let code = codec::encode(inserted.id);

    let cache = hot_cache(memory_kv());
    let service = LinkService::new(
        storage,
        Arc::new(BloomExistenceFilter::new(1000, 0.01).unwrap()),
        Arc::clone(&cache),
        Arc::new(StandardUrlSafety::offline()),
        ClickPublisher::disabled(),
    );

    assert!(cache.get_url(&code).await.is_none());
    assert_eq!(
        service.resolve(&code).await.unwrap(),
        "https://example.com/cold"
    );
    assert_eq!(
        cache.get_url(&code).await.as_deref(),
        Some("https://example.com/cold")
    );
}

#[tokio::test]
async fn test_filter_has_no_false_negatives_after_populate() {
    let (_dir, storage) = temp_storage().await;
    let urls: Vec<String> = (0..2500)
        .map(|i| format!("https://example.com/item/{}", i))
        .collect();
    for url in &urls {
        storage.insert_if_absent(url).await.unwrap();
    }

    // 配置容量远小于实际数量，只会提高误判率
    let filter = BloomExistenceFilter::new(100, 0.01).unwrap();
    assert!(!filter.is_ready());
    let loaded = filter.populate(storage.as_ref()).await.unwrap();
    assert_eq!(loaded, urls.len());
    assert!(filter.is_ready());

    for url in &urls {
        assert!(filter.check(url).await, "false negative for {}", url);
    }
}

#[tokio::test]
async fn test_unpopulated_filter_never_hides_existing_urls() {
    let (_dir, storage) = temp_storage().await;
    storage
        .insert_if_absent("https://example.com/existing")
        .await
        .unwrap();

    // 过滤器还没 populate，必须放行到缓存 / 存储
    let service = LinkService::new(
        storage.clone(),
        Arc::new(BloomExistenceFilter::new(1000, 0.01).unwrap()),
        Arc::new(HotCache::new(
            memory_kv(),
            Duration::from_secs(60),
            Duration::from_millis(100),
        )),
        Arc::new(StandardUrlSafety::offline()),
        ClickPublisher::disabled(),
    );
    let outcome = service.shorten("https://example.com/existing").await.unwrap();
    assert!(!outcome.created);
    assert_eq!(storage.count().await.unwrap(), 1);
}
