//! 跳转 → 发布 → consumer → 存储 的完整链路

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use snaplink::analytics::{ClickConsumer, ClickEvent, ClickPublisher, ClickTransport, LocalClickTransport};
use snaplink::runtime::lifetime::ShutdownTrigger;
use snaplink::storage::UrlStore;

use common::{link_service, temp_storage};

const CHANNEL: &str = "click_events";

/// 轮询直到点击数达到期望值
async fn wait_for_clicks(store: &dyn UrlStore, id: u64, expected: u64) -> u64 {
    for _ in 0..100 {
        let total = store.fetch_stats(id).await.unwrap().unwrap().total_clicks;
        if total >= expected {
            return total;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    store.fetch_stats(id).await.unwrap().unwrap().total_clicks
}

#[tokio::test]
async fn test_consumer_applies_published_event() {
    let (_dir, storage) = temp_storage().await;
    let id = storage.insert_if_absent("https://example.com/x").await.unwrap().id;

    let transport = Arc::new(LocalClickTransport::default());
    let consumer = ClickConsumer::new(
        transport.clone(),
        storage.clone(),
        CHANNEL,
        Duration::from_secs(5),
    );
    let stream = consumer.subscribe().await.unwrap();
    let trigger = ShutdownTrigger::new();
    let handle = tokio::spawn(consumer.run_stream(stream, trigger.wait()));

    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    transport
        .publish(CHANNEL, ClickEvent::new(id, at).to_payload().unwrap())
        .await
        .unwrap();

    assert_eq!(wait_for_clicks(storage.as_ref(), id, 1).await, 1);
    let stats = storage.fetch_stats(id).await.unwrap().unwrap();
    assert_eq!(stats.last_visited, Some(at));

    trigger.trigger();
    let report = handle.await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.aborted, 0);
}

#[tokio::test]
async fn test_unknown_and_malformed_events_change_nothing() {
    let (_dir, storage) = temp_storage().await;
    let id = storage.insert_if_absent("https://example.com/y").await.unwrap().id;

    let transport = Arc::new(LocalClickTransport::default());
    let consumer = ClickConsumer::new(
        transport.clone(),
        storage.clone(),
        CHANNEL,
        Duration::from_secs(5),
    );
    let stream = consumer.subscribe().await.unwrap();
    let trigger = ShutdownTrigger::new();
    let handle = tokio::spawn(consumer.run_stream(stream, trigger.wait()));

    transport
        .publish(CHANNEL, ClickEvent::now(id + 1000).to_payload().unwrap())
        .await
        .unwrap();
    transport
        .publish(CHANNEL, "definitely not json".to_string())
        .await
        .unwrap();
    // 作为屏障：它被处理后前两条也已被接收
    transport
        .publish(CHANNEL, ClickEvent::now(id).to_payload().unwrap())
        .await
        .unwrap();

    assert_eq!(wait_for_clicks(storage.as_ref(), id, 1).await, 1);
    trigger.trigger();
    let report = handle.await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.unknown, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.failed, 0);
    assert!(storage.find_url_by_id(id + 1000).await.unwrap().is_none());
    assert_eq!(storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_redirects_are_counted_through_pubsub() {
    let (_dir, storage) = temp_storage().await;
    let transport = Arc::new(LocalClickTransport::default());

    let consumer = ClickConsumer::new(
        transport.clone(),
        storage.clone(),
        CHANNEL,
        Duration::from_secs(5),
    );
    let stream = consumer.subscribe().await.unwrap();
    let trigger = ShutdownTrigger::new();
    let handle = tokio::spawn(consumer.run_stream(stream, trigger.wait()));

    let service = link_service(
        storage.clone(),
        ClickPublisher::pubsub(transport.clone(), CHANNEL, Duration::from_secs(1)),
    );
    let outcome = service.shorten("https://example.com/counted").await.unwrap();

    for _ in 0..5 {
        service.resolve(&outcome.code).await.unwrap();
    }
    // preview 不计数
    service.preview(&outcome.code).await.unwrap();

    assert_eq!(wait_for_clicks(storage.as_ref(), outcome.id, 5).await, 5);
    let stats = service.stats(&outcome.code).await.unwrap();
    assert_eq!(stats.total_clicks, 5);
    assert!(stats.last_visited.is_some());

    trigger.trigger();
    let report = handle.await.unwrap();
    assert_eq!(report.processed, 5);
}

#[tokio::test]
async fn test_shutdown_without_traffic_returns_empty_report() {
    let (_dir, storage) = temp_storage().await;
    let transport = Arc::new(LocalClickTransport::default());
    let consumer = ClickConsumer::new(transport, storage, CHANNEL, Duration::from_secs(1));

    let trigger = ShutdownTrigger::new();
    let handle = tokio::spawn(consumer.run(trigger.wait()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();

    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report, Default::default());
}
