use std::time::Duration;

use tokio::time::timeout;

use llmgate_provider_core::{Event, EventHub, KeyPool, KeyReason, PoolEvent};

fn secrets(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn acquire_is_fifo_in_seed_order() {
    let pool = KeyPool::new(EventHub::new(16), true, Duration::from_secs(60));
    pool.seed("openai", secrets(&["k1", "k2", "k3"])).await;

    let a = pool.acquire("openai").await.unwrap();
    let b = pool.acquire("openai").await.unwrap();
    assert_eq!(a.secret(), "k1");
    assert_eq!(b.secret(), "k2");

    // Released keys rejoin at the tail, in release order.
    pool.release("openai", &b).await;
    pool.release("openai", &a).await;
    let c = pool.acquire("openai").await.unwrap();
    let d = pool.acquire("openai").await.unwrap();
    let e = pool.acquire("openai").await.unwrap();
    assert_eq!(c.secret(), "k3");
    assert_eq!(d.secret(), "k2");
    assert_eq!(e.secret(), "k1");
    assert!(pool.acquire("openai").await.is_none());
}

#[tokio::test]
async fn release_after_acquire_preserves_multiset() {
    let pool = KeyPool::new(EventHub::new(16), true, Duration::from_secs(60));
    pool.seed("openai", secrets(&["k1", "k2"])).await;

    let key = pool.acquire("openai").await.unwrap();
    pool.release("openai", &key).await;

    let counts = pool.snapshot_provider("openai").await;
    assert_eq!(counts.available, 2);
    assert_eq!(counts.leased, 0);
}

#[tokio::test]
async fn double_release_does_not_duplicate() {
    let pool = KeyPool::new(EventHub::new(16), true, Duration::from_secs(60));
    pool.seed("openai", secrets(&["k1"])).await;

    let key = pool.acquire("openai").await.unwrap();
    pool.release("openai", &key).await;
    pool.release("openai", &key).await;

    assert_eq!(pool.snapshot_provider("openai").await.available, 1);
}

#[tokio::test]
async fn quarantine_expires_via_sweep() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let pool = KeyPool::new(hub.clone(), true, Duration::from_millis(50));
    pool.seed("openai", secrets(&["k1"])).await;

    let key = pool.acquire("openai").await.unwrap();
    pool.quarantine("openai", &key, KeyReason::RateLimit).await;

    let ev = timeout(Duration::from_millis(200), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(ev, Event::Pool(PoolEvent::KeyQuarantined { .. })));
    assert_eq!(pool.snapshot_provider("openai").await.quarantined, 1);

    // Not due yet: a sweep must not release it early.
    pool.sweep_once().await;
    assert_eq!(pool.snapshot_provider("openai").await.available, 0);

    tokio::time::sleep(Duration::from_millis(80)).await;
    pool.sweep_once().await;

    let counts = pool.snapshot_provider("openai").await;
    assert_eq!(counts.available, 1);
    assert_eq!(counts.quarantined, 0);

    let ev = timeout(Duration::from_millis(200), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(ev, Event::Pool(PoolEvent::KeyReactivated { .. })));
}

#[tokio::test]
async fn quarantine_disabled_behaves_as_release() {
    let pool = KeyPool::new(EventHub::new(16), false, Duration::from_secs(60));
    pool.seed("openai", secrets(&["k1", "k2"])).await;

    let key = pool.acquire("openai").await.unwrap();
    pool.quarantine("openai", &key, KeyReason::Upstream5xx).await;

    let counts = pool.snapshot_provider("openai").await;
    assert_eq!(counts.available, 2);
    assert_eq!(counts.quarantined, 0);

    // k1 went to the tail, so k2 comes out first.
    assert_eq!(pool.acquire("openai").await.unwrap().secret(), "k2");
}

#[tokio::test]
async fn retire_is_terminal_and_idempotent() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let pool = KeyPool::new(hub.clone(), true, Duration::from_millis(10));
    pool.seed("openai", secrets(&["k1"])).await;

    let key = pool.acquire("openai").await.unwrap();
    pool.retire("openai", &key, KeyReason::AuthInvalid).await;
    pool.retire("openai", &key, KeyReason::AuthInvalid).await;

    let counts = pool.snapshot_provider("openai").await;
    assert_eq!(counts.retired, 1);
    assert_eq!(counts.available, 0);

    // Quarantining a retired key is a no-op; a sweep must not resurrect it.
    pool.quarantine("openai", &key, KeyReason::RateLimit).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    pool.sweep_once().await;
    let counts = pool.snapshot_provider("openai").await;
    assert_eq!(counts.retired, 1);
    assert_eq!(counts.available, 0);

    let ev = timeout(Duration::from_millis(200), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(ev, Event::Pool(PoolEvent::KeyRetired { .. })));
}

#[tokio::test]
async fn unknown_provider_is_empty() {
    let pool = KeyPool::new(EventHub::new(16), true, Duration::from_secs(60));
    assert!(pool.acquire("nope").await.is_none());
    assert_eq!(pool.snapshot_provider("nope").await.available, 0);
}

#[tokio::test]
async fn seed_from_dir_reads_file_order_and_skips_blanks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("keys_pool_openai.env"),
        "sk-first\n\n   \nsk-second\n",
    )
    .unwrap();

    let pool = KeyPool::new(EventHub::new(16), true, Duration::from_secs(60));
    let loaded = pool
        .seed_from_dir(dir.path(), &["openai".to_string(), "gemini".to_string()])
        .await
        .unwrap();
    assert_eq!(loaded, 2);

    assert_eq!(pool.acquire("openai").await.unwrap().secret(), "sk-first");
    assert_eq!(pool.acquire("openai").await.unwrap().secret(), "sk-second");
    // Provider without a key file is known but empty.
    assert!(pool.snapshot().await.contains_key("gemini"));
    assert!(pool.acquire("gemini").await.is_none());
}
