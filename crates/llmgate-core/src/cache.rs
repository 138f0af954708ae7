use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::{Instant, sleep_until};

/// Fingerprint for a cacheable request: SHA-256 over a canonical JSON
/// encoding of the upstream model name plus the selected request fields.
/// Canonical means every object is rebuilt with sorted keys, so the hash
/// does not depend on field insertion order.
pub fn fingerprint(internal_model: &str, body: &Value, include_fields: &[String]) -> String {
    let mut selected = Map::new();
    selected.insert(
        "model".to_string(),
        Value::String(internal_model.to_string()),
    );
    for field in include_fields {
        if let Some(value) = body.get(field) {
            selected.insert(field.clone(), value.clone());
        }
    }
    let canonical = canonicalize(&Value::Object(selected));
    let encoded = serde_json::to_vec(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

struct CacheEntry {
    body: Bytes,
    expires: Instant,
}

/// In-process content-addressed response cache with per-entry TTL.
///
/// Expiry uses a deadline heap drained by a background task, so lookups
/// never pay a scan; a lookup still checks the deadline to stay correct
/// between sweeps.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    deadlines: Mutex<BinaryHeap<Reverse<(Instant, String)>>>,
    notify: Notify,
}

impl ResponseCache {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Arc<Self> {
        let cache = Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            deadlines: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
        });
        cache.clone().spawn_expiry_task();
        cache
    }

    pub async fn lookup(&self, key: &str) -> Option<Bytes> {
        let guard = self.entries.read().await;
        let entry = guard.get(key)?;
        if entry.expires <= Instant::now() {
            return None;
        }
        Some(entry.body.clone())
    }

    pub async fn store(&self, key: String, body: Bytes, ttl: Duration) {
        let expires = Instant::now() + ttl;
        {
            let mut guard = self.entries.write().await;
            guard.insert(key.clone(), CacheEntry { body, expires });
        }
        {
            let mut heap = self.deadlines.lock().await;
            heap.push(Reverse((expires, key)));
        }
        // Always notify: the background task re-computes the next deadline.
        self.notify.notify_one();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn spawn_expiry_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let next = {
                    let heap = self.deadlines.lock().await;
                    heap.peek().map(|Reverse((t, _))| *t)
                };

                match next {
                    None => {
                        self.notify.notified().await;
                        continue;
                    }
                    Some(deadline) => {
                        sleep_until(deadline).await;
                    }
                }

                let now = Instant::now();
                let mut due: Vec<String> = Vec::new();
                {
                    let mut heap = self.deadlines.lock().await;
                    loop {
                        let expired = matches!(heap.peek(), Some(Reverse((t, _))) if *t <= now);
                        if !expired {
                            break;
                        }
                        if let Some(Reverse((_, key))) = heap.pop() {
                            due.push(key);
                        }
                    }
                }

                if due.is_empty() {
                    continue;
                }

                // Guard against stale heap entries from an overwrite with a
                // later deadline.
                let mut guard = self.entries.write().await;
                for key in due {
                    if let Some(entry) = guard.get(&key)
                        && entry.expires <= now
                    {
                        guard.remove(&key);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_deterministic() {
        let body = json!({ "messages": [{"role": "user", "content": "hi"}], "temperature": 0.1 });
        let include = vec!["messages".to_string(), "temperature".to_string()];
        assert_eq!(
            fingerprint("gpt-4o", &body, &include),
            fingerprint("gpt-4o", &body, &include)
        );
    }

    #[test]
    fn fingerprint_ignores_key_insertion_order() {
        let a = json!({ "temperature": 0.1, "messages": "x" });
        let b = json!({ "messages": "x", "temperature": 0.1 });
        let include = vec!["messages".to_string(), "temperature".to_string()];
        assert_eq!(
            fingerprint("gpt-4o", &a, &include),
            fingerprint("gpt-4o", &b, &include)
        );
    }

    #[test]
    fn fingerprint_depends_on_model_and_selected_fields() {
        let body = json!({ "messages": "x", "temperature": 0.1, "user": "u1" });
        let narrow = vec!["messages".to_string()];
        let wide = vec!["messages".to_string(), "temperature".to_string()];
        assert_ne!(
            fingerprint("gpt-4o", &body, &narrow),
            fingerprint("gpt-4o", &body, &wide)
        );
        assert_ne!(
            fingerprint("gpt-4o", &body, &narrow),
            fingerprint("gpt-4o-mini", &body, &narrow)
        );
        // Fields outside the rule never contribute.
        let mut altered = body.clone();
        altered["user"] = json!("u2");
        assert_eq!(
            fingerprint("gpt-4o", &body, &wide),
            fingerprint("gpt-4o", &altered, &wide)
        );
    }

    #[tokio::test]
    async fn store_then_lookup_roundtrips() {
        let cache = ResponseCache::new();
        cache
            .store("k1".into(), Bytes::from_static(b"{\"ok\":1}"), Duration::from_secs(60))
            .await;
        assert_eq!(
            cache.lookup("k1").await,
            Some(Bytes::from_static(b"{\"ok\":1}"))
        );
        assert_eq!(cache.lookup("missing").await, None);
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let cache = ResponseCache::new();
        cache
            .store("k1".into(), Bytes::from_static(b"x"), Duration::from_millis(20))
            .await;
        assert!(cache.lookup("k1").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.lookup("k1").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn overwrite_with_longer_ttl_survives_first_deadline() {
        let cache = ResponseCache::new();
        cache
            .store("k1".into(), Bytes::from_static(b"a"), Duration::from_millis(20))
            .await;
        cache
            .store("k1".into(), Bytes::from_static(b"b"), Duration::from_millis(200))
            .await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.lookup("k1").await, Some(Bytes::from_static(b"b")));
    }
}
