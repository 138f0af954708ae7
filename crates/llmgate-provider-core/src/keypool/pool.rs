use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::events::{Event, EventHub, PoolEvent};

use super::state::{KeyReason, PooledKey};

/// How often expired quarantines are scanned back into rotation.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct QuarantinedKey {
    secret: Arc<str>,
    until: Instant,
    since: OffsetDateTime,
    reason: KeyReason,
}

#[derive(Debug)]
struct RetiredKey {
    secret: Arc<str>,
    #[allow(dead_code)]
    since: OffsetDateTime,
    #[allow(dead_code)]
    reason: KeyReason,
}

#[derive(Debug, Default)]
struct ProviderKeys {
    available: VecDeque<Arc<str>>,
    leased: Vec<Arc<str>>,
    quarantined: Vec<QuarantinedKey>,
    retired: Vec<RetiredKey>,
}

impl ProviderKeys {
    fn remove_leased(&mut self, secret: &Arc<str>) -> bool {
        if let Some(pos) = self.leased.iter().position(|s| s == secret) {
            self.leased.remove(pos);
            return true;
        }
        false
    }

    fn remove_available(&mut self, secret: &Arc<str>) -> bool {
        if let Some(pos) = self.available.iter().position(|s| s == secret) {
            self.available.remove(pos);
            return true;
        }
        false
    }

    fn remove_quarantined(&mut self, secret: &Arc<str>) -> bool {
        if let Some(pos) = self.quarantined.iter().position(|q| &q.secret == secret) {
            self.quarantined.remove(pos);
            return true;
        }
        false
    }

    fn is_retired(&self, secret: &Arc<str>) -> bool {
        self.retired.iter().any(|r| &r.secret == secret)
    }

    fn counts(&self) -> PoolCounts {
        PoolCounts {
            available: self.available.len(),
            leased: self.leased.len(),
            quarantined: self.quarantined.len(),
            retired: self.retired.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounts {
    pub available: usize,
    pub leased: usize,
    pub quarantined: usize,
    pub retired: usize,
}

/// Self-healing credential pool: available (FIFO) / quarantined (timed) /
/// retired (terminal) buckets per provider tag.
///
/// The pool is the sole mutator of credential state; callers only ever hold
/// a `PooledKey` lease. The pool itself never fails; exhaustion surfaces
/// as `acquire` returning `None`.
pub struct KeyPool {
    providers: RwLock<HashMap<String, ProviderKeys>>,
    events: EventHub,
    quarantine_enabled: bool,
    quarantine_for: Duration,
}

impl KeyPool {
    /// Build the pool and, when quarantine is enabled, start the sweep task.
    /// Must be called from within a tokio runtime.
    pub fn new(events: EventHub, quarantine_enabled: bool, quarantine_for: Duration) -> Arc<Self> {
        let pool = Arc::new(Self {
            providers: RwLock::new(HashMap::new()),
            events,
            quarantine_enabled,
            quarantine_for,
        });
        if quarantine_enabled {
            pool.clone().spawn_sweep_task();
        }
        pool
    }

    pub async fn seed(&self, provider: &str, secrets: impl IntoIterator<Item = String>) {
        let mut guard = self.providers.write().await;
        let keys = guard.entry(provider.to_string()).or_default();
        for secret in secrets {
            let secret: Arc<str> = Arc::from(secret.as_str());
            let known = keys.available.contains(&secret)
                || keys.leased.contains(&secret)
                || keys.quarantined.iter().any(|q| q.secret == secret)
                || keys.is_retired(&secret);
            if !known {
                keys.available.push_back(secret);
            }
        }
    }

    /// Load `keys_pool_<provider>.env` files from `dir`, one secret per
    /// line, seeding available FIFO in file order. Missing files leave the
    /// provider with an empty pool. Returns the number of secrets loaded.
    pub async fn seed_from_dir(
        &self,
        dir: impl AsRef<Path>,
        providers: &[String],
    ) -> std::io::Result<usize> {
        let mut loaded = 0;
        for provider in providers {
            let path = dir.as_ref().join(format!("keys_pool_{provider}.env"));
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(provider = %provider, path = %path.display(), "no key file for provider");
                    // Register the provider so snapshots show it.
                    self.providers
                        .write()
                        .await
                        .entry(provider.clone())
                        .or_default();
                    continue;
                }
                Err(err) => return Err(err),
            };
            let secrets: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            loaded += secrets.len();
            tracing::info!(provider = %provider, count = secrets.len(), "seeded credential pool");
            self.seed(provider, secrets).await;
        }
        Ok(loaded)
    }

    /// Remove and return the head of the provider's available list.
    pub async fn acquire(&self, provider: &str) -> Option<PooledKey> {
        let mut guard = self.providers.write().await;
        let keys = guard.get_mut(provider)?;
        let secret = keys.available.pop_front()?;
        keys.leased.push(secret.clone());
        Some(PooledKey::new(secret))
    }

    /// Return a leased credential to the tail of available. Unknown
    /// credentials and credentials already resting in a bucket are ignored.
    pub async fn release(&self, provider: &str, key: &PooledKey) {
        let mut guard = self.providers.write().await;
        let Some(keys) = guard.get_mut(provider) else {
            return;
        };
        if keys.remove_leased(key.raw()) {
            keys.available.push_back(key.raw().clone());
        }
    }

    /// Move a credential into timed isolation. With quarantine disabled this
    /// is observationally `release`.
    pub async fn quarantine(&self, provider: &str, key: &PooledKey, reason: KeyReason) {
        if !self.quarantine_enabled {
            self.release(provider, key).await;
            return;
        }

        let until = Instant::now() + self.quarantine_for;
        let until_wall = OffsetDateTime::now_utc() + self.quarantine_for;
        let quarantined = {
            let mut guard = self.providers.write().await;
            let Some(keys) = guard.get_mut(provider) else {
                return;
            };
            if keys.is_retired(key.raw()) {
                false
            } else if keys.remove_leased(key.raw()) || keys.remove_available(key.raw()) {
                keys.quarantined.push(QuarantinedKey {
                    secret: key.raw().clone(),
                    until,
                    since: OffsetDateTime::now_utc(),
                    reason,
                });
                true
            } else if let Some(entry) =
                keys.quarantined.iter_mut().find(|q| &q.secret == key.raw())
            {
                // Re-quarantine extends the isolation window.
                entry.until = until;
                entry.reason = reason;
                true
            } else {
                false
            }
        };

        if quarantined {
            self.events
                .emit(Event::Pool(PoolEvent::KeyQuarantined {
                    provider: provider.to_string(),
                    reason,
                    until: until_wall,
                }))
                .await;
        }
    }

    /// Permanently remove a credential from rotation. Idempotent.
    pub async fn retire(&self, provider: &str, key: &PooledKey, reason: KeyReason) {
        let retired = {
            let mut guard = self.providers.write().await;
            let Some(keys) = guard.get_mut(provider) else {
                return;
            };
            if keys.is_retired(key.raw()) {
                false
            } else {
                keys.remove_leased(key.raw());
                keys.remove_available(key.raw());
                keys.remove_quarantined(key.raw());
                keys.retired.push(RetiredKey {
                    secret: key.raw().clone(),
                    since: OffsetDateTime::now_utc(),
                    reason,
                });
                true
            }
        };

        if retired {
            self.events
                .emit(Event::Pool(PoolEvent::KeyRetired {
                    provider: provider.to_string(),
                    reason,
                }))
                .await;
        }
    }

    pub async fn snapshot(&self) -> BTreeMap<String, PoolCounts> {
        let guard = self.providers.read().await;
        guard
            .iter()
            .map(|(provider, keys)| (provider.clone(), keys.counts()))
            .collect()
    }

    pub async fn snapshot_provider(&self, provider: &str) -> PoolCounts {
        let guard = self.providers.read().await;
        guard
            .get(provider)
            .map(ProviderKeys::counts)
            .unwrap_or_default()
    }

    /// One sweep pass: quarantined credentials whose window has elapsed go
    /// back to the available tail, oldest expiry first.
    pub async fn sweep_once(&self) {
        let now = Instant::now();
        let mut reactivated: Vec<String> = Vec::new();
        {
            let mut guard = self.providers.write().await;
            for (provider, keys) in guard.iter_mut() {
                let mut due: Vec<QuarantinedKey> = Vec::new();
                let mut still = Vec::new();
                for entry in keys.quarantined.drain(..) {
                    if entry.until <= now {
                        due.push(entry);
                    } else {
                        still.push(entry);
                    }
                }
                keys.quarantined = still;
                due.sort_by_key(|entry| entry.since);
                for entry in due {
                    tracing::debug!(provider = %provider, reason = ?entry.reason, "quarantine expired");
                    keys.available.push_back(entry.secret);
                    reactivated.push(provider.clone());
                }
            }
        }
        for provider in reactivated {
            self.events
                .emit(Event::Pool(PoolEvent::KeyReactivated { provider }))
                .await;
        }
    }

    fn spawn_sweep_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        });
    }
}
