use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Why a credential left the available list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyReason {
    RateLimit,
    Upstream5xx,
    AuthInvalid,
    Network,
}

/// A credential checked out of the pool.
///
/// The secret is reachable only through `secret()`; `Debug` shows a
/// redacted form so these can ride through tracing fields safely.
#[derive(Clone, PartialEq, Eq)]
pub struct PooledKey {
    secret: Arc<str>,
}

impl PooledKey {
    pub(crate) fn new(secret: Arc<str>) -> Self {
        Self { secret }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub(crate) fn raw(&self) -> &Arc<str> {
        &self.secret
    }
}

impl fmt::Debug for PooledKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .secret
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "PooledKey(****{tail})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let key = PooledKey::new(Arc::from("sk-verysecret1234"));
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "PooledKey(****1234)");
        assert!(!rendered.contains("verysecret"));
    }
}
