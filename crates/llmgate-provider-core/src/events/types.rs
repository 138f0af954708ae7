use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::keypool::KeyReason;

/// Operational events emitted by the gateway runtime. These are internal
/// observability events, distinct from the session-scoped agent events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Pool(PoolEvent),
    Upstream(UpstreamAttemptEvent),
}

/// Credential lifecycle transitions. The secret itself never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolEvent {
    KeyQuarantined {
        provider: String,
        reason: KeyReason,
        until: OffsetDateTime,
    },
    KeyReactivated {
        provider: String,
    },
    KeyRetired {
        provider: String,
        reason: KeyReason,
    },
}

/// One upstream call attempt, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamAttemptEvent {
    pub at: OffsetDateTime,
    pub trace_id: Option<String>,
    pub provider: String,
    pub profile: String,
    pub attempt: u32,
    pub status: Option<u16>,
    pub error: Option<String>,
}
