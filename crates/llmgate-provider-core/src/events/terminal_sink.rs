use std::future::Future;
use std::pin::Pin;

use super::hub::EventSink;
use super::types::{Event, PoolEvent};

/// Sink that forwards operational events to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TerminalEventSink;

impl TerminalEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TerminalEventSink {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match event {
                Event::Pool(PoolEvent::KeyQuarantined {
                    provider,
                    reason,
                    until,
                }) => {
                    tracing::warn!(provider = %provider, ?reason, %until, "credential quarantined");
                }
                Event::Pool(PoolEvent::KeyReactivated { provider }) => {
                    tracing::info!(provider = %provider, "credential back in rotation");
                }
                Event::Pool(PoolEvent::KeyRetired { provider, reason }) => {
                    tracing::warn!(provider = %provider, ?reason, "credential retired");
                }
                Event::Upstream(attempt) => {
                    tracing::debug!(
                        provider = %attempt.provider,
                        profile = %attempt.profile,
                        attempt = attempt.attempt,
                        status = attempt.status,
                        error = attempt.error.as_deref(),
                        "upstream attempt"
                    );
                }
            }
        })
    }
}
