use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;

use llmgate_common::ModelProfile;
use llmgate_provider_core::{
    AdapterError, AdapterRegistry, CallCtx, Event, EventHub, GatewayRequest, KeyPool, KeyReason,
    PooledKey, ProviderAdapter, UpstreamAttemptEvent, UpstreamBody, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse,
};

use crate::classify::{FailureClass, classify_failure, failure_reason};
use crate::upstream_client::UpstreamClient;

#[derive(Debug)]
pub enum ExecuteError {
    /// Every credential for this provider was consumed without a success.
    Exhausted,
    /// The request content is at fault; surfaced to the caller unretried.
    RequestRejected { status: u16, body: Bytes },
    /// Profile/adapter misconfiguration; the router moves on.
    Adapter(AdapterError),
}

/// Runs one request against one provider profile, rotating through the
/// credential pool and feeding failures back into it.
pub struct RotationExecutor {
    pool: Arc<KeyPool>,
    registry: Arc<AdapterRegistry>,
    client: Arc<dyn UpstreamClient>,
    events: EventHub,
}

impl RotationExecutor {
    pub fn new(
        pool: Arc<KeyPool>,
        registry: Arc<AdapterRegistry>,
        client: Arc<dyn UpstreamClient>,
        events: EventHub,
    ) -> Self {
        Self {
            pool,
            registry,
            client,
            events,
        }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub async fn execute(
        &self,
        trace_id: Option<&str>,
        profile: &ModelProfile,
        req: &GatewayRequest,
    ) -> Result<UpstreamHttpResponse, ExecuteError> {
        let provider = profile.provider.as_str();
        let Some(adapter) = self.registry.get(provider) else {
            return Err(ExecuteError::Adapter(AdapterError::InvalidConfig(format!(
                "no adapter registered for provider {provider}"
            ))));
        };

        // Bounded by the keys visible at entry, plus one for a key returned
        // mid-flight by the sweeper.
        let max_attempts = self.pool.snapshot_provider(provider).await.available + 1;
        let mut attempt: u32 = 1;

        for _ in 0..max_attempts {
            let Some(key) = self.pool.acquire(provider).await else {
                break;
            };
            let ctx = CallCtx {
                trace_id: trace_id.map(str::to_string),
                attempt,
            };

            let upstream_req =
                match build_request(adapter.as_ref(), &ctx, profile, key.secret(), req).await {
                    Ok(request) => request,
                    Err(err) => {
                        self.pool.release(provider, &key).await;
                        return Err(ExecuteError::Adapter(err));
                    }
                };

            let outcome = self.client.send(upstream_req).await;
            let failure = match outcome {
                Ok(resp) if resp.is_success() => {
                    self.pool.release(provider, &key).await;
                    self.emit_attempt(trace_id, profile, attempt, Some(resp.status), None)
                        .await;
                    return normalize_success(adapter.as_ref(), req, resp)
                        .map_err(ExecuteError::Adapter);
                }
                Ok(resp) => failure_from_response(resp),
                Err(failure) => failure,
            };

            let status = match &failure {
                UpstreamFailure::Http { status, .. } => Some(*status),
                UpstreamFailure::Transport { .. } => None,
            };
            self.emit_attempt(trace_id, profile, attempt, status, Some(failure.summary()))
                .await;

            match classify_failure(&failure) {
                FailureClass::RequestContent => {
                    self.pool.release(provider, &key).await;
                    return Err(surface_rejection(failure));
                }
                FailureClass::PermanentCredential => {
                    self.retire(provider, &key).await;
                }
                FailureClass::TransientCredential => {
                    self.pool
                        .quarantine(provider, &key, failure_reason(&failure))
                        .await;
                }
            }
            attempt += 1;
        }

        Err(ExecuteError::Exhausted)
    }

    async fn retire(&self, provider: &str, key: &PooledKey) {
        self.pool.retire(provider, key, KeyReason::AuthInvalid).await;
    }

    async fn emit_attempt(
        &self,
        trace_id: Option<&str>,
        profile: &ModelProfile,
        attempt: u32,
        status: Option<u16>,
        error: Option<String>,
    ) {
        self.events
            .emit(Event::Upstream(UpstreamAttemptEvent {
                at: OffsetDateTime::now_utc(),
                trace_id: trace_id.map(str::to_string),
                provider: profile.provider.clone(),
                profile: profile.profile_id.clone(),
                attempt,
                status,
                error,
            }))
            .await;
    }
}

async fn build_request(
    adapter: &dyn ProviderAdapter,
    ctx: &CallCtx,
    profile: &ModelProfile,
    secret: &str,
    req: &GatewayRequest,
) -> Result<UpstreamHttpRequest, AdapterError> {
    match req {
        GatewayRequest::Chat(chat) => adapter.build_chat(ctx, profile, secret, chat).await,
        GatewayRequest::Embeddings(embeddings) => {
            adapter.build_embeddings(ctx, profile, secret, embeddings).await
        }
        GatewayRequest::Speech(speech) => adapter.build_speech(ctx, profile, secret, speech).await,
    }
}

fn normalize_success(
    adapter: &dyn ProviderAdapter,
    req: &GatewayRequest,
    resp: UpstreamHttpResponse,
) -> Result<UpstreamHttpResponse, AdapterError> {
    match resp.body {
        UpstreamBody::Bytes(bytes) => {
            let body = adapter.normalize_response(req.op(), bytes)?;
            Ok(UpstreamHttpResponse {
                status: resp.status,
                headers: resp.headers,
                body: UpstreamBody::Bytes(body),
            })
        }
        // Streaming bodies pass through untouched.
        body @ UpstreamBody::Stream(_) => Ok(UpstreamHttpResponse {
            status: resp.status,
            headers: resp.headers,
            body,
        }),
    }
}

fn failure_from_response(resp: UpstreamHttpResponse) -> UpstreamFailure {
    let body = match resp.body {
        UpstreamBody::Bytes(bytes) => bytes,
        UpstreamBody::Stream(_) => Bytes::new(),
    };
    UpstreamFailure::Http {
        status: resp.status,
        headers: resp.headers,
        body,
    }
}

fn surface_rejection(failure: UpstreamFailure) -> ExecuteError {
    match failure {
        UpstreamFailure::Http { status, body, .. } => {
            ExecuteError::RequestRejected { status, body }
        }
        // Unreachable for transport failures, which are always transient.
        UpstreamFailure::Transport { message, .. } => ExecuteError::RequestRejected {
            status: 400,
            body: Bytes::from(message),
        },
    }
}
