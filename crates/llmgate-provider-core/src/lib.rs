//! Core provider abstractions for llmgate.
//!
//! This crate intentionally does **not** depend on axum or any concrete HTTP
//! client. Adapters construct `UpstreamHttpRequest` values; a higher layer
//! performs IO and feeds failures back into the credential pool.

pub mod adapter;
pub mod errors;
pub mod events;
pub mod headers;
pub mod keypool;
pub mod registry;
pub mod request;

pub use adapter::{
    CallCtx, HttpMethod, ProviderAdapter, TransportErrorKind, UpstreamBody, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse,
};
pub use errors::{AdapterError, AdapterResult};
pub use events::{Event, EventHub, EventSink, PoolEvent, TerminalEventSink, UpstreamAttemptEvent};
pub use headers::{Headers, header_get, header_set};
pub use keypool::{KeyPool, KeyReason, PoolCounts, PooledKey, SWEEP_INTERVAL};
pub use registry::AdapterRegistry;
pub use request::{
    ChatMessage, ChatRequest, EmbeddingsRequest, GatewayRequest, Op, SpeechRequest,
};
