//! Gateway core: upstream IO, credential rotation, caching and the
//! alias-to-profile fallback router.

pub mod bootstrap;
pub mod cache;
pub mod classify;
pub mod executor;
pub mod route;
pub mod state;
pub mod upstream_client;

pub use bootstrap::{Bootstrap, CliArgs, bootstrap};
pub use cache::{ResponseCache, fingerprint};
pub use classify::{FailureClass, classify_failure, failure_reason};
pub use executor::{ExecuteError, RotationExecutor};
pub use route::{GatewayRouter, RouteError};
pub use state::AppState;
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, WreqUpstreamClient};
