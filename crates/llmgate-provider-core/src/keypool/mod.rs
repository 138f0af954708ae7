mod pool;
mod state;

pub use pool::{KeyPool, PoolCounts, SWEEP_INTERVAL};
pub use state::{KeyReason, PooledKey};
