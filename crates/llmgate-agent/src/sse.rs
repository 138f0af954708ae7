use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::events::AgentEvent;

/// How long the bridge waits for the worker's `worker_ack` before giving
/// the client a 504. The session channel is non-retentive, so this
/// handshake is what closes the subscribe-after-publish race.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("worker did not acknowledge the session in time")]
    WorkerTimeout,
}

/// One SSE frame: `data: <json>\n\n`, non-ASCII passed through verbatim.
pub fn frame(event: &AgentEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {json}\n\n"))
}

/// Turns a session event subscription into a stream of SSE frames.
pub struct SseBridge {
    read_timeout: Duration,
}

impl SseBridge {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// Await the handshake, then pump frames until a terminal event, an
    /// idle timeout, end-of-channel or client disconnect. The handshake
    /// resolves before this returns so the caller can still answer with a
    /// plain HTTP status.
    pub async fn stream(
        &self,
        mut rx: mpsc::Receiver<AgentEvent>,
    ) -> Result<mpsc::Receiver<Bytes>, StreamError> {
        let first = match timeout(HANDSHAKE_TIMEOUT, rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) | Err(_) => return Err(StreamError::WorkerTimeout),
        };

        let (tx, out) = mpsc::channel::<Bytes>(64);
        let read_timeout = self.read_timeout;
        tokio::spawn(async move {
            let mut next = Some(first);
            loop {
                let Some(event) = next.take() else {
                    break;
                };
                let terminal = event.is_terminal();
                if tx.send(frame(&event)).await.is_err() {
                    // Client went away; only delivery stops.
                    break;
                }
                if terminal {
                    break;
                }
                match timeout(read_timeout, rx.recv()).await {
                    Ok(Some(event)) => next = Some(event),
                    // Worker closed the session channel.
                    Ok(None) => break,
                    // Inactivity: drop delivery, the worker runs on.
                    Err(_) => break,
                }
            }
        });
        Ok(out)
    }
}
