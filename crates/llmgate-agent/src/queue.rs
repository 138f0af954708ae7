use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, mpsc};

/// One queued reasoning task. The envelope carries the trace id so the
/// consumer's span links back to the producing HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub session_id: String,
    pub alias: String,
    pub user_query: String,
    #[serde(default)]
    pub client_system_instruction: Option<String>,
    #[serde(default)]
    pub client_manifests: Vec<String>,
    #[serde(default)]
    pub safety_flags: Vec<String>,
    /// Resolved pattern name; the HTTP entry applies the
    /// request > profile > global precedence before enqueueing.
    #[serde(default)]
    pub reasoning_mode: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub enqueued_at: OffsetDateTime,
}

/// Bounded FIFO between the HTTP entry point and the reasoning workers.
/// Workers compete on the single receiver; a task counts as in-flight from
/// dequeue until `ack`.
pub struct TaskQueue {
    tx: mpsc::Sender<TaskEnvelope>,
    rx: Mutex<mpsc::Receiver<TaskEnvelope>>,
    in_flight: AtomicUsize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        Arc::new(Self {
            tx,
            rx: Mutex::new(rx),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Non-blocking enqueue; false means the queue is full and the caller
    /// should shed the request rather than stall the HTTP handler.
    pub fn enqueue(&self, task: TaskEnvelope) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "task queue rejected session");
                false
            }
        }
    }

    pub async fn dequeue(&self) -> Option<TaskEnvelope> {
        let task = self.rx.lock().await.recv().await;
        if task.is_some() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        task
    }

    /// Acknowledge a finished task (the worker published a terminal event).
    pub fn ack(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
