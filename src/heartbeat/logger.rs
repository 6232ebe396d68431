//! Queued (asynchronous) heartbeat logging.
//!
//! [`HeartbeatLogger`] puts a single tokio worker in front of a
//! [`HeartbeatController`]. Requests are applied one at a time in the order
//! they were queued, so a `log` queued before a `flush` is always part of
//! that flush. `log` itself never waits.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::controller::{HeartbeatCode, HeartbeatController};
use super::payload::HeartbeatsPayload;
use crate::error::{HeartbeatError, Result};

enum Request {
    Log(String),
    Flush(oneshot::Sender<Result<HeartbeatsPayload>>),
    FlushToday(oneshot::Sender<Result<HeartbeatsPayload>>),
    HeartbeatCode(oneshot::Sender<Result<HeartbeatCode>>),
}

/// Thread-safe handle that queues heartbeat operations onto a worker task.
pub struct HeartbeatLogger {
    tx: mpsc::UnboundedSender<Request>,
    worker: JoinHandle<()>,
}

impl HeartbeatLogger {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn new(controller: Arc<HeartbeatController>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::run(controller, rx));
        Self { tx, worker }
    }

    /// Queue a heartbeat for `agent`. Storage errors are logged, not returned.
    pub fn log(&self, agent: &str) {
        if self.tx.send(Request::Log(agent.to_string())).is_err() {
            warn!(agent, "Heartbeat logger closed, dropping heartbeat");
        }
    }

    /// Take every stored heartbeat once all earlier requests have been applied.
    pub async fn flush(&self) -> Result<HeartbeatsPayload> {
        self.request(Request::Flush).await
    }

    /// Take today's heartbeats once all earlier requests have been applied.
    pub async fn flush_today(&self) -> Result<HeartbeatsPayload> {
        self.request(Request::FlushToday).await
    }

    /// V1 heartbeat code; see [`HeartbeatController::heartbeat_code`].
    pub async fn heartbeat_code(&self) -> Result<HeartbeatCode> {
        self.request(Request::HeartbeatCode).await
    }

    /// Stop accepting requests and wait for the queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!("Heartbeat worker ended abnormally: {}", e);
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| HeartbeatError::LoggerClosed)?;
        rx.await.map_err(|_| HeartbeatError::LoggerClosed)?
    }

    async fn run(controller: Arc<HeartbeatController>, mut rx: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = rx.recv().await {
            let controller = Arc::clone(&controller);
            // Storage does blocking file I/O; awaiting here keeps requests serialized.
            let applied =
                tokio::task::spawn_blocking(move || Self::apply(&controller, request)).await;
            if let Err(e) = applied {
                error!("Heartbeat request panicked: {}", e);
            }
        }
        debug!("Heartbeat logger stopped");
    }

    fn apply(controller: &HeartbeatController, request: Request) {
        match request {
            Request::Log(agent) => {
                if let Err(e) = controller.log(&agent) {
                    warn!(agent = %agent, "Failed to log heartbeat: {}", e);
                }
            }
            Request::Flush(reply) => {
                let _ = reply.send(controller.flush());
            }
            Request::FlushToday(reply) => {
                let _ = reply.send(controller.flush_today());
            }
            Request::HeartbeatCode(reply) => {
                let _ = reply.send(controller.heartbeat_code());
            }
        }
    }
}
