//! Encryption worker.
//!
//! Encryption is a slow round trip to the oracle. The worker owns the
//! oracle client on a spawned task and serves requests over a channel,
//! one at a time, each with its own reply channel.
//!
//! Lifecycle: `spawn` -> `encrypt`/`encrypt_board` -> `shutdown` (drain
//! queued requests, then join) or `abort` (drop queued requests).

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::core::board::Board;
use crate::game::encrypted::BoardEncoding;

use super::{EncryptRequest, EncryptTarget, EncryptedInput, EncryptionOracle, InputProof, OracleError};

/// Default request queue depth.
pub const WORKER_QUEUE_DEPTH: usize = 32;

/// Commands sent to the worker task.
enum Command {
    Encrypt {
        request: EncryptRequest,
        reply: oneshot::Sender<Result<EncryptedInput, OracleError>>,
    },
}

/// Task side: owns the oracle and the receiving end.
struct WorkerLoop {
    oracle: Arc<dyn EncryptionOracle>,
    command_rx: mpsc::Receiver<Command>,
}

impl WorkerLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                else => break,
            }
        }
        debug!("Encryption worker stopped");
    }

    async fn handle_command(&self, cmd: Command) {
        match cmd {
            Command::Encrypt { request, reply } => {
                let values = request.values.len();
                let result = self.oracle.encrypt(request).await;
                if let Err(e) = &result {
                    error!(error = %e, values, "Encryption failed");
                }
                // Caller may have gone away
                let _ = reply.send(result);
            }
        }
    }
}

/// Handle to a spawned encryption task.
pub struct EncryptionWorker {
    command_tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl EncryptionWorker {
    /// Spawn a worker around `oracle` on the current runtime.
    pub fn spawn(oracle: Arc<dyn EncryptionOracle>) -> Self {
        Self::spawn_with_capacity(oracle, WORKER_QUEUE_DEPTH)
    }

    /// Spawn with a custom queue depth.
    pub fn spawn_with_capacity(oracle: Arc<dyn EncryptionOracle>, capacity: usize) -> Self {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(WorkerLoop { oracle, command_rx }.run());
        Self { command_tx, task }
    }

    /// Encrypt values. No retries: failures surface to the caller.
    pub async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedInput, OracleError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Encrypt { request, reply })
            .await
            .map_err(|_| OracleError::WorkerGone)?;
        reply_rx.await.map_err(|_| OracleError::WorkerGone)?
    }

    /// Encrypt a board and shape the handles into an encoding.
    pub async fn encrypt_board(
        &self,
        target: EncryptTarget,
        board: &Board,
        packed: bool,
    ) -> Result<(BoardEncoding, InputProof), OracleError> {
        let request = EncryptRequest::for_board(target, board, packed)
            .map_err(|e| OracleError::InvalidInput(e.to_string()))?;
        let input = self.encrypt(request).await?;
        let encoding = input.to_encoding(packed)?;
        Ok((encoding, input.proof))
    }

    /// Stop accepting requests, finish queued ones and join the task.
    pub async fn shutdown(self) -> Result<(), OracleError> {
        drop(self.command_tx);
        self.task
            .await
            .map_err(|e| OracleError::Unavailable(format!("worker task failed: {e}")))
    }

    /// Stop immediately. Queued requests fail with `WorkerGone`.
    pub fn abort(self) {
        self.task.abort();
    }
}
