//! Queue processor: the single background worker
//!
//! Polls the persistent queue at a fixed tick and runs at most one handler
//! at a time. A handler that returns Ok marks the row completed; an Err
//! fails the row, which re-pends it with exponential backoff until its
//! retries are exhausted.

use std::sync::Arc;
use std::time::Duration;

use conductor_storage::{FailOutcome, TaskQueue};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::{EngineError, ExecutionPayload, WorkflowEngine};

pub struct QueueProcessor {
    engine: Arc<WorkflowEngine>,
    shutdown_rx: watch::Receiver<bool>,
}

impl QueueProcessor {
    pub fn new(engine: Arc<WorkflowEngine>, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            engine,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signalled. Single-flight: the tick is not
    /// polled again until the current handler finishes.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.engine.config().tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    if let Err(e) = self.drain_one().await {
                        error!("queue tick failed: {}", e);
                    }
                }
            }
        }
        debug!("queue processor stopped");
    }

    async fn drain_one(&self) -> Result<(), EngineError> {
        let Some(row) = self.engine.queue().dequeue().await? else {
            return Ok(());
        };

        let payload: ExecutionPayload = serde_json::from_value(row.payload.clone())?;
        info!(execution_id = %payload.execution_id, attempt = row.retry_count + 1, "leased execution");

        match self.engine.process_execution(payload.execution_id).await {
            Ok(()) => {
                self.engine.queue().complete(row.task_id).await?;
            }
            Err(e) => {
                error!(execution_id = %payload.execution_id, "execution handler failed: {}", e);
                match self.engine.queue().fail(row.task_id, &e.to_string()).await? {
                    FailOutcome::Retrying {
                        retry_count,
                        delay_secs,
                    } => {
                        info!(
                            execution_id = %payload.execution_id,
                            retry_count, delay_secs, "execution re-queued"
                        );
                    }
                    FailOutcome::Exhausted => {
                        error!(
                            execution_id = %payload.execution_id,
                            "execution dropped after exhausting queue retries"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Hourly garbage collection of terminal queue rows
pub async fn cleanup_loop(
    queue: TaskQueue,
    interval: Duration,
    age: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tick.tick() => {
                match queue.cleanup(age).await {
                    Ok(deleted) if deleted > 0 => {
                        info!(deleted, "cleaned up terminal queue rows");
                    }
                    Ok(_) => {}
                    Err(e) => error!("queue cleanup failed: {}", e),
                }
            }
        }
    }
    debug!("cleanup timer stopped");
}
