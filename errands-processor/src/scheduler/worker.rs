//! Errand worker
//!
//! A worker announces itself on the ready channel, waits for the control loop
//! to place an errand in its slot, runs the handler, and reports the outcome.
//! It repeats until its slot is closed.

use errands_core::domain::errand::{Errand, ResultMap};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::handler::Handler;
use crate::queue::ErrandQueue;

/// Identifier of a worker within its processor
pub(crate) type WorkerId = usize;

/// How a handler invocation ended
enum Outcome {
    Completed(ResultMap),
    Failed(String),
}

pub(crate) struct Worker {
    id: WorkerId,
    queue: Arc<dyn ErrandQueue>,
    handler: Arc<dyn Handler>,
    slot: mpsc::Receiver<Errand>,
    ready_tx: mpsc::Sender<WorkerId>,
    idle: Arc<AtomicBool>,
    handler_timeout: Option<Duration>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        queue: Arc<dyn ErrandQueue>,
        handler: Arc<dyn Handler>,
        slot: mpsc::Receiver<Errand>,
        ready_tx: mpsc::Sender<WorkerId>,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            queue,
            handler,
            slot,
            ready_tx,
            idle: Arc::new(AtomicBool::new(true)),
            handler_timeout,
        }
    }

    /// Idle flag, written by this worker only
    pub(crate) fn idle_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.idle)
    }

    pub(crate) async fn run(mut self) {
        debug!("Worker {} started", self.id);

        loop {
            self.idle.store(true, Ordering::Release);

            // The ready channel has room for every worker, so this only fails
            // once the control loop is gone.
            if self.ready_tx.send(self.id).await.is_err() {
                break;
            }

            let Some(errand) = self.slot.recv().await else {
                break;
            };

            self.idle.store(false, Ordering::Release);
            self.process(errand).await;
        }

        debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, errand: Errand) {
        let errand_id = errand.id.clone();
        let span = info_span!("errand", errand_id = %errand_id, worker = self.id);

        async {
            info!("Processing errand of type {}", errand.kind);

            match self.invoke(errand).await {
                Outcome::Completed(results) => {
                    match self.queue.report_complete(&errand_id, results).await {
                        Ok(()) => info!("Completed processing"),
                        Err(e) => error!("Failed to report completion: {:#}", e),
                    }
                }
                Outcome::Failed(reason) => {
                    warn!("Errand failed: {}", reason);
                    if let Err(e) = self.queue.report_failed(&errand_id, &reason).await {
                        error!("Failed to report failure: {:#}", e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the handler in its own task so a panic or a timeout cannot take
    /// the worker down with it
    async fn invoke(&self, errand: Errand) -> Outcome {
        let handler = Arc::clone(&self.handler);
        let mut task =
            tokio::spawn(async move { handler.handle(&errand).await }.in_current_span());

        let joined = match self.handler_timeout {
            Some(limit) => match time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Outcome::Failed(format!("handler timed out after {:?}", limit));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(results)) => Outcome::Completed(results),
            Ok(Err(e)) => Outcome::Failed(format!("{:#}", e)),
            Err(e) => Outcome::Failed(describe_join_error(e)),
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("handler panicked: {}", panic_message(err.into_panic()))
    } else {
        format!("handler task failed: {}", err)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
