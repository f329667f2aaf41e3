//! Errand processor
//!
//! Polls the errands service for one topic and feeds a fixed pool of workers.
//! The control loop runs in its own task; each worker runs in another.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use errands_core::domain::errand::Errand;

use super::backoff::FetchBackoff;
use super::worker::{Worker, WorkerId};
use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::handler::Handler;
use crate::queue::ErrandQueue;

/// Handle to a running pool of workers serving one topic
///
/// Created once per (topic, handler) pair; polls until [`Processor::quit`]
/// or [`Processor::shutdown`]. A stopped processor cannot be restarted.
pub struct Processor {
    topic: String,
    paused: Arc<AtomicBool>,
    workers: Vec<WorkerHandle>,
    cancel: CancellationToken,
    control: JoinHandle<()>,
}

struct WorkerHandle {
    idle: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Processor {
    /// Starts a processor with default timings
    pub fn new(
        queue: Arc<dyn ErrandQueue>,
        topic: impl Into<String>,
        concurrency: usize,
        handler: Arc<dyn Handler>,
    ) -> Result<Self, ProcessorError> {
        Self::start(queue, handler, ProcessorConfig::new(topic, concurrency))
    }

    /// Spawns the workers and the control loop, then returns immediately
    ///
    /// Only invalid arguments fail here; an unreachable service shows up
    /// later as logged fetch errors.
    pub fn start(
        queue: Arc<dyn ErrandQueue>,
        handler: Arc<dyn Handler>,
        config: ProcessorConfig,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ProcessorError::NoRuntime);
        }

        let concurrency = config.concurrency;
        let (ready_tx, ready_rx) = mpsc::channel(concurrency);
        let mut slots = Vec::with_capacity(concurrency);
        let mut workers = Vec::with_capacity(concurrency);

        for id in 0..concurrency {
            let (slot_tx, slot_rx) = mpsc::channel(1);
            let worker = Worker::new(
                id,
                Arc::clone(&queue),
                Arc::clone(&handler),
                slot_rx,
                ready_tx.clone(),
                config.handler_timeout,
            );
            let idle = worker.idle_flag();
            let task = tokio::spawn(worker.run());

            slots.push(slot_tx);
            workers.push(WorkerHandle { idle, task });
        }

        let paused = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let control_loop = ControlLoop {
            topic: config.topic.clone(),
            queue,
            slots,
            ready_rx,
            idle: VecDeque::with_capacity(concurrency),
            paused: Arc::clone(&paused),
            backoff: config
                .max_backoff
                .map(|max| FetchBackoff::new(config.poll_interval, max)),
            poll_interval: config.poll_interval,
            cancel: cancel.clone(),
        };
        let control = tokio::spawn(control_loop.run());

        info!("Started processor for topic {} with {} worker(s)", config.topic, concurrency);

        Ok(Self {
            topic: config.topic,
            paused,
            workers,
            cancel,
            control,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Configured number of concurrent workers
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Number of workers; equals the configured concurrency for the
    /// processor's whole lifetime
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of workers currently waiting for an errand
    pub fn idle_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.idle.load(Ordering::Acquire))
            .count()
    }

    /// Stops fetching new errands; work already handed out continues
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            info!("Paused processor for topic {}", self.topic);
        }
    }

    /// Resumes fetching after [`Processor::pause`]
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            info!("Resumed processor for topic {}", self.topic);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whether the control loop is still polling
    pub fn is_running(&self) -> bool {
        !self.control.is_finished()
    }

    /// Stops polling without waiting
    ///
    /// Errands already handed to workers are still processed and reported.
    /// Workers exit once they are idle.
    pub fn quit(&self) {
        self.cancel.cancel();
    }

    /// Stops polling and waits for every worker to finish its current
    /// errand and exit
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Err(e) = self.control.await {
            error!("Control loop for topic {} panicked: {}", self.topic, e);
        }

        for worker in self.workers {
            if let Err(e) = worker.task.await {
                warn!("Worker task for topic {} panicked: {}", self.topic, e);
            }
        }

        info!("Processor for topic {} shut down", self.topic);
    }
}

/// State owned by the control loop task
///
/// Scheduling runs on the ready channel: a worker id in `idle` means that
/// worker announced itself and its slot is empty, so delivering to it never
/// blocks.
struct ControlLoop {
    topic: String,
    queue: Arc<dyn ErrandQueue>,
    slots: Vec<mpsc::Sender<Errand>>,
    ready_rx: mpsc::Receiver<WorkerId>,
    idle: VecDeque<WorkerId>,
    paused: Arc<AtomicBool>,
    /// Present only when fetch backoff is enabled
    backoff: Option<FetchBackoff>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl ControlLoop {
    async fn run(mut self) {
        info!("Polling topic {} every {:?}", self.topic, self.poll_interval);

        let start = Instant::now() + self.poll_interval;
        let mut ticker = time::interval_at(start, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        // Dropping the slots and the ready receiver lets idle workers exit.
        info!("Stopped polling topic {}", self.topic);
    }

    /// One gating evaluation; ticks never overlap because the fetch and the
    /// dispatch finish before the next tick is awaited
    async fn tick(&mut self) {
        while let Ok(id) = self.ready_rx.try_recv() {
            self.idle.push_back(id);
        }

        if self.paused.load(Ordering::Acquire) {
            trace!("Processor paused, skipping poll");
            return;
        }

        if self.idle.is_empty() {
            debug!("All workers busy, skipping poll");
            return;
        }

        if self
            .backoff
            .as_ref()
            .is_some_and(|backoff| !backoff.ready(Instant::now()))
        {
            trace!("Backing off after fetch failures");
            return;
        }

        match self.queue.fetch_next(&self.topic).await {
            Ok(Some(errand)) if errand.is_present() => {
                self.reset_backoff();
                self.dispatch(errand).await;
            }
            Ok(_) => {
                self.reset_backoff();
                debug!("No errands available for topic {}", self.topic);
            }
            Err(e) => match self.backoff.as_mut() {
                Some(backoff) => {
                    let delay = backoff.record_failure(Instant::now());
                    warn!(
                        "Error requesting errand (failure {}, next attempt in {:?}): {:#}",
                        backoff.failures(),
                        delay,
                        e
                    );
                }
                None => warn!("Error requesting errand to process: {:#}", e),
            },
        }
    }

    fn reset_backoff(&mut self) {
        if let Some(backoff) = self.backoff.as_mut() {
            backoff.reset();
        }
    }

    async fn dispatch(&mut self, errand: Errand) {
        // Longest-idle worker first, so back-to-back errands spread out.
        while let Some(id) = self.idle.pop_front() {
            match self.slots[id].send(errand.clone()).await {
                Ok(()) => {
                    debug!("Dispatched errand {} to worker {}", errand.id, id);
                    return;
                }
                Err(_) => error!("Worker {} is gone, trying another", id),
            }
        }

        error!(
            "No worker left to take errand {}; it stays claimed on the service",
            errand.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeQueue, Report, ScriptedHandler, errand};

    const TICK: Duration = Duration::from_secs(4);

    /// Sleeps past `n` ticks; with the paused clock every task scheduled
    /// before the deadline gets to run first.
    async fn after_ticks(n: u32) {
        time::sleep(TICK * n + Duration::from_millis(100)).await;
    }

    fn start(
        queue: &Arc<FakeQueue>,
        handler: &Arc<ScriptedHandler>,
        concurrency: usize,
    ) -> Processor {
        Processor::start(
            queue.clone(),
            handler.clone(),
            ProcessorConfig::new("t", concurrency),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_count_matches_concurrency() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());

        let processor = start(&queue, &handler, 3);
        assert_eq!(processor.worker_count(), 3);
        assert_eq!(processor.concurrency(), 3);
        assert_eq!(processor.topic(), "t");

        after_ticks(5).await;
        assert_eq!(processor.worker_count(), 3);
        assert_eq!(processor.idle_workers(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_concurrency_is_rejected() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());

        let result = Processor::new(queue.clone(), "t", 0, handler);
        assert!(matches!(result, Err(ProcessorError::InvalidConcurrency)));
        assert_eq!(queue.fetch_calls(), 0);
    }

    #[test]
    fn test_start_outside_runtime_is_rejected() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());

        let result = Processor::new(queue, "t", 1, handler);
        assert!(matches!(result, Err(ProcessorError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_interval() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());
        let _processor = start(&queue, &handler, 1);

        time::sleep(TICK - Duration::from_millis(100)).await;
        assert_eq!(queue.fetch_calls(), 0);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_workers_three_errands() {
        let errands = vec![errand("J1"), errand("J2"), errand("J3")];
        let queue = Arc::new(FakeQueue::new(errands));
        let handler = Arc::new(ScriptedHandler::new().fail("J3", "boom").hold("J1"));
        let processor = start(&queue, &handler, 2);

        // J1 goes to one worker and stays there.
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 1);
        assert_eq!(processor.idle_workers(), 1);

        // J2 can only be running on the other worker.
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert_eq!(queue.reports(), vec![Report::completed("J2")]);

        handler.release("J1");
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 3);

        assert_eq!(
            queue.reports(),
            vec![
                Report::completed("J2"),
                Report::completed("J1"),
                Report::failed("J3", "boom"),
            ]
        );

        // Queue drained: polling continues without further reports.
        after_ticks(3).await;
        assert_eq!(queue.fetch_calls(), 6);
        assert_eq!(queue.reports().len(), 3);
        assert_eq!(processor.idle_workers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_polls_forever_without_reports() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());
        let processor = start(&queue, &handler, 1);

        after_ticks(10).await;
        assert_eq!(queue.fetch_calls(), 10);
        assert!(queue.reports().is_empty());
        assert_eq!(processor.idle_workers(), 1);
        assert!(processor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fetch_while_all_workers_busy() {
        let queue = Arc::new(FakeQueue::new(vec![errand("A"), errand("B")]));
        let handler = Arc::new(ScriptedHandler::new().hold("A"));
        let processor = start(&queue, &handler, 1);

        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 1);
        assert_eq!(processor.idle_workers(), 0);

        after_ticks(5).await;
        assert_eq!(queue.fetch_calls(), 1);

        handler.release("A");
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert_eq!(
            queue.reports(),
            vec![Report::completed("A"), Report::completed("B")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_before_first_fetch_then_resume() {
        let queue = Arc::new(FakeQueue::new(vec![errand("P1")]));
        let handler = Arc::new(ScriptedHandler::new());
        let processor = start(&queue, &handler, 2);

        processor.pause();
        processor.pause();
        assert!(processor.is_paused());

        after_ticks(5).await;
        assert_eq!(queue.fetch_calls(), 0);

        processor.resume();
        assert!(!processor.is_paused());
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 1);
        assert_eq!(queue.reports(), vec![Report::completed("P1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_interrupt_running_errand() {
        let queue = Arc::new(FakeQueue::new(vec![errand("R1")]));
        let handler = Arc::new(ScriptedHandler::new().hold("R1"));
        let processor = start(&queue, &handler, 1);

        after_ticks(1).await;
        processor.pause();
        handler.release("R1");
        after_ticks(2).await;

        assert_eq!(queue.reports(), vec![Report::completed("R1")]);
        assert_eq!(queue.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fetch_after_quit() {
        let queue = Arc::new(FakeQueue::new(vec![]));
        let handler = Arc::new(ScriptedHandler::new());
        let processor = start(&queue, &handler, 2);

        after_ticks(2).await;
        assert_eq!(queue.fetch_calls(), 2);

        processor.quit();
        after_ticks(10).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert!(!processor.is_running());
        assert_eq!(processor.worker_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_errand() {
        let queue = Arc::new(FakeQueue::new(vec![errand("S1")]));
        let handler = Arc::new(ScriptedHandler::new().hold("S1"));
        let processor = start(&queue, &handler, 2);

        after_ticks(1).await;
        let shutdown = tokio::spawn(processor.shutdown());

        after_ticks(3).await;
        assert!(!shutdown.is_finished());
        assert!(queue.reports().is_empty());

        handler.release("S1");
        shutdown.await.unwrap();
        assert_eq!(queue.reports(), vec![Report::completed("S1")]);
        assert_eq!(queue.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_retried_on_next_tick() {
        let queue = Arc::new(FakeQueue::new(vec![errand("N1")]).failing_fetches(1));
        let handler = Arc::new(ScriptedHandler::new());
        let processor = start(&queue, &handler, 1);

        // t=4 fails
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 1);
        assert!(queue.reports().is_empty());

        // t=8 tries again without any extra delay
        after_ticks(1).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert_eq!(queue.reports(), vec![Report::completed("N1")]);
        assert!(processor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_back_off_when_enabled() {
        let queue = Arc::new(FakeQueue::new(vec![errand("F1")]).failing_fetches(2));
        let handler = Arc::new(ScriptedHandler::new());
        let config = ProcessorConfig::new("t", 1).with_max_backoff(Duration::from_secs(60));
        let processor = Processor::start(queue.clone(), handler.clone(), config).unwrap();

        // t=4 fails (next not before 12), t=8 skipped, t=12 fails (next not before 28)
        after_ticks(3).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert!(processor.is_running());

        // t=16..24 skipped, t=28 succeeds
        after_ticks(4).await;
        assert_eq!(queue.fetch_calls(), 3);
        assert_eq!(queue.reports(), vec![Report::completed("F1")]);

        // streak reset: polling is back to every tick
        after_ticks(2).await;
        assert_eq!(queue.fetch_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reason_keeps_error_context() {
        let queue = Arc::new(FakeQueue::new(vec![errand("C1")]));
        let handler = Arc::new(ScriptedHandler::new().fail_with_context("C1", "boom", "wrap"));
        let _processor = start(&queue, &handler, 1);

        after_ticks(1).await;
        assert_eq!(queue.reports(), vec![Report::failed("C1", "wrap: boom")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_errors_do_not_stop_worker() {
        let errands = vec![errand("X1"), errand("X2")];
        let queue = Arc::new(FakeQueue::new(errands).failing_reports());
        let handler = Arc::new(ScriptedHandler::new());
        let processor = start(&queue, &handler, 1);

        after_ticks(2).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert_eq!(handler.handled(), vec!["X1".to_string(), "X2".to_string()]);
        assert_eq!(processor.idle_workers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout_fails_errand_and_frees_worker() {
        let queue = Arc::new(FakeQueue::new(vec![errand("T1"), errand("T2")]));
        let handler = Arc::new(ScriptedHandler::new().hold("T1"));
        let config = ProcessorConfig::new("t", 1).with_handler_timeout(Duration::from_secs(1));
        let _processor = Processor::start(queue.clone(), handler.clone(), config).unwrap();

        after_ticks(2).await;
        assert_eq!(
            queue.reports(),
            vec![
                Report::failed("T1", "handler timed out after 1s"),
                Report::completed("T2"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_is_reported_as_failure() {
        let queue = Arc::new(FakeQueue::new(vec![errand("K1"), errand("K2")]));
        let handler = Arc::new(ScriptedHandler::new().panic_on("K1"));
        let processor = start(&queue, &handler, 1);

        after_ticks(2).await;
        assert_eq!(
            queue.reports(),
            vec![
                Report::failed("K1", "handler panicked: scripted panic"),
                Report::completed("K2"),
            ]
        );
        assert_eq!(processor.worker_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_errand_id_is_ignored() {
        let queue = Arc::new(FakeQueue::new(vec![errand("")]));
        let handler = Arc::new(ScriptedHandler::new());
        let _processor = start(&queue, &handler, 1);

        after_ticks(2).await;
        assert_eq!(queue.fetch_calls(), 2);
        assert!(handler.handled().is_empty());
        assert!(queue.reports().is_empty());
    }
}
