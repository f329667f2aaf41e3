//! In-memory doubles for the queue service and handlers

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use errands_core::domain::errand::{Errand, ResultMap};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

use crate::handler::Handler;
use crate::queue::ErrandQueue;

pub(crate) fn errand(id: &str) -> Errand {
    Errand {
        id: id.to_string(),
        name: format!("errand {}", id),
        kind: "t".to_string(),
        ..Default::default()
    }
}

/// A report call observed by [`FakeQueue`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Report {
    Completed(String, ResultMap),
    Failed(String, String),
}

impl Report {
    /// Completion as produced by [`ScriptedHandler`]
    pub(crate) fn completed(id: &str) -> Self {
        let mut results = ResultMap::new();
        results.insert("handled".to_string(), serde_json::Value::from(id));
        Report::Completed(id.to_string(), results)
    }

    pub(crate) fn failed(id: &str, reason: &str) -> Self {
        Report::Failed(id.to_string(), reason.to_string())
    }
}

/// Hands out a fixed list of errands, then nothing
pub(crate) struct FakeQueue {
    errands: Mutex<VecDeque<Errand>>,
    fetch_calls: AtomicUsize,
    failing_fetches: AtomicUsize,
    failing_reports: bool,
    reports: Mutex<Vec<Report>>,
}

impl FakeQueue {
    pub(crate) fn new(errands: Vec<Errand>) -> Self {
        Self {
            errands: Mutex::new(errands.into()),
            fetch_calls: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            failing_reports: false,
            reports: Mutex::new(Vec::new()),
        }
    }

    /// The next `n` fetches fail
    pub(crate) fn failing_fetches(self, n: usize) -> Self {
        self.failing_fetches.store(n, Ordering::SeqCst);
        self
    }

    /// Every report call fails and is not recorded
    pub(crate) fn failing_reports(mut self) -> Self {
        self.failing_reports = true;
        self
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    fn record(&self, report: Report) -> Result<()> {
        if self.failing_reports {
            return Err(anyhow!("service unavailable"));
        }
        self.reports.lock().unwrap().push(report);
        Ok(())
    }
}

#[async_trait]
impl ErrandQueue for FakeQueue {
    async fn fetch_next(&self, topic: &str) -> Result<Option<Errand>> {
        assert_eq!(topic, "t");
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("connection refused"));
        }

        Ok(self.errands.lock().unwrap().pop_front())
    }

    async fn report_complete(&self, errand_id: &str, results: ResultMap) -> Result<()> {
        self.record(Report::Completed(errand_id.to_string(), results))
    }

    async fn report_failed(&self, errand_id: &str, reason: &str) -> Result<()> {
        self.record(Report::Failed(errand_id.to_string(), reason.to_string()))
    }
}

/// Handler whose behaviour is scripted per errand id
///
/// By default it succeeds immediately with `{"handled": id}`.
pub(crate) struct ScriptedHandler {
    /// Root message and the contexts wrapped around it, innermost first
    failures: HashMap<String, (String, Vec<String>)>,
    panics: HashSet<String>,
    holds: HashMap<String, Arc<Semaphore>>,
    handled: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    pub(crate) fn new() -> Self {
        Self {
            failures: HashMap::new(),
            panics: HashSet::new(),
            holds: HashMap::new(),
            handled: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail(mut self, id: &str, message: &str) -> Self {
        let failure = (message.to_string(), Vec::new());
        self.failures.insert(id.to_string(), failure);
        self
    }

    /// Fails with `message` wrapped in one layer of `context`
    pub(crate) fn fail_with_context(mut self, id: &str, message: &str, context: &str) -> Self {
        self.failures.insert(
            id.to_string(),
            (message.to_string(), vec![context.to_string()]),
        );
        self
    }

    pub(crate) fn panic_on(mut self, id: &str) -> Self {
        self.panics.insert(id.to_string());
        self
    }

    /// The errand blocks inside the handler until [`ScriptedHandler::release`]
    pub(crate) fn hold(mut self, id: &str) -> Self {
        self.holds.insert(id.to_string(), Arc::new(Semaphore::new(0)));
        self
    }

    pub(crate) fn release(&self, id: &str) {
        self.holds[id].add_permits(1);
    }

    /// Ids whose handler call ran to the end
    pub(crate) fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    async fn handle(&self, errand: &Errand) -> Result<ResultMap> {
        if let Some(gate) = self.holds.get(&errand.id) {
            let _permit = gate.acquire().await?;
        }

        if self.panics.contains(&errand.id) {
            panic!("scripted panic");
        }

        self.handled.lock().unwrap().push(errand.id.clone());

        if let Some((message, contexts)) = self.failures.get(&errand.id) {
            let mut result: Result<ResultMap> = Err(anyhow!("{}", message));
            for context in contexts {
                result = result.context(context.clone());
            }
            return result;
        }

        let mut results = ResultMap::new();
        results.insert("handled".to_string(), serde_json::Value::from(errand.id.as_str()));
        Ok(results)
    }
}
