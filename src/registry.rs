//! Process-wide store of runs and the results their agents report.
//!
//! The registry is the only shared mutable state in the crate. Each run keeps
//! its results behind its own lock so concurrent appends for the same run are
//! serialized, while appends to different runs never contend. Every append
//! also publishes a [`RunProgress`] on a watch channel, which is how callers
//! learn that a run finished without polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{RunError, RunResult};
use crate::run::{AgentResult, Run, RunId};

/// How many of a run's agent slots have reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
}

impl RunProgress {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

struct RunEntry {
    id: RunId,
    url: String,
    num_agents: usize,
    headless: bool,
    created_at: DateTime<Utc>,
    results: Mutex<Vec<AgentResult>>,
    progress: watch::Sender<RunProgress>,
}

impl RunEntry {
    fn snapshot(&self) -> Run {
        let results = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Run {
            id: self.id.clone(),
            url: self.url.clone(),
            num_agents: self.num_agents,
            headless: self.headless,
            created_at: self.created_at,
            results,
        }
    }
}

/// Keyed store of run state
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty run and return its fresh id. Performs no validation.
    pub fn create(&self, url: &str, num_agents: usize, headless: bool) -> RunId {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);

        let id = loop {
            let candidate = RunId::generate();
            if !runs.contains_key(&candidate) {
                break candidate;
            }
        };

        let (progress, _) = watch::channel(RunProgress {
            completed: 0,
            total: num_agents,
        });

        let entry = RunEntry {
            id: id.clone(),
            url: url.to_string(),
            num_agents,
            headless,
            created_at: Utc::now(),
            results: Mutex::new(Vec::new()),
            progress,
        };
        runs.insert(id.clone(), Arc::new(entry));

        debug!(run_id = %id, url, num_agents, headless, "registered run");
        id
    }

    fn entry(&self, run_id: &RunId) -> RunResult<Arc<RunEntry>> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .cloned()
            .ok_or_else(|| RunError::UnknownRun(run_id.clone()))
    }

    /// Append one agent's result to its run.
    ///
    /// Rejects indices outside `0..num_agents` and indices that already
    /// reported, so a run never holds more than `num_agents` results.
    pub fn append_result(&self, run_id: &RunId, result: AgentResult) -> RunResult<()> {
        let entry = self.entry(run_id)?;
        let agent_index = result.agent_index;

        let mut results = entry.results.lock().unwrap_or_else(PoisonError::into_inner);

        if agent_index >= entry.num_agents {
            return Err(RunError::RejectedResult {
                run_id: run_id.clone(),
                agent_index,
                reason: format!("index outside 0..{}", entry.num_agents),
            });
        }
        if results.iter().any(|r| r.agent_index == agent_index) {
            return Err(RunError::RejectedResult {
                run_id: run_id.clone(),
                agent_index,
                reason: "agent already reported".to_string(),
            });
        }

        results.push(result);

        // Published under the lock so observers never see the count go backwards.
        entry.progress.send_replace(RunProgress {
            completed: results.len(),
            total: entry.num_agents,
        });

        debug!(run_id = %run_id, agent_index, reported = results.len(), total = entry.num_agents, "appended agent result");
        Ok(())
    }

    /// Consistent snapshot of a run
    pub fn get(&self, run_id: &RunId) -> RunResult<Run> {
        Ok(self.entry(run_id)?.snapshot())
    }

    /// Watch a run's progress; the receiver sees every completed append
    pub fn subscribe(&self, run_id: &RunId) -> RunResult<watch::Receiver<RunProgress>> {
        Ok(self.entry(run_id)?.progress.subscribe())
    }

    /// Wait until every agent slot of the run has reported, or the timeout elapses.
    pub async fn wait_for_completion(&self, run_id: &RunId, timeout: Duration) -> RunResult<Run> {
        let mut progress = self.subscribe(run_id)?;

        let finished = tokio::time::timeout(timeout, progress.wait_for(RunProgress::is_complete))
            .await
            .is_ok();

        if finished {
            return self.get(run_id);
        }

        let current = *progress.borrow();
        Err(RunError::WaitTimeout {
            run_id: run_id.clone(),
            completed: current.completed,
            total: current.total,
            waited: timeout,
        })
    }

    /// Number of registered runs
    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
