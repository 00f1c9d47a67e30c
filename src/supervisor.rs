//! Per-slot supervision of one exploration invocation.
//!
//! The supervisor is the failure boundary of the pool: explorer errors,
//! panics and deadline overruns all end up as a failed [`AgentResult`], and
//! exactly one result is appended to the registry per slot whatever happens.
//! A failed slot is terminal; nothing is retried here.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::error::RunResult;
use crate::explorer::{ApiKey, ExploreTarget, Explorer};
use crate::registry::RunRegistry;
use crate::run::{AgentOutcome, AgentResult, RunId};

pub struct AgentSupervisor {
    registry: Arc<RunRegistry>,
    explorer: Arc<dyn Explorer>,
    api_key: Option<ApiKey>,
    timeout: Duration,
}

impl AgentSupervisor {
    pub fn new(
        registry: Arc<RunRegistry>,
        explorer: Arc<dyn Explorer>,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            explorer,
            api_key,
            timeout,
        }
    }

    /// Run one slot to completion and record its result.
    ///
    /// The only error this returns is the registry refusing the append.
    pub async fn supervise(&self, run_id: &RunId, target: ExploreTarget) -> RunResult<AgentResult> {
        let agent_index = target.agent_index;
        let started_at = Utc::now();
        info!(run_id = %run_id, agent_index, url = %target.url, "agent started");

        let outcome = self.invoke(target).await;
        let finished_at = Utc::now();

        match &outcome {
            AgentOutcome::Success { findings } => {
                info!(run_id = %run_id, agent_index, findings = findings.len(), "agent finished");
            }
            AgentOutcome::Failure { error_message } => {
                warn!(run_id = %run_id, agent_index, error = %error_message, "agent failed");
            }
        }

        let result = AgentResult {
            agent_index,
            outcome,
            started_at,
            finished_at,
        };
        self.registry.append_result(run_id, result.clone())?;
        Ok(result)
    }

    async fn invoke(&self, target: ExploreTarget) -> AgentOutcome {
        let explorer = Arc::clone(&self.explorer);
        let api_key = self.api_key.clone();

        // Its own task, so a panicking explorer only takes down this slot
        let mut handle = tokio::spawn(async move { explorer.explore(&target, api_key.as_ref()).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(findings))) => AgentOutcome::Success { findings },
            Ok(Ok(Err(err))) => AgentOutcome::Failure {
                error_message: err.to_string(),
            },
            Ok(Err(join_err)) => AgentOutcome::Failure {
                error_message: describe_join_error(join_err),
            },
            Err(_) => {
                handle.abort();
                AgentOutcome::Failure {
                    error_message: format!("agent timed out after {:?}", self.timeout),
                }
            }
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("agent panicked: {}", panic_message(err.into_panic()))
    } else {
        "agent task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{ExploreError, ExploreResult, StaticExplorer};
    use crate::run::{Finding, Severity};
    use async_trait::async_trait;

    struct Hang;

    #[async_trait]
    impl Explorer for Hang {
        async fn explore(&self, _: &ExploreTarget, _: Option<&ApiKey>) -> ExploreResult<Vec<Finding>> {
            std::future::pending().await
        }
    }

    struct Panics;

    #[async_trait]
    impl Explorer for Panics {
        async fn explore(&self, _: &ExploreTarget, _: Option<&ApiKey>) -> ExploreResult<Vec<Finding>> {
            panic!("browser crashed")
        }
    }

    struct Fails;

    #[async_trait]
    impl Explorer for Fails {
        async fn explore(&self, _: &ExploreTarget, _: Option<&ApiKey>) -> ExploreResult<Vec<Finding>> {
            Err(ExploreError::InvalidOutput("garbled".to_string()))
        }
    }

    fn setup(explorer: Arc<dyn Explorer>, api_key: Option<ApiKey>) -> (Arc<RunRegistry>, RunId, AgentSupervisor) {
        let registry = Arc::new(RunRegistry::new());
        let run_id = registry.create("https://example.com", 1, true);
        let supervisor = AgentSupervisor::new(Arc::clone(&registry), explorer, api_key, Duration::from_secs(10));
        (registry, run_id, supervisor)
    }

    fn target() -> ExploreTarget {
        ExploreTarget {
            url: "https://example.com".to_string(),
            headless: true,
            agent_index: 0,
        }
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let finding = Finding::new("broken-link", "404 on /about", Severity::High);
        let (registry, run_id, supervisor) = setup(Arc::new(StaticExplorer::new(vec![finding.clone()])), None);

        let result = supervisor.supervise(&run_id, target()).await.unwrap();
        assert!(result.is_success());
        assert!(result.finished_at >= result.started_at);

        let run = registry.get(&run_id).unwrap();
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].findings(), &[finding]);
    }

    #[tokio::test]
    async fn test_missing_credential_becomes_failure() {
        let explorer = Arc::new(StaticExplorer::default().requiring_credential());
        let (registry, run_id, supervisor) = setup(explorer, None);

        let result = supervisor.supervise(&run_id, target()).await.unwrap();
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("API key"));
        assert!(registry.get(&run_id).unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_explorer_error_becomes_failure() {
        let (_, run_id, supervisor) = setup(Arc::new(Fails), None);
        let result = supervisor.supervise(&run_id, target()).await.unwrap();
        assert_eq!(result.error_message(), Some("invalid explorer output: garbled"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let (registry, run_id, supervisor) = setup(Arc::new(Panics), None);
        let result = supervisor.supervise(&run_id, target()).await.unwrap();
        assert_eq!(result.error_message(), Some("agent panicked: browser crashed"));
        assert!(result.findings().is_empty());
        assert!(registry.get(&run_id).unwrap().is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failure() {
        let (registry, run_id, supervisor) = setup(Arc::new(Hang), None);
        let result = supervisor.supervise(&run_id, target()).await.unwrap();
        assert_eq!(result.error_message(), Some("agent timed out after 10s"));
        assert!(registry.get(&run_id).unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_second_report_for_slot_is_rejected() {
        let (_, run_id, supervisor) = setup(Arc::new(StaticExplorer::default()), None);
        supervisor.supervise(&run_id, target()).await.unwrap();
        assert!(supervisor.supervise(&run_id, target()).await.is_err());
    }
}
