//! Fan-out of one run across a pool of supervised agents.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{error, info};

use crate::config;
use crate::error::{RunError, RunResult};
use crate::explorer::{ApiKey, ExploreTarget, Explorer};
use crate::registry::RunRegistry;
use crate::run::{Run, RunId};
use crate::summary::{Summary, summarize_bug_reports};
use crate::supervisor::AgentSupervisor;

/// Settings injected into the orchestrator at construction
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Deadline for each agent slot
    pub agent_timeout: Duration,
    /// Largest `num_agents` accepted by `run_pool`
    pub max_agents: usize,
    /// Credential handed to every explorer invocation
    pub api_key: Option<ApiKey>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(config::DEFAULT_AGENT_TIMEOUT),
            max_agents: config::DEFAULT_MAX_AGENTS,
            api_key: None,
        }
    }
}

impl PoolConfig {
    pub fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    pub fn api_key(mut self, api_key: Option<ApiKey>) -> Self {
        self.api_key = api_key;
        self
    }
}

/// Launches runs and answers questions about them
pub struct PoolOrchestrator {
    registry: Arc<RunRegistry>,
    explorer: Arc<dyn Explorer>,
    config: PoolConfig,
}

impl PoolOrchestrator {
    pub fn new(explorer: Arc<dyn Explorer>, config: PoolConfig) -> Self {
        Self::with_registry(Arc::new(RunRegistry::new()), explorer, config)
    }

    /// Share an existing registry, e.g. between several front ends
    pub fn with_registry(registry: Arc<RunRegistry>, explorer: Arc<dyn Explorer>, config: PoolConfig) -> Self {
        Self {
            registry,
            explorer,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start a run of `num_agents` concurrent agents against `url`.
    ///
    /// Returns as soon as every slot is scheduled; it does not wait for any
    /// agent. Use [`RunRegistry::wait_for_completion`] or
    /// [`RunRegistry::subscribe`] to learn when the run is done. Outside a
    /// Tokio runtime it fails with [`RunError::NoRuntime`] and registers
    /// nothing.
    pub fn run_pool(&self, url: &str, num_agents: usize, headless: bool) -> RunResult<RunId> {
        validate_url(url)?;
        self.validate_agent_count(num_agents)?;
        let runtime = Handle::try_current().map_err(|e| RunError::NoRuntime(e.to_string()))?;

        let run_id = self.registry.create(url, num_agents, headless);
        info!(run_id = %run_id, url, num_agents, headless, "launching agent pool");

        for agent_index in 0..num_agents {
            let supervisor = AgentSupervisor::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.explorer),
                self.config.api_key.clone(),
                self.config.agent_timeout,
            );
            let target = ExploreTarget {
                url: url.to_string(),
                headless,
                agent_index,
            };
            let run_id = run_id.clone();

            runtime.spawn(async move {
                if let Err(err) = supervisor.supervise(&run_id, target).await {
                    error!(run_id = %run_id, agent_index, error = %err, "could not record agent result");
                }
            });
        }

        Ok(run_id)
    }

    pub fn get(&self, run_id: &RunId) -> RunResult<Run> {
        self.registry.get(run_id)
    }

    /// Summary over whatever has been reported so far
    pub fn summarize(&self, run_id: &RunId) -> RunResult<Summary> {
        summarize_bug_reports(&self.registry, run_id)
    }

    pub async fn wait_for_completion(&self, run_id: &RunId, timeout: Duration) -> RunResult<Run> {
        self.registry.wait_for_completion(run_id, timeout).await
    }

    fn validate_agent_count(&self, num_agents: usize) -> RunResult<()> {
        if num_agents == 0 {
            return Err(RunError::Validation(
                "num_agents must be a positive integer".to_string(),
            ));
        }
        if num_agents > self.config.max_agents {
            return Err(RunError::Validation(format!(
                "num_agents must be at most {} (got {})",
                self.config.max_agents, num_agents
            )));
        }
        Ok(())
    }
}

/// Check that `url` is non-empty and carries a scheme and a host.
///
/// Scheme defaulting is the caller's job; see [`normalize_url`].
pub fn validate_url(url: &str) -> RunResult<()> {
    if url.trim().is_empty() {
        return Err(RunError::Validation("url must not be empty".to_string()));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(RunError::Validation(format!("url '{}' contains whitespace", url)));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(RunError::Validation(format!(
            "url '{}' has no scheme (e.g. https://)",
            url
        )));
    };

    let scheme_ok = scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(RunError::Validation(format!("url '{}' has an invalid scheme", url)));
    }

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(RunError::Validation(format!("url '{}' has no host", url)));
    }

    Ok(())
}

/// Prepend `https://` when the user typed a bare host
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
