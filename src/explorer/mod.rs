//! The boundary to the exploration agent.
//!
//! What an agent inspects and how it grades severity is opaque to this crate.
//! An [`Explorer`] is invoked once per pool slot with the target and the
//! injected credential, and either returns structured findings or fails.

pub mod process;

use async_trait::async_trait;
use std::fmt;

use crate::run::Finding;

pub use process::{ProcessExplorer, parse_findings};

/// Result type for exploration
pub type ExploreResult<T> = Result<T, ExploreError>;

/// Errors an exploration agent can raise
#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    /// No credential was injected
    #[error("no API key configured for the exploration agent")]
    MissingCredential,

    /// The explorer program could not be started
    #[error("failed to launch explorer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The explorer program exited unsuccessfully
    #[error("explorer exited with {status}: {stderr}")]
    Process { status: String, stderr: String },

    /// The explorer produced something other than findings
    #[error("invalid explorer output: {0}")]
    InvalidOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential handed to the exploration agent. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key; blank values count as no key at all
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// What a single agent slot is asked to explore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreTarget {
    pub url: String,
    pub headless: bool,
    pub agent_index: usize,
}

/// An exploration capability, invoked once per agent slot
#[async_trait]
pub trait Explorer: Send + Sync {
    async fn explore(&self, target: &ExploreTarget, api_key: Option<&ApiKey>) -> ExploreResult<Vec<Finding>>;
}

/// Explorer that reports a fixed set of findings without touching the network
#[derive(Debug, Clone, Default)]
pub struct StaticExplorer {
    findings: Vec<Finding>,
    require_credential: bool,
}

impl StaticExplorer {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            require_credential: false,
        }
    }

    /// Fail with `MissingCredential` when invoked without a key
    pub fn requiring_credential(mut self) -> Self {
        self.require_credential = true;
        self
    }
}

#[async_trait]
impl Explorer for StaticExplorer {
    async fn explore(&self, _target: &ExploreTarget, api_key: Option<&ApiKey>) -> ExploreResult<Vec<Finding>> {
        if self.require_credential && api_key.is_none() {
            return Err(ExploreError::MissingCredential);
        }
        Ok(self.findings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Severity;

    fn target() -> ExploreTarget {
        ExploreTarget {
            url: "https://example.com".to_string(),
            headless: true,
            agent_index: 0,
        }
    }

    #[test]
    fn test_api_key_blank_is_none() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("   ").is_none());
        assert_eq!(ApiKey::new("abc").unwrap().expose(), "abc");
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        assert!(!format!("{:?}", key).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_static_explorer_returns_findings() {
        let finding = Finding::new("broken-link", "404 on /about", Severity::High);
        let explorer = StaticExplorer::new(vec![finding.clone()]);
        let found = explorer.explore(&target(), None).await.unwrap();
        assert_eq!(found, vec![finding]);
    }

    #[tokio::test]
    async fn test_static_explorer_requiring_credential() {
        let explorer = StaticExplorer::default().requiring_credential();
        let err = explorer.explore(&target(), None).await.unwrap_err();
        assert!(matches!(err, ExploreError::MissingCredential));

        let key = ApiKey::new("k").unwrap();
        assert!(explorer.explore(&target(), Some(&key)).await.is_ok());
    }
}
