//! Types for test runs and the results their agents report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Opaque identifier of a run, assigned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Ordinal classification of a finding (`High` > `Medium` > `Low`).
///
/// Serialized lowercase; parsed case-insensitively, so `"High"` from an
/// explorer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One issue reported by an exploration agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Short label, e.g. "broken-link" or "console-error"
    pub category: String,

    /// Free-text detail
    pub description: String,

    pub severity: Severity,
}

impl Finding {
    pub fn new(category: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            severity,
        }
    }
}

/// How a single agent slot ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum AgentOutcome {
    /// The exploration returned; its findings may be empty
    Success { findings: Vec<Finding> },

    /// The exploration failed, timed out, or panicked
    Failure { error_message: String },
}

/// Result of one pool slot, appended to its run exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// 0-based slot index, unique within a run
    pub agent_index: usize,

    #[serde(flatten)]
    pub outcome: AgentOutcome,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AgentResult {
    pub fn success(
        agent_index: usize,
        findings: Vec<Finding>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_index,
            outcome: AgentOutcome::Success { findings },
            started_at,
            finished_at,
        }
    }

    pub fn failure(
        agent_index: usize,
        error_message: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_index,
            outcome: AgentOutcome::Failure {
                error_message: error_message.into(),
            },
            started_at,
            finished_at,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Success { .. })
    }

    /// Findings reported by this slot (always empty for a failure)
    pub fn findings(&self) -> &[Finding] {
        match &self.outcome {
            AgentOutcome::Success { findings } => findings,
            AgentOutcome::Failure { .. } => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            AgentOutcome::Success { .. } => None,
            AgentOutcome::Failure { error_message } => Some(error_message),
        }
    }

    /// Wall-clock time the slot took
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Progress of a run, derived from how many slots have reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
}

impl RunStatus {
    pub fn from_counts(reported: usize, num_agents: usize) -> Self {
        if reported == 0 {
            RunStatus::Pending
        } else if reported < num_agents {
            RunStatus::Running
        } else {
            RunStatus::Completed
        }
    }
}

/// Point-in-time snapshot of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub url: String,
    pub num_agents: usize,
    pub headless: bool,
    pub created_at: DateTime<Utc>,

    /// Reported results in append order
    pub results: Vec<AgentResult>,
}

impl Run {
    pub fn status(&self) -> RunStatus {
        RunStatus::from_counts(self.results.len(), self.num_agents)
    }

    pub fn is_complete(&self) -> bool {
        self.status() == RunStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(0, 3), RunStatus::Pending);
        assert_eq!(RunStatus::from_counts(1, 3), RunStatus::Running);
        assert_eq!(RunStatus::from_counts(3, 3), RunStatus::Completed);
    }

    #[test]
    fn test_run_id_generate_is_unique() {
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn test_finding_severity_is_case_insensitive() {
        let finding: Finding = serde_json::from_str(
            r#"{"category": "console-error", "description": "TypeError in app.js", "severity": "High"}"#,
        )
        .unwrap();
        assert_eq!(finding.severity, Severity::High);

        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["severity"], "high");

        let bad = serde_json::from_str::<Finding>(
            r#"{"category": "x", "description": "y", "severity": "critical"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_failure_has_no_findings() {
        let now = Utc::now();
        let result = AgentResult::failure(1, "missing API key", now, now);
        assert!(!result.is_success());
        assert!(result.findings().is_empty());
        assert_eq!(result.error_message(), Some("missing API key"));
    }

    #[test]
    fn test_agent_result_serializes_flat_outcome() {
        let now = Utc::now();
        let result = AgentResult::success(
            0,
            vec![Finding::new("broken-link", "404 on /about", Severity::High)],
            now,
            now,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["agent_index"], 0);
        assert_eq!(json["findings"][0]["severity"], "high");

        let back: AgentResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
