//! Aggregation of a run's agent results into one verdict.
//!
//! Summaries are computed from a registry snapshot and never wait on the
//! run: a partially complete run yields a summary over the slots that have
//! reported so far, and callers compare `successful_agents + failed_agents`
//! against `total_agents` (or watch the registry) to know when it is final.
//!
//! # Overall status
//!
//! Strict precedence, high > medium > low:
//!
//! | Status | When |
//! |--------|------|
//! | `Critical` | any high-severity finding |
//! | `Warning` | any medium- or low-severity finding |
//! | `Inconclusive` | no findings, all agents reported, and every one failed |
//! | `Healthy` | no findings otherwise, including runs still in progress |
//!
//! A run in which every agent failed (for example, no credential was
//! configured) reports zero issues. It is classified `Inconclusive` rather
//! than `Healthy` so it cannot be mistaken for a clean site.

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;

use crate::error::RunResult;
use crate::registry::RunRegistry;
use crate::run::{Finding, Run, RunId, RunStatus, Severity};

/// Verdict for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Critical,
    Warning,
    Healthy,
    Inconclusive,
}

impl OverallStatus {
    pub fn classify(
        breakdown: &SeverityBreakdown,
        successful_agents: usize,
        failed_agents: usize,
        pending_agents: usize,
    ) -> Self {
        if !breakdown.high.is_empty() {
            OverallStatus::Critical
        } else if !breakdown.medium.is_empty() || !breakdown.low.is_empty() {
            OverallStatus::Warning
        } else if successful_agents == 0 && failed_agents > 0 && pending_agents == 0 {
            OverallStatus::Inconclusive
        } else {
            OverallStatus::Healthy
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            OverallStatus::Critical => "🔴",
            OverallStatus::Warning => "🟡",
            OverallStatus::Healthy => "✅",
            OverallStatus::Inconclusive => "❓",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OverallStatus::Critical => "High-severity issues found that need immediate attention",
            OverallStatus::Warning => "Medium or low severity issues found that should be reviewed",
            OverallStatus::Healthy => "No issues detected by the agents that completed",
            OverallStatus::Inconclusive => "Every agent failed before reporting; the site was not tested",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverallStatus::Critical => "Critical",
            OverallStatus::Warning => "Warning",
            OverallStatus::Healthy => "Healthy",
            OverallStatus::Inconclusive => "Inconclusive",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every finding of a run, partitioned by severity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeverityBreakdown {
    #[serde(rename = "high_severity")]
    pub high: Vec<Finding>,
    #[serde(rename = "medium_severity")]
    pub medium: Vec<Finding>,
    #[serde(rename = "low_severity")]
    pub low: Vec<Finding>,
}

impl SeverityBreakdown {
    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::High => self.high.push(finding),
            Severity::Medium => self.medium.push(finding),
            Severity::Low => self.low.push(finding),
        }
    }

    pub fn get(&self, severity: Severity) -> &[Finding] {
        match severity {
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A failed slot, as surfaced in a summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentError {
    pub agent_index: usize,
    pub message: String,
}

/// Classified, presentable view of a run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: RunId,
    pub url: String,
    pub run_status: RunStatus,
    pub overall_status: OverallStatus,
    pub status_emoji: &'static str,
    pub status_description: &'static str,
    /// Span from the earliest start to the latest finish; absent before any agent reports
    pub duration_secs: Option<f64>,
    pub duration_formatted: Option<String>,
    pub total_agents: usize,
    pub successful_agents: usize,
    pub failed_agents: usize,
    pub pending_agents: usize,
    pub total_issues: usize,
    pub severity_breakdown: SeverityBreakdown,
    pub agent_errors: Vec<AgentError>,
}

impl Summary {
    pub fn from_run(run: &Run) -> Self {
        let mut breakdown = SeverityBreakdown::default();
        let mut agent_errors = Vec::new();
        let mut successful_agents = 0;

        for result in &run.results {
            if let Some(message) = result.error_message() {
                agent_errors.push(AgentError {
                    agent_index: result.agent_index,
                    message: message.to_string(),
                });
            } else {
                successful_agents += 1;
            }
            for finding in result.findings() {
                breakdown.push(finding.clone());
            }
        }
        agent_errors.sort_by_key(|e| e.agent_index);

        let failed_agents = agent_errors.len();
        let pending_agents = run.num_agents.saturating_sub(run.results.len());
        let overall_status = OverallStatus::classify(&breakdown, successful_agents, failed_agents, pending_agents);
        let duration = run_duration(run);

        Self {
            run_id: run.id.clone(),
            url: run.url.clone(),
            run_status: run.status(),
            overall_status,
            status_emoji: overall_status.emoji(),
            status_description: overall_status.description(),
            duration_secs: duration.map(|d| d.as_secs_f64()),
            duration_formatted: duration.map(format_duration),
            total_agents: run.num_agents,
            successful_agents,
            failed_agents,
            pending_agents,
            total_issues: breakdown.len(),
            severity_breakdown: breakdown,
            agent_errors,
        }
    }

    /// True once every configured agent has reported
    pub fn is_final(&self) -> bool {
        self.successful_agents + self.failed_agents == self.total_agents
    }
}

/// Summarize whatever the run's agents have reported so far
pub fn summarize_bug_reports(registry: &RunRegistry, run_id: &RunId) -> RunResult<Summary> {
    let run = registry.get(run_id)?;
    Ok(Summary::from_run(&run))
}

/// JSON form of [`summarize_bug_reports`]: the summary, or `{"error": ...}`
pub fn summary_payload(registry: &RunRegistry, run_id: &RunId) -> Value {
    match summarize_bug_reports(registry, run_id) {
        Ok(summary) => serde_json::to_value(&summary).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

fn run_duration(run: &Run) -> Option<Duration> {
    let started = run.results.iter().map(|r| r.started_at).min()?;
    let finished = run.results.iter().map(|r| r.finished_at).max()?;
    Some((finished - started).to_std().unwrap_or(Duration::ZERO))
}

/// Human-readable duration: `12.3s` under a minute, `4m 05s` above
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::AgentResult;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn run_with(num_agents: usize, results: Vec<AgentResult>) -> Run {
        Run {
            id: RunId::from("run-1"),
            url: "https://example.com".to_string(),
            num_agents,
            headless: true,
            created_at: at(0),
            results,
        }
    }

    #[test]
    fn test_clean_run_is_healthy() {
        let run = run_with(
            2,
            vec![
                AgentResult::success(0, vec![], at(0), at(5)),
                AgentResult::success(1, vec![], at(1), at(7)),
            ],
        );
        let summary = Summary::from_run(&run);

        assert_eq!(summary.overall_status, OverallStatus::Healthy);
        assert_eq!(summary.status_emoji, "✅");
        assert_eq!(summary.total_issues, 0);
        assert_eq!((summary.total_agents, summary.successful_agents, summary.failed_agents), (2, 2, 0));
        assert_eq!(summary.duration_formatted.as_deref(), Some("7.0s"));
        assert!(summary.is_final());
    }

    #[test]
    fn test_high_outweighs_everything() {
        let mut lows: Vec<Finding> = (0..10)
            .map(|i| Finding::new("style", format!("contrast {}", i), Severity::Low))
            .collect();
        lows.push(Finding::new("form", "submit does nothing", Severity::Medium));
        let run = run_with(
            2,
            vec![
                AgentResult::success(0, lows, at(0), at(1)),
                AgentResult::success(
                    1,
                    vec![Finding::new("broken-link", "404 on /about", Severity::High)],
                    at(0),
                    at(1),
                ),
            ],
        );
        let summary = Summary::from_run(&run);

        assert_eq!(summary.overall_status, OverallStatus::Critical);
        assert_eq!(summary.severity_breakdown.high.len(), 1);
        assert_eq!(summary.severity_breakdown.medium.len(), 1);
        assert_eq!(summary.severity_breakdown.low.len(), 10);
        assert_eq!(summary.total_issues, 12);
    }

    #[test]
    fn test_low_only_is_warning() {
        let run = run_with(
            1,
            vec![AgentResult::success(
                0,
                vec![Finding::new("a11y", "missing alt text", Severity::Low)],
                at(0),
                at(1),
            )],
        );
        assert_eq!(Summary::from_run(&run).overall_status, OverallStatus::Warning);
    }

    #[test]
    fn test_all_failed_is_inconclusive() {
        let run = run_with(
            2,
            vec![
                AgentResult::failure(0, "no API key configured", at(0), at(0)),
                AgentResult::failure(1, "no API key configured", at(0), at(0)),
            ],
        );
        let summary = Summary::from_run(&run);

        assert_eq!(summary.overall_status, OverallStatus::Inconclusive);
        assert_eq!(summary.failed_agents, summary.total_agents);
        assert_eq!(summary.total_issues, 0);
        assert_eq!(summary.agent_errors.len(), 2);
    }

    #[test]
    fn test_failed_slot_while_others_run_is_not_inconclusive() {
        let run = run_with(
            3,
            vec![AgentResult::failure(2, "agent panicked: browser crashed", at(0), at(4))],
        );
        let summary = Summary::from_run(&run);

        assert_eq!(summary.run_status, RunStatus::Running);
        assert_eq!(summary.overall_status, OverallStatus::Healthy);
        assert_eq!(summary.failed_agents, 1);
        assert_eq!(summary.pending_agents, 2);
    }

    #[test]
    fn test_partial_failure_with_clean_agent_is_healthy() {
        let run = run_with(
            2,
            vec![
                AgentResult::failure(1, "agent timed out after 300s", at(0), at(300)),
                AgentResult::success(0, vec![], at(0), at(20)),
            ],
        );
        let summary = Summary::from_run(&run);

        assert_eq!(summary.overall_status, OverallStatus::Healthy);
        assert_eq!(
            summary.agent_errors,
            vec![AgentError {
                agent_index: 1,
                message: "agent timed out after 300s".to_string(),
            }]
        );
        assert_eq!(summary.duration_formatted.as_deref(), Some("5m 00s"));
    }

    #[test]
    fn test_pending_run() {
        let summary = Summary::from_run(&run_with(3, vec![]));
        assert_eq!(summary.run_status, RunStatus::Pending);
        assert_eq!(summary.overall_status, OverallStatus::Healthy);
        assert_eq!(summary.pending_agents, 3);
        assert_eq!(summary.duration_secs, None);
        assert!(!summary.is_final());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }

    #[test]
    fn test_unknown_run_payload() {
        let registry = RunRegistry::new();
        let payload = summary_payload(&registry, &RunId::from("missing"));
        assert_eq!(payload, json!({ "error": "unknown run: missing" }));
    }

    #[test]
    fn test_summary_json_shape() {
        let run = run_with(
            1,
            vec![AgentResult::success(
                0,
                vec![Finding::new("broken-link", "404 on /about", Severity::High)],
                at(0),
                at(2),
            )],
        );
        let json = serde_json::to_value(Summary::from_run(&run)).unwrap();

        assert_eq!(json["overall_status"], "critical");
        assert_eq!(json["status_emoji"], "🔴");
        assert_eq!(json["severity_breakdown"]["high_severity"][0]["category"], "broken-link");
        assert_eq!(json["severity_breakdown"]["medium_severity"], json!([]));
        assert_eq!(json["run_status"], "completed");
    }
}
