//! Presentation and persistence of run summaries for the command line.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::run::RunId;
use crate::summary::{OverallStatus, Summary};

const RULE: &str = "============================================================";

/// File name a summary is saved under: `vibetest_results_<run_id>.json`
pub fn results_file_name(run_id: &RunId) -> String {
    format!("vibetest_results_{}.json", sanitize_name(run_id.as_str()))
}

/// Write a summary as pretty JSON into `dir`, returning the file path
pub fn save_summary(dir: &Path, summary: &Summary) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(results_file_name(&summary.run_id));
    fs::write(&path, serde_json::to_string_pretty(summary)?)?;
    Ok(path)
}

/// Render the plain-text report printed by `vibetest run`
pub fn render_text(summary: &Summary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "TEST RESULTS");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Status: {} {}", summary.status_emoji, summary.overall_status);
    let _ = writeln!(out, "Description: {}", summary.status_description);
    if let Some(duration) = &summary.duration_formatted {
        let _ = writeln!(out, "Duration: {}", duration);
    }

    let _ = writeln!(out, "\nAgents Summary:");
    let _ = writeln!(out, "  • Total agents: {}", summary.total_agents);
    let _ = writeln!(out, "  • Successful: {}", summary.successful_agents);
    let _ = writeln!(out, "  • Failed: {}", summary.failed_agents);
    if summary.pending_agents > 0 {
        let _ = writeln!(out, "  • Still running: {}", summary.pending_agents);
    }
    for error in &summary.agent_errors {
        let _ = writeln!(out, "    agent {}: {}", error.agent_index, error.message);
    }

    let _ = writeln!(out, "\nIssues Found: {}", summary.total_issues);

    let sections = [
        ("🔴 HIGH SEVERITY ISSUES:", &summary.severity_breakdown.high),
        ("🟠 MEDIUM SEVERITY ISSUES:", &summary.severity_breakdown.medium),
        ("🟡 LOW SEVERITY ISSUES:", &summary.severity_breakdown.low),
    ];
    for (title, findings) in sections {
        if findings.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", title);
        for finding in findings {
            let _ = writeln!(out, "  • [{}] {}", finding.category, finding.description);
        }
    }

    match summary.overall_status {
        OverallStatus::Healthy if summary.failed_agents == 0 => {
            let _ = writeln!(out, "\nNo issues detected! The website appears to be working well.");
        }
        OverallStatus::Healthy | OverallStatus::Inconclusive => {
            let _ = writeln!(
                out,
                "\nNote: {} of {} agents failed; their part of the site was not checked.",
                summary.failed_agents, summary.total_agents
            );
        }
        OverallStatus::Critical | OverallStatus::Warning => {}
    }

    let _ = writeln!(out, "\n{}", RULE);
    out
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{AgentResult, Finding, Run, Severity};
    use chrono::Utc;

    fn summary(results: Vec<AgentResult>, num_agents: usize) -> Summary {
        Summary::from_run(&Run {
            id: RunId::from("3f2a-run"),
            url: "https://example.com".to_string(),
            num_agents,
            headless: true,
            created_at: Utc::now(),
            results,
        })
    }

    #[test]
    fn test_results_file_name() {
        assert_eq!(results_file_name(&RunId::from("abc-123")), "vibetest_results_abc-123.json");
        assert_eq!(results_file_name(&RunId::from("../evil")), "vibetest_results____evil.json");
    }

    #[test]
    fn test_save_summary_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let summary = summary(vec![AgentResult::success(0, vec![], now, now)], 1);

        let path = save_summary(dir.path(), &summary).unwrap();
        assert!(path.ends_with("vibetest_results_3f2a-run.json"));

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["run_id"], "3f2a-run");
        assert_eq!(saved["overall_status"], "healthy");
    }

    #[test]
    fn test_render_text_lists_findings_by_severity() {
        let now = Utc::now();
        let findings = vec![
            Finding::new("broken-link", "404 on /about", Severity::High),
            Finding::new("a11y", "missing alt text", Severity::Low),
        ];
        let text = render_text(&summary(vec![AgentResult::success(0, findings, now, now)], 1));

        assert!(text.contains("Status: 🔴 Critical"));
        assert!(text.contains("🔴 HIGH SEVERITY ISSUES:\n  • [broken-link] 404 on /about"));
        assert!(text.contains("  • [a11y] missing alt text"));
        assert!(!text.contains("MEDIUM SEVERITY"));
    }

    #[test]
    fn test_render_text_flags_failed_agents() {
        let now = Utc::now();
        let text = render_text(&summary(
            vec![AgentResult::failure(0, "no API key configured for the exploration agent", now, now)],
            1,
        ));

        assert!(text.contains("Inconclusive"));
        assert!(text.contains("agent 0: no API key configured"));
        assert!(text.contains("1 of 1 agents failed"));
    }
}
