//! Vibetest - automated website QA with a pool of exploration agents.
//!
//! This crate provides:
//! - A run registry tracking in-flight and completed test runs
//! - A pool orchestrator fanning one URL out to N supervised agents
//! - Per-agent supervision: deadlines, error and panic capture, exactly-once reporting
//! - Severity aggregation into a single run verdict
//! - A JSON-RPC tool server for driving runs from an assistant
//!
//! What an agent actually does on the page is behind the [`Explorer`] trait.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vibetest::{PoolConfig, PoolOrchestrator, ProcessExplorer};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let explorer = Arc::new(ProcessExplorer::new("vibetest-explorer"));
//! let pool = PoolOrchestrator::new(explorer, PoolConfig::default());
//!
//! let run_id = pool.run_pool("https://example.com", 3, true)?;
//! pool.wait_for_completion(&run_id, Duration::from_secs(600)).await?;
//! let summary = pool.summarize(&run_id)?;
//! println!("{} {}", summary.status_emoji, summary.overall_status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod explorer;
pub mod mcp;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod run;
pub mod summary;
pub mod supervisor;

// Re-export run types
pub use error::{RunError, RunResult};
pub use run::{AgentOutcome, AgentResult, Finding, Run, RunId, RunStatus, Severity};

// Re-export the pool
pub use orchestrator::{PoolConfig, PoolOrchestrator, normalize_url, validate_url};
pub use registry::{RunProgress, RunRegistry};
pub use supervisor::AgentSupervisor;

// Re-export the explorer boundary
pub use explorer::{ApiKey, ExploreError, ExploreResult, ExploreTarget, Explorer, ProcessExplorer, StaticExplorer};

// Re-export aggregation
pub use summary::{AgentError, OverallStatus, SeverityBreakdown, Summary, summarize_bug_reports, summary_payload};

pub use mcp::McpServer;
