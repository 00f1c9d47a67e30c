//! Explorer backed by an external program.
//!
//! The program is started once per agent slot as
//! `<command> [args..] --url <url> [--headless]`, with the credential in its
//! environment, and must print its findings to stdout as JSON: either a bare
//! array or an object with a `findings` array. Each finding carries
//! `category`, `description` and `severity` (`high`, `medium` or `low`).

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{ApiKey, ExploreError, ExploreResult, ExploreTarget, Explorer};
use crate::run::Finding;

/// Environment variable telling the program which slot it fills
pub const ENV_AGENT_INDEX: &str = "VIBETEST_AGENT_INDEX";

#[derive(Debug, Clone)]
pub struct ProcessExplorer {
    program: String,
    args: Vec<String>,
    api_key_var: String,
}

impl ProcessExplorer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            api_key_var: crate::config::DEFAULT_API_KEY_VAR.to_string(),
        }
    }

    /// Arguments placed before `--url`
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Name of the variable the credential is exported under
    pub fn api_key_var(mut self, var: impl Into<String>) -> Self {
        self.api_key_var = var.into();
        self
    }

    fn command(&self, target: &ExploreTarget, api_key: &ApiKey) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("--url").arg(&target.url);
        if target.headless {
            command.arg("--headless");
        }
        command
            .env(&self.api_key_var, api_key.expose())
            .env(ENV_AGENT_INDEX, target.agent_index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A supervisor timeout drops the future; take the child down with it
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Explorer for ProcessExplorer {
    async fn explore(&self, target: &ExploreTarget, api_key: Option<&ApiKey>) -> ExploreResult<Vec<Finding>> {
        let api_key = api_key.ok_or(ExploreError::MissingCredential)?;

        debug!(program = %self.program, agent_index = target.agent_index, "spawning explorer");
        let output = self
            .command(target, api_key)
            .output()
            .await
            .map_err(|source| ExploreError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExploreError::Process {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_findings(&output.stdout)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FindingsPayload {
    List(Vec<Finding>),
    Wrapped { findings: Vec<Finding> },
}

/// Parse an explorer's stdout into findings.
///
/// Empty output is an error: a program that printed nothing did not report
/// a clean site.
pub fn parse_findings(stdout: &[u8]) -> ExploreResult<Vec<Finding>> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Err(ExploreError::InvalidOutput("explorer printed nothing".to_string()));
    }

    match serde_json::from_str::<FindingsPayload>(text) {
        Ok(FindingsPayload::List(findings)) => Ok(findings),
        Ok(FindingsPayload::Wrapped { findings }) => Ok(findings),
        Err(e) => Err(ExploreError::InvalidOutput(e.to_string())),
    }
}
