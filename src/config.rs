//! Configuration management with environment variable support.
//!
//! This module is the caller-side configuration layer. The pool itself never
//! reads the environment: the CLI and MCP server resolve a [`Config`] here and
//! pass explicit values (including the credential) into the orchestrator.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VIBETEST_AGENTS` | Agents launched per run | `3` |
//! | `VIBETEST_MAX_AGENTS` | Upper bound accepted for a run | `20` |
//! | `VIBETEST_AGENT_TIMEOUT` | Per-agent deadline in seconds | `300` |
//! | `VIBETEST_WAIT_TIMEOUT` | How long the CLI waits for a run (seconds) | `600` |
//! | `VIBETEST_HEADLESS` | Run browsers headless (`true`/`false`) | `true` |
//! | `VIBETEST_EXPLORER_CMD` | Explorer program launched per agent | `vibetest-explorer` |
//! | `VIBETEST_API_KEY_VAR` | Variable holding the explorer credential | `GOOGLE_API_KEY` |
//! | `VIBETEST_RESULTS_DIR` | Directory for saved result files | `.` |
//!
//! # Example
//!
//! ```bash
//! export VIBETEST_AGENTS=5
//! export VIBETEST_EXPLORER_CMD="python -m vibetest_explorer"
//! export GOOGLE_API_KEY="..."
//! ```

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use crate::explorer::ApiKey;

// ============================================================================
// Default Values
// ============================================================================

/// Default number of agents per run
pub const DEFAULT_AGENTS: usize = 3;

/// Default upper bound on agents per run
pub const DEFAULT_MAX_AGENTS: usize = 20;

/// Default per-agent deadline (seconds)
pub const DEFAULT_AGENT_TIMEOUT: u64 = 300;

/// Default time the CLI waits for a run to complete (seconds)
pub const DEFAULT_WAIT_TIMEOUT: u64 = 600;

/// Default browser mode
pub const DEFAULT_HEADLESS: bool = true;

/// Default explorer program
pub const DEFAULT_EXPLORER_CMD: &str = "vibetest-explorer";

/// Default variable the credential is read from and exported as
pub const DEFAULT_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Default directory for saved results
pub const DEFAULT_RESULTS_DIR: &str = ".";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_AGENTS: &str = "VIBETEST_AGENTS";
pub const ENV_MAX_AGENTS: &str = "VIBETEST_MAX_AGENTS";
pub const ENV_AGENT_TIMEOUT: &str = "VIBETEST_AGENT_TIMEOUT";
pub const ENV_WAIT_TIMEOUT: &str = "VIBETEST_WAIT_TIMEOUT";
pub const ENV_HEADLESS: &str = "VIBETEST_HEADLESS";
pub const ENV_EXPLORER_CMD: &str = "VIBETEST_EXPLORER_CMD";
pub const ENV_API_KEY_VAR: &str = "VIBETEST_API_KEY_VAR";
pub const ENV_RESULTS_DIR: &str = "VIBETEST_RESULTS_DIR";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pool: PoolSettings,
    pub explorer: ExplorerSettings,
    pub output: OutputSettings,
}

/// Agent pool settings
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub agents: usize,
    pub max_agents: usize,
    /// Per-agent deadline (seconds)
    pub agent_timeout: u64,
    /// Caller-side wait for run completion (seconds)
    pub wait_timeout: u64,
    pub headless: bool,
}

/// Explorer program settings
#[derive(Debug, Clone)]
pub struct ExplorerSettings {
    /// Command line of the explorer, split on whitespace
    pub command: String,
    /// Variable holding the credential
    pub api_key_var: String,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub results_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            pool: PoolSettings::from_env(),
            explorer: ExplorerSettings::from_env(),
            output: OutputSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            pool: PoolSettings::defaults(),
            explorer: ExplorerSettings::defaults(),
            output: OutputSettings::defaults(),
        }
    }

    /// Resolve the explorer credential from the configured variable
    pub fn api_key(&self) -> Option<ApiKey> {
        env::var(&self.explorer.api_key_var).ok().and_then(ApiKey::new)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolSettings {
    pub fn from_env() -> Self {
        Self {
            agents: parse_env(ENV_AGENTS).unwrap_or(DEFAULT_AGENTS),
            max_agents: parse_env(ENV_MAX_AGENTS).unwrap_or(DEFAULT_MAX_AGENTS),
            agent_timeout: parse_env(ENV_AGENT_TIMEOUT).unwrap_or(DEFAULT_AGENT_TIMEOUT),
            wait_timeout: parse_env(ENV_WAIT_TIMEOUT).unwrap_or(DEFAULT_WAIT_TIMEOUT),
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(DEFAULT_HEADLESS),
        }
    }

    pub fn defaults() -> Self {
        Self {
            agents: DEFAULT_AGENTS,
            max_agents: DEFAULT_MAX_AGENTS,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            headless: DEFAULT_HEADLESS,
        }
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }
}

impl ExplorerSettings {
    pub fn from_env() -> Self {
        Self {
            command: env::var(ENV_EXPLORER_CMD).unwrap_or_else(|_| DEFAULT_EXPLORER_CMD.to_string()),
            api_key_var: env::var(ENV_API_KEY_VAR).unwrap_or_else(|_| DEFAULT_API_KEY_VAR.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            command: DEFAULT_EXPLORER_CMD.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
        }
    }
}

impl OutputSettings {
    pub fn from_env() -> Self {
        Self {
            results_dir: env::var(ENV_RESULTS_DIR).unwrap_or_else(|_| DEFAULT_RESULTS_DIR.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean flag: true/false, yes/no, 1/0, on/off
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split an explorer command line into program and arguments using shell
/// quoting rules. `None` for an empty or unbalanced command line.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = shlex::split(command)?.into_iter();
    let program = parts.next()?;
    Some((program, parts.collect()))
}
