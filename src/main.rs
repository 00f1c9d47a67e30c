use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use vibetest::config::{self, Config};
use vibetest::explorer::{Explorer, ProcessExplorer, StaticExplorer};
use vibetest::report::{render_text, save_summary};
use vibetest::{McpServer, PoolConfig, PoolOrchestrator, RunError, normalize_url};

/// Vibetest - automated website QA with a pool of exploration agents
#[derive(Parser, Debug)]
#[command(
    name = "vibetest",
    about = "Automated website QA with a pool of independent exploration agents",
    after_help = "ENVIRONMENT VARIABLES:\n\
        GOOGLE_API_KEY           Credential handed to the explorer (see VIBETEST_API_KEY_VAR)\n\
        VIBETEST_AGENTS          Default number of agents\n\
        VIBETEST_AGENT_TIMEOUT   Per-agent deadline (seconds)\n\
        VIBETEST_EXPLORER_CMD    Explorer program launched per agent\n\
        VIBETEST_RESULTS_DIR     Directory for saved results\n\
        RUST_LOG                 Log filter (default: vibetest=info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Test a website and print the aggregated report
    Run {
        /// Website to test (https:// is assumed when no scheme is given)
        url: String,

        /// Number of independent agents
        #[arg(short, long, env = "VIBETEST_AGENTS", default_value_t = config::DEFAULT_AGENTS)]
        agents: usize,

        /// Show browser windows instead of running headless
        #[arg(long)]
        visual: bool,

        /// Per-agent deadline in seconds
        #[arg(long, env = "VIBETEST_AGENT_TIMEOUT", default_value_t = config::DEFAULT_AGENT_TIMEOUT)]
        agent_timeout: u64,

        /// How long to wait for all agents, in seconds
        #[arg(long, env = "VIBETEST_WAIT_TIMEOUT", default_value_t = config::DEFAULT_WAIT_TIMEOUT)]
        wait_timeout: u64,

        /// Explorer command line (program and arguments)
        #[arg(long, env = "VIBETEST_EXPLORER_CMD")]
        explorer: Option<String>,

        /// Skip the explorer and report no findings (exercises the pool only)
        #[arg(long)]
        dry_run: bool,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,

        /// Save the summary as vibetest_results_<run_id>.json
        #[arg(long)]
        save: bool,

        /// Directory for saved results
        #[arg(short, long, env = "VIBETEST_RESULTS_DIR")]
        output: Option<PathBuf>,
    },

    /// Serve the vibetest tools over JSON-RPC on stdin/stdout
    Serve {
        /// Explorer command line (program and arguments)
        #[arg(long, env = "VIBETEST_EXPLORER_CMD")]
        explorer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let args = Args::parse();
    let cfg = config::get();

    match args.command {
        Some(Commands::Run {
            url,
            agents,
            visual,
            agent_timeout,
            wait_timeout,
            explorer,
            dry_run,
            json,
            save,
            output,
        }) => {
            let explorer: Arc<dyn Explorer> = if dry_run {
                Arc::new(StaticExplorer::default())
            } else {
                Arc::new(build_explorer(cfg, explorer.as_deref())?)
            };

            let api_key = cfg.api_key();
            if api_key.is_none() && !dry_run {
                eprintln!(
                    "Warning: {} is not set; every agent will fail without a credential.",
                    cfg.explorer.api_key_var
                );
            }

            let pool_config = PoolConfig::default()
                .agent_timeout(Duration::from_secs(agent_timeout))
                .max_agents(cfg.pool.max_agents)
                .api_key(api_key);
            let pool = PoolOrchestrator::new(explorer, pool_config);

            let url = normalize_url(&url);
            let headless = !visual;
            let run_id = pool.run_pool(&url, agents, headless)?;

            if !json {
                println!("Starting test on: {}", url);
                println!("   Agents: {}", agents);
                println!("   Mode: {}", if headless { "Headless" } else { "Visual" });
                println!("   Run ID: {}", run_id);
                println!();
            }

            match pool
                .wait_for_completion(&run_id, Duration::from_secs(wait_timeout))
                .await
            {
                Ok(_) => {}
                Err(RunError::WaitTimeout { completed, total, .. }) => {
                    eprintln!(
                        "Warning: only {}/{} agents reported within {}s; showing partial results.",
                        completed, total, wait_timeout
                    );
                }
                Err(e) => return Err(e.into()),
            }

            let summary = pool.summarize(&run_id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render_text(&summary));
            }

            if save {
                let dir = output.unwrap_or_else(|| PathBuf::from(&cfg.output.results_dir));
                let path = save_summary(&dir, &summary)?;
                if !json {
                    println!("\nDetailed results saved to: {}", path.display());
                }
            }
        }

        Some(Commands::Serve { explorer }) => {
            let explorer = build_explorer(cfg, explorer.as_deref())?;
            let pool_config = PoolConfig::default()
                .agent_timeout(cfg.pool.agent_timeout())
                .max_agents(cfg.pool.max_agents)
                .api_key(cfg.api_key());
            let pool = PoolOrchestrator::new(Arc::new(explorer), pool_config);

            let server = McpServer::new(pool, cfg.pool.agents, cfg.pool.headless);
            server.serve_stdio().await?;
        }

        None => {
            println!("Vibetest - automated website QA with a pool of exploration agents");
            println!();
            println!("Usage: vibetest <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run     Test a website and print the aggregated report");
            println!("  serve   Serve the vibetest tools over JSON-RPC on stdin/stdout");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for JSON output and the stdio server
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vibetest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_explorer(cfg: &Config, command: Option<&str>) -> Result<ProcessExplorer, Box<dyn Error>> {
    let command = command.unwrap_or(cfg.explorer.command.as_str());
    let (program, args) = config::split_command(command)
        .ok_or_else(|| format!("Invalid explorer command '{}'", command))?;

    Ok(ProcessExplorer::new(program)
        .args(args)
        .api_key_var(&cfg.explorer.api_key_var))
}
