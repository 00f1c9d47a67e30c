//! JSON-RPC tool server exposing the pool over stdio.
//!
//! Tools:
//! - `vibetest_start {url, num_agents?, headless?}` starts a run and returns its id
//! - `vibetest_results {run_id}` returns the current summary, or `{"error": ...}`

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::orchestrator::{PoolOrchestrator, normalize_url};
use crate::run::RunId;
use crate::summary::summary_payload;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server state shared across request handling
pub struct McpServer {
    pool: PoolOrchestrator,
    default_agents: usize,
    default_headless: bool,
}

impl McpServer {
    pub fn new(pool: PoolOrchestrator, default_agents: usize, default_headless: bool) -> Self {
        Self {
            pool,
            default_agents,
            default_headless,
        }
    }

    pub fn pool(&self) -> &PoolOrchestrator {
        &self.pool
    }

    /// Handle one JSON-RPC message. Notifications (no `id`) get no response.
    pub fn handle_request(&self, req: &Value) -> Option<Value> {
        let id = req.get("id").cloned()?;
        let method = req.get("method").and_then(|m| m.as_str()).unwrap_or("");

        let response = match method {
            "initialize" => json_rpc_result(id, handle_initialize()),
            "tools/list" => json_rpc_result(id, handle_tools_list()),
            "tools/call" => {
                let params = req.get("params").cloned().unwrap_or(json!({}));
                json_rpc_result(id, self.handle_tools_call(&params))
            }
            "ping" => json_rpc_result(id, json!({})),
            _ => json_rpc_error(id, -32601, "Method not found"),
        };
        Some(response)
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Value>(&line) {
                Ok(req) => self.handle_request(&req),
                Err(e) => {
                    warn!(error = %e, "unparseable request");
                    Some(json_rpc_error(Value::Null, -32700, "Parse error"))
                }
            };

            if let Some(response) = response {
                let mut text = response.to_string();
                text.push('\n');
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        debug!("stdin closed, stopping server");
        Ok(())
    }

    fn handle_tools_call(&self, params: &Value) -> Value {
        let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match tool_name {
            "vibetest_start" => self.tool_start(&arguments),
            "vibetest_results" => self.tool_results(&arguments),
            _ => tool_error(json!({ "error": format!("Unknown tool: {tool_name}") })),
        }
    }

    fn tool_start(&self, args: &Value) -> Value {
        let url = normalize_url(args.get("url").and_then(|v| v.as_str()).unwrap_or(""));
        let headless = args
            .get("headless")
            .and_then(|v| v.as_bool())
            .unwrap_or(self.default_headless);

        let num_agents = match args.get("num_agents") {
            None | Some(Value::Null) => self.default_agents,
            Some(v) => match v.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(n) => n,
                None => {
                    return tool_error(json!({
                        "error": format!("validation error: num_agents must be a positive integer (got {v})")
                    }));
                }
            },
        };

        match self.pool.run_pool(&url, num_agents, headless) {
            Ok(run_id) => tool_text(json!({
                "run_id": run_id,
                "url": url,
                "num_agents": num_agents,
                "headless": headless,
            })),
            Err(e) => tool_error(json!({ "error": e.to_string() })),
        }
    }

    fn tool_results(&self, args: &Value) -> Value {
        let run_id = RunId::from(args.get("run_id").and_then(|v| v.as_str()).unwrap_or(""));
        let payload = summary_payload(self.pool.registry(), &run_id);
        if payload.get("error").is_some() {
            tool_error(payload)
        } else {
            tool_text(payload)
        }
    }
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": "vibetest",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {}
        }
    })
}

fn handle_tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": "vibetest_start",
                "description": "Launch a pool of exploration agents against a website and return a run id",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Website to test; https:// is assumed when no scheme is given"
                        },
                        "num_agents": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Number of independent agents to launch"
                        },
                        "headless": {
                            "type": "boolean",
                            "description": "Run browsers without a visible window"
                        }
                    },
                    "required": ["url"]
                }
            },
            {
                "name": "vibetest_results",
                "description": "Summarize the findings of a run, classified by severity",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "run_id": {
                            "type": "string",
                            "description": "Id returned by vibetest_start"
                        }
                    },
                    "required": ["run_id"]
                }
            }
        ]
    })
}

fn tool_text(payload: Value) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": payload.to_string()
        }]
    })
}

fn tool_error(payload: Value) -> Value {
    json!({
        "isError": true,
        "content": [{
            "type": "text",
            "text": payload.to_string()
        }]
    })
}

fn json_rpc_result(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        }
    })
}
