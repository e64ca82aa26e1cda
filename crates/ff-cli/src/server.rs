use std::sync::Arc;

use ff_core::{CounterConfig, Timestamp, VisitCounter};
use ff_store::{ScopeStore, Store};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Resolve an optional ISO-8601 timestamp argument, defaulting to the
/// current clock.
pub fn resolve_at(at: Option<&str>) -> Result<Timestamp, String> {
    match at {
        None => Ok(Timestamp::now()),
        Some(text) => Timestamp::parse_iso8601(text)
            .ok_or_else(|| format!("'{text}' is not an ISO-8601 timestamp")),
    }
}

#[derive(Clone)]
pub struct FootfallServer {
    state: Arc<Mutex<ServerState>>,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    counter: VisitCounter<Store>,
    rng: SmallRng,
    scope_id: String,
}

impl FootfallServer {
    pub fn new(scope: ScopeStore, config: CounterConfig) -> Self {
        let scope_id = scope.scope_id().to_string();
        Self {
            state: Arc::new(Mutex::new(ServerState {
                counter: VisitCounter::with_config(scope.into_store(), config),
                rng: SmallRng::from_os_rng(),
                scope_id,
            })),
            tool_router: Self::tool_router(),
        }
    }

    /// Flush the WAL into the scope database. Runs once the service has
    /// ended; `Store`'s drop does the same but may not run on runtime
    /// shutdown.
    pub async fn checkpoint_wal(&self) {
        let state = self.state.lock().await;
        if let Err(e) = state.counter.store().checkpoint_truncate() {
            tracing::warn!("WAL checkpoint failed: {e}");
            return;
        }
        tracing::info!("WAL checkpoint complete for scope '{}'", state.scope_id);
    }

    fn at(req: &AtRequest) -> Result<Timestamp, McpError> {
        resolve_at(req.at.as_deref()).map_err(|msg| McpError::invalid_params(msg, None))
    }
}

fn storage_error(e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("storage unavailable: {e}"), None)
}

fn json_result(value: &impl serde::Serialize) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct AtRequest {
    /// Optional ISO-8601 timestamp to evaluate at (e.g. "2024-03-01T09:30:00Z").
    /// Defaults to the current time.
    at: Option<String>,
}

#[tool_router]
impl FootfallServer {
    #[tool(
        description = "Record one page load. Creates the visitor identity on first use, decides whether this load opens a new session (more than the configured inactivity gap, default 30 minutes, since the previous load), and bumps today's and this month's counters. Returns visitor_id, is_new_session and session_count."
    )]
    async fn ff_record_visit(
        &self,
        Parameters(req): Parameters<AtRequest>,
    ) -> Result<CallToolResult, McpError> {
        let now = Self::at(&req)?;
        let mut state = self.state.lock().await;
        let ServerState { counter, rng, .. } = &mut *state;

        let snapshot = counter.record_visit(now, rng).map_err(storage_error)?;
        Ok(json_result(&snapshot))
    }

    #[tool(
        description = "Read-only analytics summary: today/yesterday/this month/last month keys and counts, total sessions, first and last seen timestamps. Never modifies stored state."
    )]
    async fn ff_summary(
        &self,
        Parameters(req): Parameters<AtRequest>,
    ) -> Result<CallToolResult, McpError> {
        let now = Self::at(&req)?;
        let state = self.state.lock().await;

        let summary = state.counter.summary(now).map_err(storage_error)?;
        Ok(json_result(&summary))
    }

    #[tool(
        description = "Whether the visitor's first-ever visit falls on the same calendar day (UTC) as the given time, or no visit has been recorded yet. Read-only."
    )]
    async fn ff_new_visitor_today(
        &self,
        Parameters(req): Parameters<AtRequest>,
    ) -> Result<CallToolResult, McpError> {
        let now = Self::at(&req)?;
        let state = self.state.lock().await;

        let is_new = state
            .counter
            .is_new_visitor_today(now)
            .map_err(storage_error)?;
        Ok(json_result(&serde_json::json!({
            "scope": state.scope_id,
            "is_new_visitor_today": is_new,
        })))
    }
}

#[tool_handler]
impl ServerHandler for FootfallServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Local visit counter for one storage scope.\n\n\
                 - Call ff_record_visit once per page load.\n\
                 - Call ff_summary to render analytics; it never writes.\n\
                 - Call ff_new_visitor_today to ask whether the visitor first appeared today.\n\
                 All tools accept an optional ISO-8601 `at` timestamp; calendar keys are UTC."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
