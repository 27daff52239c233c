//! Command registry and built-in commands.
//!
//! Commands are registered by name and invoked with JSON input/output.

use crate::context::AppContext;
use crate::resolver::ServiceType;
use crate::restart::{plan_restart, restart_services, RestartRequest, ValidationError};
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, CommandError>> + Send + 'a>>;

/// Signature for all engine commands.
pub type CommandHandler = for<'a> fn(Value, &'a AppContext) -> HandlerFuture<'a>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The command ran but part of its work failed; `data` holds the
    /// partial result.
    #[error("{message}")]
    Failed { message: String, data: Value },
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CommandError::InvalidInput(_) => ErrorCode::InvalidInput,
            CommandError::Failed { .. } => ErrorCode::OperationFailed,
            CommandError::Other(_) => ErrorCode::InternalError,
        }
    }
}

impl From<ValidationError> for CommandError {
    fn from(e: ValidationError) -> Self {
        CommandError::InvalidInput(e.to_string())
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, CommandError> {
    // `null` behaves like `{}` so every field falls back to its default.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| CommandError::InvalidInput(e.to_string()))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        // Register built-in commands
        reg.register("ping", cmd_ping);
        reg.register("resolve_service_name", cmd_resolve_service_name);
        reg.register("restart_plan", cmd_restart_plan);
        reg.register("restart_service", cmd_restart_service);
        reg
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Execute a command by name and return a full CommandResult.
    pub async fn execute(&self, name: &str, args: Value, ctx: &AppContext) -> CommandResult {
        let run_id = new_run_id();
        let start = Instant::now();

        let handler = match self.handlers.get(name) {
            Some(h) => h,
            None => {
                return result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    ErrorCode::InvalidInput,
                    format!("unknown command: {}", name),
                );
            }
        };

        match handler(args, ctx).await {
            Ok(data) => {
                let mut r = result_ok("call", name, &run_id, start.elapsed().as_millis() as u64);
                r.data = Some(data);
                r
            }
            Err(CommandError::Failed { message, data }) => result_fail(
                "call",
                name,
                &run_id,
                start.elapsed().as_millis() as u64,
                message,
                data,
            ),
            Err(e) => result_err(
                "call",
                name,
                &run_id,
                start.elapsed().as_millis() as u64,
                e.error_code(),
                e.to_string(),
            ),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Built-in commands
// ===========================================================================

/// `ping` – returns { "pong": true }. Proves wiring works.
fn cmd_ping(_args: Value, _ctx: &AppContext) -> HandlerFuture<'_> {
    Box::pin(async { Ok(serde_json::json!({ "pong": true })) })
}

#[derive(serde::Deserialize)]
struct ResolveArgs {
    service_type: ServiceType,
    #[serde(default)]
    instance_name: Option<String>,
}

/// `resolve_service_name` – map a logical type to its OS service name.
///
/// Args: `{ "service_type": "agent", "instance_name": "SQL2019" }`
/// Returns: `{ "service_name": "SQLAgent$SQL2019" }`
fn cmd_resolve_service_name(args: Value, ctx: &AppContext) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ResolveArgs = parse_args(args)?;
        let name = ctx
            .resolver()
            .resolve(args.service_type, args.instance_name.as_deref())
            .map_err(|e| CommandError::InvalidInput(e.to_string()))?;
        Ok(serde_json::json!({ "service_name": name }))
    })
}

/// `restart_plan` – dry run: the ordered services a restart would touch.
///
/// Args: same as `restart_service`.
fn cmd_restart_plan(args: Value, ctx: &AppContext) -> HandlerFuture<'_> {
    Box::pin(async move {
        let request: RestartRequest = parse_args(args)?;
        let plan = plan_restart(ctx.resolver(), &request)?;
        serde_json::to_value(&plan).map_err(|e| CommandError::Other(e.to_string()))
    })
}

/// `restart_service` – stop, start and verify every service the request
/// expands to.
///
/// Args: `{ "instance_name"?, "service_type"?, "force"?, "timeout_seconds"? }`
/// Returns: the restart report; fails with the report attached when any
/// service failed.
fn cmd_restart_service(args: Value, ctx: &AppContext) -> HandlerFuture<'_> {
    Box::pin(async move {
        let request: RestartRequest = parse_args(args)?;
        let report = restart_services(ctx, &request).await?;

        let mut data = serde_json::to_value(&report).map_err(|e| CommandError::Other(e.to_string()))?;
        data["report"] = Value::String(report.render());

        if report.overall_failed() {
            return Err(CommandError::Failed {
                message: format!(
                    "{} of {} services failed to restart",
                    report.fail_count(),
                    report.total()
                ),
                data,
            });
        }
        Ok(data)
    })
}

// ===========================================================================
// Tests
// ===========================================================================
