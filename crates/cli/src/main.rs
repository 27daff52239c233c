//! `sqladmin` – SQL Server service administration CLI.
//!
//! Thin front end over the engine crate: parses arguments, loads
//! configuration, and renders the engine's `CommandResult`s.

mod config;
mod logging;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use crate::config::AppConfig;
use sqladmin_engine::platform::{default_service_control, PowerShellServiceControl};
use sqladmin_engine::resolver::{ServiceNameTable, ServiceTarget, ServiceType};
use sqladmin_engine::traits::ServiceControlOps;
use sqladmin_engine::types::*;
use sqladmin_engine::{AppContext, CommandRegistry, CommandResult};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "sqladmin",
    version,
    about = "SQL Server service administration"
)]
struct Cli {
    /// Enable debug logging (overrides the configured level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct RestartArgs {
    /// Instance name; omit (or MSSQLSERVER) for the default instance.
    #[arg(long)]
    instance: Option<String>,
    /// Service type: all | engine | agent | browser | fulltext | analysis |
    /// integration | reporting | polybase | launchpad
    #[arg(long = "service-type", default_value = "all")]
    service_type: ServiceTarget,
    /// Also restart the Engine's dependents (Agent, PolyBase, Launchpad).
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    force: bool,
    /// Per-step timeout in seconds. Defaults to the configured value.
    #[arg(long)]
    timeout: Option<i64>,
}

impl RestartArgs {
    fn to_json(&self, config: &AppConfig) -> serde_json::Value {
        serde_json::json!({
            "instance_name": self.instance,
            "service_type": self.service_type,
            "force": self.force,
            "timeout_seconds": self.timeout.unwrap_or(config.restart.default_timeout_seconds),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stop, start and verify SQL Server services.
    Restart {
        #[command(flatten)]
        args: RestartArgs,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON instead of the text report.
        #[arg(long)]
        json: bool,
        /// Directory for artifacts output.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show which services a restart would touch, without touching them.
    Plan {
        #[command(flatten)]
        args: RestartArgs,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the OS service name for a service type.
    Resolve {
        service_type: ServiceType,
        #[arg(long)]
        instance: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Invoke an engine command by name with JSON args.
    Call {
        /// Command name (see `sqladmin commands`).
        cmd: String,
        /// JSON args to pass to the command.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Directory for artifacts output.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// List the engine commands available to `call`.
    Commands,

    /// Print the effective configuration.
    Config,
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(2);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::config::get_config().context("failed to load configuration")?;
    logging::init_logging(&config.logging, cli.verbose);
    tracing::debug!(
        grace_period_ms = config.restart.grace_period_ms,
        require_confirmation = config.restart.require_confirmation,
        name_overrides = config.service_names.len(),
        "configuration loaded"
    );

    let ctx = build_context(config);
    let registry = CommandRegistry::new();

    match cli.command {
        Commands::Restart {
            args,
            yes,
            json,
            artifacts,
        } => cmd_restart(&args, yes, json, artifacts, config, &ctx, &registry).await,
        Commands::Plan { args, json } => {
            let result = registry
                .execute("restart_plan", args.to_json(config), &ctx)
                .await;
            output_result(&result, json);
        }
        Commands::Resolve {
            service_type,
            instance,
            json,
        } => {
            let args = serde_json::json!({
                "service_type": service_type,
                "instance_name": instance,
            });
            let result = registry.execute("resolve_service_name", args, &ctx).await;
            output_result(&result, json);
        }
        Commands::Call {
            cmd,
            args,
            json,
            artifacts,
        } => cmd_call(&cmd, &args, json, artifacts, &ctx, &registry).await,
        Commands::Commands => {
            for name in registry.list() {
                println!("{}", name);
            }
        }
        Commands::Config => {
            let j = serde_json::to_string_pretty(config).context("cannot render configuration")?;
            println!("{}", j);
        }
    }
    Ok(())
}

fn build_context(config: &AppConfig) -> AppContext {
    let services: Box<dyn ServiceControlOps> = if cfg!(windows) {
        Box::new(PowerShellServiceControl::with_program(
            config.restart.powershell_program.clone(),
        ))
    } else {
        default_service_control()
    };
    let names = ServiceNameTable::default().with_overrides(config.service_names.clone());
    AppContext::new(services, names)
        .with_grace_period(Duration::from_millis(config.restart.grace_period_ms))
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

async fn cmd_restart(
    args: &RestartArgs,
    yes: bool,
    json: bool,
    artifacts: Option<PathBuf>,
    config: &AppConfig,
    ctx: &AppContext,
    registry: &CommandRegistry,
) {
    let request = args.to_json(config);

    if config.restart.require_confirmation && !yes {
        // Show the plan first; an invalid request fails here without
        // touching any service.
        let plan = registry.execute("restart_plan", request.clone(), ctx).await;
        if plan.status != Status::Pass {
            output_result(&plan, json);
            return;
        }
        let names = plan_service_names(&plan);
        if !confirm(&names) {
            tracing::warn!(target_type = %args.service_type, "restart aborted at confirmation prompt");
            let r = result_err(
                "restart",
                &args.service_type.to_string(),
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                "restart not confirmed (pass --yes to skip the prompt)",
            );
            output_result(&r, json);
            return;
        }
    }

    let result = registry.execute("restart_service", request, ctx).await;
    if let Some(ref dir) = artifacts {
        write_artifacts(dir, &result);
    }
    output_result(&result, json);
}

fn plan_service_names(plan: &CommandResult) -> Vec<String> {
    plan.data
        .as_ref()
        .and_then(|d| d["services"].as_array())
        .map(|services| {
            services
                .iter()
                .filter_map(|s| s["descriptor"]["os_service_name"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Ask before restarting. Without a terminal there is nobody to ask, so
/// the answer is no.
fn confirm(names: &[String]) -> bool {
    if !std::io::stdin().is_terminal() {
        tracing::warn!("refusing to restart without confirmation: stdin is not a terminal");
        return false;
    }
    eprintln!("Services to restart (in order):");
    for name in names {
        eprintln!("  {}", name);
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("Restart {} service(s)?", names.len()))
        .default(false)
        .interact()
        .unwrap_or(false)
}

async fn cmd_call(
    cmd: &str,
    args_str: &str,
    json: bool,
    artifacts: Option<PathBuf>,
    ctx: &AppContext,
    registry: &CommandRegistry,
) {
    let args: serde_json::Value = match serde_json::from_str(args_str) {
        Ok(v) => v,
        Err(e) => {
            let r = result_err(
                "call",
                cmd,
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                format!("invalid JSON args: {}", e),
            );
            output_result(&r, json);
            return;
        }
    };

    let result = registry.execute(cmd, args, ctx).await;
    if let Some(ref dir) = artifacts {
        write_artifacts(dir, &result);
    }
    output_result(&result, json);
}

// ===========================================================================
// Output helpers
// ===========================================================================

fn output_result(result: &CommandResult, json: bool) {
    if json {
        let j = serde_json::to_string_pretty(result).unwrap_or_default();
        println!("{}", j);
    } else {
        print_human(result);
    }

    // Exit with non-zero status on error/fail
    match result.status {
        Status::Pass | Status::Skip => {}
        Status::Fail => std::process::exit(1),
        Status::Error => std::process::exit(2),
    }
}

fn print_human(r: &CommandResult) {
    let status_icon = match r.status {
        Status::Pass => "PASS",
        Status::Fail => "FAIL",
        Status::Skip => "SKIP",
        Status::Error => "ERROR",
    };

    // Restart results carry a ready-made text report.
    if let Some(report) = r.data.as_ref().and_then(|d| d["report"].as_str()) {
        println!("{}", report);
        println!();
        println!("[{}] {} ({}ms)", status_icon, r.target, r.timing_ms.total);
        return;
    }

    println!("[{}] {} {}", status_icon, r.command, r.target);
    println!("  run_id: {}", r.run_id);
    println!("  timing: {}ms", r.timing_ms.total);

    if let Some(ref err) = r.error {
        println!("  error:  {} – {}", err.code, err.message);
    }

    if let Some(ref data) = r.data {
        if let Ok(s) = serde_json::to_string_pretty(data) {
            for line in s.lines() {
                println!("  {}", line);
            }
        }
    }
}

// ===========================================================================
// Artifact helpers
// ===========================================================================

fn write_artifacts(dir: &Path, result: &CommandResult) {
    let art_dir = dir.join(&result.run_id);
    if let Err(e) = std::fs::create_dir_all(&art_dir) {
        tracing::warn!(dir = %art_dir.display(), error = %e, "failed to create artifacts dir");
        return;
    }

    // result.json
    let result_path = art_dir.join("result.json");
    let j = serde_json::to_string_pretty(result).unwrap_or_default();
    if let Err(e) = std::fs::write(&result_path, &j) {
        tracing::warn!(path = %result_path.display(), error = %e, "failed to write artifact");
    }

    // events.jsonl – one line per service outcome, or the whole result
    // for commands without outcomes
    let events_path = art_dir.join("events.jsonl");
    let mut lines = String::new();
    match result.data.as_ref().and_then(|d| d["outcomes"].as_array()) {
        Some(outcomes) => {
            for o in outcomes {
                if let Ok(line) = serde_json::to_string(o) {
                    lines.push_str(&line);
                    lines.push('\n');
                }
            }
        }
        None => {
            if let Ok(line) = serde_json::to_string(result) {
                lines.push_str(&line);
                lines.push('\n');
            }
        }
    }
    match std::fs::write(&events_path, lines) {
        Ok(()) => tracing::info!(dir = %art_dir.display(), "artifacts written"),
        Err(e) => tracing::warn!(path = %events_path.display(), error = %e, "failed to write artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_args_defaults() {
        let cli = Cli::parse_from(["sqladmin", "restart", "--yes"]);
        let Commands::Restart { args, yes, .. } = cli.command else {
            panic!("expected restart");
        };
        assert!(yes);
        assert_eq!(args.service_type, ServiceTarget::All);
        assert!(args.force);
        let json = args.to_json(&AppConfig::default());
        assert_eq!(json["timeout_seconds"], 60);
        assert_eq!(json["service_type"], "all");
        assert!(json["instance_name"].is_null());
    }

    #[test]
    fn test_restart_args_explicit() {
        let cli = Cli::parse_from([
            "sqladmin",
            "plan",
            "--instance",
            "SQL2019",
            "--service-type",
            "Engine",
            "--force",
            "false",
            "--timeout",
            "15",
        ]);
        let Commands::Plan { args, .. } = cli.command else {
            panic!("expected plan");
        };
        let json = args.to_json(&AppConfig::default());
        assert_eq!(json["instance_name"], "SQL2019");
        assert_eq!(json["service_type"], "engine");
        assert_eq!(json["force"], false);
        assert_eq!(json["timeout_seconds"], 15);
    }

    #[test]
    fn test_unknown_service_type_rejected_by_parser() {
        let res = Cli::try_parse_from(["sqladmin", "restart", "--service-type", "bogus"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_plan_service_names() {
        let mut r = result_ok("call", "restart_plan", "id", 0);
        r.data = Some(serde_json::json!({
            "services": [
                { "descriptor": { "logical_type": "engine", "os_service_name": "MSSQLSERVER" } },
                { "descriptor": { "logical_type": "agent", "os_service_name": "SQLSERVERAGENT" },
                  "depends_on": "MSSQLSERVER" }
            ]
        }));
        assert_eq!(plan_service_names(&r), vec!["MSSQLSERVER", "SQLSERVERAGENT"]);
    }

    #[test]
    fn test_write_artifacts_one_event_per_outcome() {
        let dir = std::env::temp_dir().join("sqladmin_artifacts_test");
        let mut r = result_ok("call", "restart_service", "run-1", 0);
        r.data = Some(serde_json::json!({
            "outcomes": [
                { "service_name": "MSSQLSERVER", "status": "SUCCESS" },
                { "service_name": "SQLSERVERAGENT", "status": "SKIPPED" }
            ]
        }));
        write_artifacts(&dir, &r);

        let events = std::fs::read_to_string(dir.join("run-1").join("events.jsonl")).unwrap();
        assert_eq!(events.lines().count(), 2);
        assert!(dir.join("run-1").join("result.json").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_artifact_failure_is_logged() {
        // A plain file where the artifacts directory should go.
        let blocker = std::env::temp_dir().join("sqladmin_artifacts_blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let r = result_ok("call", "ping", "run-2", 0);
        tracing::subscriber::with_default(subscriber, || write_artifacts(&blocker, &r));

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("WARN"), "{}", out);
        assert!(out.contains("failed to create artifacts dir"), "{}", out);

        let _ = std::fs::remove_file(&blocker);
    }
}
