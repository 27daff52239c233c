//! Platform-specific implementations of the service-control capability.
//!
//! - [`PowerShellServiceControl`]: Windows service manager via PowerShell
//! - [`UnsupportedServiceControl`]: always returns UNSUPPORTED

use crate::traits::*;
use std::time::Duration;
use tokio::process::Command;

/// Pick the service-control implementation for the host OS.
pub fn default_service_control() -> Box<dyn ServiceControlOps> {
    if cfg!(windows) {
        Box::new(PowerShellServiceControl::default())
    } else {
        Box::new(UnsupportedServiceControl)
    }
}

// ===========================================================================
// Windows – PowerShell service cmdlets
// ===========================================================================

/// Exit code the exists-probe uses for "no such service".
const EXIT_NOT_FOUND: i32 = 3;

pub struct PowerShellServiceControl {
    program: String,
}

impl Default for PowerShellServiceControl {
    fn default() -> Self {
        Self {
            program: "powershell".to_string(),
        }
    }
}

impl PowerShellServiceControl {
    /// Use a different PowerShell host, e.g. `pwsh`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, script: &str) -> CapResult<std::process::Output> {
        tracing::debug!(program = %self.program, %script, "running service command");
        Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CapError::DependencyMissing(format!("{} not found", self.program))
                } else {
                    CapError::Io(e)
                }
            })
    }

    async fn run_checked(&self, script: &str) -> CapResult<String> {
        let output = self.run(script).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl ServiceControlOps for PowerShellServiceControl {
    async fn exists(&self, name: &str) -> CapResult<bool> {
        let name = quote(name)?;
        let script = format!(
            "if (Get-Service -Name {} -ErrorAction SilentlyContinue) {{ exit 0 }} else {{ exit {} }}",
            name, EXIT_NOT_FOUND
        );
        let output = self.run(&script).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(EXIT_NOT_FOUND) => Ok(false),
            _ => Err(classify_failure(&String::from_utf8_lossy(&output.stderr))),
        }
    }

    async fn stop(&self, name: &str, timeout: Duration) -> CapResult<()> {
        let script = transition_script("Stop-Service -Force", &quote(name)?, "Stopped", timeout);
        self.run_checked(&script).await.map(|_| ())
    }

    async fn start(&self, name: &str, timeout: Duration) -> CapResult<()> {
        let script = transition_script("Start-Service", &quote(name)?, "Running", timeout);
        self.run_checked(&script).await.map(|_| ())
    }

    async fn status(&self, name: &str) -> CapResult<ServiceStatus> {
        let script = format!(
            "(Get-Service -Name {} -ErrorAction Stop).Status.ToString()",
            quote(name)?
        );
        let out = self.run_checked(&script).await?;
        Ok(ServiceStatus::parse(&out))
    }
}

/// Longest wait handed to `WaitForStatus`. Larger values overflow
/// `TimeSpan` after the cmdlet has already run.
const MAX_WAIT_SECS: u64 = 86_400;

/// Issue `cmdlet` against the service and wait for it to reach `target`.
fn transition_script(cmdlet: &str, quoted_name: &str, target: &str, timeout: Duration) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $s = Get-Service -Name {name}; \
         $s | {cmdlet}; \
         $s.WaitForStatus('{target}', [TimeSpan]::FromSeconds({secs}))",
        name = quoted_name,
        cmdlet = cmdlet,
        target = target,
        secs = timeout.as_secs().clamp(1, MAX_WAIT_SECS),
    )
}

/// Single-quote a service name for PowerShell. Only characters that can
/// appear in SQL Server service names are accepted.
fn quote(name: &str) -> CapResult<String> {
    let safe = !name.is_empty()
        && name.len() <= 256
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '_' | '-' | '.'));
    if !safe {
        return Err(CapError::Other(format!("invalid service name '{}'", name)));
    }
    Ok(format!("'{}'", name))
}

/// Map PowerShell error output to a capability error. The message is the
/// first non-empty stderr line, which carries the cmdlet's own text.
fn classify_failure(stderr: &str) -> CapError {
    let message = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("service command failed")
        .to_string();
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("access is denied") || lower.contains("permissiondenied") {
        CapError::PermissionDenied(message)
    } else if lower.contains("time out has expired") || lower.contains("timeoutexception") {
        CapError::Timeout(message)
    } else {
        CapError::Other(message)
    }
}

// ===========================================================================
// Unsupported – hosts without a Windows service manager
// ===========================================================================

/// Service control stub for hosts without a Windows service manager.
/// Never panics.
pub struct UnsupportedServiceControl;

fn unsupported() -> CapError {
    CapError::Unsupported("Windows service control is unavailable on this host".into())
}

#[async_trait::async_trait]
impl ServiceControlOps for UnsupportedServiceControl {
    async fn exists(&self, _name: &str) -> CapResult<bool> {
        Err(unsupported())
    }
    async fn stop(&self, _name: &str, _timeout: Duration) -> CapResult<()> {
        Err(unsupported())
    }
    async fn start(&self, _name: &str, _timeout: Duration) -> CapResult<()> {
        Err(unsupported())
    }
    async fn status(&self, _name: &str) -> CapResult<ServiceStatus> {
        Err(unsupported())
    }
}
