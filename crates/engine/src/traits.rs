use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type for capability operations that may be unsupported.
pub type CapResult<T> = Result<T, CapError>;

#[derive(Debug, thiserror::Error)]
pub enum CapError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl CapError {
    /// The underlying error text without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            CapError::Unsupported(m)
            | CapError::DependencyMissing(m)
            | CapError::PermissionDenied(m)
            | CapError::Timeout(m)
            | CapError::Other(m) => m.clone(),
            CapError::Io(e) => e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// OS service control
// ---------------------------------------------------------------------------

/// Observed state of an OS service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
    StartPending,
    StopPending,
    Unknown,
}

impl ServiceStatus {
    /// Parse the status text reported by the service manager.
    /// Anything unrecognised (paused, continue-pending, ...) maps to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => ServiceStatus::Running,
            "stopped" => ServiceStatus::Stopped,
            "startpending" | "start_pending" => ServiceStatus::StartPending,
            "stoppending" | "stop_pending" => ServiceStatus::StopPending,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::StartPending => "StartPending",
            ServiceStatus::StopPending => "StopPending",
            ServiceStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Query/command surface over the operating system's service registry.
///
/// Implementations are treated as synchronous and idempotent from the
/// caller's point of view; the restart controller bounds every call with
/// its own timeout in addition to the one passed in.
#[async_trait::async_trait]
pub trait ServiceControlOps: Send + Sync {
    /// Whether a service with this name is registered.
    async fn exists(&self, name: &str) -> CapResult<bool>;

    /// Force-stop the service and wait up to `timeout` for it to stop.
    async fn stop(&self, name: &str, timeout: Duration) -> CapResult<()>;

    /// Start the service and wait up to `timeout` for it to start.
    async fn start(&self, name: &str, timeout: Duration) -> CapResult<()>;

    async fn status(&self, name: &str) -> CapResult<ServiceStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(ServiceStatus::parse("Running"), ServiceStatus::Running);
        assert_eq!(ServiceStatus::parse(" stopped\r\n"), ServiceStatus::Stopped);
        assert_eq!(ServiceStatus::parse("StartPending"), ServiceStatus::StartPending);
        assert_eq!(ServiceStatus::parse("StopPending"), ServiceStatus::StopPending);
        assert_eq!(ServiceStatus::parse("Paused"), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::parse(""), ServiceStatus::Unknown);
    }

    #[test]
    fn test_cap_error_display_is_passthrough_for_other() {
        let e = CapError::Other("Cannot stop service 'X'".into());
        assert_eq!(e.to_string(), "Cannot stop service 'X'");
    }
}
