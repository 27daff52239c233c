//! Per-service restart sequence: exists → stop → grace wait → start → verify.

use crate::expander::ServiceDescriptor;
use crate::resolver::ServiceType;
use crate::traits::{CapError, CapResult, ServiceControlOps, ServiceStatus};
use crate::types::{ErrorCode, TimingInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// Pause between stop and start so the service can release its resources.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

pub const MSG_NOT_FOUND: &str = "Service not found";
pub const MSG_RESTARTED: &str = "Service restarted successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Warning,
    Failed,
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeStatus::Success => "SUCCESS",
            OutcomeStatus::Warning => "WARNING",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::Skipped => "SKIPPED",
        })
    }
}

/// The result of processing one service. Built once, read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RestartOutcome {
    service_name: String,
    service_type: ServiceType,
    status: OutcomeStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    timing_ms: TimingInfo,
}

impl RestartOutcome {
    pub fn new(
        descriptor: &ServiceDescriptor,
        status: OutcomeStatus,
        message: impl Into<String>,
        error_code: Option<ErrorCode>,
        timing_ms: TimingInfo,
    ) -> Self {
        Self {
            service_name: descriptor.os_service_name.clone(),
            service_type: descriptor.logical_type,
            status,
            message: message.into(),
            error_code,
            timing_ms,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    pub fn timing_ms(&self) -> &TimingInfo {
        &self.timing_ms
    }
}

// ---------------------------------------------------------------------------
// Step errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Exists,
    Stop,
    Start,
    Status,
}

impl Step {
    fn as_str(self) -> &'static str {
        match self {
            Step::Exists => "exists",
            Step::Stop => "stop",
            Step::Start => "start",
            Step::Status => "status",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{step} timed out after {}s", .after.as_secs())]
    Timeout { step: Step, after: Duration },

    #[error("{}", .0.detail())]
    Operation(#[from] CapError),
}

impl StepError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StepError::Timeout { .. } | StepError::Operation(CapError::Timeout(_)) => {
                ErrorCode::Timeout
            }
            StepError::Operation(CapError::Unsupported(_)) => ErrorCode::Unsupported,
            StepError::Operation(CapError::DependencyMissing(_)) => ErrorCode::DependencyMissing,
            StepError::Operation(CapError::PermissionDenied(_)) => ErrorCode::PermissionDenied,
            StepError::Operation(CapError::Io(_)) => ErrorCode::IoError,
            StepError::Operation(CapError::Other(_)) => ErrorCode::OperationFailed,
        }
    }
}

async fn bounded<T, F>(step: Step, limit: Duration, fut: F) -> Result<T, StepError>
where
    F: Future<Output = CapResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(StepError::from),
        Err(_) => Err(StepError::Timeout { step, after: limit }),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct ServiceLifecycleController<'a> {
    services: &'a dyn ServiceControlOps,
    grace_period: Duration,
}

impl<'a> ServiceLifecycleController<'a> {
    pub fn new(services: &'a dyn ServiceControlOps, grace_period: Duration) -> Self {
        Self {
            services,
            grace_period,
        }
    }

    /// Restart one service. Never fails: every error is folded into the
    /// returned outcome so the caller can move on to the next service.
    pub async fn process(&self, descriptor: &ServiceDescriptor, timeout_seconds: u64) -> RestartOutcome {
        let start = Instant::now();
        let mut steps = HashMap::new();
        let limit = Duration::from_secs(timeout_seconds);
        let name = descriptor.os_service_name.as_str();

        let verdict = self.run_steps(name, limit, &mut steps).await;
        let timing = TimingInfo {
            total: start.elapsed().as_millis() as u64,
            steps,
        };

        match verdict {
            Ok(Verdict::NotFound) => {
                tracing::warn!(service = %name, "service not registered, skipping");
                RestartOutcome::new(descriptor, OutcomeStatus::Skipped, MSG_NOT_FOUND, None, timing)
            }
            Ok(Verdict::Running) => {
                tracing::info!(service = %name, elapsed_ms = timing.total, "service restarted");
                RestartOutcome::new(descriptor, OutcomeStatus::Success, MSG_RESTARTED, None, timing)
            }
            Ok(Verdict::NotRunning(status)) => {
                tracing::warn!(service = %name, %status, "service did not reach Running");
                RestartOutcome::new(
                    descriptor,
                    OutcomeStatus::Warning,
                    format!("Service restarted but current status is {}", status),
                    None,
                    timing,
                )
            }
            Err(e) => {
                tracing::error!(service = %name, error = %e, "service restart failed");
                RestartOutcome::new(
                    descriptor,
                    OutcomeStatus::Failed,
                    e.to_string(),
                    Some(e.error_code()),
                    timing,
                )
            }
        }
    }

    async fn run_steps(
        &self,
        name: &str,
        limit: Duration,
        steps: &mut HashMap<String, u64>,
    ) -> Result<Verdict, StepError> {
        let t0 = Instant::now();
        let exists = bounded(Step::Exists, limit, self.services.exists(name)).await;
        steps.insert(Step::Exists.to_string(), t0.elapsed().as_millis() as u64);
        if !exists? {
            return Ok(Verdict::NotFound);
        }

        tracing::info!(service = %name, step = %Step::Stop, "stopping service");
        let t1 = Instant::now();
        let stopped = bounded(Step::Stop, limit, self.services.stop(name, limit)).await;
        steps.insert(Step::Stop.to_string(), t1.elapsed().as_millis() as u64);
        stopped?;

        tokio::time::sleep(self.grace_period).await;

        tracing::info!(service = %name, step = %Step::Start, "starting service");
        let t2 = Instant::now();
        let started = bounded(Step::Start, limit, self.services.start(name, limit)).await;
        steps.insert(Step::Start.to_string(), t2.elapsed().as_millis() as u64);
        started?;

        let t3 = Instant::now();
        let status = bounded(Step::Status, limit, self.services.status(name)).await;
        steps.insert(Step::Status.to_string(), t3.elapsed().as_millis() as u64);

        Ok(match status? {
            ServiceStatus::Running => Verdict::Running,
            other => Verdict::NotRunning(other),
        })
    }
}

enum Verdict {
    NotFound,
    Running,
    NotRunning(ServiceStatus),
}
