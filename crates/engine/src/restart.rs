//! Restart orchestration: validate → plan → process each service in order →
//! aggregate.
//!
//! Services are processed strictly one after another. A failure on one
//! service is recorded in its outcome and the loop moves on; only request
//! validation can abort the whole call, and it does so before any service
//! is touched.

use crate::context::AppContext;
use crate::expander::{DependencyExpander, RestartPlan};
use crate::lifecycle::{OutcomeStatus, ServiceLifecycleController};
use crate::report::{ResultAggregator, RestartReport};
use crate::resolver::{
    named_instance, validate_instance_name, ResolveError, ServiceNameResolver, ServiceTarget,
};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_TIMEOUT_SECONDS: i64 = 60;

/// Upper bound for `timeout_seconds` (one day). Keeps the value well inside
/// what the platform wait primitives accept.
pub const MAX_TIMEOUT_SECONDS: i64 = 86_400;

fn default_force() -> bool {
    true
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// An explicit `null` selects every service, same as an absent field.
fn deserialize_target<'de, D>(deserializer: D) -> Result<ServiceTarget, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ServiceTarget>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartRequest {
    /// `None`, empty or `MSSQLSERVER` all mean the default instance.
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_target")]
    pub service_type: ServiceTarget,
    /// Only affects Engine restarts: also restart the Engine's dependents.
    #[serde(default = "default_force")]
    pub force: bool,
    /// Bound applied independently to each step of each service.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
}

impl Default for RestartRequest {
    fn default() -> Self {
        Self {
            instance_name: None,
            service_type: ServiceTarget::All,
            force: default_force(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("timeout_seconds must be a positive integer, got {0}")]
    NonPositiveTimeout(i64),

    #[error("timeout_seconds must be at most {max}, got {0}", max = MAX_TIMEOUT_SECONDS)]
    TimeoutTooLarge(i64),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl RestartRequest {
    pub fn new(service_type: ServiceTarget) -> Self {
        Self {
            service_type,
            ..Self::default()
        }
    }

    pub fn instance(&self) -> Option<&str> {
        named_instance(self.instance_name.as_deref())
    }

    /// Check the request and return the per-step timeout in seconds.
    pub fn validate(&self) -> Result<u64, ValidationError> {
        let timeout = u64::try_from(self.timeout_seconds)
            .ok()
            .filter(|t| *t > 0)
            .ok_or(ValidationError::NonPositiveTimeout(self.timeout_seconds))?;
        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(ValidationError::TimeoutTooLarge(self.timeout_seconds));
        }
        if let Some(instance) = self.instance() {
            validate_instance_name(instance)?;
        }
        Ok(timeout)
    }
}

/// Validate the request and expand it into the ordered restart plan.
/// Touches no service.
pub fn plan_restart(
    resolver: &ServiceNameResolver,
    request: &RestartRequest,
) -> Result<RestartPlan, ValidationError> {
    request.validate()?;
    expand(resolver, request)
}

fn expand(
    resolver: &ServiceNameResolver,
    request: &RestartRequest,
) -> Result<RestartPlan, ValidationError> {
    let plan = DependencyExpander::new(resolver, request.instance())
        .expand(request.service_type, request.force)?;
    Ok(plan)
}

/// Restart every service the request expands to and report per-service
/// outcomes.
pub async fn restart_services(
    ctx: &AppContext,
    request: &RestartRequest,
) -> Result<RestartReport, ValidationError> {
    let timeout_seconds = request.validate()?;
    let plan = expand(ctx.resolver(), request)?;

    tracing::info!(
        target_type = %request.service_type,
        instance = request.instance().unwrap_or("default"),
        services = plan.len(),
        timeout_seconds,
        "starting service restart"
    );

    let controller = ServiceLifecycleController::new(ctx.services(), ctx.grace_period());
    let mut aggregator = ResultAggregator::new();

    for planned in plan.services() {
        if let Some(dep) = planned.depends_on.as_deref() {
            if aggregator.status_of(dep) == Some(OutcomeStatus::Failed) {
                tracing::warn!(
                    service = %planned.descriptor.os_service_name,
                    depends_on = %dep,
                    "dependency failed to restart, attempting dependent anyway"
                );
            }
        }
        let outcome = controller
            .process(&planned.descriptor, timeout_seconds)
            .await;
        aggregator.record(outcome);
    }

    let report = aggregator.finish();
    tracing::info!(
        success = report.success_count(),
        failed = report.fail_count(),
        warnings = report.warning_count(),
        skipped = report.skip_count(),
        "service restart finished"
    );
    Ok(report)
}
