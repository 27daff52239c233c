//! Application context – holds capability trait objects and config.

use crate::lifecycle::DEFAULT_GRACE_PERIOD;
use crate::platform::default_service_control;
use crate::resolver::{ServiceNameResolver, ServiceNameTable};
use crate::traits::ServiceControlOps;
use std::time::Duration;

/// Central context passed to all engine operations.
///
/// Holds the service-control capability as a trait object so callers can
/// swap implementations (real service manager vs. a scripted fake), plus
/// the naming table the resolver works from.
pub struct AppContext {
    services: Box<dyn ServiceControlOps>,
    resolver: ServiceNameResolver,
    grace_period: Duration,
}

impl AppContext {
    pub fn new(services: Box<dyn ServiceControlOps>, names: ServiceNameTable) -> Self {
        Self {
            services,
            resolver: ServiceNameResolver::new(names),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Context backed by the host's service manager and the built-in
    /// naming table.
    pub fn default_platform() -> Self {
        Self::new(default_service_control(), ServiceNameTable::default())
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn services(&self) -> &dyn ServiceControlOps {
        self.services.as_ref()
    }

    pub fn resolver(&self) -> &ServiceNameResolver {
        &self.resolver
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }
}
