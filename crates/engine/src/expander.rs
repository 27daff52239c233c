//! Expand a restart target into the ordered list of services to process.

use crate::resolver::{ResolveError, ServiceNameResolver, ServiceTarget, ServiceType};
use serde::{Deserialize, Serialize};

/// A logical type bound to its concrete OS service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub logical_type: ServiceType,
    pub os_service_name: String,
}

impl ServiceDescriptor {
    /// Windows service names are case-insensitive.
    pub fn same_service(&self, other_name: &str) -> bool {
        self.os_service_name.eq_ignore_ascii_case(other_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedService {
    pub descriptor: ServiceDescriptor,
    /// OS name of the service that must be restarted before this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

/// Ordered, duplicate-free set of services to restart.
///
/// Every `depends_on` entry names a service that appears earlier in the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPlan {
    services: Vec<PlannedService>,
}

impl RestartPlan {
    /// Append unless an entry with the same OS name is already present.
    /// A dependency that is not yet in the plan is dropped rather than
    /// pointing forward.
    fn push(&mut self, descriptor: ServiceDescriptor, depends_on: Option<String>) {
        if self.contains(&descriptor.os_service_name) {
            return;
        }
        let depends_on = depends_on.filter(|dep| self.contains(dep));
        self.services.push(PlannedService {
            descriptor,
            depends_on,
        });
    }

    pub fn contains(&self, os_name: &str) -> bool {
        self.services
            .iter()
            .any(|s| s.descriptor.same_service(os_name))
    }

    pub fn services(&self) -> &[PlannedService] {
        &self.services
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().map(|s| &s.descriptor)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

pub struct DependencyExpander<'a> {
    resolver: &'a ServiceNameResolver,
    instance: Option<&'a str>,
}

impl<'a> DependencyExpander<'a> {
    pub fn new(resolver: &'a ServiceNameResolver, instance: Option<&'a str>) -> Self {
        Self { resolver, instance }
    }

    fn descriptor(&self, ty: ServiceType) -> Result<ServiceDescriptor, ResolveError> {
        Ok(ServiceDescriptor {
            logical_type: ty,
            os_service_name: self.resolver.resolve(ty, self.instance)?,
        })
    }

    /// Build the restart plan for `target`.
    ///
    /// `force` only matters for the Engine, where it pulls in the Engine's
    /// dependents after it.
    pub fn expand(&self, target: ServiceTarget, force: bool) -> Result<RestartPlan, ResolveError> {
        let mut plan = RestartPlan::default();

        match target {
            ServiceTarget::All => {
                for ty in ServiceType::ALL {
                    plan.push(self.descriptor(ty)?, None);
                }
            }
            ServiceTarget::Single(ServiceType::Engine) if force => {
                let engine = self.descriptor(ServiceType::Engine)?;
                let engine_name = engine.os_service_name.clone();
                plan.push(engine, None);
                for dep in ServiceType::Engine.dependents() {
                    plan.push(self.descriptor(*dep)?, Some(engine_name.clone()));
                }
            }
            ServiceTarget::Single(ty) => {
                plan.push(self.descriptor(ty)?, None);
            }
        }

        Ok(plan)
    }
}
