//! Scripted in-memory service manager shared by the integration tests.

#![allow(dead_code)]

use sqladmin_engine::traits::{CapError, CapResult, ServiceControlOps, ServiceStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeService {
    pub status: ServiceStatus,
    pub stop_error: Option<String>,
    pub start_error: Option<String>,
    pub stop_delay: Duration,
    /// Status reported once the service has been started.
    pub status_after_start: ServiceStatus,
}

impl FakeService {
    pub fn healthy() -> Self {
        Self {
            status: ServiceStatus::Running,
            stop_error: None,
            start_error: None,
            stop_delay: Duration::ZERO,
            status_after_start: ServiceStatus::Running,
        }
    }

    pub fn failing_stop(msg: &str) -> Self {
        Self {
            stop_error: Some(msg.to_string()),
            ..Self::healthy()
        }
    }
}

/// Records every call as `"<op> <name>"` in order.
#[derive(Clone, Default)]
pub struct FakeServiceManager {
    services: Arc<Mutex<HashMap<String, FakeService>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, svc: FakeService) -> Self {
        self.services
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase(), svc);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", op, name));
    }

    fn get(&self, name: &str) -> CapResult<FakeService> {
        self.services
            .lock()
            .unwrap()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| CapError::Other(format!("Cannot find any service with service name '{}'.", name)))
    }

    fn set_status(&self, name: &str, status: ServiceStatus) {
        if let Some(s) = self
            .services
            .lock()
            .unwrap()
            .get_mut(&name.to_ascii_lowercase())
        {
            s.status = status;
        }
    }
}

#[async_trait::async_trait]
impl ServiceControlOps for FakeServiceManager {
    async fn exists(&self, name: &str) -> CapResult<bool> {
        self.record("exists", name);
        Ok(self
            .services
            .lock()
            .unwrap()
            .contains_key(&name.to_ascii_lowercase()))
    }

    async fn stop(&self, name: &str, _timeout: Duration) -> CapResult<()> {
        self.record("stop", name);
        let svc = self.get(name)?;
        tokio::time::sleep(svc.stop_delay).await;
        if let Some(msg) = svc.stop_error {
            return Err(CapError::Other(msg));
        }
        self.set_status(name, ServiceStatus::Stopped);
        Ok(())
    }

    async fn start(&self, name: &str, _timeout: Duration) -> CapResult<()> {
        self.record("start", name);
        let svc = self.get(name)?;
        if let Some(msg) = svc.start_error {
            return Err(CapError::Other(msg));
        }
        self.set_status(name, svc.status_after_start);
        Ok(())
    }

    async fn status(&self, name: &str) -> CapResult<ServiceStatus> {
        self.record("status", name);
        Ok(self.get(name)?.status)
    }
}
