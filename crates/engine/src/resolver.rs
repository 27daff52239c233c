//! Logical service types and their mapping to OS service names.
//!
//! The mapping lives in a [`ServiceNameTable`] handed to the resolver at
//! construction time, so deployments pinned to a different product version
//! (e.g. `MsDtsServer150` vs `MsDtsServer160`) only need a config override.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Instance name SQL Server uses for the default instance.
pub const DEFAULT_INSTANCE: &str = "MSSQLSERVER";

/// SQL Server caps instance names at 16 characters.
const MAX_INSTANCE_NAME_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Service types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ServiceType {
    Engine,
    Agent,
    Browser,
    FullText,
    Analysis,
    Integration,
    Reporting,
    PolyBase,
    Launchpad,
}

impl ServiceType {
    /// Every logical type in canonical restart order.
    pub const ALL: [ServiceType; 9] = [
        ServiceType::Engine,
        ServiceType::Agent,
        ServiceType::Browser,
        ServiceType::FullText,
        ServiceType::Analysis,
        ServiceType::Integration,
        ServiceType::Reporting,
        ServiceType::PolyBase,
        ServiceType::Launchpad,
    ];

    /// Services conventionally restarted together with this one.
    pub fn dependents(self) -> &'static [ServiceType] {
        match self {
            ServiceType::Engine => &[
                ServiceType::Agent,
                ServiceType::PolyBase,
                ServiceType::Launchpad,
            ],
            _ => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Engine => "engine",
            ServiceType::Agent => "agent",
            ServiceType::Browser => "browser",
            ServiceType::FullText => "fulltext",
            ServiceType::Analysis => "analysis",
            ServiceType::Integration => "integration",
            ServiceType::Reporting => "reporting",
            ServiceType::PolyBase => "polybase",
            ServiceType::Launchpad => "launchpad",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service type '{0}' (expected one of: all, engine, agent, browser, fulltext, analysis, integration, reporting, polybase, launchpad)")]
pub struct UnknownServiceType(pub String);

/// Lowercase and drop separators so `FullText`, `full_text` and `full-text`
/// all parse the same.
fn normalize_type_name(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for ServiceType {
    type Err = UnknownServiceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = normalize_type_name(s);
        ServiceType::ALL
            .into_iter()
            .find(|t| t.as_str() == norm)
            .ok_or_else(|| UnknownServiceType(s.to_string()))
    }
}

impl TryFrom<String> for ServiceType {
    type Error = UnknownServiceType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What a request targets: one logical type, or every known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceTarget {
    #[default]
    All,
    Single(ServiceType),
}

impl FromStr for ServiceTarget {
    type Err = UnknownServiceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if normalize_type_name(s) == "all" {
            return Ok(ServiceTarget::All);
        }
        s.parse().map(ServiceTarget::Single)
    }
}

impl TryFrom<String> for ServiceTarget {
    type Error = UnknownServiceType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceTarget> for String {
    fn from(t: ServiceTarget) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTarget::All => f.write_str("all"),
            ServiceTarget::Single(t) => t.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Naming table
// ---------------------------------------------------------------------------

/// How one logical type is named on the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNaming {
    /// Service name for the default instance.
    pub default_name: String,
    /// Prefix for named instances (`<base>$<instance>`). `None` means the
    /// service is shared by all instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_base: Option<String>,
}

impl ServiceNaming {
    pub fn per_instance(default_name: &str, instance_base: &str) -> Self {
        Self {
            default_name: default_name.to_string(),
            instance_base: Some(instance_base.to_string()),
        }
    }

    pub fn shared(name: &str) -> Self {
        Self {
            default_name: name.to_string(),
            instance_base: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceNameTable {
    entries: HashMap<ServiceType, ServiceNaming>,
}

impl ServiceNameTable {
    /// A table with no mappings at all.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, ty: ServiceType, naming: ServiceNaming) -> Self {
        self.entries.insert(ty, naming);
        self
    }

    /// Replace the entries named in `overrides`, keeping the rest.
    pub fn with_overrides(mut self, overrides: HashMap<ServiceType, ServiceNaming>) -> Self {
        self.entries.extend(overrides);
        self
    }

    pub fn get(&self, ty: ServiceType) -> Option<&ServiceNaming> {
        self.entries.get(&ty)
    }
}

impl Default for ServiceNameTable {
    fn default() -> Self {
        Self::empty()
            .with(
                ServiceType::Engine,
                ServiceNaming::per_instance(DEFAULT_INSTANCE, "MSSQL"),
            )
            .with(
                ServiceType::Agent,
                ServiceNaming::per_instance("SQLSERVERAGENT", "SQLAgent"),
            )
            .with(ServiceType::Browser, ServiceNaming::shared("SQLBrowser"))
            .with(
                ServiceType::FullText,
                ServiceNaming::per_instance("MSSQLFDLauncher", "MSSQLFDLauncher"),
            )
            .with(
                ServiceType::Analysis,
                ServiceNaming::per_instance("MSSQLServerOLAPService", "MSOLAP"),
            )
            .with(
                ServiceType::Integration,
                ServiceNaming::shared("MsDtsServer160"),
            )
            .with(
                ServiceType::Reporting,
                ServiceNaming::per_instance("SQLServerReportingServices", "ReportServer"),
            )
            .with(
                ServiceType::PolyBase,
                ServiceNaming::per_instance("SQLPBENGINE", "SQLPBENGINE"),
            )
            .with(
                ServiceType::Launchpad,
                ServiceNaming::per_instance("MSSQLLaunchpad", "MSSQLLaunchpad"),
            )
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no service name mapping configured for '{0}'")]
    Unmapped(ServiceType),

    #[error("invalid instance name '{0}': use 1-16 ASCII letters, digits, '_', '-' or '.'")]
    InvalidInstanceName(String),
}

/// Check an instance name before it is spliced into an OS service name.
pub fn validate_instance_name(name: &str) -> Result<(), ResolveError> {
    let ok = !name.is_empty()
        && name.len() <= MAX_INSTANCE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(ResolveError::InvalidInstanceName(name.to_string()))
    }
}

/// The named instance, or `None` for the default instance.
pub fn named_instance(instance: Option<&str>) -> Option<&str> {
    instance
        .map(str::trim)
        .filter(|i| !i.is_empty() && !i.eq_ignore_ascii_case(DEFAULT_INSTANCE))
}

#[derive(Debug, Clone, Default)]
pub struct ServiceNameResolver {
    table: ServiceNameTable,
}

impl ServiceNameResolver {
    pub fn new(table: ServiceNameTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ServiceNameTable {
        &self.table
    }

    /// Map a logical type and optional instance to the OS service name.
    pub fn resolve(&self, ty: ServiceType, instance: Option<&str>) -> Result<String, ResolveError> {
        let naming = self.table.get(ty).ok_or(ResolveError::Unmapped(ty))?;

        let Some(instance) = named_instance(instance) else {
            return Ok(naming.default_name.clone());
        };
        validate_instance_name(instance)?;

        Ok(match &naming.instance_base {
            Some(base) => format!("{}${}", base, instance),
            None => naming.default_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ServiceNameResolver {
        ServiceNameResolver::default()
    }

    #[test]
    fn test_default_instance_names() {
        let r = resolver();
        assert_eq!(r.resolve(ServiceType::Engine, None).unwrap(), "MSSQLSERVER");
        assert_eq!(r.resolve(ServiceType::Agent, None).unwrap(), "SQLSERVERAGENT");
        assert_eq!(r.resolve(ServiceType::Browser, None).unwrap(), "SQLBrowser");
        assert_eq!(
            r.resolve(ServiceType::Analysis, None).unwrap(),
            "MSSQLServerOLAPService"
        );
    }

    #[test]
    fn test_named_instance_names() {
        let r = resolver();
        assert_eq!(
            r.resolve(ServiceType::Engine, Some("SQL2019")).unwrap(),
            "MSSQL$SQL2019"
        );
        assert_eq!(
            r.resolve(ServiceType::Agent, Some("SQL2019")).unwrap(),
            "SQLAgent$SQL2019"
        );
        assert_eq!(
            r.resolve(ServiceType::Analysis, Some("SQL2019")).unwrap(),
            "MSOLAP$SQL2019"
        );
        assert_eq!(
            r.resolve(ServiceType::Reporting, Some("SQL2019")).unwrap(),
            "ReportServer$SQL2019"
        );
    }

    #[test]
    fn test_default_instance_aliases() {
        let r = resolver();
        for alias in [None, Some(""), Some("MSSQLSERVER"), Some("mssqlserver"), Some("  ")] {
            assert_eq!(r.resolve(ServiceType::Engine, alias).unwrap(), "MSSQLSERVER");
        }
    }

    #[test]
    fn test_shared_services_ignore_instance() {
        let r = resolver();
        assert_eq!(
            r.resolve(ServiceType::Browser, Some("SQL2019")).unwrap(),
            "SQLBrowser"
        );
        assert_eq!(
            r.resolve(ServiceType::Integration, Some("SQL2019")).unwrap(),
            "MsDtsServer160"
        );
    }

    #[test]
    fn test_every_type_is_mapped_by_default() {
        let r = resolver();
        for ty in ServiceType::ALL {
            assert!(r.resolve(ty, None).is_ok(), "{} unmapped", ty);
            assert!(r.resolve(ty, Some("INST")).is_ok(), "{} unmapped", ty);
        }
    }

    #[test]
    fn test_override_replaces_version_pinned_name() {
        let mut overrides = HashMap::new();
        overrides.insert(ServiceType::Integration, ServiceNaming::shared("MsDtsServer150"));
        let r = ServiceNameResolver::new(ServiceNameTable::default().with_overrides(overrides));
        assert_eq!(
            r.resolve(ServiceType::Integration, None).unwrap(),
            "MsDtsServer150"
        );
        // untouched entries survive
        assert_eq!(r.resolve(ServiceType::Engine, None).unwrap(), "MSSQLSERVER");
    }

    #[test]
    fn test_unmapped_type() {
        let r = ServiceNameResolver::new(ServiceNameTable::empty());
        assert_eq!(
            r.resolve(ServiceType::Engine, None),
            Err(ResolveError::Unmapped(ServiceType::Engine))
        );
    }

    #[test]
    fn test_invalid_instance_name_rejected() {
        let r = resolver();
        for bad in ["a;b", "inst name", "$(calc)", "ABCDEFGHIJKLMNOPQ"] {
            assert!(matches!(
                r.resolve(ServiceType::Engine, Some(bad)),
                Err(ResolveError::InvalidInstanceName(_))
            ));
        }
    }

    #[test]
    fn test_parse_service_type() {
        assert_eq!("Engine".parse::<ServiceType>().unwrap(), ServiceType::Engine);
        assert_eq!("full_text".parse::<ServiceType>().unwrap(), ServiceType::FullText);
        assert_eq!("PolyBase".parse::<ServiceType>().unwrap(), ServiceType::PolyBase);
        assert!("bogus".parse::<ServiceType>().is_err());
        assert_eq!("ALL".parse::<ServiceTarget>().unwrap(), ServiceTarget::All);
        assert_eq!(
            "agent".parse::<ServiceTarget>().unwrap(),
            ServiceTarget::Single(ServiceType::Agent)
        );
    }

    #[test]
    fn test_table_deserializes_from_json_keys() {
        let table: ServiceNameTable = serde_json::from_value(serde_json::json!({
            "engine": { "default_name": "MSSQLSERVER", "instance_base": "MSSQL" },
            "integration": { "default_name": "MsDtsServer150" }
        }))
        .unwrap();
        assert_eq!(
            table.get(ServiceType::Integration),
            Some(&ServiceNaming::shared("MsDtsServer150"))
        );
        assert!(table.get(ServiceType::Agent).is_none());
    }
}
