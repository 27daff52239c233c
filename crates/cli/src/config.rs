use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sqladmin_engine::resolver::{ServiceNaming, ServiceType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub restart: RestartConfig,
    /// Per-type overrides merged over the built-in service naming table.
    #[serde(default)]
    pub service_names: HashMap<ServiceType, ServiceNaming>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RestartConfig {
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: i64,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "true_default")]
    pub require_confirmation: bool,
    #[serde(default = "default_powershell_program")]
    pub powershell_program: String,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_timeout_seconds(),
            grace_period_ms: default_grace_period_ms(),
            require_confirmation: true,
            powershell_program: default_powershell_program(),
        }
    }
}

fn default_timeout_seconds() -> i64 {
    sqladmin_engine::restart::DEFAULT_TIMEOUT_SECONDS
}

fn default_grace_period_ms() -> u64 {
    sqladmin_engine::lifecycle::DEFAULT_GRACE_PERIOD.as_millis() as u64
}

fn default_powershell_program() -> String {
    "powershell".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LoggingFormatConfig,
    #[serde(default)]
    pub levels: LoggingLevelsConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingFormatConfig {
    #[serde(default = "true_default")]
    pub show_time: bool,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub location: LoggingLocationConfig,
}

impl Default for LoggingFormatConfig {
    fn default() -> Self {
        Self {
            show_time: true,
            json: false,
            location: LoggingLocationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LoggingLocationConfig {
    #[serde(default)]
    pub show_file: bool,
    #[serde(default)]
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLevelsConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "true_default")]
    pub info: bool,
    #[serde(default = "true_default")]
    pub warning: bool,
    #[serde(default = "true_default")]
    pub error: bool,
}

impl Default for LoggingLevelsConfig {
    fn default() -> Self {
        Self {
            debug: false,
            info: true,
            warning: true,
            error: true,
        }
    }
}

impl LoggingLevelsConfig {
    /// The most verbose level enabled, as an `EnvFilter` directive.
    pub fn filter_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.info {
            "info"
        } else if self.warning {
            "warn"
        } else if self.error {
            "error"
        } else {
            "off"
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Load the configuration once per process.
pub fn get_config() -> Result<&'static AppConfig, ConfigError> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = load_config()?;
    Ok(CONFIG.get_or_init(|| cfg))
}

/// Directory holding `global_config.yaml`: `SQLADMIN_CONFIG_DIR`, else the
/// crate directory when run through cargo, else the working directory.
fn config_dir() -> PathBuf {
    std::env::var("SQLADMIN_CONFIG_DIR")
        .or_else(|_| std::env::var("CARGO_MANIFEST_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_dir())
}

fn load_config_from(dir: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        // Load default config (optional, all fields have defaults)
        .add_source(File::from(dir.join("global_config.yaml")).required(false))
        // Load local override
        .add_source(File::from(dir.join(".global_config.yaml")).required(false))
        // Map nested env vars like SQLADMIN__RESTART__GRACE_PERIOD_MS=0
        .add_source(Environment::with_prefix("SQLADMIN").separator("__"));

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    struct EnvGuard(&'static str);
    impl EnvGuard {
        fn new(key: &'static str, val: &str) -> Self {
            env::set_var(key, val);
            Self(key)
        }
    }
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.0);
        }
    }

    fn manifest_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    #[serial]
    fn test_load_repo_config() {
        let config = load_config_from(&manifest_dir());
        assert!(config.is_ok(), "Failed to load config: {:?}", config.err());

        let config = config.unwrap();
        assert_eq!(config.restart.default_timeout_seconds, 60);
        assert_eq!(config.restart.grace_period_ms, 2000);
        assert!(config.logging.redaction.enabled);
        assert!(!config.logging.redaction.patterns.is_empty());
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = env::temp_dir().join("sqladmin_config_missing");
        let config = load_config_from(&dir).expect("defaults should load");
        assert_eq!(config.restart.default_timeout_seconds, 60);
        assert!(config.restart.require_confirmation);
        assert!(config.service_names.is_empty());
        assert_eq!(config.logging.levels.filter_level(), "info");
    }

    #[test]
    #[serial]
    fn test_env_var_override_precedence() {
        let _guard = EnvGuard::new("SQLADMIN__RESTART__GRACE_PERIOD_MS", "0");
        let config = load_config_from(&manifest_dir()).expect("Should load config");
        assert_eq!(config.restart.grace_period_ms, 0);
    }

    #[test]
    #[serial]
    fn test_type_coercion_boolean() {
        {
            let _guard = EnvGuard::new("SQLADMIN__RESTART__REQUIRE_CONFIRMATION", "false");
            let config = load_config_from(&manifest_dir()).expect("Should load config");
            assert!(!config.restart.require_confirmation);
        }
        {
            let _guard = EnvGuard::new("SQLADMIN__LOGGING__LEVELS__DEBUG", "true");
            let config = load_config_from(&manifest_dir()).expect("Should load config");
            assert_eq!(config.logging.levels.filter_level(), "debug");
        }
    }

    #[test]
    #[serial]
    fn test_service_name_override_from_env() {
        let _guard = EnvGuard::new(
            "SQLADMIN__SERVICE_NAMES__INTEGRATION__DEFAULT_NAME",
            "MsDtsServer150",
        );
        let config = load_config_from(&manifest_dir()).expect("Should load config");
        assert_eq!(
            config.service_names.get(&ServiceType::Integration),
            Some(&ServiceNaming::shared("MsDtsServer150"))
        );
    }
}
