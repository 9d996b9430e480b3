use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{CascadeError, CascadeResult};

/// Application configuration, loaded from TOML + environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub agent: AgentConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL for the audit trail.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the extraction agent bridge.
    pub base_url: String,
    /// Per-request timeout. Kept below the tier rate delay so a hung call
    /// resolves before the next dispatch window opens.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Queue polling period, independent of the per-tier rate delays.
    pub tick_interval_seconds: u64,
    pub vehicle_delay_seconds: u64,
    pub plate_delay_seconds: u64,
    pub person_delay_seconds: u64,
    pub max_attempts: u32,
    /// Linear backoff base: next retry lands at now + backoff * attempts.
    pub retry_backoff_seconds: u64,
    /// Absent means cached results never expire.
    pub cache_ttl_seconds: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:cascade.db".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            agent: AgentConfig {
                base_url: "http://localhost:3000".to_string(),
                request_timeout_seconds: 25,
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 5,
            vehicle_delay_seconds: 30,
            plate_delay_seconds: 30,
            person_delay_seconds: 30,
            max_attempts: 3,
            retry_backoff_seconds: 60,
            cache_ttl_seconds: None,
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> CascadeResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(CascadeError::config_error(format!(
                    "config file not found: {path}"
                )));
            }
        } else {
            let default_paths = [
                "config/cascade.toml",
                "cascade.toml",
                "/etc/cascade/config.toml",
            ];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("database.url", "sqlite:cascade.db")?
                    .set_default("database.max_connections", 5)?
                    .set_default("database.min_connections", 1)?
                    .set_default("agent.base_url", "http://localhost:3000")?
                    .set_default("agent.request_timeout_seconds", 25)?
                    .set_default("pipeline.tick_interval_seconds", 5)?
                    .set_default("pipeline.vehicle_delay_seconds", 30)?
                    .set_default("pipeline.plate_delay_seconds", 30)?
                    .set_default("pipeline.person_delay_seconds", 30)?
                    .set_default("pipeline.max_attempts", 3)?
                    .set_default("pipeline.retry_backoff_seconds", 60)?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CASCADE")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> CascadeResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)
            .map_err(|e| CascadeError::config_error(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> CascadeResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CascadeError::config_error(format!("failed to render TOML: {e}")))
    }

    pub fn validate(&self) -> CascadeResult<()> {
        self.database.validate()?;
        self.agent.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> CascadeResult<()> {
        if self.url.is_empty() {
            return Err(CascadeError::config_error("database.url must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(CascadeError::config_error(
                "database.max_connections must be greater than 0",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(CascadeError::config_error(
                "database.min_connections must not exceed database.max_connections",
            ));
        }
        Ok(())
    }
}

impl AgentConfig {
    pub fn validate(&self) -> CascadeResult<()> {
        if self.base_url.is_empty() {
            return Err(CascadeError::config_error("agent.base_url must not be empty"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(CascadeError::config_error(
                "agent.request_timeout_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> CascadeResult<()> {
        if self.tick_interval_seconds == 0 {
            return Err(CascadeError::config_error(
                "pipeline.tick_interval_seconds must be greater than 0",
            ));
        }
        if self.vehicle_delay_seconds == 0
            || self.plate_delay_seconds == 0
            || self.person_delay_seconds == 0
        {
            return Err(CascadeError::config_error(
                "pipeline tier delays must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(CascadeError::config_error(
                "pipeline.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.database.url, "sqlite:cascade.db");
        assert_eq!(config.agent.base_url, "http://localhost:3000");
        assert_eq!(config.pipeline.tick_interval_seconds, 5);
        assert_eq!(config.pipeline.vehicle_delay_seconds, 30);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.retry_backoff_seconds, 60);
        assert!(config.pipeline.cache_ttl_seconds.is_none());
    }

    #[test]
    fn test_app_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_tick() {
        let mut config = AppConfig::default();
        config.pipeline.tick_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.pipeline.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_connection_bounds() {
        let mut config = AppConfig::default();
        config.database.min_connections = 10;
        config.database.max_connections = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
[database]
url = "sqlite::memory:"
max_connections = 2
min_connections = 1

[agent]
base_url = "http://127.0.0.1:4000"
request_timeout_seconds = 10

[pipeline]
tick_interval_seconds = 1
vehicle_delay_seconds = 10
plate_delay_seconds = 15
person_delay_seconds = 20
max_attempts = 5
retry_backoff_seconds = 30
cache_ttl_seconds = 3600
"#;

        let config = AppConfig::from_toml(toml_str).expect("failed to parse TOML");
        assert_eq!(config.agent.base_url, "http://127.0.0.1:4000");
        assert_eq!(config.pipeline.plate_delay_seconds, 15);
        assert_eq!(config.pipeline.cache_ttl_seconds, Some(3600));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let rendered = config.to_toml().expect("failed to render TOML");
        let parsed = AppConfig::from_toml(&rendered).expect("failed to parse rendered TOML");
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(
            parsed.pipeline.retry_backoff_seconds,
            config.pipeline.retry_backoff_seconds
        );
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        let toml_str = AppConfig::default().to_toml().expect("failed to render TOML");
        file.write_all(toml_str.as_bytes())
            .expect("failed to write temp config");

        let path = file.path().to_str().expect("temp path not utf-8");
        let config = AppConfig::load(Some(path)).expect("failed to load config");
        assert_eq!(config.pipeline.vehicle_delay_seconds, 30);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = AppConfig::load(Some("/nonexistent/cascade.toml"));
        assert!(result.is_err());
    }
}
