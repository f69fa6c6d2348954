use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for FreshTrace
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FreshtraceConfig {
    /// Batch store settings
    pub store: StoreConfig,
    /// Push relay settings
    pub push: PushConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Storage backend: "memory" or "sqlite" (requires the `database` feature)
    pub backend: String,
    /// Database settings, used by the sqlite backend
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    /// Deliver events over HTTP; when false, events are logged only
    pub enabled: bool,
    /// Push relay endpoint URL
    pub endpoint: Option<String>,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Client-side rate limiting
    pub publishes_per_second: u32,
    pub burst_capacity: u32,
    /// Delivery attempts per event before giving up
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
    /// Enable publish metrics collection
    pub metrics_enabled: bool,
}

impl Default for FreshtraceConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: "memory".to_string(),
                database: Some(DatabaseConfig {
                    url: ".freshtrace/freshtrace.db".to_string(),
                    auto_migrate: true,
                }),
            },
            push: PushConfig {
                enabled: false,
                endpoint: None,
                token: None, // Will be read from env var or .freshtrace-rc
                publishes_per_second: 10,
                burst_capacity: 20,
                max_attempts: 3,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
                metrics_enabled: true,
            },
        }
    }
}

impl FreshtraceConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (freshtrace.toml, .freshtrace-rc)
    /// 3. Environment variables (prefixed with FRESHTRACE_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&FreshtraceConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("freshtrace.toml").exists() {
            builder = builder.add_source(File::with_name("freshtrace"));
        }

        if Path::new(".freshtrace-rc").exists() {
            builder = builder.add_source(File::with_name(".freshtrace-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("FRESHTRACE")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut freshtrace_config: FreshtraceConfig = config.try_deserialize()?;

        // Special handling for the relay token - check multiple sources
        if freshtrace_config.push.token.is_none() {
            if let Ok(token) = std::env::var("PUSH_RELAY_TOKEN") {
                freshtrace_config.push.token = Some(token);
            } else if let Ok(token) = std::env::var("FRESHTRACE_PUSH_TOKEN") {
                freshtrace_config.push.token = Some(token);
            }
        }

        Ok(freshtrace_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<FreshtraceConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = FreshtraceConfig::load_env_file();
        FreshtraceConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static FreshtraceConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
