use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// State backend configuration
    pub state: StateConfig,

    /// Grafana IRM integration
    pub grafana: GrafanaConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: INCIDENT_BRIDGE_)
            .add_source(
                config::Environment::with_prefix("INCIDENT_BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Display name reported by the health endpoint
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            app_name: default_app_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database
    pub path: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Sled,
            path: Some(PathBuf::from("./data/incident_bridge")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Sled,
    Memory,
}

/// Grafana IRM connection settings.
///
/// The API token may be given inline or through the environment variable
/// named by `api_token_env`; an inline, non-empty token wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrafanaConfig {
    /// Base address of the Grafana instance
    #[serde(default = "default_grafana_base_url")]
    pub base_url: String,

    /// Service account token
    #[serde(default)]
    pub api_token: Option<String>,

    /// Environment variable holding the token
    #[serde(default = "default_grafana_token_env")]
    pub api_token_env: Option<String>,

    /// Incident creation timeout (seconds)
    #[serde(default = "default_grafana_timeout")]
    pub timeout_secs: u64,
}

impl GrafanaConfig {
    /// Base address with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Resolve the access credential, if any
    pub fn api_token(&self) -> Option<String> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.api_token_env
                    .as_deref()
                    .and_then(|name| std::env::var(name).ok())
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
            })
    }

    pub fn has_api_token(&self) -> bool {
        self.api_token().is_some()
    }
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            base_url: default_grafana_base_url(),
            api_token: None,
            api_token_env: default_grafana_token_env(),
            timeout_secs: default_grafana_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_app_name() -> String {
    "Incident Bridge".to_string()
}

fn default_grafana_base_url() -> String {
    "https://grafana.example.com".to_string()
}

fn default_grafana_token_env() -> Option<String> {
    Some("GRAFANA_IRM_API_TOKEN".to_string())
}

fn default_grafana_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "incident-bridge".to_string()
}

fn default_true() -> bool {
    true
}
