use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::{CommissionPolicy, StreakPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub streak: StreakConfig,
    #[serde(default)]
    pub ticker: TickerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Username of the bootstrap admin account
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Password for the bootstrap admin; generated and logged once when unset on an empty database
    pub admin_password: Option<String>,
    /// Session lifetime in days (default: 7)
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Let anyone create an operator account from the login screen
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
    /// Seconds between purges of expired sessions
    #[serde(default = "default_session_cleanup_interval")]
    pub session_cleanup_interval: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_password: None,
            session_ttl_days: default_session_ttl_days(),
            allow_registration: default_allow_registration(),
            session_cleanup_interval: default_session_cleanup_interval(),
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_allow_registration() -> bool {
    true
}

fn default_session_cleanup_interval() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests per window for authenticated API endpoints
    #[serde(default = "default_api_requests_per_window")]
    pub api_requests_per_window: u32,
    /// Requests per window for login/registration
    #[serde(default = "default_auth_requests_per_window")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only enable behind a reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            api_requests_per_window: default_api_requests_per_window(),
            auth_requests_per_window: default_auth_requests_per_window(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_api_requests_per_window() -> u32 {
    120
}

fn default_auth_requests_per_window() -> u32 {
    20
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommissionConfig {
    /// `progressive` (moving targets, 0.5-1.5%) or `fixed_target` (50k goal, flat 1%)
    #[serde(default)]
    pub policy: CommissionPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreakConfig {
    /// `consecutive` or `distinct_days`
    #[serde(default)]
    pub policy: StreakPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// How many sales the recent feed shows
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_recent_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Rows in the top sales table
    #[serde(default = "default_top_sales_limit")]
    pub top_sales_limit: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_sales_limit: default_top_sales_limit(),
        }
    }
}

fn default_top_sales_limit() -> i64 {
    5
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
