use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            undo_window_secs: numeric_var("PIPELINE_UNDO_WINDOW_SECS", defaults.undo_window_secs)?,
            info_notice_secs: numeric_var("PIPELINE_INFO_NOTICE_SECS", defaults.info_notice_secs)?,
            search_debounce_ms: numeric_var(
                "PIPELINE_SEARCH_DEBOUNCE_MS",
                defaults.search_debounce_ms,
            )?,
            note_edit_window_hours: numeric_var(
                "PIPELINE_NOTE_EDIT_WINDOW_HOURS",
                defaults.note_edit_window_hours,
            )?,
            share_base_url: env::var("PIPELINE_SHARE_BASE_URL")
                .unwrap_or(defaults.share_base_url),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
        })
    }
}

fn numeric_var(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Timer and policy dials for a reviewer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub undo_window_secs: u32,
    pub info_notice_secs: u32,
    pub search_debounce_ms: u32,
    pub note_edit_window_hours: u32,
    pub share_base_url: String,
}

impl PipelineConfig {
    pub fn undo_window(&self) -> Duration {
        Duration::seconds(i64::from(self.undo_window_secs))
    }

    pub fn info_notice(&self) -> Duration {
        Duration::seconds(i64::from(self.info_notice_secs))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::milliseconds(i64::from(self.search_debounce_ms))
    }

    pub fn note_edit_window(&self) -> Duration {
        Duration::hours(i64::from(self.note_edit_window_hours))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            undo_window_secs: 30,
            info_notice_secs: 5,
            search_debounce_ms: 300,
            note_edit_window_hours: 24,
            share_base_url: "/admin/candidates".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "PIPELINE_UNDO_WINDOW_SECS",
            "PIPELINE_INFO_NOTICE_SECS",
            "PIPELINE_SEARCH_DEBOUNCE_MS",
            "PIPELINE_NOTE_EDIT_WINDOW_HOURS",
            "PIPELINE_SHARE_BASE_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.undo_window(), Duration::seconds(30));
        assert_eq!(config.pipeline.search_debounce(), Duration::milliseconds(300));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn pipeline_overrides_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_UNDO_WINDOW_SECS", "45");
        env::set_var("PIPELINE_NOTE_EDIT_WINDOW_HOURS", "2");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.pipeline.undo_window_secs, 45);
        assert_eq!(config.pipeline.note_edit_window(), Duration::hours(2));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_pipeline_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_SEARCH_DEBOUNCE_MS", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => {
                assert_eq!(key, "PIPELINE_SEARCH_DEBOUNCE_MS")
            }
            other => panic!("expected invalid number error, got {other:?}"),
        }
        reset_env();
    }
}
