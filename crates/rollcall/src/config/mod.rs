use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::attendance::{AdmissionConfig, EscalationConfig};

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
    pub admission: AdmissionConfig,
    pub escalation: EscalationConfig,
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

        let mut admission = AdmissionConfig::default();
        if let Ok(raw) = env::var("APP_GRACE_MINUTES") {
            admission.grace_minutes = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes >= 0)
                .ok_or(ConfigError::InvalidGraceMinutes)?;
        }
        if let Ok(raw) = env::var("APP_ALLOW_UNREGISTERED_GEOFENCE") {
            admission.allow_when_unregistered =
                parse_flag(&raw).ok_or_else(|| ConfigError::InvalidFlag {
                    name: "APP_ALLOW_UNREGISTERED_GEOFENCE",
                    value: raw.clone(),
                })?;
        }

        let mut escalation = EscalationConfig::default();
        if let Ok(raw) = env::var("APP_ESCALATION_WINDOW") {
            escalation.recent_window = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|window| *window > 0)
                .ok_or(ConfigError::InvalidEscalationWindow)?;
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            admission,
            escalation,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidGraceMinutes,
    InvalidFlag { name: &'static str, value: String },
    InvalidEscalationWindow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidGraceMinutes => {
                write!(f, "APP_GRACE_MINUTES must be a non-negative integer")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false (found '{value}')")
            }
            ConfigError::InvalidEscalationWindow => {
                write!(f, "APP_ESCALATION_WINDOW must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidGraceMinutes
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidEscalationWindow => None,
        }
    }
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
