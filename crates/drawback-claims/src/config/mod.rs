use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::workflows::claim::{FormDefaults, SessionSettings};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Deployment stage, taken from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Development,
    Test,
    Production,
}

impl FromStr for AppEnvironment {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        })
    }
}

/// Everything the claim service reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub claims: ClaimConfig,
}

impl AppConfig {
    /// Read `APP_*` variables, after loading a `.env` file when one exists.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment: AppEnvironment = lookup("APP_ENV")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { value: raw })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match lookup("APP_COLLABORATOR_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout { value: raw })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host: lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: lookup("APP_LOG_LEVEL")
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
            backend: BackendConfig {
                base_url: lookup("APP_BACKEND_URL"),
            },
            claims: ClaimConfig {
                collaborator_timeout: Duration::from_secs(timeout_secs),
                default_company_name: lookup("APP_DEFAULT_COMPANY_NAME"),
            },
        })
    }
}

/// Trimmed value of `key`; blank counts as unset.
fn lookup(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::InvalidHost {
                    value: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where collaborator calls go. No URL selects the offline backend.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimConfig {
    pub collaborator_timeout: Duration,
    pub default_company_name: Option<String>,
}

impl ClaimConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            collaborator_timeout: self.collaborator_timeout,
            form_defaults: FormDefaults {
                company_name: self.default_company_name.clone(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a port number, got '{value}'")]
    InvalidPort { value: String },
    #[error("APP_HOST must be localhost or an IP address, got '{value}'")]
    InvalidHost {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("APP_COLLABORATOR_TIMEOUT_SECS must be a positive number of seconds, got '{value}'")]
    InvalidTimeout { value: String },
}
