use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::membership::MembershipSettings;

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
    pub membership: MembershipSettings,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            membership: load_membership_settings()?,
        })
    }
}

fn load_membership_settings() -> Result<MembershipSettings, ConfigError> {
    let defaults = MembershipSettings::default();

    let collaborator_timeout = match env::var("APP_COLLABORATOR_TIMEOUT_MS") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(millis) if millis > 0 => Duration::from_millis(millis),
            _ => return Err(ConfigError::InvalidCollaboratorTimeout),
        },
        Err(_) => defaults.collaborator_timeout,
    };

    let membership_fee = match env::var("APP_MEMBERSHIP_FEE") {
        Ok(raw) => match Decimal::from_str(raw.trim()) {
            Ok(fee) if fee > Decimal::ZERO => fee,
            _ => return Err(ConfigError::InvalidMembershipFee),
        },
        Err(_) => defaults.membership_fee,
    };

    let membership_period_days = match env::var("APP_MEMBERSHIP_PERIOD_DAYS") {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(days) if days > 0 => days,
            _ => return Err(ConfigError::InvalidMembershipPeriod),
        },
        Err(_) => defaults.membership_period_days,
    };

    let organization_name = env::var("APP_ORGANIZATION_NAME")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or(defaults.organization_name);

    Ok(MembershipSettings {
        collaborator_timeout,
        membership_fee,
        membership_period_days,
        organization_name,
        ..defaults
    })
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

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCollaboratorTimeout,
    InvalidMembershipFee,
    InvalidMembershipPeriod,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCollaboratorTimeout => write!(
                f,
                "APP_COLLABORATOR_TIMEOUT_MS must be a positive number of milliseconds"
            ),
            ConfigError::InvalidMembershipFee => {
                write!(f, "APP_MEMBERSHIP_FEE must be a positive decimal amount")
            }
            ConfigError::InvalidMembershipPeriod => {
                write!(f, "APP_MEMBERSHIP_PERIOD_DAYS must be a positive number of days")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCollaboratorTimeout
            | ConfigError::InvalidMembershipFee
            | ConfigError::InvalidMembershipPeriod => None,
        }
    }
}
