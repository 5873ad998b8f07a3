use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::workflows::grants::invites::DEFAULT_INVITE_TTL_DAYS;
use crate::workflows::grants::{IssuePolicy, PipelineConfig, PriceCatalog, ScoringConfig};

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
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub billing: BillingConfig,
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
        let log_format = match optional("APP_LOG_FORMAT") {
            Some(value) => LogFormat::from_str(&value)
                .map_err(|_| ConfigError::invalid("APP_LOG_FORMAT", &value))?,
            None => LogFormat::Compact,
        };

        let database_path = optional("GRANTS_DATABASE_PATH").map(PathBuf::from);

        let issue_policy = match optional("GRANTS_ISSUE_POLICY") {
            Some(value) => IssuePolicy::parse(&value)
                .ok_or_else(|| ConfigError::invalid("GRANTS_ISSUE_POLICY", &value))?,
            None => IssuePolicy::default(),
        };
        let invite_ttl_days = parsed("GRANTS_INVITE_TTL_DAYS", DEFAULT_INVITE_TTL_DAYS)?;
        if invite_ttl_days <= 0 {
            return Err(ConfigError::invalid(
                "GRANTS_INVITE_TTL_DAYS",
                &invite_ttl_days.to_string(),
            ));
        }

        let dispatch = match optional("MAIL_DISPATCH") {
            Some(value) => DispatchMode::from_str(&value)
                .map_err(|_| ConfigError::invalid("MAIL_DISPATCH", &value))?,
            None => DispatchMode::Inline,
        };
        let queue_capacity = parsed("MAIL_QUEUE_CAPACITY", 256usize)?;
        if queue_capacity == 0 {
            return Err(ConfigError::invalid("MAIL_QUEUE_CAPACITY", "0"));
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            storage: StorageConfig { database_path },
            mail: MailConfig {
                from_address: optional("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|| "grants@localhost".to_string()),
                dispatch,
                queue_capacity,
                portal_url: optional("MAIL_PORTAL_URL")
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
            },
            billing: BillingConfig {
                webhook_secret: optional("BILLING_WEBHOOK_SECRET"),
                prices: PriceCatalog {
                    monthly: optional("BILLING_PRICE_MONTHLY"),
                    annual: optional("BILLING_PRICE_ANNUAL"),
                },
            },
            pipeline: PipelineConfig {
                scoring: ScoringConfig { issue_policy },
                invite_ttl_days,
            },
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(key, &value)),
        None => Ok(default),
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Where records live. Without a database path the server keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// How stage notifications leave the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Inline,
    Queued,
}

impl FromStr for DispatchMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" | "sync" => Ok(Self::Inline),
            "queued" | "queue" | "async" => Ok(Self::Queued),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_address: String,
    pub dispatch: DispatchMode,
    pub queue_capacity: usize,
    /// Base URL of the client portal, used for invitation links.
    pub portal_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct BillingConfig {
    /// Shared secret expected in the webhook header; unset disables the check.
    pub webhook_secret: Option<String>,
    pub prices: PriceCatalog,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{key} has an invalid value '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
        }
    }
}
