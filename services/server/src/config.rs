//! Configuration loading: a single JSON document with defaults filled in
//! and environment variable overrides applied afterward.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub auth: AuthConfig,
    pub broadcast: BroadcastConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub udp_port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub auth_timeout_ms: u64,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    server: Option<RawServerConfig>,
    discovery: Option<RawDiscoveryConfig>,
    auth: Option<RawAuthConfig>,
    broadcast: Option<RawBroadcastConfig>,
    session: Option<RawSessionConfig>,
    logging: Option<RawLoggingConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawServerConfig {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDiscoveryConfig {
    udp_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAuthConfig {
    token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawBroadcastConfig {
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSessionConfig {
    auth_timeout_ms: Option<u64>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLoggingConfig {
    level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Load configuration from a JSON file at `path`, then apply
/// `PICORADAR_PORT`/`PICORADAR_AUTH_TOKEN` environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_from_str(&text, path)
}

fn load_config_from_str(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config_from_raw(raw)
}

fn config_from_raw(raw: RawConfig) -> Result<Config, ConfigError> {
    let server = raw.server.unwrap_or_default();
    let discovery = raw.discovery.unwrap_or_default();
    let auth = raw.auth.unwrap_or_default();
    let broadcast = raw.broadcast.unwrap_or_default();
    let session = raw.session.unwrap_or_default();
    let logging = raw.logging.unwrap_or_default();

    let token = auth.token.ok_or(ConfigError::MissingField("auth.token"))?;
    if token.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "auth.token",
            reason: "must not be empty".to_owned(),
        });
    }

    let mut config = Config {
        server: ServerConfig {
            host: server.host.unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: server.port.unwrap_or(11451),
        },
        discovery: DiscoveryConfig {
            udp_port: discovery.udp_port.unwrap_or(11450),
        },
        auth: AuthConfig { token },
        broadcast: BroadcastConfig {
            interval_ms: broadcast.interval_ms.unwrap_or(50),
        },
        session: SessionConfig {
            auth_timeout_ms: session.auth_timeout_ms.unwrap_or(5000),
            queue_capacity: session.queue_capacity.unwrap_or(16),
        },
        logging: LoggingConfig {
            level: logging.level.unwrap_or_else(|| "INFO".to_owned()),
        },
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(port) = std::env::var("PICORADAR_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
            field: "PICORADAR_PORT",
            reason: format!("'{port}' is not a valid port number"),
        })?;
    }
    if let Ok(token) = std::env::var("PICORADAR_AUTH_TOKEN") {
        config.auth.token = token;
    }
    Ok(())
}
