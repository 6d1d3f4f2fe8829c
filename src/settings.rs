//! Layered configuration
//!
//! Sources, later ones winning: an optional TOML file, environment variables
//! prefixed `CAMPUS_WALLET` (nested keys separated by `__`, e.g.
//! `CAMPUS_WALLET__SERVER__PORT=8080`), then command-line overrides.

use std::net::SocketAddr;
use std::path::Path;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::EngineConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/campus-wallet.toml";
const ENV_PREFIX: &str = "CAMPUS_WALLET";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unknown timezone '{0}'")]
    Timezone(String),

    #[error("invalid listen address {0}")]
    Address(String),

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub engine: EngineSettings,
    pub gateway: GatewaySettings,
    /// Sandbox identity directory
    pub users: Vec<SandboxUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `campus_wallet=debug`
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub timezone: String,
    pub topup_minimum: Decimal,
    pub pending_expiry_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub checkout_base_url: String,
    pub return_base_url: String,
    /// Serve the unauthenticated `/sandbox/checkout` settle routes
    pub sandbox: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SandboxUser {
    pub id: String,
    pub pin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_string(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            timezone: "Asia/Dhaka".to_string(),
            topup_minimum: Decimal::from(100),
            pending_expiry_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            checkout_base_url: "http://127.0.0.1:3000/sandbox/checkout".to_string(),
            return_base_url: "http://localhost:5173".to_string(),
            sandbox: false,
        }
    }
}

impl Settings {
    /// Read the file at `path` (if present) and the environment
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = format!("{}:{}", self.server.bind, self.server.port);
        raw.parse().map_err(|_| SettingsError::Address(raw))
    }

    pub fn timezone(&self) -> Result<Tz, SettingsError> {
        self.engine
            .timezone
            .parse()
            .map_err(|_| SettingsError::Timezone(self.engine.timezone.clone()))
    }

    pub fn engine_config(&self) -> Result<EngineConfig, SettingsError> {
        let expiry = i64::try_from(self.engine.pending_expiry_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(SettingsError::OutOfRange("engine.pending_expiry_secs"))?;

        Ok(EngineConfig {
            topup_minimum: self.engine.topup_minimum,
            pending_expiry: expiry,
            ..EngineConfig::default()
        })
    }

    pub fn sweep_interval(&self) -> Result<std::time::Duration, SettingsError> {
        if self.engine.sweep_interval_secs == 0 {
            return Err(SettingsError::OutOfRange("engine.sweep_interval_secs"));
        }
        Ok(std::time::Duration::from_secs(self.engine.sweep_interval_secs))
    }
}
