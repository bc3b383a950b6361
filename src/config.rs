use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use crate::storage::models::ProviderRole;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub trigger: TriggerConfig,
    pub verification: VerificationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub max_tracked_ips: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TriggerConfig {
    /// Shared secret expected in `Authorization: Bearer <secret>`.
    /// Leaving it unset opens the trigger endpoint.
    pub cron_secret: Option<String>,
    pub default_role: ProviderRole,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct VerificationConfig {
    pub interval_secs: u64,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
    #[serde(default)]
    pub notifications_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            max_tracked_ips: 1_000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "verifier.db".to_string(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            default_role: ProviderRole::Company,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 12 * 60 * 60,
            dry_run: false,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("config/default")
    }

    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                // Values stay strings until deserialization so an all-digit
                // cron secret keeps its leading zeros.
                config::Environment::with_prefix("VERIFIER").separator("__"),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.verification.interval_secs == 0 {
            anyhow::bail!("verification.interval_secs must be greater than zero");
        }
        let rate_limit = &self.server.rate_limit;
        if rate_limit.window_secs == 0 {
            anyhow::bail!("server.rate_limit.window_secs must be greater than zero");
        }
        if rate_limit.max_requests == 0 {
            anyhow::bail!("server.rate_limit.max_requests must be greater than zero");
        }
        if rate_limit.max_tracked_ips == 0 {
            anyhow::bail!("server.rate_limit.max_tracked_ips must be greater than zero");
        }
        if let Some(secret) = &self.trigger.cron_secret {
            if secret.trim().is_empty() {
                anyhow::bail!("trigger.cron_secret must not be blank when set");
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write this configuration as TOML to a new file. An existing file is
    /// left untouched and reported as an error.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                anyhow::bail!("Refusing to overwrite existing config file {}", path.display())
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(self.to_toml()?.as_bytes())?;
        Ok(())
    }
}

/// Resolve the `--config` argument to a file path; the extension is optional
/// there, so a bare name gets `.toml`.
pub fn config_file_path(name: &str) -> PathBuf {
    let path = PathBuf::from(name);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("toml")
    }
}
