use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level waygate configuration, loaded from `config.toml`.
///
/// Resolution order: `WAYGATE_CONFIG_DIR` env → `~/.waygate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Message store configuration (`[store]`).
    #[serde(default)]
    pub store: StoreConfig,

    /// Gateway server configuration: host, port (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider adapter configuration (`[provider]`).
    #[serde(default)]
    pub provider: ProviderConfig,
}

// ── Store ────────────────────────────────────────────────────────

/// Message store configuration (`[store]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum buffered records before FIFO eviction (default: 1000)
    #[serde(default = "default_store_capacity")]
    pub capacity: usize,
}

fn default_store_capacity() -> usize {
    crate::store::DEFAULT_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_store_capacity(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8787)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
}

fn default_gateway_port() -> u16 {
    8787
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────

/// Which provider adapter to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// stdin/stdout development adapter
    #[default]
    Console,
    /// WebSocket connection to a provider bridge process
    Bridge,
}

/// Provider adapter configuration (`[provider]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Adapter selection (default: console)
    #[serde(default)]
    pub kind: ProviderKind,
    /// Bridge WebSocket URL, required when kind = "bridge"
    /// (e.g. "ws://127.0.0.1:8055/stream")
    #[serde(default)]
    pub bridge_url: Option<String>,
}

// ── Load / save ──────────────────────────────────────────────────

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_at(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing defaults on first run.
    pub async fn load_or_init_at(config_dir: &Path) -> Result<Self> {
        fs::create_dir_all(config_dir)
            .await
            .with_context(|| format!("Failed to create config directory {}", config_dir.display()))?;

        let config_path = config_dir.join("config.toml");

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            config.apply_env_overrides();
            config.validate()?;
            tracing::info!(
                path = %config.config_path.display(),
                initialized = false,
                "Config loaded"
            );
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = config_path;
            config.save().await?;
            config.apply_env_overrides();
            config.validate()?;
            tracing::info!(
                path = %config.config_path.display(),
                initialized = true,
                "Config loaded"
            );
            Ok(config)
        }
    }

    /// Apply environment-variable overrides on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("WAYGATE_GATEWAY_HOST") {
            if !host.trim().is_empty() {
                self.gateway.host = host.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("WAYGATE_GATEWAY_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("Ignoring invalid WAYGATE_GATEWAY_PORT={port:?}"),
            }
        }
        if let Ok(capacity) = std::env::var("WAYGATE_STORE_CAPACITY") {
            match capacity.trim().parse::<usize>() {
                Ok(capacity) => self.store.capacity = capacity,
                Err(_) => tracing::warn!("Ignoring invalid WAYGATE_STORE_CAPACITY={capacity:?}"),
            }
        }
        if let Ok(url) = std::env::var("WAYGATE_BRIDGE_URL") {
            if !url.trim().is_empty() {
                self.provider.kind = ProviderKind::Bridge;
                self.provider.bridge_url = Some(url.trim().to_string());
            }
        }
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to
    /// catch obviously invalid values early instead of failing at arbitrary
    /// runtime points.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }

        if self.store.capacity == 0 {
            anyhow::bail!("store.capacity must be greater than 0");
        }

        if self.provider.kind == ProviderKind::Bridge {
            let url_ok = self
                .provider
                .bridge_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty());
            if !url_ok {
                anyhow::bail!("provider.bridge_url is required when provider.kind = \"bridge\"");
            }
        }

        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(&self.config_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        Ok(())
    }
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("WAYGATE_CONFIG_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let user_dirs = UserDirs::new().context("Could not determine home directory")?;
    Ok(user_dirs.home_dir().join(".waygate"))
}
