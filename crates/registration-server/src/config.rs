//! Configuration for the registration server.

use anyhow::{ensure, Context, Result};
use registration_core::{AvatarOptions, EmailCollation, WorkFactor};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session token configuration (required: holds the signing key)
    pub token: TokenConfig,

    /// Secret hashing cost
    #[serde(default)]
    pub hasher: HasherConfig,

    /// Identity store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Avatar URL configuration
    #[serde(default)]
    pub avatar: AvatarConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    /// HMAC signing key
    pub secret: SecretString,

    /// How long issued tokens stay valid
    #[serde(default = "default_validity", with = "humantime_serde")]
    pub validity: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HasherConfig {
    /// Argon2 memory cost in KiB
    #[serde(default = "default_memory_cost_kib")]
    pub memory_cost_kib: u32,

    /// Argon2 passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Argon2 lanes
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Enable persistence (if false, principals are in-memory only)
    #[serde(default)]
    pub persist: bool,

    /// Path to the JSON principals file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How emails are compared for uniqueness
    #[serde(default)]
    pub collation: EmailCollation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_base_url")]
    pub base_url: String,

    #[serde(default = "default_avatar_size")]
    pub size: u32,

    #[serde(default = "default_avatar_rating")]
    pub rating: String,

    #[serde(default = "default_avatar_image")]
    pub default_image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: default_memory_cost_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist: false,
            path: default_store_path(),
            collation: EmailCollation::default(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            base_url: default_avatar_base_url(),
            size: default_avatar_size(),
            rating: default_avatar_rating(),
            default_image: default_avatar_image(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

fn default_validity() -> Duration {
    Duration::from_secs(5 * 24 * 60 * 60)
}

fn default_memory_cost_kib() -> u32 {
    WorkFactor::default().memory_cost_kib
}

fn default_iterations() -> u32 {
    WorkFactor::default().iterations
}

fn default_parallelism() -> u32 {
    WorkFactor::default().parallelism
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/data/principals.json")
}

fn default_avatar_base_url() -> String {
    AvatarOptions::default().base_url
}

fn default_avatar_size() -> u32 {
    AvatarOptions::default().size
}

fn default_avatar_rating() -> String {
    AvatarOptions::default().rating
}

fn default_avatar_image() -> String {
    AvatarOptions::default().default_image
}

fn default_log_level() -> String {
    "info".into()
}

impl ServerConfig {
    /// Address to bind, from `listen_addr` and `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid server.listen_addr: {:?}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl HasherConfig {
    pub fn work_factor(&self) -> WorkFactor {
        WorkFactor {
            memory_cost_kib: self.memory_cost_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

impl AvatarConfig {
    pub fn options(&self) -> AvatarOptions {
        AvatarOptions {
            base_url: self.base_url.clone(),
            size: self.size,
            rating: self.rating.clone(),
            default_image: self.default_image.clone(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Nested keys use `__`, e.g. `TOKEN__SECRET` or `STORE__PERSIST`.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(false),
        )
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.token.secret.expose_secret().is_empty(),
            "token.secret must not be empty"
        );
        ensure!(
            self.token.validity >= Duration::from_secs(1),
            "token.validity must be at least one second"
        );
        self.server.socket_addr()?;
        Ok(())
    }
}
