//! Configuration for beacon-pos.

use crate::error::{Error, Result};
use crate::reference::ReferenceCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default verifier sandbox endpoint.
pub const DEFAULT_VERIFIER_URL: &str = "https://verifier-sandbox.wallet.gov.tw/api/oidvp";

/// Terminal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosConfig {
    /// Verifier API configuration.
    #[serde(default)]
    pub verifier: VerifierConfig,

    /// Proximity trigger configuration.
    #[serde(default)]
    pub proximity: ProximityConfig,

    /// HTTP API configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session store configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Pricing configuration.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Directory where QR code images are written.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Verifier API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Base URL; `/qrcode` and `/result` are appended.
    #[serde(default = "default_verifier_url")]
    pub base_url: String,

    /// Access token sent as the `Access-Token` header.
    #[serde(default, skip_serializing)]
    pub access_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Proximity trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityConfig {
    /// Beacon MAC addresses to watch.
    #[serde(default)]
    pub target_addresses: Vec<String>,

    /// RSSI threshold in dBm; strictly above counts as near.
    #[serde(default = "default_rssi_threshold")]
    pub rssi_threshold: i16,

    /// Reference code used for proximity-triggered transactions.
    #[serde(default = "default_reference")]
    pub reference: ReferenceCode,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Serve the HTTP API.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Key required in the `X-API-Key` header for `/api/*`.
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a recorded transaction in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Amount charged before any identity discount.
    #[serde(default = "default_base_amount")]
    pub base_amount: Decimal,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            verifier: VerifierConfig::default(),
            proximity: ProximityConfig::default(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            pricing: PricingConfig::default(),
            artifact_dir: default_artifact_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_verifier_url(),
            access_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            target_addresses: Vec::new(),
            rssi_threshold: default_rssi_threshold(),
            reference: default_reference(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            api_key: String::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_amount: default_base_amount(),
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "beacon-pos")
        .map(|dirs| dirs.data_dir().join("qrcodes"))
        .unwrap_or_else(|| PathBuf::from(".beacon-pos/qrcodes"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_verifier_url() -> String {
    DEFAULT_VERIFIER_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_rssi_threshold() -> i16 {
    -50
}

const fn default_reference() -> ReferenceCode {
    ReferenceCode::EnterMrt
}

const fn default_true() -> bool {
    true
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5001))
}

const fn default_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_base_amount() -> Decimal {
    Decimal::from(100)
}

impl SessionConfig {
    /// Session lifetime as a duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl VerifierConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PosConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file. Secrets are not written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every required secret is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the verifier access token is missing, or
    /// if the HTTP API is enabled without an API key.
    pub fn validate(&self) -> Result<()> {
        if self.verifier.access_token.trim().is_empty() {
            return Err(Error::Config(
                "verifier access token is not set".to_string(),
            ));
        }
        if self.server.enabled && self.server.api_key.trim().is_empty() {
            return Err(Error::Config(
                "API key is required when the HTTP API is enabled".to_string(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(Error::Config("session ttl must be non-zero".to_string()));
        }
        Ok(())
    }
}
