//! Command-line interface definition.

use beacon_pos::config::PosConfig;
use beacon_pos::ReferenceCode;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Proximity-triggered wallet verification for a POS terminal.
#[derive(Parser, Debug)]
#[command(name = "beacon-pos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verifier API base URL.
    #[arg(long, env = "POS_VERIFIER_URL")]
    pub verifier_url: Option<String>,

    /// Verifier access token.
    #[arg(long, env = "POS_VERIFIER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// API key clients must send in `X-API-Key`.
    #[arg(long, env = "POS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// HTTP API bind address.
    #[arg(long, short, env = "POS_BIND")]
    pub bind: Option<SocketAddr>,

    /// Do not start the HTTP API.
    #[arg(long)]
    pub no_server: bool,

    /// Beacon MAC addresses that trigger a transaction.
    #[arg(long, short, env = "POS_TARGET_ADDRESS", value_delimiter = ',')]
    pub target_address: Vec<String>,

    /// RSSI above which a beacon counts as near (dBm).
    #[arg(long, allow_negative_numbers = true, env = "POS_RSSI_THRESHOLD")]
    pub rssi_threshold: Option<i16>,

    /// Reference code used for proximity-triggered transactions.
    #[arg(long, value_enum, env = "POS_REFERENCE")]
    pub reference: Option<CliReference>,

    /// Directory for saved QR code images.
    #[arg(long, env = "POS_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Seconds a generated transaction stays live.
    #[arg(long, env = "POS_SESSION_TTL")]
    pub session_ttl_secs: Option<u64>,

    /// Price before discount.
    #[arg(long, env = "POS_BASE_AMOUNT")]
    pub base_amount: Option<Decimal>,

    /// JSON-lines advertisement feed to read ("-" for stdin).
    #[arg(long, short)]
    pub advertisements: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Reference code CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliReference {
    /// MRT gate entry.
    EnterMrt,
    /// Mobile invoice carrier.
    InvoiceCode,
    /// EasyCard number.
    Easycard,
    /// Student identity.
    Student,
    /// Senior identity.
    Senior,
}

impl Cli {
    /// Convert CLI arguments into a `PosConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<PosConfig> {
        let mut config = if let Some(ref path) = self.config {
            PosConfig::from_file(path)?
        } else {
            PosConfig::default()
        };

        if let Some(url) = self.verifier_url {
            config.verifier.base_url = url;
        }
        if let Some(token) = self.access_token {
            config.verifier.access_token = token;
        }

        config.server.enabled = config.server.enabled && !self.no_server;
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(api_key) = self.api_key {
            config.server.api_key = api_key;
        }

        if !self.target_address.is_empty() {
            config.proximity.target_addresses = self.target_address;
        }
        if let Some(threshold) = self.rssi_threshold {
            config.proximity.rssi_threshold = threshold;
        }
        if let Some(reference) = self.reference {
            config.proximity.reference = reference.into();
        }

        if let Some(dir) = self.artifact_dir {
            config.artifact_dir = dir;
        }
        if let Some(ttl) = self.session_ttl_secs {
            config.session.ttl_secs = ttl;
        }
        if let Some(amount) = self.base_amount {
            config.pricing.base_amount = amount;
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}

impl From<CliReference> for ReferenceCode {
    fn from(r: CliReference) -> Self {
        match r {
            CliReference::EnterMrt => Self::EnterMrt,
            CliReference::InvoiceCode => Self::InvoiceCode,
            CliReference::Easycard => Self::EasyCard,
            CliReference::Student => Self::Student,
            CliReference::Senior => Self::Senior,
        }
    }
}
