//! Process configuration: layered defaults -> config file -> environment -> CLI flags,
//! the same precedence order used by the teacher's `CfSettings` implementations
//! (e.g. `api/bin/chainflip-ingress-egress-tracker`'s `DepositTrackerSettings`).

use std::path::PathBuf;

use clap::Parser;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StellarNetwork {
    Public,
    Testnet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StellarConfig {
    pub network: StellarNetwork,
    /// Custody account secret seed. Never logged.
    pub secret: String,
    pub horizon_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub tfchain_url: String,
    /// Validator key material (SURI or hex seed).
    pub tfchain_seed: String,
    pub stellar: StellarConfig,
    pub persistency_file: PathBuf,
    #[serde(default)]
    pub rescan_bridge_account: bool,
    pub health_check: Option<HealthCheckConfig>,
}

/// Command-line overrides for every `Settings` field. Anything left `None`
/// falls through to the config file / environment defaults.
#[derive(Debug, Parser, Clone, Default)]
#[command(version, about = "tfchain <-> Stellar validator bridge daemon")]
pub struct CommandLineOptions {
    #[arg(long, env = "TFCHAIN_URL")]
    pub tfchain_url: Option<String>,

    #[arg(long, env = "TFCHAIN_SEED")]
    pub tfchain_seed: Option<String>,

    #[arg(long, env = "STELLAR_NETWORK")]
    pub stellar_network: Option<String>,

    #[arg(long, env = "STELLAR_SECRET")]
    pub stellar_secret: Option<String>,

    #[arg(long, env = "STELLAR_HORIZON_URL")]
    pub stellar_horizon_url: Option<String>,

    #[arg(long, env = "PERSISTENCY_FILE")]
    pub persistency_file: Option<PathBuf>,

    #[arg(long, env = "RESCAN_BRIDGE_ACCOUNT")]
    pub rescan_bridge_account: bool,

    #[arg(long, value_name = "config file", default_value = "config/default.toml")]
    pub config_file: PathBuf,
}

impl Settings {
    pub fn load(opts: CommandLineOptions) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("rescan_bridge_account", false)?
            .set_default("health_check", None::<String>)?;

        if opts.config_file.exists() {
            builder = builder.add_source(File::from(opts.config_file.clone()).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::default().separator("__"));

        if let Some(v) = &opts.tfchain_url {
            builder = builder.set_override("tfchain_url", v.clone())?;
        }
        if let Some(v) = &opts.tfchain_seed {
            builder = builder.set_override("tfchain_seed", v.clone())?;
        }
        if let Some(v) = &opts.stellar_network {
            builder = builder.set_override("stellar.network", v.clone())?;
        }
        if let Some(v) = &opts.stellar_secret {
            builder = builder.set_override("stellar.secret", v.clone())?;
        }
        if let Some(v) = &opts.stellar_horizon_url {
            builder = builder.set_override("stellar.horizon_url", v.clone())?;
        }
        if let Some(v) = &opts.persistency_file {
            builder = builder.set_override("persistency_file", v.to_string_lossy().to_string())?;
        }
        if opts.rescan_bridge_account {
            builder = builder.set_override("rescan_bridge_account", true)?;
        }

        builder.build()?.try_deserialize()
    }
}
