//! The configuration shared by all cheatcalls harness crates.
//!
//! Every argument can also be supplied through the environment, which is how the behavioral test
//! suite is configured (`HARNESS_NODE=anvil ALCHEMY_API_KEY=... cargo test -- --ignored`).

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::signers::local::PrivateKeySigner;
use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use temp_dir::TempDir;

#[derive(Debug, Parser, Clone, Serialize, Deserialize)]
#[command(name = "cheatcalls")]
pub struct Arguments {
    /// The fork provider that materializes the forked chain.
    #[arg(long = "node", env = "HARNESS_NODE", default_value = "anvil")]
    pub node: ForkProviderKind,

    /// The Alchemy API key used to build the origin chain RPC URLs anvil forks from.
    #[arg(long = "alchemy-api-key", env = "ALCHEMY_API_KEY", hide_env_values = true)]
    pub alchemy_api_key: Option<String>,

    /// The path to the `anvil` executable.
    ///
    /// By default it uses the `anvil` binary found in `$PATH`.
    #[arg(long = "anvil", env = "ANVIL_BINARY", default_value = "anvil")]
    pub anvil: PathBuf,

    /// The maximum time in milliseconds to wait for anvil to start.
    ///
    /// Forking has to fetch the fork block from the origin chain, so this is generous.
    #[arg(long = "anvil-start-timeout", default_value = "30000")]
    pub anvil_start_timeout: u64,

    /// The Tenderly access key sent as `X-Access-Key` to the management API.
    #[arg(long = "tenderly-api-key", env = "TENDERLY_API_KEY", hide_env_values = true)]
    pub tenderly_api_key: Option<String>,

    /// The Tenderly account owning the virtual networks.
    #[arg(long = "tenderly-account", env = "TENDERLY_ACCOUNT")]
    pub tenderly_account: Option<String>,

    /// The Tenderly project the virtual networks are created in.
    #[arg(long = "tenderly-project", env = "TENDERLY_PROJECT")]
    pub tenderly_project: Option<String>,

    /// The base URL of the Tenderly management API.
    #[arg(
        long = "tenderly-api-url",
        env = "TENDERLY_API_URL",
        default_value = "https://api.tenderly.co"
    )]
    pub tenderly_api_url: String,

    /// A place to store node logs and other temporary artifacts.
    ///
    /// Creates a temporary dir if not specified.
    #[arg(long = "workdir", short, env = "HARNESS_WORKDIR")]
    pub working_directory: Option<PathBuf>,

    /// Add a tempdir manually if `working_directory` was not given.
    ///
    /// We attach it here because [TempDir] prunes itself on drop.
    #[clap(skip)]
    #[serde(skip)]
    pub temp_dir: Option<&'static TempDir>,

    /// The private key of the sender account.
    ///
    /// A fresh random key is generated for every harness if not specified.
    #[arg(long = "sender", env = "HARNESS_SENDER", hide_env_values = true)]
    pub sender: Option<String>,
}

impl Arguments {
    /// Return the configured working directory with the following precedence:
    /// 1. `self.working_directory` if it was provided.
    /// 2. `self.temp_dir` if it it was provided
    /// 3. Panic.
    pub fn directory(&self) -> &Path {
        if let Some(path) = &self.working_directory {
            return path.as_path();
        }

        if let Some(temp_dir) = &self.temp_dir {
            return temp_dir.path();
        }

        panic!("should have a workdir configured")
    }

    /// Makes sure a working directory is available, leaking a [TempDir] for the rest of the
    /// process if none was configured.
    pub fn with_working_directory(mut self) -> anyhow::Result<Self> {
        if self.working_directory.is_none() && self.temp_dir.is_none() {
            let temp_dir = TempDir::with_prefix("cheatcalls-")
                .context("Failed to create a temporary working directory")?;
            self.temp_dir = Some(Box::leak(Box::new(temp_dir)));
        }
        Ok(self)
    }

    /// The configured sender, or a freshly generated one.
    pub fn sender(&self) -> anyhow::Result<PrivateKeySigner> {
        match &self.sender {
            Some(private_key) => private_key
                .parse::<PrivateKeySigner>()
                .context("Failed to parse the sender private key"),
            None => Ok(PrivateKeySigner::random()),
        }
    }

    /// The slice of the configuration the anvil provider needs.
    ///
    /// Fails if no working directory was configured, see [Arguments::with_working_directory].
    pub fn anvil_configuration(&self) -> anyhow::Result<AnvilConfiguration> {
        let working_directory = match (&self.working_directory, self.temp_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(temp_dir)) => temp_dir.path().to_path_buf(),
            (None, None) => anyhow::bail!("No working directory is configured for anvil"),
        };
        Ok(AnvilConfiguration {
            path: self.anvil.clone(),
            start_timeout: Duration::from_millis(self.anvil_start_timeout),
            working_directory,
            alchemy_api_key: self.alchemy_api_key.clone(),
        })
    }

    /// The slice of the configuration the Tenderly provider needs.
    pub fn tenderly_configuration(&self) -> TenderlyConfiguration {
        TenderlyConfiguration {
            api_url: self.tenderly_api_url.trim_end_matches('/').to_string(),
            api_key: self.tenderly_api_key.clone(),
            account: self.tenderly_account.clone(),
            project: self.tenderly_project.clone(),
        }
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments::parse_from(["cheatcalls"])
    }
}

/// The backends a fork can be materialized with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "lower")]
#[serde(rename_all = "lowercase")]
pub enum ForkProviderKind {
    /// A local anvil process forking the origin chain.
    Anvil,
    /// A Tenderly virtual network created through the management API.
    Tenderly,
}

impl Display for ForkProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anvil => f.write_str("anvil"),
            Self::Tenderly => f.write_str("tenderly"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnvilConfiguration {
    pub path: PathBuf,
    pub start_timeout: Duration,
    /// Node directories and logs are created beneath this directory.
    pub working_directory: PathBuf,
    pub alchemy_api_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenderlyConfiguration {
    /// The management API base, without a trailing slash.
    pub api_url: String,
    pub api_key: Option<String>,
    pub account: Option<String>,
    pub project: Option<String>,
}
