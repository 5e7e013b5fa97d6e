use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Command line of `contract-deployer`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Environment file loaded before reading any other option.
    #[arg(long, global = true, default_value = ".env.local")]
    pub env_file: PathBuf,
    /// Raise log verbosity (`-v` info, `-vv` debug). `RUST_LOG` takes
    /// precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// When to color console output.
    #[arg(long, global = true, value_enum, default_value_t = Color::Auto)]
    pub color: Color,
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub deploy: Deploy,
}

impl Config {
    /// Parses the command line after loading the environment file it names,
    /// so that options backed by environment variables can be set there.
    ///
    /// An environment file that exists but cannot be loaded is returned
    /// alongside the config so it can be logged once logging is set up.
    pub fn load() -> (Self, Option<dotenvy::Error>) {
        let config = Self::parse();
        match load_env_file(&config.env_file) {
            Ok(true) => (Self::parse(), None),
            Ok(false) => (config, None),
            Err(e) => (config, Some(e)),
        }
    }

    /// The command to run, `deploy` when none was given.
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Deploy)
    }
}

/// Loads `path` into the environment, returning whether it existed.
fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Color {
    Auto,
    Always,
    Never,
}

impl Color {
    pub fn enabled(self) -> bool {
        use std::io::IsTerminal;

        match self {
            Color::Auto => std::io::stdout().is_terminal(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Options are global: they apply whether given before or after the
/// subcommand name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Deploy a contract artifact (the default).
    #[command(name = "deploy")]
    Deploy,
    /// List the known networks.
    #[command(name = "networks")]
    Networks,
}

/// Deploy a compiled contract and print its address.
#[derive(Args, Debug, Clone)]
pub struct Deploy {
    #[command(flatten)]
    pub network: NetworkArgs,
    #[command(flatten)]
    pub auth: PrivateKey,
    /// Directory holding the compiled contract artifacts.
    #[arg(long, global = true, env = "DEPLOY_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,
    /// Contract to deploy, either `Name` or `contracts/Name.sol:Name`.
    #[arg(long, global = true, env = "DEPLOY_CONTRACT", default_value = "MyToken")]
    pub contract: String,
    /// Constructor arguments. Defaults to the deployer's address when the
    /// constructor takes arguments.
    #[arg(long, global = true, num_args = 1..)]
    pub args: Vec<String>,
    /// Blocks to wait for before the deployment counts as confirmed.
    #[arg(long, global = true, default_value_t = 1)]
    pub confirmations: u64,
    /// Give up waiting for confirmation after this long (e.g. `5m`).
    /// Waits indefinitely when unset.
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

/// Network selection.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// Network to deploy to.
    #[arg(long, global = true, env = "DEPLOY_NETWORK", default_value = "localhost")]
    pub network: String,
    /// TOML file with additional `[networks.<name>]` entries.
    #[arg(long, global = true, env = "DEPLOY_NETWORKS_FILE")]
    pub networks_file: Option<PathBuf>,
    /// Override the network's RPC endpoint.
    #[arg(long, global = true, env = "RPC_URL")]
    pub rpc_url: Option<String>,
    /// Override the network's expected chain id.
    #[arg(long, global = true)]
    pub chain_id: Option<u64>,
}

/// Sources for the deployer's signing key, tried in order.
#[derive(Args, Debug, Clone, Default)]
pub struct PrivateKey {
    /// Private key as a hex string, with or without `0x`.
    #[arg(long, global = true, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
    /// File containing a hex private key.
    #[arg(long, global = true)]
    pub private_key_path: Option<PathBuf>,
    /// Encrypted keystore file.
    #[arg(long, global = true)]
    pub keystore_path: Option<PathBuf>,
    /// File containing the keystore password.
    #[arg(long, global = true)]
    pub keystore_password_path: Option<PathBuf>,
}
