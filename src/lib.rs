use std::process::ExitCode;

pub mod artifact;
pub mod chain;
pub mod config;
pub mod deployer;
pub mod error;
pub mod formatting;
mod logging;
pub mod network;
pub mod wallet;

pub use config::Config;
pub use deployer::{deploy, Deployment, Request};
pub use error::DeployError;

use config::Commands;

/// Main entrypoint to `contract-deployer`.
///
/// Exits with `0` once the deployed address has been reported and with `1`
/// on any failure.
pub fn run() -> ExitCode {
    let (config, env_error) = Config::load();
    logging::init(config.verbose);
    if let Some(e) = env_error {
        tracing::warn!(path = %config.env_file.display(), "ignoring environment file: {e}");
    }
    let color = config.color.enabled();

    let result = match config.command() {
        Commands::Deploy => config.deploy.run(color).map(|_| ()),
        Commands::Networks => config.deploy.network.list(color).map_err(DeployError::from),
    };
    if let Err(e) = &result {
        eprintln!("{}", e.report_line());
    }

    ExitCode::from(error::exit_status(&result))
}
