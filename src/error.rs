use alloy::primitives::TxHash;
use thiserror::Error;

/// Message printed when no account is available to sign the deployment.
pub const NO_SIGNER_MESSAGE: &str = "No deployer account found. Check your configuration.";

/// Everything that can end a deployment run.
///
/// None of these are retried: the run stops at the first one and the process
/// exits with status `1`.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("No deployer account found. Check your configuration.")]
    NoSigner,
    #[error("artifact for contract \"{name}\" not found")]
    ArtifactNotFound { name: String },
    #[error(
        "there are multiple artifacts for contract \"{name}\", use a fully qualified name: {}",
        .candidates.join(", ")
    )]
    AmbiguousArtifact {
        name: String,
        candidates: Vec<String>,
    },
    #[error("artifact for contract \"{name}\" is not deployable: {reason}")]
    InvalidArtifact { name: String, reason: String },
    #[error("invalid constructor arguments for \"{name}\": {reason}")]
    ConstructorArgs { name: String, reason: String },
    #[error("network is configured with chain id {expected} but the RPC reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("failed to submit deployment transaction: {0}")]
    Submission(eyre::Report),
    #[error("deployment transaction {hash} was not confirmed: {reason}")]
    Confirmation { hash: TxHash, reason: eyre::Report },
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

impl DeployError {
    /// The single line shown to the operator when a run fails.
    pub fn report_line(&self) -> String {
        match self {
            Self::NoSigner => NO_SIGNER_MESSAGE.to_owned(),
            other => format!("Error during deployment: {other}"),
        }
    }
}

/// Process exit status for the outcome of a run.
pub fn exit_status<T>(result: &Result<T, DeployError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
