use std::io::Write;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, TxHash},
    rpc::types::eth::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use eyre::{eyre, Context};
use tokio::runtime::Builder;
use tracing::{debug, info};

use crate::{
    artifact::{ArtifactRegistry, HardhatArtifacts},
    chain::{self, Chain},
    config::Deploy,
    error::DeployError,
    formatting::{
        format_file_size, format_gas, highlight, CODE_SIZE_LIMIT_KIB, INIT_CODE_SIZE_LIMIT_KIB,
    },
    network::Networks,
    wallet::Identity,
};

impl Deploy {
    /// Deploys the configured contract on a single-threaded runtime.
    pub fn run(&self, color: bool) -> Result<Deployment, DeployError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .wrap_err("failed to start async runtime")?;
        runtime.block_on(self.deploy(color))
    }

    async fn deploy(&self, color: bool) -> Result<Deployment, DeployError> {
        let networks = Networks::load(self.network.networks_file.as_deref())?;
        let network = networks.get(&self.network.network)?;
        let endpoint = self.network.rpc_url.as_deref().unwrap_or(&network.url);
        let chain_id = self.network.chain_id.or(network.chain_id);
        info!(network = %self.network.network, %endpoint, ?chain_id, "using network");

        let signers = self.auth.sourced_wallets(&network.accounts)?;
        if let Some((source, wallet)) = signers.first() {
            info!(%source, address = %wallet.address(), "deployer key");
        }
        let signers: Vec<PrivateKeySigner> =
            signers.into_iter().map(|(_, wallet)| wallet).collect();
        let registry = HardhatArtifacts::new(&self.artifacts);
        let request = Request {
            contract: self.contract.clone(),
            args: self.args.clone(),
            chain_id,
        };
        let mut console = Console::new(std::io::stdout(), color);

        deploy(
            signers,
            &registry,
            |signer| chain::connect(endpoint, signer, self.confirmations, self.timeout),
            &request,
            &mut console,
        )
        .await
    }
}

/// What to deploy.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Artifact name, bare or fully qualified.
    pub contract: String,
    /// Constructor arguments; the deployer's address is used when empty and
    /// the constructor takes arguments.
    pub args: Vec<String>,
    /// Chain id the RPC endpoint must report, if known.
    pub chain_id: Option<u64>,
}

/// A confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub deployer: Address,
    pub address: Address,
    pub transaction_hash: TxHash,
}

/// Operator-facing output.
pub struct Console<W> {
    out: W,
    color: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) -> eyre::Result<()> {
        writeln!(self.out, "{args}").wrap_err("could not write to console")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Deploys `request.contract` with the first of `signers`.
///
/// `connect` is only called once a signer and a deployable artifact have
/// been found, so nothing reaches the network when either is missing. The
/// deployed address is written to `console` only after the creation
/// transaction has been confirmed.
pub async fn deploy<S, R, C, F, W>(
    signers: Vec<S>,
    registry: &R,
    connect: F,
    request: &Request,
    console: &mut Console<W>,
) -> Result<Deployment, DeployError>
where
    S: Identity,
    R: ArtifactRegistry + ?Sized,
    C: Chain,
    F: FnOnce(S) -> eyre::Result<C>,
    W: Write,
{
    let signer = signers.into_iter().next().ok_or(DeployError::NoSigner)?;
    let deployer = signer.address();
    let color = console.color;
    console.line(format_args!(
        "Deploying with account: {}",
        highlight(deployer, color)
    ))?;

    let artifact = registry.resolve(&request.contract)?;
    let args = if request.args.is_empty() && artifact.has_constructor_inputs() {
        vec![deployer.to_string()]
    } else {
        request.args.clone()
    };
    let code = artifact.creation_code(&args)?;
    info!(
        contract = %artifact.fully_qualified_name(),
        size = %format_file_size(code.len(), CODE_SIZE_LIMIT_KIB, INIT_CODE_SIZE_LIMIT_KIB, false),
        "prepared init code"
    );

    let chain = connect(signer)?;
    if let Some(expected) = request.chain_id {
        let actual = chain.chain_id().await.map_err(DeployError::Submission)?;
        if actual != expected {
            return Err(DeployError::ChainIdMismatch { expected, actual });
        }
        debug!(chain_id = actual, "chain id matches");
    }

    console.line(format_args!("Deploying contract..."))?;
    let tx = TransactionRequest::default()
        .with_from(deployer)
        .into_create()
        .with_input(code);
    let hash = chain.submit(tx).await.map_err(DeployError::Submission)?;
    info!(%hash, "deployment transaction submitted");

    let receipt = chain
        .confirm(hash)
        .await
        .map_err(|reason| DeployError::Confirmation { hash, reason })?;
    if !receipt.success {
        return Err(DeployError::Confirmation {
            hash,
            reason: eyre!("transaction reverted in block {:?}", receipt.block_number),
        });
    }
    let address = receipt.contract_address.ok_or_else(|| DeployError::Confirmation {
        hash,
        reason: eyre!("receipt carries no contract address"),
    })?;
    info!(
        block = ?receipt.block_number,
        gas = %format_gas(receipt.gas_used, false),
        "deployment confirmed"
    );

    console.line(format_args!(
        "Contract deployed to: {}",
        highlight(address, color)
    ))?;

    Ok(Deployment {
        deployer,
        address,
        transaction_hash: receipt.transaction_hash,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use alloy::{
        primitives::{address, Address, TxHash, U256},
        rpc::types::eth::TransactionRequest,
    };
    use async_trait::async_trait;
    use eyre::eyre;
    use serde_json::json;

    use super::{deploy, Console, Deployment, Request};
    use crate::{
        artifact::{Artifact, ArtifactRegistry},
        chain::{Chain, Receipt},
        error::{exit_status, DeployError},
        wallet::Identity,
    };

    const SIGNER: Address = address!("abc0000000000000000000000000000000000001");
    const DEPLOYED: Address = address!("def0000000000000000000000000000000000002");

    struct MockSigner(Address);

    impl Identity for MockSigner {
        fn address(&self) -> Address {
            self.0
        }
    }

    #[derive(Default)]
    struct MockRegistry(HashMap<String, Artifact>);

    impl MockRegistry {
        fn with_token() -> Self {
            let artifact = Artifact {
                contract_name: "MyToken".into(),
                source_name: "contracts/MyToken.sol".into(),
                abi: serde_json::from_value(json!([{
                    "type": "constructor",
                    "stateMutability": "nonpayable",
                    "inputs": [{ "name": "initialOwner", "type": "address" }],
                }]))
                .unwrap(),
                bytecode: "0x6080".into(),
            };
            Self(HashMap::from([("MyToken".to_owned(), artifact)]))
        }
    }

    impl ArtifactRegistry for MockRegistry {
        fn resolve(&self, name: &str) -> Result<Artifact, DeployError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| DeployError::ArtifactNotFound { name: name.into() })
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Confirmed,
        Reverted,
        Rejected,
        Timeout,
        NoAddress,
    }

    #[derive(Clone)]
    struct MockChain {
        chain_id: u64,
        outcome: Outcome,
        submissions: Arc<AtomicUsize>,
        inputs: Arc<std::sync::Mutex<Vec<TransactionRequest>>>,
    }

    impl MockChain {
        fn new(outcome: Outcome) -> Self {
            Self {
                chain_id: 31337,
                outcome,
                submissions: Arc::default(),
                inputs: Arc::default(),
            }
        }

        fn submissions(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Chain for MockChain {
        async fn chain_id(&self) -> eyre::Result<u64> {
            Ok(self.chain_id)
        }

        async fn submit(&self, tx: TransactionRequest) -> eyre::Result<TxHash> {
            if let Outcome::Rejected = self.outcome {
                return Err(eyre!("insufficient funds for gas * price + value"));
            }
            let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
            self.inputs.lock().unwrap().push(tx);
            Ok(TxHash::from(U256::from(n)))
        }

        async fn confirm(&self, hash: TxHash) -> eyre::Result<Receipt> {
            let n = U256::from_be_bytes(hash.0).to::<u64>();
            let address = match n {
                1 => DEPLOYED,
                n => Address::with_last_byte(n as u8),
            };
            match self.outcome {
                Outcome::Timeout => Err(eyre!("timed out waiting for receipt")),
                outcome => Ok(Receipt {
                    transaction_hash: hash,
                    contract_address: match outcome {
                        Outcome::NoAddress => None,
                        _ => Some(address),
                    },
                    block_number: Some(1),
                    gas_used: 500_000,
                    success: !matches!(outcome, Outcome::Reverted),
                }),
            }
        }
    }

    async fn run(
        signers: Vec<MockSigner>,
        registry: &MockRegistry,
        chain: &MockChain,
        request: &Request,
    ) -> (Result<Deployment, DeployError>, Vec<String>) {
        let mut console = Console::new(Vec::new(), false);
        let result = deploy(signers, registry, |_| Ok(chain.clone()), request, &mut console).await;
        let output = String::from_utf8(console.into_inner()).unwrap();
        (result, output.lines().map(str::to_owned).collect())
    }

    fn token() -> Request {
        Request {
            contract: "MyToken".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn deploys_and_reports_address() {
        let chain = MockChain::new(Outcome::Confirmed);
        let (result, output) = run(
            vec![MockSigner(SIGNER)],
            &MockRegistry::with_token(),
            &chain,
            &token(),
        )
        .await;

        assert_eq!(exit_status(&result), 0);
        let deployment = result.unwrap();
        assert_eq!(deployment.address, DEPLOYED);
        assert_eq!(deployment.deployer, SIGNER);
        assert_eq!(
            output,
            vec![
                format!("Deploying with account: {SIGNER}"),
                "Deploying contract...".to_owned(),
                format!("Contract deployed to: {DEPLOYED}"),
            ]
        );
    }

    #[tokio::test]
    async fn passes_deployer_as_constructor_argument() {
        let chain = MockChain::new(Outcome::Confirmed);
        run(
            vec![MockSigner(SIGNER)],
            &MockRegistry::with_token(),
            &chain,
            &token(),
        )
        .await
        .0
        .unwrap();

        let inputs = chain.inputs.lock().unwrap();
        let tx = &inputs[0];
        assert_eq!(tx.from, Some(SIGNER));
        let input = tx.input.input().unwrap();
        assert_eq!(&input[..2], &[0x60, 0x80]);
        assert_eq!(&input[input.len() - 20..], SIGNER.as_slice());
    }

    #[tokio::test]
    async fn fails_fast_without_signer() {
        let chain = MockChain::new(Outcome::Confirmed);
        let mut console = Console::new(Vec::new(), false);
        let mut connected = false;
        let result = deploy(
            Vec::<MockSigner>::new(),
            &MockRegistry::with_token(),
            |_| {
                connected = true;
                Ok(chain.clone())
            },
            &token(),
            &mut console,
        )
        .await;

        assert!(matches!(result, Err(DeployError::NoSigner)));
        assert_eq!(exit_status(&result), 1);
        assert!(!connected);
        assert_eq!(chain.submissions(), 0);
        assert!(console.into_inner().is_empty());
    }

    #[tokio::test]
    async fn uses_first_signer() {
        let other = address!("0000000000000000000000000000000000000009");
        let chain = MockChain::new(Outcome::Confirmed);
        let (result, _) = run(
            vec![MockSigner(SIGNER), MockSigner(other)],
            &MockRegistry::with_token(),
            &chain,
            &token(),
        )
        .await;
        assert_eq!(result.unwrap().deployer, SIGNER);
    }

    #[tokio::test]
    async fn unknown_artifact_is_not_submitted() {
        let chain = MockChain::new(Outcome::Confirmed);
        let request = Request {
            contract: "Missing".into(),
            ..Default::default()
        };
        let (result, output) = run(
            vec![MockSigner(SIGNER)],
            &MockRegistry::with_token(),
            &chain,
            &request,
        )
        .await;

        assert!(matches!(result, Err(DeployError::ArtifactNotFound { .. })));
        assert_eq!(chain.submissions(), 0);
        assert_eq!(output.len(), 1);
    }

    #[tokio::test]
    async fn rejected_submission_fails() {
        let chain = MockChain::new(Outcome::Rejected);
        let (result, output) = run(
            vec![MockSigner(SIGNER)],
            &MockRegistry::with_token(),
            &chain,
            &token(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, DeployError::Submission(_)));
        assert!(err.to_string().contains("insufficient funds"));
        assert!(!output.iter().any(|l| l.starts_with("Contract deployed to")));
    }

    #[tokio::test]
    async fn failed_confirmation_reports_no_address() {
        for outcome in [Outcome::Reverted, Outcome::Timeout, Outcome::NoAddress] {
            let chain = MockChain::new(outcome);
            let (result, output) = run(
                vec![MockSigner(SIGNER)],
                &MockRegistry::with_token(),
                &chain,
                &token(),
            )
            .await;

            assert!(matches!(result, Err(DeployError::Confirmation { .. })));
            assert_eq!(exit_status(&result), 1);
            assert_eq!(chain.submissions(), 1);
            assert!(!output.iter().any(|l| l.starts_with("Contract deployed to")));
            if let Outcome::NoAddress = outcome {
                let err = result.as_ref().unwrap_err().to_string();
                assert!(err.contains("receipt carries no contract address"), "{err}");
            }
        }
    }

    #[tokio::test]
    async fn checks_chain_id_before_submitting() {
        let chain = MockChain::new(Outcome::Confirmed);
        let request = Request {
            chain_id: Some(421614),
            ..token()
        };
        let (result, _) = run(
            vec![MockSigner(SIGNER)],
            &MockRegistry::with_token(),
            &chain,
            &request,
        )
        .await;

        assert!(matches!(
            result,
            Err(DeployError::ChainIdMismatch {
                expected: 421614,
                actual: 31337
            })
        ));
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn repeated_runs_deploy_twice() {
        let chain = MockChain::new(Outcome::Confirmed);
        let registry = MockRegistry::with_token();
        let (first, _) = run(vec![MockSigner(SIGNER)], &registry, &chain, &token()).await;
        let (second, _) = run(vec![MockSigner(SIGNER)], &registry, &chain, &token()).await;

        assert_eq!(chain.submissions(), 2);
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.transaction_hash, second.transaction_hash);
        assert_ne!(first.address, second.address);
    }
}
