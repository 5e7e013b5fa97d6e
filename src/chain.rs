use std::time::Duration;

use alloy::{
    network::{EthereumWallet, ReceiptResponse},
    primitives::{Address, TxHash},
    providers::{PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::Context;

/// What the chain reports once a transaction is included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
    pub gas_used: u128,
    pub success: bool,
}

/// The network the deployment is sent to.
#[async_trait]
pub trait Chain {
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Signs and broadcasts `tx`, returning as soon as the node accepts it.
    async fn submit(&self, tx: TransactionRequest) -> eyre::Result<TxHash>;

    /// Waits for `hash` to be included.
    async fn confirm(&self, hash: TxHash) -> eyre::Result<Receipt>;
}

/// A JSON-RPC node reached over HTTP, signing with a local key.
pub struct RpcChain<P> {
    provider: P,
    confirmations: u64,
    timeout: Option<Duration>,
}

/// Builds an HTTP provider for `endpoint` that fills nonce, gas and chain id
/// and signs with `signer`.
pub fn connect(
    endpoint: &str,
    signer: PrivateKeySigner,
    confirmations: u64,
    timeout: Option<Duration>,
) -> eyre::Result<RpcChain<impl Provider<Http<Client>> + Send + Sync>> {
    let rpc_url = endpoint
        .parse()
        .wrap_err_with(|| format!("invalid RPC endpoint {endpoint}"))?;
    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_http(rpc_url);

    Ok(RpcChain {
        provider,
        confirmations: confirmations.max(1),
        timeout,
    })
}

#[async_trait]
impl<P> Chain for RpcChain<P>
where
    P: Provider<Http<Client>> + Send + Sync,
{
    async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn submit(&self, tx: TransactionRequest) -> eyre::Result<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, hash: TxHash) -> eyre::Result<Receipt> {
        let pending = PendingTransactionBuilder::new(self.provider.root(), hash)
            .with_required_confirmations(self.confirmations)
            .get_receipt();
        let receipt = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| {
                    eyre::eyre!(
                        "timed out after {} waiting for confirmation",
                        humantime::format_duration(timeout)
                    )
                })?,
            None => pending.await,
        }
        .wrap_err("failed waiting for receipt")?;

        Ok(Receipt {
            transaction_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        })
    }
}
