//! JSON-RPC chain adapter
//!
//! [`EvmChain`] implements [`ChainReader`] and [`ChainWriter`] over an HTTP
//! provider. Reads go through a plain provider; writes build a signing provider
//! with `with_recommended_fillers()` so nonce, gas and fees are populated.
//! Confirmation waits poll for the receipt until a deadline.

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, ChainWriter, Confirmation, ContractCall, TxHash};
use crate::error::ChainError;
use crate::evm::contracts::{ForwardRouter, TokenMessengerV2, ERC20};
use crate::types::{ConfiguredAddress, DestinationCaller, RouterConfig};

/// Default receipt poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

fn read_error(what: &str, e: impl std::fmt::Display) -> ChainError {
    ChainError::classify(format!("Failed to read {}: {}", what, e))
}

/// Signing EVM chain adapter
pub struct EvmChain {
    rpc_url: String,
    chain_id: u64,
    signer: PrivateKeySigner,
    provider: RootProvider<Http<Client>>,
    poll_interval: Duration,
    /// Token decimals, filled on first read
    decimals: RwLock<HashMap<Address, u8>>,
}

impl EvmChain {
    /// Create an adapter signing with `private_key`
    pub fn new(rpc_url: &str, chain_id: u64, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.parse().wrap_err("Invalid private key")?;
        let provider = ProviderBuilder::new().on_http(rpc_url.parse().wrap_err("Invalid RPC URL")?);

        info!(
            address = %signer.address(),
            chain_id = chain_id,
            "EVM chain adapter initialized"
        );

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            chain_id,
            signer,
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            decimals: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Check that the RPC serves the configured chain
    pub async fn verify_chain_id(&self) -> Result<()> {
        let remote = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| eyre!("Failed to get chain id: {}", e))?;
        if remote != self.chain_id {
            return Err(eyre!(
                "RPC serves chain {} but CHAIN_ID is {}",
                remote,
                self.chain_id
            ));
        }
        Ok(())
    }

    /// Token decimals, cached per token
    pub async fn read_decimals(&self, token: Address) -> Result<u8, ChainError> {
        if let Some(decimals) = self.decimals.read().await.get(&token) {
            return Ok(*decimals);
        }

        let decimals = ERC20::new(token, &self.provider)
            .decimals()
            .call()
            .await
            .map_err(|e| read_error("decimals", e))?
            ._0;
        self.decimals.write().await.insert(token, decimals);
        Ok(decimals)
    }

    /// Drop cached token metadata, e.g. after a token migration
    pub async fn invalidate_token_metadata(&self) {
        self.decimals.write().await.clear();
    }
}

#[async_trait]
impl ChainReader for EvmChain {
    async fn read_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let balance = ERC20::new(token, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| read_error("balance", e))?;
        Ok(balance._0)
    }

    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let allowance = ERC20::new(token, &self.provider)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| read_error("allowance", e))?;
        Ok(allowance._0)
    }

    async fn read_router_config(&self, router: Address) -> Result<RouterConfig, ChainError> {
        let contract = ForwardRouter::new(router, &self.provider);

        let (token, burn_contract, fee_collector, service_fee, destination_caller) = tokio::try_join!(
            async {
                contract
                    .token()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| read_error("router token", e))
            },
            async {
                contract
                    .tokenMessenger()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| read_error("router token messenger", e))
            },
            async {
                contract
                    .feeCollector()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| read_error("router fee collector", e))
            },
            async {
                contract
                    .serviceFee()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| read_error("router service fee", e))
            },
            async {
                contract
                    .destinationCaller()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| read_error("router destination caller", e))
            }
        )?;

        Ok(RouterConfig {
            token: ConfiguredAddress::from_raw(token),
            burn_contract: ConfiguredAddress::from_raw(burn_contract),
            fee_collector: ConfiguredAddress::from_raw(fee_collector),
            service_fee,
            destination_caller: DestinationCaller::from_raw(destination_caller),
        })
    }

    async fn read_live_min_fee(
        &self,
        burn_contract: Address,
        amount: U256,
    ) -> Result<U256, ChainError> {
        let min_fee = TokenMessengerV2::new(burn_contract, &self.provider)
            .getMinFeeAmount(amount)
            .call()
            .await
            .map_err(|e| read_error("minimum fee", e))?;
        Ok(min_fee._0)
    }
}

#[async_trait]
impl ChainWriter for EvmChain {
    fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, call: ContractCall) -> Result<TxHash, ChainError> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_http(
                self.rpc_url
                    .parse()
                    .map_err(|e| ChainError::Rpc(format!("Invalid RPC URL: {}", e)))?,
            );

        let tx = call
            .to_transaction_request(self.sender())
            .with_chain_id(self.chain_id);

        debug!(call = call.label(), to = %call.target(), "Sending transaction");
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::classify(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        info!(call = call.label(), tx_hash = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Ok(Confirmation {
                        tx_hash,
                        success: receipt.status(),
                        block_number: receipt.block_number,
                    });
                }
                Ok(None) => {}
                // Receipt polling is repeatable; keep going until the deadline.
                Err(e) => warn!(tx_hash = %tx_hash, error = %e, "Receipt query failed"),
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(ChainError::Timeout);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
