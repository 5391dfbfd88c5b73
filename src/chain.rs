//! Chain collaborator interface
//!
//! The core reads and writes the source chain only through [`ChainReader`] and
//! [`ChainWriter`]. These are the only points where a run suspends.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::ChainError;
use crate::types::RouterConfig;

/// Transaction identifier on the source chain
pub type TxHash = B256;

/// A value-bearing contract call the core may submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// `token.approve(spender, amount)`
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    /// `token.transfer(to, amount)`
    Transfer {
        token: Address,
        to: Address,
        amount: U256,
    },
    /// `burnContract.depositForBurnWithHook(..)`
    DepositForBurnWithHook {
        burn_contract: Address,
        amount: U256,
        destination_domain: u32,
        mint_recipient: B256,
        burn_token: Address,
        destination_caller: B256,
        max_fee: U256,
        min_finality_threshold: u32,
        hook_data: Bytes,
    },
}

impl ContractCall {
    /// Contract the call is sent to
    pub fn target(&self) -> Address {
        match self {
            ContractCall::Approve { token, .. } => *token,
            ContractCall::Transfer { token, .. } => *token,
            ContractCall::DepositForBurnWithHook { burn_contract, .. } => *burn_contract,
        }
    }

    /// Short name for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ContractCall::Approve { .. } => "approve",
            ContractCall::Transfer { .. } => "transfer",
            ContractCall::DepositForBurnWithHook { .. } => "deposit_for_burn_with_hook",
        }
    }
}

/// Terminal state of an included transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    /// On-chain success flag; `false` means included but reverted
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Read side of the chain collaborator
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// ERC20 balance of `owner`
    async fn read_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    /// ERC20 allowance for the `(token, owner, spender)` triple
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Router configuration snapshot
    async fn read_router_config(&self, router: Address) -> Result<RouterConfig, ChainError>;

    /// Live minimum protocol fee for `amount`
    async fn read_live_min_fee(
        &self,
        burn_contract: Address,
        amount: U256,
    ) -> Result<U256, ChainError>;
}

/// Write side of the chain collaborator
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Account that signs submitted calls
    fn sender(&self) -> Address;

    /// Submit a call, returning once the network accepted it
    async fn submit(&self, call: ContractCall) -> Result<TxHash, ChainError>;

    /// Wait until the transaction is included, up to `timeout`
    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError>;
}

/// Wait for a confirmation with a hard deadline
///
/// The writer receives the timeout too; the outer deadline guarantees the
/// wait is bounded even if the writer ignores it.
pub async fn confirm(
    writer: &dyn ChainWriter,
    tx_hash: TxHash,
    timeout: Duration,
) -> Result<Confirmation, ChainError> {
    match tokio::time::timeout(timeout, writer.wait_for_confirmation(tx_hash, timeout)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(tx_hash = %tx_hash, timeout_secs = timeout.as_secs(), "Confirmation deadline elapsed");
            Err(ChainError::Timeout)
        }
    }
}
