//! ERC20 allowance management
//!
//! Approves exactly the required amount, and only when the current allowance
//! is insufficient. A submitted approval is awaited before returning.

use alloy::primitives::{Address, U256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::chain::{self, ChainReader, ChainWriter, ContractCall, TxHash};
use crate::error::AllowanceError;
use crate::metrics;

/// Result of an allowance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceOutcome {
    /// No transaction was submitted
    AlreadySufficient { current: U256 },
    /// An approval for exactly the required amount was confirmed
    Approved { tx_hash: TxHash },
}

/// Ensures a spender may move at least a required amount
pub struct AllowanceManager {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    confirmation_timeout: Duration,
}

impl AllowanceManager {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            writer,
            confirmation_timeout,
        }
    }

    /// Make sure `spender` may move `required` of `owner`'s `token`
    ///
    /// Failures are not retried here; the caller re-runs the whole transfer.
    pub async fn ensure_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> Result<AllowanceOutcome, AllowanceError> {
        let current = self
            .reader
            .read_allowance(token, owner, spender)
            .await
            .map_err(AllowanceError::Read)?;

        if current >= required {
            debug!(
                token = %token,
                spender = %spender,
                current = %current,
                required = %required,
                "Allowance already sufficient"
            );
            return Ok(AllowanceOutcome::AlreadySufficient { current });
        }

        info!(
            token = %token,
            spender = %spender,
            current = %current,
            required = %required,
            "Submitting approval"
        );

        let tx_hash = self
            .writer
            .submit(ContractCall::Approve {
                token,
                spender,
                amount: required,
            })
            .await
            .map_err(AllowanceError::Submit)?;
        metrics::record_approval_submitted();

        let started = Instant::now();
        let result = chain::confirm(self.writer.as_ref(), tx_hash, self.confirmation_timeout).await;
        metrics::record_confirmation_wait("approve", started.elapsed().as_secs_f64());

        let confirmation = result.map_err(|source| AllowanceError::Confirm { tx_hash, source })?;

        if !confirmation.success {
            warn!(tx_hash = %tx_hash, "Approval transaction reverted");
            return Err(AllowanceError::Reverted { tx_hash });
        }

        info!(tx_hash = %tx_hash, "Approval confirmed");
        Ok(AllowanceOutcome::Approved { tx_hash })
    }
}
