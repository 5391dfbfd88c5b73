//! Error types
//!
//! [`ChainError`] is what the chain collaborators return, [`AllowanceError`]
//! is what the allowance manager returns, and [`TransferError`] is the
//! taxonomy surfaced to callers next to the failing [`crate::types::Stage`].

use alloy::primitives::{B256, U256};
use thiserror::Error;

/// Errors from the chain read/write collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The wallet or user declined to sign/send
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The confirmation wait exceeded its deadline
    #[error("timed out waiting for confirmation")]
    Timeout,
    /// A contract read or call failed
    #[error("contract call failed: {0}")]
    Contract(String),
    /// Transport or node error
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// Classify a raw wallet/RPC error message
    ///
    /// User rejections are recognised by the phrases wallets and signers use;
    /// reverts surface as contract failures; anything else is an RPC error.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected by user")
            || lower.contains("action_rejected")
            || lower.contains("request rejected")
        {
            return ChainError::Rejected(message);
        }

        if lower.contains("execution reverted")
            || lower.contains("revert")
            || lower.contains("invalid opcode")
        {
            return ChainError::Contract(message);
        }

        ChainError::Rpc(message)
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ChainError::Rejected(_))
    }
}

/// Errors from [`crate::allowance::AllowanceManager::ensure_allowance`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllowanceError {
    #[error("failed to read allowance: {0}")]
    Read(ChainError),
    #[error("failed to submit approval: {0}")]
    Submit(ChainError),
    #[error("approval {tx_hash} not confirmed: {source}")]
    Confirm { tx_hash: B256, source: ChainError },
    #[error("approval {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
}

/// Failure taxonomy of an orchestration run
///
/// `Display` renders the stable, human-legible reason; [`TransferError::kind`]
/// renders the stable machine tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("config unavailable: {0}")]
    ConfigUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("fee {fee} is not below amount {amount}; increase the amount")]
    FeeExceedsAmount { fee: U256, amount: U256 },
    #[error("insufficient balance: shortfall {shortfall}")]
    InsufficientBalance {
        shortfall: U256,
        balance: U256,
        required: U256,
    },
    #[error("allowance failure: {0}")]
    AllowanceFailure(String),
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("reverted")]
    TransactionReverted { tx_hash: B256 },
    #[error("timeout")]
    ConfirmationTimeout { tx_hash: B256 },
    #[error("cancelled")]
    Cancelled,
    #[error("chain error: {0}")]
    UnknownChainError(String),
}

impl TransferError {
    /// Stable machine-matchable tag
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::ConfigUnavailable(_) => "ConfigUnavailable",
            TransferError::InvalidInput(_) => "InvalidInput",
            TransferError::FeeExceedsAmount { .. } => "FeeExceedsAmount",
            TransferError::InsufficientBalance { .. } => "InsufficientBalance",
            TransferError::AllowanceFailure(_) => "AllowanceFailure",
            TransferError::TransactionRejected(_) => "TransactionRejected",
            TransferError::TransactionReverted { .. } => "TransactionReverted",
            TransferError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            TransferError::Cancelled => "Cancelled",
            TransferError::UnknownChainError(_) => "UnknownChainError",
        }
    }

    /// Map a submission error: rejections stay distinguishable
    pub fn from_submit(err: ChainError) -> Self {
        match err {
            ChainError::Rejected(reason) => TransferError::TransactionRejected(reason),
            other => TransferError::UnknownChainError(other.to_string()),
        }
    }

    /// Map a confirmation-wait error for a submitted transaction
    pub fn from_confirmation(tx_hash: B256, err: ChainError) -> Self {
        match err {
            ChainError::Timeout => TransferError::ConfirmationTimeout { tx_hash },
            other => TransferError::UnknownChainError(other.to_string()),
        }
    }
}

impl From<AllowanceError> for TransferError {
    fn from(err: AllowanceError) -> Self {
        TransferError::AllowanceFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rejection() {
        assert!(ChainError::classify("MetaMask Tx Signature: User denied transaction signature.")
            .is_rejection());
        assert!(ChainError::classify("ACTION_REJECTED").is_rejection());
    }

    #[test]
    fn test_classify_revert_and_rpc() {
        assert!(matches!(
            ChainError::classify("execution reverted: ERC20: insufficient allowance"),
            ChainError::Contract(_)
        ));
        assert!(matches!(
            ChainError::classify("connection refused"),
            ChainError::Rpc(_)
        ));
    }

    #[test]
    fn test_confirmation_reasons_are_stable() {
        let hash = B256::repeat_byte(7);
        assert_eq!(
            TransferError::TransactionReverted { tx_hash: hash }.to_string(),
            "reverted"
        );
        assert_eq!(
            TransferError::ConfirmationTimeout { tx_hash: hash }.to_string(),
            "timeout"
        );
    }

    #[test]
    fn test_insufficient_balance_names_shortfall() {
        let err = TransferError::InsufficientBalance {
            shortfall: U256::from(1u64),
            balance: U256::from(1_049_999u64),
            required: U256::from(1_050_000u64),
        };
        assert_eq!(err.to_string(), "insufficient balance: shortfall 1");
        assert_eq!(err.kind(), "InsufficientBalance");
    }

    #[test]
    fn test_from_submit_keeps_rejection() {
        let err = TransferError::from_submit(ChainError::Rejected("user denied".into()));
        assert_eq!(err.kind(), "TransactionRejected");

        let err = TransferError::from_submit(ChainError::Rpc("nonce too low".into()));
        assert_eq!(err.kind(), "UnknownChainError");
    }

    #[test]
    fn test_from_confirmation_timeout() {
        let hash = B256::repeat_byte(1);
        assert_eq!(
            TransferError::from_confirmation(hash, ChainError::Timeout),
            TransferError::ConfirmationTimeout { tx_hash: hash }
        );
    }

    #[test]
    fn test_allowance_error_maps_to_allowance_failure() {
        let err: TransferError =
            AllowanceError::Submit(ChainError::Rejected("user denied".into())).into();
        assert_eq!(err.kind(), "AllowanceFailure");
        assert!(err.to_string().contains("user denied"));
    }
}
