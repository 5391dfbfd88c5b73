//! Common types for burn-and-forward transfers
//!
//! Requests, on-chain configuration snapshots, fee quotes, history records and
//! the stage/state tags reported by the orchestrator.

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransferError;

// ============================================================================
// Transfer Request
// ============================================================================

/// Immutable input of one orchestration run
///
/// `recipient` is kept as the caller supplied it and is parsed during
/// validation, so a malformed address fails the run at the validation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Amount to burn, in the token's smallest unit
    pub amount: U256,
    /// Destination domain (CCTP domain id of the target chain)
    pub destination_domain: u32,
    /// Recipient on the destination chain (defaults to the sender)
    pub recipient: Option<String>,
    /// Optional memo, bounded by [`crate::hook_data::MemoOptions::max_bytes`]
    pub memo: Option<Bytes>,
}

impl TransferRequest {
    /// Create a request that mints to the sender's own address
    pub fn new(amount: U256, destination_domain: u32) -> Self {
        Self {
            amount,
            destination_domain,
            recipient: None,
            memo: None,
        }
    }

    /// Set an explicit recipient
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Attach a memo
    pub fn with_memo(mut self, memo: impl Into<Bytes>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

/// An address read from the router that may not have been set
///
/// The router reports unset addresses as the zero address; that sentinel is
/// mapped to `NotConfigured` at the read boundary and never flows further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfiguredAddress {
    Set(Address),
    NotConfigured,
}

impl ConfiguredAddress {
    /// Map a raw on-chain address, treating the zero address as unset
    pub fn from_raw(address: Address) -> Self {
        if address.is_zero() {
            ConfiguredAddress::NotConfigured
        } else {
            ConfiguredAddress::Set(address)
        }
    }

    /// Get the address if configured
    pub fn get(&self) -> Option<Address> {
        match self {
            ConfiguredAddress::Set(address) => Some(*address),
            ConfiguredAddress::NotConfigured => None,
        }
    }

    /// Require the address, naming the missing field otherwise
    pub fn require(&self, field: &str) -> Result<Address, TransferError> {
        self.get()
            .ok_or_else(|| TransferError::ConfigUnavailable(format!("{} is not configured", field)))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, ConfiguredAddress::Set(_))
    }
}

impl fmt::Display for ConfiguredAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfiguredAddress::Set(address) => write!(f, "{}", address),
            ConfiguredAddress::NotConfigured => write!(f, "not-configured"),
        }
    }
}

/// Who may call `receiveMessage` on the destination chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationCaller {
    /// Anyone may relay the message
    Unrestricted,
    /// Only this caller may relay the message
    Only(B256),
}

impl DestinationCaller {
    /// Map the raw bytes32 value, treating zero as unrestricted
    pub fn from_raw(caller: B256) -> Self {
        if caller.is_zero() {
            DestinationCaller::Unrestricted
        } else {
            DestinationCaller::Only(caller)
        }
    }

    /// Encode for the burn call (zero means unrestricted)
    pub fn as_bytes32(&self) -> B256 {
        match self {
            DestinationCaller::Unrestricted => B256::ZERO,
            DestinationCaller::Only(caller) => *caller,
        }
    }
}

/// Snapshot of the router's authoritative parameters
///
/// Read fresh at the start of every run and never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Token being burned
    pub token: ConfiguredAddress,
    /// Burn-and-forward contract (TokenMessengerV2)
    pub burn_contract: ConfiguredAddress,
    /// Receiver of the flat service fee
    pub fee_collector: ConfiguredAddress,
    /// Flat service fee in token smallest units
    pub service_fee: U256,
    /// Destination-caller restriction passed through to the burn call
    pub destination_caller: DestinationCaller,
}

// ============================================================================
// Fee Quote
// ============================================================================

/// Derived fee ceiling for one transfer; invariant `max_fee < amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub amount: U256,
    pub max_fee: U256,
}

impl FeeQuote {
    /// Amount expected to arrive at the destination if the full fee is charged
    pub fn min_received(&self) -> U256 {
        self.amount.saturating_sub(self.max_fee)
    }
}

// ============================================================================
// History Record
// ============================================================================

/// A confirmed transfer as stored in the history ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub timestamp: DateTime<Utc>,
    pub from: Address,
    pub to: Address,
    pub tx_hash: B256,
    pub amount: U256,
    pub destination_domain: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<Bytes>,
}

// ============================================================================
// Stages and States
// ============================================================================

/// Stage at which a run failed
///
/// The string forms are stable and intended for both display and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ConfigRead,
    Validation,
    FeeQuote,
    FeeReconciliation,
    BalanceCheck,
    Allowance,
    FeeTransfer,
    BurnTransaction,
    Confirmation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ConfigRead => "config-read",
            Stage::Validation => "validation",
            Stage::FeeQuote => "fee-quote",
            Stage::FeeReconciliation => "fee-reconciliation",
            Stage::BalanceCheck => "balance-check",
            Stage::Allowance => "allowance",
            Stage::FeeTransfer => "fee-transfer",
            Stage::BurnTransaction => "burn-transaction",
            Stage::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress states of a run, reached strictly in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransferState {
    Init,
    ConfigRead,
    Validated,
    FeeQuoted,
    FeeReconciled,
    BalanceChecked,
    RecipientResolved,
    AllowanceEnsured,
    FeePaid,
    BurnSubmitted,
    Confirmed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Init => "init",
            TransferState::ConfigRead => "config_read",
            TransferState::Validated => "validated",
            TransferState::FeeQuoted => "fee_quoted",
            TransferState::FeeReconciled => "fee_reconciled",
            TransferState::BalanceChecked => "balance_checked",
            TransferState::RecipientResolved => "recipient_resolved",
            TransferState::AllowanceEnsured => "allowance_ensured",
            TransferState::FeePaid => "fee_paid",
            TransferState::BurnSubmitted => "burn_submitted",
            TransferState::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_configured_address_zero_is_not_configured() {
        assert_eq!(
            ConfiguredAddress::from_raw(Address::ZERO),
            ConfiguredAddress::NotConfigured
        );

        let addr = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(ConfiguredAddress::from_raw(addr), ConfiguredAddress::Set(addr));
        assert_eq!(ConfiguredAddress::from_raw(addr).get(), Some(addr));
    }

    #[test]
    fn test_configured_address_require_names_field() {
        let err = ConfiguredAddress::NotConfigured
            .require("fee collector")
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigUnavailable");
        assert!(err.to_string().contains("fee collector is not configured"));
    }

    #[test]
    fn test_destination_caller_roundtrip() {
        assert_eq!(
            DestinationCaller::from_raw(B256::ZERO),
            DestinationCaller::Unrestricted
        );
        assert_eq!(DestinationCaller::Unrestricted.as_bytes32(), B256::ZERO);

        let caller = B256::repeat_byte(0xab);
        assert_eq!(
            DestinationCaller::from_raw(caller),
            DestinationCaller::Only(caller)
        );
        assert_eq!(DestinationCaller::Only(caller).as_bytes32(), caller);
    }

    #[test]
    fn test_stage_as_str() {
        assert_eq!(Stage::ConfigRead.as_str(), "config-read");
        assert_eq!(Stage::FeeReconciliation.as_str(), "fee-reconciliation");
        assert_eq!(Stage::BurnTransaction.as_str(), "burn-transaction");
        assert_eq!(format!("{}", Stage::Confirmation), "confirmation");
    }

    #[test]
    fn test_stage_serializes_as_tag() {
        let json = serde_json::to_string(&Stage::BalanceCheck).unwrap();
        assert_eq!(json, "\"balance-check\"");
    }

    #[test]
    fn test_transfer_state_order() {
        assert!(TransferState::Init < TransferState::ConfigRead);
        assert!(TransferState::FeePaid < TransferState::BurnSubmitted);
        assert!(TransferState::BurnSubmitted < TransferState::Confirmed);
    }

    #[test]
    fn test_fee_quote_min_received() {
        let quote = FeeQuote {
            amount: U256::from(1_000_000u64),
            max_fee: U256::from(200_000u64),
        };
        assert_eq!(quote.min_received(), U256::from(800_000u64));
    }

    #[test]
    fn test_transfer_record_json_roundtrip() {
        let record = TransferRecord {
            timestamp: Utc::now(),
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            tx_hash: B256::repeat_byte(3),
            amount: U256::from(5u64),
            destination_domain: 3,
            memo: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("memo"));
        let parsed: TransferRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
