//! Burn-Forwarder: Fee Computation and Transfer Orchestration
//!
//! This crate drives a single cross-chain transfer on the source chain: it burns
//! the token through the burn-and-forward contract and leaves the mint on the
//! destination chain to the attestation/forwarding service.
//!
//! - **Fees** - Per-destination fee ceiling and reconciliation against the live protocol minimum
//! - **Allowance** - Idempotent ERC20 approval management
//! - **Orchestrator** - The ordered read/validate/approve/pay/burn/confirm state machine
//! - **History** - Append-only record of confirmed transfers
//! - **Chain** - The narrow read/write interface the core consumes
//! - **EVM Module** - alloy-backed implementation of that interface
//!
//! ## Feature Flags
//!
//! - `evm` - JSON-RPC chain adapter and the `burn-forwarder` binary (default)
//! - `testing` - In-memory `MockChain` for downstream tests

// Core modules (always available)
pub mod allowance;
pub mod chain;
pub mod config;
pub mod error;
pub mod fees;
pub mod history;
pub mod hook_data;
pub mod metrics;
pub mod orchestrator;
pub mod redact;
pub mod types;
pub mod units;

// Contract bindings are always compiled; the RPC client is feature-gated inside.
pub mod evm;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use allowance::{AllowanceManager, AllowanceOutcome};
pub use chain::{ChainReader, ChainWriter, Confirmation, ContractCall, TxHash};
pub use error::{AllowanceError, ChainError, TransferError};
pub use fees::{FeeCalculator, FeeFloors, FeeParams};
pub use history::{HistoryLedger, JsonFileStore, KeyValueStore, MemoryStore};
pub use hook_data::{forward_hook_data, MemoOptions};
pub use orchestrator::{
    cancel_pair, CancelHandle, CancelSignal, OrchestrationOutcome, OrchestratorConfig,
    RunOptions, TransferOrchestrator,
};
pub use types::{
    ConfiguredAddress, DestinationCaller, FeeQuote, RouterConfig, Stage, TransferRecord,
    TransferRequest, TransferState,
};
