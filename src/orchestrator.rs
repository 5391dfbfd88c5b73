//! Transfer orchestration
//!
//! Drives one burn-and-forward transfer through its states:
//!
//! ```text
//! Init → ConfigRead → Validated → FeeQuoted → FeeReconciled → BalanceChecked
//!      → RecipientResolved → AllowanceEnsured → FeePaid → BurnSubmitted → Confirmed
//! ```
//!
//! Any state can end the run with a [`OrchestrationOutcome::Failure`] tagged by
//! [`Stage`]. Nothing is retried internally: a retry is a new call to
//! [`TransferOrchestrator::execute`], which re-reads configuration, the live
//! fee minimum, balance and allowance instead of resuming.
//!
//! Cancellation is checked before each step that starts new work, up to and
//! including the service-fee transfer. After that the burn always follows. A
//! transaction that has already been submitted is always awaited to its
//! terminal state (bounded by the confirmation timeout) before the run stops.

use alloy::primitives::{Address, U256};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::allowance::{AllowanceManager, AllowanceOutcome};
use crate::chain::{self, ChainReader, ChainWriter, ContractCall, TxHash};
use crate::error::TransferError;
use crate::fees::{reconcile_with_live_minimum, FeeCalculator};
use crate::history::HistoryLedger;
use crate::hook_data::{forward_hook_data, MemoOptions};
use crate::metrics;
use crate::types::{FeeQuote, RouterConfig, Stage, TransferRecord, TransferRequest, TransferState};

/// Finality threshold for fast transfers (attested at "confirmed")
pub const FAST_FINALITY_THRESHOLD: u32 = 1000;

/// Finality threshold for standard transfers (attested at "finalized")
pub const STANDARD_FINALITY_THRESHOLD: u32 = 2000;

/// Default bound on each confirmation wait
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Configuration and Outcome
// ============================================================================

/// Orchestrator settings supplied by the caller
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Router exposing the [`RouterConfig`] views
    pub router: Address,
    /// `minFinalityThreshold` passed to the burn call
    pub min_finality_threshold: u32,
    /// Bound on every confirmation wait
    pub confirmation_timeout: Duration,
    /// Memo bound and the experimental memo-in-hook extension
    pub memo: MemoOptions,
}

impl OrchestratorConfig {
    pub fn new(router: Address) -> Self {
        Self {
            router,
            min_finality_threshold: FAST_FINALITY_THRESHOLD,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            memo: MemoOptions::default(),
        }
    }
}

/// Result of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationOutcome {
    Success { tx_hash: TxHash },
    Failure { stage: Stage, error: TransferError },
}

impl OrchestrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OrchestrationOutcome::Success { .. })
    }

    /// Burn transaction hash on success
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            OrchestrationOutcome::Success { tx_hash } => Some(*tx_hash),
            OrchestrationOutcome::Failure { .. } => None,
        }
    }

    /// Failing stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { stage, .. } => Some(*stage),
        }
    }

    /// Stable, human-legible failure reason
    pub fn reason(&self) -> Option<String> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { error, .. } => Some(error.to_string()),
        }
    }

    /// Stable machine tag of the failure
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { error, .. } => Some(error.kind()),
        }
    }
}

// ============================================================================
// Cancellation and Progress
// ============================================================================

/// Caller side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Request cancellation; takes effect at the next step boundary
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Run side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Create a connected cancellation handle and signal
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Receives every state reached, in order
    pub progress: Option<mpsc::UnboundedSender<TransferState>>,
    /// Cancellation signal checked between steps
    pub cancel: Option<CancelSignal>,
}

/// A stage failure inside a run
struct Failed {
    stage: Stage,
    error: TransferError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, Failed>;
}

impl<T> AtStage<T> for Result<T, TransferError> {
    fn at(self, stage: Stage) -> Result<T, Failed> {
        self.map_err(|error| Failed { stage, error })
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Burn-and-forward transfer state machine
///
/// Runs share nothing but the history ledger, so concurrent `execute` calls
/// on one orchestrator are safe.
pub struct TransferOrchestrator {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    fees: FeeCalculator,
    allowances: AllowanceManager,
    history: Arc<HistoryLedger>,
    config: OrchestratorConfig,
}

impl TransferOrchestrator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        fees: FeeCalculator,
        history: Arc<HistoryLedger>,
        config: OrchestratorConfig,
    ) -> Self {
        let allowances =
            AllowanceManager::new(reader.clone(), writer.clone(), config.confirmation_timeout);
        Self {
            reader,
            writer,
            fees,
            allowances,
            history,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<HistoryLedger> {
        &self.history
    }

    /// Execute one independent transfer run
    pub async fn execute(&self, request: &TransferRequest) -> OrchestrationOutcome {
        self.execute_with(request, &RunOptions::default()).await
    }

    /// Execute with progress reporting and/or cancellation
    pub async fn execute_with(
        &self,
        request: &TransferRequest,
        options: &RunOptions,
    ) -> OrchestrationOutcome {
        let started = Instant::now();
        info!(
            amount = %request.amount,
            destination_domain = request.destination_domain,
            sender = %self.writer.sender(),
            "Starting transfer"
        );

        match self.run(request, options).await {
            Ok(tx_hash) => {
                info!(
                    tx_hash = %tx_hash,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transfer confirmed"
                );
                metrics::record_run("success");
                metrics::record_volume(request.amount);
                OrchestrationOutcome::Success { tx_hash }
            }
            Err(Failed { stage, error }) => {
                warn!(
                    stage = %stage,
                    kind = error.kind(),
                    reason = %error,
                    "Transfer failed"
                );
                metrics::record_run("failure");
                metrics::record_stage_failure(stage, error.kind());
                OrchestrationOutcome::Failure { stage, error }
            }
        }
    }

    async fn run(&self, request: &TransferRequest, options: &RunOptions) -> Result<TxHash, Failed> {
        let sender = self.writer.sender();
        report(options, TransferState::Init);

        // ConfigRead
        checkpoint(options, Stage::ConfigRead)?;
        let router_config = self
            .reader
            .read_router_config(self.config.router)
            .await
            .map_err(|e| TransferError::ConfigUnavailable(e.to_string()))
            .at(Stage::ConfigRead)?;
        let token = router_config.token.require("token").at(Stage::ConfigRead)?;
        let burn_contract = router_config
            .burn_contract
            .require("burn contract")
            .at(Stage::ConfigRead)?;
        let fee_collector = if router_config.service_fee.is_zero() {
            None
        } else {
            Some(
                router_config
                    .fee_collector
                    .require("fee collector")
                    .at(Stage::ConfigRead)?,
            )
        };
        debug!(
            token = %token,
            burn_contract = %burn_contract,
            service_fee = %router_config.service_fee,
            "Router configuration read"
        );
        report(options, TransferState::ConfigRead);

        // Validated
        let recipient = self.validate(request).at(Stage::Validation)?;
        report(options, TransferState::Validated);

        // FeeQuoted
        let quote = self
            .fees
            .compute_max_fee(request.amount, request.destination_domain)
            .at(Stage::FeeQuote)?;
        debug!(max_fee = %quote.max_fee, "Fee quoted");
        report(options, TransferState::FeeQuoted);

        // FeeReconciled
        checkpoint(options, Stage::FeeReconciliation)?;
        let quote = self
            .reconcile(&quote, burn_contract)
            .await
            .at(Stage::FeeReconciliation)?;
        report(options, TransferState::FeeReconciled);

        // BalanceChecked
        checkpoint(options, Stage::BalanceCheck)?;
        self.check_balance(token, sender, request.amount, &router_config)
            .await
            .at(Stage::BalanceCheck)?;
        report(options, TransferState::BalanceChecked);

        // RecipientResolved
        let recipient = recipient.unwrap_or(sender);
        debug!(recipient = %recipient, "Recipient resolved");
        report(options, TransferState::RecipientResolved);

        // AllowanceEnsured
        checkpoint(options, Stage::Allowance)?;
        let allowance = self
            .allowances
            .ensure_allowance(token, sender, burn_contract, request.amount)
            .await
            .map_err(TransferError::from)
            .at(Stage::Allowance)?;
        if let AllowanceOutcome::Approved { tx_hash } = allowance {
            debug!(tx_hash = %tx_hash, "Allowance raised");
        }
        report(options, TransferState::AllowanceEnsured);

        // FeePaid. Last cancellation point: once the fee is paid the burn
        // must follow, or a retry would collect the fee twice.
        checkpoint(options, Stage::FeeTransfer)?;
        if let Some(fee_collector) = fee_collector {
            self.pay_service_fee(token, fee_collector, router_config.service_fee)
                .await
                .at(Stage::FeeTransfer)?;
        }
        report(options, TransferState::FeePaid);

        // BurnSubmitted
        let tx_hash = self
            .submit_burn(request, &quote, token, burn_contract, recipient, &router_config)
            .await
            .at(Stage::BurnTransaction)?;
        report(options, TransferState::BurnSubmitted);

        // Confirmed
        self.await_success(tx_hash, "burn")
            .await
            .at(Stage::Confirmation)?;
        report(options, TransferState::Confirmed);

        self.record(request, sender, recipient, tx_hash).await;
        Ok(tx_hash)
    }

    /// Input validation; returns the parsed recipient if one was supplied
    fn validate(&self, request: &TransferRequest) -> Result<Option<Address>, TransferError> {
        if request.amount.is_zero() {
            return Err(TransferError::InvalidInput(
                "amount must be greater than zero".to_string(),
            ));
        }

        let recipient = match request.recipient.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let address = Address::from_str(raw).map_err(|e| {
                    TransferError::InvalidInput(format!("recipient '{}' is not an address: {}", raw, e))
                })?;
                if address.is_zero() {
                    return Err(TransferError::InvalidInput(
                        "recipient must not be the zero address".to_string(),
                    ));
                }
                Some(address)
            }
        };

        if let Some(memo) = &request.memo {
            if memo.len() > self.config.memo.max_bytes {
                return Err(TransferError::InvalidInput(format!(
                    "memo is {} bytes, limit is {}",
                    memo.len(),
                    self.config.memo.max_bytes
                )));
            }
        }

        Ok(recipient)
    }

    async fn reconcile(
        &self,
        quote: &FeeQuote,
        burn_contract: Address,
    ) -> Result<FeeQuote, TransferError> {
        let live_min = self
            .reader
            .read_live_min_fee(burn_contract, quote.amount)
            .await
            .map_err(|e| TransferError::UnknownChainError(e.to_string()))?;

        let reconciled = reconcile_with_live_minimum(quote, live_min)?;
        if reconciled.max_fee != quote.max_fee {
            info!(
                quoted = %quote.max_fee,
                live_min = %live_min,
                max_fee = %reconciled.max_fee,
                "Raised max fee to buffered live minimum"
            );
        }
        Ok(reconciled)
    }

    async fn check_balance(
        &self,
        token: Address,
        owner: Address,
        amount: U256,
        router_config: &RouterConfig,
    ) -> Result<(), TransferError> {
        let required = amount
            .checked_add(router_config.service_fee)
            .ok_or_else(|| TransferError::InvalidInput("amount plus service fee overflows".into()))?;

        let balance = self
            .reader
            .read_balance(token, owner)
            .await
            .map_err(|e| TransferError::UnknownChainError(e.to_string()))?;

        if balance < required {
            return Err(TransferError::InsufficientBalance {
                shortfall: required - balance,
                balance,
                required,
            });
        }

        debug!(balance = %balance, required = %required, "Balance sufficient");
        Ok(())
    }

    async fn pay_service_fee(
        &self,
        token: Address,
        fee_collector: Address,
        service_fee: U256,
    ) -> Result<(), TransferError> {
        let tx_hash = self
            .writer
            .submit(ContractCall::Transfer {
                token,
                to: fee_collector,
                amount: service_fee,
            })
            .await
            .map_err(TransferError::from_submit)?;
        info!(tx_hash = %tx_hash, fee = %service_fee, "Service fee transfer submitted");

        self.await_success(tx_hash, "fee_transfer").await
    }

    async fn submit_burn(
        &self,
        request: &TransferRequest,
        quote: &FeeQuote,
        token: Address,
        burn_contract: Address,
        recipient: Address,
        router_config: &RouterConfig,
    ) -> Result<TxHash, TransferError> {
        let hook_data = forward_hook_data(request.memo.as_ref().map(|m| &m[..]), &self.config.memo);

        let call = ContractCall::DepositForBurnWithHook {
            burn_contract,
            amount: request.amount,
            destination_domain: request.destination_domain,
            mint_recipient: recipient.into_word(),
            burn_token: token,
            destination_caller: router_config.destination_caller.as_bytes32(),
            max_fee: quote.max_fee,
            min_finality_threshold: self.config.min_finality_threshold,
            hook_data,
        };

        let tx_hash = self
            .writer
            .submit(call)
            .await
            .map_err(TransferError::from_submit)?;
        info!(
            tx_hash = %tx_hash,
            amount = %request.amount,
            max_fee = %quote.max_fee,
            destination_domain = request.destination_domain,
            "Burn submitted"
        );
        Ok(tx_hash)
    }

    /// Wait for a submitted transaction and require on-chain success
    async fn await_success(&self, tx_hash: TxHash, label: &str) -> Result<(), TransferError> {
        let started = Instant::now();
        let result = chain::confirm(self.writer.as_ref(), tx_hash, self.config.confirmation_timeout).await;
        metrics::record_confirmation_wait(label, started.elapsed().as_secs_f64());

        let confirmation = result.map_err(|e| TransferError::from_confirmation(tx_hash, e))?;
        if !confirmation.success {
            return Err(TransferError::TransactionReverted { tx_hash });
        }

        debug!(tx_hash = %tx_hash, block = ?confirmation.block_number, "Transaction confirmed");
        Ok(())
    }

    /// Append the history record; the burn is final, so failure here is only logged
    async fn record(&self, request: &TransferRequest, from: Address, to: Address, tx_hash: TxHash) {
        let record = TransferRecord {
            timestamp: Utc::now(),
            from,
            to,
            tx_hash,
            amount: request.amount,
            destination_domain: request.destination_domain,
            memo: request.memo.clone(),
        };

        if let Err(e) = self.history.append(record).await {
            error!(tx_hash = %tx_hash, error = %e, "Failed to append transfer to history");
        }
    }
}

fn report(options: &RunOptions, state: TransferState) {
    debug!(state = %state, "Transfer state");
    if let Some(progress) = &options.progress {
        // A dropped receiver only means nobody is listening.
        let _ = progress.send(state);
    }
}

fn checkpoint(options: &RunOptions, stage: Stage) -> Result<(), Failed> {
    match &options.cancel {
        Some(signal) if signal.is_cancelled() => {
            info!(stage = %stage, "Transfer cancelled");
            Err(Failed {
                stage,
                error: TransferError::Cancelled,
            })
        }
        _ => Ok(()),
    }
}
