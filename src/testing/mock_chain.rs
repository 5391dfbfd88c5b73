//! Scriptable in-memory chain
//!
//! Holds ERC20 balances and allowances, a router configuration and a live
//! minimum fee. Submitted calls take effect when they confirm successfully, or
//! later through [`MockChain::land_pending`] to simulate a transaction that
//! lands after the caller stopped waiting. Every read, submission and
//! confirmation is appended to an event log for ordering assertions.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::chain::{ChainReader, ChainWriter, Confirmation, ContractCall, TxHash};
use crate::error::ChainError;
use crate::orchestrator::CancelHandle;
use crate::types::{ConfiguredAddress, DestinationCaller, RouterConfig};

/// Default flat service fee of the mock router
pub const MOCK_SERVICE_FEE: u64 = 50_000;

/// Kind of submitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Approve,
    Transfer,
    Burn,
}

impl CallKind {
    fn of(call: &ContractCall) -> Self {
        match call {
            ContractCall::Approve { .. } => CallKind::Approve,
            ContractCall::Transfer { .. } => CallKind::Transfer,
            ContractCall::DepositForBurnWithHook { .. } => CallKind::Burn,
        }
    }
}

/// Scripted behaviour for a call kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Confirms successfully and applies its effect
    Succeed,
    /// Included but reverted; no effect
    Revert,
    /// Stays pending; the writer reports a timeout
    Timeout,
    /// Stays pending; the writer never answers
    Hang,
    /// The wallet declines to send
    RejectSubmission,
    /// The node refuses the transaction
    FailSubmission(String),
}

/// Observable chain interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    ReadRouterConfig,
    ReadLiveMinFee,
    ReadBalance,
    ReadAllowance,
    Submitted(CallKind, TxHash),
    Confirmed(CallKind, TxHash, bool),
}

struct MockState {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    router_config: RouterConfig,
    live_min_fee: U256,
    read_failure: Option<ChainError>,
    scripts: HashMap<CallKind, Scripted>,
    cancel_on_submit: HashMap<CallKind, CancelHandle>,
    submitted: HashMap<TxHash, ContractCall>,
    pending: Vec<TxHash>,
    calls: Vec<ContractCall>,
    events: Vec<ChainEvent>,
    nonce: u64,
}

/// In-memory [`ChainReader`] + [`ChainWriter`]
pub struct MockChain {
    sender: Address,
    router: Address,
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// Create a mock with a fully configured router and empty balances
    pub fn new() -> Self {
        let router_config = RouterConfig {
            token: ConfiguredAddress::Set(Address::repeat_byte(0x70)),
            burn_contract: ConfiguredAddress::Set(Address::repeat_byte(0xb0)),
            fee_collector: ConfiguredAddress::Set(Address::repeat_byte(0xfc)),
            service_fee: U256::from(MOCK_SERVICE_FEE),
            destination_caller: DestinationCaller::Unrestricted,
        };

        Self {
            sender: Address::repeat_byte(0x5e),
            router: Address::repeat_byte(0x80),
            state: Mutex::new(MockState {
                balances: HashMap::new(),
                allowances: HashMap::new(),
                router_config,
                live_min_fee: U256::ZERO,
                read_failure: None,
                scripts: HashMap::new(),
                cancel_on_submit: HashMap::new(),
                submitted: HashMap::new(),
                pending: Vec::new(),
                calls: Vec::new(),
                events: Vec::new(),
                nonce: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Fixture addresses
    // =========================================================================

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn router(&self) -> Address {
        self.router
    }

    pub fn token(&self) -> Address {
        self.lock().router_config.token.get().unwrap_or_default()
    }

    pub fn burn_contract(&self) -> Address {
        self.lock().router_config.burn_contract.get().unwrap_or_default()
    }

    pub fn fee_collector(&self) -> Address {
        self.lock().router_config.fee_collector.get().unwrap_or_default()
    }

    // =========================================================================
    // State setup and inspection
    // =========================================================================

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.lock().balances.insert((token, owner), amount);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.lock()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((token, owner, spender), amount);
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.lock()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_router_config(&self, config: RouterConfig) {
        self.lock().router_config = config;
    }

    pub fn update_router_config(&self, update: impl FnOnce(&mut RouterConfig)) {
        update(&mut self.lock().router_config);
    }

    pub fn set_live_min_fee(&self, fee: U256) {
        self.lock().live_min_fee = fee;
    }

    /// Make every read fail with `err`
    pub fn fail_reads(&self, err: ChainError) {
        self.lock().read_failure = Some(err);
    }

    /// Script the behaviour of a call kind
    pub fn script(&self, kind: CallKind, scripted: Scripted) {
        self.lock().scripts.insert(kind, scripted);
    }

    /// Trigger `handle` when a call of `kind` is submitted
    pub fn cancel_on_submit(&self, kind: CallKind, handle: CancelHandle) {
        self.lock().cancel_on_submit.insert(kind, handle);
    }

    /// Apply the effects of every transaction still pending
    pub fn land_pending(&self) {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for tx_hash in pending {
            if let Some(call) = state.submitted.get(&tx_hash).cloned() {
                apply(&mut state, self.sender, &call);
            }
        }
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.lock().events.clone()
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.lock().calls.clone()
    }

    /// Number of submitted calls of `kind`
    pub fn submissions(&self, kind: CallKind) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, ChainEvent::Submitted(k, _) if *k == kind))
            .count()
    }

    /// Position of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&ChainEvent) -> bool) -> Option<usize> {
        self.lock().events.iter().position(predicate)
    }

    fn record_read(&self, event: ChainEvent) -> Result<MutexGuard<'_, MockState>, ChainError> {
        let mut state = self.lock();
        state.events.push(event);
        match &state.read_failure {
            Some(err) => Err(err.clone()),
            None => Ok(state),
        }
    }
}

fn apply(state: &mut MockState, sender: Address, call: &ContractCall) {
    match call {
        ContractCall::Approve {
            token,
            spender,
            amount,
        } => {
            state.allowances.insert((*token, sender, *spender), *amount);
        }
        ContractCall::Transfer { token, to, amount } => {
            let from = state.balances.entry((*token, sender)).or_default();
            *from = from.saturating_sub(*amount);
            let to = state.balances.entry((*token, *to)).or_default();
            *to = to.saturating_add(*amount);
        }
        ContractCall::DepositForBurnWithHook {
            burn_contract,
            amount,
            burn_token,
            ..
        } => {
            let balance = state.balances.entry((*burn_token, sender)).or_default();
            *balance = balance.saturating_sub(*amount);
            let allowance = state
                .allowances
                .entry((*burn_token, sender, *burn_contract))
                .or_default();
            *allowance = allowance.saturating_sub(*amount);
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn read_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let state = self.record_read(ChainEvent::ReadBalance)?;
        Ok(state
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let state = self.record_read(ChainEvent::ReadAllowance)?;
        Ok(state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn read_router_config(&self, router: Address) -> Result<RouterConfig, ChainError> {
        let state = self.record_read(ChainEvent::ReadRouterConfig)?;
        if router != self.router {
            return Err(ChainError::Contract(format!("no router at {}", router)));
        }
        Ok(state.router_config.clone())
    }

    async fn read_live_min_fee(
        &self,
        _burn_contract: Address,
        _amount: U256,
    ) -> Result<U256, ChainError> {
        let state = self.record_read(ChainEvent::ReadLiveMinFee)?;
        Ok(state.live_min_fee)
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, call: ContractCall) -> Result<TxHash, ChainError> {
        let mut state = self.lock();
        let kind = CallKind::of(&call);

        match state.scripts.get(&kind) {
            Some(Scripted::RejectSubmission) => {
                return Err(ChainError::Rejected("user denied transaction signature".into()))
            }
            Some(Scripted::FailSubmission(reason)) => return Err(ChainError::Rpc(reason.clone())),
            _ => {}
        }

        state.nonce += 1;
        let tx_hash = B256::left_padding_from(&state.nonce.to_be_bytes());
        state.submitted.insert(tx_hash, call.clone());
        state.calls.push(call);
        state.events.push(ChainEvent::Submitted(kind, tx_hash));

        if let Some(handle) = state.cancel_on_submit.get(&kind) {
            handle.cancel();
        }

        Ok(tx_hash)
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        _timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let scripted = {
            let mut state = self.lock();
            let call = state
                .submitted
                .get(&tx_hash)
                .cloned()
                .ok_or_else(|| ChainError::Rpc(format!("unknown transaction {}", tx_hash)))?;
            let kind = CallKind::of(&call);
            let scripted = state.scripts.get(&kind).cloned().unwrap_or(Scripted::Succeed);

            match scripted {
                Scripted::Succeed => {
                    apply(&mut state, self.sender, &call);
                    state.events.push(ChainEvent::Confirmed(kind, tx_hash, true));
                }
                Scripted::Revert => {
                    state.events.push(ChainEvent::Confirmed(kind, tx_hash, false));
                }
                Scripted::Timeout | Scripted::Hang => state.pending.push(tx_hash),
                Scripted::RejectSubmission | Scripted::FailSubmission(_) => {}
            }
            scripted
        };

        match scripted {
            Scripted::Succeed => Ok(Confirmation {
                tx_hash,
                success: true,
                block_number: Some(1),
            }),
            Scripted::Revert => Ok(Confirmation {
                tx_hash,
                success: false,
                block_number: Some(1),
            }),
            Scripted::Hang => std::future::pending().await,
            _ => Err(ChainError::Timeout),
        }
    }
}
