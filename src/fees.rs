//! Fee Computation
//!
//! Derives the `maxFee` ceiling passed to the burn call and reconciles it
//! against the live minimum reported by the burn contract.
//!
//! ## Quote
//!
//! 1. Per-destination absolute floor, looked up in a [`FeeFloors`] table
//! 2. Proportional fee `amount * bps / 10_000` (integer division)
//! 3. `max(proportional, floor)`, then `min(.., cap)` when a cap is configured
//! 4. Rejected with `FeeExceedsAmount` unless strictly below the amount
//!
//! ## Reconciliation
//!
//! When the live minimum exceeds the quote, the fee becomes
//! `min(ceil(live_min * 1.10), amount - 1)`. A live minimum that is not below
//! the amount is rejected.

use alloy::primitives::U256;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TransferError;
use crate::types::FeeQuote;

/// Basis-point denominator (1 bp = 0.01%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default proportional fee: 500 bps = 5%
pub const DEFAULT_FEE_BPS: u64 = 500;

/// Default floor for destinations not listed in the table (0.20 at 6 decimals)
pub const DEFAULT_FLOOR: u64 = 200_000;

/// Floor for domain 0 (1.25 at 6 decimals)
pub const DOMAIN_ZERO_FLOOR: u64 = 1_250_000;

/// Buffer applied over the live minimum, in percent
pub const LIVE_MIN_BUFFER_PERCENT: u64 = 110;

// ============================================================================
// Floor Table
// ============================================================================

/// Minimum absolute fee per destination domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeFloors {
    /// Floor for any domain without an explicit entry
    pub default_floor: U256,
    /// Explicit per-domain floors
    pub per_domain: BTreeMap<u32, U256>,
}

impl Default for FeeFloors {
    fn default() -> Self {
        Self::new(U256::from(DEFAULT_FLOOR)).with_domain(0, U256::from(DOMAIN_ZERO_FLOOR))
    }
}

impl FeeFloors {
    /// Create a table with only a default floor
    pub fn new(default_floor: U256) -> Self {
        Self {
            default_floor,
            per_domain: BTreeMap::new(),
        }
    }

    /// Add or replace the floor for a domain
    pub fn with_domain(mut self, domain: u32, floor: U256) -> Self {
        self.per_domain.insert(domain, floor);
        self
    }

    /// Floor applying to a destination domain
    pub fn floor_for(&self, domain: u32) -> U256 {
        self.per_domain
            .get(&domain)
            .copied()
            .unwrap_or(self.default_floor)
    }

    /// Parse a `domain:floor` list, e.g. `"0:1250000,7:300000"`
    pub fn parse_table(default_floor: U256, table: &str) -> Result<Self> {
        let mut floors = Self::new(default_floor);
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (domain, floor) = entry
                .split_once(':')
                .ok_or_else(|| eyre!("Invalid floor entry '{}', expected domain:floor", entry))?;
            let domain: u32 = domain
                .trim()
                .parse()
                .wrap_err_with(|| format!("Invalid domain in floor entry '{}'", entry))?;
            let floor: U256 = floor
                .trim()
                .parse()
                .map_err(|e| eyre!("Invalid floor in entry '{}': {}", entry, e))?;
            floors.per_domain.insert(domain, floor);
        }
        Ok(floors)
    }
}

// ============================================================================
// Fee Parameters
// ============================================================================

/// Fee configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    /// Proportional fee in basis points
    pub fee_bps: u64,
    /// Per-destination floors
    pub floors: FeeFloors,
    /// Hard cap; zero disables it
    pub cap: U256,
}

impl Default for FeeParams {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            floors: FeeFloors::default(),
            cap: U256::ZERO,
        }
    }
}

// ============================================================================
// Fee Calculator
// ============================================================================

/// Pure, deterministic fee calculator
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    params: FeeParams,
}

impl FeeCalculator {
    /// Create a new fee calculator
    pub fn new(params: FeeParams) -> Self {
        Self { params }
    }

    /// Create with default parameters
    pub fn with_defaults() -> Self {
        Self::new(FeeParams::default())
    }

    /// Get the fee parameters
    pub fn params(&self) -> &FeeParams {
        &self.params
    }

    /// `amount * fee_bps / 10_000`, rounded down, without intermediate overflow
    pub fn proportional_fee(&self, amount: U256) -> U256 {
        let bps = U256::from(self.params.fee_bps);
        let denominator = U256::from(BPS_DENOMINATOR);
        let whole = (amount / denominator).saturating_mul(bps);
        let rest = (amount % denominator) * bps / denominator;
        whole.saturating_add(rest)
    }

    /// Compute the fee ceiling for a transfer
    pub fn compute_max_fee(
        &self,
        amount: U256,
        destination_domain: u32,
    ) -> Result<FeeQuote, TransferError> {
        let floor = self.params.floors.floor_for(destination_domain);
        let mut fee = self.proportional_fee(amount).max(floor);

        if !self.params.cap.is_zero() {
            fee = fee.min(self.params.cap);
        }

        if fee >= amount {
            return Err(TransferError::FeeExceedsAmount { fee, amount });
        }

        Ok(FeeQuote {
            amount,
            max_fee: fee,
        })
    }
}

/// `ceil(live_min * 1.10)`, saturating at `U256::MAX`
pub fn buffered_minimum(live_min: U256) -> U256 {
    let hundred = U256::from(100u64);
    live_min
        .checked_mul(U256::from(LIVE_MIN_BUFFER_PERCENT))
        .map(|scaled| {
            let rounded_down = scaled / hundred;
            if scaled % hundred == U256::ZERO {
                rounded_down
            } else {
                rounded_down + U256::from(1u64)
            }
        })
        .unwrap_or(U256::MAX)
}

/// Reconcile a quote with the live protocol minimum
///
/// Never lowers the quote; raises it only when the live minimum exceeds it.
pub fn reconcile_with_live_minimum(
    quote: &FeeQuote,
    live_min: U256,
) -> Result<FeeQuote, TransferError> {
    if live_min <= quote.max_fee {
        return Ok(*quote);
    }

    if live_min >= quote.amount {
        return Err(TransferError::FeeExceedsAmount {
            fee: live_min,
            amount: quote.amount,
        });
    }

    let ceiling = quote.amount - U256::from(1u64);
    Ok(FeeQuote {
        amount: quote.amount,
        max_fee: buffered_minimum(live_min).min(ceiling),
    })
}
