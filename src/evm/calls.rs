//! ABI encoding of [`ContractCall`]s

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;

use crate::chain::ContractCall;
use crate::evm::contracts::{TokenMessengerV2, ERC20};

impl ContractCall {
    /// ABI-encoded calldata, selector included
    pub fn calldata(&self) -> Bytes {
        match self {
            ContractCall::Approve {
                spender, amount, ..
            } => ERC20::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode()
            .into(),
            ContractCall::Transfer { to, amount, .. } => ERC20::transferCall {
                to: *to,
                amount: *amount,
            }
            .abi_encode()
            .into(),
            ContractCall::DepositForBurnWithHook {
                amount,
                destination_domain,
                mint_recipient,
                burn_token,
                destination_caller,
                max_fee,
                min_finality_threshold,
                hook_data,
                ..
            } => TokenMessengerV2::depositForBurnWithHookCall {
                amount: *amount,
                destinationDomain: *destination_domain,
                mintRecipient: *mint_recipient,
                burnToken: *burn_token,
                destinationCaller: *destination_caller,
                maxFee: *max_fee,
                minFinalityThreshold: *min_finality_threshold,
                hookData: hook_data.clone(),
            }
            .abi_encode()
            .into(),
        }
    }

    /// Unsigned transaction request from `from`; nonce, gas and fees are left to the provider
    pub fn to_transaction_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.target())
            .with_input(self.calldata())
    }
}
