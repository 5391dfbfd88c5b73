//! EVM Chain Support Module
//!
//! ## Submodules
//!
//! - `contracts` - ERC20, TokenMessengerV2 and router bindings using alloy sol!
//! - `calls` - ABI encoding of the core's `ContractCall`s
//! - `client` - `EvmChain`, the JSON-RPC `ChainReader` + `ChainWriter` (feature `evm`)

pub mod calls;
pub mod contracts;

#[cfg(feature = "evm")]
pub mod client;

// Re-export commonly used items
#[cfg(feature = "evm")]
pub use client::EvmChain;
pub use contracts::{ForwardRouter, TokenMessengerV2, ERC20};
