//! Testing Utilities Module
//!
//! In-memory chain collaborator for unit and downstream tests.
//!
//! ## Submodules
//!
//! - `mock_chain` - `MockChain`, a scriptable `ChainReader` + `ChainWriter`

pub mod mock_chain;

pub use mock_chain::*;
