//! Forwarding hook payload
//!
//! The burn call carries a fixed 32-byte hook that asks the forwarding service
//! to relay the mint on the destination chain:
//!
//! ```text
//! [0..24)  magic "cctp-forward", zero padded
//! [24..28) version, big-endian u32
//! [28..32) length of trailing payload, big-endian u32
//! ```
//!
//! The memo extension appends the memo after the fixed header and records its
//! length. It changes the payload size, so it stays off unless enabled.

use alloy::primitives::Bytes;
use serde::{Deserialize, Serialize};

/// Size of the fixed hook header
pub const HOOK_DATA_LEN: usize = 32;

/// Forwarding magic
pub const FORWARD_MAGIC: &[u8] = b"cctp-forward";

/// Current hook version
pub const HOOK_VERSION: u32 = 0;

/// Default memo bound in bytes
pub const DEFAULT_MEMO_MAX_BYTES: usize = 128;

/// Memo handling options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoOptions {
    /// Append the memo to the hook payload (experimental)
    pub enabled: bool,
    /// Maximum memo length accepted by validation
    pub max_bytes: usize,
}

impl Default for MemoOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_bytes: DEFAULT_MEMO_MAX_BYTES,
        }
    }
}

/// Build the hook payload for the burn call
pub fn forward_hook_data(memo: Option<&[u8]>, options: &MemoOptions) -> Bytes {
    let trailing = match memo {
        Some(memo) if options.enabled && !memo.is_empty() => memo,
        _ => &[],
    };

    let mut data = Vec::with_capacity(HOOK_DATA_LEN + trailing.len());
    data.extend_from_slice(FORWARD_MAGIC);
    data.resize(24, 0);
    data.extend_from_slice(&HOOK_VERSION.to_be_bytes());
    data.extend_from_slice(&(trailing.len() as u32).to_be_bytes());
    data.extend_from_slice(trailing);

    Bytes::from(data)
}
