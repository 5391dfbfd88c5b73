//! Contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the token, the
//! burn-and-forward contract and the router holding the transfer configuration.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Standard ERC20 interface
    #[sol(rpc)]
    contract ERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);

        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }

    // ========================================================================
    // Burn-and-forward contract (CCTP v2 TokenMessenger)
    // ========================================================================

    /// TokenMessengerV2 subset used for fast burns with a forwarding hook
    #[sol(rpc)]
    contract TokenMessengerV2 {
        /// Burn `amount` of `burnToken` and emit a message to `destinationDomain`
        ///
        /// `minFinalityThreshold` is 1000 for fast transfers, 2000 for finalized.
        function depositForBurnWithHook(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold,
            bytes calldata hookData
        ) external;

        /// Live minimum fee the protocol charges for `amount`
        function getMinFeeAmount(uint256 amount) external view returns (uint256);

        event DepositForBurn(
            address indexed burnToken,
            uint256 amount,
            address indexed depositor,
            bytes32 mintRecipient,
            uint32 destinationDomain,
            bytes32 destinationTokenMessenger,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 indexed minFinalityThreshold,
            bytes hookData
        );
    }

    // ========================================================================
    // Router
    // ========================================================================

    /// Router views exposing the authoritative transfer configuration
    ///
    /// Unset addresses read as the zero address.
    #[sol(rpc)]
    contract ForwardRouter {
        function token() external view returns (address);
        function tokenMessenger() external view returns (address);
        function feeCollector() external view returns (address);
        function serviceFee() external view returns (uint256);
        function destinationCaller() external view returns (bytes32);
    }
}
