//! Wallet controller errors. Every variant carries the address / txid / amount it concerns.

use bitcoin::{Amount, Txid};
use thiserror::Error;

/// Raw failure reported by an RPC session, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// JSON-RPC level error returned by the backend.
    #[error("rpc error {code}: {message}")]
    Server { code: i32, message: String },

    /// Connection, HTTP or decoding failure.
    #[error("rpc transport: {0}")]
    Transport(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

// Backend error codes shared by bitcoind and btcwallet.
pub(crate) const RPC_WALLET_ERROR: i32 = -4;
pub(crate) const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;
pub(crate) const RPC_WALLET_UNLOCK_NEEDED: i32 = -13;
pub(crate) const RPC_WALLET_PASSPHRASE_INCORRECT: i32 = -14;
pub(crate) const RPC_WALLET_WRONG_ENC_STATE: i32 = -15;
pub(crate) const RPC_METHOD_NOT_FOUND: i32 = -32601;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet authentication failed: {0}")]
    Authentication(String),

    #[error("No key available for address {address}")]
    KeyNotAvailable { address: String },

    #[error("No usable funds in wallet")]
    NoUsableFunds,

    #[error("Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("Unsupported wallet backend: {0}")]
    UnsupportedBackend(String),

    #[error("Address {address} is not a native segwit (p2wpkh) address")]
    UnsupportedAddressType { address: String },

    #[error("Address {address} is not under wallet control")]
    NotWalletControlled { address: String },

    #[error("Not all inputs of transaction {txid} could be signed")]
    PartialSignature { txid: Txid },

    #[error("Transaction {txid} rejected by backend: {reason}")]
    RelayRejected { txid: Txid, reason: String },

    #[error("Transaction index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Backend protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type WalletResult<T> = Result<T, WalletError>;

impl RpcError {
    pub fn code(&self) -> Option<i32> {
        match self {
            RpcError::Server { code, .. } => Some(*code),
            RpcError::Transport(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RpcError::Server { message, .. } => message,
            RpcError::Transport(message) => message,
        }
    }

    /// Default classification shared by every controller operation.
    pub(crate) fn classify(self) -> WalletError {
        match self.code() {
            Some(RPC_WALLET_UNLOCK_NEEDED | RPC_WALLET_PASSPHRASE_INCORRECT | RPC_WALLET_WRONG_ENC_STATE) => {
                WalletError::Authentication(self.message().to_string())
            }
            Some(RPC_METHOD_NOT_FOUND) => WalletError::UnsupportedBackend(self.message().to_string()),
            _ => WalletError::Rpc(self),
        }
    }
}

impl From<bitcoincore_rpc::Error> for RpcError {
    fn from(e: bitcoincore_rpc::Error) -> Self {
        use bitcoincore_rpc::jsonrpc::error::Error as JsonRpcError;
        match e {
            bitcoincore_rpc::Error::JsonRpc(JsonRpcError::Rpc(rpc)) => RpcError::Server { code: rpc.code, message: rpc.message },
            other => RpcError::Transport(other.to_string()),
        }
    }
}
