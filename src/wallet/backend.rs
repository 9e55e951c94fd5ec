//! Backend variants and the signing dialect each one speaks.

use crate::error::WalletError;
use std::fmt;
use std::str::FromStr;

/// Wallet backend behind the RPC session. Fixed for the controller's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletBackend {
    /// bitcoind with its built-in wallet.
    Bitcoind,
    /// btcwallet standing in front of btcd.
    Btcwallet,
}

impl WalletBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletBackend::Bitcoind => "bitcoind",
            WalletBackend::Btcwallet => "btcwallet",
        }
    }

    /// Signing call shape for this backend.
    pub fn dialect(&self) -> SignDialect {
        match self {
            WalletBackend::Bitcoind => SignDialect::WalletKeyStore,
            WalletBackend::Btcwallet => SignDialect::ExplicitHints,
        }
    }

    /// Phrase the backend's transaction index puts in its "unknown txid" error.
    pub fn tx_not_found_msg(&self) -> &'static str {
        match self {
            WalletBackend::Bitcoind => "No such mempool or blockchain transaction",
            WalletBackend::Btcwallet => "No information available about transaction",
        }
    }
}

impl fmt::Display for WalletBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for WalletBackend {
    type Err = WalletError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoind" => Ok(WalletBackend::Bitcoind),
            "btcwallet" => Ok(WalletBackend::Btcwallet),
            other => Err(WalletError::UnsupportedBackend(format!("unknown wallet backend '{other}'"))),
        }
    }
}

/// How `sign_transaction` talks to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignDialect {
    /// `signrawtransactionwithwallet`: the backend resolves prevouts from its own key store.
    WalletKeyStore,
    /// `signrawtransaction`: every input is accompanied by a `{value, script}` hint.
    ExplicitHints,
}

impl SignDialect {
    pub fn needs_hints(&self) -> bool { matches!(self, SignDialect::ExplicitHints) }
}
