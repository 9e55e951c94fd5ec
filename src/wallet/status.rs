//! Confirmation status: the backend's open vocabulary folded onto three states.
//!
//! | Backend status       | TxStatus  |
//! |----------------------|-----------|
//! | `NOT_FOUND_INDEX`    | NotFound  |
//! | `NOT_FOUND_MANUALLY` | NotFound  |
//! | `FOUND_MEMPOOL`      | InMempool |
//! | `FOUND_INDEX`        | InChain   |
//! | `FOUND_MANUALLY`     | InChain   |
//! | anything else        | panic     |

use crate::error::{WalletError, WalletResult};
use bitcoin::{BlockHash, Script, ScriptBuf, Transaction, Txid};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxStatus {
    NotFound,
    InMempool,
    InChain,
}

/// Raw confirmation status code reported by a session's index lookup.
///
/// Codes are not a closed set: sessions may report values this crate has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxConfStatus(pub u8);

impl TxConfStatus {
    pub const NOT_FOUND_INDEX: Self = Self(0);
    pub const FOUND_MEMPOOL: Self = Self(1);
    pub const FOUND_INDEX: Self = Self(2);
    pub const NOT_FOUND_MANUALLY: Self = Self(3);
    pub const FOUND_MANUALLY: Self = Self(4);
}

impl fmt::Display for TxConfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NOT_FOUND_INDEX => f.write_str("TxNotFoundIndex"),
            Self::FOUND_MEMPOOL => f.write_str("TxFoundMempool"),
            Self::FOUND_INDEX => f.write_str("TxFoundIndex"),
            Self::NOT_FOUND_MANUALLY => f.write_str("TxNotFoundManually"),
            Self::FOUND_MANUALLY => f.write_str("TxFoundManually"),
            Self(other) => write!(f, "TxConfStatus({other})"),
        }
    }
}

impl TxStatus {
    pub fn try_from_conf_status(status: TxConfStatus) -> WalletResult<Self> {
        match status {
            TxConfStatus::NOT_FOUND_INDEX | TxConfStatus::NOT_FOUND_MANUALLY => Ok(TxStatus::NotFound),
            TxConfStatus::FOUND_MEMPOOL => Ok(TxStatus::InMempool),
            TxConfStatus::FOUND_INDEX | TxConfStatus::FOUND_MANUALLY => Ok(TxStatus::InChain),
            other => Err(WalletError::ProtocolViolation(format!("unknown confirmation status {other}"))),
        }
    }
}

/// Maps a backend status, aborting on anything outside the known vocabulary.
///
/// Staking activation is decided from this value; an unknown status is never coerced.
pub fn map_conf_status(status: TxConfStatus) -> TxStatus {
    match TxStatus::try_from_conf_status(status) {
        Ok(s) => s,
        Err(e) => panic!("{e}"),
    }
}

/// What to look for: a txid paying to a given output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfRequest {
    pub txid: Txid,
    pub pk_script: ScriptBuf,
}

impl ConfRequest {
    pub fn new(txid: Txid, pk_script: &Script) -> WalletResult<Self> {
        if pk_script.is_empty() {
            return Err(WalletError::InvalidTransaction(format!("empty output script for {txid}")));
        }
        Ok(Self { txid, pk_script: pk_script.to_owned() })
    }

    pub fn matches_tx(&self, tx: &Transaction) -> bool {
        tx.compute_txid() == self.txid && tx.output.iter().any(|o| o.script_pubkey == self.pk_script)
    }
}

/// Where a mined transaction sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx: Transaction,
    pub block_hash: BlockHash,
    pub block_height: u32,
    pub tx_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map() {
        assert_eq!(map_conf_status(TxConfStatus::NOT_FOUND_INDEX), TxStatus::NotFound);
        assert_eq!(map_conf_status(TxConfStatus::NOT_FOUND_MANUALLY), TxStatus::NotFound);
        assert_eq!(map_conf_status(TxConfStatus::FOUND_MEMPOOL), TxStatus::InMempool);
        assert_eq!(map_conf_status(TxConfStatus::FOUND_INDEX), TxStatus::InChain);
        assert_eq!(map_conf_status(TxConfStatus::FOUND_MANUALLY), TxStatus::InChain);
    }

    #[test]
    fn unknown_status_is_a_protocol_violation() {
        let err = TxStatus::try_from_conf_status(TxConfStatus(9)).unwrap_err();
        assert!(matches!(err, WalletError::ProtocolViolation(m) if m.contains("TxConfStatus(9)")));
    }

    #[test]
    #[should_panic(expected = "unknown confirmation status")]
    fn unknown_status_aborts() {
        map_conf_status(TxConfStatus(42));
    }

    #[test]
    fn request_rejects_empty_script() {
        use bitcoin::hashes::Hash;
        assert!(ConfRequest::new(Txid::all_zeros(), Script::new()).is_err());
    }
}
