//! Unspent outputs as reported by the backend, one fresh snapshot per query.

use bitcoin::{Amount, OutPoint, Script, ScriptBuf};
use serde::Serialize;
use std::cmp::Ordering;

/// One `listunspent` entry as returned by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUnspentEntry {
    pub outpoint: OutPoint,
    pub address: Option<String>,
    pub script_pubkey: ScriptBuf,
    /// Reported by the wallet for P2SH outputs it can spend.
    pub redeem_script: Option<ScriptBuf>,
    pub amount: Amount,
    pub confirmations: u32,
    pub spendable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<ScriptBuf>,
    pub address: Option<String>,
    pub spendable: bool,
    pub confirmations: u32,
}

impl From<ListUnspentEntry> for Utxo {
    fn from(e: ListUnspentEntry) -> Self {
        Self {
            outpoint: e.outpoint,
            value: e.amount,
            script_pubkey: e.script_pubkey,
            redeem_script: e.redeem_script,
            address: e.address,
            spendable: e.spendable,
            confirmations: e.confirmations,
        }
    }
}

/// Converts a raw listing, dropping zero-value entries and, if asked, unspendable ones.
pub fn results_to_utxos(entries: Vec<ListUnspentEntry>, only_spendable: bool) -> Vec<Utxo> {
    entries
        .into_iter()
        .filter(|e| e.amount > Amount::ZERO)
        .filter(|e| !only_spendable || e.spendable)
        .map(Utxo::from)
        .collect()
}

/// Largest value first; equal values ordered by outpoint so selection is deterministic.
pub fn largest_first(a: &Utxo, b: &Utxo) -> Ordering {
    b.value.cmp(&a.value).then_with(|| a.outpoint.cmp(&b.outpoint))
}

/// Input script types the size estimator knows how to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    P2pkh,
    P2wpkh,
    /// P2SH assumed to wrap a P2WPKH program.
    NestedP2wpkh,
    P2tr,
}

impl InputType {
    /// P2SH is only sized when the redeem script shows a P2WPKH program; any other
    /// P2SH spend has an unknown size.
    pub fn classify(script: &Script, redeem_script: Option<&Script>) -> Option<Self> {
        if script.is_p2wpkh() {
            Some(InputType::P2wpkh)
        } else if script.is_p2tr() {
            Some(InputType::P2tr)
        } else if script.is_p2pkh() {
            Some(InputType::P2pkh)
        } else if script.is_p2sh() && redeem_script.is_some_and(|r| r.is_p2wpkh()) {
            Some(InputType::NestedP2wpkh)
        } else {
            None
        }
    }

    pub fn of(utxo: &Utxo) -> Option<Self> { Self::classify(&utxo.script_pubkey, utxo.redeem_script.as_deref()) }
}
