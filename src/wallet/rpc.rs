//! WalletRpc - the RPC session the controller drives.
//!
//! One method per backend call. Implemented here for `bitcoincore_rpc::Client`;
//! callers with their own transport (TLS, proxies, test doubles) implement it themselves.

use crate::error::{RpcError, RpcResult, RPC_INVALID_ADDRESS_OR_KEY};
use crate::wallet::backend::WalletBackend;
use crate::wallet::status::{ConfRequest, TxConfStatus, TxConfirmation};
use crate::wallet::utxo::ListUnspentEntry;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{Address, Amount, BlockHash, OutPoint, PrivateKey, PublicKey, ScriptBuf, Transaction, Txid};
use bitcoincore_rpc::json::SignRawTransactionInput;
use bitcoincore_rpc::{Client, RpcApi};
use serde_json::{json, Value};

/// Per-input prevout data handed to the explicit-hint signing form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInputHint {
    pub outpoint: OutPoint,
    pub script_pubkey: ScriptBuf,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx: Transaction,
    /// Every input carries a complete signature.
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInfo {
    pub is_mine: bool,
    pub is_watch_only: bool,
    pub pubkey: Option<PublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTxInfo {
    pub tx: Transaction,
    /// Set once the transaction is mined.
    pub block_hash: Option<BlockHash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub height: u32,
    pub txids: Vec<Txid>,
}

pub trait WalletRpc: Send + Sync {
    fn wallet_passphrase(&self, passphrase: &str, timeout_secs: u64) -> RpcResult<()>;
    fn list_unspent(&self) -> RpcResult<Vec<ListUnspentEntry>>;
    fn get_address_info(&self, address: &Address) -> RpcResult<AddressInfo>;
    fn dump_private_key(&self, address: &Address) -> RpcResult<PrivateKey>;
    fn import_private_key(&self, key: &PrivateKey) -> RpcResult<()>;

    /// Key-store signing; `hints` adds prevouts the wallet cannot look up itself.
    fn sign_raw_transaction_with_wallet(&self, tx: &Transaction, hints: Option<&[SignInputHint]>) -> RpcResult<SignedTx>;

    /// Legacy signing with an explicit prevout for every input.
    fn sign_raw_transaction(&self, tx: &Transaction, hints: &[SignInputHint]) -> RpcResult<SignedTx>;

    /// `backend` picks the wire form of the high-fee override.
    fn send_raw_transaction(&self, tx: &Transaction, allow_high_fees: bool, backend: WalletBackend) -> RpcResult<Txid>;
    fn get_raw_transaction_verbose(&self, txid: &Txid) -> RpcResult<RawTxInfo>;
    fn get_block_verbose(&self, hash: &BlockHash) -> RpcResult<BlockInfo>;

    /// Confirmation lookup for `req`.
    ///
    /// `not_found_msg` is the phrase the backend uses for "txid unknown to the index".
    /// The default goes through the transaction index; sessions with other lookup
    /// strategies override it and may report any status code.
    fn tx_conf_details(&self, req: &ConfRequest, not_found_msg: &str) -> RpcResult<(Option<TxConfirmation>, TxConfStatus)> {
        index_conf_details(self, req, not_found_msg)
    }
}

/// Transaction-index lookup: the unknown-txid error becomes `NOT_FOUND_INDEX`,
/// any other error propagates.
pub fn index_conf_details<R: WalletRpc + ?Sized>(
    rpc: &R,
    req: &ConfRequest,
    not_found_msg: &str,
) -> RpcResult<(Option<TxConfirmation>, TxConfStatus)> {
    let raw = match rpc.get_raw_transaction_verbose(&req.txid) {
        Ok(raw) => raw,
        Err(RpcError::Server { code, message }) if code == RPC_INVALID_ADDRESS_OR_KEY && message.contains(not_found_msg) => {
            return Ok((None, TxConfStatus::NOT_FOUND_INDEX));
        }
        Err(e) => return Err(e),
    };

    if !req.matches_tx(&raw.tx) {
        return Err(RpcError::Transport(format!("unable to locate tx {}", req.txid)));
    }

    let Some(block_hash) = raw.block_hash else {
        return Ok((None, TxConfStatus::FOUND_MEMPOOL));
    };

    let block = rpc.get_block_verbose(&block_hash)?;
    if block.hash != block_hash {
        return Err(RpcError::Transport(format!("asked for block {block_hash}, got {}", block.hash)));
    }
    match block.txids.iter().position(|id| *id == req.txid) {
        Some(index) => Ok((
            Some(TxConfirmation { tx: raw.tx, block_hash, block_height: block.height, tx_index: index as u32 }),
            TxConfStatus::FOUND_INDEX,
        )),
        None => Err(RpcError::Transport(format!("unable to locate tx {} in block {}", req.txid, block_hash))),
    }
}

fn hints_json(hints: &[SignInputHint]) -> Value {
    Value::Array(
        hints
            .iter()
            .map(|h| {
                json!({
                    "txid": h.outpoint.txid.to_string(),
                    "vout": h.outpoint.vout,
                    "scriptPubKey": h.script_pubkey.to_hex_string(),
                    "amount": h.amount.to_btc(),
                })
            })
            .collect(),
    )
}

/// `sendrawtransaction` params. bitcoind takes a `maxfeerate` where 0 lifts the
/// ceiling; btcd and btcwallet take an `allowhighfees` bool.
fn send_params(tx: &Transaction, allow_high_fees: bool, backend: WalletBackend) -> Vec<Value> {
    let mut params = vec![Value::from(serialize_hex(tx))];
    if allow_high_fees {
        params.push(match backend {
            WalletBackend::Bitcoind => json!(0),
            WalletBackend::Btcwallet => json!(true),
        });
    }
    params
}

fn decode_signed(hex: &[u8], complete: bool) -> RpcResult<SignedTx> {
    let tx = bitcoin::consensus::deserialize(hex).map_err(|e| RpcError::Transport(format!("signed tx decode: {e}")))?;
    Ok(SignedTx { tx, complete })
}

impl WalletRpc for Client {
    fn wallet_passphrase(&self, passphrase: &str, timeout_secs: u64) -> RpcResult<()> {
        self.call::<Value>("walletpassphrase", &[passphrase.into(), timeout_secs.into()])?;
        Ok(())
    }

    fn list_unspent(&self) -> RpcResult<Vec<ListUnspentEntry>> {
        let entries = RpcApi::list_unspent(self, None, None, None, None, None)?;
        Ok(entries
            .into_iter()
            .map(|e| ListUnspentEntry {
                outpoint: OutPoint { txid: e.txid, vout: e.vout },
                address: e.address.map(|a| a.assume_checked().to_string()),
                script_pubkey: e.script_pub_key,
                redeem_script: e.redeem_script,
                amount: e.amount,
                confirmations: e.confirmations,
                spendable: e.spendable,
            })
            .collect())
    }

    fn get_address_info(&self, address: &Address) -> RpcResult<AddressInfo> {
        let info = RpcApi::get_address_info(self, address)?;
        Ok(AddressInfo {
            is_mine: info.is_mine.unwrap_or(false),
            is_watch_only: info.is_watchonly.unwrap_or(false),
            pubkey: info.pubkey,
        })
    }

    fn dump_private_key(&self, address: &Address) -> RpcResult<PrivateKey> {
        Ok(RpcApi::dump_private_key(self, address)?)
    }

    fn import_private_key(&self, key: &PrivateKey) -> RpcResult<()> {
        Ok(RpcApi::import_private_key(self, key, None, None)?)
    }

    fn sign_raw_transaction_with_wallet(&self, tx: &Transaction, hints: Option<&[SignInputHint]>) -> RpcResult<SignedTx> {
        let inputs: Option<Vec<SignRawTransactionInput>> = hints.map(|hints| {
            hints
                .iter()
                .map(|h| SignRawTransactionInput {
                    txid: h.outpoint.txid,
                    vout: h.outpoint.vout,
                    script_pub_key: h.script_pubkey.clone(),
                    redeem_script: None,
                    amount: Some(h.amount),
                })
                .collect()
        });
        let res = RpcApi::sign_raw_transaction_with_wallet(self, tx, inputs.as_deref(), None)?;
        decode_signed(&res.hex, res.complete)
    }

    fn sign_raw_transaction(&self, tx: &Transaction, hints: &[SignInputHint]) -> RpcResult<SignedTx> {
        let res: bitcoincore_rpc::json::SignRawTransactionResult =
            self.call("signrawtransaction", &[serialize_hex(tx).into(), hints_json(hints)])?;
        decode_signed(&res.hex, res.complete)
    }

    fn send_raw_transaction(&self, tx: &Transaction, allow_high_fees: bool, backend: WalletBackend) -> RpcResult<Txid> {
        Ok(self.call("sendrawtransaction", &send_params(tx, allow_high_fees, backend))?)
    }

    fn get_raw_transaction_verbose(&self, txid: &Txid) -> RpcResult<RawTxInfo> {
        let info = RpcApi::get_raw_transaction_info(self, txid, None)?;
        let tx = info.transaction().map_err(|e| RpcError::Transport(format!("raw tx decode: {e}")))?;
        Ok(RawTxInfo { tx, block_hash: info.blockhash })
    }

    fn get_block_verbose(&self, hash: &BlockHash) -> RpcResult<BlockInfo> {
        let block = RpcApi::get_block_info(self, hash)?;
        Ok(BlockInfo { hash: block.hash, height: block.height as u32, txids: block.tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    #[test]
    fn hint_json_shape() {
        let hint = SignInputHint {
            outpoint: OutPoint { txid: Txid::all_zeros(), vout: 3 },
            script_pubkey: ScriptBuf::from_bytes(vec![0x00, 0x14]),
            amount: Amount::from_sat(150_000_000),
        };
        let v = hints_json(&[hint]);
        assert_eq!(v[0]["vout"], 3);
        assert_eq!(v[0]["scriptPubKey"], "0014");
        assert_eq!(v[0]["amount"], 1.5);
        assert_eq!(v[0]["txid"], Txid::all_zeros().to_string());
    }

    fn empty_tx() -> Transaction {
        Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![],
            output: vec![],
        }
    }

    #[test]
    fn high_fee_override_per_backend() {
        let tx = empty_tx();
        let hex = serialize_hex(&tx);

        assert_eq!(send_params(&tx, true, WalletBackend::Bitcoind), vec![json!(hex), json!(0)]);
        assert_eq!(send_params(&tx, true, WalletBackend::Btcwallet), vec![json!(hex), json!(true)]);
        assert!(send_params(&tx, true, WalletBackend::Btcwallet)[1].is_boolean());

        for backend in [WalletBackend::Bitcoind, WalletBackend::Btcwallet] {
            assert_eq!(send_params(&tx, false, backend), vec![json!(hex)]);
        }
    }
}
