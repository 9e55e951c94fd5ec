//! In-memory wallet backend for integration tests.
//!
//! Holds real secp256k1 keys and signs p2wpkh inputs the way a node wallet would.
//! Every call is recorded by method name, and any method can be made to fail.

#![allow(dead_code)]

use bitcoin::ecdsa::Signature;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    Address, Amount, BlockHash, CompressedPublicKey, Network, OutPoint, PrivateKey, PublicKey, ScriptBuf, Transaction,
    TxOut, Txid, Witness,
};
use std::collections::HashMap;
use std::sync::Mutex;
use walletctl::wallet::{AddressInfo, BlockInfo, ListUnspentEntry, RawTxInfo, SignInputHint, SignedTx};
use walletctl::{RpcError, RpcResult, TxConfStatus, WalletBackend, WalletRpc};

pub const PASSPHRASE: &str = "correct horse";

pub fn server(code: i32, message: &str) -> RpcError {
    RpcError::Server { code, message: message.into() }
}

pub fn method_not_found() -> RpcError { server(-32601, "Method not found") }

#[derive(Default)]
struct State {
    unspent: Vec<ListUnspentEntry>,
    calls: Vec<String>,
    failures: HashMap<String, RpcError>,
    txs: HashMap<Txid, RawTxInfo>,
    blocks: HashMap<BlockHash, BlockInfo>,
    broadcast: Vec<Transaction>,
    watch_only: Vec<(Address, PublicKey)>,
    unlocked: bool,
    next_txid: u8,
    send_backends: Vec<WalletBackend>,
}

pub struct MockRpc {
    pub network: Network,
    pub backend: WalletBackend,
    keys: Mutex<Vec<PrivateKey>>,
    state: Mutex<State>,
    /// Replaces the index lookup with a fixed status.
    forced_status: Option<TxConfStatus>,
}

impl MockRpc {
    /// Unlocked regtest wallet holding keys `[1; 32]` and `[2; 32]`.
    pub fn new(backend: WalletBackend) -> Self {
        let network = Network::Regtest;
        let keys = [1u8, 2]
            .iter()
            .map(|b| PrivateKey::from_slice(&[*b; 32], network).expect("valid secret"))
            .collect();
        Self {
            network,
            backend,
            keys: Mutex::new(keys),
            state: Mutex::new(State { unlocked: true, next_txid: 1, ..Default::default() }),
            forced_status: None,
        }
    }

    pub fn locked(self) -> Self {
        self.state.lock().unwrap().unlocked = false;
        self
    }

    pub fn with_forced_status(mut self, status: TxConfStatus) -> Self {
        self.forced_status = Some(status);
        self
    }

    pub fn address(&self, index: usize) -> Address {
        let key = self.keys.lock().unwrap()[index];
        address_of(&key, self.network)
    }

    pub fn key(&self, index: usize) -> PrivateKey { self.keys.lock().unwrap()[index] }

    /// Adds a confirmed, spendable output paying key `index`.
    pub fn fund(&self, index: usize, sat: u64) -> OutPoint {
        let script = self.address(index).script_pubkey();
        self.fund_script(script, sat, true)
    }

    pub fn fund_script(&self, script_pubkey: ScriptBuf, sat: u64, spendable: bool) -> OutPoint {
        let mut state = self.state.lock().unwrap();
        let outpoint = OutPoint { txid: Txid::from_byte_array([state.next_txid; 32]), vout: 0 };
        state.next_txid += 1;
        state.unspent.push(ListUnspentEntry {
            outpoint,
            address: None,
            script_pubkey,
            redeem_script: None,
            amount: Amount::from_sat(sat),
            confirmations: 6,
            spendable,
        });
        outpoint
    }

    pub fn add_watch_only(&self, address: Address, key: PublicKey) {
        self.state.lock().unwrap().watch_only.push((address, key));
    }

    pub fn fail(&self, method: &str, err: RpcError) {
        self.state.lock().unwrap().failures.insert(method.to_string(), err);
    }

    pub fn calls(&self) -> Vec<String> { self.state.lock().unwrap().calls.clone() }

    pub fn broadcast_txs(&self) -> Vec<Transaction> { self.state.lock().unwrap().broadcast.clone() }

    /// Backend argument of every `sendrawtransaction` call, in order.
    pub fn send_backends(&self) -> Vec<WalletBackend> { self.state.lock().unwrap().send_backends.clone() }

    pub fn is_unlocked(&self) -> bool { self.state.lock().unwrap().unlocked }

    /// Puts `tx` in the mempool.
    pub fn add_mempool_tx(&self, tx: Transaction) {
        self.state.lock().unwrap().txs.insert(tx.compute_txid(), RawTxInfo { tx, block_hash: None });
    }

    /// Mines `txid` at `height` behind `position` filler transactions.
    pub fn mine(&self, txid: Txid, height: u32, position: usize) -> BlockHash {
        let mut state = self.state.lock().unwrap();
        let hash = BlockHash::from_byte_array([height as u8; 32]);
        let mut txids: Vec<Txid> = (0..position).map(|i| Txid::from_byte_array([0xf0 + i as u8; 32])).collect();
        txids.push(txid);
        state.blocks.insert(hash, BlockInfo { hash, height, txids });
        if let Some(raw) = state.txs.get_mut(&txid) {
            raw.block_hash = Some(hash);
        }
        hash
    }

    /// Makes `getblock` for `hash` answer with a different block's header hash.
    pub fn swap_block_hash(&self, hash: BlockHash) {
        if let Some(block) = self.state.lock().unwrap().blocks.get_mut(&hash) {
            block.hash = BlockHash::from_byte_array([0xee; 32]);
        }
    }

    fn enter(&self, method: &str) -> RpcResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        match state.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn require_unlocked(&self) -> RpcResult<()> {
        if self.state.lock().unwrap().unlocked {
            Ok(())
        } else {
            Err(server(-13, "Error: Please enter the wallet passphrase with walletpassphrase first."))
        }
    }

    fn key_for_script(&self, script: &ScriptBuf) -> Option<PrivateKey> {
        self.keys.lock().unwrap().iter().copied().find(|k| address_of(k, self.network).script_pubkey() == *script)
    }

    /// Signs every input whose prevout is known and belongs to one of our keys.
    fn sign_with(&self, tx: &Transaction, prevouts: &HashMap<OutPoint, TxOut>) -> RpcResult<SignedTx> {
        self.require_unlocked()?;
        let secp = Secp256k1::new();
        let mut signed = tx.clone();
        let mut complete = true;
        for index in 0..tx.input.len() {
            let key = prevouts
                .get(&tx.input[index].previous_output)
                .and_then(|prev| self.key_for_script(&prev.script_pubkey).map(|k| (k, prev.clone())));
            let Some((key, prev)) = key else {
                complete = false;
                continue;
            };
            let sighash = SighashCache::new(tx)
                .p2wpkh_signature_hash(index, &prev.script_pubkey, prev.value, EcdsaSighashType::All)
                .map_err(|e| RpcError::Transport(e.to_string()))?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let signature = Signature::sighash_all(secp.sign_ecdsa(&msg, &key.inner));
            let pubkey = CompressedPublicKey::from_private_key(&secp, &key).expect("compressed key");
            signed.input[index].witness = Witness::p2wpkh(&signature, &pubkey.0);
        }
        Ok(SignedTx { tx: signed, complete })
    }

    fn hint_prevouts(hints: &[SignInputHint]) -> HashMap<OutPoint, TxOut> {
        hints
            .iter()
            .map(|h| (h.outpoint, TxOut { value: h.amount, script_pubkey: h.script_pubkey.clone() }))
            .collect()
    }
}

pub fn address_of(key: &PrivateKey, network: Network) -> Address {
    let secp = Secp256k1::new();
    let pubkey = CompressedPublicKey::from_private_key(&secp, key).expect("compressed key");
    Address::p2wpkh(&pubkey, network)
}

impl WalletRpc for MockRpc {
    fn wallet_passphrase(&self, passphrase: &str, _timeout_secs: u64) -> RpcResult<()> {
        self.enter("walletpassphrase")?;
        if passphrase != PASSPHRASE {
            return Err(server(-14, "Error: The wallet passphrase entered was incorrect."));
        }
        self.state.lock().unwrap().unlocked = true;
        Ok(())
    }

    fn list_unspent(&self) -> RpcResult<Vec<ListUnspentEntry>> {
        self.enter("listunspent")?;
        Ok(self.state.lock().unwrap().unspent.clone())
    }

    fn get_address_info(&self, address: &Address) -> RpcResult<AddressInfo> {
        self.enter("getaddressinfo")?;
        if let Some(key) = self.key_for_script(&address.script_pubkey()) {
            let secp = Secp256k1::new();
            return Ok(AddressInfo { is_mine: true, is_watch_only: false, pubkey: Some(key.public_key(&secp)) });
        }
        let state = self.state.lock().unwrap();
        match state.watch_only.iter().find(|(a, _)| a == address) {
            Some((_, key)) => Ok(AddressInfo { is_mine: false, is_watch_only: true, pubkey: Some(*key) }),
            None => Ok(AddressInfo::default()),
        }
    }

    fn dump_private_key(&self, address: &Address) -> RpcResult<PrivateKey> {
        self.enter("dumpprivkey")?;
        self.require_unlocked()?;
        self.key_for_script(&address.script_pubkey())
            .ok_or_else(|| server(-4, &format!("Private key for address {address} is not known")))
    }

    fn import_private_key(&self, key: &PrivateKey) -> RpcResult<()> {
        self.enter("importprivkey")?;
        self.require_unlocked()?;
        self.keys.lock().unwrap().push(*key);
        Ok(())
    }

    fn sign_raw_transaction_with_wallet(&self, tx: &Transaction, hints: Option<&[SignInputHint]>) -> RpcResult<SignedTx> {
        self.enter("signrawtransactionwithwallet")?;
        if self.backend == WalletBackend::Btcwallet {
            return Err(method_not_found());
        }
        let mut prevouts: HashMap<OutPoint, TxOut> = self
            .state
            .lock()
            .unwrap()
            .unspent
            .iter()
            .map(|e| (e.outpoint, TxOut { value: e.amount, script_pubkey: e.script_pubkey.clone() }))
            .collect();
        prevouts.extend(Self::hint_prevouts(hints.unwrap_or_default()));
        self.sign_with(tx, &prevouts)
    }

    fn sign_raw_transaction(&self, tx: &Transaction, hints: &[SignInputHint]) -> RpcResult<SignedTx> {
        self.enter("signrawtransaction")?;
        if self.backend == WalletBackend::Bitcoind {
            return Err(method_not_found());
        }
        // btcwallet only sees what it is handed
        self.sign_with(tx, &Self::hint_prevouts(hints))
    }

    fn send_raw_transaction(&self, tx: &Transaction, _allow_high_fees: bool, backend: WalletBackend) -> RpcResult<Txid> {
        self.enter("sendrawtransaction")?;
        self.state.lock().unwrap().send_backends.push(backend);
        if tx.input.iter().any(|i| i.witness.is_empty()) {
            return Err(server(-26, "mandatory-script-verify-flag-failed"));
        }
        let txid = tx.compute_txid();
        let mut state = self.state.lock().unwrap();
        state.broadcast.push(tx.clone());
        state.txs.insert(txid, RawTxInfo { tx: tx.clone(), block_hash: None });
        Ok(txid)
    }

    fn get_raw_transaction_verbose(&self, txid: &Txid) -> RpcResult<RawTxInfo> {
        self.enter("getrawtransaction")?;
        let state = self.state.lock().unwrap();
        state.txs.get(txid).cloned().ok_or_else(|| server(-5, self.backend.tx_not_found_msg()))
    }

    fn get_block_verbose(&self, hash: &BlockHash) -> RpcResult<BlockInfo> {
        self.enter("getblock")?;
        let state = self.state.lock().unwrap();
        state.blocks.get(hash).cloned().ok_or_else(|| server(-5, "Block not found"))
    }

    fn tx_conf_details(
        &self,
        req: &walletctl::wallet::ConfRequest,
        not_found_msg: &str,
    ) -> RpcResult<(Option<walletctl::TxConfirmation>, TxConfStatus)> {
        match self.forced_status {
            Some(status) => Ok((None, status)),
            None => walletctl::wallet::index_conf_details(self, req, not_found_msg),
        }
    }
}
