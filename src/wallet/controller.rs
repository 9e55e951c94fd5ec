//! RpcWalletController - the wallet contract callers program against.
//!
//! Stateless apart from construction-time fields and the RPC session. Every call
//! is one or more independent round trips; nothing is cached between calls and no
//! outputs are locked, so concurrent builds may pick the same coins. Callers that
//! build concurrently must serialize themselves.

use crate::config::WalletControllerConfig;
use crate::error::{RpcError, WalletError, WalletResult, RPC_METHOD_NOT_FOUND, RPC_WALLET_ERROR};
use crate::wallet::backend::{SignDialect, WalletBackend};
use crate::wallet::bip322;
use crate::wallet::builder::{build_tx_from_outputs, FundedTx};
use crate::wallet::rpc::{SignInputHint, SignedTx, WalletRpc};
use crate::wallet::status::{map_conf_status, ConfRequest, TxConfirmation, TxStatus};
use crate::wallet::utxo::{largest_first, results_to_utxos, Utxo};
use bitcoin::{Address, Amount, Network, OutPoint, PrivateKey, PublicKey, Script, Transaction, TxOut, Txid, Witness};
use bitcoincore_rpc::{Auth, Client};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub trait WalletController {
    /// Unlocks signing for `timeout_secs` seconds.
    fn unlock_wallet(&self, timeout_secs: u64) -> WalletResult<()>;
    fn resolve_public_key(&self, address: &Address) -> WalletResult<PublicKey>;
    /// Requires an unlocked wallet.
    fn export_private_key(&self, address: &Address) -> WalletResult<PrivateKey>;
    fn import_private_key(&self, key: &PrivateKey) -> WalletResult<()>;
    fn network(&self) -> Network;
    /// btcd-style name: `mainnet` and `testnet3` for the two public networks.
    fn network_name(&self) -> String {
        match self.network() {
            Network::Bitcoin => "mainnet".into(),
            Network::Testnet => "testnet3".into(),
            other => other.to_string(),
        }
    }

    fn build_transaction(&self, outputs: Vec<TxOut>, fee_rate_per_kb: Amount, change_address: &Address) -> WalletResult<FundedTx>;

    /// Returns the signed transaction and whether every input got signed.
    /// A partial result is not an error here.
    fn sign_transaction(&self, tx: &Transaction) -> WalletResult<(Transaction, bool)>;

    /// Build + sign; unlike `sign_transaction`, a partially signed result is an error.
    fn build_and_sign_transaction(&self, outputs: Vec<TxOut>, fee_rate_per_kb: Amount, change_address: &Address) -> WalletResult<Transaction>;

    fn broadcast(&self, tx: &Transaction, allow_high_fees: bool) -> WalletResult<Txid>;
    fn list_unspent_outputs(&self, only_spendable: bool) -> WalletResult<Vec<Utxo>>;

    /// Point-in-time confirmation lookup; requires a transaction index on the backend.
    fn query_confirmation(&self, txid: &Txid, pk_script: &Script) -> WalletResult<(Option<TxConfirmation>, TxStatus)>;

    /// BIP322 proof of control over a p2wpkh address. Nothing is broadcast.
    fn sign_ownership_proof(&self, message: &[u8], address: &Address) -> WalletResult<Witness>;
}

pub struct RpcWalletController<R = Client> {
    rpc: R,
    wallet_passphrase: Zeroizing<String>,
    network: Network,
    backend: WalletBackend,
    dialect: SignDialect,
}

impl RpcWalletController<Client> {
    /// Opens a plain-HTTP `bitcoincore-rpc` session from configuration.
    pub fn connect(config: &WalletControllerConfig) -> WalletResult<Self> {
        let backend = config
            .backend
            .ok_or_else(|| WalletError::UnsupportedBackend("no wallet backend configured".into()))?;
        if !config.rpc.disable_tls {
            return Err(WalletError::Config(
                "built-in rpc session is plain http; set disable_tls or pass a TLS session to RpcWalletController::new".into(),
            ));
        }
        let auth = Auth::UserPass(config.rpc.user.clone(), config.rpc.pass.to_string());
        let client = Client::new(&config.rpc.url(), auth).map_err(|e| RpcError::from(e).classify())?;
        info!(host = %config.rpc.host, %backend, network = %config.network, "wallet rpc session opened");
        Ok(Self::new(client, config.wallet_passphrase.as_str(), config.network, backend))
    }
}

impl<R: WalletRpc> RpcWalletController<R> {
    pub fn new(rpc: R, wallet_passphrase: &str, network: Network, backend: WalletBackend) -> Self {
        Self { rpc, wallet_passphrase: Zeroizing::new(wallet_passphrase.to_string()), network, backend, dialect: backend.dialect() }
    }

    pub fn backend(&self) -> WalletBackend { self.backend }
    pub fn rpc(&self) -> &R { &self.rpc }

    fn check_network(&self, address: &Address) -> WalletResult<()> {
        if address.as_unchecked().is_valid_for_network(self.network) {
            Ok(())
        } else {
            Err(WalletError::InvalidTransaction(format!("address {address} is not valid for {}", self.network)))
        }
    }

    /// Prevout hints for the inputs the wallet currently knows about.
    fn prevout_hints(&self, tx: &Transaction) -> WalletResult<Vec<SignInputHint>> {
        let snapshot: HashMap<OutPoint, Utxo> = results_to_utxos(self.rpc.list_unspent().map_err(RpcError::classify)?, false)
            .into_iter()
            .map(|u| (u.outpoint, u))
            .collect();
        Ok(tx
            .input
            .iter()
            .filter_map(|input| {
                let hint = snapshot.get(&input.previous_output).map(|u| SignInputHint {
                    outpoint: u.outpoint,
                    script_pubkey: u.script_pubkey.clone(),
                    amount: u.value,
                });
                if hint.is_none() {
                    debug!(outpoint = %input.previous_output, "no prevout hint, input left to the backend");
                }
                hint
            })
            .collect())
    }
}

fn is_unknown_key(e: &RpcError) -> bool {
    let msg = e.message();
    (e.code() == Some(RPC_WALLET_ERROR) && (msg.contains("not known") || msg.contains("not found")))
        || msg.contains("does not refer to a key")
}

impl<R: WalletRpc> WalletController for RpcWalletController<R> {
    fn unlock_wallet(&self, timeout_secs: u64) -> WalletResult<()> {
        self.rpc.wallet_passphrase(&self.wallet_passphrase, timeout_secs).map_err(RpcError::classify)?;
        debug!(timeout_secs, "wallet unlocked");
        Ok(())
    }

    fn resolve_public_key(&self, address: &Address) -> WalletResult<PublicKey> {
        let info = self.rpc.get_address_info(address).map_err(RpcError::classify)?;
        match info.pubkey {
            Some(key) if info.is_mine && !info.is_watch_only => Ok(key),
            _ => Err(WalletError::KeyNotAvailable { address: address.to_string() }),
        }
    }

    fn export_private_key(&self, address: &Address) -> WalletResult<PrivateKey> {
        self.rpc.dump_private_key(address).map_err(|e| {
            if e.code().is_some() && is_unknown_key(&e) {
                WalletError::KeyNotAvailable { address: address.to_string() }
            } else {
                e.classify()
            }
        })
    }

    fn import_private_key(&self, key: &PrivateKey) -> WalletResult<()> {
        self.rpc.import_private_key(key).map_err(RpcError::classify)?;
        info!(network = ?key.network, compressed = key.compressed, "private key imported");
        Ok(())
    }

    fn network(&self) -> Network { self.network }

    fn build_transaction(&self, outputs: Vec<TxOut>, fee_rate_per_kb: Amount, change_address: &Address) -> WalletResult<FundedTx> {
        self.check_network(change_address)?;
        let mut utxos = self.list_unspent_outputs(true)?;
        utxos.sort_by(largest_first);
        build_tx_from_outputs(&utxos, outputs, fee_rate_per_kb, change_address.script_pubkey())
    }

    fn sign_transaction(&self, tx: &Transaction) -> WalletResult<(Transaction, bool)> {
        let SignedTx { tx: signed, complete } = if self.dialect.needs_hints() {
            let hints = self.prevout_hints(tx)?;
            self.rpc.sign_raw_transaction(tx, &hints)
        } else {
            self.rpc.sign_raw_transaction_with_wallet(tx, None)
        }
        .map_err(RpcError::classify)?;

        if !complete {
            warn!(txid = %signed.compute_txid(), backend = %self.backend, "transaction only partially signed");
        }
        Ok((signed, complete))
    }

    fn build_and_sign_transaction(&self, outputs: Vec<TxOut>, fee_rate_per_kb: Amount, change_address: &Address) -> WalletResult<Transaction> {
        let funded = self.build_transaction(outputs, fee_rate_per_kb, change_address)?;
        let (signed, complete) = self.sign_transaction(&funded.tx)?;
        if !complete {
            return Err(WalletError::PartialSignature { txid: signed.compute_txid() });
        }
        Ok(signed)
    }

    fn broadcast(&self, tx: &Transaction, allow_high_fees: bool) -> WalletResult<Txid> {
        let txid = tx.compute_txid();
        match self.rpc.send_raw_transaction(tx, allow_high_fees, self.backend) {
            Ok(sent) => {
                info!(txid = %sent, allow_high_fees, "transaction broadcast");
                Ok(sent)
            }
            Err(RpcError::Server { code, message }) if code != RPC_METHOD_NOT_FOUND => {
                Err(WalletError::RelayRejected { txid, reason: message })
            }
            Err(e) => Err(e.classify()),
        }
    }

    fn list_unspent_outputs(&self, only_spendable: bool) -> WalletResult<Vec<Utxo>> {
        let entries = self.rpc.list_unspent().map_err(RpcError::classify)?;
        Ok(results_to_utxos(entries, only_spendable))
    }

    fn query_confirmation(&self, txid: &Txid, pk_script: &Script) -> WalletResult<(Option<TxConfirmation>, TxStatus)> {
        let req = ConfRequest::new(*txid, pk_script)?;
        let (conf, raw) = self.rpc.tx_conf_details(&req, self.backend.tx_not_found_msg()).map_err(|e| {
            if e.message().contains("txindex") {
                WalletError::IndexUnavailable(e.message().to_string())
            } else {
                e.classify()
            }
        })?;
        let status = map_conf_status(raw);
        debug!(%txid, ?status, height = conf.as_ref().map(|c| c.block_height), "confirmation queried");
        Ok((conf, status))
    }

    fn sign_ownership_proof(&self, message: &[u8], address: &Address) -> WalletResult<Witness> {
        bip322::sign_native_segwit(&self.rpc, message, address)
    }
}
