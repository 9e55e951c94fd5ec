//! BIP322 simple signatures for native segwit (p2wpkh) addresses.
//!
//! ```text
//! to_spend:  in  = 000…000:0xffffffff, scriptSig = OP_0 <tagged_hash(msg)>
//!            out = 0 sat → address script
//! to_sign:   in  = to_spend:0, witness = proof
//!            out = 0 sat → OP_RETURN
//! ```
//!
//! Nothing here is ever broadcast; both transactions only exist to be signed.

use crate::error::{WalletError, WalletResult};
use crate::wallet::rpc::{SignInputHint, WalletRpc};
use bitcoin::absolute::LockTime;
use bitcoin::ecdsa::Signature;
use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::opcodes::all::{OP_PUSHBYTES_0, OP_RETURN};
use bitcoin::script::Builder;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use tracing::debug;

const TAG: &[u8] = b"BIP0322-signed-message";

/// `SHA256(SHA256(tag) ‖ SHA256(tag) ‖ message)`
pub fn message_hash(message: &[u8]) -> sha256::Hash {
    let tag = sha256::Hash::hash(TAG);
    let mut engine = sha256::Hash::engine();
    engine.input(tag.as_byte_array());
    engine.input(tag.as_byte_array());
    engine.input(message);
    sha256::Hash::from_engine(engine)
}

pub fn to_spend_tx(message: &[u8], script_pubkey: &Script) -> Transaction {
    let script_sig = Builder::new()
        .push_opcode(OP_PUSHBYTES_0)
        .push_slice(message_hash(message).to_byte_array())
        .into_script();
    Transaction {
        version: Version(0),
        lock_time: LockTime::ZERO,
        input: vec![TxIn { previous_output: OutPoint::null(), script_sig, sequence: Sequence::ZERO, witness: Witness::new() }],
        output: vec![TxOut { value: Amount::ZERO, script_pubkey: script_pubkey.to_owned() }],
    }
}

pub fn to_sign_tx(to_spend: &Transaction) -> Transaction {
    Transaction {
        version: Version(0),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: to_spend.compute_txid(), vout: 0 },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut { value: Amount::ZERO, script_pubkey: Builder::new().push_opcode(OP_RETURN).into_script() }],
    }
}

/// Has the wallet behind `rpc` sign a proof that it controls `address`.
///
/// Requires an unlocked wallet that owns the address. Non-p2wpkh addresses are
/// rejected before any RPC is made.
pub fn sign_native_segwit<R: WalletRpc + ?Sized>(rpc: &R, message: &[u8], address: &Address) -> WalletResult<Witness> {
    let to_spend = to_spend_tx(message, &address.script_pubkey());
    let spk = &to_spend.output[0].script_pubkey;
    if !spk.is_p2wpkh() {
        return Err(WalletError::UnsupportedAddressType { address: address.to_string() });
    }

    let to_sign = to_sign_tx(&to_spend);
    // the to_spend output is never broadcast, its value does not matter
    let hint = SignInputHint {
        outpoint: OutPoint { txid: to_spend.compute_txid(), vout: 0 },
        script_pubkey: spk.clone(),
        amount: Amount::ZERO,
    };

    let signed = rpc.sign_raw_transaction_with_wallet(&to_sign, Some(std::slice::from_ref(&hint))).map_err(|e| e.classify())?;
    if !signed.complete {
        return Err(WalletError::NotWalletControlled { address: address.to_string() });
    }
    debug!(%address, "bip322 proof signed");

    signed
        .tx
        .input
        .first()
        .map(|i| i.witness.clone())
        .ok_or_else(|| WalletError::InvalidTransaction("signed bip322 tx has no inputs".into()))
}

/// Checks a p2wpkh proof produced by [`sign_native_segwit`].
pub fn verify_native_segwit(message: &[u8], address: &Address, witness: &Witness) -> WalletResult<bool> {
    let to_spend = to_spend_tx(message, &address.script_pubkey());
    let spk = &to_spend.output[0].script_pubkey;
    if !spk.is_p2wpkh() {
        return Err(WalletError::UnsupportedAddressType { address: address.to_string() });
    }
    if witness.len() != 2 {
        return Ok(false);
    }
    let (Some(sig), Some(key)) = (witness.nth(0), witness.nth(1)) else {
        return Ok(false);
    };
    let (Ok(sig), Ok(key)) = (Signature::from_slice(sig), CompressedPublicKey::from_slice(key)) else {
        return Ok(false);
    };
    if ScriptBuf::new_p2wpkh(&key.wpubkey_hash()) != *spk {
        return Ok(false);
    }

    let to_sign = to_sign_tx(&to_spend);
    let sighash = SighashCache::new(&to_sign)
        .p2wpkh_signature_hash(0, spk, Amount::ZERO, sig.sighash_type)
        .map_err(|e| WalletError::InvalidTransaction(format!("bip322 sighash: {e}")))?;
    let msg = Message::from_digest(sighash.to_byte_array());
    Ok(Secp256k1::verification_only().verify_ecdsa(&msg, &sig.signature, &key.0).is_ok())
}
