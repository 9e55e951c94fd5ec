//! Coin selection and unsigned transaction assembly.
//!
//! Largest-first selection over a live unspent snapshot. The fee depends on the
//! estimated virtual size, which depends on the chosen inputs, so selection is
//! repeated with the new fee target until the chosen inputs pay for themselves.
//!
//! ```text
//! target = Σ outputs
//! fee₀   = fee(size(1 × p2wpkh in, outputs + change))
//! loop:
//!   inputs  = largest-first until Σ ≥ target + feeᵢ      (or all of them)
//!   feeᵢ₊₁  = fee(size(inputs, outputs + change))
//!   Σ - target ≥ feeᵢ₊₁ → done, change = Σ - target - feeᵢ₊₁ unless dust
//!   all inputs taken    → InsufficientFunds
//! ```

use crate::error::{WalletError, WalletResult};
use crate::wallet::utxo::{InputType, Utxo};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use tracing::debug;

/// Relay fee the dust rule is evaluated against.
pub const DEFAULT_RELAY_FEE_PER_KB: Amount = Amount::from_sat(1000);

const WITNESS_SCALE_FACTOR: usize = 4;

// outpoint 36 + script len 1 + sequence 4, plus the scriptSig where it is not witness data
const P2PKH_INPUT_SIZE: usize = 32 + 4 + 1 + 107 + 4;
const P2WPKH_INPUT_SIZE: usize = 32 + 4 + 1 + 4;
const NESTED_P2WPKH_INPUT_SIZE: usize = 32 + 4 + 1 + 23 + 4;
const P2TR_INPUT_SIZE: usize = 32 + 4 + 1 + 4;

// item count + sig len + sig + key len + compressed key
const P2WPKH_WITNESS_WEIGHT: usize = 1 + 1 + 73 + 1 + 33;
// item count + sig len + schnorr sig
const P2TR_WITNESS_WEIGHT: usize = 1 + 1 + 65;

/// Result of a successful build. The transaction is unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundedTx {
    pub tx: Transaction,
    pub fee: Amount,
    pub input_value: Amount,
    pub change_index: Option<usize>,
}

pub fn var_int_size(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn output_size(script_len: usize) -> usize { 8 + var_int_size(script_len as u64) + script_len }

/// Upper bound on the virtual size of the signed transaction.
pub fn estimate_virtual_size(inputs: &[InputType], outputs: &[TxOut], change_script_len: Option<usize>) -> usize {
    let output_count = outputs.len() + usize::from(change_script_len.is_some());
    let mut base = 8 + var_int_size(inputs.len() as u64) + var_int_size(output_count as u64);
    base += outputs.iter().map(|o| output_size(o.script_pubkey.len())).sum::<usize>();
    base += change_script_len.map_or(0, output_size);

    let mut witness_inputs = 0;
    let mut witness = 0;
    for input in inputs {
        match input {
            InputType::P2pkh => base += P2PKH_INPUT_SIZE,
            InputType::P2wpkh => {
                base += P2WPKH_INPUT_SIZE;
                witness += P2WPKH_WITNESS_WEIGHT;
                witness_inputs += 1;
            }
            InputType::NestedP2wpkh => {
                base += NESTED_P2WPKH_INPUT_SIZE;
                witness += P2WPKH_WITNESS_WEIGHT;
                witness_inputs += 1;
            }
            InputType::P2tr => {
                base += P2TR_INPUT_SIZE;
                witness += P2TR_WITNESS_WEIGHT;
                witness_inputs += 1;
            }
        }
    }
    if witness_inputs > 0 {
        // segwit marker + flag
        witness += 2 + var_int_size(witness_inputs as u64);
    }
    base + witness.div_ceil(WITNESS_SCALE_FACTOR)
}

/// Fee for `vsize` bytes at `fee_rate_per_kb`; never zero for a positive rate.
pub fn fee_for_size(fee_rate_per_kb: Amount, vsize: usize) -> Amount {
    let rate = fee_rate_per_kb.to_sat();
    let fee = rate.saturating_mul(vsize as u64) / 1000;
    if fee == 0 && rate > 0 {
        return fee_rate_per_kb;
    }
    Amount::from_sat(fee.min(Amount::MAX_MONEY.to_sat()))
}

/// Below this an output costs more to spend than it is worth.
pub fn dust_threshold(script_len: usize, relay_fee_per_kb: Amount) -> Amount {
    // size of the output plus the p2pkh input that would later spend it
    let total_size = output_size(script_len) + P2PKH_INPUT_SIZE;
    let byte_fee = relay_fee_per_kb.to_sat() / 1000;
    Amount::from_sat(3 * total_size as u64 * byte_fee)
}

pub fn is_dust(amount: Amount, script_len: usize, relay_fee_per_kb: Amount) -> bool {
    amount < dust_threshold(script_len, relay_fee_per_kb)
}

fn sum(mut values: impl Iterator<Item = Amount>) -> WalletResult<Amount> {
    values.try_fold(Amount::ZERO, |acc, v| {
        acc.checked_add(v).ok_or_else(|| WalletError::InvalidTransaction("amount overflow".into()))
    })
}

/// Funds `outputs` from `utxos`, which must already be in selection order.
///
/// Outputs keep their order; change, when present, is appended last. Outputs whose
/// script type cannot be sized are not eligible.
pub fn build_tx_from_outputs(
    utxos: &[Utxo],
    outputs: Vec<TxOut>,
    fee_rate_per_kb: Amount,
    change_script: ScriptBuf,
) -> WalletResult<FundedTx> {
    if outputs.is_empty() {
        return Err(WalletError::InvalidTransaction("no outputs requested".into()));
    }

    let eligible: Vec<(&Utxo, InputType)> = utxos
        .iter()
        .filter_map(|u| InputType::of(u).map(|t| (u, t)))
        .collect();
    if eligible.is_empty() {
        return Err(WalletError::NoUsableFunds);
    }

    let target = sum(outputs.iter().map(|o| o.value))?;
    let available = sum(eligible.iter().map(|(u, _)| u.value))?;
    let change_len = change_script.len();

    let mut target_fee =
        fee_for_size(fee_rate_per_kb, estimate_virtual_size(&[InputType::P2wpkh], &outputs, Some(change_len)));

    let (selected, input_value, vsize, required_fee) = loop {
        let needed = target
            .checked_add(target_fee)
            .ok_or_else(|| WalletError::InvalidTransaction("amount overflow".into()))?;

        let mut selected = Vec::new();
        let mut input_value = Amount::ZERO;
        for (utxo, kind) in &eligible {
            if input_value >= needed {
                break;
            }
            selected.push((*utxo, *kind));
            input_value += utxo.value;
        }

        // the target fee is only a guess; price what was actually picked
        let kinds: Vec<InputType> = selected.iter().map(|(_, k)| *k).collect();
        let vsize = estimate_virtual_size(&kinds, &outputs, Some(change_len));
        let required_fee = fee_for_size(fee_rate_per_kb, vsize);
        let covers = input_value.checked_sub(target).is_some_and(|remaining| remaining >= required_fee);

        if covers {
            break (selected, input_value, vsize, required_fee);
        }
        if input_value < needed {
            // every eligible output is already selected
            let needed = target
                .checked_add(required_fee)
                .ok_or_else(|| WalletError::InvalidTransaction("amount overflow".into()))?;
            return Err(WalletError::InsufficientFunds { needed, available });
        }
        target_fee = required_fee;
    };

    let remaining = input_value - target;
    let change = remaining - required_fee;
    debug!(
        inputs = selected.len(),
        input_value = input_value.to_sat(),
        fee = required_fee.to_sat(),
        vsize,
        change = change.to_sat(),
        "selected inputs"
    );

    let mut tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: selected
            .iter()
            .map(|(u, _)| TxIn {
                previous_output: u.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs,
    };

    let mut change_index = None;
    if change > Amount::ZERO && !is_dust(change, change_len, DEFAULT_RELAY_FEE_PER_KB) {
        change_index = Some(tx.output.len());
        tx.output.push(TxOut { value: change, script_pubkey: change_script });
    }
    let fee = input_value - sum(tx.output.iter().map(|o| o.value))?;

    Ok(FundedTx { tx, fee, input_value, change_index })
}
