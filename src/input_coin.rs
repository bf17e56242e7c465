//! UTXO input candidates.

use std::cmp::Ordering;

use bitcoin::{Amount, FeeRate, OutPoint, SignedAmount, Transaction};

use crate::output_group::CoinSelectionParams;

/// A spendable output considered as a transaction input.
///
/// Carries the nominal value of the output along with the pre-computed cost
/// of spending it at the current and long-term fee rates.  Identity is the
/// outpoint alone: two coins referencing the same outpoint compare equal no
/// matter what the remaining fields hold, which is what keeps a
/// [`SelectionResult`](crate::SelectionResult) free of duplicates.
#[derive(Clone, Debug)]
pub struct InputCoin {
    /// The outpoint identifying this coin.
    pub outpoint: OutPoint,
    /// Nominal value of the output.
    pub value: Amount,
    /// The amount this coin contributes toward a target once its own spend
    /// fee is paid: `value - fee`.  Equal to `value` when the recipient pays
    /// the fees instead.
    pub effective_value: SignedAmount,
    /// Cost of spending this coin at the current fee rate.
    pub fee: SignedAmount,
    /// Cost of spending this coin at the long-term fee rate.
    pub long_term_fee: SignedAmount,
    /// Estimated size of this output as a fully-signed input, in virtual
    /// bytes.  `-1` when the size could not be calculated.
    pub input_bytes: i32,
}

impl InputCoin {
    /// Creates a coin for `outpoint`, deriving its spend fees from
    /// `input_bytes` and the fee rates in `params`.
    ///
    /// An unknown input size (`input_bytes < 0`) yields zero fees.  Returns
    /// `None` if a fee calculation overflows or `value` cannot be
    /// represented as a signed amount.
    pub fn new(
        outpoint: OutPoint,
        value: Amount,
        input_bytes: i32,
        params: &CoinSelectionParams,
    ) -> Option<InputCoin> {
        let fee = spend_fee(params.effective_feerate, input_bytes)?;
        let long_term_fee = spend_fee(params.long_term_feerate, input_bytes)?;

        let effective_value = if params.subtract_fee_outputs {
            value.to_signed().ok()?
        } else {
            value.to_signed().ok()?.checked_sub(fee)?
        };

        Some(InputCoin { outpoint, value, effective_value, fee, long_term_fee, input_bytes })
    }

    /// Creates a coin from output `index` of the funding transaction `tx`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the transaction outputs.
    pub fn from_transaction(
        tx: &Transaction,
        index: usize,
        input_bytes: i32,
        params: &CoinSelectionParams,
    ) -> Option<InputCoin> {
        let output = &tx.output[index];
        InputCoin::new(OutPoint::new(tx.compute_txid(), index as u32), output.value, input_bytes, params)
    }
}

fn spend_fee(fee_rate: FeeRate, input_bytes: i32) -> Option<SignedAmount> {
    if input_bytes < 0 {
        return Some(SignedAmount::ZERO);
    }
    fee_rate.fee_vb(input_bytes as u64)?.to_signed().ok()
}

impl PartialEq for InputCoin {
    fn eq(&self, other: &InputCoin) -> bool { self.outpoint == other.outpoint }
}

impl Eq for InputCoin {}

impl Ord for InputCoin {
    fn cmp(&self, other: &InputCoin) -> Ordering { self.outpoint.cmp(&other.outpoint) }
}

impl PartialOrd for InputCoin {
    fn partial_cmp(&self, other: &InputCoin) -> Option<Ordering> { Some(self.cmp(other)) }
}
