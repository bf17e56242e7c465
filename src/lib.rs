//! Wallet coin selection library.
//!
//! This library chooses which unspent transaction outputs (UTXOs) fund a
//! payment.  [`select_coins_bnb`] runs a branch and bound search for a
//! selection that needs no change output, minimizing a waste metric that
//! weighs today's fee rate against the long-term one.  [`knapsack_solver`]
//! is the randomized fallback that approximates the smallest selection
//! leaving room for a worthwhile change output, and [`select_coins_srd`]
//! draws a uniformly random selection.
//!
//! Callers describe each candidate as an [`InputCoin`], bundle coins that
//! must be spent together into [`OutputGroup`]s, and screen the groups with
//! a [`CoinEligibilityFilter`] before handing them to a selector.  All
//! amounts are exact integer satoshis and are expected to stay inside
//! `[-MAX_MONEY, MAX_MONEY]`; pools violating that range are reported as
//! overflow errors where they are caught at all.
//!
//! # Examples
//!
//! ```
//! use bitcoin::hashes::Hash;
//! use bitcoin::{Amount, OutPoint, Txid};
//! use wallet_coin_selection::{
//!     select_coins_bnb, CoinSelectionParams, InputCoin, OutputGroup,
//! };
//!
//! let params = CoinSelectionParams::default();
//! let mut pool: Vec<OutputGroup> = [5_000u64, 10_000]
//!     .iter()
//!     .enumerate()
//!     .map(|(index, value)| {
//!         let outpoint = OutPoint::new(Txid::all_zeros(), index as u32);
//!         let coin = InputCoin::new(outpoint, Amount::from_sat(*value), 0, &params).unwrap();
//!         let mut group = OutputGroup::new(&params);
//!         group.insert(coin, 6, true, 0, 0, true);
//!         group
//!     })
//!     .collect();
//!
//! let result =
//!     select_coins_bnb(&mut pool, Amount::from_sat(15_000), Amount::ZERO, Amount::ZERO).unwrap();
//! assert_eq!(result.selected_value(), Amount::from_sat(15_000));
//! ```

// Coding conventions.
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]
// Experimental features we need.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod branch_and_bound;
mod errors;
mod input_coin;
mod output_group;

#[cfg(feature = "rand")]
mod knapsack;
#[cfg(feature = "rand")]
mod single_random_draw;

use std::collections::BTreeSet;

use bitcoin::Amount;
#[cfg(feature = "rand")]
use bitcoin::SignedAmount;
#[cfg(feature = "rand")]
use rand::Rng;

pub use crate::branch_and_bound::{select_coins_bnb, TOTAL_TRIES};
pub use crate::errors::{OverflowError, SelectionError};
pub use crate::input_coin::InputCoin;
#[cfg(feature = "rand")]
pub use crate::knapsack::{knapsack_solver, ITERATIONS};
pub use crate::output_group::{CoinEligibilityFilter, CoinSelectionParams, OutputGroup};
#[cfg(feature = "rand")]
pub use crate::single_random_draw::select_coins_srd;

/// Target minimum change amount: one hundredth of a coin.
///
/// Below this, leftover value is better forfeited to fees than kept as a
/// change output.
pub const MIN_CHANGE: Amount = Amount::from_sat(1_000_000);

/// Final minimum change amount after paying for fees.
pub const MIN_FINAL_CHANGE: Amount = Amount::from_sat(1_000_000 / 2);

/// Lower bound a random draw budgets for its change output.
pub const CHANGE_LOWER: Amount = Amount::from_sat(50_000);

/// Set of inputs chosen by one selection run, unique by outpoint, together
/// with the value they carry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionResult {
    selected_inputs: BTreeSet<InputCoin>,
}

impl SelectionResult {
    /// Creates an empty selection.
    pub fn new() -> SelectionResult { SelectionResult::default() }

    /// Adds every coin of `group` to the selection.
    pub fn add_input(&mut self, group: &OutputGroup) {
        for coin in &group.outputs {
            self.selected_inputs.insert(coin.clone());
        }
    }

    /// Sum of the nominal values of the selected coins.
    pub fn selected_value(&self) -> Amount {
        self.selected_inputs.iter().map(|coin| coin.value).fold(Amount::ZERO, |acc, v| acc + v)
    }

    /// The selected coins, ordered by outpoint.
    pub fn selected_inputs(&self) -> &BTreeSet<InputCoin> { &self.selected_inputs }

    /// Iterates over the selected coins.
    pub fn iter(&self) -> impl Iterator<Item = &InputCoin> { self.selected_inputs.iter() }

    /// Number of selected coins.
    pub fn len(&self) -> usize { self.selected_inputs.len() }

    /// Whether nothing has been selected.
    pub fn is_empty(&self) -> bool { self.selected_inputs.is_empty() }

    /// Drops the selection.
    pub fn clear(&mut self) { self.selected_inputs.clear() }
}

/// Selects coins that pay for `target`, preferring a changeless solution.
///
/// Tries [`select_coins_bnb`] over the groups contributing a positive
/// amount; when no changeless selection exists, falls back to
/// [`knapsack_solver`] over the full pool.  `groups` may be reordered.
/// Overflow failures are reported instead of triggering the fallback.
///
/// `not_input_fees` only raises the branch and bound target; the knapsack
/// target is the spend alone, since its fee shortfall is settled by the
/// caller iterating transaction construction.
#[cfg(feature = "rand")]
#[cfg_attr(docsrs, doc(cfg(feature = "rand")))]
pub fn select_coins<R: Rng + ?Sized>(
    target: Amount,
    cost_of_change: Amount,
    not_input_fees: Amount,
    groups: &mut [OutputGroup],
    rng: &mut R,
) -> Result<SelectionResult, SelectionError> {
    let mut positive_groups: Vec<OutputGroup> = groups
        .iter()
        .filter(|group| group.get_selection_amount() > SignedAmount::ZERO)
        .cloned()
        .collect();

    match select_coins_bnb(&mut positive_groups, target, cost_of_change, not_input_fees) {
        Ok(result) => Ok(result),
        Err(SelectionError::Overflow(op)) => Err(SelectionError::Overflow(op)),
        Err(_) => knapsack_solver(target, groups, rng),
    }
}
