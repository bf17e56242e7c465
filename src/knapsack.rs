// SPDX-License-Identifier: CC0-1.0
//
//! Knapsack coin selection.
//!
//! The original wallet selection algorithm, kept as the fallback for targets
//! the branch and bound search cannot meet without change.

use std::cmp::Reverse;

use bitcoin::{Amount, SignedAmount};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::OverflowError::Addition;
use crate::errors::SelectionError::{self, InsufficientFunds, Overflow};
use crate::output_group::OutputGroup;
use crate::{SelectionResult, MIN_CHANGE};

/// Number of rounds the stochastic approximation runs before settling.
pub const ITERATIONS: u32 = 1_000;

/// Selects coins that sum to the target exactly, or to a near-minimal total
/// above `target + MIN_CHANGE`.
///
/// The pool is shuffled first; repeated calls over the same pool spend
/// different coins, which leaks less about the wallet than a fixed order
/// would.  The walk over the shuffled pool settles the easy outcomes
/// directly:
///
/// * a group matching `target` exactly is returned on the spot;
/// * groups below `target + MIN_CHANGE` are collected as candidates;
/// * of the rest, the smallest is remembered as `lowest_larger`.
///
/// If the candidates sum to the target they are all taken; if they sum below
/// it the answer is `lowest_larger` or failure.  Otherwise
/// [`approximate_best_subset`] searches the candidates for the smallest
/// total at or above the target, rerunning against `target + MIN_CHANGE`
/// when the first pass cannot hit the target exactly, so that whatever
/// excess remains is large enough to be worth a change output.  A single
/// larger coin beats the approximated subset when the subset neither hits
/// the target nor leaves room for change, or when the coin is no more
/// expensive.
///
/// # Returns
///
/// The selected coins and their nominal value.  The total is at least
/// `target`; it is short of `target + MIN_CHANGE` only when it is an exact
/// hit or the pool offers nothing better.
///
/// # Errors
///
/// * `InsufficientFunds` if every coin sits below the target and their sum
///   does too
/// * `Overflow` if `target + MIN_CHANGE` leaves the representable range
pub fn knapsack_solver<R: Rng + ?Sized>(
    target: Amount,
    groups: &mut [OutputGroup],
    rng: &mut R,
) -> Result<SelectionResult, SelectionError> {
    let target = target.to_signed().map_err(|_| Overflow(Addition))?;
    let min_change = SignedAmount::from_sat(MIN_CHANGE.to_sat() as i64);
    let target_with_change = target.checked_add(min_change).ok_or(Overflow(Addition))?;

    groups.shuffle(rng);

    let mut result = SelectionResult::new();
    let mut applicable_groups: Vec<&OutputGroup> = Vec::new();
    let mut lower_total = SignedAmount::ZERO;
    let mut lowest_larger: Option<&OutputGroup> = None;

    for group in groups.iter() {
        let amount = group.get_selection_amount();
        if amount == target {
            result.add_input(group);
            return Ok(result);
        } else if amount < target_with_change {
            applicable_groups.push(group);
            lower_total = lower_total.checked_add(amount).ok_or(Overflow(Addition))?;
        } else if lowest_larger.map_or(true, |l| amount < l.get_selection_amount()) {
            lowest_larger = Some(group);
        }
    }

    if lower_total == target {
        for group in &applicable_groups {
            result.add_input(group);
        }
        return Ok(result);
    }

    if lower_total < target {
        match lowest_larger {
            Some(group) => {
                result.add_input(group);
                return Ok(result);
            }
            None => return Err(InsufficientFunds),
        }
    }

    // Solve subset sum by stochastic approximation.
    applicable_groups.sort_by_key(|group| Reverse(group.get_selection_amount()));
    let mut best = Vec::new();
    let mut best_total = lower_total;

    approximate_best_subset(rng, &applicable_groups, lower_total, target, &mut best, &mut best_total);
    if best_total != target && lower_total >= target_with_change {
        approximate_best_subset(
            rng,
            &applicable_groups,
            lower_total,
            target_with_change,
            &mut best,
            &mut best_total,
        );
    }

    // A single bigger coin wins when the approximation neither hit the
    // target nor left room for a worthwhile change output, or when the coin
    // costs no more than the subset.
    if let Some(group) = lowest_larger {
        if (best_total != target && best_total < target_with_change)
            || group.get_selection_amount() <= best_total
        {
            result.add_input(group);
            return Ok(result);
        }
    }

    for (index, group) in applicable_groups.iter().enumerate() {
        if best[index] {
            result.add_input(group);
        }
    }
    debug!(
        "knapsack best subset: {:?} total {}",
        applicable_groups
            .iter()
            .zip(&best)
            .filter(|(_, included)| **included)
            .map(|(group, _)| group.value)
            .collect::<Vec<_>>(),
        best_total,
    );

    Ok(result)
}

/// Randomized search for the subset of `groups` with the smallest total at
/// or above `target`.
///
/// Each round makes two passes: the first includes every group on a coin
/// flip, the second sweeps up whatever the first left out.  The moment the
/// running total crosses the target the subset is scored, the crossing group
/// is unselected, and the pass continues looking for a tighter fit.  The
/// randomness serves no security purpose; it only keeps rounds from
/// re-exploring one subset, with a privacy bonus over any fixed rule.
///
/// Overwrites `best`/`best_total` with the winning subset; starts from the
/// full set, so the caller must only read them when `total_lower >= target`.
fn approximate_best_subset<R: Rng + ?Sized>(
    rng: &mut R,
    groups: &[&OutputGroup],
    total_lower: SignedAmount,
    target: SignedAmount,
    best: &mut Vec<bool>,
    best_total: &mut SignedAmount,
) {
    let mut included = Vec::with_capacity(groups.len());

    best.clear();
    best.resize(groups.len(), true);
    *best_total = total_lower;

    for _ in 0..ITERATIONS {
        if *best_total == target {
            break;
        }

        included.clear();
        included.resize(groups.len(), false);
        let mut total = SignedAmount::ZERO;
        let mut reached_target = false;

        for pass in 0..2 {
            if reached_target {
                break;
            }
            for (index, group) in groups.iter().enumerate() {
                let include = if pass == 0 { rng.gen_bool(0.5) } else { !included[index] };
                if !include {
                    continue;
                }

                total += group.get_selection_amount();
                included[index] = true;
                if total >= target {
                    reached_target = true;
                    if total < *best_total {
                        *best_total = total;
                        best.clone_from(&included);
                    }
                    // Drop the crossing group and keep going; a later group
                    // may cross with a smaller overshoot.
                    total -= group.get_selection_amount();
                    included[index] = false;
                }
            }
        }
    }
}
