// SPDX-License-Identifier: CC0-1.0
//
//! Branch and bound coin selection.
//!
//! This module introduces the Branch and Bound Coin Selection Algorithm.

use std::cmp::Reverse;

use bitcoin::amount::CheckedSum;
use bitcoin::{Amount, SignedAmount};

use crate::errors::OverflowError::Addition;
use crate::errors::SelectionError::{self, InsufficientFunds, Overflow, SolutionNotFound};
use crate::output_group::OutputGroup;
use crate::SelectionResult;

/// Number of search iterations before the algorithm gives up.
///
/// Bounds the worst-case latency of a selection; the search tree itself grows
/// exponentially with the pool size.
pub const TOTAL_TRIES: u32 = 100_000;

/// Performs a depth first branch and bound search for a changeless selection.
///
/// The search traverses a binary tree whose depth `d` decision is whether the
/// `d`-th largest group is part of the selection.  A selection is acceptable
/// when the amounts it contributes sum to a total `S` with
/// `target + not_input_fees <= S <= target + not_input_fees + cost_of_change`:
/// at least the spend plus the fixed transaction overhead, and over it by no
/// more than it would cost to make a change output.  Any excess inside that
/// window is forfeited to fees, which is still cheaper than creating and
/// later spending change.
///
/// Among acceptable selections the search minimizes waste:
///
/// ```text
/// waste = sum(fee - long_term_fee) over the selection + (S - target - not_input_fees)
/// ```
///
/// The first term prices spending inputs now instead of later; it is negative
/// in a low fee environment, where consolidating early is a saving.  The
/// second term is the forfeited excess.
///
/// The pool is sorted largest first and the inclusion branch is explored
/// before the omission branch, so totals grow as fast as possible and
/// overshooting subtrees are cut early.  A running lookahead of the undecided
/// groups' total prunes subtrees that can no longer reach the target.  When a
/// group repeats the amount and fee of an omitted predecessor, its inclusion
/// subtree is skipped as already explored.
///
/// # Parameters
///
/// * `utxo_pool`: candidate groups; reordered in place, and every group must
///   contribute a strictly positive amount
/// * `target`: the value to select for
/// * `cost_of_change`: upper slack of the acceptance window
/// * `not_input_fees`: fixed fee overhead added on top of `target`
///
/// # Returns
///
/// The acceptable selection with the least waste found within the try
/// budget.  The value carried by the result is the sum of the selected
/// coins' nominal values, not of their effective values.
///
/// # Errors
///
/// * `InsufficientFunds` if the pool is empty or sums below the target
/// * `SolutionNotFound` if no subset lands inside the acceptance window
/// * `Overflow` if the target or window bound leaves the representable range
pub fn select_coins_bnb(
    utxo_pool: &mut [OutputGroup],
    target: Amount,
    cost_of_change: Amount,
    not_input_fees: Amount,
) -> Result<SelectionResult, SelectionError> {
    if utxo_pool.is_empty() {
        return Err(InsufficientFunds);
    }

    let actual_target = target
        .checked_add(not_input_fees)
        .and_then(|t| t.to_signed().ok())
        .ok_or(Overflow(Addition))?
        .to_sat();
    let upper_bound = cost_of_change
        .to_signed()
        .ok()
        .and_then(|c| actual_target.checked_add(c.to_sat()))
        .ok_or(Overflow(Addition))?;

    // Largest first exploration starts from a descending sort.
    utxo_pool.sort_by_key(|group| Reverse(group.get_selection_amount()));

    // Total of the groups not yet given an include/omit decision.  Summed
    // once with overflow checked; every later step only moves value between
    // this lookahead and curr_value, so the loop arithmetic stays in bounds.
    let mut curr_available_value = utxo_pool
        .iter()
        .map(|group| group.get_selection_amount())
        .checked_sum()
        .ok_or(Overflow(Addition))?
        .to_sat();

    if curr_available_value < actual_target {
        return Err(InsufficientFunds);
    }

    // The waste bound only prunes while adding a group cannot lower the
    // waste, i.e. while spending now costs more than spending later.  The
    // largest group stands in for the whole pool; a pool mixing premium
    // signs never prunes on waste.
    let first_fee_premium = (utxo_pool[0].fee - utxo_pool[0].long_term_fee).to_sat();

    let mut curr_value: i64 = 0;
    let mut curr_waste: i64 = 0;
    let mut curr_selection: Vec<bool> = Vec::with_capacity(utxo_pool.len());
    let mut best_selection: Vec<bool> = Vec::new();
    let mut best_waste: i64 = SignedAmount::MAX_MONEY.to_sat();

    for _ in 0..TOTAL_TRIES {
        let mut backtrack = false;

        if curr_value + curr_available_value < actual_target
            || curr_value > upper_bound
            || (curr_waste > best_waste && first_fee_premium > 0)
        {
            // The remaining groups cannot reach the target, the total
            // overshot the window, or the waste can only get worse.
            backtrack = true;
        } else if curr_value >= actual_target {
            // Inside the window.  The excess over the target is forfeited to
            // fees, so it counts toward this candidate's waste; it is backed
            // out again before other subsets are tried.
            curr_waste += curr_value - actual_target;
            if curr_waste <= best_waste {
                best_selection.clone_from(&curr_selection);
                best_selection.resize(utxo_pool.len(), false);
                best_waste = curr_waste;
            }
            curr_waste -= curr_value - actual_target;
            backtrack = true;
        }

        if backtrack {
            // Walk back over the omitted groups, returning them to the
            // lookahead, until the most recent inclusion is found.
            while curr_selection.last() == Some(&false) {
                curr_selection.pop();
                curr_available_value +=
                    utxo_pool[curr_selection.len()].get_selection_amount().to_sat();
            }

            match curr_selection.last_mut() {
                // Both branches of every decision have been tried.
                None => break,
                // Flip the inclusion to its omission branch.
                Some(selected) => {
                    *selected = false;
                    let utxo = &utxo_pool[curr_selection.len() - 1];
                    curr_value -= utxo.get_selection_amount().to_sat();
                    curr_waste -= (utxo.fee - utxo.long_term_fee).to_sat();
                }
            }
        } else {
            // Descend, trying the inclusion branch first.
            let depth = curr_selection.len();
            let utxo = &utxo_pool[depth];
            let amount = utxo.get_selection_amount().to_sat();
            assert!(amount > 0);

            curr_available_value -= amount;

            if curr_selection.last() == Some(&false)
                && utxo.get_selection_amount() == utxo_pool[depth - 1].get_selection_amount()
                && utxo.fee == utxo_pool[depth - 1].fee
            {
                // The previous group was this group's twin and was omitted;
                // including this one would re-explore the twin's subtree.
                curr_selection.push(false);
            } else {
                curr_selection.push(true);
                curr_value += amount;
                curr_waste += (utxo.fee - utxo.long_term_fee).to_sat();
            }
        }
    }

    if best_selection.is_empty() {
        return Err(SolutionNotFound);
    }

    let mut result = SelectionResult::new();
    for (index, include) in best_selection.iter().enumerate() {
        if *include {
            result.add_input(&utxo_pool[index]);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::iter::once;

    use bitcoin::FeeRate;

    use super::*;
    use crate::output_group::CoinSelectionParams;
    use crate::test_util::{add_coin, add_coin_with_bytes, build_pool, sorted_values};

    const CENT: u64 = 1_000_000;

    fn assert_coin_select(target: u64, expected: &[u64]) {
        let params = CoinSelectionParams::default();
        let mut pool = build_pool(&[CENT, 2 * CENT, 3 * CENT, 4 * CENT], &params);

        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(target),
            Amount::from_sat(CENT / 2),
            Amount::ZERO,
        )
        .unwrap();

        assert_eq!(sorted_values(&result), expected);
        assert_eq!(result.selected_value(), Amount::from_sat(expected.iter().sum()));
    }

    #[test]
    fn select_one_cent() { assert_coin_select(CENT, &[CENT]); }

    #[test]
    fn select_two_cent() { assert_coin_select(2 * CENT, &[2 * CENT]); }

    #[test]
    fn select_three_cent() { assert_coin_select(3 * CENT, &[CENT, 2 * CENT]); }

    #[test]
    fn select_four_cent() { assert_coin_select(4 * CENT, &[CENT, 3 * CENT]); }

    #[test]
    fn select_five_cent() { assert_coin_select(5 * CENT, &[2 * CENT, 3 * CENT]); }

    #[test]
    fn select_six_cent() { assert_coin_select(6 * CENT, &[CENT, 2 * CENT, 3 * CENT]); }

    #[test]
    fn select_seven_cent() { assert_coin_select(7 * CENT, &[CENT, 2 * CENT, 4 * CENT]); }

    #[test]
    fn select_eight_cent() { assert_coin_select(8 * CENT, &[CENT, 3 * CENT, 4 * CENT]); }

    #[test]
    fn select_nine_cent() { assert_coin_select(9 * CENT, &[2 * CENT, 3 * CENT, 4 * CENT]); }

    #[test]
    fn select_ten_cent() {
        assert_coin_select(10 * CENT, &[CENT, 2 * CENT, 3 * CENT, 4 * CENT]);
    }

    #[test]
    fn empty_pool() {
        let mut pool: Vec<OutputGroup> = Vec::new();
        let result = select_coins_bnb(&mut pool, Amount::from_sat(CENT), Amount::ZERO, Amount::ZERO);
        assert_eq!(result, Err(InsufficientFunds));
    }

    #[test]
    fn target_greater_than_pool() {
        let params = CoinSelectionParams::default();
        let mut pool = build_pool(&[CENT, 2 * CENT, 3 * CENT, 4 * CENT], &params);

        let result =
            select_coins_bnb(&mut pool, Amount::from_sat(11 * CENT), Amount::ZERO, Amount::ZERO);
        assert_eq!(result, Err(InsufficientFunds));
    }

    #[test]
    fn cost_of_change_window() {
        let params = CoinSelectionParams::default();

        let mut pool = build_pool(&[3 * CENT / 2], &params);
        let result =
            select_coins_bnb(&mut pool, Amount::from_sat(CENT), Amount::from_sat(CENT), Amount::ZERO)
                .unwrap();
        assert_eq!(result.selected_value(), Amount::from_sat(3 * CENT / 2));

        let mut pool = build_pool(&[3 * CENT / 2], &params);
        let result = select_coins_bnb(&mut pool, Amount::from_sat(CENT), Amount::ZERO, Amount::ZERO);
        assert_eq!(result, Err(SolutionNotFound));
    }

    #[test]
    fn not_input_fees_raise_the_target() {
        let params = CoinSelectionParams::default();

        let mut pool = build_pool(&[CENT], &params);
        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(CENT),
            Amount::ZERO,
            Amount::from_sat(1),
        );
        assert_eq!(result, Err(InsufficientFunds));

        let mut pool = build_pool(&[CENT], &params);
        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(CENT - 100),
            Amount::ZERO,
            Amount::from_sat(100),
        )
        .unwrap();
        assert_eq!(result.selected_value(), Amount::from_sat(CENT));
    }

    #[test]
    fn spend_fee_shrinks_contribution() {
        // The coin is worth the target nominally, but not once its own spend
        // fee is paid.
        let params = CoinSelectionParams {
            effective_feerate: FeeRate::from_sat_per_vb_unchecked(1),
            ..Default::default()
        };
        let mut pool = Vec::new();
        add_coin_with_bytes(Amount::from_sat(CENT), 0, 100, &params, &mut pool);

        let result = select_coins_bnb(&mut pool, Amount::from_sat(CENT), Amount::ZERO, Amount::ZERO);
        assert_eq!(result, Err(InsufficientFunds));
    }

    #[test]
    fn prefers_lower_fee_premium_on_equal_contribution() {
        // Both coins contribute the same amount; the cheaper-to-spend one
        // must win on waste, whichever order the pool arrives in.
        let params = CoinSelectionParams {
            effective_feerate: FeeRate::from_sat_per_vb_unchecked(1),
            ..Default::default()
        };

        for flipped in [false, true] {
            let mut pool = Vec::new();
            add_coin_with_bytes(Amount::from_sat(5_100), 0, 100, &params, &mut pool);
            add_coin_with_bytes(Amount::from_sat(5_200), 1, 200, &params, &mut pool);
            if flipped {
                pool.reverse();
            }

            let result = select_coins_bnb(
                &mut pool,
                Amount::from_sat(5_000),
                Amount::from_sat(10),
                Amount::ZERO,
            )
            .unwrap();
            assert_eq!(result.selected_value(), Amount::from_sat(5_100));
        }
    }

    #[test]
    fn expensive_fees_favor_small_input_sets() {
        let params = CoinSelectionParams {
            effective_feerate: FeeRate::from_sat_per_vb_unchecked(2),
            long_term_feerate: FeeRate::from_sat_per_vb_unchecked(1),
            ..Default::default()
        };
        let mut pool = Vec::new();
        for (index, value) in [3_000u64, 4_000, 5_000, 8_000].iter().enumerate() {
            add_coin_with_bytes(Amount::from_sat(*value), index as u32, 1_000, &params, &mut pool);
        }

        // Effective values are 1000, 2000, 3000 and 6000.  Both {6000} and
        // {1000, 2000, 3000} hit the target exactly; the single input
        // carries a third of the fee premium.
        let result =
            select_coins_bnb(&mut pool, Amount::from_sat(6_000), Amount::ZERO, Amount::ZERO)
                .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.selected_value(), Amount::from_sat(8_000));
    }

    #[test]
    fn cheap_fees_favor_consolidation() {
        // Spending now costs less than spending later, so a bigger input set
        // with the same total contribution wins on waste.
        let params = CoinSelectionParams {
            effective_feerate: FeeRate::from_sat_per_vb_unchecked(1),
            long_term_feerate: FeeRate::from_sat_per_vb_unchecked(2),
            ..Default::default()
        };
        let mut pool = Vec::new();
        for (index, value) in [3_000u64, 4_000, 5_000, 6_000].iter().enumerate() {
            add_coin_with_bytes(Amount::from_sat(*value), index as u32, 1_000, &params, &mut pool);
        }

        // Effective values are 2000..5000.  {5000, 4000} and
        // {4000, 3000, 2000} both hit 9000 exactly; every added input makes
        // the premium more negative, so the bigger set wins.
        let result =
            select_coins_bnb(&mut pool, Amount::from_sat(9_000), Amount::ZERO, Amount::ZERO)
                .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.selected_value(), Amount::from_sat(12_000));
    }

    #[test]
    fn identical_groups_collapse_to_one_subtree() {
        // A hundred twins and no acceptable window: without the equivalence
        // skip this search could not exhaust inside the try budget.
        let params = CoinSelectionParams::default();
        let mut pool = Vec::new();
        for index in 0..100 {
            add_coin(Amount::from_sat(CENT), index, &params, &mut pool);
        }

        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(CENT + CENT / 2),
            Amount::from_sat(CENT / 4),
            Amount::ZERO,
        );
        assert_eq!(result, Err(SolutionNotFound));

        // The pair target is still found among the twins.
        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(2 * CENT),
            Amount::ZERO,
            Amount::ZERO,
        )
        .unwrap();
        assert_eq!(result.selected_value(), Amount::from_sat(2 * CENT));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let params = CoinSelectionParams::default();
        let values: Vec<u64> = (1..=10).map(|i| i * 1_000 + 7).collect();

        let mut first = build_pool(&values, &params);
        let mut second = build_pool(&values, &params);

        let a = select_coins_bnb(
            &mut first,
            Amount::from_sat(12_345),
            Amount::from_sat(800),
            Amount::ZERO,
        );
        let b = select_coins_bnb(
            &mut second,
            Amount::from_sat(12_345),
            Amount::from_sat(800),
            Amount::ZERO,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn exhausts_the_try_budget() {
        // Doubled-pair pool whose only match sits beyond the try budget.
        let params = CoinSelectionParams::default();
        let mut pool = Vec::new();
        let mut target: u64 = 0;

        let amounts: Vec<u64> = (0..17)
            .flat_map(|i| {
                let a = 1u64 << (17 + i);
                let b = (1u64 << (17 + i)) + (1u64 << (16 - i));
                once(a).chain(once(b))
            })
            .collect();
        for i in 0..17 {
            target += 1u64 << (17 + i);
        }
        for (index, amount) in amounts.iter().enumerate() {
            add_coin(Amount::from_sat(*amount), index as u32, &params, &mut pool);
        }

        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(target),
            Amount::from_sat(1),
            Amount::ZERO,
        );
        assert_eq!(result, Err(SolutionNotFound));
    }

    #[test]
    fn budget_exhaustion_still_returns_recorded_best() {
        let params = CoinSelectionParams::default();
        let mut pool = Vec::new();
        let mut target: u64 = 0;

        let amounts: Vec<u64> = (0..15)
            .flat_map(|i| {
                let a = 1u64 << (15 + i);
                vec![a, a + 2]
            })
            .collect();
        for i in 0..15 {
            target += 1u64 << (15 + i);
        }
        for (index, amount) in amounts.iter().enumerate() {
            add_coin(Amount::from_sat(*amount), index as u32, &params, &mut pool);
        }
        // A coin matching the whole target is found before the budget runs
        // out.
        add_coin(Amount::from_sat(target), amounts.len() as u32, &params, &mut pool);

        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(target),
            Amount::from_sat(1),
            Amount::ZERO,
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.selected_value(), Amount::from_sat(target));
    }

    #[test]
    fn pool_sum_overflow() {
        let params = CoinSelectionParams::default();
        let mut pool = build_pool(&[i64::MAX as u64, i64::MAX as u64], &params);

        let result = select_coins_bnb(&mut pool, Amount::from_sat(CENT), Amount::ZERO, Amount::ZERO);
        assert_eq!(result, Err(Overflow(Addition)));
    }

    #[test]
    fn upper_bound_overflow() {
        let params = CoinSelectionParams::default();
        let mut pool = build_pool(&[1], &params);

        let result = select_coins_bnb(
            &mut pool,
            Amount::from_sat(1),
            Amount::from_sat(u64::MAX),
            Amount::ZERO,
        );
        assert_eq!(result, Err(Overflow(Addition)));
    }
}
