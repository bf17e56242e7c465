//! Single random draw coin selection.

use bitcoin::{Amount, SignedAmount};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::OverflowError::Addition;
use crate::errors::SelectionError::{self, InsufficientFunds, Overflow};
use crate::output_group::OutputGroup;
use crate::{SelectionResult, CHANGE_LOWER};

/// Selects coins by shuffling the pool and taking groups until the target is
/// reached.
///
/// The selection must leave room for a change output, so groups are taken
/// until their contributions reach `target + CHANGE_LOWER`.  Blunt compared
/// to the other selectors, but the uniformly random pick is the baseline for
/// privacy and keeps the UTXO set from fragmenting in any particular
/// direction.
///
/// # Errors
///
/// * `InsufficientFunds` if the whole pool cannot reach the target
/// * `Overflow` if `target + CHANGE_LOWER` leaves the representable range
pub fn select_coins_srd<R: Rng + ?Sized>(
    utxo_pool: &mut [OutputGroup],
    target: Amount,
    rng: &mut R,
) -> Result<SelectionResult, SelectionError> {
    let target = target
        .checked_add(CHANGE_LOWER)
        .and_then(|t| t.to_signed().ok())
        .ok_or(Overflow(Addition))?;

    utxo_pool.shuffle(rng);

    let mut result = SelectionResult::new();
    let mut selected_value = SignedAmount::ZERO;

    for group in utxo_pool.iter() {
        selected_value =
            selected_value.checked_add(group.get_selection_amount()).ok_or(Overflow(Addition))?;
        result.add_input(group);
        if selected_value >= target {
            return Ok(result);
        }
    }

    Err(InsufficientFunds)
}
