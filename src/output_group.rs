//! Groups of coins selected as a unit.

use bitcoin::{Amount, FeeRate, SignedAmount};

use crate::input_coin::InputCoin;

/// Parameters the caller derived from the transaction being built.
///
/// Consumed while constructing [`InputCoin`]s and [`OutputGroup`]s; the
/// selection algorithms themselves never look at fee rates again.
#[derive(Clone, Copy, Debug)]
pub struct CoinSelectionParams {
    /// Size of the change output that would be created, in virtual bytes.
    pub change_output_size: usize,
    /// Size of spending the change output later, in virtual bytes.
    pub change_spend_size: usize,
    /// Fee rate the transaction aims for.
    pub effective_feerate: FeeRate,
    /// Fee rate expected over the long run, used to price consolidation.
    pub long_term_feerate: FeeRate,
    /// Fee rate below which change is considered not worth keeping.
    pub discard_feerate: FeeRate,
    /// Size of the transaction before any inputs are attached, in virtual
    /// bytes.
    pub tx_noinputs_size: usize,
    /// The recipient absorbs the fees, so coins contribute their nominal
    /// value.
    pub subtract_fee_outputs: bool,
    /// Spend all coins sharing a script together, trading fees for privacy.
    pub avoid_partial_spends: bool,
}

impl CoinSelectionParams {
    /// Cost of creating a change output now and spending it later.
    ///
    /// `None` if the fee calculation overflows.
    pub fn cost_of_change(&self) -> Option<Amount> {
        let create_fee = self.effective_feerate.fee_vb(self.change_output_size as u64)?;
        let spend_fee = self.discard_feerate.fee_vb(self.change_spend_size as u64)?;
        create_fee.checked_add(spend_fee)
    }

    /// Fee for the fixed, input-independent part of the transaction.
    ///
    /// `None` if the fee calculation overflows.
    pub fn not_input_fees(&self) -> Option<Amount> {
        self.effective_feerate.fee_vb(self.tx_noinputs_size as u64)
    }
}

impl Default for CoinSelectionParams {
    fn default() -> CoinSelectionParams {
        CoinSelectionParams {
            change_output_size: 0,
            change_spend_size: 0,
            effective_feerate: FeeRate::ZERO,
            long_term_feerate: FeeRate::ZERO,
            discard_feerate: FeeRate::ZERO,
            tx_noinputs_size: 0,
            subtract_fee_outputs: false,
            avoid_partial_spends: false,
        }
    }
}

/// Confirmation and mempool limits a group must satisfy to be spendable.
#[derive(Clone, Copy, Debug)]
pub struct CoinEligibilityFilter {
    /// Confirmations required of coins we sent to ourselves.
    pub conf_mine: i32,
    /// Confirmations required of coins received from others.
    pub conf_theirs: i32,
    /// Maximum unconfirmed ancestors a coin may have in the mempool.
    pub max_ancestors: usize,
    /// Maximum unconfirmed descendants a coin may have in the mempool.
    pub max_descendants: usize,
    /// Admit groups that hold only part of a reused destination.
    pub include_partial_groups: bool,
}

impl CoinEligibilityFilter {
    /// Filter with the descendant limit matching the ancestor limit.
    pub fn new(conf_mine: i32, conf_theirs: i32, max_ancestors: usize) -> CoinEligibilityFilter {
        CoinEligibilityFilter {
            conf_mine,
            conf_theirs,
            max_ancestors,
            max_descendants: max_ancestors,
            include_partial_groups: false,
        }
    }

    /// Filter with separate ancestor and descendant limits.
    pub fn with_descendants(
        conf_mine: i32,
        conf_theirs: i32,
        max_ancestors: usize,
        max_descendants: usize,
    ) -> CoinEligibilityFilter {
        CoinEligibilityFilter {
            conf_mine,
            conf_theirs,
            max_ancestors,
            max_descendants,
            include_partial_groups: false,
        }
    }
}

/// One or more coins the selection algorithms treat as a single candidate.
///
/// Grouping more than one coin is how a wallet avoids partial spends: every
/// coin paying the same script lands in one group and is either spent whole
/// or not at all.
#[derive(Clone, Debug)]
pub struct OutputGroup {
    /// The coins in this group.
    pub outputs: Vec<InputCoin>,
    /// Whether every coin in the group was sent by us.
    pub from_me: bool,
    /// Sum of the nominal values of the coins.
    pub value: Amount,
    /// Smallest confirmation depth across the coins.
    pub depth: i32,
    /// Largest unconfirmed ancestor count across the coins.
    pub ancestors: usize,
    /// Largest unconfirmed descendant count across the coins.
    pub descendants: usize,
    /// Sum of the coins' effective values.
    pub effective_value: SignedAmount,
    /// Sum of the coins' spend fees at the current fee rate.
    pub fee: SignedAmount,
    /// Sum of the coins' spend fees at the long-term fee rate.
    pub long_term_fee: SignedAmount,
    subtract_fee_outputs: bool,
}

impl OutputGroup {
    /// Creates an empty group configured by `params`.
    pub fn new(params: &CoinSelectionParams) -> OutputGroup {
        OutputGroup { subtract_fee_outputs: params.subtract_fee_outputs, ..Default::default() }
    }

    /// Adds `output` and folds its attributes into the group aggregates.
    ///
    /// With `positive_only` set, coins whose effective value is zero or
    /// negative are dropped instead of inserted; they would only shrink what
    /// the group contributes toward a target.
    pub fn insert(
        &mut self,
        output: InputCoin,
        depth: i32,
        from_me: bool,
        ancestors: usize,
        descendants: usize,
        positive_only: bool,
    ) {
        if positive_only && output.effective_value <= SignedAmount::ZERO {
            return;
        }

        self.value += output.value;
        self.effective_value += output.effective_value;
        self.fee += output.fee;
        self.long_term_fee += output.long_term_fee;
        self.depth = self.depth.min(depth);
        self.from_me &= from_me;
        self.ancestors = self.ancestors.max(ancestors);
        self.descendants = self.descendants.max(descendants);
        self.outputs.push(output);
    }

    /// Whether the group clears `filter`.
    pub fn eligible_for_spending(&self, filter: &CoinEligibilityFilter) -> bool {
        let required_depth = if self.from_me { filter.conf_mine } else { filter.conf_theirs };
        self.depth >= required_depth
            && self.ancestors <= filter.max_ancestors
            && self.descendants <= filter.max_descendants
    }

    /// The amount this group contributes toward a selection target.
    pub fn get_selection_amount(&self) -> SignedAmount {
        if self.subtract_fee_outputs {
            self.value.to_signed().unwrap()
        } else {
            self.effective_value
        }
    }
}

impl Default for OutputGroup {
    fn default() -> OutputGroup {
        OutputGroup {
            outputs: Vec::new(),
            from_me: true,
            value: Amount::ZERO,
            depth: 999,
            ancestors: 0,
            descendants: 0,
            effective_value: SignedAmount::ZERO,
            fee: SignedAmount::ZERO,
            long_term_fee: SignedAmount::ZERO,
            subtract_fee_outputs: false,
        }
    }
}
