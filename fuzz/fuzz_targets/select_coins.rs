#![no_main]

use arbitrary::Arbitrary;
use bitcoin::hashes::Hash;
use bitcoin::{Amount, FeeRate, OutPoint, Txid};
use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wallet_coin_selection::{select_coins, CoinSelectionParams, InputCoin, OutputGroup};

// Keeps arbitrary inputs inside the library's documented amount domain.
const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

#[derive(Arbitrary, Debug)]
pub struct Params {
    target: u64,
    cost_of_change: u64,
    not_input_fees: u64,
    fee_rate: u64,
    long_term_fee_rate: u64,
    seed: u64,
    coins: Vec<(u64, u16)>,
}

fuzz_target!(|params: Params| {
    let selection_params = CoinSelectionParams {
        effective_feerate: FeeRate::from_sat_per_kwu(params.fee_rate % 100_000),
        long_term_feerate: FeeRate::from_sat_per_kwu(params.long_term_fee_rate % 100_000),
        ..Default::default()
    };

    let mut pool: Vec<OutputGroup> = Vec::new();
    for (index, (value, input_bytes)) in params.coins.iter().enumerate() {
        let outpoint = OutPoint::new(Txid::all_zeros(), index as u32);
        let value = Amount::from_sat(value % MAX_MONEY);
        if let Some(coin) = InputCoin::new(outpoint, value, *input_bytes as i32, &selection_params)
        {
            let mut group = OutputGroup::new(&selection_params);
            group.insert(coin, 1, true, 0, 0, false);
            pool.push(group);
        }
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let _ = select_coins(
        Amount::from_sat(params.target % MAX_MONEY),
        Amount::from_sat(params.cost_of_change % MAX_MONEY),
        Amount::from_sat(params.not_input_fees % MAX_MONEY),
        &mut pool,
        &mut rng,
    );
});
