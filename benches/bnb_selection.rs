use bitcoin::hashes::Hash;
use bitcoin::{Amount, OutPoint, Txid};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wallet_coin_selection::{select_coins_bnb, CoinSelectionParams, InputCoin, OutputGroup};

fn build_group(value: u64, index: u32, params: &CoinSelectionParams) -> OutputGroup {
    let outpoint = OutPoint::new(Txid::all_zeros(), index);
    let coin = InputCoin::new(outpoint, Amount::from_sat(value), 0, params).unwrap();
    let mut group = OutputGroup::new(params);
    group.insert(coin, 6, true, 0, 0, true);
    group
}

pub fn bnb_benchmark(c: &mut Criterion) {
    const COIN: u64 = 100_000_000;

    let params = CoinSelectionParams::default();
    let cost_of_change = Amount::from_sat(50_000);

    // A thousand equal coins that never match, plus the one coin completing
    // the only acceptable pair.  Runs the search out of its entire budget.
    let mut pool: Vec<OutputGroup> = (0..1_000)
        .map(|index| build_group(1_000 * COIN, index, &params))
        .collect();
    pool.push(build_group(3 * COIN, 1_000, &params));

    let target = Amount::from_sat(1_003 * COIN);

    c.bench_function("bnb", |b| {
        b.iter(|| {
            let result = select_coins_bnb(
                black_box(&mut pool.clone()),
                black_box(target),
                black_box(cost_of_change),
                black_box(Amount::ZERO),
            )
            .unwrap();

            assert_eq!(result.len(), 2);
            assert_eq!(result.selected_value(), target);
        })
    });
}

criterion_group!(benches, bnb_benchmark);
criterion_main!(benches);
