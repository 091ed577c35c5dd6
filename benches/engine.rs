use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spreadwatch::engine::balancer::assign;
use spreadwatch::engine::scheduler::{IdentityScheduler, RateLimits};
use spreadwatch::engine::types::{AmountTier, DexVenue, Scenario, TokenInfo, VenueClass, VenueRef};
use spreadwatch::store::Scenarios;

fn token(symbol: &str) -> TokenInfo {
    TokenInfo {
        symbol: Some(symbol.to_string()),
        address: format!("0x{symbol}"),
        decimals: 18,
    }
}

/// Scenario with `i % 3` DEX venues on each leg and up to three tiers
fn synthetic_scenario(i: usize) -> Scenario {
    let symbol = format!("T{i}");
    let dex = |name: &str| {
        VenueRef::Dex(DexVenue {
            name: name.to_string(),
            network: "base".to_string(),
            input_token: token("USDT"),
            output_token: token(&symbol),
            fee: 0.0,
            multiplier: None,
        })
    };
    let mut buy = vec![VenueRef::Cex("Gate".to_string()), VenueRef::Cex("Mexc".to_string())];
    let mut sell = vec![VenueRef::Cex("Bybit".to_string())];
    for _ in 0..i % 3 {
        buy.push(dex("Odos"));
        sell.push(dex("Jupiter"));
    }

    Scenario {
        token: symbol.clone(),
        buy_venues: buy,
        sell_venues: sell,
        amounts: (0..=i % 3)
            .map(|k| AmountTier {
                amount: 100.0 * (k + 1) as f64,
                threshold_percent: 1.0,
            })
            .collect(),
        step_swaps: Vec::new(),
        network: Some("base".to_string()),
        bridge: Vec::new(),
        check: Vec::new(),
    }
}

fn bench_assign(c: &mut Criterion) {
    let mut group = c.benchmark_group("balancer_assign");

    for scenario_count in [10, 100, 1000] {
        let scenarios: Scenarios = (0..scenario_count)
            .map(|i| (format!("scenario-{i:04}"), synthetic_scenario(i)))
            .collect();

        group.throughput(Throughput::Elements(scenario_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(scenario_count), &scenarios, |b, scenarios| {
            b.iter(|| black_box(assign(scenarios, 16)));
        });
    }
    group.finish();
}

fn bench_acquire(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().enable_time().build() else {
        return;
    };
    let identities: Vec<String> = (0..32).map(|i| format!("socks5://10.0.0.{i}:1080")).collect();
    let limits = RateLimits {
        cex_default: u32::MAX,
        ..RateLimits::default()
    };

    c.bench_function("scheduler_acquire_uncontended", |b| {
        let scheduler = IdentityScheduler::new(&identities, limits.clone());
        b.iter(|| {
            runtime.block_on(async {
                black_box(
                    scheduler
                        .acquire(VenueClass::Cex, "Unlisted", Duration::from_millis(10))
                        .await,
                )
            })
        });
    });
}

criterion_group!(benches, bench_assign, bench_acquire);
criterion_main!(benches);
