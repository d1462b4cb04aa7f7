use chrono::{DateTime, Duration, TimeZone, Utc};
use cross_asset_engine::{
    AssetClass, AssetData, CorrelationDirection, CrossAssetCorrelationSystem, DataStatus,
    EngineConfig, MarketRegime, PairStatus, PositionSizing, RiskSentiment, Timeframe,
    matrix::CorrelationStrength,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;

fn ts(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i)
}

fn tick(
    system: &CrossAssetCorrelationSystem,
    symbol: &str,
    class: AssetClass,
    price: f64,
    i: i64,
) {
    system
        .ingest(AssetData::new(symbol, class, price, ts(i)))
        .unwrap();
}

/// Deterministic zig-zag so return series have variance.
fn zig_zag(i: i64) -> f64 {
    1.0 + 0.01 * ((i * 7 % 5) as f64 - 2.0)
}

/// The six dollar index components at tick `i`, EURUSD falling so the index rises.
fn feed_dollar(system: &CrossAssetCorrelationSystem, i: i64, components: usize) {
    let quotes = [
        ("EURUSD", 1.10 - 0.004 * i as f64),
        ("USDJPY", 150.0),
        ("GBPUSD", 1.27),
        ("USDCAD", 1.35),
        ("USDSEK", 10.5),
        ("USDCHF", 0.88),
    ];
    for (symbol, quote) in quotes.into_iter().take(components) {
        tick(system, symbol, AssetClass::Forex, quote, i);
    }
}

fn dollar_rank(status: DataStatus) -> u8 {
    match status {
        DataStatus::NoData | DataStatus::InsufficientData => 0,
        DataStatus::Calculating => 1,
        DataStatus::Active => 2,
    }
}

#[test]
fn test_gold_and_synthetic_dollar_rising_together_diverge() {
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..50 {
        tick(&system, "GOLD", AssetClass::Commodity, 2000.0 + 10.0 * i as f64, i);
        feed_dollar(&system, i, 6);
    }

    let divergences = system.detect_divergences();
    assert_eq!(divergences.len(), 1);

    let divergence = &divergences[0];
    assert!(divergence.involves("GOLD") && divergence.involves("DXY"));
    assert_eq!(divergence.expected, CorrelationDirection::Negative);
    assert!(divergence.severity > 0.0);
    assert!(
        divergence.resolution.contains("GOLD") || divergence.resolution.contains("DXY"),
        "unexpected resolution: {}",
        divergence.resolution
    );

    let gold = system.analyze_pair("GOLD");
    assert_eq!(gold.divergences.len(), 1);
    assert!(
        gold.trading_implications
            .risk_factors
            .contains(&"divergence with DXY".to_string())
    );
    assert_eq!(gold.trading_implications.suggested_timeframe, Timeframe::ShortTerm);
    assert_eq!(gold.trading_implications.position_sizing, PositionSizing::Reduced);
}

#[test]
fn test_divergence_disappears_when_gold_stalls() {
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..50 {
        tick(&system, "GOLD", AssetClass::Commodity, 2000.0 + 10.0 * i as f64, i);
        feed_dollar(&system, i, 6);
    }
    assert_eq!(system.detect_divergences().len(), 1);

    // Gold flattens for a full lookback while the dollar series is left untouched
    for i in 50..70 {
        tick(&system, "GOLD", AssetClass::Commodity, 2490.0, i);
    }
    assert!(system.detect_divergences().is_empty());
}

#[test]
fn test_bond_divergence_tracks_yield_not_price() {
    let bond = |system: &CrossAssetCorrelationSystem, yield_value: f64, i: i64| {
        // Price falls as the yield rises
        let price = 100.0 - 30.0 * (yield_value - 4.0);
        let data = AssetData::new("US10Y", AssetClass::Bond, price, ts(i)).with_yield(yield_value);
        system.ingest(data).unwrap();
    };

    // Yields and USDJPY rising together agree with their positive relationship
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..50 {
        bond(&system, 4.00 + 0.01 * i as f64, i);
        tick(&system, "USDJPY", AssetClass::Forex, 140.0 + 0.5 * i as f64, i);
    }
    assert!(system.detect_divergences().is_empty());

    // Yields falling while USDJPY rises is a real divergence
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..50 {
        bond(&system, 4.49 - 0.01 * i as f64, i);
        tick(&system, "USDJPY", AssetClass::Forex, 140.0 + 0.5 * i as f64, i);
    }
    let divergences = system.detect_divergences();
    assert_eq!(divergences.len(), 1);
    assert!(divergences[0].involves("US10Y") && divergences[0].involves("USDJPY"));
    assert!(divergences[0].trends.iter().any(|trend| *trend < -0.02));
}

#[test]
fn test_risk_on_baskets_yield_risk_on() {
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..20 {
        let growth = 1.004_f64.powi(i as i32);
        let decay = 0.996_f64.powi(i as i32);
        let volume_up = 1_000.0 * 1.04_f64.powi(i as i32);
        let volume_down = 1_000.0 * 0.96_f64.powi(i as i32);

        for symbol in ["SPX", "NDX", "RUT", "DAX", "NIKKEI", "HSI"] {
            system
                .ingest(
                    AssetData::new(symbol, AssetClass::Index, 100.0 * growth, ts(i))
                        .with_volume(volume_up),
                )
                .unwrap();
        }
        for symbol in ["VIX", "XLU", "XLP", "XLV", "TLT"] {
            system
                .ingest(
                    AssetData::new(symbol, AssetClass::Index, 100.0 * decay, ts(i))
                        .with_volume(volume_down),
                )
                .unwrap();
        }
    }

    let report = system.calculate_risk_sentiment();
    assert_eq!(report.sentiment, RiskSentiment::RiskOn);
    assert_eq!(report.risk_off_score, 0);

    let analysis = system.analyze();
    assert_eq!(analysis.risk_sentiment.sentiment, RiskSentiment::RiskOn);
    assert_eq!(analysis.sector_rotation.stance, "cyclical");
}

#[test]
fn test_us_german_yield_differential() {
    let system = CrossAssetCorrelationSystem::default();
    system
        .ingest(AssetData::new("US10Y", AssetClass::Bond, 98.1, ts(0)).with_yield(4.25))
        .unwrap();
    system
        .ingest(AssetData::new("BUND10Y", AssetClass::Bond, 131.2, ts(0)).with_yield(2.45))
        .unwrap();

    let spread = system.bond_differential("US10Y", "BUND10Y").unwrap();
    assert!((spread - 1.80).abs() < 0.001);

    let bonds = system.analyze().bonds;
    assert!((bonds.us_german_spread.unwrap() - 1.80).abs() < 0.001);
    assert_eq!(bonds.curve_slope, None);
}

#[test]
fn test_dollar_index_needs_all_six_components() {
    let system = CrossAssetCorrelationSystem::default();
    let mut rank = 0;

    for i in 0..30 {
        feed_dollar(&system, i, 5);
        let status = system.dollar_analysis().status;
        assert_ne!(status, DataStatus::Active);
        assert_eq!(status, DataStatus::NoData);
    }

    for i in 30..60 {
        feed_dollar(&system, i, 6);
        let status = system.dollar_analysis().status;
        assert!(dollar_rank(status) >= rank, "dollar status went backwards at tick {i}");
        rank = dollar_rank(status);
    }

    let dollar = system.analyze().dollar;
    assert_eq!(dollar.status, DataStatus::Active);
    assert_eq!(dollar.samples, 30);
    assert!(dollar.value.is_some_and(f64::is_finite));
}

#[test]
fn test_perfectly_correlated_pair_is_very_strong_positive() {
    let system = CrossAssetCorrelationSystem::default();
    let mut price = 100.0;
    for i in 0..60 {
        price *= zig_zag(i);
        tick(&system, "ALPHA", AssetClass::Index, price, i);
        tick(&system, "BETA", AssetClass::Index, 2.0 * price, i);
    }

    let analysis = system.analyze();
    assert_eq!(analysis.matrix_symbols, vec!["ALPHA", "BETA"]);
    assert_eq!(analysis.top_correlations.len(), 1);

    let top = &analysis.top_correlations[0];
    assert!((top.correlation - 1.0).abs() < 1e-9);
    assert_eq!(top.strength, CorrelationStrength::VeryStrong);
    assert_eq!(top.direction, CorrelationDirection::Positive);
}

#[test]
fn test_constant_price_series_never_produces_nan() {
    let system = CrossAssetCorrelationSystem::default();
    let mut price = 100.0;
    for i in 0..60 {
        price *= zig_zag(i);
        tick(&system, "ALPHA", AssetClass::Index, price, i);
        tick(&system, "FLAT", AssetClass::Commodity, 42.0, i);
        tick(&system, "AUDUSD", AssetClass::Forex, 0.66, i);
    }

    let analysis = system.analyze();
    assert!(analysis.matrix_symbols.iter().any(|s| s == "FLAT"));
    assert!(analysis.top_correlations.is_empty());
    assert!(analysis.commodity_signals.is_empty());

    let flat = system.analyze_pair("FLAT");
    assert_eq!(flat.status, PairStatus::Active);
    assert!(flat.correlations.is_empty());
    assert!(flat.lead_lag.is_empty());
}

#[test]
fn test_analyze_is_idempotent() {
    let system = CrossAssetCorrelationSystem::default();
    let mut price = 100.0;
    for i in 0..80 {
        price *= zig_zag(i);
        tick(&system, "SPX", AssetClass::Index, 5000.0 * price / 100.0, i);
        tick(&system, "NDX", AssetClass::Index, 18000.0 * zig_zag(i + 2), i);
        tick(&system, "GOLD", AssetClass::Commodity, 2000.0 + 10.0 * i as f64, i);
        feed_dollar(&system, i, 6);
    }

    let first = system.analyze();
    let second = system.analyze();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.as_of, Some(ts(79)));
}

#[test]
fn test_pair_status_never_regresses() {
    let system = CrossAssetCorrelationSystem::default();
    assert_eq!(system.analyze_pair("SPX").status, PairStatus::UnknownSymbol);

    let mut seen_active = false;
    let mut price = 100.0;
    for i in 0..80 {
        price *= zig_zag(i);
        tick(&system, "SPX", AssetClass::Index, price, i);

        let status = system.analyze_pair("SPX").status;
        if seen_active {
            assert_eq!(status, PairStatus::Active, "status regressed at tick {i}");
        }
        seen_active |= status == PairStatus::Active;
        if i < 49 {
            assert_eq!(status, PairStatus::InsufficientData);
        }
    }
    assert!(seen_active);
}

#[test]
fn test_regime_shift_surfaces_in_analysis() {
    let system = CrossAssetCorrelationSystem::default();
    for i in 0..50 {
        let correlation = if i < 30 { 0.8 } else { 0.1 };
        system.record_correlation("USDJPY", "US10Y", correlation, ts(i));
    }

    let regime = system.analyze().regime;
    assert_eq!(regime.pairs_evaluated, 1);
    assert_eq!(regime.mean_shifts, 1);
    assert_eq!(regime.market_regime, MarketRegime::RegimeTransition);

    system
        .ingest(AssetData::new("US10Y", AssetClass::Bond, 98.0, ts(50)).with_yield(4.2))
        .unwrap();
    let pair = system.analyze_pair("US10Y");
    assert_eq!(pair.predictions.len(), 1);
    assert!(pair.predictions[0].predicted >= -1.0 && pair.predictions[0].predicted <= 1.0);
}

#[test]
fn test_lead_lag_identifies_leader() {
    let config = EngineConfig {
        matrix_period: 200,
        ..EngineConfig::default()
    };
    let system = CrossAssetCorrelationSystem::new(config).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let leader_returns: Vec<f64> = (0..260).map(|_| rng.random_range(-0.01..0.01)).collect();

    let (mut lead, mut follow) = (100.0, 100.0);
    for i in 2..leader_returns.len() {
        // Follower echoes the leader two bars later, plus a smaller same-bar component
        let follow_return = 0.8 * leader_returns[i] + leader_returns[i - 2];
        lead *= 1.0 + leader_returns[i];
        follow *= 1.0 + follow_return;
        tick(&system, "LEAD", AssetClass::Index, lead, i as i64);
        tick(&system, "FOLLOW", AssetClass::Index, follow, i as i64);
    }

    let pair = system.analyze_pair("LEAD");
    assert_eq!(pair.status, PairStatus::Active);
    assert_eq!(pair.trading_implications.primary_drivers, vec!["FOLLOW"]);

    let estimate = &pair.lead_lag[0];
    assert_eq!(estimate.counterpart, "FOLLOW");
    assert_eq!(estimate.lag, 2);
    assert_eq!(estimate.leader.as_deref(), Some("LEAD"));
}

#[test]
fn test_random_walks_keep_correlations_bounded() {
    let system = CrossAssetCorrelationSystem::default();
    let symbols = ["SPX", "NDX", "GOLD", "OIL", "COPPER", "AUDUSD", "USDCAD", "US10Y"];
    let mut rng = StdRng::seed_from_u64(7);
    let mut prices = [100.0_f64; 8];

    for i in 0..120 {
        for (symbol, price) in symbols.iter().zip(prices.iter_mut()) {
            *price *= 1.0 + rng.random_range(-0.03..0.03);
            tick(&system, symbol, AssetClass::Index, *price, i);
        }
        if i % 10 == 0 {
            system.analyze();
        }
    }

    let analysis = system.analyze();
    assert_eq!(analysis.matrix_symbols.len(), symbols.len());
    for result in &analysis.top_correlations {
        assert!((-1.0..=1.0).contains(&result.correlation));
    }
    for symbol in symbols {
        for result in system.analyze_pair(symbol).correlations {
            assert!(result.correlation.is_finite());
            assert!((-1.0..=1.0).contains(&result.correlation));
        }
    }
}

#[test]
fn test_concurrent_ingest_and_analyze() {
    let system = Arc::new(CrossAssetCorrelationSystem::default());
    let writers = [
        ("SPX", AssetClass::Index),
        ("GOLD", AssetClass::Commodity),
        ("EURUSD", AssetClass::Forex),
        ("US10Y", AssetClass::Bond),
    ];

    std::thread::scope(|scope| {
        for (symbol, class) in writers {
            let system = Arc::clone(&system);
            scope.spawn(move || {
                for i in 0..200 {
                    let data = AssetData::new(symbol, class, 100.0 * zig_zag(i), ts(i))
                        .with_volume(10.0)
                        .with_yield(4.0);
                    system.ingest(data).unwrap();
                }
            });
        }

        for _ in 0..2 {
            let system = Arc::clone(&system);
            scope.spawn(move || {
                for _ in 0..25 {
                    let analysis = system.analyze();
                    assert!(analysis.symbols_tracked <= writers.len());
                    let _ = system.analyze_pair("SPX");
                }
            });
        }
    });

    assert_eq!(system.generation(), 800);
    assert_eq!(system.snapshot("GOLD", 500).len(), 200);
    assert_eq!(system.analyze().matrix_symbols.len(), writers.len());
}
