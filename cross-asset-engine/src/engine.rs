//! The orchestrator: routes each [`AssetData`] update to the modules that consume it and
//! composes their outputs into [`MarketAnalysis`] and [`PairAnalysis`] snapshots.
//!
//! Each module sits behind its own [`RwLock`], so `analyze` reads a consistent snapshot
//! per module while `ingest` keeps writing to the others. No call ever holds two module
//! locks at once.

use crate::{
    analysis::{
        LeadLagEstimate, MarketAnalysis, PairAnalysis, PairStatus, TradingBias,
        TradingImplications, primary_drivers,
    },
    bond::BondYieldModule,
    commodity::CommodityCurrencyModule,
    config::EngineConfig,
    divergence::{DivergenceDetector, IntermarketDivergence},
    dollar::{DXY_SYMBOL, DollarAnalysis, DollarIndexModule, DxyComponent},
    equity::{EquityRiskModule, RiskSentimentReport, sector_rotation},
    error::EngineError,
    matrix::{CorrelationMatrixEngine, CorrelationResult},
    regime::PredictiveRegimeModel,
    stats,
    store::AssetStore,
    types::{AssetClass, AssetData, Observation},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::{Mutex, RwLock};
use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Module handler an asset class is routed to, on top of the store, matrix and
/// divergence feeds every update receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Bonds carrying a `yield`.
    BondYield,
    CommodityLeg,
    /// Non-USD leg of a USD pair, as USD per unit of that currency.
    CurrencyLeg,
    DollarComponent,
    EquityRisk,
}

const BOND_ROUTES: &[Route] = &[Route::BondYield];
const COMMODITY_ROUTES: &[Route] = &[Route::CommodityLeg];
const FOREX_ROUTES: &[Route] = &[Route::CurrencyLeg, Route::DollarComponent];
const INDEX_ROUTES: &[Route] = &[Route::EquityRisk];

/// Default dispatch table. Adding an asset class means adding one entry here.
pub fn default_routes() -> FnvHashMap<AssetClass, &'static [Route]> {
    FnvHashMap::from_iter([
        (AssetClass::Bond, BOND_ROUTES),
        (AssetClass::Commodity, COMMODITY_ROUTES),
        (AssetClass::Forex, FOREX_ROUTES),
        (AssetClass::Index, INDEX_ROUTES),
    ])
}

/// Split a six letter USD pair into its non-USD currency and the rate in USD per unit
/// of that currency. Crosses and malformed symbols yield `None`.
pub fn currency_leg(symbol: &str, rate: f64) -> Option<(&str, f64)> {
    if symbol.len() != 6 || !symbol.is_ascii() {
        return None;
    }

    let (base, quote) = symbol.split_at(3);
    match (base, quote) {
        ("USD", "USD") => None,
        (base, "USD") => Some((base, rate)),
        ("USD", quote) if rate > 0.0 => Some((quote, 1.0 / rate)),
        _ => None,
    }
}

#[derive(Debug)]
pub struct CrossAssetCorrelationSystem {
    config: EngineConfig,
    routes: FnvHashMap<AssetClass, &'static [Route]>,
    store: RwLock<AssetStore>,
    bonds: RwLock<BondYieldModule>,
    commodities: RwLock<CommodityCurrencyModule>,
    equities: RwLock<EquityRiskModule>,
    dollar: RwLock<DollarIndexModule>,
    divergence: RwLock<DivergenceDetector>,
    matrix: RwLock<CorrelationMatrixEngine>,
    regime: RwLock<PredictiveRegimeModel>,
    /// Incremented on every accepted ingest.
    generation: AtomicU64,
    /// Generation last fed into the regime model.
    recorded_generation: Mutex<u64>,
}

impl Default for CrossAssetCorrelationSystem {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl CrossAssetCorrelationSystem {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let capacity = config.buffer_capacity;
        info!(
            capacity,
            matrix_period = config.matrix_period,
            auto_record = config.auto_record_correlations,
            "initialising cross-asset correlation system"
        );

        Self {
            routes: default_routes(),
            store: RwLock::new(AssetStore::new(capacity)),
            bonds: RwLock::new(BondYieldModule::new(capacity, config.bond_trend_period)),
            commodities: RwLock::new(CommodityCurrencyModule::new(
                capacity,
                config.commodity_period,
            )),
            equities: RwLock::new(EquityRiskModule::new(capacity, config.equity_lookback)),
            dollar: RwLock::new(DollarIndexModule::new(
                capacity,
                config.dollar_sma_period,
                config.dollar_range_period,
            )),
            divergence: RwLock::new(DivergenceDetector::new(capacity, config.divergence.clone())),
            matrix: RwLock::new(CorrelationMatrixEngine::new(capacity)),
            regime: RwLock::new(PredictiveRegimeModel::new(config.regime.clone())),
            generation: AtomicU64::new(0),
            recorded_generation: Mutex::new(0),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of accepted ingests so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Accept one update. Only non-finite records are rejected; everything else is
    /// recorded and routed by asset class. Bonds carrying a yield are tracked by the
    /// divergence detector on that yield.
    pub fn ingest(&self, data: AssetData) -> Result<(), EngineError> {
        if let Err(error) = data.validate() {
            warn!(symbol = %data.symbol, %error, "rejecting asset update");
            return Err(error);
        }

        let AssetData {
            symbol,
            asset_class,
            price,
            volume,
            timestamp,
            yield_value,
            ..
        } = data;

        self.store.write().record(&symbol, price, volume, timestamp);
        self.matrix.write().update(&symbol, price, timestamp);
        // Bond relationships are stated on yield, which moves against price
        let series_value = yield_value
            .filter(|_| asset_class == AssetClass::Bond)
            .unwrap_or(price);
        self.divergence
            .write()
            .update(&symbol, series_value, volume, timestamp);

        let routes = self.routes.get(&asset_class).copied().unwrap_or_default();
        for route in routes {
            match route {
                Route::BondYield => match yield_value {
                    Some(yield_value) => {
                        self.bonds.write().record_yield(&symbol, yield_value, timestamp)
                    }
                    None => debug!(%symbol, "bond update without yield, not routed"),
                },
                Route::CommodityLeg => {
                    self.commodities
                        .write()
                        .record_commodity(&symbol, price, volume, timestamp);
                }
                Route::CurrencyLeg => match currency_leg(&symbol, price) {
                    Some((currency, rate)) => {
                        self.commodities
                            .write()
                            .record_currency(currency, rate, timestamp);
                    }
                    None => debug!(%symbol, "forex update has no USD leg, not routed"),
                },
                Route::DollarComponent => {
                    if let Some(component) = DxyComponent::from_pair(&symbol) {
                        self.record_dollar_component(component, price, timestamp);
                    }
                }
                Route::EquityRisk => {
                    self.equities
                        .write()
                        .update_equity(&symbol, price, volume, timestamp);
                }
            }
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn record_dollar_component(
        &self,
        component: DxyComponent,
        rate: f64,
        timestamp: DateTime<Utc>,
    ) {
        let value = self.dollar.write().record_rate(component, rate, timestamp);
        if let Some(value) = value {
            self.divergence.write().upsert(DXY_SYMBOL, value, timestamp);
        }
    }

    /// Feed a correlation observation to the regime model directly.
    pub fn record_correlation(
        &self,
        asset_a: &str,
        asset_b: &str,
        correlation: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.regime
            .write()
            .record(asset_a, asset_b, correlation, timestamp);
    }

    pub fn snapshot(&self, symbol: &str, n: usize) -> Vec<Observation> {
        self.store.read().snapshot(symbol, n)
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.store.read().latest_timestamp()
    }

    pub fn calculate_risk_sentiment(&self) -> RiskSentimentReport {
        self.equities.read().calculate_risk_sentiment()
    }

    pub fn dollar_analysis(&self) -> DollarAnalysis {
        self.dollar.read().analysis()
    }

    pub fn bond_differential(&self, bond_a: &str, bond_b: &str) -> Option<f64> {
        self.bonds.read().differential(bond_a, bond_b)
    }

    pub fn detect_divergences(&self) -> Vec<IntermarketDivergence> {
        self.divergence.read().detect_divergences()
    }

    /// Strongest pairs of the most recently computed matrix.
    pub fn strongest_correlations(&self, threshold: f64) -> Vec<CorrelationResult> {
        self.matrix.read().strongest(threshold)
    }

    /// Record the matrix into the regime model once per ingest generation. `generation`
    /// is the counter read before the matrix was computed; a matrix older than the
    /// last recorded generation is dropped.
    fn auto_record(
        &self,
        pairs: &[CorrelationResult],
        as_of: Option<DateTime<Utc>>,
        generation: u64,
    ) {
        let Some(as_of) = as_of else {
            return;
        };

        let mut recorded = self.recorded_generation.lock();
        if *recorded >= generation {
            return;
        }

        let mut regime = self.regime.write();
        for pair in pairs {
            regime.record(&pair.asset_a, &pair.asset_b, pair.correlation, as_of);
        }
        *recorded = generation;
        debug!(pairs = pairs.len(), generation, "recorded matrix into regime model");
    }

    /// Comprehensive snapshot across every module. Never fails: modules lacking data
    /// report their own status.
    pub fn analyze(&self) -> MarketAnalysis {
        // Read before any module so the matrix is at least as new as this generation
        let generation = self.generation();
        let (as_of, symbols_tracked) = {
            let store = self.store.read();
            (store.latest_timestamp(), store.symbol_count())
        };

        let matrix = self.matrix.write().compute(self.config.matrix_period).cloned();
        let (matrix_symbols, top_correlations) = match &matrix {
            Some(matrix) => {
                if self.config.auto_record_correlations {
                    self.auto_record(&matrix.pairs().collect::<Vec<_>>(), as_of, generation);
                }
                let mut top = matrix.strongest(self.config.strong_correlation_threshold);
                top.truncate(self.config.top_correlations);
                (matrix.symbols.clone(), top)
            }
            None => (Vec::new(), Vec::new()),
        };

        let risk_sentiment = self.calculate_risk_sentiment();
        let dollar = self.dollar_analysis();
        let trading_bias = TradingBias::derive(risk_sentiment.sentiment, dollar.signal);

        MarketAnalysis {
            as_of,
            symbols_tracked,
            sector_rotation: sector_rotation(risk_sentiment.sentiment),
            risk_sentiment,
            dollar,
            bonds: self.bonds.read().analysis(),
            commodity_signals: self.commodities.read().signals(),
            divergences: self.detect_divergences(),
            matrix_symbols,
            top_correlations,
            regime: self.regime.read().detect_regime_changes(),
            trading_bias,
        }
    }

    /// Snapshot centred on `symbol`. Unknown symbols yield an empty analysis tagged
    /// `unknown_symbol`.
    pub fn analyze_pair(&self, symbol: &str) -> PairAnalysis {
        let (observations, latest_price) = {
            let store = self.store.read();
            store
                .buffer(symbol)
                .map_or((0, None), |buffer| (buffer.len(), buffer.latest_price()))
        };

        let status = if observations == 0 {
            PairStatus::UnknownSymbol
        } else if observations < self.config.matrix_period {
            PairStatus::InsufficientData
        } else {
            PairStatus::Active
        };

        let correlations = self
            .matrix
            .read()
            .calculate(self.config.matrix_period)
            .map(|matrix| matrix.involving(symbol))
            .unwrap_or_default();

        let divergences: Vec<_> = self
            .detect_divergences()
            .into_iter()
            .filter(|divergence| divergence.involves(symbol))
            .collect();

        let predictions = {
            let regime = self.regime.read();
            regime.predictions_for(symbol, regime.config().default_horizon)
        };

        let lead_lag = primary_drivers(symbol, &correlations)
            .into_iter()
            .filter_map(|counterpart| self.lead_lag(symbol, counterpart))
            .collect();

        let trading_implications =
            TradingImplications::derive(symbol, status, &correlations, &divergences, &predictions);

        PairAnalysis {
            symbol: SmolStr::new(symbol),
            status,
            observations,
            latest_price,
            correlations,
            divergences,
            predictions,
            lead_lag,
            trading_implications,
        }
    }

    /// Lagged return correlation over the last matrix period of shared timestamps.
    fn lead_lag(&self, symbol: &str, counterpart: SmolStr) -> Option<LeadLagEstimate> {
        let (symbol_returns, counterpart_returns) = {
            let store = self.store.read();
            store
                .buffer(symbol)?
                .aligned_returns(store.buffer(&counterpart)?, self.config.matrix_period)?
        };

        let (lag, correlation) = stats::lead_lag(
            &symbol_returns,
            &counterpart_returns,
            self.config.lead_lag_max,
        )?;

        let leader = match lag {
            lag if lag > 0 => Some(SmolStr::new(symbol)),
            lag if lag < 0 => Some(counterpart.clone()),
            _ => None,
        };

        Some(LeadLagEstimate {
            counterpart,
            lag,
            correlation,
            leader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i)
    }

    #[test]
    fn test_currency_leg() {
        struct TestCase {
            symbol: &'static str,
            rate: f64,
            expected: Option<(&'static str, f64)>,
        }

        let tests = vec![
            TestCase {
                // TC0: USD quote currency, rate used as-is
                symbol: "AUDUSD",
                rate: 0.66,
                expected: Some(("AUD", 0.66)),
            },
            TestCase {
                // TC1: USD base currency is inverted
                symbol: "USDCAD",
                rate: 1.25,
                expected: Some(("CAD", 0.8)),
            },
            TestCase {
                // TC2: cross has no USD leg
                symbol: "EURGBP",
                rate: 0.85,
                expected: None,
            },
            TestCase {
                // TC3: malformed symbol
                symbol: "GOLD",
                rate: 2000.0,
                expected: None,
            },
            TestCase {
                // TC4: cannot invert a zero rate
                symbol: "USDNOK",
                rate: 0.0,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = currency_leg(test.symbol, test.rate);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_routes_cover_every_asset_class() {
        let routes = default_routes();
        for class in [
            AssetClass::Forex,
            AssetClass::Index,
            AssetClass::Commodity,
            AssetClass::Bond,
        ] {
            assert!(routes.contains_key(&class), "{class} has no route");
        }
        assert_eq!(
            routes[&AssetClass::Forex].to_vec(),
            vec![Route::CurrencyLeg, Route::DollarComponent]
        );
    }

    #[test]
    fn test_ingest_rejects_non_finite_without_recording() {
        let system = CrossAssetCorrelationSystem::default();
        let actual = system.ingest(AssetData::new("GOLD", AssetClass::Commodity, f64::NAN, ts(0)));

        assert_eq!(
            actual,
            Err(EngineError::NonFiniteValue {
                symbol: SmolStr::new("GOLD"),
                field: "price",
            })
        );
        assert!(system.snapshot("GOLD", 10).is_empty());
        assert_eq!(system.generation(), 0);
    }

    #[test]
    fn test_bond_routing_requires_yield() {
        let system = CrossAssetCorrelationSystem::default();
        system
            .ingest(AssetData::new("US10Y", AssetClass::Bond, 98.5, ts(0)))
            .unwrap();
        assert_eq!(system.bond_differential("US10Y", "US10Y"), None);

        system
            .ingest(AssetData::new("US10Y", AssetClass::Bond, 98.4, ts(1)).with_yield(4.25))
            .unwrap();
        system
            .ingest(AssetData::new("BUND10Y", AssetClass::Bond, 131.2, ts(1)).with_yield(2.45))
            .unwrap();

        let spread = system.bond_differential("US10Y", "BUND10Y").unwrap();
        assert!((spread - 1.80).abs() < 0.001);
        assert_eq!(system.snapshot("US10Y", 10).len(), 2);
    }

    #[test]
    fn test_usd_base_pairs_feed_inverted_currency_leg() {
        let system = CrossAssetCorrelationSystem::default();
        for i in 0..60 {
            let oil = 80.0 * (1.0 + 0.01 * ((i * 7 % 5) as f64 - 2.0));
            // CAD strengthens exactly with oil: USDCAD = 1 / (oil / 60)
            let usdcad = 60.0 / oil;
            system
                .ingest(AssetData::new("OIL", AssetClass::Commodity, oil, ts(i)))
                .unwrap();
            system
                .ingest(AssetData::new("USDCAD", AssetClass::Forex, usdcad, ts(i)))
                .unwrap();
        }

        let signals = system.analyze().commodity_signals;
        let cad = &signals["CAD"];
        assert!((cad.correlations["OIL"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_record_once_per_generation() {
        let system = CrossAssetCorrelationSystem::default();
        for i in 0..60 {
            let price = 100.0 * (1.0 + 0.01 * ((i * 7 % 5) as f64 - 2.0));
            system
                .ingest(AssetData::new("SPX", AssetClass::Index, price, ts(i)))
                .unwrap();
            system
                .ingest(AssetData::new("NDX", AssetClass::Index, price * 3.6, ts(i)))
                .unwrap();
        }

        system.analyze();
        system.analyze();
        assert_eq!(system.regime.read().history_len("SPX", "NDX"), 1);

        system
            .ingest(AssetData::new("SPX", AssetClass::Index, 101.0, ts(60)))
            .unwrap();
        system.analyze();
        assert_eq!(system.regime.read().history_len("NDX", "SPX"), 2);
    }

    #[test]
    fn test_auto_record_uses_generation_read_before_compute() {
        let system = CrossAssetCorrelationSystem::default();
        for i in 0..60 {
            let price = 100.0 * (1.0 + 0.01 * ((i * 7 % 5) as f64 - 2.0));
            system
                .ingest(AssetData::new("SPX", AssetClass::Index, price, ts(i)))
                .unwrap();
            system
                .ingest(AssetData::new("NDX", AssetClass::Index, price * 3.6, ts(i)))
                .unwrap();
        }

        let generation = system.generation();
        let matrix = system.matrix.write().compute(50).cloned().unwrap();

        // Ingest lands between computing the matrix and recording it
        system
            .ingest(AssetData::new("SPX", AssetClass::Index, 101.0, ts(60)))
            .unwrap();
        let pairs: Vec<_> = matrix.pairs().collect();
        system.auto_record(&pairs, system.latest_timestamp(), generation);
        assert_eq!(system.regime.read().history_len("SPX", "NDX"), 1);

        // The matrix that includes the late ingest is still recorded, once
        system.analyze();
        assert_eq!(system.regime.read().history_len("SPX", "NDX"), 2);
        system.analyze();
        assert_eq!(system.regime.read().history_len("SPX", "NDX"), 2);
        // A stale caller cannot record over a newer generation
        system.auto_record(&pairs, system.latest_timestamp(), generation);
        assert_eq!(system.regime.read().history_len("SPX", "NDX"), 2);
    }

    #[test]
    fn test_analyze_pair_unknown_symbol() {
        let system = CrossAssetCorrelationSystem::default();
        let pair = system.analyze_pair("XAU");

        assert_eq!(pair.status, PairStatus::UnknownSymbol);
        assert_eq!(pair.observations, 0);
        assert_eq!(pair.latest_price, None);
        assert!(pair.correlations.is_empty());
        assert_eq!(pair.trading_implications.risk_factors, vec!["limited history"]);
    }
}
