/// Cross-Asset Correlation Engine
///
/// Streaming statistical analytics across forex, equity index, commodity and bond
/// instruments. One [`AssetData`] update is pushed at a time; on demand the engine
/// composes a comprehensive [`MarketAnalysis`] or a symbol-centred [`PairAnalysis`].
///
/// Modules, leaf first:
/// - store: bounded rolling buffers per symbol
/// - bond: yield differentials, curve slope and trend classification
/// - commodity: commodity currencies versus their reference commodities
/// - equity: risk-on / risk-off sentiment and sector rotation
/// - dollar: synthetic weighted geometric dollar index
/// - divergence: trend mismatches between known correlated pairs
/// - matrix: pairwise return correlation matrix
/// - regime: correlation forecasts and regime-shift detection
/// - engine: routing by asset class and snapshot composition
pub mod analysis;
pub mod bond;
pub mod commodity;
pub mod config;
pub mod divergence;
pub mod dollar;
pub mod engine;
pub mod equity;
pub mod error;
pub mod matrix;
pub mod regime;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use analysis::{
    LeadLagEstimate, MarketAnalysis, PairAnalysis, PairStatus, PositionSizing, Timeframe,
    TradingBias, TradingImplications,
};
pub use config::{DivergenceConfig, EngineConfig, RegimeConfig};
pub use engine::CrossAssetCorrelationSystem;
pub use error::EngineError;
pub use types::{AssetClass, AssetData, CorrelationDirection, DataStatus, Observation};

pub use bond::{BondAnalysis, BondYieldModule, YieldTrend};
pub use commodity::{CommodityCurrencyModule, CommodityCurrencySignal, CommoditySignalKind};
pub use divergence::{DivergenceDetector, IntermarketDivergence};
pub use dollar::{DollarAnalysis, DollarIndexModule, DollarSignal, DollarTrend, DxyComponent};
pub use equity::{EquityRiskModule, RiskSentiment, RiskSentimentReport, SectorRotation};
pub use matrix::{CorrelationMatrix, CorrelationMatrixEngine, CorrelationResult, CorrelationStrength};
pub use regime::{
    CorrelationPrediction, MarketRegime, PairKey, PredictiveRegimeModel, RegimeChange,
    RegimeChangeKind, RegimeSummary,
};
pub use store::{AssetStore, TimeSeriesBuffer};
