//! Snapshot types returned by the two queries of the engine: the comprehensive
//! [`MarketAnalysis`] and the symbol-centred [`PairAnalysis`].

use crate::{
    bond::BondAnalysis,
    commodity::CommodityCurrencySignal,
    divergence::IntermarketDivergence,
    dollar::{DollarAnalysis, DollarSignal},
    equity::{RiskSentiment, RiskSentimentReport, SectorRotation},
    matrix::CorrelationResult,
    regime::{CorrelationPrediction, RegimeSummary},
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// |r| from which a counterpart counts as a primary driver.
pub const PRIMARY_DRIVER_THRESHOLD: f64 = 0.5;

/// Maximum number of primary drivers reported.
pub const MAX_PRIMARY_DRIVERS: usize = 3;

/// Divergence severity from which the suggested timeframe shortens.
pub const URGENT_SEVERITY: f64 = 50.0;

/// Consolidated positioning derived from risk sentiment and dollar strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradingBias {
    pub overall: &'static str,
    pub forex: &'static str,
    pub equity: &'static str,
    pub commodity: &'static str,
}

impl TradingBias {
    pub const MIXED: Self = Self {
        overall: "mixed",
        forex: "selective",
        equity: "selective",
        commodity: "selective",
    };

    /// Fixed decision table. Combinations outside it, or no dollar signal, are mixed.
    pub fn derive(sentiment: RiskSentiment, dollar: Option<DollarSignal>) -> Self {
        let Some(dollar) = dollar else {
            return Self::MIXED;
        };

        match sentiment {
            RiskSentiment::RiskOn if dollar.is_weak() => Self {
                overall: "risk_on_weak_dollar",
                forex: "sell_usd",
                equity: "buy_cyclicals",
                commodity: "buy_commodities",
            },
            RiskSentiment::RiskOn if dollar.is_strong() => Self {
                overall: "selective_risk_on",
                forex: "buy_usd_vs_em",
                equity: "buy_us_equities",
                commodity: "neutral",
            },
            RiskSentiment::RiskOff if dollar.is_strong() => Self {
                overall: "risk_off_strong_dollar",
                forex: "buy_usd_safe_havens",
                equity: "buy_defensives",
                commodity: "sell_commodities",
            },
            RiskSentiment::RiskOff if dollar.is_weak() => Self {
                overall: "risk_off_weak_dollar",
                forex: "buy_jpy_chf",
                equity: "buy_defensives",
                commodity: "buy_gold",
            },
            _ => Self::MIXED,
        }
    }
}

/// Comprehensive snapshot composed from every module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalysis {
    /// Latest ingested timestamp, `None` before the first ingest.
    pub as_of: Option<DateTime<Utc>>,
    pub symbols_tracked: usize,
    pub risk_sentiment: RiskSentimentReport,
    pub dollar: DollarAnalysis,
    pub bonds: BondAnalysis,
    pub commodity_signals: BTreeMap<SmolStr, CommodityCurrencySignal>,
    pub sector_rotation: SectorRotation,
    pub divergences: Vec<IntermarketDivergence>,
    /// Symbols that qualified for this cycle's correlation matrix.
    pub matrix_symbols: Vec<SmolStr>,
    pub top_correlations: Vec<CorrelationResult>,
    pub regime: RegimeSummary,
    pub trading_bias: TradingBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    #[display("unknown_symbol")]
    UnknownSymbol,
    #[display("insufficient_data")]
    InsufficientData,
    #[display("active")]
    Active,
}

/// Which of two assets moves first, from lagged return correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadLagEstimate {
    pub counterpart: SmolStr,
    /// Positive: the queried symbol leads by `lag` observations. Negative: the
    /// counterpart leads.
    pub lag: i32,
    pub correlation: f64,
    /// `None` when the best alignment is simultaneous.
    pub leader: Option<SmolStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[display("short_term")]
    ShortTerm,
    #[display("swing")]
    Swing,
    #[display("medium_term")]
    MediumTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    #[display("normal")]
    Normal,
    #[display("reduced")]
    Reduced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingImplications {
    pub primary_drivers: Vec<SmolStr>,
    pub risk_factors: Vec<String>,
    pub suggested_timeframe: Timeframe,
    pub position_sizing: PositionSizing,
}

impl TradingImplications {
    pub fn derive(
        symbol: &str,
        status: PairStatus,
        correlations: &[CorrelationResult],
        divergences: &[IntermarketDivergence],
        predictions: &[CorrelationPrediction],
    ) -> Self {
        let primary_drivers = primary_drivers(symbol, correlations);

        let mut risk_factors: Vec<String> = divergences
            .iter()
            .filter_map(|divergence| divergence.counterpart(symbol))
            .map(|other| format!("divergence with {other}"))
            .collect();
        risk_factors.extend(
            predictions
                .iter()
                .filter(|prediction| prediction.is_high_volatility())
                .filter_map(|prediction| prediction.pair.counterpart(symbol))
                .map(|other| format!("unstable correlation with {other}")),
        );
        if status != PairStatus::Active {
            risk_factors.push("limited history".to_string());
        }

        let suggested_timeframe = if divergences
            .iter()
            .any(|divergence| divergence.severity >= URGENT_SEVERITY)
        {
            Timeframe::ShortTerm
        } else if !divergences.is_empty() {
            Timeframe::Swing
        } else {
            Timeframe::MediumTerm
        };

        let position_sizing = if risk_factors.is_empty() {
            PositionSizing::Normal
        } else {
            PositionSizing::Reduced
        };

        Self {
            primary_drivers,
            risk_factors,
            suggested_timeframe,
            position_sizing,
        }
    }
}

/// Up to three counterparts with `|r| >= 0.5`, in the order of `correlations`.
pub fn primary_drivers(symbol: &str, correlations: &[CorrelationResult]) -> Vec<SmolStr> {
    correlations
        .iter()
        .filter(|result| result.correlation.abs() >= PRIMARY_DRIVER_THRESHOLD)
        .filter_map(|result| result.counterpart(symbol).cloned())
        .take(MAX_PRIMARY_DRIVERS)
        .collect()
}

/// Symbol-centred snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairAnalysis {
    pub symbol: SmolStr,
    pub status: PairStatus,
    pub observations: usize,
    pub latest_price: Option<f64>,
    /// Strongest first.
    pub correlations: Vec<CorrelationResult>,
    pub divergences: Vec<IntermarketDivergence>,
    pub predictions: Vec<CorrelationPrediction>,
    pub lead_lag: Vec<LeadLagEstimate>,
    pub trading_implications: TradingImplications,
}
