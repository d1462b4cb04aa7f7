//! Risk-on / risk-off sentiment from momentum and volume across curated baskets.

use crate::store::{TimeSeriesBuffer, buffer_entry};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::debug;

/// Growth-sensitive indices.
pub const RISK_ON_BASKET: [&str; 6] = ["SPX", "NDX", "RUT", "DAX", "NIKKEI", "HSI"];

/// Defensive havens: volatility, defensive sectors and long treasuries.
pub const RISK_OFF_BASKET: [&str; 5] = ["VIX", "XLU", "XLP", "XLV", "TLT"];

/// Momentum above which an asset scores two points instead of one.
const STRONG_MOMENTUM: f64 = 0.02;

/// Volume trend above which an asset scores one additional point.
const VOLUME_EXPANSION: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSentiment {
    #[display("RISK_ON")]
    RiskOn,
    #[display("RISK_OFF")]
    RiskOff,
    #[display("MIXED")]
    Mixed,
    #[default]
    #[display("NEUTRAL")]
    Neutral,
}

impl RiskSentiment {
    /// Classify from the summed basket scores.
    pub fn classify(risk_on: u32, risk_off: u32) -> Self {
        let total = risk_on + risk_off;
        if total == 0 {
            return Self::Neutral;
        }

        let ratio = risk_on as f64 / total as f64;
        if ratio > 0.7 {
            Self::RiskOn
        } else if ratio < 0.3 {
            Self::RiskOff
        } else if risk_on.abs_diff(risk_off) < 3 {
            Self::Mixed
        } else {
            Self::Neutral
        }
    }
}

/// Momentum and volume statistics for one basket member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMomentum {
    pub symbol: SmolStr,
    pub momentum: f64,
    pub volume_trend: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSentimentReport {
    pub sentiment: RiskSentiment,
    pub risk_on_score: u32,
    pub risk_off_score: u32,
    /// `risk_on / (risk_on + risk_off)`, `None` when both are zero.
    pub risk_on_ratio: Option<f64>,
    pub risk_on_assets: Vec<AssetMomentum>,
    pub risk_off_assets: Vec<AssetMomentum>,
}

/// Static sector recommendation for a sentiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorRotation {
    pub sentiment: RiskSentiment,
    pub stance: &'static str,
    pub recommended: Vec<&'static str>,
    pub avoid: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct EquityRiskModule {
    series: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
    lookback: usize,
}

impl EquityRiskModule {
    pub fn new(capacity: usize, lookback: usize) -> Self {
        Self {
            series: FnvHashMap::default(),
            capacity,
            lookback,
        }
    }

    pub fn update_equity(
        &mut self,
        symbol: &str,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) {
        buffer_entry(&mut self.series, symbol, self.capacity).record(price, volume, timestamp);
    }

    /// Momentum, volume trend and score for `symbol`; `None` below the lookback.
    pub fn asset_momentum(&self, symbol: &str) -> Option<AssetMomentum> {
        let buffer = self.series.get(symbol)?;
        if buffer.len() < self.lookback {
            return None;
        }

        let prices = buffer.prices(self.lookback);
        let volumes = buffer.volumes(self.lookback);

        let first = prices[0];
        let momentum = if first != 0.0 {
            (prices[prices.len() - 1] - first) / first.abs()
        } else {
            0.0
        };

        let volume_trend = volume_trend(&volumes);

        let mut score = 0;
        if momentum > STRONG_MOMENTUM {
            score += 2;
        } else if momentum > 0.0 {
            score += 1;
        }
        if volume_trend > VOLUME_EXPANSION {
            score += 1;
        }

        Some(AssetMomentum {
            symbol: SmolStr::new(symbol),
            momentum,
            volume_trend,
            score,
        })
    }

    fn basket_momentum(&self, basket: &[&str]) -> Vec<AssetMomentum> {
        basket
            .iter()
            .filter_map(|symbol| self.asset_momentum(symbol))
            .collect()
    }

    pub fn calculate_risk_sentiment(&self) -> RiskSentimentReport {
        let risk_on_assets = self.basket_momentum(&RISK_ON_BASKET);
        let risk_off_assets = self.basket_momentum(&RISK_OFF_BASKET);

        let risk_on_score = risk_on_assets.iter().map(|a| a.score).sum::<u32>();
        let risk_off_score = risk_off_assets.iter().map(|a| a.score).sum::<u32>();
        let total = risk_on_score + risk_off_score;

        if risk_on_assets.is_empty() && risk_off_assets.is_empty() {
            debug!(lookback = self.lookback, "risk sentiment defaulted: no basket member has enough history");
        }

        RiskSentimentReport {
            sentiment: RiskSentiment::classify(risk_on_score, risk_off_score),
            risk_on_score,
            risk_off_score,
            risk_on_ratio: (total > 0).then(|| risk_on_score as f64 / total as f64),
            risk_on_assets,
            risk_off_assets,
        }
    }

    pub fn sector_rotation_signals(&self) -> SectorRotation {
        sector_rotation(self.calculate_risk_sentiment().sentiment)
    }
}

/// `mean(last 5 volumes) / mean(volumes[-20:-15])`, defaulting to 1.0 when the
/// baseline is zero or the window is too short.
fn volume_trend(volumes: &[f64]) -> f64 {
    let n = volumes.len();
    if n < 20 {
        return 1.0;
    }

    let recent = volumes[n - 5..].iter().sum::<f64>() / 5.0;
    let baseline = volumes[n - 20..n - 15].iter().sum::<f64>() / 5.0;

    if baseline > 0.0 {
        recent / baseline
    } else {
        1.0
    }
}

pub fn sector_rotation(sentiment: RiskSentiment) -> SectorRotation {
    let (stance, recommended, avoid) = match sentiment {
        RiskSentiment::RiskOn => (
            "cyclical",
            vec!["Technology", "Consumer Discretionary", "Financials", "Industrials"],
            vec!["Utilities", "Consumer Staples", "Healthcare"],
        ),
        RiskSentiment::RiskOff => (
            "defensive",
            vec!["Utilities", "Consumer Staples", "Healthcare"],
            vec!["Technology", "Consumer Discretionary", "Financials"],
        ),
        RiskSentiment::Mixed | RiskSentiment::Neutral => (
            "balanced",
            vec!["Healthcare", "Technology"],
            vec![],
        ),
    };

    SectorRotation {
        sentiment,
        stance,
        recommended,
        avoid,
    }
}
