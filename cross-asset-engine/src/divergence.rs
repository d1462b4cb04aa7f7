//! Trend mismatches between instruments with a known expected correlation sign.

use crate::{
    config::DivergenceConfig,
    stats,
    store::{TimeSeriesBuffer, buffer_entry},
    types::CorrelationDirection,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, info};

/// Multiplier turning a summed fractional trend into a 0-100 severity.
const SEVERITY_SCALE: f64 = 100.0 * 20.0;

/// A known market relationship and the sign its correlation is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub asset_a: &'static str,
    pub asset_b: &'static str,
    pub expected: CorrelationDirection,
}

impl Relationship {
    pub const fn new(
        asset_a: &'static str,
        asset_b: &'static str,
        expected: CorrelationDirection,
    ) -> Self {
        Self {
            asset_a,
            asset_b,
            expected,
        }
    }
}

/// Static table of relationships the detector evaluates.
pub const RELATIONSHIPS: [Relationship; 7] = [
    Relationship::new("GOLD", "DXY", CorrelationDirection::Negative),
    Relationship::new("SPX", "VIX", CorrelationDirection::Negative),
    Relationship::new("AUDUSD", "GOLD", CorrelationDirection::Positive),
    Relationship::new("USDCAD", "OIL", CorrelationDirection::Negative),
    Relationship::new("SPX", "NDX", CorrelationDirection::Positive),
    Relationship::new("US10Y", "USDJPY", CorrelationDirection::Positive),
    Relationship::new("COPPER", "AUDUSD", CorrelationDirection::Positive),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    #[display("price")]
    Price,
}

/// A flagged contradiction between observed co-movement and the expected sign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntermarketDivergence {
    pub assets: [SmolStr; 2],
    pub kind: DivergenceKind,
    pub expected: CorrelationDirection,
    pub trends: [f64; 2],
    /// 0 to 100.
    pub severity: f64,
    pub resolution: String,
    /// Fixed configured value, not a derived statistic.
    pub confidence: f64,
}

impl IntermarketDivergence {
    pub fn involves(&self, symbol: &str) -> bool {
        self.assets.iter().any(|asset| asset == symbol)
    }

    /// The other asset of the pair, if `symbol` is one of them.
    pub fn counterpart(&self, symbol: &str) -> Option<&SmolStr> {
        match &self.assets {
            [a, b] if a == symbol => Some(b),
            [a, b] if b == symbol => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    series: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
    config: DivergenceConfig,
}

impl DivergenceDetector {
    pub fn new(capacity: usize, config: DivergenceConfig) -> Self {
        Self {
            series: FnvHashMap::default(),
            capacity,
            config,
        }
    }

    pub fn update(&mut self, symbol: &str, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.series, symbol, self.capacity).record(price, volume, timestamp);
    }

    /// Record a derived series (the synthetic dollar index) keeping one value per timestamp.
    pub fn upsert(&mut self, symbol: &str, value: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.series, symbol, self.capacity).upsert(value, 0.0, timestamp);
    }

    /// `(last - value[-lookback]) / |value[-lookback]|`, `None` below `min_samples`.
    pub fn trend(&self, symbol: &str) -> Option<f64> {
        let buffer = self
            .series
            .get(symbol)
            .filter(|buffer| buffer.len() >= self.config.min_samples)?;

        let window = buffer.prices(self.config.lookback);
        stats::relative_change(window[0], window[window.len() - 1])
    }

    pub fn detect_divergences(&self) -> Vec<IntermarketDivergence> {
        let mut divergences: Vec<_> = RELATIONSHIPS
            .iter()
            .filter_map(|relationship| self.evaluate(relationship))
            .collect();

        divergences.sort_by(|a, b| {
            b.severity
                .total_cmp(&a.severity)
                .then_with(|| a.assets.cmp(&b.assets))
        });
        divergences
    }

    fn evaluate(&self, relationship: &Relationship) -> Option<IntermarketDivergence> {
        let &Relationship {
            asset_a,
            asset_b,
            expected,
        } = relationship;

        let (Some(trend_a), Some(trend_b)) = (self.trend(asset_a), self.trend(asset_b)) else {
            debug!(%asset_a, %asset_b, min_samples = self.config.min_samples, "divergence pair skipped: insufficient data");
            return None;
        };

        let threshold = self.config.trend_threshold;
        let up = |trend: f64| trend > threshold;
        let down = |trend: f64| trend < -threshold;

        let (severity, resolution) = match expected {
            CorrelationDirection::Positive => {
                let opposed = (up(trend_a) && down(trend_b)) || (down(trend_a) && up(trend_b));
                if !opposed {
                    return None;
                }
                let (leader, follower) = if trend_a.abs() >= trend_b.abs() {
                    (asset_a, asset_b)
                } else {
                    (asset_b, asset_a)
                };
                (
                    (trend_a - trend_b).abs() * SEVERITY_SCALE,
                    format!("{leader} leading, {follower} likely to follow"),
                )
            }
            CorrelationDirection::Negative => {
                let aligned = (up(trend_a) && up(trend_b)) || (down(trend_a) && down(trend_b));
                if !aligned {
                    return None;
                }
                let reverting = if trend_a.abs() < trend_b.abs() {
                    asset_a
                } else {
                    asset_b
                };
                (
                    (trend_a + trend_b).abs() * SEVERITY_SCALE,
                    format!("{reverting} expected to reverse"),
                )
            }
        };

        let severity = severity.clamp(0.0, 100.0);
        info!(%asset_a, %asset_b, %expected, trend_a, trend_b, severity, "intermarket divergence detected");

        Some(IntermarketDivergence {
            assets: [SmolStr::new(asset_a), SmolStr::new(asset_b)],
            kind: DivergenceKind::Price,
            expected,
            trends: [trend_a, trend_b],
            severity,
            resolution,
            confidence: self.config.confidence,
        })
    }
}
