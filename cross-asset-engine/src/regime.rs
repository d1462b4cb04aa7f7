//! Rolling correlation histories per asset pair, short-horizon forecasts and
//! regime-shift detection.
//!
//! Forecast: a mean-reversion pull towards the rolling mean plus a damped linear trend,
//! `change = -(current - mean) * w_mr + slope * horizon * w_tc`, with a
//! `±2σ√horizon` band. Detection compares the mean and dispersion of the most recent
//! window against the window preceding it.

use crate::{config::RegimeConfig, stats, store::TimeSeriesBuffer};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use itertools::Itertools;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, info};

/// Order-insensitive asset pair, stored with the lexicographically smaller symbol first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey(pub SmolStr, pub SmolStr);

impl PairKey {
    pub fn new(asset_a: &str, asset_b: &str) -> Self {
        if asset_a <= asset_b {
            Self(SmolStr::new(asset_a), SmolStr::new(asset_b))
        } else {
            Self(SmolStr::new(asset_b), SmolStr::new(asset_a))
        }
    }

    pub fn involves(&self, symbol: &str) -> bool {
        self.0 == symbol || self.1 == symbol
    }

    /// The other asset of the pair, if `symbol` is one of them.
    pub fn counterpart(&self, symbol: &str) -> Option<&SmolStr> {
        if self.0 == symbol {
            Some(&self.1)
        } else if self.1 == symbol {
            Some(&self.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationTrend {
    #[display("strengthening")]
    Strengthening,
    #[display("weakening")]
    Weakening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    #[display("high")]
    High,
    #[display("normal")]
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPrediction {
    pub pair: PairKey,
    pub current: f64,
    pub predicted: f64,
    pub predicted_change: f64,
    pub horizon: usize,
    /// `2 * volatility * sqrt(horizon)`, unclamped.
    pub band_half_width: f64,
    /// Band bounds clamped to [-1, 1].
    pub lower: f64,
    pub upper: f64,
    pub slope: f64,
    pub mean: f64,
    pub volatility: f64,
    pub trend: CorrelationTrend,
    pub volatility_level: VolatilityLevel,
}

impl CorrelationPrediction {
    pub fn is_high_volatility(&self) -> bool {
        self.volatility_level == VolatilityLevel::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RegimeChangeKind {
    #[display("mean_shift")]
    MeanShift,
    #[display("volatility_shift")]
    VolatilityShift,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeChange {
    pub pair: PairKey,
    pub kind: RegimeChangeKind,
    pub baseline_mean: f64,
    pub recent_mean: f64,
    pub mean_shift: f64,
    pub baseline_std: f64,
    pub recent_std: f64,
    pub std_shift: f64,
    /// `mean_shift + std_shift`, used for ranking.
    pub magnitude: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    #[default]
    #[display("stable")]
    Stable,
    #[display("regime_transition")]
    RegimeTransition,
    #[display("correlation_breakdown")]
    CorrelationBreakdown,
    #[display("increasing_dispersion")]
    IncreasingDispersion,
    #[display("minor_adjustments")]
    MinorAdjustments,
}

impl MarketRegime {
    pub fn classify(pairs_evaluated: usize, mean_shifts: usize, volatility_shifts: usize) -> Self {
        if mean_shifts + volatility_shifts == 0 {
            Self::Stable
        } else if pairs_evaluated > 0 && mean_shifts * 2 >= pairs_evaluated {
            Self::RegimeTransition
        } else if mean_shifts > volatility_shifts {
            Self::CorrelationBreakdown
        } else if volatility_shifts > mean_shifts {
            Self::IncreasingDispersion
        } else {
            Self::MinorAdjustments
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RegimeSummary {
    pub market_regime: MarketRegime,
    pub pairs_tracked: usize,
    pub pairs_evaluated: usize,
    pub mean_shifts: usize,
    pub volatility_shifts: usize,
    /// Largest magnitude first.
    pub changes: Vec<RegimeChange>,
}

#[derive(Debug, Clone)]
pub struct PredictiveRegimeModel {
    histories: FnvHashMap<PairKey, TimeSeriesBuffer>,
    config: RegimeConfig,
}

impl PredictiveRegimeModel {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            histories: FnvHashMap::default(),
            config,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn record(
        &mut self,
        asset_a: &str,
        asset_b: &str,
        correlation: f64,
        timestamp: DateTime<Utc>,
    ) {
        if !correlation.is_finite() {
            debug!(%asset_a, %asset_b, "ignoring non-finite correlation");
            return;
        }

        let capacity = self.config.history_capacity;
        self.histories
            .entry(PairKey::new(asset_a, asset_b))
            .or_insert_with(|| TimeSeriesBuffer::new(capacity))
            .record(correlation.clamp(-1.0, 1.0), 0.0, timestamp);
    }

    pub fn history_len(&self, asset_a: &str, asset_b: &str) -> usize {
        self.histories
            .get(&PairKey::new(asset_a, asset_b))
            .map_or(0, TimeSeriesBuffer::len)
    }

    /// Tracked pairs, sorted.
    pub fn pairs(&self) -> Vec<PairKey> {
        self.histories.keys().cloned().sorted().collect()
    }

    pub fn predict(
        &self,
        asset_a: &str,
        asset_b: &str,
        horizon: usize,
    ) -> Option<CorrelationPrediction> {
        let pair = PairKey::new(asset_a, asset_b);
        let history = self
            .histories
            .get(&pair)
            .filter(|history| history.len() >= self.config.min_prediction_samples)?;

        let config = &self.config;
        let window = history.prices(config.min_prediction_samples);
        let current = *window.last()?;
        let slope = stats::linear_slope(&history.prices(config.trend_window))?;
        let mean = stats::mean(&window)?;
        let volatility = stats::std_dev(&window)?;

        let horizon_f = horizon as f64;
        let predicted_change = -(current - mean) * config.mean_reversion_weight
            + slope * horizon_f * config.trend_continuation_weight;
        let predicted = (current + predicted_change).clamp(-1.0, 1.0);
        let band_half_width = 2.0 * volatility * horizon_f.sqrt();

        Some(CorrelationPrediction {
            pair,
            current,
            predicted,
            predicted_change,
            horizon,
            band_half_width,
            lower: (predicted - band_half_width).clamp(-1.0, 1.0),
            upper: (predicted + band_half_width).clamp(-1.0, 1.0),
            slope,
            mean,
            volatility,
            trend: if slope > 0.0 {
                CorrelationTrend::Strengthening
            } else {
                CorrelationTrend::Weakening
            },
            volatility_level: if volatility > config.high_volatility {
                VolatilityLevel::High
            } else {
                VolatilityLevel::Normal
            },
        })
    }

    /// Predictions for every tracked pair involving `symbol` that has enough history.
    pub fn predictions_for(&self, symbol: &str, horizon: usize) -> Vec<CorrelationPrediction> {
        self.pairs()
            .into_iter()
            .filter(|pair| pair.involves(symbol))
            .filter_map(|pair| self.predict(&pair.0, &pair.1, horizon))
            .collect()
    }

    fn detect_pair(&self, pair: &PairKey, history: &TimeSeriesBuffer) -> Option<RegimeChange> {
        let config = &self.config;
        let span_len = config.recent_window + config.baseline_window;
        let span = history.prices(span_len);
        if span.len() < span_len {
            return None;
        }
        let (baseline, recent) = span.split_at(config.baseline_window);

        let baseline_mean = stats::mean(baseline)?;
        let recent_mean = stats::mean(recent)?;
        let baseline_std = stats::std_dev(baseline)?;
        let recent_std = stats::std_dev(recent)?;

        let mean_shift = (recent_mean - baseline_mean).abs();
        let std_shift = (recent_std - baseline_std).abs();

        let kind = if mean_shift >= config.mean_shift_threshold {
            RegimeChangeKind::MeanShift
        } else if std_shift >= config.std_shift_threshold {
            RegimeChangeKind::VolatilityShift
        } else {
            return None;
        };

        let detected_at = history.latest()?.timestamp;
        info!(asset_a = %pair.0, asset_b = %pair.1, %kind, mean_shift, std_shift, "correlation regime change detected");

        Some(RegimeChange {
            pair: pair.clone(),
            kind,
            baseline_mean,
            recent_mean,
            mean_shift,
            baseline_std,
            recent_std,
            std_shift,
            magnitude: mean_shift + std_shift,
            detected_at,
        })
    }

    pub fn detect_regime_changes(&self) -> RegimeSummary {
        let evaluated: Vec<(&PairKey, &TimeSeriesBuffer)> = self
            .histories
            .iter()
            .filter(|(_, history)| history.len() >= self.config.min_detection_samples)
            .collect();

        let mut changes: Vec<RegimeChange> = evaluated
            .iter()
            .filter_map(|(pair, history)| self.detect_pair(pair, history))
            .collect();

        changes.sort_by(|a, b| {
            b.magnitude
                .total_cmp(&a.magnitude)
                .then_with(|| a.pair.cmp(&b.pair))
        });

        let mean_shifts = changes
            .iter()
            .filter(|change| change.kind == RegimeChangeKind::MeanShift)
            .count();
        let volatility_shifts = changes.len() - mean_shifts;

        RegimeSummary {
            market_regime: MarketRegime::classify(evaluated.len(), mean_shifts, volatility_shifts),
            pairs_tracked: self.histories.len(),
            pairs_evaluated: evaluated.len(),
            mean_shifts,
            volatility_shifts,
            changes,
        }
    }
}
