//! Engine configuration.
//!
//! Every constant the analytics depend on lives here with its documented default.
//! [`EngineConfig::from_env`] overlays `CROSS_ASSET_*` environment variables on top of
//! the defaults, e.g. `CROSS_ASSET_BUFFER_CAPACITY=300`.

use crate::error::EngineError;
use serde::Serialize;
use std::str::FromStr;

/// Divergence Detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceConfig {
    /// Observations required per asset before a pair is evaluated.
    pub min_samples: usize,
    /// Trend is measured from `value[-lookback]` to the latest value.
    pub lookback: usize,
    /// Fractional move beyond which a trend counts as up/down (0.02 = 2%).
    pub trend_threshold: f64,
    /// Fixed confidence attached to every divergence. Not a derived statistic.
    pub confidence: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            min_samples: 50,
            lookback: 20,
            trend_threshold: 0.02,
            confidence: 0.7,
        }
    }
}

/// Predictive Regime Model parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeConfig {
    pub history_capacity: usize,
    pub min_prediction_samples: usize,
    pub trend_window: usize,
    pub mean_reversion_weight: f64,
    pub trend_continuation_weight: f64,
    pub min_detection_samples: usize,
    pub recent_window: usize,
    pub baseline_window: usize,
    pub mean_shift_threshold: f64,
    pub std_shift_threshold: f64,
    /// Correlation std above which a pair is labelled high volatility.
    pub high_volatility: f64,
    pub default_horizon: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            history_capacity: 200,
            min_prediction_samples: 30,
            trend_window: 10,
            mean_reversion_weight: 0.3,
            trend_continuation_weight: 0.5,
            min_detection_samples: 50,
            recent_window: 20,
            baseline_window: 30,
            mean_shift_threshold: 0.3,
            std_shift_threshold: 0.2,
            high_volatility: 0.2,
            default_horizon: 5,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    /// Capacity of every per-symbol rolling buffer.
    pub buffer_capacity: usize,
    pub matrix_period: usize,
    pub strong_correlation_threshold: f64,
    pub top_correlations: usize,
    pub commodity_period: usize,
    pub equity_lookback: usize,
    pub dollar_sma_period: usize,
    pub dollar_range_period: usize,
    pub bond_trend_period: usize,
    pub lead_lag_max: usize,
    /// Feed each fresh correlation matrix into the regime model during `analyze()`.
    pub auto_record_correlations: bool,
    pub divergence: DivergenceConfig,
    pub regime: RegimeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            matrix_period: 50,
            strong_correlation_threshold: 0.7,
            top_correlations: 10,
            commodity_period: 50,
            equity_lookback: 20,
            dollar_sma_period: 20,
            dollar_range_period: 50,
            bond_trend_period: 20,
            lead_lag_max: 5,
            auto_record_correlations: true,
            divergence: DivergenceConfig::default(),
            regime: RegimeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `CROSS_ASSET_*` environment variables, then validated.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_with(&lookup, "CROSS_ASSET_BUFFER_CAPACITY", &mut config.buffer_capacity)?;
        override_with(&lookup, "CROSS_ASSET_MATRIX_PERIOD", &mut config.matrix_period)?;
        override_with(
            &lookup,
            "CROSS_ASSET_STRONG_THRESHOLD",
            &mut config.strong_correlation_threshold,
        )?;
        override_with(&lookup, "CROSS_ASSET_TOP_CORRELATIONS", &mut config.top_correlations)?;
        override_with(&lookup, "CROSS_ASSET_COMMODITY_PERIOD", &mut config.commodity_period)?;
        override_with(&lookup, "CROSS_ASSET_LEAD_LAG_MAX", &mut config.lead_lag_max)?;
        override_with(
            &lookup,
            "CROSS_ASSET_AUTO_RECORD",
            &mut config.auto_record_correlations,
        )?;
        override_with(
            &lookup,
            "CROSS_ASSET_DIVERGENCE_CONFIDENCE",
            &mut config.divergence.confidence,
        )?;
        override_with(
            &lookup,
            "CROSS_ASSET_DIVERGENCE_THRESHOLD",
            &mut config.divergence.trend_threshold,
        )?;
        override_with(
            &lookup,
            "CROSS_ASSET_MEAN_REVERSION_WEIGHT",
            &mut config.regime.mean_reversion_weight,
        )?;
        override_with(
            &lookup,
            "CROSS_ASSET_TREND_WEIGHT",
            &mut config.regime.trend_continuation_weight,
        )?;
        override_with(
            &lookup,
            "CROSS_ASSET_REGIME_CAPACITY",
            &mut config.regime.history_capacity,
        )?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), EngineError> {
            Err(EngineError::InvalidConfig {
                field,
                reason: reason.to_string(),
            })
        };

        if self.buffer_capacity == 0 {
            return invalid("buffer_capacity", "must be greater than zero");
        }
        // Pearson needs at least two returns, so three prices
        if self.matrix_period < 3 {
            return invalid("matrix_period", "must be at least 3");
        }
        if self.commodity_period < 3 {
            return invalid("commodity_period", "must be at least 3");
        }
        if self.matrix_period > self.buffer_capacity
            || self.commodity_period > self.buffer_capacity
        {
            return invalid("buffer_capacity", "must hold at least one full period");
        }
        if !(0.0..=1.0).contains(&self.strong_correlation_threshold) {
            return invalid("strong_correlation_threshold", "must be within [0, 1]");
        }
        if self.equity_lookback < 20 {
            // Volume trend reads volumes[-20:-15]
            return invalid("equity_lookback", "must be at least 20");
        }
        if self.dollar_sma_period < 2 {
            return invalid("dollar_sma_period", "must be at least 2");
        }
        if self.dollar_range_period == 0 {
            return invalid("dollar_range_period", "must be greater than zero");
        }
        if self.bond_trend_period < 2 {
            return invalid("bond_trend_period", "must be at least 2");
        }
        if self.divergence.lookback < 2 || self.divergence.min_samples < self.divergence.lookback
        {
            return invalid("divergence.lookback", "must be >= 2 and <= min_samples");
        }
        if !(0.0..=1.0).contains(&self.divergence.confidence) {
            return invalid("divergence.confidence", "must be within [0, 1]");
        }
        if self.divergence.trend_threshold < 0.0 {
            return invalid("divergence.trend_threshold", "must not be negative");
        }

        let regime = &self.regime;
        if regime.trend_window < 2 {
            return invalid("regime.trend_window", "must be at least 2");
        }
        if regime.min_prediction_samples < regime.trend_window {
            return invalid("regime.min_prediction_samples", "must cover the trend window");
        }
        if regime.recent_window == 0 || regime.baseline_window == 0 {
            return invalid("regime.recent_window", "windows must be non-empty");
        }
        if regime.min_detection_samples < regime.recent_window + regime.baseline_window {
            return invalid(
                "regime.min_detection_samples",
                "must cover the recent and baseline windows",
            );
        }
        if regime.history_capacity < regime.min_detection_samples {
            return invalid("regime.history_capacity", "must hold min_detection_samples");
        }
        if regime.default_horizon == 0 {
            return invalid("regime.default_horizon", "must be greater than zero");
        }

        Ok(())
    }
}

fn override_with<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), EngineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value.trim().parse().map_err(|_| EngineError::EnvVar {
            key,
            value: value.clone(),
        })?;
    }
    Ok(())
}
