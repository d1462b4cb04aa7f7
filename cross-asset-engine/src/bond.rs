//! Government bond yields: differentials, curve slope and trend classification.

use crate::store::{TimeSeriesBuffer, buffer_entry};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

pub const US_10Y: &str = "US10Y";
pub const US_2Y: &str = "US2Y";
pub const BUND_10Y: &str = "BUND10Y";

/// Bonds reported in the comprehensive snapshot.
pub const TRACKED_BONDS: [&str; 5] = [US_2Y, US_10Y, BUND_10Y, "GILT10Y", "JGB10Y"];

/// Relative change (in percent) beyond which a yield trend counts as fast.
const FAST_TREND_PCT: f64 = 5.0;

/// Direction of a yield series over the trend period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum YieldTrend {
    #[display("rising_fast")]
    RisingFast,
    #[display("rising")]
    Rising,
    #[display("stable")]
    Stable,
    #[display("falling")]
    Falling,
    #[display("falling_fast")]
    FallingFast,
    #[display("insufficient_data")]
    InsufficientData,
}

/// Bond section of the comprehensive snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BondAnalysis {
    pub yield_trends: BTreeMap<SmolStr, YieldTrend>,
    /// US10Y minus BUND10Y.
    pub us_german_spread: Option<f64>,
    /// US10Y minus US2Y. Positive is a normal curve, negative inverted.
    pub curve_slope: Option<f64>,
    pub curve_inverted: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BondYieldModule {
    yields: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
    trend_period: usize,
}

impl BondYieldModule {
    pub fn new(capacity: usize, trend_period: usize) -> Self {
        Self {
            yields: FnvHashMap::default(),
            capacity,
            trend_period,
        }
    }

    pub fn record_yield(&mut self, bond_id: &str, yield_value: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.yields, bond_id, self.capacity).record(yield_value, 0.0, timestamp);
    }

    pub fn latest(&self, bond_id: &str) -> Option<f64> {
        self.yields.get(bond_id)?.latest_price()
    }

    /// `latest(a) - latest(b)`, `None` if either bond has no data.
    pub fn differential(&self, bond_a: &str, bond_b: &str) -> Option<f64> {
        Some(self.latest(bond_a)? - self.latest(bond_b)?)
    }

    /// Long minus short yield. Positive slope is a normal curve, negative inverted.
    pub fn curve_slope(&self, short: &str, long: &str) -> Option<f64> {
        self.differential(long, short)
    }

    pub fn trend_classification(&self, bond_id: &str) -> YieldTrend {
        let Some(buffer) = self
            .yields
            .get(bond_id)
            .filter(|buffer| buffer.len() >= self.trend_period)
        else {
            debug!(bond = %bond_id, period = self.trend_period, "yield trend skipped: insufficient data");
            return YieldTrend::InsufficientData;
        };

        let recent = buffer.prices(self.trend_period);
        let (first, last) = (recent[0], recent[recent.len() - 1]);
        if first == 0.0 {
            return YieldTrend::Stable;
        }

        // Relative to |first| so a negative yield moving up still reads as rising
        let change_pct = (last - first) / first.abs() * 100.0;
        if change_pct > FAST_TREND_PCT {
            YieldTrend::RisingFast
        } else if change_pct > 0.0 {
            YieldTrend::Rising
        } else if change_pct < -FAST_TREND_PCT {
            YieldTrend::FallingFast
        } else if change_pct < 0.0 {
            YieldTrend::Falling
        } else {
            YieldTrend::Stable
        }
    }

    pub fn analysis(&self) -> BondAnalysis {
        let mut bonds: Vec<&str> = TRACKED_BONDS.to_vec();
        bonds.extend(
            self.yields
                .keys()
                .map(SmolStr::as_str)
                .filter(|bond| !TRACKED_BONDS.iter().any(|tracked| tracked == bond)),
        );

        let yield_trends = bonds
            .into_iter()
            .map(|bond| (SmolStr::new(bond), self.trend_classification(bond)))
            .collect();

        let curve_slope = self.curve_slope(US_2Y, US_10Y);

        BondAnalysis {
            yield_trends,
            us_german_spread: self.differential(US_10Y, BUND_10Y),
            curve_slope,
            curve_inverted: curve_slope.map(|slope| slope < 0.0),
        }
    }
}
