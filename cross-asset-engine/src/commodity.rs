//! Commodity currencies versus the commodities that drive them.
//!
//! Each mapped currency is correlated against its reference commodities using
//! percentage returns (never raw prices) over the last `period` observations.

use crate::{
    stats,
    store::{TimeSeriesBuffer, buffer_entry},
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

/// Currency code to reference commodity basket.
pub const COMMODITY_CURRENCIES: &[(&str, &[&str])] = &[
    ("AUD", &["GOLD", "IRON_ORE", "COAL"]),
    ("CAD", &["OIL", "NATURAL_GAS"]),
    ("NZD", &["DAIRY", "WHEAT"]),
    ("NOK", &["BRENT", "OIL"]),
    ("ZAR", &["GOLD", "PLATINUM"]),
    ("CLP", &["COPPER"]),
    ("BRL", &["IRON_ORE", "SOYBEANS"]),
];

/// Look up the reference basket of a commodity currency.
pub fn basket(currency: &str) -> Option<&'static [&'static str]> {
    COMMODITY_CURRENCIES
        .iter()
        .find(|(code, _)| *code == currency)
        .map(|(_, commodities)| *commodities)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CommoditySignalKind {
    #[display("strong_positive")]
    StrongPositive,
    #[display("moderate_positive")]
    ModeratePositive,
    #[display("neutral")]
    Neutral,
    #[display("moderate_negative")]
    ModerateNegative,
    #[display("strong_negative")]
    StrongNegative,
}

impl CommoditySignalKind {
    pub fn from_average(average: f64) -> Self {
        if average >= 0.7 {
            Self::StrongPositive
        } else if average >= 0.3 {
            Self::ModeratePositive
        } else if average <= -0.7 {
            Self::StrongNegative
        } else if average <= -0.3 {
            Self::ModerateNegative
        } else {
            Self::Neutral
        }
    }
}

/// Aggregate currency/commodity relationship for one currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommodityCurrencySignal {
    pub currency: SmolStr,
    /// Valid per-commodity correlations only.
    pub correlations: BTreeMap<SmolStr, f64>,
    pub average_correlation: f64,
    pub signal: CommoditySignalKind,
    pub strength: f64,
}

#[derive(Debug, Clone)]
pub struct CommodityCurrencyModule {
    currencies: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    commodities: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
    period: usize,
}

impl CommodityCurrencyModule {
    pub fn new(capacity: usize, period: usize) -> Self {
        Self {
            currencies: FnvHashMap::default(),
            commodities: FnvHashMap::default(),
            capacity,
            period,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Record a currency rate expressed as USD per unit of `currency`.
    pub fn record_currency(&mut self, currency: &str, rate: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.currencies, currency, self.capacity).record(rate, 0.0, timestamp);
    }

    pub fn record_commodity(
        &mut self,
        commodity: &str,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) {
        buffer_entry(&mut self.commodities, commodity, self.capacity)
            .record(price, volume, timestamp);
    }

    /// Pearson correlation of returns over the last `period` timestamps both series
    /// observed. `None` if fewer than `period` timestamps are shared or the correlation
    /// is undefined.
    pub fn correlation(&self, currency: &str, commodity: &str, period: usize) -> Option<f64> {
        let currency_buffer = self.currencies.get(currency)?;
        let commodity_buffer = self.commodities.get(commodity)?;

        let (currency_returns, commodity_returns) =
            currency_buffer.aligned_returns(commodity_buffer, period)?;
        stats::pearson(&currency_returns, &commodity_returns)
    }

    pub fn signal(&self, currency: &str) -> Option<CommodityCurrencySignal> {
        let commodities = basket(currency)?;

        let correlations: BTreeMap<SmolStr, f64> = commodities
            .iter()
            .filter_map(|commodity| {
                self.correlation(currency, commodity, self.period)
                    .map(|r| (SmolStr::new(commodity), r))
            })
            .collect();

        if correlations.is_empty() {
            debug!(%currency, period = self.period, "commodity signal skipped: no valid correlations");
            return None;
        }

        let average = correlations.values().sum::<f64>() / correlations.len() as f64;

        Some(CommodityCurrencySignal {
            currency: SmolStr::new(currency),
            correlations,
            average_correlation: average,
            signal: CommoditySignalKind::from_average(average),
            strength: average.abs(),
        })
    }

    /// Signals for every mapped currency that has at least one valid correlation.
    pub fn signals(&self) -> BTreeMap<SmolStr, CommodityCurrencySignal> {
        COMMODITY_CURRENCIES
            .iter()
            .filter_map(|(currency, _)| self.signal(currency))
            .map(|signal| (signal.currency.clone(), signal))
            .collect()
    }
}
