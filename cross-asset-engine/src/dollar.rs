//! Synthetic dollar index (DXY) built as a weighted geometric product of six rates.
//!
//! EUR enters inverted, `(1 / rate)^weight`; the other five enter directly,
//! `rate^weight`. The asymmetry is intentional and covered by tests.

use crate::{stats, store::TimeSeriesBuffer, types::DataStatus};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Serialize;
use tracing::{debug, info};

/// Symbol under which the synthetic index is published to other modules.
pub const DXY_SYMBOL: &str = "DXY";

/// Scaling constant of the index.
pub const DXY_BASE: f64 = 50.14348112;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum DxyComponent {
    #[display("EUR")]
    Eur,
    #[display("JPY")]
    Jpy,
    #[display("GBP")]
    Gbp,
    #[display("CAD")]
    Cad,
    #[display("SEK")]
    Sek,
    #[display("CHF")]
    Chf,
}

impl DxyComponent {
    pub const ALL: [DxyComponent; 6] = [
        DxyComponent::Eur,
        DxyComponent::Jpy,
        DxyComponent::Gbp,
        DxyComponent::Cad,
        DxyComponent::Sek,
        DxyComponent::Chf,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            DxyComponent::Eur => 0.576,
            DxyComponent::Jpy => 0.136,
            DxyComponent::Gbp => 0.119,
            DxyComponent::Cad => 0.091,
            DxyComponent::Sek => 0.042,
            DxyComponent::Chf => 0.036,
        }
    }

    /// Forex pair whose quote feeds this component.
    pub fn pair(&self) -> &'static str {
        match self {
            DxyComponent::Eur => "EURUSD",
            DxyComponent::Jpy => "USDJPY",
            DxyComponent::Gbp => "GBPUSD",
            DxyComponent::Cad => "USDCAD",
            DxyComponent::Sek => "USDSEK",
            DxyComponent::Chf => "USDCHF",
        }
    }

    pub fn from_pair(symbol: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|component| component.pair().eq_ignore_ascii_case(symbol))
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// This component's factor in the geometric product.
    fn factor(&self, rate: f64) -> f64 {
        match self {
            DxyComponent::Eur => (1.0 / rate).powf(self.weight()),
            _ => rate.powf(self.weight()),
        }
    }
}

/// Weighted geometric index from one rate per component (in [`DxyComponent::ALL`] order).
pub fn dollar_index(rates: &[f64; 6]) -> Option<f64> {
    let value = DxyComponent::ALL
        .iter()
        .zip(rates)
        .fold(DXY_BASE, |acc, (component, rate)| acc * component.factor(*rate));

    (value.is_finite() && value > 0.0).then_some(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DollarTrend {
    #[display("bullish")]
    Bullish,
    #[display("bearish")]
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DollarSignal {
    #[display("strong_dollar")]
    StrongDollar,
    #[display("moderate_dollar")]
    ModerateDollar,
    #[display("weak_dollar")]
    WeakDollar,
    #[display("moderate_weak")]
    ModerateWeak,
    #[display("neutral")]
    Neutral,
}

impl DollarSignal {
    pub fn derive(current: f64, sma: f64, momentum_pct: f64) -> Self {
        if current > sma && momentum_pct > 2.0 {
            Self::StrongDollar
        } else if current > sma && momentum_pct > 0.0 {
            Self::ModerateDollar
        } else if current < sma && momentum_pct < -2.0 {
            Self::WeakDollar
        } else if current < sma && momentum_pct < 0.0 {
            Self::ModerateWeak
        } else {
            Self::Neutral
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Self::StrongDollar | Self::ModerateDollar)
    }

    pub fn is_weak(&self) -> bool {
        matches!(self, Self::WeakDollar | Self::ModerateWeak)
    }
}

/// Dollar section of the comprehensive snapshot. Numeric fields are `None` until active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DollarAnalysis {
    pub status: DataStatus,
    pub value: Option<f64>,
    pub sma: Option<f64>,
    pub trend: Option<DollarTrend>,
    pub momentum_pct: Option<f64>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub signal: Option<DollarSignal>,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct DollarIndexModule {
    rates: [Option<f64>; 6],
    history: TimeSeriesBuffer,
    sma_period: usize,
    range_period: usize,
}

impl DollarIndexModule {
    pub fn new(capacity: usize, sma_period: usize, range_period: usize) -> Self {
        Self {
            rates: [None; 6],
            history: TimeSeriesBuffer::new(capacity),
            sma_period,
            range_period,
        }
    }

    /// Record a component rate. Returns the new index value when all six components
    /// have been observed. The history keeps one index value per timestamp.
    pub fn record_rate(
        &mut self,
        component: DxyComponent,
        rate: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<f64> {
        if rate <= 0.0 {
            debug!(%component, rate, "ignoring non-positive dollar component rate");
            return None;
        }
        self.rates[component.index()] = Some(rate);

        let value = self.compute_index()?;
        if self.history.is_empty() {
            info!(value, "synthetic dollar index now computable");
        }
        self.history.upsert(value, 0.0, timestamp);
        Some(value)
    }

    /// Current index from the latest rates; `None` unless every component has data.
    pub fn compute_index(&self) -> Option<f64> {
        let mut rates = [0.0; 6];
        for (slot, rate) in rates.iter_mut().zip(self.rates) {
            *slot = rate?;
        }
        dollar_index(&rates)
    }

    pub fn missing_components(&self) -> Vec<DxyComponent> {
        DxyComponent::ALL
            .into_iter()
            .filter(|component| self.rates[component.index()].is_none())
            .collect()
    }

    pub fn current_value(&self) -> Option<f64> {
        self.history.latest_price()
    }

    pub fn analysis(&self) -> DollarAnalysis {
        let samples = self.history.len();
        let mut analysis = DollarAnalysis {
            status: DataStatus::NoData,
            value: self.current_value(),
            sma: None,
            trend: None,
            momentum_pct: None,
            support: None,
            resistance: None,
            signal: None,
            samples,
        };

        if samples == 0 {
            return analysis;
        }
        if samples < self.sma_period {
            analysis.status = DataStatus::Calculating;
            return analysis;
        }

        let window = self.history.prices(self.sma_period);
        let current = window[window.len() - 1];
        let oldest = window[0];
        let Some(sma) = stats::mean(&window) else {
            return analysis;
        };
        let momentum_pct = stats::relative_change(oldest, current).map_or(0.0, |c| c * 100.0);

        let range = self.history.prices(self.range_period);
        let support = range.iter().copied().fold(f64::INFINITY, f64::min);
        let resistance = range.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        analysis.status = DataStatus::Active;
        analysis.sma = Some(sma);
        analysis.trend = Some(if current > sma {
            DollarTrend::Bullish
        } else {
            DollarTrend::Bearish
        });
        analysis.momentum_pct = Some(momentum_pct);
        analysis.support = Some(support);
        analysis.resistance = Some(resistance);
        analysis.signal = Some(DollarSignal::derive(current, sma, momentum_pct));
        analysis
    }
}
