//! Core data model: input events, stored observations and shared status labels.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Asset class of an ingested instrument. Drives routing inside the orchestrator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    #[display("FOREX")]
    Forex,
    #[display("INDEX")]
    Index,
    #[display("COMMODITY")]
    Commodity,
    #[display("BOND")]
    Bond,
}

/// A single price/volume update for one instrument.
///
/// The only auxiliary field used by the engine is the bond `yield`, carried as a typed
/// optional rather than an open map.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssetData {
    pub symbol: SmolStr,
    pub asset_class: AssetClass,
    pub price: f64,
    #[serde(default)]
    pub change_pct: f64,
    #[serde(default)]
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, rename = "yield", skip_serializing_if = "Option::is_none")]
    pub yield_value: Option<f64>,
}

impl AssetData {
    pub fn new(
        symbol: impl Into<SmolStr>,
        asset_class: AssetClass,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class,
            price,
            change_pct: 0.0,
            volume: 0.0,
            timestamp,
            yield_value: None,
        }
    }

    pub fn with_volume(self, volume: f64) -> Self {
        Self { volume, ..self }
    }

    pub fn with_change_pct(self, change_pct: f64) -> Self {
        Self { change_pct, ..self }
    }

    pub fn with_yield(self, yield_value: f64) -> Self {
        Self {
            yield_value: Some(yield_value),
            ..self
        }
    }

    /// Reject records carrying NaN or infinite values so they never reach a buffer.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("price", Some(self.price)),
            ("volume", Some(self.volume)),
            ("change_pct", Some(self.change_pct)),
            ("yield", self.yield_value),
        ];

        match fields
            .into_iter()
            .find(|(_, value)| value.is_some_and(|value| !value.is_finite()))
        {
            Some((field, _)) => Err(EngineError::NonFiniteValue {
                symbol: self.symbol.clone(),
                field,
            }),
            None => Ok(()),
        }
    }
}

/// One stored (price, volume, timestamp) point of a rolling buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Sign of a correlation, observed or expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    #[display("positive")]
    Positive,
    #[display("negative")]
    Negative,
}

impl CorrelationDirection {
    /// Zero counts as positive.
    pub fn of(correlation: f64) -> Self {
        if correlation < 0.0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }
}

/// Readiness of a module result, so callers can tell "no signal" from "not yet computable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    /// A required input has never been observed.
    #[display("no_data")]
    NoData,
    /// Inputs exist but fewer than the module's minimum sample count.
    #[default]
    #[display("insufficient_data")]
    InsufficientData,
    /// Derived series exists but is still warming up.
    #[display("calculating")]
    Calculating,
    #[display("active")]
    Active,
}

impl DataStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, DataStatus::Active)
    }
}
