//! Full pairwise correlation matrix over percentage-return series.
//!
//! Symbols with fewer than `period` observations are left out of a computation cycle.
//! The most recent matrix is cached so [`CorrelationMatrixEngine::strongest`] can scan
//! it without recomputing.

use crate::{
    stats,
    store::{TimeSeriesBuffer, buffer_entry},
    types::CorrelationDirection,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use itertools::Itertools;
use serde::Serialize;
use smol_str::SmolStr;
use std::cmp::Ordering;
use tracing::debug;

/// Strength tier of an absolute correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    #[display("weak")]
    Weak,
    #[display("moderate")]
    Moderate,
    #[display("strong")]
    Strong,
    #[display("very_strong")]
    VeryStrong,
}

impl CorrelationStrength {
    pub fn of(correlation: f64) -> Self {
        match correlation.abs() {
            r if r >= 0.9 => Self::VeryStrong,
            r if r >= 0.7 => Self::Strong,
            r if r >= 0.5 => Self::Moderate,
            _ => Self::Weak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub asset_a: SmolStr,
    pub asset_b: SmolStr,
    pub correlation: f64,
    pub window: usize,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
}

impl CorrelationResult {
    pub fn new(asset_a: SmolStr, asset_b: SmolStr, correlation: f64, window: usize) -> Self {
        Self {
            asset_a,
            asset_b,
            correlation,
            window,
            strength: CorrelationStrength::of(correlation),
            direction: CorrelationDirection::of(correlation),
        }
    }

    /// The other asset of the pair, if `symbol` is one of them.
    pub fn counterpart(&self, symbol: &str) -> Option<&SmolStr> {
        if self.asset_a == symbol {
            Some(&self.asset_b)
        } else if self.asset_b == symbol {
            Some(&self.asset_a)
        } else {
            None
        }
    }
}

/// Descending |r|, ties broken by asset names so ordering is deterministic.
pub fn by_strength_desc(a: &CorrelationResult, b: &CorrelationResult) -> Ordering {
    b.correlation
        .abs()
        .total_cmp(&a.correlation.abs())
        .then_with(|| a.asset_a.cmp(&b.asset_a))
        .then_with(|| a.asset_b.cmp(&b.asset_b))
}

/// Symmetric matrix of pairwise return correlations. `None` entries are undefined
/// (one series has zero variance).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    /// Qualifying symbols, sorted.
    pub symbols: Vec<SmolStr>,
    pub values: Vec<Vec<Option<f64>>>,
    pub period: usize,
}

impl CorrelationMatrix {
    fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn get(&self, asset_a: &str, asset_b: &str) -> Option<f64> {
        let i = self.index_of(asset_a)?;
        let j = self.index_of(asset_b)?;
        self.values[i][j]
    }

    /// Every defined upper-triangle entry.
    pub fn pairs(&self) -> impl Iterator<Item = CorrelationResult> + '_ {
        (0..self.symbols.len())
            .tuple_combinations()
            .filter_map(move |(i, j)| {
                self.values[i][j].map(|r| {
                    CorrelationResult::new(
                        self.symbols[i].clone(),
                        self.symbols[j].clone(),
                        r,
                        self.period,
                    )
                })
            })
    }

    /// Upper-triangle pairs with `|r| >= threshold`, strongest first.
    pub fn strongest(&self, threshold: f64) -> Vec<CorrelationResult> {
        self.pairs()
            .filter(|result| result.correlation.abs() >= threshold)
            .sorted_by(by_strength_desc)
            .collect()
    }

    /// Every defined entry involving `symbol`, strongest first.
    pub fn involving(&self, symbol: &str) -> Vec<CorrelationResult> {
        self.pairs()
            .filter(|result| result.counterpart(symbol).is_some())
            .sorted_by(by_strength_desc)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationMatrixEngine {
    series: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
    latest: Option<CorrelationMatrix>,
}

impl CorrelationMatrixEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: FnvHashMap::default(),
            capacity,
            latest: None,
        }
    }

    pub fn update(&mut self, symbol: &str, price: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.series, symbol, self.capacity).record(price, 0.0, timestamp);
    }

    /// Build the matrix without caching it. Symbols qualify with at least `period`
    /// observations; each pair is correlated over its last `period` shared timestamps and
    /// left undefined when they share fewer.
    pub fn calculate(&self, period: usize) -> Option<CorrelationMatrix> {
        let qualifying: Vec<(&SmolStr, &TimeSeriesBuffer)> = self
            .series
            .iter()
            .filter(|(_, buffer)| buffer.len() >= period)
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .collect();

        if qualifying.len() < 2 {
            debug!(
                qualifying = qualifying.len(),
                period, "correlation matrix skipped: fewer than two symbols with enough history"
            );
            return None;
        }

        let n = qualifying.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            values[i][i] = Some(1.0);
        }
        for (i, j) in (0..n).tuple_combinations() {
            let r = qualifying[i]
                .1
                .aligned_returns(qualifying[j].1, period)
                .and_then(|(a, b)| stats::pearson(&a, &b));
            values[i][j] = r;
            values[j][i] = r;
        }

        Some(CorrelationMatrix {
            symbols: qualifying.into_iter().map(|(symbol, _)| symbol.clone()).collect(),
            values,
            period,
        })
    }

    /// Build the matrix and keep it as the most recent one. A cycle with fewer than two
    /// qualifying symbols clears the cached matrix.
    pub fn compute(&mut self, period: usize) -> Option<&CorrelationMatrix> {
        self.latest = self.calculate(period);
        self.latest.as_ref()
    }

    pub fn latest(&self) -> Option<&CorrelationMatrix> {
        self.latest.as_ref()
    }

    /// Strongest pairs of the most recent matrix; empty before the first `compute`.
    pub fn strongest(&self, threshold: f64) -> Vec<CorrelationResult> {
        self.latest
            .as_ref()
            .map(|matrix| matrix.strongest(threshold))
            .unwrap_or_default()
    }
}
