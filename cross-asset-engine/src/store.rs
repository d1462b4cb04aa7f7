//! Bounded rolling buffers of (price, volume, timestamp) per symbol.
//!
//! [`TimeSeriesBuffer`] is the ring buffer every module uses for its own series;
//! [`AssetStore`] is the orchestrator's shared per-symbol history.

use crate::{stats, types::Observation};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use smol_str::SmolStr;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Fixed-capacity, insertion-ordered buffer. Oldest observation is evicted first.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    observations: VecDeque<Observation>,
    capacity: usize,
}

impl TimeSeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            observations: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, observation: Observation) {
        if self.observations.len() >= self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
    }

    pub fn record(&mut self, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        self.push(Observation {
            price,
            volume,
            timestamp,
        });
    }

    /// Overwrite the latest observation if it carries the same timestamp, else push.
    pub fn upsert(&mut self, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        match self.observations.back_mut() {
            Some(latest) if latest.timestamp == timestamp => {
                latest.price = price;
                latest.volume = volume;
            }
            _ => self.record(price, volume, timestamp),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Last `n` observations in insertion order (fewer if not available).
    pub fn last_n(&self, n: usize) -> Vec<Observation> {
        let start = self.observations.len().saturating_sub(n);
        self.observations.range(start..).copied().collect()
    }

    /// Last `n` prices in insertion order.
    pub fn prices(&self, n: usize) -> Vec<f64> {
        let start = self.observations.len().saturating_sub(n);
        self.observations.range(start..).map(|o| o.price).collect()
    }

    /// Last `n` volumes in insertion order.
    pub fn volumes(&self, n: usize) -> Vec<f64> {
        let start = self.observations.len().saturating_sub(n);
        self.observations.range(start..).map(|o| o.volume).collect()
    }

    /// Fractional returns over the last `n` prices (N prices produce N-1 returns).
    pub fn returns(&self, n: usize) -> Vec<f64> {
        stats::pct_returns(&self.prices(n))
    }

    /// Prices of `self` and `other` at the timestamps both observed, oldest first, limited
    /// to the last `n` shared timestamps. A repeated timestamp keeps its latest price.
    pub fn aligned_prices(&self, other: &Self, n: usize) -> (Vec<f64>, Vec<f64>) {
        let other_by_time: FnvHashMap<DateTime<Utc>, f64> = other
            .observations
            .iter()
            .map(|o| (o.timestamp, o.price))
            .collect();

        let shared: BTreeMap<DateTime<Utc>, (f64, f64)> = self
            .observations
            .iter()
            .filter_map(|o| {
                let other_price = other_by_time.get(&o.timestamp)?;
                Some((o.timestamp, (o.price, *other_price)))
            })
            .collect();

        let skip = shared.len().saturating_sub(n);
        shared.into_values().skip(skip).unzip()
    }

    /// Fractional returns of both series over their last `n` shared timestamps, `None` when
    /// fewer than `n` timestamps are shared.
    pub fn aligned_returns(&self, other: &Self, n: usize) -> Option<(Vec<f64>, Vec<f64>)> {
        let (own, other) = self.aligned_prices(other, n);
        if own.len() < n {
            return None;
        }
        Some((stats::pct_returns(&own), stats::pct_returns(&other)))
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.observations.back()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.observations.back().map(|o| o.price)
    }
}

/// Rolling history per symbol, created lazily on first observation.
#[derive(Debug, Clone)]
pub struct AssetStore {
    buffers: FnvHashMap<SmolStr, TimeSeriesBuffer>,
    capacity: usize,
}

impl AssetStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: FnvHashMap::default(),
            capacity,
        }
    }

    pub fn record(&mut self, symbol: &str, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        buffer_entry(&mut self.buffers, symbol, self.capacity).record(price, volume, timestamp);
    }

    /// Last `n` observations for `symbol`; empty when the symbol is unknown.
    pub fn snapshot(&self, symbol: &str, n: usize) -> Vec<Observation> {
        self.buffers
            .get(symbol)
            .map(|buffer| buffer.last_n(n))
            .unwrap_or_default()
    }

    pub fn buffer(&self, symbol: &str) -> Option<&TimeSeriesBuffer> {
        self.buffers.get(symbol)
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.buffers.get(symbol).map_or(0, TimeSeriesBuffer::len)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.buffers.contains_key(symbol)
    }

    /// Known symbols, sorted.
    pub fn symbols(&self) -> Vec<SmolStr> {
        let mut symbols: Vec<_> = self.buffers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn symbol_count(&self) -> usize {
        self.buffers.len()
    }

    /// Most recent timestamp across every buffer.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.buffers
            .values()
            .filter_map(|buffer| buffer.latest().map(|o| o.timestamp))
            .max()
    }
}

/// Get or lazily create the buffer for `symbol`.
pub(crate) fn buffer_entry<'a>(
    buffers: &'a mut FnvHashMap<SmolStr, TimeSeriesBuffer>,
    symbol: &str,
    capacity: usize,
) -> &'a mut TimeSeriesBuffer {
    buffers.entry(SmolStr::new(symbol)).or_insert_with(|| {
        debug!(%symbol, capacity, "creating rolling buffer");
        TimeSeriesBuffer::new(capacity)
    })
}
