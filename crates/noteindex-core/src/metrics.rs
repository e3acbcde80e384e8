//! Lightweight in-process metrics.
//!
//! - [`Counter`]: monotonically increasing atomic u64
//! - [`Histogram`]: rolling window of recent samples
//! - [`HistogramTimer`]: RAII timer recording milliseconds on drop
//! - [`MetricsRegistry`]: named counters and histograms with a serializable snapshot

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const HISTOGRAM_WINDOW: usize = 1024;

/// A lock-free counter metric
#[derive(Debug, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
    name: String,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name: name.into(),
        }
    }

    pub fn increment(&self) {
        self.add(1);
    }

    /// Saturating add
    pub fn add(&self, value: u64) {
        let _ = self
            .value
            .fetch_update(Ordering::Release, Ordering::Relaxed, |current| {
                Some(current.saturating_add(value))
            });
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Distribution of the most recent samples
#[derive(Debug, Clone)]
pub struct Histogram {
    values: Arc<RwLock<VecDeque<f64>>>,
    name: String,
}

impl Histogram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(VecDeque::with_capacity(HISTOGRAM_WINDOW))),
            name: name.into(),
        }
    }

    pub fn record(&self, value: f64) {
        let mut v = self.values.write();
        if v.len() == HISTOGRAM_WINDOW {
            v.pop_front();
        }
        v.push_back(value);
    }

    /// Create a timer for automatic duration recording
    pub fn timer(&self) -> HistogramTimer {
        HistogramTimer {
            histogram: self.clone(),
            start: Instant::now(),
        }
    }

    pub fn stats(&self) -> HistogramStats {
        let v = self.values.read();
        if v.is_empty() {
            return HistogramStats::default();
        }

        let sum: f64 = v.iter().sum();
        let count = v.len();
        HistogramStats {
            count,
            sum,
            min: v.iter().copied().fold(f64::INFINITY, f64::min),
            max: v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: sum / count as f64,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Statistics over the histogram window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// RAII timer that records duration to histogram on drop
#[derive(Debug)]
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.record(duration_ms);
    }
}

/// Named metrics owned by one engine instance
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Counter>>,
    histograms: RwLock<BTreeMap<String, Histogram>>,
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramStats>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a named counter
    pub fn counter(&self, name: &str) -> Counter {
        if let Some(counter) = self.counters.read().get(name) {
            return counter.clone();
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Counter::new(name))
            .clone()
    }

    /// Get or create a named histogram
    pub fn histogram(&self, name: &str) -> Histogram {
        if let Some(histogram) = self.histograms.read().get(name) {
            return histogram.clone();
        }
        self.histograms
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Histogram::new(name))
            .clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.value()))
                .collect(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.stats()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increment() {
        let counter = Counter::new("saves");
        counter.increment();
        counter.add(5);
        assert_eq!(counter.value(), 6);
    }

    #[test]
    fn test_counter_saturation() {
        let counter = Counter::new("test");
        counter.add(u64::MAX);
        counter.add(10);
        assert_eq!(counter.value(), u64::MAX);
    }

    #[test]
    fn test_histogram_window_is_bounded() {
        let histogram = Histogram::new("latency");
        for i in 0..(HISTOGRAM_WINDOW + 10) {
            histogram.record(i as f64);
        }
        let stats = histogram.stats();
        assert_eq!(stats.count, HISTOGRAM_WINDOW);
        assert_eq!(stats.min, 10.0);
    }

    #[test]
    fn test_registry_shares_named_metrics() {
        let registry = MetricsRegistry::new();
        registry.counter("engine.saves").increment();
        registry.counter("engine.saves").increment();
        {
            let _timer = registry.histogram("engine.search_ms").timer();
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counters["engine.saves"], 2);
        assert_eq!(snapshot.histograms["engine.search_ms"].count, 1);
    }
}
