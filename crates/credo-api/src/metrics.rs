//! In-process counters and latency rings.
//!
//! A mutex-guarded snapshot structure: counters plus a bounded ring of 256
//! latency samples per operation. Recording never blocks a request beyond
//! the lock itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

const RING_CAPACITY: usize = 256;

#[derive(Default)]
struct MetricsInner {
    counters: HashMap<String, u64>,
    latencies_ms: HashMap<String, VecDeque<f64>>,
}

#[derive(Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

impl Metrics {
    pub fn inc(&self, name: &str) {
        let mut inner = self.lock();
        *inner.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn observe_ms(&self, name: &str, ms: f64) {
        let mut inner = self.lock();
        let ring = inner
            .latencies_ms
            .entry(name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(RING_CAPACITY));
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(ms);
    }

    /// Counters plus count/p50/p95/max per operation.
    pub fn snapshot(&self) -> Value {
        let inner = self.lock();
        let counters: Value = inner
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect::<serde_json::Map<_, _>>()
            .into();

        let mut latency = serde_json::Map::new();
        for (name, ring) in &inner.latencies_ms {
            let mut values: Vec<f64> = ring.iter().copied().collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            latency.insert(
                name.clone(),
                json!({
                    "count": values.len(),
                    "p50_ms": percentile(&values, 0.50),
                    "p95_ms": percentile(&values, 0.95),
                    "max_ms": values.last().copied(),
                }),
            );
        }

        json!({"counters": counters, "latency": latency})
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let k = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted.get(k.min(sorted.len() - 1)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::default();
        metrics.inc("http.requests");
        metrics.inc("http.requests");
        let snap = metrics.snapshot();
        assert_eq!(snap["counters"]["http.requests"], 2);
    }

    #[test]
    fn latency_ring_is_bounded() {
        let metrics = Metrics::default();
        for i in 0..600 {
            metrics.observe_ms("verify", i as f64);
        }
        let snap = metrics.snapshot();
        assert_eq!(snap["latency"]["verify"]["count"], 256);
        // Oldest samples fell off the ring.
        assert_eq!(snap["latency"]["verify"]["max_ms"], 599.0);
    }

    #[test]
    fn percentiles_are_ordered() {
        let metrics = Metrics::default();
        for i in 1..=100 {
            metrics.observe_ms("issue", i as f64);
        }
        let snap = metrics.snapshot();
        let p50 = snap["latency"]["issue"]["p50_ms"].as_f64().unwrap();
        let p95 = snap["latency"]["issue"]["p95_ms"].as_f64().unwrap();
        assert!(p50 < p95);
    }
}
