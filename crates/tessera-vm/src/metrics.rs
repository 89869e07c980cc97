//! Execution metrics
//!
//! Counters are keyed by name and created on first use; the gas histogram
//! uses fixed bucket boundaries so snapshots are comparable across nodes.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_primitives::Gas;

/// Counter names
pub mod names {
    /// Chains executed
    pub const CHAINS: &str = "chains";
    /// Scripts executed, including nested contract calls
    pub const SCRIPTS: &str = "scripts";
    /// Chains that halted
    pub const HALTS: &str = "halts";
    /// Chains that faulted
    pub const FAULTS: &str = "faults";
    /// Instructions stepped
    pub const STEPS: &str = "steps";
    /// Gas consumed by finished chains
    pub const GAS_CONSUMED: &str = "gas_consumed";
}

const GAS_BUCKETS: [u64; 8] = [
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
];

/// Distribution of gas consumed per chain
pub struct GasHistogram {
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl GasHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            // one overflow bucket past the last boundary
            counts: (0..=GAS_BUCKETS.len()).map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one observation
    pub fn observe(&self, gas: Gas) {
        let value = gas.max(0) as u64;
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let bucket = GAS_BUCKETS
            .iter()
            .position(|boundary| value <= *boundary)
            .unwrap_or(GAS_BUCKETS.len());
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean observed value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Number of observations
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn buckets(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

impl Default for GasHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe execution statistics shared by every chain an engine runs
pub struct ExecutionMetrics {
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    fault_kinds: RwLock<BTreeMap<&'static str, Arc<AtomicU64>>>,
    gas: GasHistogram,
}

impl ExecutionMetrics {
    /// Create an empty metrics store
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            fault_kinds: RwLock::new(BTreeMap::new()),
            gas: GasHistogram::new(),
        }
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, delta: u64) {
        let counters = self.counters.read();
        if let Some(c) = counters.get(name) {
            c.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write();
        let c = counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        c.fetch_add(delta, Ordering::Relaxed);
    }

    /// Count a fault by kind
    pub fn fault(&self, kind: &'static str) {
        let kinds = self.fault_kinds.read();
        if let Some(c) = kinds.get(kind) {
            c.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(kinds);

        let mut kinds = self.fault_kinds.write();
        let c = kinds.entry(kind).or_insert_with(|| Arc::new(AtomicU64::new(0)));
        c.fetch_add(1, Ordering::Relaxed);
    }

    /// Record gas consumed by a finished chain
    pub fn gas(&self, consumed: Gas) {
        self.gas.observe(consumed);
        self.counter(names::GAS_CONSUMED, consumed.max(0) as u64);
    }

    /// Get counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Get the fault count for one kind
    pub fn get_fault_count(&self, kind: &str) -> Option<u64> {
        self.fault_kinds
            .read()
            .get(kind)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Gas histogram
    pub fn gas_histogram(&self) -> &GasHistogram {
        &self.gas
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let faults = self
            .fault_kinds
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.load(Ordering::Relaxed)))
            .collect();
        MetricsSnapshot {
            counters,
            faults,
            gas: GasSummary {
                mean: self.gas.mean(),
                count: self.gas.total_count(),
                bucket_bounds: GAS_BUCKETS.to_vec(),
                buckets: self.gas.buckets(),
            },
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Fault counts by kind
    pub faults: BTreeMap<String, u64>,
    /// Gas consumed per chain
    pub gas: GasSummary,
}

/// Summary of the gas histogram
#[derive(Debug, Clone, Serialize)]
pub struct GasSummary {
    /// Mean gas per chain
    pub mean: f64,
    /// Chains observed
    pub count: u64,
    /// Upper bound of each bucket; the last bucket is unbounded
    pub bucket_bounds: Vec<u64>,
    /// Observations per bucket
    pub buckets: Vec<u64>,
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
