//! Per-worker statistics
//!
//! Each worker owns exactly one [`WorkerResult`] while it runs; nothing is
//! shared across workers until the coordinator hands the collected results
//! to the aggregator. The latency histogram uses the fixed bucket boundaries
//! 0,1,2,3,4,5,10,20,30,40,50+ scaled by the configured granularity.

pub mod aggregator;

use crate::config::TestKind;
use crate::util::cpu::CpuSnapshot;
use serde::Serialize;

/// Number of latency distribution buckets
pub const HIST_BUCKETS: usize = 11;

/// Nominal lower bound of each bucket, in units of 1/granularity seconds
pub const BUCKET_BOUNDS: [u32; HIST_BUCKETS] = [0, 1, 2, 3, 4, 5, 10, 20, 30, 40, 50];

/// Sentinel minimum latency before any operation completes
pub const LATENCY_UNSET: f64 = 9999.0;

/// Fixed-bucket latency accumulator for one worker
///
/// Buckets 0-4 hold unit latency values, bucket 5 covers [5,10), bucket 6
/// [10,20) and so on; bucket 10 catches everything from 50 upward. All in
/// units of 1/granularity seconds. Invariant: the bucket counts always sum
/// to the number of recorded samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyHistogram {
    buckets: [u64; HIST_BUCKETS],
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: [0; HIST_BUCKETS],
        }
    }

    /// Bucket index for a latency in seconds at the given granularity
    ///
    /// A bucket value of exactly 5 lands in bucket 5: the boundary is
    /// inclusive upward. Granularity 0 (distribution reporting disabled)
    /// collapses everything into bucket 0.
    pub fn bucket_for(latency: f64, granularity: f64) -> usize {
        let mut bucket = (latency * granularity) as usize;
        if bucket >= 5 {
            bucket = bucket / 10 + 5;
        }
        bucket.min(HIST_BUCKETS - 1)
    }

    /// Record one latency sample
    pub fn record(&mut self, latency: f64, granularity: f64) {
        self.buckets[Self::bucket_for(latency, granularity)] += 1;
    }

    /// Element-wise sum with another worker's histogram
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *mine += theirs;
        }
    }

    /// Total samples across all buckets
    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn counts(&self) -> &[u64; HIST_BUCKETS] {
        &self.buckets
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one worker measured during one batch
#[derive(Debug, Clone, Serialize)]
pub struct WorkerResult {
    /// Test this worker ran
    pub test: TestKind,
    /// Worker index within the batch
    pub worker: usize,
    /// Wall time spent in the operation loop, seconds
    pub elapsed: f64,
    /// Successful operations
    pub ops: u64,
    /// Minimum latency in seconds ([`LATENCY_UNSET`] when no operation completed)
    pub min_latency: f64,
    /// Maximum latency in seconds
    pub max_latency: f64,
    /// Sum of all latencies in seconds
    pub total_latency: f64,
    /// Classified api errors encountered
    pub errors: u64,
    /// Latency distribution
    pub histogram: LatencyHistogram,
    /// Every latency in issue order, for the global median
    pub latencies: Vec<f64>,
    /// System CPU counters sampled when the worker's loop started
    pub start_cpu: CpuSnapshot,
}

impl WorkerResult {
    /// An all-zero result, returned when a worker exits before running
    /// any operations (sync time already passed under --warnexit)
    pub fn zeroed(test: TestKind, worker: usize, start_cpu: CpuSnapshot) -> Self {
        Self {
            test,
            worker,
            elapsed: 0.0,
            ops: 0,
            min_latency: LATENCY_UNSET,
            max_latency: 0.0,
            total_latency: 0.0,
            errors: 0,
            histogram: LatencyHistogram::new(),
            latencies: Vec::new(),
            start_cpu,
        }
    }

    /// Fold one successful operation's latency into the running stats
    pub fn record_latency(&mut self, latency: f64, granularity: f64) {
        self.ops += 1;
        self.total_latency += latency;
        if latency < self.min_latency {
            self.min_latency = latency;
        }
        if latency > self.max_latency {
            self.max_latency = latency;
        }
        self.histogram.record(latency, granularity);
        self.latencies.push(latency);
    }
}

/// A worker that died before producing a result
///
/// Any fault aborts aggregation for the whole batch; the run itself
/// continues with the next batch.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerFault {
    pub message: String,
    pub worker: usize,
}

/// What one worker handed back to the pool
#[derive(Debug, Clone, Serialize)]
pub enum WorkerOutcome {
    Completed(WorkerResult),
    Fault(WorkerFault),
}
