//! Batch result aggregation
//!
//! Merges the per-worker results of one batch (one test kind, one object
//! size, one worker count) into the run-level view the reporter prints:
//! totals, throughput both as summed per-worker rates and as an aggregate
//! rate over the batch window, a merged histogram, a global median over the
//! full latency sequence, and CPU utilization for the window.

use crate::config::TestKind;
use crate::stats::{LatencyHistogram, WorkerResult, LATENCY_UNSET};
use crate::util::cpu::{self, CpuSnapshot};
use serde::Serialize;

const MIB: f64 = 1024.0 * 1024.0;

/// Per-worker detail retained for --psum lines
#[derive(Debug, Clone, Serialize)]
pub struct WorkerLine {
    pub worker: usize,
    pub ops: u64,
    pub mbps: f64,
    pub ops_rate: f64,
    pub errors: u64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub total_latency: f64,
    pub median_latency: f64,
    pub histogram: LatencyHistogram,
}

/// Merged statistics for one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub test: TestKind,
    pub workers: usize,
    pub object_size: u64,
    /// Epoch when the batch started (the sync time when one was configured)
    pub start_epoch: u64,
    /// Epoch when aggregation ran, after the last worker finished
    pub end_epoch: u64,
    /// Wall time of the latest-finishing worker, seconds
    pub window: f64,
    pub total_ops: u64,
    pub total_errors: u64,
    /// Per-worker MB/s rates, summed
    pub mbps: f64,
    /// Total bytes over the batch window
    pub aggregate_mbps: f64,
    /// Per-worker ops/s rates, summed
    pub ops_rate: f64,
    /// Total ops over the batch window
    pub aggregate_ops_rate: f64,
    pub mean_latency: f64,
    pub median_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub total_latency: f64,
    pub histogram: LatencyHistogram,
    pub cpu_percent: f64,
    pub per_worker: Vec<WorkerLine>,
}

/// Median by full sort, as the reporter defines it
///
/// Order of the input never matters; an empty sequence reports 0.
pub fn median(latencies: &[f64]) -> f64 {
    if latencies.is_empty() {
        return 0.0;
    }
    let mut sorted = latencies.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("latencies are never NaN"));
    sorted[sorted.len() / 2]
}

/// Merge one batch's worker results
///
/// `end_cpu` is a snapshot taken by the caller once all workers have
/// reported; the baseline is the start snapshot of whichever worker began
/// first, identified by the lowest cumulative user counter.
pub fn aggregate(
    test: TestKind,
    results: &[WorkerResult],
    object_size: u64,
    start_epoch: u64,
    end_epoch: u64,
    end_cpu: CpuSnapshot,
) -> BatchSummary {
    let baseline = results
        .iter()
        .map(|r| r.start_cpu)
        .min_by_key(|snap| snap.user)
        .unwrap_or_default();
    let cpu_percent = cpu::utilization(&baseline, &end_cpu);

    let mut histogram = LatencyHistogram::new();
    let mut all_latencies = Vec::new();
    let mut per_worker = Vec::with_capacity(results.len());

    let mut total_ops = 0u64;
    let mut total_errors = 0u64;
    let mut total_latency = 0.0;
    let mut mbps = 0.0;
    let mut ops_rate = 0.0;
    let mut window: f64 = 0.0;
    let mut min_latency = LATENCY_UNSET;
    let mut max_latency: f64 = 0.0;

    for result in results {
        let bytes = result.ops as f64 * object_size as f64;
        let (worker_mbps, worker_rate) = if result.elapsed > 0.0 {
            (bytes / result.elapsed / MIB, result.ops as f64 / result.elapsed)
        } else {
            (0.0, 0.0)
        };

        per_worker.push(WorkerLine {
            worker: result.worker,
            ops: result.ops,
            mbps: worker_mbps,
            ops_rate: worker_rate,
            errors: result.errors,
            min_latency: if result.ops > 0 { result.min_latency } else { 0.0 },
            max_latency: result.max_latency,
            total_latency: result.total_latency,
            median_latency: median(&result.latencies),
            histogram: result.histogram.clone(),
        });

        total_ops += result.ops;
        total_errors += result.errors;
        total_latency += result.total_latency;
        mbps += worker_mbps;
        ops_rate += worker_rate;
        window = window.max(result.elapsed);
        histogram.merge(&result.histogram);
        all_latencies.extend_from_slice(&result.latencies);

        if result.min_latency < min_latency {
            min_latency = result.min_latency;
        }
        if result.max_latency > max_latency {
            max_latency = result.max_latency;
        }
    }

    if total_ops == 0 {
        min_latency = 0.0;
        max_latency = 0.0;
    }

    let (aggregate_mbps, aggregate_ops_rate) = if window > 0.0 {
        (
            total_ops as f64 * object_size as f64 / window / MIB,
            total_ops as f64 / window,
        )
    } else {
        (0.0, 0.0)
    };

    BatchSummary {
        test,
        workers: results.len(),
        object_size,
        start_epoch,
        end_epoch,
        window,
        total_ops,
        total_errors,
        mbps,
        aggregate_mbps,
        ops_rate,
        aggregate_ops_rate,
        mean_latency: if total_ops > 0 {
            total_latency / total_ops as f64
        } else {
            0.0
        },
        median_latency: median(&all_latencies),
        min_latency,
        max_latency,
        total_latency,
        histogram,
        cpu_percent,
        per_worker,
    }
}
