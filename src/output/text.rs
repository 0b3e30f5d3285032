//! Report line formatting
//!
//! One fixed-width line per batch (plus one per worker under --psum), built
//! as strings so the layout is testable without capturing stdout. Column
//! set varies with --ldist (histogram counts) and --utc (trailing epoch
//! timestamp).

use crate::config::RunConfig;
use crate::stats::aggregator::{BatchSummary, WorkerLine};
use crate::stats::{LatencyHistogram, BUCKET_BOUNDS};
use crate::util::size::{format_kmg, ptime};

/// Column header matching the layout of [`format_summary_line`]
pub fn format_header(config: &RunConfig) -> String {
    let mut header = format!("{:>4} ", "Rank");
    header.push_str(&format!(
        "{:>4}  {:>4} {:>4} {:>6}  {:<8}  {:<8} {:>8} {:>5}",
        "Test", "Clts", "Proc", "OSize", "Start", "End", "MB/Sec", "Ops"
    ));
    header.push_str(&format!(
        "{:>10} {:>4} {:>7} {:>7}  {:>10}",
        "Ops/Sec", "Errs", "Latency", "Median", "LatRange"
    ));
    if let Some(digits) = config.ldist {
        let granularity = config.granularity();
        for bound in BUCKET_BOUNDS {
            let label = format!("{:.*}", digits as usize, bound as f64 / granularity);
            header.push_str(&format!(" {:>5}", label));
        }
    }
    header.push_str("   %CPU");
    if config.utc {
        header.push_str(&format!(" {:<10}", "Timestamp"));
    }
    header
}

/// The batch total line
pub fn format_summary_line(config: &RunConfig, summary: &BatchSummary, run_epoch: u64) -> String {
    format_line(
        config,
        summary,
        &summary.workers.to_string(),
        summary.total_ops,
        summary.mbps,
        summary.ops_rate,
        summary.total_errors,
        summary.min_latency,
        summary.max_latency,
        summary.total_latency,
        summary.median_latency,
        &summary.histogram,
        run_epoch,
    )
}

/// One per-worker detail line, Proc column shown as '-'
pub fn format_worker_line(
    config: &RunConfig,
    summary: &BatchSummary,
    line: &WorkerLine,
    run_epoch: u64,
) -> String {
    format_line(
        config,
        summary,
        "-",
        line.ops,
        line.mbps,
        line.ops_rate,
        line.errors,
        line.min_latency,
        line.max_latency,
        line.total_latency,
        line.median_latency,
        &line.histogram,
        run_epoch,
    )
}

#[allow(clippy::too_many_arguments)]
fn format_line(
    config: &RunConfig,
    summary: &BatchSummary,
    proc_col: &str,
    ops: u64,
    mbps: f64,
    ops_rate: f64,
    errors: u64,
    min_latency: f64,
    max_latency: f64,
    total_latency: f64,
    median: f64,
    histogram: &LatencyHistogram,
    run_epoch: u64,
) -> String {
    // no ops means no latencies, shown as an all-zero latency block
    let (latency, min_latency, max_latency) = if ops > 0 {
        (
            format!("{:7.3}", total_latency / ops as f64),
            min_latency,
            max_latency,
        )
    } else {
        ("000.00".to_string(), 0.0, 0.0)
    };

    let mut line = format!("{:<4} ", config.rank);
    line.push_str(&format!(
        "{:<4}  {:>4} {:>4} {:>6}  {:>8}  {:>8} {:8.2} {:>5}",
        summary.test.name(),
        1,
        proc_col,
        format_kmg(summary.object_size),
        ptime(summary.start_epoch),
        ptime(summary.end_epoch),
        mbps,
        ops
    ));
    line.push_str(&format!(
        "{:10.2} {:>4} {} {:7.3} {:5.2}-{:05.2}",
        ops_rate, errors, latency, median, min_latency, max_latency
    ));
    if config.ldist.is_some() {
        for count in histogram.counts() {
            line.push_str(&format!(" {:>5}", count));
        }
    }
    line.push_str(&format!("  {:5.2}", summary.cpu_percent));
    if config.utc {
        line.push_str(&format!(" {}", run_epoch));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::creds::Credentials;
    use crate::config::{ObjectBudget, ObjectOpts, Operation, TestKind, Topology};
    use crate::stats::aggregator::aggregate;
    use crate::stats::WorkerResult;
    use crate::util::cpu::CpuSnapshot;

    const PUT: TestKind = TestKind {
        op: Operation::Put,
        random: false,
    };

    fn config() -> RunConfig {
        RunConfig {
            tests: vec![PUT],
            cname: "cont".into(),
            oname: "obj".into(),
            sizes: vec![1024],
            nobjects: ObjectBudget::Uniform(Some(10)),
            runtime: None,
            ctype: Topology::Shared,
            objopts: ObjectOpts::default(),
            rank: 2,
            procset: vec![1],
            repeats: 1,
            synctime: None,
            errmax: 5,
            latexc: None,
            ldist: None,
            nohead: false,
            psum: false,
            putsperproc: false,
            quiet: true,
            utc: false,
            warnexit: false,
            cont_nodelete: false,
            proxies: vec![],
            preauthtoken: String::new(),
            creds: Credentials::default(),
            logmask: 0,
            loglat: vec![],
        }
    }

    fn summary_with(latencies: &[f64]) -> BatchSummary {
        let mut result = WorkerResult::zeroed(PUT, 0, CpuSnapshot::default());
        for &latency in latencies {
            result.record_latency(latency, 1.0);
        }
        result.elapsed = 1.0;
        aggregate(PUT, &[result], 1024, 1000, 1010, CpuSnapshot::default())
    }

    #[test]
    fn test_header_base_columns() {
        let header = format_header(&config());
        for column in [
            "Rank", "Test", "Clts", "Proc", "OSize", "Start", "End", "MB/Sec", "Ops", "Ops/Sec",
            "Errs", "Latency", "Median", "LatRange", "%CPU",
        ] {
            assert!(header.contains(column), "missing column {}", column);
        }
        assert!(!header.contains("Timestamp"));
    }

    #[test]
    fn test_header_ldist_labels_scaled_by_granularity() {
        let mut config = config();
        config.ldist = Some(2);
        let header = format_header(&config);
        // bounds 5 and 50 in units of 0.01s
        assert!(header.contains("0.05"));
        assert!(header.contains("0.50"));
    }

    #[test]
    fn test_summary_line_fields() {
        let config = config();
        let summary = summary_with(&[0.25, 0.75]);
        let line = format_summary_line(&config, &summary, 0);

        assert!(line.starts_with("2    put "));
        assert!(line.contains("1k"));
        // mean 0.500, median picks the upper of the two
        assert!(line.contains("0.500"));
        assert!(line.contains("0.750"));
        assert!(line.contains("0.25-00.75"));
        // 2 ops over a 1s window
        assert!(line.contains("2.00"));
    }

    #[test]
    fn test_zero_ops_line() {
        let config = config();
        let summary = summary_with(&[]);
        let line = format_summary_line(&config, &summary, 0);
        assert!(line.contains("000.00"));
        assert!(line.contains("0.00-00.00"));
    }

    #[test]
    fn test_worker_line_masks_proc_column() {
        let config = config();
        let summary = summary_with(&[0.1]);
        let line = format_worker_line(&config, &summary, &summary.per_worker[0], 0);
        let fields: Vec<&str> = line.split_whitespace().collect();
        // rank, test, clts, then the masked proc column
        assert_eq!(fields[3], "-");
    }

    #[test]
    fn test_ldist_appends_eleven_buckets() {
        let mut config = config();
        config.ldist = Some(1);
        let summary = summary_with(&[0.1]);
        let with = format_summary_line(&config, &summary, 0);
        config.ldist = None;
        let without = format_summary_line(&config, &summary, 0);
        let with_fields = with.split_whitespace().count();
        let base_fields = without.split_whitespace().count();
        assert_eq!(with_fields, base_fields + 11);
    }

    #[test]
    fn test_utc_appends_run_epoch() {
        let mut config = config();
        config.utc = true;
        let summary = summary_with(&[0.1]);
        let line = format_summary_line(&config, &summary, 1700000000);
        assert!(line.ends_with("1700000000"));
    }
}
