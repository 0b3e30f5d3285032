//! System CPU utilization tracking
//!
//! Reads the cumulative system-wide CPU counters from the aggregate `cpu`
//! line of /proc/stat. Each worker snapshots these counters when it starts
//! running; the aggregator pairs the earliest start snapshot with a fresh
//! end-of-batch snapshot to compute utilization over the measured window.

use serde::Serialize;
use std::fs;

/// Cumulative CPU-time counters, in clock ticks
///
/// Field order matches /proc/stat. Counters only ever increase, so any
/// later snapshot minus an earlier one yields the ticks spent per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuSnapshot {
    /// Take a snapshot of the current system CPU counters
    ///
    /// Returns a zero snapshot if /proc/stat is unreadable (non-Linux);
    /// utilization then reports 0% rather than failing the run.
    pub fn take() -> Self {
        fs::read_to_string("/proc/stat")
            .ok()
            .and_then(|stat| {
                stat.lines()
                    .find(|line| line.starts_with("cpu "))
                    .and_then(Self::parse_line)
            })
            .unwrap_or_default()
    }

    /// Parse an aggregate "cpu ..." line from /proc/stat
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return None;
        }
        let mut values = [0u64; 7];
        for value in values.iter_mut() {
            *value = fields.next()?.parse().ok()?;
        }
        Some(Self {
            user: values[0],
            nice: values[1],
            system: values[2],
            idle: values[3],
            iowait: values[4],
            irq: values[5],
            softirq: values[6],
        })
    }

    fn fields(&self) -> [u64; 7] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
        ]
    }
}

/// CPU utilization percentage over the window between two snapshots
///
/// Busy ticks are everything except idle and iowait. A window that measured
/// zero total ticks (sync time already passed, nothing ran) reports 0.0
/// rather than reusing stale state.
pub fn utilization(start: &CpuSnapshot, end: &CpuSnapshot) -> f64 {
    let starts = start.fields();
    let ends = end.fields();

    let mut total: i64 = 0;
    let mut busy: i64 = 0;
    for (i, (s, e)) in starts.iter().zip(ends.iter()).enumerate() {
        let diff = *e as i64 - *s as i64;
        total += diff;
        // fields 3 and 4 are idle and iowait
        if i != 3 && i != 4 {
            busy += diff;
        }
    }

    if total == 0 {
        0.0
    } else {
        100.0 * busy as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let snap = CpuSnapshot::parse_line("cpu  100 5 50 800 20 3 2 0 0 0").unwrap();
        assert_eq!(snap.user, 100);
        assert_eq!(snap.nice, 5);
        assert_eq!(snap.system, 50);
        assert_eq!(snap.idle, 800);
        assert_eq!(snap.iowait, 20);
        assert_eq!(snap.irq, 3);
        assert_eq!(snap.softirq, 2);
    }

    #[test]
    fn test_parse_rejects_per_core_lines() {
        assert!(CpuSnapshot::parse_line("cpu0 1 2 3 4 5 6 7").is_none());
    }

    #[test]
    fn test_utilization() {
        let start = CpuSnapshot::parse_line("cpu 100 0 100 700 100 0 0").unwrap();
        let end = CpuSnapshot::parse_line("cpu 300 0 200 900 200 0 0").unwrap();
        // busy = 200 + 100 = 300, total = 300 + 200 + 100 = 600
        let pct = utilization(&start, &end);
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_window_reports_zero() {
        let snap = CpuSnapshot::parse_line("cpu 100 0 100 700 100 0 0").unwrap();
        assert_eq!(utilization(&snap, &snap), 0.0);
    }
}
