//! Per-worker operation trace logs
//!
//! Each worker can write a best-effort, write-only trace file recording
//! latencies, execution traces and api errors. The file path is keyed by
//! test name, worker index and run epoch so logs from one synchronized run
//! line up across hosts. Nothing in the harness ever reads these back.

use crate::util::epoch_now;
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Log mask bit: record every operation latency
pub const LOG_LATENCIES: u32 = 1;
/// Log mask bit: record execution trace records
pub const LOG_TRACES: u32 = 2;
/// Log mask bit: record only latencies above the per-size threshold
pub const LOG_SLOW: u32 = 4;

/// Best-effort per-worker trace log
///
/// A zero mask, or a file that cannot be created, yields a disabled log;
/// every write becomes a no-op.
pub struct OpLog {
    mask: u32,
    writer: Option<BufWriter<File>>,
}

impl OpLog {
    /// Open a log for one worker of one test
    pub fn open(dir: &Path, test_name: &str, worker: usize, epoch: u64, mask: u32) -> Self {
        if mask == 0 {
            return Self::disabled();
        }
        let path = Self::path(dir, test_name, worker, epoch);
        let writer = File::create(path).ok().map(BufWriter::new);
        Self { mask, writer }
    }

    /// A log that drops everything
    pub fn disabled() -> Self {
        Self {
            mask: 0,
            writer: None,
        }
    }

    /// Log file path for one worker of one test
    pub fn path(dir: &Path, test_name: &str, worker: usize, epoch: u64) -> PathBuf {
        dir.join(format!("ospulse-{}-{}-{}.log", test_name, worker, epoch))
    }

    /// Record one operation latency
    pub fn latency(&mut self, start: f64, latency: f64, txid: &str, cname: &str, oname: &str) {
        if self.mask & (LOG_LATENCIES | LOG_SLOW) != 0 {
            self.write(&format!("{:.6}  {:.6}  {}  {}/{}", start, latency, txid, cname, oname));
        }
    }

    /// Record an execution trace line
    pub fn trace(&mut self, text: &str) {
        if self.mask & LOG_TRACES != 0 {
            self.write(text);
        }
    }

    /// Record an api error
    pub fn error(&mut self, status: u16) {
        self.write(&format!("ApiError: {}", status));
    }

    fn write(&mut self, text: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let now = Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(writer, "{} {:.6} {}", now, epoch_now(), text);
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = OpLog::open(dir.path(), "put", 0, 1700000000, 0);
        log.latency(0.0, 0.01, "tx", "c", "o");
        log.trace("never");
        assert!(!OpLog::path(dir.path(), "put", 0, 1700000000).exists());
    }

    #[test]
    fn test_latency_and_trace_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = OpLog::path(dir.path(), "get", 2, 1700000000);
        {
            let mut log = OpLog::open(dir.path(), "get", 2, 1700000000, LOG_LATENCIES | LOG_TRACES);
            log.latency(1.0, 0.015, "txid-1", "cont", "obj-1");
            log.trace("Done!  time: 1.0 ops: 1 errs: 0");
            log.error(404);
        }
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("cont/obj-1"));
        assert!(lines[1].contains("Done!"));
        assert!(lines[2].contains("ApiError: 404"));
    }

    #[test]
    fn test_trace_masked_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = OpLog::path(dir.path(), "del", 0, 42);
        {
            let mut log = OpLog::open(dir.path(), "del", 0, 42, LOG_LATENCIES);
            log.trace("suppressed");
            log.latency(1.0, 0.2, "t", "c", "o");
        }
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("suppressed"));
    }
}
