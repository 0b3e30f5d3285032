//! Shared utilities

pub mod cpu;
pub mod oplog;
pub mod payload;
pub mod size;

/// Current wall-clock time as fractional seconds since the epoch
pub fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// This client's host name, for warning and error lines
pub fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
