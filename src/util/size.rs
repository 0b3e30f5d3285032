//! Size and time formatting helpers

use chrono::{Local, TimeZone};

/// Parse a size string with an optional k/m/g suffix (case insensitive)
///
/// # Examples
///
/// ```
/// use ospulse::util::size::parse_kmg;
///
/// assert_eq!(parse_kmg("4096"), Some(4096));
/// assert_eq!(parse_kmg("4k"), Some(4096));
/// assert_eq!(parse_kmg("1M"), Some(1048576));
/// assert_eq!(parse_kmg("2x"), None);
/// ```
pub fn parse_kmg(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (digits, suffix) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, ""),
    };
    let value: u64 = digits.parse().ok()?;
    let multiplier = match suffix.to_ascii_lowercase().as_str() {
        "" => 1,
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some(value * multiplier)
}

/// Format a byte count as number + k/m/g when it is an exact 1024 multiple
///
/// Sizes that are not clean multiples come back unsuffixed so report columns
/// stay exact.
pub fn format_kmg(bytes: u64) -> String {
    let mut value = bytes;
    let mut suffix = "";
    if bytes > 0 && bytes % 1024 == 0 {
        for s in ["k", "m", "g"] {
            if value % 1024 != 0 || value < 1024 {
                break;
            }
            value /= 1024;
            suffix = s;
        }
    }
    format!("{}{}", value, suffix)
}

/// Format an epoch time as local HH:MM:SS for report columns
pub fn ptime(epoch_secs: u64) -> String {
    match Local.timestamp_opt(epoch_secs as i64, 0) {
        chrono::LocalResult::Single(t) => t.format("%H:%M:%S").to_string(),
        _ => "--:--:--".to_string(),
    }
}

/// Format an epoch time as a UTC "YYYYMMDD HH:MM:SS" stamp for warnings
pub fn utc_stamp(epoch_secs: f64) -> String {
    match chrono::Utc.timestamp_opt(epoch_secs as i64, 0) {
        chrono::LocalResult::Single(t) => t.format("%Y%m%d %H:%M:%S").to_string(),
        _ => "--------".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kmg() {
        assert_eq!(parse_kmg("0"), Some(0));
        assert_eq!(parse_kmg("1419"), Some(1419));
        assert_eq!(parse_kmg("8K"), Some(8192));
        assert_eq!(parse_kmg("3m"), Some(3 * 1024 * 1024));
        assert_eq!(parse_kmg("1g"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_kmg("k"), None);
        assert_eq!(parse_kmg("1kb"), None);
        assert_eq!(parse_kmg(""), None);
    }

    #[test]
    fn test_format_kmg() {
        assert_eq!(format_kmg(100), "100");
        assert_eq!(format_kmg(1024), "1k");
        assert_eq!(format_kmg(8192), "8k");
        assert_eq!(format_kmg(1048576), "1m");
        // not an exact multiple, stays in bytes
        assert_eq!(format_kmg(1500), "1500");
    }

    #[test]
    fn test_roundtrip() {
        for bytes in [1024u64, 4096, 1048576, 3 * 1024 * 1024 * 1024] {
            assert_eq!(parse_kmg(&format_kmg(bytes)), Some(bytes));
        }
    }
}
