//! Human-readable size parsing (e.g., "32MB", "512KB").

use thiserror::Error;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("invalid size '{input}' - expected format like '32MB', '512KB' or '1GB'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a human-readable size string into bytes.
///
/// Bare numbers are bytes. `K`/`KB`, `M`/`MB` and `G`/`GB` suffixes are
/// powers of 1024. Case-insensitive and whitespace tolerant.
///
/// ```
/// use tilestream::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("32MB").unwrap(), 32 * 1024 * 1024);
/// assert_eq!(parse_size("64 kb").unwrap(), 64 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let err = || SizeParseError {
        input: s.to_string(),
    };

    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();
    let without_b = upper.strip_suffix('B').unwrap_or(&upper);

    let (digits, multiplier) = match without_b.chars().last() {
        Some('K') => (&without_b[..without_b.len() - 1], KB),
        Some('M') => (&without_b[..without_b.len() - 1], MB),
        Some('G') => (&without_b[..without_b.len() - 1], GB),
        _ => (without_b, 1),
    };

    let value: usize = digits.trim().parse().map_err(|_| err())?;
    value.checked_mul(multiplier).ok_or_else(err)
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// ```
/// use tilestream::config::format_size;
///
/// assert_eq!(format_size(32 * 1024 * 1024), "32MB");
/// assert_eq!(format_size(1500), "1500");
/// ```
pub fn format_size(bytes: usize) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        bytes.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bytes() {
        assert_eq!(parse_size("0"), Ok(0));
        assert_eq!(parse_size(" 4096 "), Ok(4096));
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("1K"), Ok(KB));
        assert_eq!(parse_size("1kb"), Ok(KB));
        assert_eq!(parse_size("16M"), Ok(16 * MB));
        assert_eq!(parse_size("2 GB"), Ok(2 * GB));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("B").is_err());
        assert_eq!(parse_size("12B"), Ok(12));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(KB), "1KB");
        assert_eq!(format_size(3 * MB), "3MB");
        assert_eq!(format_size(GB), "1GB");
        assert_eq!(format_size(MB + 1), (MB + 1).to_string());
    }

    #[test]
    fn test_format_parse_round_trip_on_units() {
        for bytes in [KB, 32 * MB, 4 * GB] {
            assert_eq!(parse_size(&format_size(bytes)), Ok(bytes));
        }
    }
}
