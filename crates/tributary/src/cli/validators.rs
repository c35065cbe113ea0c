//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

/// Longest asset id or metric name accepted on the command line.
pub const MAX_NAME_LENGTH: usize = 256;

/// Validate an asset id: non-empty, no whitespace, bounded length.
pub fn validate_asset_id(s: &str) -> Result<String, String> {
    validate_name("Asset ID", s)
}

/// Validate a metric name with the same rules as asset ids.
pub fn validate_metric_name(s: &str) -> Result<String, String> {
    validate_name("Metric name", s)
}

/// Validate a count that must be at least one.
pub fn validate_positive(s: &str) -> Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a non-negative integer"))?;
    if value == 0 {
        return Err("Value must be at least 1".to_string());
    }
    Ok(value)
}

fn validate_name(what: &str, s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("{what} cannot contain whitespace: '{s}'"));
    }
    if s.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "{what} cannot exceed {MAX_NAME_LENGTH} characters (got {})",
            s.len()
        ));
    }
    Ok(s.to_string())
}
