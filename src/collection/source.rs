//! Source identifier normalization.
//!
//! Community ids arrive in mixed shapes: plain positive numbers, negative
//! numbers, or string-prefixed negative numbers (the platform convention for
//! "this is a community wall, not a user"). Everything downstream — API
//! calls and stored `group_id` columns — works with one canonical positive
//! form, produced here.

use crate::error::TaskError;

/// Normalize a submitted source identifier into a canonical positive
/// community id
///
/// `-12345`, `"-12345"`, and `12345` all normalize to `12345`. Whitespace
/// is tolerated. Zero and non-numeric input are rejected.
pub fn normalize_source(raw: &str) -> Result<i64, TaskError> {
    let trimmed = raw.trim();
    let parsed: i64 = trimmed
        .parse()
        .map_err(|_| TaskError::InvalidSource(raw.to_string()))?;

    match parsed.checked_abs() {
        Some(id) if id > 0 => Ok(id),
        _ => Err(TaskError::InvalidSource(raw.to_string())),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_positive_forms_normalize_identically() {
        assert_eq!(normalize_source("-12345").unwrap(), 12345);
        assert_eq!(normalize_source("12345").unwrap(), 12345);
        assert_eq!(normalize_source(" -12345 ").unwrap(), 12345);
    }

    #[test]
    fn zero_is_rejected() {
        assert!(normalize_source("0").is_err());
        assert!(normalize_source("-0").is_err());
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        for raw in ["", "abc", "12a45", "--5", "12.5", "club12345"] {
            let err = normalize_source(raw).unwrap_err();
            assert!(
                matches!(err, TaskError::InvalidSource(ref s) if s == raw),
                "input {raw:?} should be rejected and echoed back"
            );
        }
    }

    #[test]
    fn i64_min_does_not_panic_on_abs() {
        let raw = i64::MIN.to_string();
        assert!(normalize_source(&raw).is_err());
    }
}
