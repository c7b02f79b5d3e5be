//! Input validation helpers
//!
//! Centralized text length constants and validation functions.

use shared::{AppError, ErrorCode};

// ── Text length limits ──────────────────────────────────────────────

/// Customer names, item names
pub const MAX_NAME_LEN: usize = 200;

/// Order notes, item notes
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: phone numbers, menu item ids
pub const MAX_SHORT_TEXT_LEN: usize = 100;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    validate_text_len(value, field, max_len)
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value {
        validate_text_len(v, field, max_len)?;
    }
    Ok(())
}

pub fn validate_text_len(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({len} chars, max {max_len})"
        )));
    }
    Ok(())
}

/// Validate a money amount: finite and not negative
pub fn validate_amount(value: f64, field: &str) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::with_message(
            ErrorCode::InvalidAmount,
            format!("{field} must be a non-negative amount, got {value}"),
        )
        .with_detail("field", field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Asha", "customerName", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("   ", "customerName", MAX_NAME_LEN).is_err());
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate_required_text(&long, "customerName", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_optional_text_counts_chars_not_bytes() {
        let note = Some("é".repeat(MAX_NOTE_LEN));
        assert!(validate_optional_text(&note, "note", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&None, "note", 1).is_ok());
    }

    #[test]
    fn test_amount() {
        assert!(validate_amount(0.0, "totalAmount").is_ok());
        let err = validate_amount(-0.01, "totalAmount").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAmount);
        assert!(validate_amount(f64::NAN, "totalAmount").is_err());
        assert!(validate_amount(f64::INFINITY, "totalAmount").is_err());
    }
}
