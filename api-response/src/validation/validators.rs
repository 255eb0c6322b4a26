//! Reusable field validators returning the message to report.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
}

/// Fails on empty or whitespace-only input.
pub fn validate_required(value: &str) -> Result<(), String> {
    match value.trim() {
        "" => Err("is required".to_string()),
        _ => Ok(()),
    }
}

/// Bounds are inclusive and count `char`s.
pub fn validate_length(value: &str, min: usize, max: usize) -> Result<(), String> {
    match value.chars().count() {
        n if n < min => Err(format!("must be at least {min} characters")),
        n if n > max => Err(format!("must be at most {max} characters")),
        _ => Ok(()),
    }
}

pub fn validate_email(value: &str) -> Result<(), String> {
    EMAIL_REGEX
        .is_match(value)
        .then_some(())
        .ok_or_else(|| "must be a valid email address".to_string())
}
