//! Field-level validation for request bodies.
//!
//! Implement [`Validatable`] for a request type and accept it through
//! [`ValidatedJson`](crate::ValidatedJson); failures become a 400 problem
//! detail whose `errors` member maps each field to its messages:
//!
//! ```json
//! {
//!   "type": "about:blank",
//!   "title": "Bad Request",
//!   "status": 400,
//!   "detail": "Validation Failed",
//!   "errors": {"email": "is required", "name": "must be at least 1 characters"},
//!   "traceId": "uuid-here",
//!   "timestamp": "2026-02-20T10:30:00Z"
//! }
//! ```

pub mod validators;

use std::collections::BTreeMap;

use serde::Serialize;

pub use validators::{validate_email, validate_length, validate_required};

/// One failed rule, reported against the wire name of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Fold errors into one message per field, joining repeats with `"; "`.
pub fn merge_field_errors(errors: &[FieldError]) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for error in errors {
        merged
            .entry(error.field.clone())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&error.message);
            })
            .or_insert_with(|| error.message.clone());
    }
    merged
}

/// Trait for request types that check their own invariants after binding.
pub trait Validatable {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }
}

/// Collects field errors in the order the rules ran.
#[derive(Debug, Default)]
pub struct ValidationBuilder {
    errors: Vec<FieldError>,
}

impl ValidationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `rule` and records its message against `field` on failure.
    pub fn check<F>(&mut self, field: &str, rule: F) -> &mut Self
    where
        F: FnOnce() -> Result<(), String>,
    {
        match rule() {
            Ok(()) => self,
            Err(message) => self.push(field, message),
        }
    }

    /// Records `message` against `field` unless `holds`.
    pub fn ensure(&mut self, holds: bool, field: &str, message: &str) -> &mut Self {
        if holds {
            self
        } else {
            self.push(field, message)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hands back everything recorded so far and resets the builder.
    pub fn build(&mut self) -> Result<(), Vec<FieldError>> {
        let errors = std::mem::take(&mut self.errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn push(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError::new(field, message));
        self
    }
}
