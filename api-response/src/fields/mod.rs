//! Per-field string processing for JSON request bodies.
//!
//! A request DTO declares, once and statically, which of its string fields
//! are trimmed and which reject markup (see [`StringFields`]). The markers are
//! resolved into a [`StringMode`] per field the first time the DTO is bound
//! and cached for the lifetime of the process; every value seen for that
//! field afterwards goes through [`StringMode::process`].
//!
//! ```ignore
//! use api_response::fields::{FieldMarker::*, FieldSpec, StringFields};
//!
//! #[derive(Deserialize)]
//! struct CommentRequest {
//!     author: String,
//!     content: String,
//! }
//!
//! impl StringFields for CommentRequest {
//!     const FIELDS: &'static [FieldSpec] = &[
//!         FieldSpec::new("author", &[AutoTrim]),
//!         FieldSpec::new("content", &[AutoTrim, XssCheck]),
//!     ];
//! }
//! ```

pub mod binder;
pub mod de;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub use binder::{FieldModes, FieldSpec, StringFields};

lazy_static! {
    /// `<`, optional whitespace, then a letter, `/` or `!`: the opening of a
    /// tag, closing tag, comment or doctype.
    static ref MARKUP_PATTERN: Regex = Regex::new(r"<\s*[a-zA-Z/!]").unwrap();
}

/// Returns true if `value` contains something shaped like an HTML/XML tag
/// opening anywhere, including across line breaks.
///
/// This is a single fixed pattern, not a parser: it is not a general
/// defence against every injection vector.
pub fn contains_markup(value: &str) -> bool {
    MARKUP_PATTERN.is_match(value)
}

/// Raised when a markup-checked field contains a tag opening.
///
/// The message intentionally carries no part of the rejected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", MarkupRejected::MESSAGE)]
pub struct MarkupRejected;

impl MarkupRejected {
    pub const MESSAGE: &'static str =
        "Security Error: HTML tags or XSS payloads are not allowed in the request.";
}

/// Field-level marker, the static counterpart of a field annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMarker {
    /// Trim leading and trailing whitespace.
    AutoTrim,
    /// Reject values containing a tag opening.
    XssCheck,
    /// Never trim, even when the policy trims by default. Does not affect
    /// markup rejection.
    NoTrim,
}

/// Default processing for fields that carry no marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringPolicy {
    /// Leave unmarked fields untouched; markers opt in.
    #[default]
    Untouched,
    /// Trim and reject markup everywhere; `NoTrim` opts a field out of
    /// trimming.
    TrimAndRejectMarkup,
}

impl StringPolicy {
    pub fn base_mode(self) -> StringMode {
        match self {
            StringPolicy::Untouched => StringMode::UNTOUCHED,
            StringPolicy::TrimAndRejectMarkup => StringMode::TRIM_AND_REJECT_MARKUP,
        }
    }
}

/// How one field's string values are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringMode {
    pub trim: bool,
    pub reject_markup: bool,
}

impl StringMode {
    pub const UNTOUCHED: Self = Self::new(false, false);
    pub const TRIM: Self = Self::new(true, false);
    pub const REJECT_MARKUP: Self = Self::new(false, true);
    pub const TRIM_AND_REJECT_MARKUP: Self = Self::new(true, true);

    pub const fn new(trim: bool, reject_markup: bool) -> Self {
        Self {
            trim,
            reject_markup,
        }
    }

    /// Resolve the mode of a field from the type's policy and the field's
    /// markers. `NoTrim` beats `AutoTrim` when both are present.
    pub fn resolve(policy: StringPolicy, markers: &[FieldMarker]) -> Self {
        let mut mode = policy.base_mode();
        if markers.contains(&FieldMarker::AutoTrim) {
            mode.trim = true;
        }
        if markers.contains(&FieldMarker::XssCheck) {
            mode.reject_markup = true;
        }
        if markers.contains(&FieldMarker::NoTrim) {
            mode.trim = false;
        }
        mode
    }

    pub fn is_untouched(&self) -> bool {
        *self == Self::UNTOUCHED
    }

    /// Trim (if enabled), then check the trimmed value (if enabled).
    pub fn process(self, value: String) -> Result<String, MarkupRejected> {
        let value = if self.trim {
            trim_owned(value)
        } else {
            value
        };

        if self.reject_markup && contains_markup(&value) {
            return Err(MarkupRejected);
        }

        Ok(value)
    }

    /// Like [`process`](Self::process), but `None` passes through untouched.
    pub fn apply(self, value: Option<String>) -> Result<Option<String>, MarkupRejected> {
        value.map(|v| self.process(v)).transpose()
    }
}

fn trim_owned(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}
