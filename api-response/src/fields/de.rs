//! `deserialize_with` helpers that fix a field's mode at compile time.
//!
//! Useful when a type is deserialized outside of
//! [`ValidatedJson`](crate::ValidatedJson), e.g. from a message queue or a
//! config file:
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct Comment {
//!     #[serde(deserialize_with = "api_response::fields::de::auto_trim")]
//!     author: String,
//!     #[serde(default, deserialize_with = "api_response::fields::de::option::xss_check")]
//!     body: Option<String>,
//! }
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use super::StringMode;

fn with_mode<'de, D>(deserializer: D, mode: StringMode) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    mode.process(value).map_err(D::Error::custom)
}

pub fn auto_trim<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    with_mode(deserializer, StringMode::TRIM)
}

pub fn xss_check<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    with_mode(deserializer, StringMode::REJECT_MARKUP)
}

pub fn auto_trim_xss_check<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    with_mode(deserializer, StringMode::TRIM_AND_REJECT_MARKUP)
}

/// Same helpers for `Option<String>`; `null` stays `None`.
pub mod option {
    use super::*;

    fn with_mode<'de, D>(deserializer: D, mode: StringMode) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        mode.apply(value).map_err(D::Error::custom)
    }

    pub fn auto_trim<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        with_mode(deserializer, StringMode::TRIM)
    }

    pub fn xss_check<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        with_mode(deserializer, StringMode::REJECT_MARKUP)
    }

    pub fn auto_trim_xss_check<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        with_mode(deserializer, StringMode::TRIM_AND_REJECT_MARKUP)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use crate::fields::MarkupRejected;

    #[derive(Debug, Deserialize)]
    struct Comment {
        #[serde(deserialize_with = "super::auto_trim")]
        author: String,
        #[serde(deserialize_with = "super::auto_trim_xss_check")]
        content: String,
        raw: String,
        #[serde(default, deserialize_with = "super::option::xss_check")]
        signature: Option<String>,
    }

    #[test]
    fn test_helpers_apply_fixed_modes() {
        let comment: Comment = serde_json::from_str(
            r#"{"author":"  ann ","content":"  hi  ","raw":"  kept  ","signature":" -a "}"#,
        )
        .unwrap();

        assert_eq!(comment.author, "ann");
        assert_eq!(comment.content, "hi");
        assert_eq!(comment.raw, "  kept  ");
        assert_eq!(comment.signature.as_deref(), Some(" -a "));
    }

    #[test]
    fn test_option_helpers_keep_null() {
        let comment: Comment =
            serde_json::from_str(r#"{"author":"a","content":"b","raw":"c","signature":null}"#).unwrap();
        assert_eq!(comment.signature, None);

        let missing: Comment = serde_json::from_str(r#"{"author":"a","content":"b","raw":"c"}"#).unwrap();
        assert_eq!(missing.signature, None);
    }

    #[test]
    fn test_markup_fails_deserialization() {
        let err = serde_json::from_str::<Comment>(
            r#"{"author":"a","content":"<script>steal()</script>","raw":"c"}"#,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with(MarkupRejected::MESSAGE));
        assert!(!message.contains("steal"));
    }
}
