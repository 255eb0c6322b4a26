use axum::http::HeaderName;

use crate::trace::TRACE_ID_HEADER;

/// Runtime switches for the layers installed by
/// [`ApiResponseRouterExt`](crate::ApiResponseRouterExt).
#[derive(Clone, Debug)]
pub struct ApiResponseConfig {
    /// Install the 404 / 405 / panic translation layers.
    pub enabled: bool,
    /// Response header that echoes the trace id. `None` disables it.
    pub trace_header: Option<HeaderName>,
    pub catch_panics: bool,
}

impl Default for ApiResponseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trace_header: Some(HeaderName::from_static(TRACE_ID_HEADER)),
            catch_panics: true,
        }
    }
}

impl ApiResponseConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled_str) = lookup("API_RESPONSE_ENABLED") {
            config.enabled = parse_flag(&enabled_str).unwrap_or(config.enabled);
        }

        if let Some(header_str) = lookup("API_RESPONSE_TRACE_HEADER") {
            let header_str = header_str.trim();
            if header_str.is_empty() {
                config.trace_header = None;
            } else {
                match HeaderName::try_from(header_str.to_ascii_lowercase()) {
                    Ok(name) => config.trace_header = Some(name),
                    Err(_) => tracing::warn!(
                        header = header_str,
                        "Ignoring invalid API_RESPONSE_TRACE_HEADER"
                    ),
                }
            }
        }

        if let Some(panics_str) = lookup("API_RESPONSE_CATCH_PANICS") {
            config.catch_panics = parse_flag(&panics_str).unwrap_or(config.catch_panics);
        }

        tracing::info!(
            "api-response config loaded: enabled={}, trace_header={:?}, catch_panics={}",
            config.enabled,
            config.trace_header,
            config.catch_panics
        );

        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
