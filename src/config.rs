use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeneratorConfig {
    /// Reads `TEXTGEN_*` variables from the process environment. Returns
    /// `None` when no API key is configured.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(api_key) = lookup("TEXTGEN_API_KEY").filter(|key| !key.trim().is_empty()) else {
            return Ok(None);
        };

        let timeout_secs = match lookup("TEXTGEN_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("TEXTGEN_TIMEOUT_SECS must be a number of seconds, got {raw:?}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Some(Self {
            api_key: api_key.trim().to_string(),
            model: lookup("TEXTGEN_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("TEXTGEN_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}
