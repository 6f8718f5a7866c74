//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the services that
//! need it. Nothing in this crate reads environment variables or credentials while handling a
//! request; binaries call [`CoreConfig::from_lookup`] with `std::env::var` and tests call it
//! with a map.

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL,
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_OSRM_URL, DEFAULT_OVERPASS_URL,
    DEFAULT_SEARCH_RADIUS_M,
};
use crate::retry::RetryPolicy;
use crate::{CareError, CareResult};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const ENV_GEMINI_API_KEY: &str = "CARECARD_GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "CARECARD_GEMINI_MODEL";
pub const ENV_GEMINI_API_BASE: &str = "CARECARD_GEMINI_API_BASE";
pub const ENV_OVERPASS_URL: &str = "CARECARD_OVERPASS_URL";
pub const ENV_OSRM_URL: &str = "CARECARD_OSRM_URL";
pub const ENV_SEARCH_RADIUS_M: &str = "CARECARD_SEARCH_RADIUS_M";
pub const ENV_MAX_RETRIES: &str = "CARECARD_MAX_RETRIES";
pub const ENV_INITIAL_DELAY_MS: &str = "CARECARD_INITIAL_DELAY_MS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "CARECARD_BACKOFF_MULTIPLIER";

/// Where and how to reach the completion service.
#[derive(Clone)]
pub struct CompletionConfig {
    api_base: String,
    model: String,
    api_key: String,
}

impl CompletionConfig {
    /// Create a new `CompletionConfig`.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidConfig` if the base URL does not parse or if the model or
    /// API key is blank.
    pub fn new(api_base: String, model: String, api_key: String) -> CareResult<Self> {
        let api_base = validate_url(ENV_GEMINI_API_BASE, &api_base)?;
        if model.trim().is_empty() {
            return Err(CareError::InvalidConfig(format!(
                "{ENV_GEMINI_MODEL} cannot be empty"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(CareError::InvalidConfig(format!(
                "{ENV_GEMINI_API_KEY} cannot be empty"
            )));
        }

        Ok(Self {
            api_base,
            model: model.trim().to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    completion: Option<CompletionConfig>,
    overpass_url: String,
    osrm_url: String,
    search_radius_m: u32,
    retry_policy: RetryPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `completion` may be absent; the operations that need it then fail with
    /// `CareError::InvalidConfig` while everything else keeps working.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidConfig` if either map URL does not parse or the search
    /// radius is zero.
    pub fn new(
        completion: Option<CompletionConfig>,
        overpass_url: String,
        osrm_url: String,
        search_radius_m: u32,
        retry_policy: RetryPolicy,
    ) -> CareResult<Self> {
        let overpass_url = validate_url(ENV_OVERPASS_URL, &overpass_url)?;
        let osrm_url = validate_url(ENV_OSRM_URL, &osrm_url)?;
        if search_radius_m == 0 {
            return Err(CareError::InvalidConfig(format!(
                "{ENV_SEARCH_RADIUS_M} must be greater than zero"
            )));
        }

        Ok(Self {
            completion,
            overpass_url,
            osrm_url,
            search_radius_m,
            retry_policy,
        })
    }

    /// Resolve configuration from a key lookup, typically `|k| std::env::var(k).ok()`.
    ///
    /// Blank values count as unset. Only the completion API key has no default.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidConfig` if any provided value fails to parse or validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CareResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let completion = match get(ENV_GEMINI_API_KEY) {
            Some(api_key) => Some(CompletionConfig::new(
                get(ENV_GEMINI_API_BASE).unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.into()),
                get(ENV_GEMINI_MODEL).unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
                api_key,
            )?),
            None => {
                tracing::warn!("{} not set; completion features are disabled", ENV_GEMINI_API_KEY);
                None
            }
        };

        let retry_policy = retry_policy_from_env_values(
            get(ENV_MAX_RETRIES),
            get(ENV_INITIAL_DELAY_MS),
            get(ENV_BACKOFF_MULTIPLIER),
        )?;

        Self::new(
            completion,
            get(ENV_OVERPASS_URL).unwrap_or_else(|| DEFAULT_OVERPASS_URL.into()),
            get(ENV_OSRM_URL).unwrap_or_else(|| DEFAULT_OSRM_URL.into()),
            parse_value(ENV_SEARCH_RADIUS_M, get(ENV_SEARCH_RADIUS_M))?
                .unwrap_or(DEFAULT_SEARCH_RADIUS_M),
            retry_policy,
        )
    }

    /// The completion settings.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidConfig` if no API key was configured.
    pub fn completion(&self) -> CareResult<&CompletionConfig> {
        self.completion.as_ref().ok_or_else(|| {
            CareError::InvalidConfig(format!("{ENV_GEMINI_API_KEY} is not set"))
        })
    }

    pub fn overpass_url(&self) -> &str {
        &self.overpass_url
    }

    pub fn osrm_url(&self) -> &str {
        &self.osrm_url
    }

    pub fn search_radius_m(&self) -> u32 {
        self.search_radius_m
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

/// Build a retry policy from optional string values, falling back to the defaults.
///
/// # Errors
///
/// Returns `CareError::InvalidConfig` if a value does not parse or the resulting policy is
/// invalid.
pub fn retry_policy_from_env_values(
    max_retries: Option<String>,
    initial_delay_ms: Option<String>,
    backoff_multiplier: Option<String>,
) -> CareResult<RetryPolicy> {
    let max_retries = parse_value(ENV_MAX_RETRIES, max_retries)?.unwrap_or(DEFAULT_MAX_RETRIES);
    let initial_delay_ms =
        parse_value(ENV_INITIAL_DELAY_MS, initial_delay_ms)?.unwrap_or(DEFAULT_INITIAL_DELAY_MS);
    let backoff_multiplier = parse_value(ENV_BACKOFF_MULTIPLIER, backoff_multiplier)?
        .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);

    RetryPolicy::new(max_retries, initial_delay_ms, backoff_multiplier)
        .map_err(|e| CareError::InvalidConfig(e.to_string()))
}

fn parse_value<T>(key: &str, value: Option<String>) -> CareResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| CareError::InvalidConfig(format!("{key}={v:?}: {e}")))
        })
        .transpose()
}

fn validate_url(key: &str, value: &str) -> CareResult<String> {
    let parsed = Url::parse(value.trim())
        .map_err(|e| CareError::InvalidConfig(format!("{key}={value:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CareError::InvalidConfig(format!(
            "{key} must be an http(s) URL"
        )));
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_api_key() {
        let cfg = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.completion().is_err());
        assert_eq!(cfg.overpass_url(), DEFAULT_OVERPASS_URL);
        assert_eq!(cfg.osrm_url(), DEFAULT_OSRM_URL);
        assert_eq!(cfg.search_radius_m(), 5000);
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_api_key_enables_completion() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            (ENV_GEMINI_API_KEY, "abc"),
            (ENV_GEMINI_MODEL, "gemini-test"),
            (ENV_GEMINI_API_BASE, "https://example.test/"),
        ]))
        .unwrap();
        let completion = cfg.completion().unwrap();
        assert_eq!(completion.api_key(), "abc");
        assert_eq!(
            completion.generate_content_url(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            (ENV_GEMINI_API_KEY, "   "),
            (ENV_MAX_RETRIES, ""),
        ]))
        .unwrap();
        assert!(cfg.completion().is_err());
        assert_eq!(cfg.retry_policy().max_retries(), 3);
    }

    #[test]
    fn test_retry_overrides() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            (ENV_MAX_RETRIES, "5"),
            (ENV_INITIAL_DELAY_MS, "250"),
            (ENV_BACKOFF_MULTIPLIER, "1.5"),
        ]))
        .unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
        assert_eq!(policy.backoff_multiplier(), 1.5);
    }

    #[test]
    fn test_invalid_retry_values_rejected() {
        assert!(retry_policy_from_env_values(Some("many".into()), None, None).is_err());
        assert!(retry_policy_from_env_values(None, Some("0".into()), None).is_err());
        assert!(retry_policy_from_env_values(None, None, Some("1".into())).is_err());
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(CoreConfig::from_lookup(lookup(&[(ENV_OVERPASS_URL, "not a url")])).is_err());
        assert!(CoreConfig::from_lookup(lookup(&[(ENV_OSRM_URL, "ftp://osrm.test")])).is_err());
    }

    #[test]
    fn test_zero_radius_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_SEARCH_RADIUS_M, "0")])).unwrap_err();
        assert!(matches!(err, CareError::InvalidConfig(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let completion = CompletionConfig::new(
            "https://example.test".into(),
            "m".into(),
            "super-secret".into(),
        )
        .unwrap();
        let shown = format!("{completion:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<redacted>"));
    }
}
