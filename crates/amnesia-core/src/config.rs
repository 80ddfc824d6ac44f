//! Fetch, deletion and API configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AmnesiaError, Result};

/// Largest page the timeline and favorites endpoints will return.
const MAX_PAGE_SIZE: u32 = 200;

/// Hours in one "year" of the keep window (52 weeks).
const HOURS_PER_YEAR: u64 = 8736;

/// Connection settings for the provider API.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ApiConfig {
    /// Base URL of the REST API, without trailing slash.
    #[builder(default = "default_api_url()")]
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout.
    #[builder(default = "default_timeout()")]
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// User agent sent with every request.
    #[builder(default = "default_user_agent()")]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_url() -> String {
    "https://api.twitter.com/1.1".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("amnesia/{}", env!("CARGO_PKG_VERSION"))
}

fn check_api_url(url: &str) -> std::result::Result<(), String> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("API URL must be http(s): {url}"));
    }
    Ok(())
}

fn check_timeout(timeout: Duration) -> std::result::Result<(), String> {
    if timeout.is_zero() {
        return Err("Timeout cannot be zero".to_string());
    }
    Ok(())
}

impl ApiConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ref url) = self.api_url {
            check_api_url(url)?;
        }
        if let Some(timeout) = self.timeout {
            check_timeout(timeout)?;
        }
        Ok(())
    }
}

impl ApiConfig {
    /// Create a new config builder.
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Apply the builder checks to a deserialized config.
    pub fn validate(&self) -> Result<()> {
        check_api_url(&self.api_url).map_err(AmnesiaError::invalid_config)?;
        check_timeout(self.timeout).map_err(AmnesiaError::invalid_config)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Pagination settings for the collection fetcher.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct FetchConfig {
    /// Items requested per page (1-200).
    #[builder(default = "MAX_PAGE_SIZE")]
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Stop after this many items (None = until the provider runs out).
    #[builder(default)]
    #[serde(default)]
    pub max_items: Option<usize>,

    /// Include the user's retweets in the tweet timeline.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_retweets: bool,

    /// How many rate-limit rejections `fetch_all` waits out before giving up.
    #[builder(default = "3")]
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,

    /// Wait used when a rate-limit rejection carries no reset time.
    #[builder(default = "default_rate_limit_wait()")]
    #[serde(default = "default_rate_limit_wait", with = "duration_secs")]
    pub rate_limit_wait: Duration,
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_rate_limit_wait() -> Duration {
    Duration::from_secs(15 * 60)
}

fn check_page_size(page_size: u32) -> std::result::Result<(), String> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(format!("Page size must be between 1 and {MAX_PAGE_SIZE}"));
    }
    Ok(())
}

impl FetchConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(page_size) = self.page_size {
            check_page_size(page_size)?;
        }
        Ok(())
    }
}

impl FetchConfig {
    /// Create a new config builder.
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Apply the builder checks to a deserialized config.
    pub fn validate(&self) -> Result<()> {
        check_page_size(self.page_size).map_err(AmnesiaError::invalid_config)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_items: None,
            include_retweets: true,
            rate_limit_retries: default_rate_limit_retries(),
            rate_limit_wait: default_rate_limit_wait(),
        }
    }
}

/// Bounded exponential backoff for per-item delete retries.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct RetryPolicy {
    /// Total attempts per item, including the first one.
    #[builder(default = "3")]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[builder(default = "Duration::from_secs(1)")]
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[builder(default = "Duration::from_secs(60)")]
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    #[builder(default = "2.0")]
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomize each delay between 0.5x and 1.5x.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_multiplier() -> f64 {
    2.0
}

fn check_max_attempts(max_attempts: u32) -> std::result::Result<(), String> {
    if max_attempts == 0 {
        return Err("At least one attempt is required".to_string());
    }
    Ok(())
}

fn check_multiplier(multiplier: f64) -> std::result::Result<(), String> {
    // Also rejects NaN.
    if !(multiplier.is_finite() && multiplier >= 1.0) {
        return Err(format!("Multiplier must be a number of at least 1.0, got {multiplier}"));
    }
    Ok(())
}

impl RetryPolicyBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(max_attempts) = self.max_attempts {
            check_max_attempts(max_attempts)?;
        }
        if let Some(multiplier) = self.multiplier {
            check_multiplier(multiplier)?;
        }
        Ok(())
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Apply the builder checks to a deserialized policy.
    pub fn validate(&self) -> Result<()> {
        check_max_attempts(self.max_attempts).map_err(AmnesiaError::invalid_config)?;
        check_multiplier(self.multiplier).map_err(AmnesiaError::invalid_config)
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs.min(self.max_delay.as_secs_f64())).unwrap_or(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

/// Rules that keep items out of a deletion run besides the whitelist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct KeepPolicy {
    /// Keep items younger than this.
    #[serde(with = "option_duration_secs")]
    pub keep_younger_than: Option<Duration>,

    /// Keep tweets favorited more than this many times (None = unlimited).
    pub max_favorites: Option<u64>,

    /// Keep tweets retweeted more than this many times (None = unlimited).
    pub max_retweets: Option<u64>,
}

impl KeepPolicy {
    /// Create a new policy builder.
    pub fn builder() -> KeepPolicyBuilder {
        KeepPolicyBuilder::default()
    }

    /// Build a keep window from hours, days, weeks and years.
    ///
    /// A year counts as 52 weeks. All zeros means no window.
    pub fn keep_window(hours: u64, days: u64, weeks: u64, years: u64) -> Result<Option<Duration>> {
        let total_hours = [(hours, 1), (days, 24), (weeks, 168), (years, HOURS_PER_YEAR)]
            .into_iter()
            .try_fold(0u64, |total, (count, unit)| {
                count.checked_mul(unit).and_then(|h| total.checked_add(h))
            });
        let secs = total_hours.and_then(|h| h.checked_mul(60 * 60)).ok_or_else(|| {
            AmnesiaError::invalid_config("Keep window is too long")
        })?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// Whether the policy keeps nothing beyond the whitelist.
    pub fn is_empty(&self) -> bool {
        self.keep_younger_than.is_none() && self.max_favorites.is_none() && self.max_retweets.is_none()
    }
}

/// Whether tweets and favorites are processed one after the other or side by side.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Tweets first, then favorites.
    #[default]
    Sequential,
    /// Both kinds at the same time, one worker each.
    Concurrent,
}

/// Configuration for a deletion run.
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct DeletionConfig {
    /// Retry behavior for each item.
    pub retry: RetryPolicy,

    /// Extra keep rules.
    pub keep: KeepPolicy,

    /// Report what would be deleted without deleting anything.
    pub dry_run: bool,

    /// How tweets and favorites runs are scheduled relative to each other.
    pub run_mode: RunMode,
}

impl DeletionConfig {
    /// Create a new config builder.
    pub fn builder() -> DeletionConfigBuilder {
        DeletionConfigBuilder::default()
    }

    /// Check the nested retry policy of a deserialized config.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
