//! Rate-limit header parsing.

use std::time::Duration;

use reqwest::header::HeaderMap;

/// Rate-limit window reported by the `x-rate-limit-*` response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: Option<u32>,
    /// Requests left in the current window.
    pub remaining: Option<u32>,
    /// Unix timestamp at which the window resets.
    pub reset: Option<i64>,
}

impl RateLimitInfo {
    /// Parse rate-limit info from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        }

        Self {
            limit: header(headers, "x-rate-limit-limit"),
            remaining: header(headers, "x-rate-limit-remaining"),
            reset: header(headers, "x-rate-limit-reset"),
        }
    }

    /// Whether the window has no requests left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Time until the window resets, measured from `now` (unix seconds).
    pub fn time_until_reset_from(&self, now: i64) -> Option<Duration> {
        let reset = self.reset?;
        (reset > now).then(|| Duration::from_secs(u64::try_from(reset - now).unwrap_or(0)))
    }

    /// Time until the window resets.
    pub fn time_until_reset(&self) -> Option<Duration> {
        self.time_until_reset_from(chrono::Utc::now().timestamp())
    }
}
