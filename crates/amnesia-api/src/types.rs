//! Twitter v1.1 wire types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use amnesia_core::{AmnesiaError, Item, ItemId, ItemKind, Result};

use crate::api::Account;

/// `created_at` format used by v1.1, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Error codes that mean the credentials are unusable.
const AUTH_ERROR_CODES: [i64; 4] = [32, 89, 99, 215];

/// Error code for "Rate limit exceeded".
const RATE_LIMIT_ERROR_CODE: i64 = 88;

/// A status object as returned by timeline and favorites endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct RawStatus {
    pub id_str: String,
    pub created_at: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub favorite_count: Option<u64>,
    #[serde(default)]
    pub retweet_count: Option<u64>,
}

impl RawStatus {
    /// Convert into an [`Item`] of the feed it was fetched from.
    pub fn into_item(self, kind: ItemKind) -> Result<Item> {
        let id: ItemId = self.id_str.parse().map_err(|_| AmnesiaError::Decode {
            message: format!("invalid status id '{}'", self.id_str),
        })?;
        let created_at = parse_created_at(&self.created_at)?;
        let text = self.full_text.or(self.text).unwrap_or_default();

        Ok(Item::new(id, kind, created_at)
            .with_text(text)
            .with_counts(
                self.favorite_count.unwrap_or(0),
                self.retweet_count.unwrap_or(0),
            ))
    }
}

/// The user object returned by `account/verify_credentials`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub id_str: String,
    pub screen_name: String,
}

impl From<RawUser> for Account {
    fn from(user: RawUser) -> Self {
        Self {
            user_id: user.id_str,
            screen_name: user.screen_name,
        }
    }
}

/// Error envelope: `{"errors":[{"code":32,"message":"..."}]}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse an error body, falling back to the raw text.
    pub fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_else(|_| Self {
            errors: Vec::new(),
            error: Some(String::from_utf8_lossy(bytes).trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }

    fn first_code(&self) -> Option<i64> {
        self.errors.iter().find_map(|e| e.code)
    }

    fn message(&self) -> String {
        self.errors
            .iter()
            .find_map(|e| e.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    /// Classify a non-success response.
    pub fn into_error(self, status: u16, retry_after: Option<std::time::Duration>) -> AmnesiaError {
        let code = self.first_code();

        if status == 429 || code == Some(RATE_LIMIT_ERROR_CODE) {
            return AmnesiaError::RateLimited { retry_after };
        }
        if status == 401 || code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c)) {
            return AmnesiaError::auth(self.message());
        }

        AmnesiaError::Api {
            status,
            code,
            message: self.message(),
        }
    }
}

pub(crate) fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AmnesiaError::Decode {
            message: format!("invalid created_at '{raw}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_parse_created_at() {
        let parsed = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
        assert!(parse_created_at("2018-10-10").is_err());
    }

    #[test]
    fn test_status_prefers_full_text() {
        let raw: RawStatus = serde_json::from_value(serde_json::json!({
            "id_str": "1050118621198921728",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "text": "short…",
            "full_text": "the whole thing",
            "favorite_count": 12,
            "retweet_count": 3
        }))
        .unwrap();

        let item = raw.into_item(ItemKind::Tweet).unwrap();
        assert_eq!(item.id, ItemId(1050118621198921728));
        assert_eq!(item.text, "the whole thing");
        assert_eq!(item.favorite_count, 12);
        assert_eq!(item.retweet_count, 3);
    }

    #[test]
    fn test_error_classification() {
        let body = ErrorBody::parse(br#"{"errors":[{"code":89,"message":"Invalid or expired token."}]}"#);
        assert!(body.into_error(400, None).is_auth());

        let body = ErrorBody::parse(br#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#);
        let err = body.into_error(400, Some(Duration::from_secs(60)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

        let body = ErrorBody::parse(br#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#);
        match body.into_error(404, None) {
            AmnesiaError::Api { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(144));
                assert_eq!(message, "No status found with that ID.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_body_falls_back_to_text() {
        let body = ErrorBody::parse(b"Over capacity");
        let err = body.into_error(503, None);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "API error 503: Over capacity");
    }
}
