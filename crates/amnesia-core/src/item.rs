//! Fetched item types.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Provider identifier of a tweet.
///
/// Favorites are tweets written by someone else, so both kinds share the same
/// id space. Ids are snowflakes and grow with time, which pagination relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new ItemId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id immediately before this one, used as an exclusive page cursor.
    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The two independently fetched and deleted feeds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A tweet authored by the logged-in user.
    Tweet,
    /// A tweet the logged-in user has favorited.
    Favorite,
}

impl ItemKind {
    /// Plural noun used in summaries ("tweets", "favorites").
    pub fn plural(self) -> &'static str {
        match self {
            Self::Tweet => "tweets",
            Self::Favorite => "favorites",
        }
    }

    /// Past-tense verb describing a successful delete of this kind.
    pub fn deleted_verb(self) -> &'static str {
        match self {
            Self::Tweet => "Deleted",
            Self::Favorite => "Removed",
        }
    }
}

/// A single tweet or favorite as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Provider id.
    pub id: ItemId,

    /// Which feed the item was fetched from.
    pub kind: ItemKind,

    /// When the tweet was posted.
    pub created_at: DateTime<Utc>,

    /// Tweet text.
    #[serde(default)]
    pub text: CompactString,

    /// Number of times the tweet was favorited.
    #[serde(default)]
    pub favorite_count: u64,

    /// Number of times the tweet was retweeted.
    #[serde(default)]
    pub retweet_count: u64,
}

impl Item {
    /// Create an item with no text and zero engagement.
    pub fn new(id: impl Into<ItemId>, kind: ItemKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at,
            text: CompactString::default(),
            favorite_count: 0,
            retweet_count: 0,
        }
    }

    /// Set the tweet text.
    pub fn with_text(mut self, text: impl Into<CompactString>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the engagement counters.
    pub fn with_counts(mut self, favorite_count: u64, retweet_count: u64) -> Self {
        self.favorite_count = favorite_count;
        self.retweet_count = retweet_count;
        self
    }

    /// Age of the item relative to `now`. Never negative.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// A short, single-line preview of the text for progress display.
    pub fn snippet(&self, max_chars: usize) -> String {
        let flat: String = self
            .text
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();

        if flat.chars().count() > max_chars {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{cut}...")
        } else {
            flat
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_item_id_parse_and_previous() {
        let id: ItemId = "1050118621198921728".parse().unwrap();
        assert_eq!(id, ItemId(1050118621198921728));
        assert_eq!(id.previous(), Some(ItemId(1050118621198921727)));
        assert_eq!(ItemId(0).previous(), None);
        assert!("abc".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_item_kind_from_str() {
        assert_eq!("tweet".parse::<ItemKind>().unwrap(), ItemKind::Tweet);
        assert_eq!("Favorite".parse::<ItemKind>().unwrap(), ItemKind::Favorite);
        assert_eq!(ItemKind::Favorite.to_string(), "favorite");
        assert_eq!(ItemKind::Tweet.plural(), "tweets");
    }

    #[test]
    fn test_snippet_truncates() {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let item = Item::new(1, ItemKind::Tweet, created).with_text("hello\nthere world");
        assert_eq!(item.snippet(11), "hello there...");
        assert_eq!(item.snippet(50), "hello there world");
    }

    #[test]
    fn test_age_is_never_negative() {
        let created = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let item = Item::new(1, ItemKind::Tweet, created);
        assert_eq!(item.age(now), std::time::Duration::ZERO);
    }
}
