use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::FeedError;

/// Stable identifier of a content record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque pagination token.
///
/// A cursor is only meaningful for the query context (kind, term, scope, sort)
/// that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything the result set can deduplicate.
pub trait Identified {
    fn item_id(&self) -> &ItemId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Sermon,
    Gallery,
    Event,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Sermon => "sermon",
            ContentKind::Gallery => "gallery",
            ContentKind::Event => "event",
            ContentKind::Comment => "comment",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = FeedError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "post" | "posts" | "blog" => Ok(ContentKind::Post),
            "sermon" | "sermons" => Ok(ContentKind::Sermon),
            "gallery" | "galleries" => Ok(ContentKind::Gallery),
            "event" | "events" => Ok(ContentKind::Event),
            "comment" | "comments" => Ok(ContentKind::Comment),
            other => Err(FeedError::NotFound(format!("content kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// One page as returned by a content-store query client
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// A published piece of site content: blog post, sermon, gallery or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: ItemId,
    pub kind: ContentKind,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Identified for Document {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: ItemId,
    pub post_id: ItemId,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    /// Set on optimistic comments that the store has not confirmed yet.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Identified for Comment {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u64,
}

impl LikeState {
    pub fn new(liked: bool, like_count: u64) -> Self {
        Self { liked, like_count }
    }

    /// The state a successful toggle is expected to produce.
    pub fn toggled(self) -> Self {
        if self.liked {
            Self::new(false, self.like_count.saturating_sub(1))
        } else {
            Self::new(true, self.like_count + 1)
        }
    }
}

/// Bearer credential issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
