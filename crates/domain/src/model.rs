//! Domain models and value objects

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Generate a fresh post ID for callers that do not supply one
pub fn new_post_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Lifecycle marker stored on every post row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Active,
    Deleted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PostStatus::Active),
            "deleted" => Ok(PostStatus::Deleted),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

/// A post as recorded in the relational store (the authoritative record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Opaque unique ID, immutable once written
    pub post_id: String,
    /// Owner, immutable
    pub user_id: String,
    /// Display title
    pub title: String,
    /// Key of the attached object; empty when nothing is attached
    pub file_name: String,
    pub status: PostStatus,
}

impl Post {
    /// Whether the post references an object in the blob store
    pub fn has_attachment(&self) -> bool {
        !self.file_name.is_empty()
    }
}

/// An active post together with its relational upvote count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPost {
    pub post: Post,
    pub upvotes: i64,
}

/// User actions recorded in the metrics store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Edit,
    Delete,
    Upvote,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Upvote => "upvote",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only activity event. The timestamp is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub post_id: String,
    pub user_id: String,
    pub action: Action,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Trailing time interval used to bound metrics aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    secs: u64,
}

const WINDOW_UNITS: [(char, u64); 5] = [
    ('w', WEEK_SECS),
    ('d', 24 * 3600),
    ('h', 3600),
    ('m', 60),
    ('s', 1),
];

const WEEK_SECS: u64 = 7 * 24 * 3600;

/// Longest accepted window (10000 weeks)
pub const MAX_WINDOW_SECS: u64 = 10_000 * WEEK_SECS;

impl Window {
    pub fn from_secs(secs: u64) -> Option<Self> {
        (secs > 0 && secs <= MAX_WINDOW_SECS).then_some(Self { secs })
    }

    pub fn days(days: u64) -> Self {
        Self {
            secs: days.max(1).saturating_mul(24 * 3600).min(MAX_WINDOW_SECS),
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }

    /// Whether `at` falls inside the window ending at `now`
    pub fn contains(&self, at: OffsetDateTime, now: OffsetDateTime) -> bool {
        let start = i64::try_from(self.secs)
            .ok()
            .and_then(|secs| now.checked_sub(time::Duration::seconds(secs)));
        match start {
            Some(start) => at >= start && at <= now,
            // The window reaches past the earliest representable date
            None => at <= now,
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::days(7)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, size) in WINDOW_UNITS {
            if self.secs % size == 0 {
                return write!(f, "{}{}", self.secs / size, unit);
            }
        }
        write!(f, "{}s", self.secs)
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unit = s
            .chars()
            .last()
            .ok_or_else(|| "empty window".to_string())?;
        let size = WINDOW_UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, size)| *size)
            .ok_or_else(|| format!("window '{}' must end in one of s, m, h, d, w", s))?;
        let amount: u64 = s[..s.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| format!("window '{}' must start with a whole number", s))?;

        if amount == 0 {
            return Err(format!("window '{}' must be positive", s));
        }
        amount
            .checked_mul(size)
            .and_then(Window::from_secs)
            .ok_or_else(|| {
                format!(
                    "window '{}' is longer than {} weeks",
                    s,
                    MAX_WINDOW_SECS / WEEK_SECS
                )
            })
    }
}

/// Input for the create saga
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_id: String,
    pub user_id: String,
    pub title: String,
    /// Blob key; empty for a post without attachment
    pub file_name: String,
    pub content: Bytes,
}

/// Input for the edit saga
#[derive(Debug, Clone)]
pub struct PostEdit {
    pub post_id: String,
    /// Actor recorded in the metrics store
    pub user_id: String,
    pub title: String,
    /// New blob key. `None` keeps the current key; an empty key removes the attachment.
    pub file_name: Option<String>,
    /// New object content. `None` keeps the existing bytes (moved if the key changes).
    pub content: Option<Bytes>,
}

/// What the read path found in the blob store for a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// The post has no file attached
    None,
    Loaded(Bytes),
    /// The post has a file but the view did not read it
    NotLoaded,
    /// The post references a key the blob store does not have
    Missing,
    /// The blob store failed while reading
    Unreadable(String),
}

impl Attachment {
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Attachment::Loaded(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<usize> {
        self.bytes().map(|b| b.len())
    }

    /// Hex SHA-256 of the loaded content
    pub fn sha256_hex(&self) -> Option<String> {
        self.bytes()
            .map(|b| format!("{:x}", Sha256::digest(b.as_ref())))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attachment::None => "none",
            Attachment::Loaded(_) => "loaded",
            Attachment::NotLoaded => "not loaded",
            Attachment::Missing => "missing",
            Attachment::Unreadable(_) => "unreadable",
        }
    }
}

/// Aggregated view of a live post
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    /// Upvote count, when the source of the view provides one
    pub upvotes: Option<i64>,
    pub attachment: Attachment,
    pub last_activity: Option<OffsetDateTime>,
}

/// A post as shown to users. Missing and soft-deleted posts both render as "Deleted".
#[derive(Debug, Clone)]
pub enum PostView {
    Active(Box<PostDetail>),
    Deleted { post_id: String },
}

impl PostView {
    pub const DELETED_LABEL: &'static str = "Deleted";

    pub fn post_id(&self) -> &str {
        match self {
            PostView::Active(detail) => &detail.post.post_id,
            PostView::Deleted { post_id } => post_id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, PostView::Deleted { .. })
    }

    pub fn detail(&self) -> Option<&PostDetail> {
        match self {
            PostView::Active(detail) => Some(detail),
            PostView::Deleted { .. } => None,
        }
    }
}

/// Which index drives a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSource {
    /// Every active post with relational upvote counts
    #[default]
    Relational,
    /// Posts with metrics activity inside the window
    Recent(Window),
    /// Most upvoted posts inside the window, ranked by the metrics store
    Top { window: Window, n: usize },
}

/// Whether the relational step changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Applied,
    /// Idempotent repeat (duplicate upvote, delete of a deleted post)
    AlreadyApplied,
}

/// Result of a committed write saga
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub post_id: String,
    pub action: Action,
    pub effect: Effect,
    /// False when the metrics side channel failed or was skipped
    pub metrics_recorded: bool,
}
