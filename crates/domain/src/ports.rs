//! Port definitions (traits) for the three stores
//!
//! These traits define the boundaries between the orchestrator and the
//! relational, object and metrics stores. Adapters implement them.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{Action, Post, RankedPost, Window};

/// Error type for relational store operations
#[derive(Debug, Error)]
pub enum PostRepoError {
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("Post already exists: {0}")]
    AlreadyExists(String),
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt row for post {post_id}: {message}")]
    Corrupt { post_id: String, message: String },
}

/// Port for the relational store holding post metadata and upvotes
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new active post row
    async fn insert(
        &self,
        post_id: &str,
        user_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError>;

    /// Fetch a post only if it is active; deleted posts are reported as not found
    async fn get_active(&self, post_id: &str) -> Result<Post, PostRepoError>;

    /// All active posts with their upvote counts (zero included)
    async fn list_active_with_upvote_counts(&self) -> Result<Vec<RankedPost>, PostRepoError>;

    /// Overwrite title and file name of an active post
    async fn update(&self, post_id: &str, title: &str, file_name: &str)
    -> Result<(), PostRepoError>;

    /// Mark a post deleted. Succeeds for posts that are already deleted.
    async fn soft_delete(&self, post_id: &str) -> Result<(), PostRepoError>;

    /// Record an upvote. Returns false when the (post, user) pair was already present.
    async fn upvote(&self, post_id: &str, user_id: &str) -> Result<bool, PostRepoError>;
}

/// Error type for blob store operations
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Unavailable(e.to_string())
    }
}

/// Port for the object store holding attached files
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, overwriting any existing object
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Error type for metrics store operations
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics store unavailable: {0}")]
    Unavailable(String),
    #[error("Metrics query failed: {0}")]
    Query(String),
    #[error("Metrics write rejected: {0}")]
    Rejected(String),
}

/// Port for the append-only activity log
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Append an event; the store assigns the timestamp
    async fn record_action(
        &self,
        post_id: &str,
        user_id: &str,
        action: Action,
    ) -> Result<(), MetricsError>;

    /// Posts with the most upvote events in the window, highest first
    async fn top_n_by_upvotes(
        &self,
        window: &Window,
        n: usize,
    ) -> Result<Vec<(String, i64)>, MetricsError>;

    /// Distinct post IDs with any activity in the window
    async fn recent_post_ids(&self, window: &Window) -> Result<BTreeSet<String>, MetricsError>;

    /// Timestamp of the latest event for a post in the window
    async fn most_recent_activity(
        &self,
        post_id: &str,
        window: &Window,
    ) -> Result<Option<OffsetDateTime>, MetricsError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
