//! Post lifecycle use case - write sagas across the three stores
//!
//! Every write follows the same shape: the relational write goes first and is
//! the commit point. Object and metrics steps run only after it succeeded.
//! An object failure after the commit is reported as
//! [`LifecycleError::Inconsistent`] and the relational row is kept. A metrics
//! failure is logged and never fails the operation.

use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::{
    model::{Action, Effect, NewPost, Post, PostEdit, Receipt},
    policy::{CallError, CallPolicy},
    ports::{BlobError, BlobStore, MetricsStore, PostRepoError, PostRepository},
};

/// Configuration for the lifecycle orchestrator
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Deadlines and retries for store calls
    pub policy: CallPolicy,
    /// Whether list views read each post's object
    pub fetch_attachments: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: CallPolicy::default(),
            fetch_attachments: true,
        }
    }
}

/// The store a saga step talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Relational,
    Object,
    Metrics,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Store::Relational => "relational store",
            Store::Object => "object store",
            Store::Metrics => "metrics store",
        })
    }
}

/// Individual steps of the write sagas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    InsertRow,
    UpdateRow,
    SoftDeleteRow,
    UpvoteRow,
    PutObject,
    DeleteObject,
}

impl SagaStep {
    pub fn store(&self) -> Store {
        match self {
            SagaStep::InsertRow
            | SagaStep::UpdateRow
            | SagaStep::SoftDeleteRow
            | SagaStep::UpvoteRow => Store::Relational,
            SagaStep::PutObject | SagaStep::DeleteObject => Store::Object,
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SagaStep::InsertRow => "insert row",
            SagaStep::UpdateRow => "update row",
            SagaStep::SoftDeleteRow => "soft-delete row",
            SagaStep::UpvoteRow => "upvote row",
            SagaStep::PutObject => "put object",
            SagaStep::DeleteObject => "delete object",
        })
    }
}

/// Errors surfaced by the lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("Post already exists: {0}")]
    AlreadyExists(String),
    #[error("{store} unavailable: {message}")]
    StoreUnavailable { store: Store, message: String },
    #[error("Post {post_id} was committed but {step} failed: {message}")]
    Inconsistent {
        post_id: String,
        step: SagaStep,
        message: String,
    },
    #[error("Outcome unknown for post {post_id}: {step} timed out after {timeout:?}")]
    UnknownOutcome {
        post_id: String,
        step: SagaStep,
        timeout: Duration,
    },
}

impl LifecycleError {
    /// Whether the relational commit happened before the failure
    pub fn is_post_commit(&self) -> bool {
        match self {
            LifecycleError::Inconsistent { .. } => true,
            LifecycleError::UnknownOutcome { step, .. } => step.store() != Store::Relational,
            _ => false,
        }
    }
}

/// Map a failed relational write. The row may exist after a timeout.
pub(crate) fn relational_write_error(
    post_id: &str,
    step: SagaStep,
    err: CallError<PostRepoError>,
) -> LifecycleError {
    match err {
        CallError::TimedOut(timeout) => LifecycleError::UnknownOutcome {
            post_id: post_id.to_string(),
            step,
            timeout,
        },
        CallError::Failed(e) => relational_error(post_id, e),
    }
}

/// Map a failed relational read after retries were exhausted
pub(crate) fn relational_read_error(
    post_id: &str,
    err: CallError<PostRepoError>,
) -> LifecycleError {
    match err {
        CallError::TimedOut(timeout) => LifecycleError::StoreUnavailable {
            store: Store::Relational,
            message: format!("read timed out after {:?}", timeout),
        },
        CallError::Failed(e) => relational_error(post_id, e),
    }
}

fn relational_error(post_id: &str, err: PostRepoError) -> LifecycleError {
    match err {
        PostRepoError::NotFound(_) => LifecycleError::NotFound(post_id.to_string()),
        PostRepoError::AlreadyExists(_) => LifecycleError::AlreadyExists(post_id.to_string()),
        other => LifecycleError::StoreUnavailable {
            store: Store::Relational,
            message: other.to_string(),
        },
    }
}

/// How an edit changes the attached object, decided from the pre-edit row
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilePlan {
    Unchanged,
    /// Same key, new bytes
    Overwrite { key: String, data: Bytes },
    /// Key changes: delete the old object, put the new one.
    /// `data: None` moves the old bytes.
    Rename {
        old: String,
        new: String,
        data: Option<Bytes>,
    },
    /// Attachment removed
    Detach { old: String },
    /// First attachment on a post that had none
    Attach { key: String, data: Bytes },
}

impl FilePlan {
    pub(crate) fn for_edit(before: &Post, edit: &PostEdit) -> Result<Self, LifecycleError> {
        let old = before.file_name.as_str();
        let new = edit.file_name.as_deref().unwrap_or(old);

        let plan = match (old.is_empty(), new.is_empty()) {
            (true, true) => FilePlan::Unchanged,
            (false, true) => FilePlan::Detach {
                old: old.to_string(),
            },
            (true, false) => match &edit.content {
                Some(data) => FilePlan::Attach {
                    key: new.to_string(),
                    data: data.clone(),
                },
                None => {
                    return Err(LifecycleError::InvalidRequest(format!(
                        "post {} has no file to move to '{}'; provide content",
                        edit.post_id, new
                    )));
                }
            },
            (false, false) if old == new => match &edit.content {
                Some(data) => FilePlan::Overwrite {
                    key: new.to_string(),
                    data: data.clone(),
                },
                None => FilePlan::Unchanged,
            },
            (false, false) => FilePlan::Rename {
                old: old.to_string(),
                new: new.to_string(),
                data: edit.content.clone(),
            },
        };

        Ok(plan)
    }
}

/// Post lifecycle orchestrator
pub struct PostLifecycle<R, B, M>
where
    R: PostRepository + ?Sized,
    B: BlobStore + ?Sized,
    M: MetricsStore + ?Sized,
{
    pub(crate) posts: Arc<R>,
    pub(crate) blobs: Arc<B>,
    pub(crate) metrics: Arc<M>,
    pub(crate) config: LifecycleConfig,
}

impl<R, B, M> PostLifecycle<R, B, M>
where
    R: PostRepository + ?Sized,
    B: BlobStore + ?Sized,
    M: MetricsStore + ?Sized,
{
    pub fn new(posts: Arc<R>, blobs: Arc<B>, metrics: Arc<M>, config: LifecycleConfig) -> Self {
        Self {
            posts,
            blobs,
            metrics,
            config,
        }
    }

    pub(crate) fn policy(&self) -> &CallPolicy {
        &self.config.policy
    }

    /// Create a post: insert row, put object, record `create`
    pub async fn create_post(&self, new_post: NewPost) -> Result<Receipt, LifecycleError> {
        let NewPost {
            post_id,
            user_id,
            title,
            file_name,
            content,
        } = new_post;
        require_id("post_id", &post_id)?;
        require_id("user_id", &user_id)?;

        tracing::info!(
            post_id = %post_id,
            user_id = %user_id,
            file_name = %file_name,
            size = content.len(),
            "Creating post"
        );

        self.policy()
            .bounded(self.posts.insert(&post_id, &user_id, &title, &file_name))
            .await
            .map_err(|e| relational_write_error(&post_id, SagaStep::InsertRow, e))?;

        if !file_name.is_empty() {
            self.apply_object_step(
                &post_id,
                SagaStep::PutObject,
                self.blobs.put(&file_name, content),
            )
            .await?;
        }

        let metrics_recorded = self.record(&post_id, &user_id, Action::Create).await;

        Ok(Receipt {
            post_id,
            action: Action::Create,
            effect: Effect::Applied,
            metrics_recorded,
        })
    }

    /// Soft-delete a post, remove its object, record `delete`.
    /// Deleting an already deleted post succeeds without further effects.
    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> Result<Receipt, LifecycleError> {
        require_id("post_id", post_id)?;
        require_id("user_id", user_id)?;

        let before = match self
            .policy()
            .read("get_active", || self.posts.get_active(post_id))
            .await
        {
            Ok(post) => Some(post),
            Err(CallError::Failed(PostRepoError::NotFound(_))) => None,
            Err(e) => return Err(relational_read_error(post_id, e)),
        };

        self.policy()
            .bounded(self.posts.soft_delete(post_id))
            .await
            .map_err(|e| relational_write_error(post_id, SagaStep::SoftDeleteRow, e))?;

        let Some(before) = before else {
            tracing::info!(post_id = %post_id, "Post already deleted");
            return Ok(Receipt {
                post_id: post_id.to_string(),
                action: Action::Delete,
                effect: Effect::AlreadyApplied,
                metrics_recorded: false,
            });
        };

        tracing::info!(post_id = %post_id, user_id = %user_id, "Post soft-deleted");

        if before.has_attachment() {
            self.remove_object(post_id, &before.file_name).await?;
        }

        let metrics_recorded = self.record(post_id, user_id, Action::Delete).await;

        Ok(Receipt {
            post_id: post_id.to_string(),
            action: Action::Delete,
            effect: Effect::Applied,
            metrics_recorded,
        })
    }

    /// Edit title and attachment. The object step is planned from the row
    /// read before the update, so the old key is known after it is overwritten.
    pub async fn edit_post(&self, edit: PostEdit) -> Result<Receipt, LifecycleError> {
        require_id("post_id", &edit.post_id)?;
        require_id("user_id", &edit.user_id)?;
        let post_id = edit.post_id.as_str();

        let before = self
            .policy()
            .read("get_active", || self.posts.get_active(post_id))
            .await
            .map_err(|e| relational_read_error(post_id, e))?;

        let plan = FilePlan::for_edit(&before, &edit)?;
        let file_name = edit.file_name.as_deref().unwrap_or(&before.file_name);

        // Bytes being moved to a new key must be read while the old key is still referenced
        let carried = match &plan {
            FilePlan::Rename { old, data: None, .. } => self.read_for_move(post_id, old).await?,
            _ => None,
        };

        self.policy()
            .bounded(self.posts.update(post_id, &edit.title, file_name))
            .await
            .map_err(|e| relational_write_error(post_id, SagaStep::UpdateRow, e))?;

        tracing::info!(
            post_id = %post_id,
            old_file = %before.file_name,
            new_file = %file_name,
            "Post row updated"
        );

        match plan {
            FilePlan::Unchanged => {}
            FilePlan::Overwrite { key, data } | FilePlan::Attach { key, data } => {
                self.apply_object_step(post_id, SagaStep::PutObject, self.blobs.put(&key, data))
                    .await?;
            }
            FilePlan::Detach { old } => {
                self.remove_object(post_id, &old).await?;
            }
            FilePlan::Rename { old, new, data } => {
                self.remove_object(post_id, &old).await?;
                match data.or(carried) {
                    Some(data) => {
                        self.apply_object_step(
                            post_id,
                            SagaStep::PutObject,
                            self.blobs.put(&new, data),
                        )
                        .await?;
                    }
                    None => {
                        tracing::warn!(
                            post_id = %post_id,
                            old_file = %old,
                            new_file = %new,
                            "No object to move; new key left empty"
                        );
                    }
                }
            }
        }

        let metrics_recorded = self.record(post_id, &edit.user_id, Action::Edit).await;

        Ok(Receipt {
            post_id: post_id.to_string(),
            action: Action::Edit,
            effect: Effect::Applied,
            metrics_recorded,
        })
    }

    /// Upvote an active post. Repeated upvotes by the same user are no-ops
    /// and do not produce another metrics event.
    pub async fn upvote_post(&self, post_id: &str, user_id: &str) -> Result<Receipt, LifecycleError> {
        require_id("post_id", post_id)?;
        require_id("user_id", user_id)?;

        self.policy()
            .read("get_active", || self.posts.get_active(post_id))
            .await
            .map_err(|e| relational_read_error(post_id, e))?;

        let stored = self
            .policy()
            .bounded(self.posts.upvote(post_id, user_id))
            .await
            .map_err(|e| relational_write_error(post_id, SagaStep::UpvoteRow, e))?;

        if !stored {
            tracing::debug!(post_id = %post_id, user_id = %user_id, "Duplicate upvote ignored");
            return Ok(Receipt {
                post_id: post_id.to_string(),
                action: Action::Upvote,
                effect: Effect::AlreadyApplied,
                metrics_recorded: false,
            });
        }

        let metrics_recorded = self.record(post_id, user_id, Action::Upvote).await;

        Ok(Receipt {
            post_id: post_id.to_string(),
            action: Action::Upvote,
            effect: Effect::Applied,
            metrics_recorded,
        })
    }

    /// Run an object step after the relational commit
    async fn apply_object_step<F>(
        &self,
        post_id: &str,
        step: SagaStep,
        call: F,
    ) -> Result<(), LifecycleError>
    where
        F: Future<Output = Result<(), BlobError>>,
    {
        self.policy()
            .bounded(call)
            .await
            .map_err(|e| post_commit_error(post_id, step, e))
    }

    /// Delete an object; a key that is already gone is fine
    async fn remove_object(&self, post_id: &str, key: &str) -> Result<(), LifecycleError> {
        match self.policy().bounded(self.blobs.delete(key)).await {
            Ok(()) => Ok(()),
            Err(CallError::Failed(BlobError::NotFound(_))) => {
                tracing::warn!(post_id = %post_id, file_name = %key, "Object already absent");
                Ok(())
            }
            Err(e) => Err(post_commit_error(post_id, SagaStep::DeleteObject, e)),
        }
    }

    async fn read_for_move(&self, post_id: &str, key: &str) -> Result<Option<Bytes>, LifecycleError> {
        match self.policy().read("get", || self.blobs.get(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(CallError::Failed(BlobError::NotFound(_))) => Ok(None),
            Err(e) => Err(LifecycleError::StoreUnavailable {
                store: Store::Object,
                message: format!("reading {} for post {}: {}", key, post_id, e),
            }),
        }
    }

    /// Append a metrics event. Failures are logged and never propagated.
    async fn record(&self, post_id: &str, user_id: &str, action: Action) -> bool {
        match self
            .policy()
            .bounded(self.metrics.record_action(post_id, user_id, action))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    post_id = %post_id,
                    action = %action,
                    error = %e,
                    "Failed to record metrics event"
                );
                false
            }
        }
    }
}

/// Map an object failure that happened after the relational commit
fn post_commit_error(post_id: &str, step: SagaStep, err: CallError<BlobError>) -> LifecycleError {
    match err {
        CallError::TimedOut(timeout) => {
            tracing::error!(
                post_id = %post_id,
                step = %step,
                timeout = ?timeout,
                "Object step timed out after commit"
            );
            LifecycleError::UnknownOutcome {
                post_id: post_id.to_string(),
                step,
                timeout,
            }
        }
        CallError::Failed(e) => {
            tracing::error!(
                post_id = %post_id,
                step = %step,
                error = %e,
                "Object step failed after commit"
            );
            LifecycleError::Inconsistent {
                post_id: post_id.to_string(),
                step,
                message: e.to_string(),
            }
        }
    }
}

fn require_id(field: &str, value: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        return Err(LifecycleError::InvalidRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}
