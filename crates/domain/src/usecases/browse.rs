//! Read path - list and detail views aggregated from the three stores
//!
//! Reads never mutate. A post that is missing or soft-deleted in the
//! relational store renders as "Deleted"; object and metrics failures
//! degrade the view instead of failing it.

use crate::{
    model::{Attachment, ListSource, Post, PostDetail, PostView, Window},
    policy::CallError,
    ports::{BlobError, BlobStore, MetricsError, MetricsStore, PostRepoError, PostRepository},
    usecases::lifecycle::{LifecycleError, PostLifecycle, Store, relational_read_error},
};

impl<R, B, M> PostLifecycle<R, B, M>
where
    R: PostRepository + ?Sized,
    B: BlobStore + ?Sized,
    M: MetricsStore + ?Sized,
{
    /// List posts from the chosen index
    pub async fn list_posts(&self, source: ListSource) -> Result<Vec<PostView>, LifecycleError> {
        let load = self.config.fetch_attachments;

        match source {
            ListSource::Relational => {
                let ranked = self
                    .policy()
                    .read("list_active_with_upvote_counts", || {
                        self.posts.list_active_with_upvote_counts()
                    })
                    .await
                    .map_err(|e| relational_read_error("*", e))?;

                let mut views = Vec::with_capacity(ranked.len());
                for entry in ranked {
                    let attachment = self.attachment_for(&entry.post, load).await;
                    views.push(PostView::Active(Box::new(PostDetail {
                        post: entry.post,
                        upvotes: Some(entry.upvotes),
                        attachment,
                        last_activity: None,
                    })));
                }
                Ok(views)
            }
            ListSource::Recent(window) => {
                let ids = self
                    .policy()
                    .read("recent_post_ids", || self.metrics.recent_post_ids(&window))
                    .await
                    .map_err(metrics_read_error)?;

                tracing::debug!(window = %window, count = ids.len(), "Recent post ids");

                let mut views = Vec::with_capacity(ids.len());
                for post_id in ids {
                    views.push(self.lookup(&post_id, None, load).await?);
                }
                Ok(views)
            }
            ListSource::Top { window, n } => {
                let ranked = self
                    .policy()
                    .read("top_n_by_upvotes", || self.metrics.top_n_by_upvotes(&window, n))
                    .await
                    .map_err(metrics_read_error)?;

                let mut views = Vec::with_capacity(ranked.len());
                for (post_id, count) in ranked {
                    views.push(self.lookup(&post_id, Some(count), load).await?);
                }
                Ok(views)
            }
        }
    }

    /// Most upvoted posts in the window
    pub async fn top_posts(&self, window: Window, n: usize) -> Result<Vec<PostView>, LifecycleError> {
        self.list_posts(ListSource::Top { window, n }).await
    }

    /// Full view of one post: row, object bytes and last activity
    pub async fn detail_post(
        &self,
        post_id: &str,
        window: &Window,
    ) -> Result<PostView, LifecycleError> {
        let view = self.lookup(post_id, None, true).await?;

        let PostView::Active(mut detail) = view else {
            return Ok(view);
        };

        detail.last_activity = match self
            .policy()
            .read("most_recent_activity", || {
                self.metrics.most_recent_activity(post_id, window)
            })
            .await
        {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(post_id = %post_id, error = %e, "Activity lookup failed");
                None
            }
        };

        Ok(PostView::Active(detail))
    }

    /// Resolve one post id against the relational store
    async fn lookup(
        &self,
        post_id: &str,
        upvotes: Option<i64>,
        load: bool,
    ) -> Result<PostView, LifecycleError> {
        match self
            .policy()
            .read("get_active", || self.posts.get_active(post_id))
            .await
        {
            Ok(post) => {
                let attachment = self.attachment_for(&post, load).await;
                Ok(PostView::Active(Box::new(PostDetail {
                    post,
                    upvotes,
                    attachment,
                    last_activity: None,
                })))
            }
            Err(CallError::Failed(PostRepoError::NotFound(_))) => {
                tracing::debug!(post_id = %post_id, "Post missing or deleted");
                Ok(PostView::Deleted {
                    post_id: post_id.to_string(),
                })
            }
            Err(e) => Err(relational_read_error(post_id, e)),
        }
    }

    async fn attachment_for(&self, post: &Post, load: bool) -> Attachment {
        if !post.has_attachment() {
            return Attachment::None;
        }
        if !load {
            return Attachment::NotLoaded;
        }

        match self
            .policy()
            .read("get", || self.blobs.get(&post.file_name))
            .await
        {
            Ok(bytes) => Attachment::Loaded(bytes),
            Err(CallError::Failed(BlobError::NotFound(_))) => {
                tracing::warn!(
                    post_id = %post.post_id,
                    file_name = %post.file_name,
                    "Object missing for active post"
                );
                Attachment::Missing
            }
            Err(e) => {
                tracing::warn!(
                    post_id = %post.post_id,
                    file_name = %post.file_name,
                    error = %e,
                    "Object read failed"
                );
                Attachment::Unreadable(e.to_string())
            }
        }
    }
}

fn metrics_read_error(err: CallError<MetricsError>) -> LifecycleError {
    LifecycleError::StoreUnavailable {
        store: Store::Metrics,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, NewPost};
    use crate::usecases::fakes::Harness;
    use bytes::Bytes;

    async fn seed(h: &Harness, post_id: &str, file_name: &str, content: &'static str) {
        h.lifecycle
            .create_post(NewPost {
                post_id: post_id.to_string(),
                user_id: "u1".to_string(),
                title: format!("Title {}", post_id),
                file_name: file_name.to_string(),
                content: Bytes::from_static(content.as_bytes()),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_then_detail_round_trip() {
        let h = Harness::new();
        seed(&h, "p1", "f.jpg", "jpeg bytes").await;

        let view = h
            .lifecycle
            .detail_post("p1", &Window::default())
            .await
            .unwrap();

        let detail = view.detail().expect("active post");
        assert_eq!(detail.post.file_name, "f.jpg");
        assert_eq!(detail.post.status, crate::model::PostStatus::Active);
        assert_eq!(
            detail.attachment,
            Attachment::Loaded(Bytes::from_static(b"jpeg bytes"))
        );
        assert_eq!(detail.last_activity, Some(h.metrics.last_seen));
    }

    #[tokio::test]
    async fn test_detail_of_deleted_post_renders_deleted() {
        let h = Harness::new();
        seed(&h, "p1", "f.jpg", "x").await;
        h.lifecycle.delete_post("p1", "u1").await.unwrap();

        let view = h
            .lifecycle
            .detail_post("p1", &Window::default())
            .await
            .unwrap();

        assert!(view.is_deleted());
        assert_eq!(view.post_id(), "p1");
    }

    #[tokio::test]
    async fn test_detail_of_unknown_post_renders_deleted() {
        let h = Harness::new();

        let view = h
            .lifecycle
            .detail_post("ghost", &Window::default())
            .await
            .unwrap();

        assert!(view.is_deleted());
    }

    #[tokio::test]
    async fn test_detail_degrades_on_object_and_metrics_failures() {
        let h = Harness::new();
        seed(&h, "p1", "f.jpg", "x").await;
        h.blobs.faults.fail("get");
        h.metrics.faults.fail("most_recent");

        let view = h
            .lifecycle
            .detail_post("p1", &Window::default())
            .await
            .unwrap();

        let detail = view.detail().unwrap();
        assert!(matches!(detail.attachment, Attachment::Unreadable(_)));
        assert_eq!(detail.last_activity, None);
    }

    #[tokio::test]
    async fn test_detail_reports_missing_object() {
        let h = Harness::new();
        seed(&h, "p1", "f.jpg", "x").await;
        h.blobs.objects.lock().unwrap().clear();

        let view = h
            .lifecycle
            .detail_post("p1", &Window::default())
            .await
            .unwrap();

        assert_eq!(view.detail().unwrap().attachment, Attachment::Missing);
    }

    #[tokio::test]
    async fn test_relational_list_hides_deleted_posts() {
        let h = Harness::new();
        seed(&h, "p1", "a.jpg", "a").await;
        seed(&h, "p2", "", "").await;
        h.lifecycle.upvote_post("p2", "u9").await.unwrap();
        h.lifecycle.delete_post("p1", "u1").await.unwrap();
        h.lifecycle.delete_post("p1", "u1").await.unwrap();

        let views = h.lifecycle.list_posts(ListSource::Relational).await.unwrap();

        assert_eq!(views.len(), 1);
        let detail = views[0].detail().unwrap();
        assert_eq!(detail.post.post_id, "p2");
        assert_eq!(detail.upvotes, Some(1));
        assert_eq!(detail.attachment, Attachment::None);
    }

    #[tokio::test]
    async fn test_recent_list_renders_deleted_between_queries() {
        let h = Harness::new();
        seed(&h, "p1", "a.jpg", "a").await;
        seed(&h, "p2", "b.jpg", "b").await;
        // Soft-deleted directly in the relational store: metrics still report activity
        h.repo
            .rows
            .lock()
            .unwrap()
            .get_mut("p1")
            .unwrap()
            .status = crate::model::PostStatus::Deleted;

        let views = h
            .lifecycle
            .list_posts(ListSource::Recent(Window::default()))
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
        assert!(views[0].is_deleted());
        assert_eq!(views[0].post_id(), "p1");
        assert!(!views[1].is_deleted());
        assert_eq!(
            views[1].detail().unwrap().attachment,
            Attachment::Loaded(Bytes::from_static(b"b"))
        );
    }

    #[tokio::test]
    async fn test_recent_list_fails_when_metrics_unavailable() {
        let h = Harness::new();
        h.metrics.faults.fail("recent");

        let result = h
            .lifecycle
            .list_posts(ListSource::Recent(Window::default()))
            .await;

        assert!(matches!(
            result,
            Err(LifecycleError::StoreUnavailable {
                store: Store::Metrics,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_top_posts_follow_metrics_ranking() {
        let h = Harness::new();
        for id in ["a", "b", "c"] {
            seed(&h, id, "", "").await;
        }
        for (id, votes) in [("a", 3), ("b", 5), ("c", 1)] {
            for voter in 0..votes {
                h.lifecycle
                    .upvote_post(id, &format!("voter{}", voter))
                    .await
                    .unwrap();
            }
        }

        let views = h.lifecycle.top_posts(Window::default(), 2).await.unwrap();

        let ranked: Vec<_> = views
            .iter()
            .map(|v| (v.post_id().to_string(), v.detail().unwrap().upvotes))
            .collect();
        assert_eq!(
            ranked,
            vec![("b".to_string(), Some(5)), ("a".to_string(), Some(3))]
        );
        assert_eq!(
            h.metrics
                .actions_for("b")
                .iter()
                .filter(|a| **a == Action::Upvote)
                .count(),
            5
        );
    }

    #[tokio::test]
    async fn test_list_skips_object_reads_when_disabled() {
        let mut h = Harness::new();
        h.lifecycle.config.fetch_attachments = false;
        seed(&h, "p1", "a.jpg", "a").await;
        h.clear_calls();

        let views = h.lifecycle.list_posts(ListSource::Relational).await.unwrap();

        assert_eq!(views[0].detail().unwrap().attachment, Attachment::NotLoaded);
        assert_eq!(h.calls(), vec!["repo.list"]);
    }
}
