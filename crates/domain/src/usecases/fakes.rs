//! In-crate test doubles for the three store ports

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

use crate::{
    model::{Action, Post, PostStatus, RankedPost, Window},
    policy::CallPolicy,
    ports::{
        BlobError, BlobStore, MetricsError, MetricsStore, PostRepoError, PostRepository,
    },
    usecases::lifecycle::{LifecycleConfig, PostLifecycle},
};

/// Shared, ordered record of every store call
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

/// Per-operation failure injection
#[derive(Default)]
pub(crate) struct Faults {
    failing: Mutex<HashSet<&'static str>>,
    hanging: Mutex<HashSet<&'static str>>,
}

impl Faults {
    pub(crate) fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub(crate) fn hang(&self, operation: &'static str) {
        self.hanging.lock().unwrap().insert(operation);
    }

    pub(crate) fn heal(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
        self.hanging.lock().unwrap().remove(operation);
    }

    async fn check(&self, operation: &'static str) -> Result<(), String> {
        let hang = self.hanging.lock().unwrap().contains(operation);
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.lock().unwrap().contains(operation) {
            return Err(format!("{} failed", operation));
        }
        Ok(())
    }
}

pub(crate) struct FakeRepo {
    pub(crate) rows: Mutex<HashMap<String, Post>>,
    pub(crate) upvotes: Mutex<BTreeSet<(String, String)>>,
    pub(crate) faults: Faults,
    log: CallLog,
}

impl FakeRepo {
    pub(crate) fn status(&self, post_id: &str) -> Option<PostStatus> {
        self.rows.lock().unwrap().get(post_id).map(|p| p.status)
    }

    fn note(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl PostRepository for FakeRepo {
    async fn insert(
        &self,
        post_id: &str,
        user_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError> {
        self.note(format!("repo.insert {}", post_id));
        self.faults
            .check("insert")
            .await
            .map_err(PostRepoError::Unavailable)?;

        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(post_id) {
            return Err(PostRepoError::AlreadyExists(post_id.to_string()));
        }
        rows.insert(
            post_id.to_string(),
            Post {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                title: title.to_string(),
                file_name: file_name.to_string(),
                status: PostStatus::Active,
            },
        );
        Ok(())
    }

    async fn get_active(&self, post_id: &str) -> Result<Post, PostRepoError> {
        self.note(format!("repo.get_active {}", post_id));
        self.faults
            .check("get_active")
            .await
            .map_err(PostRepoError::Unavailable)?;

        self.rows
            .lock()
            .unwrap()
            .get(post_id)
            .filter(|p| p.status == PostStatus::Active)
            .cloned()
            .ok_or_else(|| PostRepoError::NotFound(post_id.to_string()))
    }

    async fn list_active_with_upvote_counts(&self) -> Result<Vec<RankedPost>, PostRepoError> {
        self.note("repo.list".to_string());
        self.faults
            .check("list")
            .await
            .map_err(PostRepoError::Unavailable)?;

        let rows = self.rows.lock().unwrap();
        let upvotes = self.upvotes.lock().unwrap();
        let mut ranked: Vec<RankedPost> = rows
            .values()
            .filter(|p| p.status == PostStatus::Active)
            .map(|p| RankedPost {
                post: p.clone(),
                upvotes: upvotes.iter().filter(|(id, _)| *id == p.post_id).count() as i64,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.upvotes
                .cmp(&a.upvotes)
                .then_with(|| a.post.post_id.cmp(&b.post.post_id))
        });
        Ok(ranked)
    }

    async fn update(
        &self,
        post_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError> {
        self.note(format!("repo.update {}", post_id));
        self.faults
            .check("update")
            .await
            .map_err(PostRepoError::Unavailable)?;

        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(post_id) {
            Some(post) if post.status == PostStatus::Active => {
                post.title = title.to_string();
                post.file_name = file_name.to_string();
                Ok(())
            }
            _ => Err(PostRepoError::NotFound(post_id.to_string())),
        }
    }

    async fn soft_delete(&self, post_id: &str) -> Result<(), PostRepoError> {
        self.note(format!("repo.soft_delete {}", post_id));
        self.faults
            .check("soft_delete")
            .await
            .map_err(PostRepoError::Unavailable)?;

        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(post_id) {
            Some(post) => {
                post.status = PostStatus::Deleted;
                Ok(())
            }
            None => Err(PostRepoError::NotFound(post_id.to_string())),
        }
    }

    async fn upvote(&self, post_id: &str, user_id: &str) -> Result<bool, PostRepoError> {
        self.note(format!("repo.upvote {}", post_id));
        self.faults
            .check("upvote")
            .await
            .map_err(PostRepoError::Unavailable)?;

        if !self.rows.lock().unwrap().contains_key(post_id) {
            return Err(PostRepoError::NotFound(post_id.to_string()));
        }
        Ok(self
            .upvotes
            .lock()
            .unwrap()
            .insert((post_id.to_string(), user_id.to_string())))
    }
}

pub(crate) struct FakeBlobs {
    pub(crate) objects: Mutex<HashMap<String, Bytes>>,
    pub(crate) faults: Faults,
    log: CallLog,
}

impl FakeBlobs {
    pub(crate) fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for FakeBlobs {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        self.log.lock().unwrap().push(format!("blob.put {}", key));
        self.faults
            .check("put")
            .await
            .map_err(BlobError::Unavailable)?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        self.log.lock().unwrap().push(format!("blob.get {}", key));
        self.faults
            .check("get")
            .await
            .map_err(BlobError::Unavailable)?;
        self.object(key)
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.log.lock().unwrap().push(format!("blob.delete {}", key));
        self.faults
            .check("delete")
            .await
            .map_err(BlobError::Unavailable)?;
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

pub(crate) struct FakeMetrics {
    pub(crate) events: Mutex<Vec<(String, String, Action)>>,
    pub(crate) faults: Faults,
    pub(crate) last_seen: OffsetDateTime,
    log: CallLog,
}

impl FakeMetrics {
    pub(crate) fn actions_for(&self, post_id: &str) -> Vec<Action> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == post_id)
            .map(|(_, _, action)| *action)
            .collect()
    }
}

#[async_trait]
impl MetricsStore for FakeMetrics {
    async fn record_action(
        &self,
        post_id: &str,
        user_id: &str,
        action: Action,
    ) -> Result<(), MetricsError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("metrics.record {} {}", action, post_id));
        self.faults
            .check("record")
            .await
            .map_err(MetricsError::Unavailable)?;
        self.events
            .lock()
            .unwrap()
            .push((post_id.to_string(), user_id.to_string(), action));
        Ok(())
    }

    async fn top_n_by_upvotes(
        &self,
        _window: &Window,
        n: usize,
    ) -> Result<Vec<(String, i64)>, MetricsError> {
        self.faults
            .check("top")
            .await
            .map_err(MetricsError::Unavailable)?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for (post_id, _, action) in self.events.lock().unwrap().iter() {
            if *action == Action::Upvote {
                *counts.entry(post_id.clone()).or_default() += 1;
            }
        }
        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        Ok(ranked)
    }

    async fn recent_post_ids(&self, _window: &Window) -> Result<BTreeSet<String>, MetricsError> {
        self.log.lock().unwrap().push("metrics.recent".to_string());
        self.faults
            .check("recent")
            .await
            .map_err(MetricsError::Unavailable)?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|(post_id, _, _)| post_id.clone())
            .collect())
    }

    async fn most_recent_activity(
        &self,
        post_id: &str,
        _window: &Window,
    ) -> Result<Option<OffsetDateTime>, MetricsError> {
        self.faults
            .check("most_recent")
            .await
            .map_err(MetricsError::Unavailable)?;
        let seen = self
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|(id, _, _)| id == post_id);
        Ok(seen.then_some(self.last_seen))
    }
}

/// Orchestrator wired to fakes that share one call log
pub(crate) struct Harness {
    pub(crate) repo: Arc<FakeRepo>,
    pub(crate) blobs: Arc<FakeBlobs>,
    pub(crate) metrics: Arc<FakeMetrics>,
    pub(crate) log: CallLog,
    pub(crate) lifecycle: PostLifecycle<FakeRepo, FakeBlobs, FakeMetrics>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let repo = Arc::new(FakeRepo {
            rows: Mutex::new(HashMap::new()),
            upvotes: Mutex::new(BTreeSet::new()),
            faults: Faults::default(),
            log: Arc::clone(&log),
        });
        let blobs = Arc::new(FakeBlobs {
            objects: Mutex::new(HashMap::new()),
            faults: Faults::default(),
            log: Arc::clone(&log),
        });
        let metrics = Arc::new(FakeMetrics {
            events: Mutex::new(Vec::new()),
            faults: Faults::default(),
            last_seen: OffsetDateTime::UNIX_EPOCH + time::Duration::days(20_000),
            log: Arc::clone(&log),
        });

        let config = LifecycleConfig {
            policy: CallPolicy {
                call_timeout: Duration::from_secs(1),
                read_retries: 1,
                retry_backoff: Duration::from_millis(10),
            },
            fetch_attachments: true,
        };

        let lifecycle = PostLifecycle::new(
            Arc::clone(&repo),
            Arc::clone(&blobs),
            Arc::clone(&metrics),
            config,
        );

        Self {
            repo,
            blobs,
            metrics,
            log,
            lifecycle,
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.log.lock().unwrap().clear();
    }
}
