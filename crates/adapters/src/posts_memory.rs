//! In-memory post repository for testing and offline mode

use async_trait::async_trait;
use postsaga_domain::{Post, PostRepoError, PostRepository, PostStatus, RankedPost};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// In-memory relational store implementation
pub struct InMemoryPostRepository {
    posts: RwLock<HashMap<String, Post>>,
    upvotes: RwLock<BTreeSet<(String, String)>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            upvotes: RwLock::new(BTreeSet::new()),
        }
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> PostRepoError {
    PostRepoError::Unavailable(e.to_string())
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert(
        &self,
        post_id: &str,
        user_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        if posts.contains_key(post_id) {
            return Err(PostRepoError::AlreadyExists(post_id.to_string()));
        }
        posts.insert(
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
        let posts = self.posts.read().map_err(poisoned)?;
        posts
            .get(post_id)
            .filter(|p| p.status == PostStatus::Active)
            .cloned()
            .ok_or_else(|| PostRepoError::NotFound(post_id.to_string()))
    }

    async fn list_active_with_upvote_counts(&self) -> Result<Vec<RankedPost>, PostRepoError> {
        let posts = self.posts.read().map_err(poisoned)?;
        let upvotes = self.upvotes.read().map_err(poisoned)?;

        let mut ranked: Vec<RankedPost> = posts
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
        let mut posts = self.posts.write().map_err(poisoned)?;
        match posts.get_mut(post_id) {
            Some(post) if post.status == PostStatus::Active => {
                post.title = title.to_string();
                post.file_name = file_name.to_string();
                Ok(())
            }
            _ => Err(PostRepoError::NotFound(post_id.to_string())),
        }
    }

    async fn soft_delete(&self, post_id: &str) -> Result<(), PostRepoError> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        let post = posts
            .get_mut(post_id)
            .ok_or_else(|| PostRepoError::NotFound(post_id.to_string()))?;
        post.status = PostStatus::Deleted;
        Ok(())
    }

    async fn upvote(&self, post_id: &str, user_id: &str) -> Result<bool, PostRepoError> {
        if !self.posts.read().map_err(poisoned)?.contains_key(post_id) {
            return Err(PostRepoError::NotFound(post_id.to_string()));
        }
        let mut upvotes = self.upvotes.write().map_err(poisoned)?;
        Ok(upvotes.insert((post_id.to_string(), user_id.to_string())))
    }
}
