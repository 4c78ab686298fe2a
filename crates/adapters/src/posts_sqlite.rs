//! SQLite post repository implementation

use async_trait::async_trait;
use postsaga_domain::{Post, PostRepoError, PostRepository, PostStatus, RankedPost};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

/// SQLite-backed relational store for posts and upvotes
pub struct SqlitePostRepository {
    pool: SqlitePool,
}

type PostRow = (String, String, String, String, String);

impl SqlitePostRepository {
    /// Open (or create) the database file and ensure the schema exists
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, PostRepoError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PostRepoError::Unavailable(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| PostRepoError::Unavailable(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| PostRepoError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, PostRepoError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| PostRepoError::Unavailable(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| PostRepoError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), PostRepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                post_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                file_name TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'deleted'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS post_upvotes (
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES posts(post_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_status
            ON posts(status)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> PostRepoError {
    PostRepoError::Unavailable(e.to_string())
}

fn post_from_row(row: PostRow) -> Result<Post, PostRepoError> {
    let (post_id, user_id, title, file_name, status) = row;
    let status = PostStatus::from_str(&status).map_err(|message| PostRepoError::Corrupt {
        post_id: post_id.clone(),
        message,
    })?;

    Ok(Post {
        post_id,
        user_id,
        title,
        file_name,
        status,
    })
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn insert(
        &self,
        post_id: &str,
        user_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (post_id, user_id, title, file_name, status)
            VALUES (?, ?, ?, ?, 'active')
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(title)
        .bind(file_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(PostRepoError::AlreadyExists(post_id.to_string()))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn get_active(&self, post_id: &str) -> Result<Post, PostRepoError> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            SELECT post_id, user_id, title, file_name, status
            FROM posts
            WHERE post_id = ? AND status = 'active'
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(row) => post_from_row(row),
            None => Err(PostRepoError::NotFound(post_id.to_string())),
        }
    }

    async fn list_active_with_upvote_counts(&self) -> Result<Vec<RankedPost>, PostRepoError> {
        let rows: Vec<(String, String, String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT p.post_id, p.user_id, p.title, p.file_name, p.status,
                   COUNT(u.user_id) AS upvote_count
            FROM posts p
            LEFT JOIN post_upvotes u ON p.post_id = u.post_id
            WHERE p.status = 'active'
            GROUP BY p.post_id, p.user_id, p.title, p.file_name, p.status
            ORDER BY upvote_count DESC, p.post_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|(post_id, user_id, title, file_name, status, upvotes)| {
                Ok(RankedPost {
                    post: post_from_row((post_id, user_id, title, file_name, status))?,
                    upvotes,
                })
            })
            .collect()
    }

    async fn update(
        &self,
        post_id: &str,
        title: &str,
        file_name: &str,
    ) -> Result<(), PostRepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = ?, file_name = ?
            WHERE post_id = ? AND status = 'active'
            "#,
        )
        .bind(title)
        .bind(file_name)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(PostRepoError::NotFound(post_id.to_string()));
        }
        Ok(())
    }

    async fn soft_delete(&self, post_id: &str) -> Result<(), PostRepoError> {
        // Matches deleted rows too, so a repeated delete still counts as success
        let result = sqlx::query("UPDATE posts SET status = 'deleted' WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(PostRepoError::NotFound(post_id.to_string()));
        }
        Ok(())
    }

    async fn upvote(&self, post_id: &str, user_id: &str) -> Result<bool, PostRepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO post_upvotes (post_id, user_id)
            VALUES (?, ?)
            ON CONFLICT(post_id, user_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(PostRepoError::NotFound(post_id.to_string()))
            }
            Err(e) => Err(unavailable(e)),
        }
    }
}
