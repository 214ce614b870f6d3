//! Comment repository
//!
//! - `CommentRepository` trait defining the interface for comment data access
//! - `SqlxCommentRepository` implementing it on SQLite

use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentStatus, ListParams, ModerationItem, NewComment};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &NewComment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of one post in one status, oldest first
    async fn list_by_post(&self, post_id: i64, status: CommentStatus) -> Result<Vec<Comment>>;

    /// Moderation queue, newest first, joined with the post it belongs to
    async fn list_for_moderation(
        &self,
        status: Option<CommentStatus>,
        params: &ListParams,
    ) -> Result<Vec<ModerationItem>>;

    async fn count_for_moderation(&self, status: Option<CommentStatus>) -> Result<i64>;

    /// Set a new status and record who moderated it
    async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
        moderated_by: &str,
        moderated_at: DateTime<Utc>,
    ) -> Result<Comment>;

    /// Delete a comment and its replies. Returns false when it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment> {
        create_comment(self.pool.sqlite(), comment).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        get_comment_by_id(self.pool.sqlite(), id).await
    }

    async fn list_by_post(&self, post_id: i64, status: CommentStatus) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM comments
            WHERE post_id = ? AND status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(post_id)
        .bind(status.as_str())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list comments by post")?;
        rows.iter().map(row_to_comment).collect()
    }

    async fn list_for_moderation(
        &self,
        status: Option<CommentStatus>,
        params: &ListParams,
    ) -> Result<Vec<ModerationItem>> {
        let rows = sqlx::query(
            r#"
            SELECT c.*, p.slug AS post_slug, p.title AS post_title
            FROM comments c
            INNER JOIN posts p ON p.id = c.post_id
            WHERE (?1 IS NULL OR c.status = ?1)
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list comments for moderation")?;

        rows.iter()
            .map(|row| {
                Ok(ModerationItem {
                    comment: row_to_comment(row)?,
                    post_slug: row.get("post_slug"),
                    post_title: row.get("post_title"),
                })
            })
            .collect()
    }

    async fn count_for_moderation(&self, status: Option<CommentStatus>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE (?1 IS NULL OR status = ?1)")
                .bind(status.map(|s| s.as_str()))
                .fetch_one(self.pool.sqlite())
                .await
                .context("Failed to count comments")?;
        Ok(count)
    }

    async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
        moderated_by: &str,
        moderated_at: DateTime<Utc>,
    ) -> Result<Comment> {
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET status = ?, moderated_by = ?, moderated_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(moderated_by)
        .bind(moderated_at)
        .bind(moderated_at)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update comment status")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Comment not found: {}", id));
        }

        get_comment_by_id(self.pool.sqlite(), id)
            .await?
            .ok_or_else(|| anyhow!("Comment not found: {}", id))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete comment")?;
        Ok(result.rows_affected() > 0)
    }
}

async fn create_comment(pool: &SqlitePool, comment: &NewComment) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, parent_id, author_name, author_email, body, status,
                              ip_hash, user_agent, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.post_id)
    .bind(comment.parent_id)
    .bind(&comment.author_name)
    .bind(&comment.author_email)
    .bind(&comment.body)
    .bind(comment.status.as_str())
    .bind(&comment.ip_hash)
    .bind(&comment.user_agent)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: comment.post_id,
        parent_id: comment.parent_id,
        author_name: comment.author_name.clone(),
        author_email: comment.author_email.clone(),
        body: comment.body.clone(),
        status: comment.status,
        ip_hash: comment.ip_hash.clone(),
        user_agent: comment.user_agent.clone(),
        moderated_by: None,
        moderated_at: None,
        created_at: now,
        updated_at: now,
    })
}

async fn get_comment_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;
    row.as_ref().map(row_to_comment).transpose()
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    let status_str: String = row.get("status");
    let status = CommentStatus::from_str(&status_str).map_err(anyhow::Error::msg)?;

    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        parent_id: row.get("parent_id"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        body: row.get("body"),
        status,
        ip_hash: row.get("ip_hash"),
        user_agent: row.get("user_agent"),
        moderated_by: row.get("moderated_by"),
        moderated_at: row.get("moderated_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
