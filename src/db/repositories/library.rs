//! Library item repository

use crate::db::DynDatabasePool;
use crate::models::{LibraryItem, LibraryItemInput, LibraryKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn create(&self, input: &LibraryItemInput) -> Result<LibraryItem>;

    async fn update(&self, id: i64, input: &LibraryItemInput) -> Result<Option<LibraryItem>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<LibraryItem>>;

    /// Newest first, optionally restricted to one kind
    async fn list(&self, kind: Option<LibraryKind>) -> Result<Vec<LibraryItem>>;
}

pub struct SqlxLibraryRepository {
    pool: DynDatabasePool,
}

impl SqlxLibraryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LibraryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LibraryRepository for SqlxLibraryRepository {
    async fn create(&self, input: &LibraryItemInput) -> Result<LibraryItem> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO library_items (title, creator, url, kind, notes, rating, finished_on, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.title)
        .bind(&input.creator)
        .bind(&input.url)
        .bind(input.kind.as_str())
        .bind(&input.notes)
        .bind(input.rating)
        .bind(input.finished_on)
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create library item")?;

        get_item(self.pool.sqlite(), result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow!("Library item vanished after insert"))
    }

    async fn update(&self, id: i64, input: &LibraryItemInput) -> Result<Option<LibraryItem>> {
        let result = sqlx::query(
            r#"
            UPDATE library_items
            SET title = ?, creator = ?, url = ?, kind = ?, notes = ?, rating = ?,
                finished_on = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(&input.creator)
        .bind(&input.url)
        .bind(input.kind.as_str())
        .bind(&input.notes)
        .bind(input.rating)
        .bind(input.finished_on)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update library item")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        get_item(self.pool.sqlite(), id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM library_items WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete library item")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LibraryItem>> {
        get_item(self.pool.sqlite(), id).await
    }

    async fn list(&self, kind: Option<LibraryKind>) -> Result<Vec<LibraryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM library_items
            WHERE (?1 IS NULL OR kind = ?1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list library items")?;
        rows.iter().map(row_to_item).collect()
    }
}

async fn get_item(pool: &SqlitePool, id: i64) -> Result<Option<LibraryItem>> {
    let row = sqlx::query("SELECT * FROM library_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get library item")?;
    row.as_ref().map(row_to_item).transpose()
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<LibraryItem> {
    let kind_str: String = row.get("kind");
    Ok(LibraryItem {
        id: row.get("id"),
        title: row.get("title"),
        creator: row.get("creator"),
        url: row.get("url"),
        kind: LibraryKind::from_str(&kind_str).map_err(anyhow::Error::msg)?,
        notes: row.get("notes"),
        rating: row.get("rating"),
        finished_on: row.get("finished_on"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
