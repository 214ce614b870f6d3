//! Media asset repository

use crate::db::DynDatabasePool;
use crate::models::{MediaAsset, MediaAssetInput};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn create(&self, input: &MediaAssetInput) -> Result<MediaAsset>;

    async fn update(&self, id: i64, input: &MediaAssetInput) -> Result<Option<MediaAsset>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>>;

    async fn list(&self) -> Result<Vec<MediaAsset>>;
}

pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, input: &MediaAssetInput) -> Result<MediaAsset> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO media_assets (url, alt_text, mime_type, width, height, bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.url)
        .bind(&input.alt_text)
        .bind(&input.mime_type)
        .bind(input.width)
        .bind(input.height)
        .bind(input.bytes)
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create media asset")?;

        get_asset(self.pool.sqlite(), result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow!("Media asset vanished after insert"))
    }

    async fn update(&self, id: i64, input: &MediaAssetInput) -> Result<Option<MediaAsset>> {
        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET url = ?, alt_text = ?, mime_type = ?, width = ?, height = ?, bytes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.url)
        .bind(&input.alt_text)
        .bind(&input.mime_type)
        .bind(input.width)
        .bind(input.height)
        .bind(input.bytes)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update media asset")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        get_asset(self.pool.sqlite(), id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_assets WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete media asset")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>> {
        get_asset(self.pool.sqlite(), id).await
    }

    async fn list(&self) -> Result<Vec<MediaAsset>> {
        let rows = sqlx::query("SELECT * FROM media_assets ORDER BY created_at DESC, id DESC")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list media assets")?;
        Ok(rows.iter().map(row_to_asset).collect())
    }
}

async fn get_asset(pool: &SqlitePool, id: i64) -> Result<Option<MediaAsset>> {
    let row = sqlx::query("SELECT * FROM media_assets WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get media asset")?;
    Ok(row.as_ref().map(row_to_asset))
}

fn row_to_asset(row: &sqlx::sqlite::SqliteRow) -> MediaAsset {
    MediaAsset {
        id: row.get("id"),
        url: row.get("url"),
        alt_text: row.get("alt_text"),
        mime_type: row.get("mime_type"),
        width: row.get("width"),
        height: row.get("height"),
        bytes: row.get("bytes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_crud() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxMediaRepository::new(pool);

        let input = MediaAssetInput {
            url: "/media/cover.png".to_string(),
            alt_text: "Cover".to_string(),
            mime_type: "image/png".to_string(),
            width: Some(1200),
            height: Some(630),
            bytes: None,
        };
        let asset = repo.create(&input).await.unwrap();
        assert_eq!(asset.width, Some(1200));

        let mut changed = input.clone();
        changed.alt_text = "Updated cover".to_string();
        let updated = repo.update(asset.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.alt_text, "Updated cover");

        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert!(repo.delete(asset.id).await.unwrap());
        assert!(repo.update(asset.id, &changed).await.unwrap().is_none());
    }
}
