//! Post repository
//!
//! `published_at` is stored as unix microseconds so the feed's keyset
//! comparisons are exact integer comparisons.

use crate::db::DynDatabasePool;
use crate::models::{Cursor, FeedFilter, ListParams, Post, PostKind, PostStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Full set of writable post columns; derived fields are computed by the caller
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub slug: String,
    pub kind: PostKind,
    pub title: String,
    pub summary: Option<String>,
    pub body_mdx: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub reading_minutes: i64,
    pub excerpt: String,
    pub author_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Post> for PostRecord {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.clone(),
            kind: post.kind,
            title: post.title.clone(),
            summary: post.summary.clone(),
            body_mdx: post.body_mdx.clone(),
            tags: post.tags.clone(),
            status: post.status,
            reading_minutes: post.reading_minutes,
            excerpt: post.excerpt.clone(),
            author_id: post.author_id,
            published_at: post.published_at,
        }
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, record: &PostRecord) -> Result<Post>;

    /// Replace every writable column of an existing post
    async fn update(&self, id: i64, record: &PostRecord) -> Result<Post>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Published posts in feed order, strictly after `after` when given
    async fn list_feed(
        &self,
        filter: &FeedFilter,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>>;

    /// Any-status listing for the admin screens, newest first
    async fn list_admin(&self, status: Option<PostStatus>, params: &ListParams) -> Result<Vec<Post>>;

    async fn count_admin(&self, status: Option<PostStatus>) -> Result<i64>;

    /// Every published post in feed order
    async fn list_published(&self) -> Result<Vec<Post>>;

    /// Check whether a slug is taken, optionally ignoring one post
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, record: &PostRecord) -> Result<Post> {
        create_post(self.pool.sqlite(), record).await
    }

    async fn update(&self, id: i64, record: &PostRecord) -> Result<Post> {
        update_post(self.pool.sqlite(), id, record).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete post")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        get_post_by_id(self.pool.sqlite(), id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by slug")?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn list_feed(
        &self,
        filter: &FeedFilter,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        list_feed_sqlite(self.pool.sqlite(), filter, after, limit).await
    }

    async fn list_admin(&self, status: Option<PostStatus>, params: &ListParams) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY updated_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list posts")?;
        rows.iter().map(row_to_post).collect()
    }

    async fn count_admin(&self, status: Option<PostStatus>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE (?1 IS NULL OR status = ?1)")
            .bind(status.map(|s| s.as_str()))
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count posts")?;
        Ok(count)
    }

    async fn list_published(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE status = 'published' AND published_at IS NOT NULL
            ORDER BY published_at DESC, slug ASC
            "#,
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list published posts")?;
        rows.iter().map(row_to_post).collect()
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE slug = ?1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to check post slug")?;
        Ok(count > 0)
    }
}

async fn create_post(pool: &SqlitePool, record: &PostRecord) -> Result<Post> {
    let now = Utc::now();
    let tags = serde_json::to_string(&record.tags).context("Failed to encode tags")?;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (slug, kind, title, summary, body_mdx, tags, status,
                           reading_minutes, excerpt, author_id, published_at,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.slug)
    .bind(record.kind.as_str())
    .bind(&record.title)
    .bind(&record.summary)
    .bind(&record.body_mdx)
    .bind(&tags)
    .bind(record.status.as_str())
    .bind(record.reading_minutes)
    .bind(&record.excerpt)
    .bind(record.author_id)
    .bind(record.published_at.map(|t| t.timestamp_micros()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    get_post_by_id(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow!("Post vanished after insert"))
}

async fn update_post(pool: &SqlitePool, id: i64, record: &PostRecord) -> Result<Post> {
    let tags = serde_json::to_string(&record.tags).context("Failed to encode tags")?;

    let result = sqlx::query(
        r#"
        UPDATE posts
        SET slug = ?, kind = ?, title = ?, summary = ?, body_mdx = ?, tags = ?,
            status = ?, reading_minutes = ?, excerpt = ?, author_id = ?,
            published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.slug)
    .bind(record.kind.as_str())
    .bind(&record.title)
    .bind(&record.summary)
    .bind(&record.body_mdx)
    .bind(&tags)
    .bind(record.status.as_str())
    .bind(record.reading_minutes)
    .bind(&record.excerpt)
    .bind(record.author_id)
    .bind(record.published_at.map(|t| t.timestamp_micros()))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("Post not found: {}", id));
    }

    get_post_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow!("Post not found: {}", id))
}

async fn get_post_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;
    row.as_ref().map(row_to_post).transpose()
}

async fn list_feed_sqlite(
    pool: &SqlitePool,
    filter: &FeedFilter,
    after: Option<&Cursor>,
    limit: i64,
) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM posts
        WHERE status = 'published'
          AND published_at IS NOT NULL
          AND (?1 IS NULL OR kind = ?1)
          AND (?2 IS NULL OR EXISTS (SELECT 1 FROM json_each(posts.tags) WHERE json_each.value = ?2))
          AND (?3 IS NULL OR published_at < ?3 OR (published_at = ?3 AND slug > ?4))
        ORDER BY published_at DESC, slug ASC
        LIMIT ?5
        "#,
    )
    .bind(filter.kind.map(|k| k.as_str()))
    .bind(filter.tag.as_deref())
    .bind(after.map(|c| c.published_micros))
    .bind(after.map(|c| c.slug.as_str()))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list post feed")?;

    rows.iter().map(row_to_post).collect()
}

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let kind_str: String = row.get("kind");
    let kind = PostKind::from_str(&kind_str).map_err(anyhow::Error::msg)?;
    let status_str: String = row.get("status");
    let status = PostStatus::from_str(&status_str).map_err(anyhow::Error::msg)?;

    let tags_json: String = row.get("tags");
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .with_context(|| format!("Invalid tags in database: {}", tags_json))?;

    let published_micros: Option<i64> = row.get("published_at");
    let published_at = match published_micros {
        Some(micros) => Some(
            DateTime::<Utc>::from_timestamp_micros(micros)
                .ok_or_else(|| anyhow!("Invalid published_at in database: {}", micros))?,
        ),
        None => None,
    };

    Ok(Post {
        id: row.get("id"),
        slug: row.get("slug"),
        kind,
        title: row.get("title"),
        summary: row.get("summary"),
        body_mdx: row.get("body_mdx"),
        tags,
        status,
        reading_minutes: row.get("reading_minutes"),
        excerpt: row.get("excerpt"),
        author_id: row.get("author_id"),
        published_at,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, TimeZone};

    async fn setup() -> SqlxPostRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxPostRepository::new(pool)
    }

    fn record(slug: &str, status: PostStatus, published_at: Option<DateTime<Utc>>) -> PostRecord {
        PostRecord {
            slug: slug.to_string(),
            kind: PostKind::Blog,
            title: format!("Title {}", slug),
            summary: None,
            body_mdx: "Hello".to_string(),
            tags: vec!["rust".to_string()],
            status,
            reading_minutes: 1,
            excerpt: "Hello".to_string(),
            author_id: None,
            published_at,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let ts = base_time() + Duration::microseconds(123);
        let post = repo
            .create(&record("first", PostStatus::Published, Some(ts)))
            .await
            .unwrap();

        let found = repo.get_by_slug("first").await.unwrap().unwrap();
        assert_eq!(found.id, post.id);
        assert_eq!(found.tags, vec!["rust".to_string()]);
        assert_eq!(found.published_at, Some(ts));
    }

    #[tokio::test]
    async fn test_update_replaces_columns() {
        let repo = setup().await;
        let post = repo.create(&record("draft", PostStatus::Draft, None)).await.unwrap();

        let mut changed = PostRecord::from(&post);
        changed.title = "Renamed".to_string();
        changed.slug = "renamed".to_string();
        let updated = repo.update(post.id, &changed).await.unwrap();

        assert_eq!(updated.title, "Renamed");
        assert!(repo.get_by_slug("draft").await.unwrap().is_none());
        assert!(repo.update(999, &changed).await.is_err());
    }

    #[tokio::test]
    async fn test_feed_orders_with_slug_tie_break() {
        let repo = setup().await;
        let ts = base_time();
        repo.create(&record("b", PostStatus::Published, Some(ts))).await.unwrap();
        repo.create(&record("a", PostStatus::Published, Some(ts))).await.unwrap();
        repo.create(&record("newer", PostStatus::Published, Some(ts + Duration::hours(1))))
            .await
            .unwrap();
        repo.create(&record("hidden", PostStatus::Draft, None)).await.unwrap();

        let page = repo.list_feed(&FeedFilter::default(), None, 10).await.unwrap();
        let slugs: Vec<_> = page.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "a", "b"]);

        let cursor = Cursor::new(ts, "a");
        let rest = repo
            .list_feed(&FeedFilter::default(), Some(&cursor), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].slug, "b");
    }

    #[tokio::test]
    async fn test_feed_filters_kind_and_tag() {
        let repo = setup().await;
        let mut essay = record("essay", PostStatus::Published, Some(base_time()));
        essay.kind = PostKind::Essay;
        essay.tags = vec!["writing".to_string()];
        repo.create(&essay).await.unwrap();
        repo.create(&record("blog", PostStatus::Published, Some(base_time())))
            .await
            .unwrap();

        let essays = repo
            .list_feed(
                &FeedFilter {
                    kind: Some(PostKind::Essay),
                    tag: None,
                },
                None,
                10,
            )
            .await
            .unwrap();
        assert_eq!(essays.len(), 1);

        let tagged = repo
            .list_feed(
                &FeedFilter {
                    kind: None,
                    tag: Some("rust".to_string()),
                },
                None,
                10,
            )
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].slug, "blog");
    }

    #[tokio::test]
    async fn test_admin_listing_and_slug_checks() {
        let repo = setup().await;
        let post = repo.create(&record("one", PostStatus::Draft, None)).await.unwrap();
        repo.create(&record("two", PostStatus::Published, Some(base_time())))
            .await
            .unwrap();

        assert_eq!(repo.count_admin(None).await.unwrap(), 2);
        assert_eq!(repo.count_admin(Some(PostStatus::Draft)).await.unwrap(), 1);
        let drafts = repo
            .list_admin(Some(PostStatus::Draft), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(drafts[0].slug, "one");

        assert!(repo.slug_exists("one", None).await.unwrap());
        assert!(!repo.slug_exists("one", Some(post.id)).await.unwrap());
        assert!(repo.delete(post.id).await.unwrap());
        assert!(!repo.delete(post.id).await.unwrap());
    }
}
