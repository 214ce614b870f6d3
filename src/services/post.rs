//! Post service
//!
//! Business logic for MDX posts:
//! - create/update/delete with slug rules, derived reading time and excerpt
//! - public lookups (drafts 404, archived 410) and the cursor-paginated feed
//! - read-through caching of public reads, invalidated on every write
//! - the sitemap document

use crate::cache::{post_key, CacheLayer, MemoryCache, FEED_PATTERN, POST_PATTERN, SITEMAP_KEY};
use crate::config::SiteConfig;
use crate::db::repositories::{PostRecord, PostRepository};
use crate::models::{
    clamp_feed_limit, CreatePostInput, Cursor, CursorPage, FeedFilter, ListParams, NewAuditLog,
    PagedResult, Permission, Post, PostKind, PostStatus, PostSummary, Principal, UpdatePostInput,
};
use crate::services::audit::AuditService;
use crate::services::mdx;
use crate::services::validation::{generate_slug, is_valid_slug, MAX_SLUG_LEN};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

const MAX_TITLE_CHARS: usize = 300;
const MAX_TAGS: usize = 20;
const MAX_TAG_CHARS: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    /// Archived posts are gone for good
    #[error("Post is no longer available: {0}")]
    Gone(String),

    #[error("Slug already exists: {0}")]
    SlugConflict(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    cache: Arc<MemoryCache>,
    audit: Arc<AuditService>,
    site: SiteConfig,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        cache: Arc<MemoryCache>,
        audit: Arc<AuditService>,
        site: SiteConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            audit,
            site,
        }
    }

    /// Create a post. Publishing requires `posts:publish`.
    pub async fn create(
        &self,
        input: CreatePostInput,
        principal: &Principal,
    ) -> Result<Post, PostServiceError> {
        if input.status != PostStatus::Draft && !principal.can(Permission::PostsPublish) {
            return Err(PostServiceError::Forbidden(
                "Publishing requires posts:publish".to_string(),
            ));
        }

        let title = validate_title(&input.title)?;
        validate_body(&input.body_mdx)?;

        let slug = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => generate_slug(&title),
        };
        validate_slug(&slug)?;
        self.ensure_slug_free(&slug, None).await?;

        let summary = mdx::summarize(&input.body_mdx);
        let published_at = match input.status {
            PostStatus::Draft => input.published_at,
            _ => Some(input.published_at.unwrap_or_else(Utc::now)),
        };

        let record = PostRecord {
            slug,
            kind: input.kind,
            title,
            summary: clean_optional(input.summary),
            body_mdx: input.body_mdx,
            tags: normalize_tags(&input.tags)?,
            status: input.status,
            reading_minutes: summary.reading_minutes,
            excerpt: summary.excerpt,
            author_id: principal.user_id,
            published_at,
        };

        let post = self.repo.create(&record).await.context("Failed to create post")?;
        self.invalidate().await;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "post.create", "post", Some(post.id))
                    .with_details(json!({ "slug": post.slug, "status": post.status })),
            )
            .await;

        tracing::info!(post_id = post.id, slug = %post.slug, "Created post");
        Ok(post)
    }

    /// Apply a partial update. Any status change requires `posts:publish`.
    ///
    /// The first transition to `published` stamps `published_at` unless the
    /// post already carries one.
    pub async fn update(
        &self,
        id: i64,
        input: UpdatePostInput,
        principal: &Principal,
    ) -> Result<Post, PostServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))?;

        let mut record = PostRecord::from(&existing);
        let mut changed = Vec::new();

        if let Some(status) = input.status {
            if status != existing.status {
                if !principal.can(Permission::PostsPublish) {
                    return Err(PostServiceError::Forbidden(
                        "Changing post status requires posts:publish".to_string(),
                    ));
                }
                record.status = status;
                changed.push("status");
            }
        }
        if let Some(title) = input.title {
            record.title = validate_title(&title)?;
            changed.push("title");
        }
        if let Some(slug) = input.slug {
            let slug = slug.trim().to_string();
            validate_slug(&slug)?;
            if slug != existing.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                record.slug = slug;
                changed.push("slug");
            }
        }
        if let Some(kind) = input.kind {
            record.kind = kind;
            changed.push("kind");
        }
        if let Some(summary) = input.summary {
            record.summary = clean_optional(Some(summary));
            changed.push("summary");
        }
        if let Some(tags) = input.tags {
            record.tags = normalize_tags(&tags)?;
            changed.push("tags");
        }
        if let Some(body) = input.body_mdx {
            validate_body(&body)?;
            let summary = mdx::summarize(&body);
            record.reading_minutes = summary.reading_minutes;
            record.excerpt = summary.excerpt;
            record.body_mdx = body;
            changed.push("body_mdx");
        }
        if let Some(published_at) = input.published_at {
            record.published_at = Some(published_at);
            changed.push("published_at");
        }
        if record.status == PostStatus::Published && record.published_at.is_none() {
            record.published_at = Some(Utc::now());
        }

        let post = self
            .repo
            .update(id, &record)
            .await
            .context("Failed to update post")?;
        self.invalidate().await;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "post.update", "post", Some(id)).with_details(
                    json!({ "slug": post.slug, "status": post.status, "fields": changed }),
                ),
            )
            .await;

        Ok(post)
    }

    pub async fn delete(&self, id: i64, principal: &Principal) -> Result<(), PostServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))?;

        self.repo.delete(id).await.context("Failed to delete post")?;
        self.invalidate().await;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "post.delete", "post", Some(id))
                    .with_details(json!({ "slug": existing.slug })),
            )
            .await;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Published post by slug for the public site.
    ///
    /// Drafts are reported as missing and archived posts as gone.
    pub async fn get_by_slug_public(&self, slug: &str) -> Result<Post, PostServiceError> {
        let key = post_key(slug);
        if let Some(post) = self.cache_get::<Post>(&key).await {
            return Ok(post);
        }

        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to load post")?
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        match post.status {
            PostStatus::Draft => Err(PostServiceError::NotFound(slug.to_string())),
            PostStatus::Archived => Err(PostServiceError::Gone(slug.to_string())),
            PostStatus::Published => {
                self.cache_set(&key, &post).await;
                Ok(post)
            }
        }
    }

    /// Public feed, newest first, keyset-paginated
    pub async fn list_public(
        &self,
        filter: &FeedFilter,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<CursorPage<PostSummary>, PostServiceError> {
        let limit = clamp_feed_limit(limit);
        let after = match cursor.filter(|c| !c.is_empty()) {
            Some(raw) => Some(
                Cursor::decode(raw).map_err(|e| PostServiceError::ValidationError(e.to_string()))?,
            ),
            None => None,
        };

        let key = format!(
            "posts:{}:{}:{}:{}",
            filter.kind.map(|k| k.as_str()).unwrap_or("all"),
            filter.tag.as_deref().unwrap_or(""),
            cursor.unwrap_or(""),
            limit
        );
        if let Some(page) = self.cache_get::<CachedPage>(&key).await {
            return Ok(page.into());
        }

        let mut rows = self
            .repo
            .list_feed(filter, after.as_ref(), limit as i64 + 1)
            .await
            .context("Failed to list posts")?;

        let next_cursor = if rows.len() > limit as usize {
            rows.truncate(limit as usize);
            rows.last()
                .and_then(|last| last.published_at.map(|ts| Cursor::new(ts, &last.slug).encode()))
        } else {
            None
        };

        let page = CursorPage {
            items: rows.iter().map(PostSummary::from).collect(),
            next_cursor,
        };
        self.cache_set(&key, &CachedPage::from(&page)).await;
        Ok(page)
    }

    /// Any-status listing for the admin screens
    pub async fn list_admin(
        &self,
        status: Option<PostStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let items = self
            .repo
            .list_admin(status, params)
            .await
            .context("Failed to list posts")?;
        let total = self
            .repo
            .count_admin(status)
            .await
            .context("Failed to count posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// sitemap.org document for the public site
    pub async fn sitemap(&self) -> Result<String, PostServiceError> {
        if let Some(xml) = self.cache_get::<String>(SITEMAP_KEY).await {
            return Ok(xml);
        }

        let posts = self
            .repo
            .list_published()
            .await
            .context("Failed to list published posts")?;
        let xml = render_sitemap(self.site.base(), &posts);
        self.cache_set(SITEMAP_KEY, &xml).await;
        Ok(xml)
    }

    /// Drop every cached public read
    pub async fn invalidate(&self) {
        for pattern in [POST_PATTERN, FEED_PATTERN, SITEMAP_KEY] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache pattern {}: {:#}", pattern, e);
            }
        }
    }

    async fn ensure_slug_free(&self, slug: &str, exclude_id: Option<i64>) -> Result<(), PostServiceError> {
        if self
            .repo
            .slug_exists(slug, exclude_id)
            .await
            .context("Failed to check slug")?
        {
            return Err(PostServiceError::SlugConflict(slug.to_string()));
        }
        Ok(())
    }

    async fn cache_get<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {:#}", key, e);
                None
            }
        }
    }

    async fn cache_set<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value, self.cache.default_ttl()).await {
            tracing::warn!("Cache write failed for {}: {:#}", key, e);
        }
    }
}

/// Serializable mirror of a feed page for the cache
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedPage {
    items: Vec<PostSummary>,
    next_cursor: Option<String>,
}

impl From<&CursorPage<PostSummary>> for CachedPage {
    fn from(page: &CursorPage<PostSummary>) -> Self {
        Self {
            items: page.items.clone(),
            next_cursor: page.next_cursor.clone(),
        }
    }
}

impl From<CachedPage> for CursorPage<PostSummary> {
    fn from(page: CachedPage) -> Self {
        Self {
            items: page.items,
            next_cursor: page.next_cursor,
        }
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(PostServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> Result<(), PostServiceError> {
    if body.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Body cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), PostServiceError> {
    if slug.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Slug cannot be empty and could not be derived from the title".to_string(),
        ));
    }
    if !is_valid_slug(slug) {
        return Err(PostServiceError::ValidationError(format!(
            "Slug must be lowercase words joined by hyphens, at most {} characters",
            MAX_SLUG_LEN
        )));
    }
    Ok(())
}

/// Lowercase, trim and de-duplicate tags, keeping first-seen order
fn normalize_tags(tags: &[String]) -> Result<Vec<String>, PostServiceError> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(PostServiceError::ValidationError(format!(
                "Tag cannot exceed {} characters: {}",
                MAX_TAG_CHARS, tag
            )));
        }
        out.push(tag);
    }
    if out.len() > MAX_TAGS {
        return Err(PostServiceError::ValidationError(format!(
            "A post can have at most {} tags",
            MAX_TAGS
        )));
    }
    Ok(out)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Render the sitemap for `base` and the given published posts
pub fn render_sitemap(base: &str, posts: &[Post]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    push_url(&mut xml, &format!("{}/", base), None);
    for kind in PostKind::ALL {
        push_url(&mut xml, &format!("{}/{}", base, kind.path_segment()), None);
    }
    for post in posts {
        push_url(
            &mut xml,
            &format!("{}{}", base, post.public_path()),
            Some(post.updated_at),
        );
    }

    xml.push_str("</urlset>\n");
    xml
}

fn push_url(xml: &mut String, loc: &str, lastmod: Option<DateTime<Utc>>) {
    xml.push_str("  <url>\n    <loc>");
    xml.push_str(&xml_escape(loc));
    xml.push_str("</loc>\n");
    if let Some(ts) = lastmod {
        xml.push_str("    <lastmod>");
        xml.push_str(&ts.format("%Y-%m-%d").to_string());
        xml.push_str("</lastmod>\n");
    }
    xml.push_str("  </url>\n");
}

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::{SqlxAuditLogRepository, SqlxPostRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CredentialKind, Role};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(15))]

        /// Walking the feed page by page yields every published post exactly
        /// once, in `(published_at DESC, slug ASC)` order.
        #[test]
        fn cursor_pagination_is_complete_and_ordered(
            offsets in prop::collection::vec(0i64..4, 1..15),
            page_size in 1u32..6,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let pool = create_test_pool().await.unwrap();
                migrations::run_migrations(&pool).await.unwrap();
                let audit = Arc::new(AuditService::new(SqlxAuditLogRepository::boxed(pool.clone())));
                let service = PostService::new(
                    SqlxPostRepository::boxed(pool),
                    Arc::new(MemoryCache::new()),
                    audit,
                    SiteConfig::default(),
                );
                let editor = Principal {
                    user_id: None,
                    name: "prop".to_string(),
                    role: Role::Editor,
                    via: CredentialKind::ApiToken,
                };
                let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

                let mut expected = Vec::new();
                for (i, offset) in offsets.iter().enumerate() {
                    let at = base + Duration::minutes(*offset);
                    let input = CreatePostInput {
                        title: format!("p{}", i),
                        body_mdx: "x".to_string(),
                        status: PostStatus::Published,
                        published_at: Some(at),
                        ..Default::default()
                    };
                    let post = service.create(input, &editor).await.unwrap();
                    expected.push((at, post.slug));
                }
                expected.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

                let mut seen = Vec::new();
                let mut cursor: Option<String> = None;
                loop {
                    let page = service
                        .list_public(&FeedFilter::default(), cursor.as_deref(), Some(page_size))
                        .await
                        .unwrap();
                    assert!(page.items.len() <= page_size as usize);
                    seen.extend(page.items.into_iter().map(|p| p.slug));
                    match page.next_cursor {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }

                let expected: Vec<String> = expected.into_iter().map(|(_, slug)| slug).collect();
                assert_eq!(seen, expected);
            });
        }
    }
}
