//! Comment service
//!
//! Public submission with validation, per-IP rate limiting and a honeypot,
//! threaded listing of approved comments, and the moderation workflow.

use crate::config::CommentConfig;
use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{
    Comment, CommentStatus, CommentThread, ListParams, ModerationAction, ModerationItem,
    NewAuditLog, NewComment, PagedResult, Permission, Post, Principal, SubmitCommentInput,
};
use crate::services::audit::AuditService;
use crate::services::rate_limiter::RateLimiter;
use crate::services::validation::is_valid_email;
use anyhow::Context;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::Utc;
use data_encoding::HEXLOWER;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_NAME_CHARS: usize = 80;
const MAX_USER_AGENT_CHARS: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many comments, try again later")]
    RateLimited,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    audit: Arc<AuditService>,
    limiter: RateLimiter,
    config: CommentConfig,
    /// Per-process salt for IP digests
    ip_salt: [u8; 16],
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        audit: Arc<AuditService>,
        config: CommentConfig,
    ) -> Self {
        let mut ip_salt = [0u8; 16];
        OsRng.fill_bytes(&mut ip_salt);
        Self {
            repo,
            posts,
            audit,
            limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
            config,
            ip_salt,
        }
    }

    /// Submission limiter, exposed for the periodic cleanup task
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Salted digest of a client IP
    pub fn hash_ip(&self, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ip_salt);
        hasher.update(ip.as_bytes());
        HEXLOWER.encode(&hasher.finalize())
    }

    /// Submit a comment on a published post.
    ///
    /// A filled honeypot stores the comment as spam without telling the
    /// client.
    pub async fn submit(
        &self,
        post_slug: &str,
        input: SubmitCommentInput,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Comment, CommentServiceError> {
        let post = self.published_post(post_slug).await?;

        let author_name = input.author_name.trim().to_string();
        if author_name.is_empty() || author_name.chars().count() > MAX_NAME_CHARS {
            return Err(CommentServiceError::ValidationError(format!(
                "Name must be between 1 and {} characters",
                MAX_NAME_CHARS
            )));
        }

        let body = input.body.trim().to_string();
        if body.is_empty() || body.chars().count() > self.config.max_length {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be between 1 and {} characters",
                self.config.max_length
            )));
        }

        let author_email = input
            .author_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if let Some(email) = &author_email {
            if !is_valid_email(email) {
                return Err(CommentServiceError::ValidationError(
                    "Invalid email address".to_string(),
                ));
            }
        }

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .repo
                .get_by_id(parent_id)
                .await
                .context("Failed to load parent comment")?;
            match parent {
                Some(p) if p.post_id == post.id && p.status == CommentStatus::Approved => {}
                _ => {
                    return Err(CommentServiceError::ValidationError(
                        "Parent comment does not exist on this post".to_string(),
                    ))
                }
            }
        }

        // Submissions without a resolvable client address are not limited
        if let Some(ip) = ip {
            if !self.limiter.check_and_record(ip).await {
                tracing::debug!(post = %post.slug, "Comment submission rate limited");
                return Err(CommentServiceError::RateLimited);
            }
        }

        let honeypot = input
            .website
            .as_deref()
            .map(|w| !w.trim().is_empty())
            .unwrap_or(false);
        let status = if honeypot {
            tracing::info!(post = %post.slug, "Honeypot filled, storing comment as spam");
            CommentStatus::Spam
        } else if self.config.require_moderation {
            CommentStatus::Pending
        } else {
            CommentStatus::Approved
        };

        let new_comment = NewComment {
            post_id: post.id,
            parent_id: input.parent_id,
            author_name,
            author_email,
            body,
            status,
            ip_hash: ip.map(|ip| self.hash_ip(ip)),
            user_agent: user_agent.map(|ua| ua.chars().take(MAX_USER_AGENT_CHARS).collect()),
        };

        let comment = self
            .repo
            .create(&new_comment)
            .await
            .context("Failed to create comment")?;
        tracing::info!(comment_id = comment.id, post = %post.slug, status = %comment.status, "Comment submitted");
        Ok(comment)
    }

    /// Approved comments of a published post, replies nested under parents
    pub async fn list_approved(
        &self,
        post_slug: &str,
    ) -> Result<Vec<CommentThread>, CommentServiceError> {
        let post = self.published_post(post_slug).await?;
        let comments = self
            .repo
            .list_by_post(post.id, CommentStatus::Approved)
            .await
            .context("Failed to list comments")?;
        Ok(build_threads(&comments))
    }

    pub async fn list_for_moderation(
        &self,
        status: Option<CommentStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<ModerationItem>, CommentServiceError> {
        let items = self
            .repo
            .list_for_moderation(status, params)
            .await
            .context("Failed to list comments")?;
        let total = self
            .repo
            .count_for_moderation(status)
            .await
            .context("Failed to count comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Apply a moderation decision. Re-applying the current status is
    /// accepted and audited like any other decision.
    pub async fn moderate(
        &self,
        id: i64,
        action: ModerationAction,
        principal: &Principal,
        reason: Option<String>,
    ) -> Result<Comment, CommentServiceError> {
        if !principal.can(Permission::CommentsModerate) {
            return Err(CommentServiceError::Forbidden(
                "comments:moderate required".to_string(),
            ));
        }

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))?;

        let actor = principal.actor();
        let comment = self
            .repo
            .update_status(id, action.target_status(), &actor, Utc::now())
            .await
            .context("Failed to update comment status")?;

        let entry = NewAuditLog::new(
            actor,
            format!("comment.{}", action.as_str()),
            "comment",
            Some(id),
        )
        .with_details(json!({
            "from": existing.status,
            "to": comment.status,
            "post_id": comment.post_id,
            "reason": reason,
        }));
        self.audit
            .try_record(&entry)
            .await
            .context("Moderation applied without an audit entry")?;

        Ok(comment)
    }

    /// Delete a comment together with its replies
    pub async fn delete(&self, id: i64, principal: &Principal) -> Result<(), CommentServiceError> {
        if !principal.can(Permission::CommentsDelete) {
            return Err(CommentServiceError::Forbidden(
                "comments:delete required".to_string(),
            ));
        }

        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", id)))?;

        self.repo.delete(id).await.context("Failed to delete comment")?;
        let entry = NewAuditLog::new(principal.actor(), "comment.delete", "comment", Some(id))
            .with_details(json!({
                "post_id": existing.post_id,
                "status": existing.status,
            }));
        self.audit
            .try_record(&entry)
            .await
            .context("Comment deleted without an audit entry")?;
        Ok(())
    }

    async fn published_post(&self, slug: &str) -> Result<Post, CommentServiceError> {
        self.posts
            .get_by_slug(slug)
            .await
            .context("Failed to load post")?
            .filter(Post::is_published)
            .ok_or_else(|| CommentServiceError::NotFound(format!("post {}", slug)))
    }
}

/// Nest replies under their parents, keeping creation order at each level.
///
/// Replies whose parent is not in `comments` are left out.
pub fn build_threads(comments: &[Comment]) -> Vec<CommentThread> {
    let mut children: HashMap<i64, Vec<&Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent) => children.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    fn attach(comment: &Comment, children: &HashMap<i64, Vec<&Comment>>) -> CommentThread {
        let mut thread = CommentThread::from(comment);
        if let Some(replies) = children.get(&comment.id) {
            thread.replies = replies.iter().map(|r| attach(r, children)).collect();
        }
        thread
    }

    roots.into_iter().map(|c| attach(c, &children)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AuditLogRepository, PostRecord, SqlxAuditLogRepository, SqlxCommentRepository,
        SqlxPostRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{AuditFilter, AuditLog, CredentialKind, PostKind, PostStatus, Role};

    struct Fixture {
        service: CommentService,
        audit: Arc<AuditService>,
    }

    struct BrokenAuditLog;

    #[async_trait::async_trait]
    impl AuditLogRepository for BrokenAuditLog {
        async fn insert(&self, _entry: &NewAuditLog) -> anyhow::Result<AuditLog> {
            Err(anyhow::anyhow!("audit storage unavailable"))
        }

        async fn list(
            &self,
            _filter: &AuditFilter,
            _params: &ListParams,
        ) -> anyhow::Result<Vec<AuditLog>> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &AuditFilter) -> anyhow::Result<i64> {
            Ok(0)
        }
    }

    async fn setup(config: CommentConfig) -> Fixture {
        setup_with_audit(config, None).await
    }

    async fn setup_with_audit(
        config: CommentConfig,
        audit_repo: Option<Arc<dyn AuditLogRepository>>,
    ) -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let posts = SqlxPostRepository::boxed(pool.clone());
        for (slug, status) in [("open", PostStatus::Published), ("wip", PostStatus::Draft)] {
            posts
                .create(&PostRecord {
                    slug: slug.to_string(),
                    kind: PostKind::Blog,
                    title: slug.to_string(),
                    summary: None,
                    body_mdx: "body".to_string(),
                    tags: vec![],
                    status,
                    reading_minutes: 1,
                    excerpt: "body".to_string(),
                    author_id: None,
                    published_at: (status == PostStatus::Published).then(Utc::now),
                })
                .await
                .unwrap();
        }
        let audit_repo =
            audit_repo.unwrap_or_else(|| SqlxAuditLogRepository::boxed(pool.clone()));
        let audit = Arc::new(AuditService::new(audit_repo));
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool),
            posts,
            audit.clone(),
            config,
        );
        Fixture { service, audit }
    }

    fn input(name: &str, body: &str) -> SubmitCommentInput {
        SubmitCommentInput {
            author_name: name.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    fn moderator() -> Principal {
        Principal {
            user_id: Some(1),
            name: "mod".to_string(),
            role: Role::Moderator,
            via: CredentialKind::Session,
        }
    }

    #[tokio::test]
    async fn test_submit_is_pending_when_moderated() {
        let fx = setup(CommentConfig::default()).await;
        let comment = fx
            .service
            .submit("open", input("Ada", "  Nice post  "), Some("10.0.0.1"), Some("test"))
            .await
            .unwrap();
        assert_eq!(comment.status, CommentStatus::Pending);
        assert_eq!(comment.body, "Nice post");
        assert_eq!(comment.ip_hash, Some(fx.service.hash_ip("10.0.0.1")));
        assert_ne!(comment.ip_hash.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_submit_rejects_unpublished_and_missing_posts() {
        let fx = setup(CommentConfig::default()).await;
        for slug in ["wip", "nowhere"] {
            let result = fx.service.submit(slug, input("Ada", "hi"), None, None).await;
            assert!(matches!(result, Err(CommentServiceError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let config = CommentConfig {
            max_length: 10,
            ..Default::default()
        };
        let fx = setup(config).await;

        let cases = vec![
            input("", "hi"),
            input(&"n".repeat(81), "hi"),
            input("Ada", "   "),
            input("Ada", "this body is too long"),
            SubmitCommentInput {
                author_email: Some("not-an-email".to_string()),
                ..input("Ada", "hi")
            },
            SubmitCommentInput {
                parent_id: Some(999),
                ..input("Ada", "hi")
            },
        ];
        for case in cases {
            let result = fx.service.submit("open", case, None, None).await;
            assert!(matches!(result, Err(CommentServiceError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_honeypot_marks_spam() {
        let fx = setup(CommentConfig::default()).await;
        let comment = fx
            .service
            .submit(
                "open",
                SubmitCommentInput {
                    website: Some("http://spam.example".to_string()),
                    ..input("Bot", "buy now")
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(comment.status, CommentStatus::Spam);
    }

    #[tokio::test]
    async fn test_rate_limit_per_ip() {
        let config = CommentConfig {
            rate_limit_per_minute: 2,
            require_moderation: false,
            ..Default::default()
        };
        let fx = setup(config).await;
        for _ in 0..2 {
            fx.service
                .submit("open", input("Ada", "hi"), Some("1.1.1.1"), None)
                .await
                .unwrap();
        }
        let third = fx
            .service
            .submit("open", input("Ada", "hi"), Some("1.1.1.1"), None)
            .await;
        assert!(matches!(third, Err(CommentServiceError::RateLimited)));

        fx.service
            .submit("open", input("Bob", "hi"), Some("2.2.2.2"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_ip_does_not_share_a_bucket() {
        let config = CommentConfig {
            rate_limit_per_minute: 2,
            ..Default::default()
        };
        let fx = setup(config).await;
        for name in ["Ada", "Bob", "Cy", "Dee", "Eve", "Fay"] {
            fx.service
                .submit("open", input(name, "hi"), None, None)
                .await
                .unwrap();
        }
        fx.service
            .submit("open", input("Gus", "hi"), Some("3.3.3.3"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_moderation_fails_without_audit_entry() {
        let fx = setup_with_audit(CommentConfig::default(), Some(Arc::new(BrokenAuditLog))).await;
        let comment = fx
            .service
            .submit("open", input("Ada", "hi"), None, None)
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .moderate(comment.id, ModerationAction::Approve, &moderator(), None)
                .await,
            Err(CommentServiceError::InternalError(_))
        ));
        assert!(matches!(
            fx.service.delete(comment.id, &moderator()).await,
            Err(CommentServiceError::InternalError(_))
        ));
    }

    #[tokio::test]
    async fn test_moderation_then_thread_visibility() {
        let fx = setup(CommentConfig::default()).await;
        let root = fx
            .service
            .submit("open", input("Ada", "first"), None, None)
            .await
            .unwrap();
        assert!(fx.service.list_approved("open").await.unwrap().is_empty());

        // Replies need an approved parent
        let early_reply = fx
            .service
            .submit(
                "open",
                SubmitCommentInput {
                    parent_id: Some(root.id),
                    ..input("Bob", "reply")
                },
                None,
                None,
            )
            .await;
        assert!(matches!(early_reply, Err(CommentServiceError::ValidationError(_))));

        fx.service
            .moderate(root.id, ModerationAction::Approve, &moderator(), None)
            .await
            .unwrap();
        let reply = fx
            .service
            .submit(
                "open",
                SubmitCommentInput {
                    parent_id: Some(root.id),
                    author_email: Some("bob@example.com".to_string()),
                    ..input("Bob", "reply")
                },
                None,
                None,
            )
            .await
            .unwrap();
        fx.service
            .moderate(reply.id, ModerationAction::Approve, &moderator(), None)
            .await
            .unwrap();

        let threads = fx.service.list_approved("open").await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].id, reply.id);
        assert!(threads[0].replies[0].avatar_url.contains("gravatar.com/avatar/"));
    }

    #[tokio::test]
    async fn test_moderation_is_audited_including_noops() {
        let fx = setup(CommentConfig::default()).await;
        let comment = fx
            .service
            .submit("open", input("Ada", "hi"), None, None)
            .await
            .unwrap();

        for _ in 0..2 {
            let updated = fx
                .service
                .moderate(
                    comment.id,
                    ModerationAction::Spam,
                    &moderator(),
                    Some("link farm".to_string()),
                )
                .await
                .unwrap();
            assert_eq!(updated.status, CommentStatus::Spam);
            assert_eq!(updated.moderated_by.as_deref(), Some("mod"));
        }

        let logs = fx
            .audit
            .list(
                &AuditFilter {
                    action: Some("comment.spam".to_string()),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(logs.total, 2);
        assert_eq!(logs.items[0].details["reason"], "link farm");
    }

    #[tokio::test]
    async fn test_moderation_requires_permission() {
        let fx = setup(CommentConfig::default()).await;
        let comment = fx
            .service
            .submit("open", input("Ada", "hi"), None, None)
            .await
            .unwrap();
        let author = Principal {
            role: Role::Author,
            ..moderator()
        };
        let result = fx
            .service
            .moderate(comment.id, ModerationAction::Approve, &author, None)
            .await;
        assert!(matches!(result, Err(CommentServiceError::Forbidden(_))));

        let missing = fx
            .service
            .moderate(999, ModerationAction::Approve, &moderator(), None)
            .await;
        assert!(matches!(missing, Err(CommentServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_and_queue() {
        let fx = setup(CommentConfig::default()).await;
        let comment = fx
            .service
            .submit("open", input("Ada", "hi"), None, None)
            .await
            .unwrap();

        let queue = fx
            .service
            .list_for_moderation(Some(CommentStatus::Pending), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(queue.total, 1);
        assert_eq!(queue.items[0].post_slug, "open");

        fx.service.delete(comment.id, &moderator()).await.unwrap();
        let again = fx.service.delete(comment.id, &moderator()).await;
        assert!(matches!(again, Err(CommentServiceError::NotFound(_))));
    }

    #[test]
    fn test_build_threads_drops_orphans() {
        let now = Utc::now();
        let make = |id: i64, parent_id: Option<i64>| Comment {
            id,
            post_id: 1,
            parent_id,
            author_name: format!("c{}", id),
            author_email: None,
            body: "x".to_string(),
            status: CommentStatus::Approved,
            ip_hash: None,
            user_agent: None,
            moderated_by: None,
            moderated_at: None,
            created_at: now,
            updated_at: now,
        };
        let threads = build_threads(&[make(1, None), make(2, Some(1)), make(3, Some(2)), make(4, Some(99))]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies[0].replies[0].id, 3);
    }
}
