//! Media service
//!
//! Registry of media asset metadata. Writes are audited as `media.*`.

use crate::db::repositories::MediaRepository;
use crate::models::{MediaAsset, MediaAssetInput, NewAuditLog, Principal};
use crate::services::audit::AuditService;
use crate::services::validation::is_valid_media_url;
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

const MIME_PREFIXES: [&str; 3] = ["image/", "video/", "audio/"];

#[derive(Debug, thiserror::Error)]
pub enum MediaServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Media asset not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MediaService {
    repo: Arc<dyn MediaRepository>,
    audit: Arc<AuditService>,
}

impl MediaService {
    pub fn new(repo: Arc<dyn MediaRepository>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    pub async fn list(&self) -> Result<Vec<MediaAsset>, MediaServiceError> {
        Ok(self.repo.list().await.context("Failed to list media assets")?)
    }

    pub async fn get(&self, id: i64) -> Result<MediaAsset, MediaServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load media asset")?
            .ok_or(MediaServiceError::NotFound(id))
    }

    pub async fn create(
        &self,
        input: MediaAssetInput,
        principal: &Principal,
    ) -> Result<MediaAsset, MediaServiceError> {
        let input = validate(input)?;
        let asset = self
            .repo
            .create(&input)
            .await
            .context("Failed to create media asset")?;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "media.create", "media_asset", Some(asset.id))
                    .with_details(json!({ "url": asset.url, "mime_type": asset.mime_type })),
            )
            .await;
        Ok(asset)
    }

    pub async fn update(
        &self,
        id: i64,
        input: MediaAssetInput,
        principal: &Principal,
    ) -> Result<MediaAsset, MediaServiceError> {
        let input = validate(input)?;
        let asset = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update media asset")?
            .ok_or(MediaServiceError::NotFound(id))?;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "media.update", "media_asset", Some(id))
                    .with_details(json!({ "url": asset.url })),
            )
            .await;
        Ok(asset)
    }

    pub async fn delete(&self, id: i64, principal: &Principal) -> Result<(), MediaServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete media asset")?
        {
            return Err(MediaServiceError::NotFound(id));
        }
        self.audit
            .record(NewAuditLog::new(
                principal.actor(),
                "media.delete",
                "media_asset",
                Some(id),
            ))
            .await;
        Ok(())
    }
}

fn validate(mut input: MediaAssetInput) -> Result<MediaAssetInput, MediaServiceError> {
    input.url = input.url.trim().to_string();
    input.alt_text = input.alt_text.trim().to_string();
    input.mime_type = input.mime_type.trim().to_lowercase();

    if !is_valid_media_url(&input.url) {
        return Err(MediaServiceError::ValidationError(
            "URL must be http(s) or root-relative".to_string(),
        ));
    }
    if input.alt_text.is_empty() {
        return Err(MediaServiceError::ValidationError(
            "Alt text is required".to_string(),
        ));
    }
    let has_subtype = MIME_PREFIXES
        .iter()
        .any(|p| input.mime_type.strip_prefix(p).is_some_and(|rest| !rest.is_empty()));
    if !has_subtype {
        return Err(MediaServiceError::ValidationError(
            "MIME type must be image/*, video/* or audio/*".to_string(),
        ));
    }
    for (name, value) in [("width", input.width), ("height", input.height), ("bytes", input.bytes)] {
        if value.is_some_and(|v| v <= 0) {
            return Err(MediaServiceError::ValidationError(format!(
                "{} must be positive",
                name
            )));
        }
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAuditLogRepository, SqlxMediaRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CredentialKind, Role};

    async fn setup() -> MediaService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let audit = Arc::new(AuditService::new(SqlxAuditLogRepository::boxed(pool.clone())));
        MediaService::new(SqlxMediaRepository::boxed(pool), audit)
    }

    fn editor() -> Principal {
        Principal {
            user_id: Some(1),
            name: "ed".to_string(),
            role: Role::Editor,
            via: CredentialKind::Session,
        }
    }

    fn asset(url: &str, alt: &str, mime: &str) -> MediaAssetInput {
        MediaAssetInput {
            url: url.to_string(),
            alt_text: alt.to_string(),
            mime_type: mime.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_mime() {
        let service = setup().await;
        let created = service
            .create(asset("/media/cover.png", "Cover", "Image/PNG"), &editor())
            .await
            .unwrap();
        assert_eq!(created.mime_type, "image/png");
        assert_eq!(service.get(created.id).await.unwrap().alt_text, "Cover");
    }

    #[tokio::test]
    async fn test_validation() {
        let service = setup().await;
        let bad = vec![
            asset("ftp://host/a.png", "a", "image/png"),
            asset("//cdn/a.png", "a", "image/png"),
            asset("https://cdn.example/a.png", "   ", "image/png"),
            asset("https://cdn.example/a.pdf", "a", "application/pdf"),
            asset("https://cdn.example/a", "a", "image/"),
        ];
        for input in bad {
            assert!(matches!(
                service.create(input, &editor()).await,
                Err(MediaServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let service = setup().await;
        assert!(matches!(
            service.delete(7, &editor()).await,
            Err(MediaServiceError::NotFound(7))
        ));
    }
}
