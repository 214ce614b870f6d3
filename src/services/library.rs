//! Library service
//!
//! CRUD for the reading/reference shelf. Writes are audited as `library.*`.

use crate::db::repositories::LibraryRepository;
use crate::models::{LibraryItem, LibraryItemInput, LibraryKind, NewAuditLog, Principal};
use crate::services::audit::AuditService;
use crate::services::validation::is_valid_media_url;
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

const MAX_TITLE_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum LibraryServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Library item not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct LibraryService {
    repo: Arc<dyn LibraryRepository>,
    audit: Arc<AuditService>,
}

impl LibraryService {
    pub fn new(repo: Arc<dyn LibraryRepository>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    /// Newest first, optionally one kind only
    pub async fn list(&self, kind: Option<LibraryKind>) -> Result<Vec<LibraryItem>, LibraryServiceError> {
        Ok(self.repo.list(kind).await.context("Failed to list library items")?)
    }

    pub async fn get(&self, id: i64) -> Result<LibraryItem, LibraryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load library item")?
            .ok_or(LibraryServiceError::NotFound(id))
    }

    pub async fn create(
        &self,
        input: LibraryItemInput,
        principal: &Principal,
    ) -> Result<LibraryItem, LibraryServiceError> {
        let input = normalize(input)?;
        let item = self
            .repo
            .create(&input)
            .await
            .context("Failed to create library item")?;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "library.create", "library_item", Some(item.id))
                    .with_details(json!({ "title": item.title, "kind": item.kind })),
            )
            .await;
        Ok(item)
    }

    pub async fn update(
        &self,
        id: i64,
        input: LibraryItemInput,
        principal: &Principal,
    ) -> Result<LibraryItem, LibraryServiceError> {
        let input = normalize(input)?;
        let item = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update library item")?
            .ok_or(LibraryServiceError::NotFound(id))?;
        self.audit
            .record(
                NewAuditLog::new(principal.actor(), "library.update", "library_item", Some(id))
                    .with_details(json!({ "title": item.title })),
            )
            .await;
        Ok(item)
    }

    pub async fn delete(&self, id: i64, principal: &Principal) -> Result<(), LibraryServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete library item")?
        {
            return Err(LibraryServiceError::NotFound(id));
        }
        self.audit
            .record(NewAuditLog::new(
                principal.actor(),
                "library.delete",
                "library_item",
                Some(id),
            ))
            .await;
        Ok(())
    }
}

fn normalize(mut input: LibraryItemInput) -> Result<LibraryItemInput, LibraryServiceError> {
    input.title = input.title.trim().to_string();
    if input.title.is_empty() {
        return Err(LibraryServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if input.title.chars().count() > MAX_TITLE_CHARS {
        return Err(LibraryServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_CHARS
        )));
    }
    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(LibraryServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
    }

    input.creator = trim_optional(input.creator);
    input.notes = trim_optional(input.notes);
    input.url = trim_optional(input.url);
    if let Some(url) = &input.url {
        if !url.starts_with("http") || !is_valid_media_url(url) {
            return Err(LibraryServiceError::ValidationError(
                "URL must be an absolute http(s) URL".to_string(),
            ));
        }
    }
    Ok(input)
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
