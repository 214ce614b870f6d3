//! Roles, permissions and authenticated principals
//!
//! Every credential (session cookie or API bearer token) resolves to a
//! `Principal` carrying one `Role`. A role implies a fixed permission set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role assigned to users and API tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can preview drafts
    #[default]
    Viewer,
    /// Can write posts, cannot publish
    Author,
    /// Can moderate and delete comments
    Moderator,
    /// Author + moderator, plus publishing and the admin shelves
    Editor,
    /// Everything, including token management
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::Author,
        Role::Moderator,
        Role::Editor,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Author => "author",
            Role::Moderator => "moderator",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    /// Fixed permission set implied by this role
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Viewer => &[PostsReadDrafts],
            Role::Author => &[PostsReadDrafts, PostsWrite],
            Role::Moderator => &[PostsReadDrafts, CommentsModerate, CommentsDelete],
            Role::Editor => &[
                PostsReadDrafts,
                PostsWrite,
                PostsPublish,
                PostsDelete,
                CommentsModerate,
                CommentsDelete,
                LibraryWrite,
                MediaWrite,
                AuditRead,
                CacheRevalidate,
            ],
            Role::Admin => &Permission::ALL,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "author" => Ok(Role::Author),
            "moderator" => Ok(Role::Moderator),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// A single capability checked by the HTTP layer and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "posts:read_drafts")]
    PostsReadDrafts,
    #[serde(rename = "posts:write")]
    PostsWrite,
    #[serde(rename = "posts:publish")]
    PostsPublish,
    #[serde(rename = "posts:delete")]
    PostsDelete,
    #[serde(rename = "comments:moderate")]
    CommentsModerate,
    #[serde(rename = "comments:delete")]
    CommentsDelete,
    #[serde(rename = "library:write")]
    LibraryWrite,
    #[serde(rename = "media:write")]
    MediaWrite,
    #[serde(rename = "audit:read")]
    AuditRead,
    #[serde(rename = "tokens:manage")]
    TokensManage,
    #[serde(rename = "cache:revalidate")]
    CacheRevalidate,
}

impl Permission {
    pub const ALL: [Permission; 11] = [
        Permission::PostsReadDrafts,
        Permission::PostsWrite,
        Permission::PostsPublish,
        Permission::PostsDelete,
        Permission::CommentsModerate,
        Permission::CommentsDelete,
        Permission::LibraryWrite,
        Permission::MediaWrite,
        Permission::AuditRead,
        Permission::TokensManage,
        Permission::CacheRevalidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::PostsReadDrafts => "posts:read_drafts",
            Permission::PostsWrite => "posts:write",
            Permission::PostsPublish => "posts:publish",
            Permission::PostsDelete => "posts:delete",
            Permission::CommentsModerate => "comments:moderate",
            Permission::CommentsDelete => "comments:delete",
            Permission::LibraryWrite => "library:write",
            Permission::MediaWrite => "media:write",
            Permission::AuditRead => "audit:read",
            Permission::TokensManage => "tokens:manage",
            Permission::CacheRevalidate => "cache:revalidate",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a principal authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Session,
    ApiToken,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    /// Set for session principals
    pub user_id: Option<i64>,
    /// Username for sessions, token name for API tokens
    pub name: String,
    pub role: Role,
    pub via: CredentialKind,
}

impl Principal {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }

    /// Name recorded in the audit log
    pub fn actor(&self) -> String {
        match self.via {
            CredentialKind::Session => self.name.clone(),
            CredentialKind::ApiToken => format!("token:{}", self.name),
        }
    }
}
