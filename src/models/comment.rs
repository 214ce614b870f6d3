//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Spam,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Spam => "spam",
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "spam" => Ok(Self::Spam),
            _ => Err(format!("Invalid comment status: {}", s)),
        }
    }
}

/// Moderator decision on a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
    Spam,
}

impl ModerationAction {
    /// Status a comment ends up in after this action
    pub fn target_status(&self) -> CommentStatus {
        match self {
            Self::Approve => CommentStatus::Approved,
            Self::Reject => CommentStatus::Rejected,
            Self::Spam => CommentStatus::Spam,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Spam => "spam",
        }
    }
}

impl std::str::FromStr for ModerationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "spam" => Ok(Self::Spam),
            _ => Err(format!("Invalid moderation action: {}", s)),
        }
    }
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: Option<String>,
    pub body: String,
    pub status: CommentStatus,
    /// Salted SHA-256 of the submitter IP
    #[serde(skip_serializing)]
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub moderated_by: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of an approved comment, with nested replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub avatar_url: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Gravatar URL derived from the commenter email
    pub fn gravatar_url(email: Option<&str>) -> String {
        match email.map(str::trim) {
            Some(e) if !e.is_empty() => {
                let hash = format!("{:x}", md5::compute(e.to_lowercase()));
                format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
            }
            _ => "https://www.gravatar.com/avatar/?d=mp&s=80".to_string(),
        }
    }
}

impl From<&Comment> for CommentThread {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id,
            parent_id: c.parent_id,
            author_name: c.author_name.clone(),
            avatar_url: Self::gravatar_url(c.author_email.as_deref()),
            body: c.body.clone(),
            created_at: c.created_at,
            replies: Vec::new(),
        }
    }
}

/// Comment as shown in the moderation queue
#[derive(Debug, Clone, Serialize)]
pub struct ModerationItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub post_slug: String,
    pub post_title: String,
}

/// Input for submitting a comment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitCommentInput {
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Honeypot: hidden in the form, only bots fill it
    #[serde(default)]
    pub website: Option<String>,
}

/// Row to insert for a new comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: Option<String>,
    pub body: String,
    pub status: CommentStatus,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
}
