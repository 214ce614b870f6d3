//! Post model
//!
//! A post is one piece of MDX-backed writing. The MDX source is stored as-is;
//! rendering happens in the frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of writing, which also decides the public URL section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Blog,
    Essay,
    Note,
}

impl PostKind {
    pub const ALL: [PostKind; 3] = [PostKind::Blog, PostKind::Essay, PostKind::Note];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Blog => "blog",
            PostKind::Essay => "essay",
            PostKind::Note => "note",
        }
    }

    /// Public URL section, e.g. `/essays/<slug>`
    pub fn path_segment(&self) -> &'static str {
        match self {
            PostKind::Blog => "blog",
            PostKind::Essay => "essays",
            PostKind::Note => "notes",
        }
    }

    /// Resolve a public URL section back to its kind
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blog" => Ok(PostKind::Blog),
            "essay" => Ok(PostKind::Essay),
            "note" => Ok(PostKind::Note),
            _ => Err(format!("Invalid post kind: {}", s)),
        }
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    /// Withdrawn from the site; public lookups answer 410
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            _ => Err(format!("Invalid post status: {}", s)),
        }
    }
}

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub kind: PostKind,
    pub title: String,
    pub summary: Option<String>,
    /// MDX source
    pub body_mdx: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    /// Derived from `body_mdx` on save
    pub reading_minutes: i64,
    /// Derived from `body_mdx` on save
    pub excerpt: String,
    pub author_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Path of the post on the public site
    pub fn public_path(&self) -> String {
        format!("/{}/{}", self.kind.path_segment(), self.slug)
    }
}

/// Feed entry: a post without its body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub slug: String,
    pub kind: PostKind,
    pub title: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub reading_minutes: i64,
    pub excerpt: String,
    pub path: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.clone(),
            kind: post.kind,
            title: post.title.clone(),
            summary: post.summary.clone(),
            tags: post.tags.clone(),
            reading_minutes: post.reading_minutes,
            excerpt: post.excerpt.clone(),
            path: post.public_path(),
            published_at: post.published_at,
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub kind: PostKind,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub body_mdx: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
    /// Backdated publication time (imports); defaults to now on publish
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Partial update of a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub slug: Option<String>,
    pub kind: Option<PostKind>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body_mdx: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Filters of the public feed
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub kind: Option<PostKind>,
    pub tag: Option<String>,
}
