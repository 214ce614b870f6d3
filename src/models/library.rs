//! Library item model
//!
//! The library is the reading/reference shelf shown on the site.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Book,
    Article,
    Paper,
    Video,
    #[default]
    Other,
}

impl LibraryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryKind::Book => "book",
            LibraryKind::Article => "article",
            LibraryKind::Paper => "paper",
            LibraryKind::Video => "video",
            LibraryKind::Other => "other",
        }
    }
}

impl FromStr for LibraryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "book" => Ok(LibraryKind::Book),
            "article" => Ok(LibraryKind::Article),
            "paper" => Ok(LibraryKind::Paper),
            "video" => Ok(LibraryKind::Video),
            "other" => Ok(LibraryKind::Other),
            _ => Err(format!("Invalid library kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: i64,
    pub title: String,
    pub creator: Option<String>,
    pub url: Option<String>,
    pub kind: LibraryKind,
    pub notes: Option<String>,
    /// 1..=5
    pub rating: Option<i64>,
    pub finished_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/replace payload for a library item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryItemInput {
    pub title: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub kind: LibraryKind,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub finished_on: Option<NaiveDate>,
}
