//! Content documents and localized metadata.
//!
//! These types describe the documents the audit and enrichment workflows
//! operate on. The content store itself is an external collaborator; only
//! its data shapes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Localized title/excerpt pair for a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub title: String,
    pub excerpt: String,
}

impl PostMetadata {
    /// Whether either field is missing.
    pub fn is_incomplete(&self) -> bool {
        self.title.trim().is_empty() || self.excerpt.trim().is_empty()
    }
}

/// One content document with its current localized metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Document id in the content store.
    pub id: Uuid,
    /// URL slug.
    pub slug: String,
    /// Full body text.
    pub body: String,
    /// BCP-47 style language code of the body (e.g. "en", "pt").
    pub language_code: String,
    /// Current localized metadata.
    pub metadata: PostMetadata,
    /// Last modification time in the content store.
    pub updated_at: DateTime<Utc>,
}

/// One page of posts from the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub page: u32,
    pub per_page: u32,
    /// Total posts across all pages.
    pub total: u64,
}
