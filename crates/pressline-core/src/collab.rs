//! Collaborator trait definitions.
//!
//! External services the reference compositions talk to: the content store
//! holding documents and their localized metadata, the judgment service that
//! decides whether metadata is consistent with a body, and the metadata
//! generator that fills missing fields. The engine itself never touches
//! these -- it only executes steps.
//!
//! Uses native async fn in traits (RPITIT); composing functions are generic
//! over these traits rather than holding trait objects.

use pressline_types::audit::{ConsistencyVerdict, GeneratedMetadata};
use pressline_types::content::{Post, PostMetadata, PostPage};
use pressline_types::error::{ContentError, GeneratorError, JudgmentError};
use uuid::Uuid;

/// Storage of content documents and their localized metadata.
pub trait ContentStore: Send + Sync {
    /// Fetch one post by id.
    fn get_post(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<Post>, ContentError>> + Send;

    /// List posts, oldest first by `updated_at`, 1-based page.
    fn list_posts(
        &self,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<PostPage, ContentError>> + Send;

    /// Write the localized metadata for one post.
    fn update_metadata(
        &self,
        post_id: &Uuid,
        language_code: &str,
        metadata: &PostMetadata,
    ) -> impl Future<Output = Result<(), ContentError>> + Send;
}

/// Decides whether a post's metadata is consistent with its body.
///
/// Corrections, when returned, are in the post's own language.
pub trait JudgmentService: Send + Sync {
    fn assess(
        &self,
        post: &Post,
    ) -> impl Future<Output = Result<ConsistencyVerdict, JudgmentError>> + Send;
}

/// Generates metadata for a body of text and detects its language.
pub trait MetadataGenerator: Send + Sync {
    /// Detect the language of a text, returned as a short code ("en", "pt").
    fn detect_language(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<String, GeneratorError>> + Send;

    /// Generate a title/excerpt pair for a body in the given language.
    fn generate(
        &self,
        body: &str,
        language_code: &str,
    ) -> impl Future<Output = Result<GeneratedMetadata, GeneratorError>> + Send;
}
