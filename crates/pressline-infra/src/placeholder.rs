//! Deterministic placeholder collaborators.
//!
//! In-memory, rule-based implementations of the collaborator traits so the
//! workflows can run end to end without any external content platform or
//! model provider. Used by the CLI demo mode and by integration tests.

use chrono::Utc;
use dashmap::DashMap;
use pressline_core::collab::{ContentStore, JudgmentService, MetadataGenerator};
use pressline_types::audit::{ConsistencyVerdict, GeneratedMetadata};
use pressline_types::content::{Post, PostMetadata, PostPage};
use pressline_types::error::{ContentError, GeneratorError, JudgmentError};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Content store
// ---------------------------------------------------------------------------

/// DashMap-backed content store.
#[derive(Default)]
pub struct MemoryContentStore {
    posts: DashMap<Uuid, Post>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a batch of posts.
    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        let store = Self::new();
        for post in posts {
            store.insert(post);
        }
        store
    }

    pub fn insert(&self, post: Post) {
        self.posts.insert(post.id, post);
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl ContentStore for MemoryContentStore {
    async fn get_post(&self, id: &Uuid) -> Result<Option<Post>, ContentError> {
        Ok(self.posts.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostPage, ContentError> {
        let mut all: Vec<Post> = self
            .posts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        // Oldest first, id as a stable tie-break.
        all.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = all.len() as u64;
        let page = page.max(1);
        let start = ((page - 1) * per_page) as usize;
        let posts = all.into_iter().skip(start).take(per_page as usize).collect();

        Ok(PostPage {
            posts,
            page,
            per_page,
            total,
        })
    }

    async fn update_metadata(
        &self,
        post_id: &Uuid,
        language_code: &str,
        metadata: &PostMetadata,
    ) -> Result<(), ContentError> {
        let mut entry = self.posts.get_mut(post_id).ok_or(ContentError::NotFound)?;
        let post = entry.value_mut();
        post.language_code = language_code.to_string();
        post.metadata = metadata.clone();
        post.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Metadata generator
// ---------------------------------------------------------------------------

/// Maximum title length produced by the heuristic generator.
const TITLE_MAX_CHARS: usize = 80;
/// Maximum excerpt length produced by the heuristic generator.
const EXCERPT_MAX_CHARS: usize = 160;

/// Marker-word language tables. First table with a hit wins; ties resolved
/// by declaration order, default "en".
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    ("pt", &["bom dia", "obrigado", "não", "você", "isso é"]),
    ("fr", &["bonjour", "merci", "c'est", "nous sommes"]),
    ("es", &["buenos días", "gracias", "esto es", "nosotros"]),
    ("de", &["guten tag", "danke", "das ist", "wir sind"]),
];

/// Rule-based metadata generator: language detection by marker words,
/// title/excerpt by truncating the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    pub fn new() -> Self {
        Self
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut.trim_end())
    }
}

fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find(['.', '!', '?']) {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    }
}

impl MetadataGenerator for HeuristicGenerator {
    async fn detect_language(&self, text: &str) -> Result<String, GeneratorError> {
        let lowered = text.to_lowercase();
        for (code, markers) in LANGUAGE_MARKERS {
            if markers.iter().any(|marker| lowered.contains(marker)) {
                return Ok((*code).to_string());
            }
        }
        Ok("en".to_string())
    }

    async fn generate(
        &self,
        body: &str,
        language_code: &str,
    ) -> Result<GeneratedMetadata, GeneratorError> {
        if language_code.trim().is_empty() {
            return Err(GeneratorError::UnsupportedLanguage(language_code.to_string()));
        }
        Ok(GeneratedMetadata {
            title: truncate_chars(first_sentence(body), TITLE_MAX_CHARS),
            excerpt: truncate_chars(body, EXCERPT_MAX_CHARS),
        })
    }
}

// ---------------------------------------------------------------------------
// Judgment service
// ---------------------------------------------------------------------------

/// Rule-based consistency judgment: incomplete metadata is inconsistent and
/// gets a body-derived correction in the post's language; anything else is
/// consistent.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleJudgment;

impl RuleJudgment {
    pub fn new() -> Self {
        Self
    }
}

impl JudgmentService for RuleJudgment {
    async fn assess(&self, post: &Post) -> Result<ConsistencyVerdict, JudgmentError> {
        if post.metadata.is_incomplete() {
            Ok(ConsistencyVerdict::Inconsistent {
                title: truncate_chars(first_sentence(&post.body), TITLE_MAX_CHARS),
                excerpt: truncate_chars(&post.body, EXCERPT_MAX_CHARS),
            })
        } else {
            Ok(ConsistencyVerdict::Consistent)
        }
    }
}

// ---------------------------------------------------------------------------
// Demo seed data
// ---------------------------------------------------------------------------

/// Build `count` demo posts; every third one has incomplete metadata so an
/// audit run exercises both verdict branches.
pub fn seed_posts(count: usize) -> Vec<Post> {
    (0..count)
        .map(|i| {
            let incomplete = i % 3 == 0;
            Post {
                id: Uuid::now_v7(),
                slug: format!("demo-post-{i}"),
                body: format!(
                    "Demo post number {i}. A few more sentences follow to give \
                     the generator something to truncate into an excerpt."
                ),
                language_code: "en".to_string(),
                metadata: if incomplete {
                    PostMetadata::default()
                } else {
                    PostMetadata {
                        title: format!("Demo post {i}"),
                        excerpt: format!("Summary of demo post {i}."),
                    }
                },
                updated_at: Utc::now(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn post(slug: &str, body: &str, metadata: PostMetadata) -> Post {
        Post {
            id: Uuid::now_v7(),
            slug: slug.to_string(),
            body: body.to_string(),
            language_code: "en".to_string(),
            metadata,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_content_store_pagination_oldest_first() {
        let store = MemoryContentStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let p = post(&format!("p{i}"), "body.", PostMetadata::default());
            ids.push(p.id);
            store.insert(p);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let first = store.list_posts(1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.posts.len(), 2);
        assert_eq!(first.posts[0].id, ids[0]);
        assert_eq!(first.posts[1].id, ids[1]);

        let last = store.list_posts(3, 2).await.unwrap();
        assert_eq!(last.posts.len(), 1);
        assert_eq!(last.posts[0].id, ids[4]);
    }

    #[tokio::test]
    async fn test_update_metadata_unknown_post() {
        let store = MemoryContentStore::new();
        let err = store
            .update_metadata(&Uuid::now_v7(), "en", &PostMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound));
    }

    #[tokio::test]
    async fn test_detect_language_markers() {
        let generator = HeuristicGenerator::new();
        assert_eq!(
            generator.detect_language("Bom dia, leitores!").await.unwrap(),
            "pt"
        );
        assert_eq!(
            generator.detect_language("Bonjour et merci.").await.unwrap(),
            "fr"
        );
        assert_eq!(
            generator.detect_language("Plain English text.").await.unwrap(),
            "en"
        );
    }

    #[tokio::test]
    async fn test_generate_truncates() {
        let generator = HeuristicGenerator::new();
        let body = "word ".repeat(100);
        let generated = generator.generate(&body, "en").await.unwrap();
        assert!(generated.title.chars().count() <= TITLE_MAX_CHARS);
        assert!(generated.excerpt.chars().count() <= EXCERPT_MAX_CHARS);
        assert!(!generated.title.is_empty());
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_language() {
        let generator = HeuristicGenerator::new();
        let err = generator.generate("body", " ").await.unwrap_err();
        assert!(matches!(err, GeneratorError::UnsupportedLanguage(_)));
    }

    #[tokio::test]
    async fn test_judgment_branches() {
        let judgment = RuleJudgment::new();
        let incomplete = post("a", "First sentence. Second sentence.", PostMetadata::default());
        match judgment.assess(&incomplete).await.unwrap() {
            ConsistencyVerdict::Inconsistent { title, excerpt } => {
                assert_eq!(title, "First sentence");
                assert!(!excerpt.is_empty());
            }
            ConsistencyVerdict::Consistent => panic!("expected inconsistent verdict"),
        }

        let complete = post(
            "b",
            "Body.",
            PostMetadata {
                title: "Title".to_string(),
                excerpt: "Excerpt.".to_string(),
            },
        );
        assert!(matches!(
            judgment.assess(&complete).await.unwrap(),
            ConsistencyVerdict::Consistent
        ));
    }
}
