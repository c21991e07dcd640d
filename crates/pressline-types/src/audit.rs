//! Consistency audit verdicts, decisions, and reports.
//!
//! The `decide` step of the audit workflow expresses conditional logic inside
//! a strictly linear pipeline by emitting a tagged `AuditAction`; the
//! following step matches on the tag instead of branching the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Judgment
// ---------------------------------------------------------------------------

/// Verdict from the judgment collaborator about one post.
///
/// Corrections are always in the post's own language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ConsistencyVerdict {
    /// Title and excerpt match the body; nothing to do.
    Consistent,
    /// Metadata contradicts or omits the body; corrected fields attached.
    Inconsistent { title: String, excerpt: String },
}

/// Metadata proposed by the generator collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMetadata {
    pub title: String,
    pub excerpt: String,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Tagged decision emitted by the audit `decide` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditAction {
    /// Leave the post untouched.
    Skip { reason: String },
    /// Write corrected metadata in the given language.
    Apply {
        title: String,
        excerpt: String,
        language_code: String,
    },
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-post result assembled by the audit `report` step.
///
/// `was_updated` is false both for consistent posts and for posts whose
/// correction write failed -- the audit reports, it never guarantees
/// mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub post_id: Uuid,
    pub slug: String,
    pub language_code: String,
    /// Whether the judgment found the existing metadata consistent.
    pub consistent: bool,
    /// Whether a correction was actually written.
    pub was_updated: bool,
    /// Reason the correction was skipped, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Error from a failed correction write, surfaced as data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
