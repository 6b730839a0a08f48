//! Story domain model.
//!
//! # Responsibility
//! - Define the canonical record for one analyzed user story.
//! - Hold the role/means/ends chunk spans produced by the chunker.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another story.
//! - Every present chunk span is a literal contiguous substring of `text`.
//! - Chunks change only through an explicit re-chunk of the whole story.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::project::ProjectId;

/// Stable identifier for a story.
pub type StoryId = Uuid;

/// One of the three semantic segments of a user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Who wants the feature (`As a ...`).
    Role,
    /// What is wanted (`I want to ...`).
    Means,
    /// Why it is wanted (`so that ...`).
    Ends,
}

impl ChunkKind {
    /// All chunk kinds in template order.
    pub const ALL: [ChunkKind; 3] = [ChunkKind::Role, ChunkKind::Means, ChunkKind::Ends];

    /// Position of this chunk inside a project format template.
    pub fn position(self) -> usize {
        match self {
            Self::Role => 0,
            Self::Means => 1,
            Self::Ends => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Means => "means",
            Self::Ends => "ends",
        }
    }
}

impl Display for ChunkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role/means/ends spans carved out of a story text.
///
/// Partial results are valid: any span may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunks {
    pub role: Option<String>,
    pub means: Option<String>,
    pub ends: Option<String>,
}

impl Chunks {
    /// Returns the span for `kind`, if present.
    pub fn get(&self, kind: ChunkKind) -> Option<&str> {
        match kind {
            ChunkKind::Role => self.role.as_deref(),
            ChunkKind::Means => self.means.as_deref(),
            ChunkKind::Ends => self.ends.as_deref(),
        }
    }

    /// Returns whether no span was detected at all.
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.means.is_none() && self.ends.is_none()
    }
}

/// Validation errors for story invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryValidationError {
    /// Story text is empty after trimming.
    EmptyText,
    /// A chunk span is not part of the story text.
    ChunkNotInText(ChunkKind),
}

impl Display for StoryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "story text cannot be empty"),
            Self::ChunkNotInText(kind) => {
                write!(f, "{kind} chunk is not a substring of the story text")
            }
        }
    }
}

impl Error for StoryValidationError {}

/// Canonical record for one user story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// Stable story ID.
    pub uuid: StoryId,
    /// Owning project.
    pub project_uuid: ProjectId,
    /// Raw story text as entered.
    pub text: String,
    /// Chunk spans computed from `text`.
    pub chunks: Chunks,
    /// Opaque correlation key used by external integrations.
    pub external_ref: Option<String>,
}

impl Story {
    /// Creates an unchunked story with a generated stable ID.
    pub fn new(project_uuid: ProjectId, text: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            project_uuid,
            text: text.into(),
            chunks: Chunks::default(),
            external_ref: None,
        }
    }

    /// Returns the chunk span for `kind`, if present.
    pub fn chunk(&self, kind: ChunkKind) -> Option<&str> {
        self.chunks.get(kind)
    }

    /// Validates text and chunk invariants.
    pub fn validate(&self) -> Result<(), StoryValidationError> {
        if self.text.trim().is_empty() {
            return Err(StoryValidationError::EmptyText);
        }
        for kind in ChunkKind::ALL {
            if let Some(span) = self.chunk(kind) {
                if !self.text.contains(span) {
                    return Err(StoryValidationError::ChunkNotInText(kind));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkKind, Chunks, Story, StoryValidationError};
    use uuid::Uuid;

    #[test]
    fn validate_rejects_blank_text() {
        let story = Story::new(Uuid::new_v4(), "   ");
        assert_eq!(story.validate(), Err(StoryValidationError::EmptyText));
    }

    #[test]
    fn validate_rejects_foreign_chunk() {
        let mut story = Story::new(Uuid::new_v4(), "As a user, I want to log in");
        story.chunks = Chunks {
            role: Some("As an admin,".to_string()),
            ..Chunks::default()
        };
        assert_eq!(
            story.validate(),
            Err(StoryValidationError::ChunkNotInText(ChunkKind::Role))
        );
    }

    #[test]
    fn chunk_kinds_follow_template_order() {
        let positions: Vec<usize> = ChunkKind::ALL.iter().map(|kind| kind.position()).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
