//! Defect domain model.
//!
//! # Responsibility
//! - Define the kind/subkind/severity taxonomy of story quality defects.
//! - Define persisted defect records and transient rule candidates.
//!
//! # Invariants
//! - `subkind.kind()` always equals `kind` for a persisted defect.
//! - Per story, at most one non-false-positive defect exists per subkind.
//! - False-positive defects are suppression records, not open issues.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::project::ProjectId;
use super::story::StoryId;

/// Stable identifier for a defect.
pub type DefectId = Uuid;

/// Rule family that produced a defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    WellFormed,
    Atomic,
    Unique,
    Minimal,
    Uniform,
}

impl DefectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WellFormed => "well_formed",
            Self::Atomic => "atomic",
            Self::Unique => "unique",
            Self::Minimal => "minimal",
            Self::Uniform => "uniform",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "well_formed" => Some(Self::WellFormed),
            "atomic" => Some(Self::Atomic),
            "unique" => Some(Self::Unique),
            "minimal" => Some(Self::Minimal),
            "uniform" => Some(Self::Uniform),
            _ => None,
        }
    }
}

impl Display for DefectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specific rule inside a defect family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectSubkind {
    NoMeans,
    NoRole,
    NoMeansComma,
    NoEndsComma,
    Conjunctions,
    Identical,
    Punctuation,
    Brackets,
    Uniform,
}

impl DefectSubkind {
    /// Rule family this subkind belongs to.
    pub fn kind(self) -> DefectKind {
        match self {
            Self::NoMeans | Self::NoRole | Self::NoMeansComma | Self::NoEndsComma => {
                DefectKind::WellFormed
            }
            Self::Conjunctions => DefectKind::Atomic,
            Self::Identical => DefectKind::Unique,
            Self::Punctuation | Self::Brackets => DefectKind::Minimal,
            Self::Uniform => DefectKind::Uniform,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoMeans => "no_means",
            Self::NoRole => "no_role",
            Self::NoMeansComma => "no_means_comma",
            Self::NoEndsComma => "no_ends_comma",
            Self::Conjunctions => "conjunctions",
            Self::Identical => "identical",
            Self::Punctuation => "punctuation",
            Self::Brackets => "brackets",
            Self::Uniform => "uniform",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_means" => Some(Self::NoMeans),
            "no_role" => Some(Self::NoRole),
            "no_means_comma" => Some(Self::NoMeansComma),
            "no_ends_comma" => Some(Self::NoEndsComma),
            "conjunctions" => Some(Self::Conjunctions),
            "identical" => Some(Self::Identical),
            "punctuation" => Some(Self::Punctuation),
            "brackets" => Some(Self::Brackets),
            "uniform" => Some(Self::Uniform),
            _ => None,
        }
    }
}

impl Display for DefectSubkind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of defect families an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectScope {
    All,
    Kind(DefectKind),
}

impl DefectScope {
    pub fn includes(self, kind: DefectKind) -> bool {
        match self {
            Self::All => true,
            Self::Kind(only) => only == kind,
        }
    }
}

/// How urgently a defect should be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "minor" => Some(Self::Minor),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule output before it is reconciled against persisted defects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectCandidate {
    pub subkind: DefectSubkind,
    pub severity: Severity,
    pub highlight: String,
}

impl DefectCandidate {
    pub fn new(subkind: DefectSubkind, severity: Severity, highlight: impl Into<String>) -> Self {
        Self {
            subkind,
            severity,
            highlight: highlight.into(),
        }
    }

    pub fn kind(&self) -> DefectKind {
        self.subkind.kind()
    }
}

/// Validation errors for persisted defect data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefectValidationError {
    KindMismatch {
        kind: DefectKind,
        subkind: DefectSubkind,
    },
    EmptyHighlight,
}

impl Display for DefectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindMismatch { kind, subkind } => {
                write!(f, "subkind `{subkind}` does not belong to kind `{kind}`")
            }
            Self::EmptyHighlight => write!(f, "defect highlight cannot be empty"),
        }
    }
}

impl Error for DefectValidationError {}

/// Persisted quality defect attached to a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub uuid: DefectId,
    pub story_uuid: StoryId,
    pub project_uuid: ProjectId,
    pub kind: DefectKind,
    pub subkind: DefectSubkind,
    pub severity: Severity,
    /// Story text or explanation with the offending spans marked up.
    pub highlight: String,
    pub false_positive: bool,
}

impl Defect {
    /// Materializes a candidate for the given story.
    pub fn from_candidate(
        candidate: &DefectCandidate,
        story_uuid: StoryId,
        project_uuid: ProjectId,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            story_uuid,
            project_uuid,
            kind: candidate.kind(),
            subkind: candidate.subkind,
            severity: candidate.severity,
            highlight: candidate.highlight.clone(),
            false_positive: false,
        }
    }

    pub fn validate(&self) -> Result<(), DefectValidationError> {
        if self.subkind.kind() != self.kind {
            return Err(DefectValidationError::KindMismatch {
                kind: self.kind,
                subkind: self.subkind,
            });
        }
        if self.highlight.is_empty() {
            return Err(DefectValidationError::EmptyHighlight);
        }
        Ok(())
    }

    /// Returns whether this defect is an open (non-suppressed) issue.
    pub fn is_open(&self) -> bool {
        !self.false_positive
    }
}
