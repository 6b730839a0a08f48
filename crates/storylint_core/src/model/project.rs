//! Project domain model and format template.
//!
//! # Responsibility
//! - Define the project record that owns stories and defects.
//! - Represent the canonical story template derived by format consensus.
//!
//! # Invariants
//! - `format` is only replaced by format consensus, never hand-edited.
//! - A format always has exactly three positions (role, means, ends).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::story::ChunkKind;

/// Stable identifier for a project.
pub type ProjectId = Uuid;

/// Template used before any consensus has been computed.
pub const DEFAULT_FORMAT: &str = "As a,I'm able to,So that";

/// Ordered triple of indicator phrases, one per chunk kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFormat {
    phrases: [String; 3],
}

impl ProjectFormat {
    /// Builds a format from the three template phrases.
    pub fn new(
        role: impl Into<String>,
        means: impl Into<String>,
        ends: impl Into<String>,
    ) -> Self {
        Self {
            phrases: [
                role.into().trim().to_string(),
                means.into().trim().to_string(),
                ends.into().trim().to_string(),
            ],
        }
    }

    /// Parses a comma-separated template.
    ///
    /// Missing positions fall back to the default template phrase.
    pub fn parse(value: &str) -> Self {
        let defaults = default_phrases();
        let mut parts = value.split(',').map(str::trim);
        let mut phrase_at = |index: usize| match parts.next() {
            Some(part) if !part.is_empty() => part.to_string(),
            _ => defaults[index].to_string(),
        };
        let role = phrase_at(0);
        let means = phrase_at(1);
        let ends = phrase_at(2);
        Self {
            phrases: [role, means, ends],
        }
    }

    /// Returns the template phrase for `kind`.
    pub fn phrase(&self, kind: ChunkKind) -> &str {
        self.phrases[kind.position()].as_str()
    }
}

impl Default for ProjectFormat {
    fn default() -> Self {
        Self::parse(DEFAULT_FORMAT)
    }
}

impl Display for ProjectFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.phrases.join(", "))
    }
}

fn default_phrases() -> [&'static str; 3] {
    let mut parts = DEFAULT_FORMAT.split(',');
    [
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    ]
}

/// Validation errors for project invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectValidationError {
    EmptyName,
}

impl Display for ProjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "project name cannot be empty"),
        }
    }
}

impl Error for ProjectValidationError {}

/// Project record owning stories and their defects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: ProjectId,
    pub name: String,
    pub format: ProjectFormat,
}

impl Project {
    /// Creates a project with the default format template.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            format: ProjectFormat::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProjectValidationError::EmptyName);
        }
        Ok(())
    }
}
