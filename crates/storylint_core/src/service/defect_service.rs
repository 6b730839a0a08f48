//! Defect review use-case service.
//!
//! # Responsibility
//! - Mark and unmark false positives.
//! - Provide defect queries and the per-project severity report.
//!
//! # Invariants
//! - Report counts cover open defects only; false positives are counted
//!   separately.

use crate::model::defect::{Defect, DefectId, Severity};
use crate::model::project::ProjectId;
use crate::model::story::StoryId;
use crate::repo::defect_repo::{DefectQuery, DefectRepository};
use crate::repo::story_repo::StoryRepository;
use crate::repo::RepoError;
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for defect use-cases.
#[derive(Debug)]
pub enum DefectServiceError {
    DefectNotFound(DefectId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for DefectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefectNotFound(id) => write!(f, "defect not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent defect state: {details}"),
        }
    }
}

impl Error for DefectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DefectServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "defect",
                id,
            } => Self::DefectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Defect summary of one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub high: usize,
    pub medium: usize,
    pub minor: usize,
    pub false_positives: usize,
    pub stories: usize,
    /// Stories without any open defect.
    pub perfect_stories: usize,
}

impl ProjectReport {
    pub fn open_defects(&self) -> usize {
        self.high + self.medium + self.minor
    }
}

/// Defect service facade over repository implementations.
pub struct DefectService<R: DefectRepository + StoryRepository> {
    repo: R,
}

impl<R: DefectRepository + StoryRepository> DefectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Flags or unflags a defect as false positive.
    ///
    /// A false positive keeps suppressing regenerated candidates of its
    /// subkind until the rule stops firing for the story.
    pub fn mark_false_positive(
        &self,
        id: DefectId,
        false_positive: bool,
    ) -> Result<Defect, DefectServiceError> {
        self.repo.set_false_positive(id, false_positive)?;
        info!("event=defect_false_positive module=service status=ok defect={id} value={false_positive}");
        self.repo
            .get_defect(id)?
            .ok_or(DefectServiceError::InconsistentState(
                "updated defect not found in read-back",
            ))
    }

    pub fn get_defect(&self, id: DefectId) -> Result<Defect, DefectServiceError> {
        self.repo
            .get_defect(id)?
            .ok_or(DefectServiceError::DefectNotFound(id))
    }

    pub fn list_defects(&self, query: &DefectQuery) -> Result<Vec<Defect>, DefectServiceError> {
        Ok(self.repo.list_defects(query)?)
    }

    /// Open defects of one story.
    pub fn story_defects(&self, story: StoryId) -> Result<Vec<Defect>, DefectServiceError> {
        self.list_defects(&DefectQuery::open_for_story(story))
    }

    pub fn project_report(&self, project: ProjectId) -> Result<ProjectReport, DefectServiceError> {
        let defects = self.repo.list_defects(&DefectQuery {
            project: Some(project),
            ..DefectQuery::default()
        })?;
        let stories = self.repo.count_stories(project)?;

        let mut report = ProjectReport {
            stories,
            ..ProjectReport::default()
        };
        let mut flawed: HashSet<StoryId> = HashSet::new();
        for defect in &defects {
            if defect.false_positive {
                report.false_positives += 1;
                continue;
            }
            flawed.insert(defect.story_uuid);
            match defect.severity {
                Severity::High => report.high += 1,
                Severity::Medium => report.medium += 1,
                Severity::Minor => report.minor += 1,
            }
        }
        report.perfect_stories = stories.saturating_sub(flawed.len());
        Ok(report)
    }
}
