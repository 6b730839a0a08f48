//! Project use-case service.
//!
//! # Responsibility
//! - Create, read, list and delete projects.
//!
//! # Invariants
//! - New projects start with the default format template.
//! - Deleting a project removes its stories and defects.

use crate::model::project::{Project, ProjectId};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for project use-cases.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Target project does not exist.
    ProjectNotFound(ProjectId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent project state: {details}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProjectServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "project",
                id,
            } => Self::ProjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Project service facade over repository implementations.
pub struct ProjectService<R: ProjectRepository> {
    repo: R,
}

impl<R: ProjectRepository> ProjectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_project(&self, name: impl Into<String>) -> Result<Project, ProjectServiceError> {
        let project = Project::new(name);
        let id = self.repo.create_project(&project)?;
        info!("event=project_create module=service status=ok project={id}");
        self.repo
            .get_project(id)?
            .ok_or(ProjectServiceError::InconsistentState(
                "created project not found in read-back",
            ))
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_project(id)?
            .ok_or(ProjectServiceError::ProjectNotFound(id))
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, ProjectServiceError> {
        Ok(self.repo.list_projects()?)
    }

    pub fn delete_project(&self, id: ProjectId) -> Result<(), ProjectServiceError> {
        self.repo.delete_project(id)?;
        info!("event=project_delete module=service status=ok project={id}");
        Ok(())
    }
}
