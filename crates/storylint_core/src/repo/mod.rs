//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity.
//! - Isolate SQLite query details from service orchestration.
//! - Apply a computed analysis batch atomically.
//!
//! # Invariants
//! - Write paths validate domain records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use crate::db::DbError;
use crate::model::defect::DefectValidationError;
use crate::model::project::ProjectValidationError;
use crate::model::story::StoryValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod batch_repo;
pub mod defect_repo;
pub mod outbox_repo;
pub mod project_repo;
pub mod story_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for analyzer persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    StoryValidation(StoryValidationError),
    ProjectValidation(ProjectValidationError),
    DefectValidation(DefectValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// Project stories changed after the batch was computed.
    Conflict { project: Uuid },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoryValidation(err) => write!(f, "{err}"),
            Self::ProjectValidation(err) => write!(f, "{err}"),
            Self::DefectValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict { project } => {
                write!(f, "stories of project {project} changed concurrently")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoryValidation(err) => Some(err),
            Self::ProjectValidation(err) => Some(err),
            Self::DefectValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<StoryValidationError> for RepoError {
    fn from(value: StoryValidationError) -> Self {
        Self::StoryValidation(value)
    }
}

impl From<ProjectValidationError> for RepoError {
    fn from(value: ProjectValidationError) -> Self {
        Self::ProjectValidation(value)
    }
}

impl From<DefectValidationError> for RepoError {
    fn from(value: DefectValidationError) -> Self {
        Self::DefectValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed store implementing every repository contract.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
