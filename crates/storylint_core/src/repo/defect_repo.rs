//! Defect repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist rule candidates without duplicating open defects.
//! - Keep false-positive suppression records consistent with regenerated
//!   candidates.
//!
//! # Invariants
//! - Per story, at most one open (non-false-positive) defect exists per
//!   (kind, subkind).
//! - A false positive survives only while its (kind, subkind) is still
//!   being regenerated for the story.

use super::{bool_to_int, int_to_bool, parse_uuid, RepoError, RepoResult, SqliteStore};
use crate::model::defect::{
    Defect, DefectId, DefectKind, DefectScope, DefectSubkind, Severity,
};
use crate::model::project::ProjectId;
use crate::model::story::StoryId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const DEFECT_SELECT_SQL: &str = "SELECT
    uuid,
    story_uuid,
    project_uuid,
    kind,
    subkind,
    severity,
    highlight,
    false_positive
FROM defects";

/// Result of a duplicate-aware defect insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new open defect row was written.
    Created(DefectId),
    /// An identical open defect already existed; nothing changed.
    Duplicate(DefectId),
    /// The open defect of the same (kind, subkind) got the new highlight
    /// and severity.
    Replaced(DefectId),
}

impl CreateOutcome {
    pub fn defect_id(self) -> DefectId {
        match self {
            Self::Created(id) | Self::Duplicate(id) | Self::Replaced(id) => id,
        }
    }

    pub fn changed(self) -> bool {
        !matches!(self, Self::Duplicate(_))
    }
}

/// Filters for listing defects. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct DefectQuery {
    pub story: Option<StoryId>,
    pub project: Option<ProjectId>,
    pub kind: Option<DefectKind>,
    pub subkind: Option<DefectSubkind>,
    pub severity: Option<Severity>,
    pub false_positive: Option<bool>,
}

impl DefectQuery {
    /// Open defects of one story.
    pub fn open_for_story(story: StoryId) -> Self {
        Self {
            story: Some(story),
            false_positive: Some(false),
            ..Self::default()
        }
    }

    /// Open defects of one kind across a project.
    pub fn open_of_kind(project: ProjectId, kind: DefectKind) -> Self {
        Self {
            project: Some(project),
            kind: Some(kind),
            false_positive: Some(false),
            ..Self::default()
        }
    }
}

/// Repository interface for defects.
pub trait DefectRepository {
    fn create_unless_duplicate(&self, defect: &Defect) -> RepoResult<CreateOutcome>;
    fn get_defect(&self, id: DefectId) -> RepoResult<Option<Defect>>;
    fn list_defects(&self, query: &DefectQuery) -> RepoResult<Vec<Defect>>;
    fn set_false_positive(&self, id: DefectId, false_positive: bool) -> RepoResult<()>;
    fn delete_defect(&self, id: DefectId) -> RepoResult<()>;
    /// Reconciles every false positive of `story` against open defects.
    ///
    /// Returns the number of deleted rows.
    fn remove_duplicates_of_false_positives(&self, story: StoryId) -> RepoResult<usize>;
}

impl DefectRepository for SqliteStore<'_> {
    fn create_unless_duplicate(&self, defect: &Defect) -> RepoResult<CreateOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = create_unless_duplicate_in(&tx, defect)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn get_defect(&self, id: DefectId) -> RepoResult<Option<Defect>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEFECT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_defect_row(row)?));
        }
        Ok(None)
    }

    fn list_defects(&self, query: &DefectQuery) -> RepoResult<Vec<Defect>> {
        list_defects_in(self.conn, query)
    }

    fn set_false_positive(&self, id: DefectId, false_positive: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE defects SET false_positive = ?2 WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(false_positive)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "defect",
                id,
            });
        }
        Ok(())
    }

    fn delete_defect(&self, id: DefectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM defects WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "defect",
                id,
            });
        }
        Ok(())
    }

    fn remove_duplicates_of_false_positives(&self, story: StoryId) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let removed = reconcile_false_positives(&tx, story, DefectScope::All)?;
        tx.commit()?;
        Ok(removed)
    }
}

pub(crate) fn create_unless_duplicate_in(
    conn: &Connection,
    defect: &Defect,
) -> RepoResult<CreateOutcome> {
    defect.validate()?;
    let existing = list_defects_in(
        conn,
        &DefectQuery {
            story: Some(defect.story_uuid),
            kind: Some(defect.kind),
            subkind: Some(defect.subkind),
            false_positive: Some(false),
            ..DefectQuery::default()
        },
    )?;

    if let Some(current) = existing.first() {
        if current.highlight == defect.highlight && current.severity == defect.severity {
            return Ok(CreateOutcome::Duplicate(current.uuid));
        }
        conn.execute(
            "UPDATE defects SET highlight = ?2, severity = ?3 WHERE uuid = ?1;",
            params![
                current.uuid.to_string(),
                defect.highlight.as_str(),
                defect.severity.as_str(),
            ],
        )?;
        return Ok(CreateOutcome::Replaced(current.uuid));
    }

    conn.execute(
        "INSERT INTO defects (
            uuid,
            story_uuid,
            project_uuid,
            kind,
            subkind,
            severity,
            highlight,
            false_positive
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            defect.uuid.to_string(),
            defect.story_uuid.to_string(),
            defect.project_uuid.to_string(),
            defect.kind.as_str(),
            defect.subkind.as_str(),
            defect.severity.as_str(),
            defect.highlight.as_str(),
            bool_to_int(defect.false_positive),
        ],
    )?;
    Ok(CreateOutcome::Created(defect.uuid))
}

pub(crate) fn list_defects_in(conn: &Connection, query: &DefectQuery) -> RepoResult<Vec<Defect>> {
    let mut sql = format!("{DEFECT_SELECT_SQL} WHERE 1 = 1");
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some(story) = query.story {
        sql.push_str(" AND story_uuid = ?");
        bind_values.push(Value::Text(story.to_string()));
    }
    if let Some(project) = query.project {
        sql.push_str(" AND project_uuid = ?");
        bind_values.push(Value::Text(project.to_string()));
    }
    if let Some(kind) = query.kind {
        sql.push_str(" AND kind = ?");
        bind_values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(subkind) = query.subkind {
        sql.push_str(" AND subkind = ?");
        bind_values.push(Value::Text(subkind.as_str().to_string()));
    }
    if let Some(severity) = query.severity {
        sql.push_str(" AND severity = ?");
        bind_values.push(Value::Text(severity.as_str().to_string()));
    }
    if let Some(false_positive) = query.false_positive {
        sql.push_str(" AND false_positive = ?");
        bind_values.push(Value::Integer(bool_to_int(false_positive)));
    }
    sql.push_str(" ORDER BY rowid ASC");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut defects = Vec::new();
    while let Some(row) = rows.next()? {
        defects.push(parse_defect_row(row)?);
    }
    Ok(defects)
}

/// Deletes open defects of `story` within `scope`.
pub(crate) fn delete_open_defects(
    conn: &Connection,
    story: StoryId,
    scope: DefectScope,
) -> RepoResult<usize> {
    let deleted = match scope {
        DefectScope::All => conn.execute(
            "DELETE FROM defects WHERE story_uuid = ?1 AND false_positive = 0;",
            [story.to_string()],
        )?,
        DefectScope::Kind(kind) => conn.execute(
            "DELETE FROM defects
             WHERE story_uuid = ?1
               AND kind = ?2
               AND false_positive = 0;",
            params![story.to_string(), kind.as_str()],
        )?,
    };
    Ok(deleted)
}

/// For each false positive of `story` within `scope`: open defects of the
/// same (kind, subkind) are suppressed regenerations and get deleted; when
/// there are none the false positive no longer reproduces and is purged.
pub(crate) fn reconcile_false_positives(
    conn: &Connection,
    story: StoryId,
    scope: DefectScope,
) -> RepoResult<usize> {
    let false_positives = list_defects_in(
        conn,
        &DefectQuery {
            story: Some(story),
            false_positive: Some(true),
            ..DefectQuery::default()
        },
    )?;

    let mut removed = 0;
    for suppression in false_positives
        .iter()
        .filter(|defect| scope.includes(defect.kind))
    {
        let regenerated = conn.execute(
            "DELETE FROM defects
             WHERE story_uuid = ?1
               AND kind = ?2
               AND subkind = ?3
               AND false_positive = 0;",
            params![
                story.to_string(),
                suppression.kind.as_str(),
                suppression.subkind.as_str(),
            ],
        )?;
        if regenerated == 0 {
            removed += conn.execute(
                "DELETE FROM defects WHERE uuid = ?1;",
                [suppression.uuid.to_string()],
            )?;
        } else {
            removed += regenerated;
        }
    }
    Ok(removed)
}

fn parse_defect_row(row: &Row<'_>) -> RepoResult<Defect> {
    let uuid_text: String = row.get("uuid")?;
    let story_text: String = row.get("story_uuid")?;
    let project_text: String = row.get("project_uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = DefectKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid defect kind `{kind_text}` in defects.kind"))
    })?;
    let subkind_text: String = row.get("subkind")?;
    let subkind = DefectSubkind::parse(&subkind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid defect subkind `{subkind_text}` in defects.subkind"
        ))
    })?;
    let severity_text: String = row.get("severity")?;
    let severity = Severity::parse(&severity_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid severity `{severity_text}` in defects.severity"
        ))
    })?;

    let defect = Defect {
        uuid: parse_uuid(&uuid_text, "defects.uuid")?,
        story_uuid: parse_uuid(&story_text, "defects.story_uuid")?,
        project_uuid: parse_uuid(&project_text, "defects.project_uuid")?,
        kind,
        subkind,
        severity,
        highlight: row.get("highlight")?,
        false_positive: int_to_bool(row.get("false_positive")?, "defects.false_positive")?,
    };
    defect.validate()?;
    Ok(defect)
}
