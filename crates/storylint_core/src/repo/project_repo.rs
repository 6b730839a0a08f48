//! Project repository contract and SQLite implementation.

use super::{parse_uuid, RepoError, RepoResult, SqliteStore};
use crate::model::project::{Project, ProjectFormat, ProjectId};
use rusqlite::{params, Connection, Row};

const PROJECT_SELECT_SQL: &str = "SELECT uuid, name, format FROM projects";

/// Repository interface for projects.
pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    fn update_project_format(&self, id: ProjectId, format: &ProjectFormat) -> RepoResult<()>;
    /// Deletes a project with its stories and defects.
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

impl ProjectRepository for SqliteStore<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;
        self.conn.execute(
            "INSERT INTO projects (uuid, name, format) VALUES (?1, ?2, ?3);",
            params![
                project.uuid.to_string(),
                project.name.as_str(),
                project.format.to_string(),
            ],
        )?;
        Ok(project.uuid)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn update_project_format(&self, id: ProjectId, format: &ProjectFormat) -> RepoResult<()> {
        update_format(self.conn, id, format)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "project",
                id,
            });
        }
        Ok(())
    }
}

pub(crate) fn update_format(
    conn: &Connection,
    id: ProjectId,
    format: &ProjectFormat,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE projects SET format = ?2 WHERE uuid = ?1;",
        params![id.to_string(), format.to_string()],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "project",
            id,
        });
    }
    Ok(())
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    let format_text: String = row.get("format")?;
    let project = Project {
        uuid: parse_uuid(&uuid_text, "projects.uuid")?,
        name: row.get("name")?,
        format: ProjectFormat::parse(&format_text),
    };
    project.validate()?;
    Ok(project)
}
