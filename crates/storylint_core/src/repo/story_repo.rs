//! Story repository contract and SQLite implementation.
//!
//! # Invariants
//! - Stories list in insertion order; consensus tie-breaking relies on it.
//! - Identical-story lookups compare text byte for byte and never return
//!   the queried story itself.

use super::{parse_uuid, RepoError, RepoResult, SqliteStore};
use crate::model::project::ProjectId;
use crate::model::story::{Chunks, Story, StoryId};
use rusqlite::{params, Connection, Row};

const STORY_SELECT_SQL: &str = "SELECT
    uuid,
    project_uuid,
    text,
    role,
    means,
    ends,
    external_ref
FROM stories";

/// Repository interface for stories.
pub trait StoryRepository {
    fn create_story(&self, story: &Story) -> RepoResult<StoryId>;
    /// Replaces text and chunks of an existing story.
    fn update_story(&self, story: &Story) -> RepoResult<()>;
    fn get_story(&self, id: StoryId) -> RepoResult<Option<Story>>;
    /// Stories of a project in insertion order.
    fn list_stories(&self, project: ProjectId) -> RepoResult<Vec<Story>>;
    /// Stories of the same project with byte-identical text, excluding `story`.
    fn find_identical_stories(&self, story: &Story) -> RepoResult<Vec<StoryId>>;
    fn count_stories(&self, project: ProjectId) -> RepoResult<usize>;
}

impl StoryRepository for SqliteStore<'_> {
    fn create_story(&self, story: &Story) -> RepoResult<StoryId> {
        insert_story(self.conn, story)
    }

    fn update_story(&self, story: &Story) -> RepoResult<()> {
        update_story_row(self.conn, story)
    }

    fn get_story(&self, id: StoryId) -> RepoResult<Option<Story>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STORY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_story_row(row)?));
        }
        Ok(None)
    }

    fn list_stories(&self, project: ProjectId) -> RepoResult<Vec<Story>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STORY_SELECT_SQL} WHERE project_uuid = ?1 ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([project.to_string()])?;
        let mut stories = Vec::new();
        while let Some(row) = rows.next()? {
            stories.push(parse_story_row(row)?);
        }
        Ok(stories)
    }

    fn find_identical_stories(&self, story: &Story) -> RepoResult<Vec<StoryId>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid
             FROM stories
             WHERE project_uuid = ?1
               AND text = ?2
               AND uuid <> ?3
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query(params![
            story.project_uuid.to_string(),
            story.text.as_str(),
            story.uuid.to_string(),
        ])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            ids.push(parse_uuid(&uuid_text, "stories.uuid")?);
        }
        Ok(ids)
    }

    fn count_stories(&self, project: ProjectId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stories WHERE project_uuid = ?1;",
            [project.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative story count `{count}`")))
    }
}

pub(crate) fn insert_story(conn: &Connection, story: &Story) -> RepoResult<StoryId> {
    story.validate()?;
    conn.execute(
        "INSERT INTO stories (
            uuid,
            project_uuid,
            text,
            role,
            means,
            ends,
            external_ref
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            story.uuid.to_string(),
            story.project_uuid.to_string(),
            story.text.as_str(),
            story.chunks.role.as_deref(),
            story.chunks.means.as_deref(),
            story.chunks.ends.as_deref(),
            story.external_ref.as_deref(),
        ],
    )?;
    Ok(story.uuid)
}

pub(crate) fn update_story_row(conn: &Connection, story: &Story) -> RepoResult<()> {
    story.validate()?;
    let changed = conn.execute(
        "UPDATE stories
         SET
            text = ?2,
            role = ?3,
            means = ?4,
            ends = ?5,
            external_ref = ?6,
            updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
         WHERE uuid = ?1;",
        params![
            story.uuid.to_string(),
            story.text.as_str(),
            story.chunks.role.as_deref(),
            story.chunks.means.as_deref(),
            story.chunks.ends.as_deref(),
            story.external_ref.as_deref(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "story",
            id: story.uuid,
        });
    }
    Ok(())
}

pub(crate) fn delete_story_row(conn: &Connection, id: StoryId) -> RepoResult<()> {
    let changed = conn.execute("DELETE FROM stories WHERE uuid = ?1;", [id.to_string()])?;
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "story", id });
    }
    Ok(())
}

/// (uuid, text) of a project's stories in insertion order.
pub(crate) fn story_texts(conn: &Connection, project: ProjectId) -> RepoResult<Vec<(StoryId, String)>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, text FROM stories WHERE project_uuid = ?1 ORDER BY rowid ASC;",
    )?;
    let mut rows = stmt.query([project.to_string()])?;
    let mut texts = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get(0)?;
        texts.push((parse_uuid(&uuid_text, "stories.uuid")?, row.get(1)?));
    }
    Ok(texts)
}

fn parse_story_row(row: &Row<'_>) -> RepoResult<Story> {
    let uuid_text: String = row.get("uuid")?;
    let project_text: String = row.get("project_uuid")?;
    let story = Story {
        uuid: parse_uuid(&uuid_text, "stories.uuid")?,
        project_uuid: parse_uuid(&project_text, "stories.project_uuid")?,
        text: row.get("text")?,
        chunks: Chunks {
            role: row.get("role")?,
            means: row.get("means")?,
            ends: row.get("ends")?,
        },
        external_ref: row.get("external_ref")?,
    };
    story.validate()?;
    Ok(story)
}
