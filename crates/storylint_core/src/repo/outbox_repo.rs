//! Outbound integration events.
//!
//! # Responsibility
//! - Queue events in the same transaction as the change they describe.
//! - Hand pending events to a dispatcher in sequence order.
//!
//! # Invariants
//! - Events are delivered at least once; `delivered_at` is set only after a
//!   sink accepted the event.

use super::{parse_uuid, RepoError, RepoResult, SqliteStore};
use crate::model::project::ProjectId;
use crate::model::story::StoryId;
use rusqlite::{params, Connection, Row};

/// Kind of outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxEventType {
    DefectsChanged,
    StoryDeleted,
}

impl OutboxEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefectsChanged => "defects_changed",
            Self::StoryDeleted => "story_deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "defects_changed" => Some(Self::DefectsChanged),
            "story_deleted" => Some(Self::StoryDeleted),
            _ => None,
        }
    }
}

/// Event about to be queued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEvent {
    pub event_type: OutboxEventType,
    pub story_uuid: StoryId,
    pub project_uuid: ProjectId,
    pub external_ref: Option<String>,
    pub payload: serde_json::Value,
}

/// Queued event.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Monotonic sequence id.
    pub id: i64,
    pub event_type: OutboxEventType,
    pub story_uuid: StoryId,
    pub project_uuid: ProjectId,
    pub external_ref: Option<String>,
    pub payload: serde_json::Value,
    /// Delivery time in epoch milliseconds; `None` while pending.
    pub delivered_at: Option<i64>,
}

/// Repository interface for the event outbox.
pub trait OutboxRepository {
    /// Oldest undelivered events first.
    fn pending_events(&self, limit: u32) -> RepoResult<Vec<OutboxEvent>>;
    fn mark_delivered(&self, id: i64) -> RepoResult<()>;
}

impl OutboxRepository for SqliteStore<'_> {
    fn pending_events(&self, limit: u32) -> RepoResult<Vec<OutboxEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, story_uuid, project_uuid, external_ref, payload, delivered_at
             FROM outbox_events
             WHERE delivered_at IS NULL
             ORDER BY id ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn mark_delivered(&self, id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE outbox_events
             SET delivered_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
             WHERE id = ?1
               AND delivered_at IS NULL;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "outbox event {id} is missing or already delivered"
            )));
        }
        Ok(())
    }
}

pub(crate) fn enqueue_event(conn: &Connection, event: &NewOutboxEvent) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO outbox_events (
            event_type,
            story_uuid,
            project_uuid,
            external_ref,
            payload
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            event.event_type.as_str(),
            event.story_uuid.to_string(),
            event.project_uuid.to_string(),
            event.external_ref.as_deref(),
            event.payload.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<OutboxEvent> {
    let type_text: String = row.get("event_type")?;
    let event_type = OutboxEventType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid event type `{type_text}` in outbox_events.event_type"
        ))
    })?;
    let story_text: String = row.get("story_uuid")?;
    let project_text: String = row.get("project_uuid")?;
    let payload_text: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in outbox_events.payload: {err}"))
    })?;

    Ok(OutboxEvent {
        id: row.get("id")?,
        event_type,
        story_uuid: parse_uuid(&story_text, "outbox_events.story_uuid")?,
        project_uuid: parse_uuid(&project_text, "outbox_events.project_uuid")?,
        external_ref: row.get("external_ref")?,
        payload,
        delivered_at: row.get("delivered_at")?,
    })
}
