//! Atomic application of computed analysis results.
//!
//! # Responsibility
//! - Apply one story change, a project format update and per-story defect
//!   plans in a single `IMMEDIATE` transaction.
//! - Queue outbound events for every story whose open defects changed.
//!
//! # Invariants
//! - Either the whole batch commits or nothing does.
//! - Candidates are computed before the batch is applied; nothing here
//!   calls the tagger.
//! - A batch carrying a story snapshot only commits when the project's
//!   stories still match it inside the transaction.

use super::defect_repo::{
    create_unless_duplicate_in, delete_open_defects, list_defects_in, reconcile_false_positives,
    CreateOutcome, DefectQuery,
};
use super::outbox_repo::{enqueue_event, NewOutboxEvent, OutboxEventType};
use super::project_repo::update_format;
use super::story_repo::{delete_story_row, insert_story, story_texts, update_story_row};
use super::{RepoError, RepoResult, SqliteStore};
use crate::model::defect::{Defect, DefectCandidate, DefectScope};
use crate::model::project::{ProjectFormat, ProjectId};
use crate::model::story::{Story, StoryId};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::json;

/// Story row mutation carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryChange {
    Insert(Story),
    Update(Story),
    Delete(Story),
}

/// Defect changes for one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDefectPlan {
    pub story_uuid: StoryId,
    pub project_uuid: ProjectId,
    pub external_ref: Option<String>,
    /// Delete open defects in `scope` before writing candidates.
    pub reset: bool,
    /// Rule families the candidates were computed for.
    pub scope: DefectScope,
    pub candidates: Vec<DefectCandidate>,
}

impl StoryDefectPlan {
    pub fn for_story(story: &Story, reset: bool, scope: DefectScope) -> Self {
        Self {
            story_uuid: story.uuid,
            project_uuid: story.project_uuid,
            external_ref: story.external_ref.clone(),
            reset,
            scope,
            candidates: Vec::new(),
        }
    }
}

/// Project stories the batch was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySnapshot {
    pub project: ProjectId,
    /// (uuid, text) in insertion order.
    pub stories: Vec<(StoryId, String)>,
}

impl StorySnapshot {
    pub fn of(project: ProjectId, stories: &[Story]) -> Self {
        Self {
            project,
            stories: stories
                .iter()
                .map(|story| (story.uuid, story.text.clone()))
                .collect(),
        }
    }
}

/// Everything one analysis call writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisBatch {
    /// Checked before any write; a mismatch aborts with `RepoError::Conflict`.
    pub snapshot: Option<StorySnapshot>,
    pub story_change: Option<StoryChange>,
    pub format: Option<(ProjectId, ProjectFormat)>,
    pub plans: Vec<StoryDefectPlan>,
}

/// Row counts written by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub created: usize,
    pub replaced: usize,
    pub duplicates: usize,
    pub removed: usize,
    pub events: usize,
}

/// Repository interface for atomic analysis writes.
pub trait BatchRepository {
    fn apply_analysis(&self, batch: &AnalysisBatch) -> RepoResult<BatchSummary>;
}

impl BatchRepository for SqliteStore<'_> {
    fn apply_analysis(&self, batch: &AnalysisBatch) -> RepoResult<BatchSummary> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut summary = BatchSummary::default();

        if let Some(snapshot) = &batch.snapshot {
            if story_texts(&tx, snapshot.project)? != snapshot.stories {
                warn!(
                    "event=analysis_apply module=repo status=conflict project={}",
                    snapshot.project
                );
                return Err(RepoError::Conflict {
                    project: snapshot.project,
                });
            }
        }

        match &batch.story_change {
            Some(StoryChange::Insert(story)) => {
                insert_story(&tx, story)?;
            }
            Some(StoryChange::Update(story)) => update_story_row(&tx, story)?,
            Some(StoryChange::Delete(story)) => {
                delete_story_row(&tx, story.uuid)?;
                enqueue_event(
                    &tx,
                    &NewOutboxEvent {
                        event_type: OutboxEventType::StoryDeleted,
                        story_uuid: story.uuid,
                        project_uuid: story.project_uuid,
                        external_ref: story.external_ref.clone(),
                        payload: json!({ "story_uuid": story.uuid.to_string() }),
                    },
                )?;
                summary.events += 1;
            }
            None => {}
        }

        if let Some((project, format)) = &batch.format {
            update_format(&tx, *project, format)?;
        }

        for plan in &batch.plans {
            apply_plan(&tx, plan, &mut summary)?;
        }

        tx.commit()?;
        info!(
            "event=analysis_apply module=repo status=ok plans={} created={} replaced={} duplicates={} removed={} events={}",
            batch.plans.len(),
            summary.created,
            summary.replaced,
            summary.duplicates,
            summary.removed,
            summary.events
        );
        Ok(summary)
    }
}

fn apply_plan(
    conn: &Connection,
    plan: &StoryDefectPlan,
    summary: &mut BatchSummary,
) -> RepoResult<()> {
    let before = open_defect_keys(conn, plan.story_uuid)?;

    if plan.reset {
        summary.removed += delete_open_defects(conn, plan.story_uuid, plan.scope)?;
    }
    for candidate in &plan.candidates {
        let defect = Defect::from_candidate(candidate, plan.story_uuid, plan.project_uuid);
        match create_unless_duplicate_in(conn, &defect)? {
            CreateOutcome::Created(_) => summary.created += 1,
            CreateOutcome::Replaced(_) => summary.replaced += 1,
            CreateOutcome::Duplicate(_) => summary.duplicates += 1,
        }
    }
    summary.removed += reconcile_false_positives(conn, plan.story_uuid, plan.scope)?;

    let after = open_defect_keys(conn, plan.story_uuid)?;
    if before != after {
        let defects: Vec<serde_json::Value> = after
            .iter()
            .map(|(kind, subkind, severity, _)| {
                json!({ "kind": kind, "subkind": subkind, "severity": severity })
            })
            .collect();
        enqueue_event(
            conn,
            &NewOutboxEvent {
                event_type: OutboxEventType::DefectsChanged,
                story_uuid: plan.story_uuid,
                project_uuid: plan.project_uuid,
                external_ref: plan.external_ref.clone(),
                payload: json!({
                    "story_uuid": plan.story_uuid.to_string(),
                    "open_defects": defects,
                }),
            },
        )?;
        summary.events += 1;
    }
    Ok(())
}

type DefectKey = (&'static str, &'static str, &'static str, String);

/// Sorted (kind, subkind, severity, highlight) of the story's open defects.
fn open_defect_keys(conn: &Connection, story: StoryId) -> RepoResult<Vec<DefectKey>> {
    let mut keys: Vec<DefectKey> = list_defects_in(conn, &DefectQuery::open_for_story(story))?
        .into_iter()
        .map(|defect| {
            (
                defect.kind.as_str(),
                defect.subkind.as_str(),
                defect.severity.as_str(),
                defect.highlight,
            )
        })
        .collect();
    keys.sort();
    Ok(keys)
}
