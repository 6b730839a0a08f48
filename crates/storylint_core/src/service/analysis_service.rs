//! Story lifecycle and analysis use-case service.
//!
//! # Responsibility
//! - Chunk stories on creation and edit.
//! - Evaluate defect rules and persist the results with the identical-story
//!   cascade.
//! - Recompute the project format before project-wide analysis.
//! - Apply automatic corrections for missing-comma defects.
//!
//! # Invariants
//! - Every call computes its candidates first and then writes them in one
//!   batch; a tagger failure leaves storage untouched.
//! - The identical cascade collects its targets before iterating and never
//!   revisits the origin story.
//! - Cascade targets only get their `unique` defects regenerated.
//! - Project stories are read before the write transaction opens; each
//!   batch carries a snapshot of them and is rejected as a retryable
//!   `Conflict` when another writer changed them in between.

use crate::analysis::rules::ProjectFacts;
use crate::analysis::tagger::TaggerError;
use crate::analysis::Analyzer;
use crate::model::defect::{
    DefectCandidate, DefectId, DefectKind, DefectScope, DefectSubkind, Severity,
};
use crate::model::project::{Project, ProjectFormat, ProjectId};
use crate::model::story::{ChunkKind, Chunks, Story, StoryId, StoryValidationError};
use crate::repo::batch_repo::{
    AnalysisBatch, BatchRepository, BatchSummary, StoryChange, StoryDefectPlan, StorySnapshot,
};
use crate::repo::defect_repo::{DefectQuery, DefectRepository};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::story_repo::StoryRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage capabilities the analysis service needs.
pub trait AnalysisStore:
    ProjectRepository + StoryRepository + DefectRepository + BatchRepository
{
}

impl<T> AnalysisStore for T where
    T: ProjectRepository + StoryRepository + DefectRepository + BatchRepository
{
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Service error for analysis use-cases.
#[derive(Debug)]
pub enum AnalysisError {
    /// Tagging failed; nothing was written.
    Tagger(TaggerError),
    /// Story input is invalid.
    InvalidStory(StoryValidationError),
    ProjectNotFound(ProjectId),
    StoryNotFound(StoryId),
    DefectNotFound(DefectId),
    /// Only missing-comma defects can be corrected automatically.
    NotCorrectable(DefectSubkind),
    /// Project stories changed while the batch was computed; nothing was written.
    Conflict(ProjectId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl AnalysisError {
    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Tagger(err) => err.is_retryable(),
            Self::Conflict(_) => true,
            _ => false,
        }
    }
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tagger(err) => write!(f, "{err}"),
            Self::InvalidStory(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::StoryNotFound(id) => write!(f, "story not found: {id}"),
            Self::DefectNotFound(id) => write!(f, "defect not found: {id}"),
            Self::NotCorrectable(subkind) => {
                write!(f, "defect `{subkind}` cannot be corrected automatically")
            }
            Self::Conflict(project) => {
                write!(f, "stories of project {project} changed during analysis")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tagger(err) => Some(err),
            Self::InvalidStory(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaggerError> for AnalysisError {
    fn from(value: TaggerError) -> Self {
        Self::Tagger(value)
    }
}

impl From<StoryValidationError> for AnalysisError {
    fn from(value: StoryValidationError) -> Self {
        Self::InvalidStory(value)
    }
}

impl From<RepoError> for AnalysisError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "project", id } => Self::ProjectNotFound(id),
            RepoError::NotFound { entity: "story", id } => Self::StoryNotFound(id),
            RepoError::NotFound { entity: "defect", id } => Self::DefectNotFound(id),
            RepoError::StoryValidation(err) => Self::InvalidStory(err),
            RepoError::Conflict { project } => Self::Conflict(project),
            other => Self::Repo(other),
        }
    }
}

/// Result of a project-wide analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAnalysis {
    /// Format persisted before the rules ran.
    pub format: ProjectFormat,
    pub stories: usize,
    pub summary: BatchSummary,
}

/// Analysis service facade over an analyzer and repository implementations.
pub struct AnalysisService<'a, R: AnalysisStore> {
    repo: R,
    analyzer: &'a Analyzer,
}

impl<'a, R: AnalysisStore> AnalysisService<'a, R> {
    pub fn new(repo: R, analyzer: &'a Analyzer) -> Self {
        Self { repo, analyzer }
    }

    /// Chunks and stores a story without evaluating rules.
    pub fn create_story(
        &self,
        project: ProjectId,
        text: impl Into<String>,
        external_ref: Option<String>,
    ) -> AnalysisResult<Story> {
        let project = self.load_project(project)?;
        let story = self.prepare_story(&project, text.into(), external_ref)?;
        self.repo.apply_analysis(&AnalysisBatch {
            story_change: Some(StoryChange::Insert(story.clone())),
            ..AnalysisBatch::default()
        })?;
        info!(
            "event=story_create module=service status=ok story={} project={}",
            story.uuid, project.uuid
        );
        Ok(story)
    }

    /// Chunks, stores and analyzes a story with the identical cascade.
    pub fn add_story(
        &self,
        project: ProjectId,
        text: impl Into<String>,
        external_ref: Option<String>,
    ) -> AnalysisResult<Story> {
        let project = self.load_project(project)?;
        let story = self.prepare_story(&project, text.into(), external_ref)?;
        let mut stories = self.repo.list_stories(project.uuid)?;
        let snapshot = StorySnapshot::of(project.uuid, &stories);
        stories.push(story.clone());

        let duplicates = identical_ids(&story, &stories);
        let plans = self.plans_for(&story, &stories, &project.format, false, &duplicates)?;
        let summary = self.repo.apply_analysis(&AnalysisBatch {
            snapshot: Some(snapshot),
            story_change: Some(StoryChange::Insert(story.clone())),
            format: None,
            plans,
        })?;
        info!(
            "event=story_add module=service status=ok story={} project={} created={} cascade={}",
            story.uuid,
            project.uuid,
            summary.created,
            duplicates.len()
        );
        Ok(story)
    }

    /// Recomputes and stores the chunks of an existing story.
    pub fn re_chunk(&self, id: StoryId) -> AnalysisResult<Story> {
        let mut story = self.load_story(id)?;
        let chunks = self.chunk(&story)?;
        if chunks != story.chunks {
            story.chunks = chunks;
            self.repo.apply_analysis(&AnalysisBatch {
                story_change: Some(StoryChange::Update(story.clone())),
                ..AnalysisBatch::default()
            })?;
        }
        Ok(story)
    }

    /// Evaluates rules and adds candidates on top of existing defects.
    pub fn analyze(&self, id: StoryId, cascade: bool) -> AnalysisResult<BatchSummary> {
        self.run_story(id, false, cascade)
    }

    /// Replaces all open defects of the story with a fresh evaluation.
    pub fn re_analyze(&self, id: StoryId, cascade: bool) -> AnalysisResult<BatchSummary> {
        self.run_story(id, true, cascade)
    }

    /// Refreshes the project format, then re-analyzes every story against it.
    pub fn analyze_project(&self, id: ProjectId) -> AnalysisResult<ProjectAnalysis> {
        let project = self.load_project(id)?;
        let stories = self.repo.list_stories(project.uuid)?;
        let format = self.analyzer.compute_format(&stories);

        let mut plans = Vec::with_capacity(stories.len());
        for story in &stories {
            plans.extend(self.plans_for(story, &stories, &format, true, &[])?);
        }
        let summary = self.repo.apply_analysis(&AnalysisBatch {
            snapshot: Some(StorySnapshot::of(project.uuid, &stories)),
            story_change: None,
            format: Some((project.uuid, format.clone())),
            plans,
        })?;
        info!(
            "event=project_analyze module=service status=ok project={} stories={} created={} removed={}",
            project.uuid,
            stories.len(),
            summary.created,
            summary.removed
        );
        Ok(ProjectAnalysis {
            format,
            stories: stories.len(),
            summary,
        })
    }

    /// Replaces story text, re-chunks and re-analyzes it.
    ///
    /// Stories identical to the old or the new text get their `unique`
    /// defects regenerated in the same batch.
    pub fn edit_story(&self, id: StoryId, text: impl Into<String>) -> AnalysisResult<Story> {
        let current = self.load_story(id)?;
        let project = self.load_project(current.project_uuid)?;
        let mut stories = self.repo.list_stories(project.uuid)?;
        let snapshot = StorySnapshot::of(project.uuid, &stories);

        let mut edited = current.clone();
        edited.text = text.into();
        edited.chunks = Chunks::default();
        edited.validate()?;
        edited.chunks = self.chunk(&edited)?;
        for story in stories.iter_mut().filter(|story| story.uuid == id) {
            *story = edited.clone();
        }

        let duplicates = identical_ids(&edited, &stories);
        let mut plans = self.plans_for(&edited, &stories, &project.format, true, &duplicates)?;
        for former in identical_ids(&current, &stories) {
            if plans.iter().any(|plan| plan.story_uuid == former) {
                continue;
            }
            if let Some(story) = stories.iter().find(|story| story.uuid == former) {
                plans.push(self.unique_plan(story, &stories, &project.format)?);
            }
        }

        let summary = self.repo.apply_analysis(&AnalysisBatch {
            snapshot: Some(snapshot),
            story_change: Some(StoryChange::Update(edited.clone())),
            format: None,
            plans,
        })?;
        info!(
            "event=story_edit module=service status=ok story={} created={} removed={}",
            edited.uuid, summary.created, summary.removed
        );
        Ok(edited)
    }

    /// Deletes a story with its defects and refreshes its former duplicates.
    pub fn delete_story(&self, id: StoryId) -> AnalysisResult<BatchSummary> {
        let story = self.load_story(id)?;
        let project = self.load_project(story.project_uuid)?;
        let stories = self.repo.list_stories(project.uuid)?;
        let snapshot = StorySnapshot::of(project.uuid, &stories);
        let remaining: Vec<Story> = stories
            .into_iter()
            .filter(|other| other.uuid != id)
            .collect();

        let mut plans = Vec::new();
        for former in remaining.iter().filter(|other| other.text == story.text) {
            plans.push(self.unique_plan(former, &remaining, &project.format)?);
        }
        let summary = self.repo.apply_analysis(&AnalysisBatch {
            snapshot: Some(snapshot),
            story_change: Some(StoryChange::Delete(story)),
            format: None,
            plans,
        })?;
        info!(
            "event=story_delete module=service status=ok story={id} removed={}",
            summary.removed
        );
        Ok(summary)
    }

    /// Inserts the comma a missing-comma defect asks for and re-analyzes
    /// the story.
    pub fn correct_minor_issue(&self, defect: DefectId) -> AnalysisResult<Story> {
        let defect = self
            .repo
            .get_defect(defect)?
            .ok_or(AnalysisError::DefectNotFound(defect))?;
        let story = self.load_story(defect.story_uuid)?;
        let text = insert_missing_commas(&story, &[defect.subkind])
            .ok_or(AnalysisError::NotCorrectable(defect.subkind))?;
        self.edit_story(story.uuid, text)
    }

    /// Corrects every open missing-comma defect of the project, then
    /// re-analyzes the project.
    ///
    /// Returns the number of corrected stories.
    pub fn correct_minor_issues(&self, project: ProjectId) -> AnalysisResult<usize> {
        let project = self.load_project(project)?;
        let defects = self.repo.list_defects(&DefectQuery {
            project: Some(project.uuid),
            kind: Some(DefectKind::WellFormed),
            severity: Some(Severity::Minor),
            false_positive: Some(false),
            ..DefectQuery::default()
        })?;

        let mut by_story: Vec<(StoryId, Vec<DefectSubkind>)> = Vec::new();
        for defect in defects {
            match by_story
                .iter_mut()
                .find(|(story, _)| *story == defect.story_uuid)
            {
                Some((_, subkinds)) => subkinds.push(defect.subkind),
                None => by_story.push((defect.story_uuid, vec![defect.subkind])),
            }
        }

        let mut corrected = 0;
        for (story_id, subkinds) in by_story {
            let story = self.load_story(story_id)?;
            if let Some(text) = insert_missing_commas(&story, &subkinds) {
                self.edit_story(story_id, text)?;
                corrected += 1;
            }
        }
        self.analyze_project(project.uuid)?;
        Ok(corrected)
    }

    fn run_story(&self, id: StoryId, reset: bool, cascade: bool) -> AnalysisResult<BatchSummary> {
        let story = self.load_story(id)?;
        let project = self.load_project(story.project_uuid)?;
        let stories = self.repo.list_stories(project.uuid)?;
        let duplicates = if cascade {
            self.repo.find_identical_stories(&story)?
        } else {
            Vec::new()
        };

        let plans = self.plans_for(&story, &stories, &project.format, reset, &duplicates)?;
        let summary = self.repo.apply_analysis(&AnalysisBatch {
            snapshot: Some(StorySnapshot::of(project.uuid, &stories)),
            plans,
            ..AnalysisBatch::default()
        })?;
        info!(
            "event=story_analyze module=service status=ok story={id} reset={reset} cascade={} created={} replaced={} removed={}",
            duplicates.len(),
            summary.created,
            summary.replaced,
            summary.removed
        );
        Ok(summary)
    }

    /// Plan for `origin` followed by `unique` plans for `cascade_to`.
    fn plans_for(
        &self,
        origin: &Story,
        stories: &[Story],
        format: &ProjectFormat,
        reset: bool,
        cascade_to: &[StoryId],
    ) -> AnalysisResult<Vec<StoryDefectPlan>> {
        let facts = facts_for(origin, stories, format);
        let mut plan = StoryDefectPlan::for_story(origin, reset, DefectScope::All);
        plan.candidates = self.evaluate(origin, &facts, DefectScope::All)?;

        let mut plans = vec![plan];
        for target in cascade_to.iter().filter(|target| **target != origin.uuid) {
            if let Some(story) = stories.iter().find(|story| story.uuid == *target) {
                plans.push(self.unique_plan(story, stories, format)?);
            }
        }
        Ok(plans)
    }

    fn unique_plan(
        &self,
        story: &Story,
        stories: &[Story],
        format: &ProjectFormat,
    ) -> AnalysisResult<StoryDefectPlan> {
        let scope = DefectScope::Kind(DefectKind::Unique);
        let facts = facts_for(story, stories, format);
        let mut plan = StoryDefectPlan::for_story(story, true, scope);
        plan.candidates = self.evaluate(story, &facts, scope)?;
        Ok(plan)
    }

    fn prepare_story(
        &self,
        project: &Project,
        text: String,
        external_ref: Option<String>,
    ) -> AnalysisResult<Story> {
        let mut story = Story::new(project.uuid, text);
        story.external_ref = external_ref;
        story.validate()?;
        story.chunks = self.chunk(&story)?;
        Ok(story)
    }

    fn chunk(&self, story: &Story) -> AnalysisResult<Chunks> {
        self.analyzer.chunk(&story.text).map_err(|err| {
            warn!(
                "event=story_chunk module=service status=error story={} retryable={} error={err}",
                story.uuid,
                err.is_retryable()
            );
            AnalysisError::Tagger(err)
        })
    }

    fn evaluate(
        &self,
        story: &Story,
        facts: &ProjectFacts,
        scope: DefectScope,
    ) -> AnalysisResult<Vec<DefectCandidate>> {
        self.analyzer.evaluate(story, facts, scope).map_err(|err| {
            warn!(
                "event=story_evaluate module=service status=error story={} retryable={} error={err}",
                story.uuid,
                err.is_retryable()
            );
            AnalysisError::Tagger(err)
        })
    }

    fn load_project(&self, id: ProjectId) -> AnalysisResult<Project> {
        self.repo
            .get_project(id)?
            .ok_or(AnalysisError::ProjectNotFound(id))
    }

    fn load_story(&self, id: StoryId) -> AnalysisResult<Story> {
        self.repo
            .get_story(id)?
            .ok_or(AnalysisError::StoryNotFound(id))
    }
}

fn facts_for(story: &Story, stories: &[Story], format: &ProjectFormat) -> ProjectFacts {
    ProjectFacts {
        format: format.clone(),
        story_count: stories.len(),
        identical_stories: identical_ids(story, stories).len(),
    }
}

/// Other stories of `stories` whose text equals the text of `story`.
fn identical_ids(story: &Story, stories: &[Story]) -> Vec<StoryId> {
    stories
        .iter()
        .filter(|other| other.uuid != story.uuid && other.text == story.text)
        .map(|other| other.uuid)
        .collect()
}

/// Story text with a comma after the role (`no_means_comma`) and/or the
/// means (`no_ends_comma`) span.
///
/// Returns `None` when a subkind is not a missing-comma defect or its span
/// is absent.
fn insert_missing_commas(story: &Story, subkinds: &[DefectSubkind]) -> Option<String> {
    let role_end = story
        .chunk(ChunkKind::Role)
        .and_then(|role| story.text.find(role).map(|start| start + role.len()));

    let mut positions = Vec::with_capacity(subkinds.len());
    for subkind in subkinds {
        let position = match subkind {
            DefectSubkind::NoMeansComma => role_end?,
            DefectSubkind::NoEndsComma => {
                let means = story.chunk(ChunkKind::Means)?;
                let from = role_end.unwrap_or(0);
                from + story.text[from..].find(means)? + means.len()
            }
            _ => return None,
        };
        positions.push(position);
    }
    positions.sort_unstable();
    positions.dedup();

    let mut text = story.text.clone();
    for position in positions.into_iter().rev() {
        if !text[..position].ends_with(',') {
            text.insert(position, ',');
        }
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::{insert_missing_commas, AnalysisError};
    use crate::repo::RepoError;
    use crate::model::defect::DefectSubkind;
    use crate::model::story::{Chunks, Story};
    use uuid::Uuid;

    fn chunked(text: &str, role: &str, means: &str, ends: &str) -> Story {
        let mut story = Story::new(Uuid::nil(), text);
        story.chunks = Chunks {
            role: Some(role.to_string()),
            means: Some(means.to_string()),
            ends: Some(ends.to_string()),
        };
        story
    }

    #[test]
    fn inserts_commas_after_role_and_means() {
        let story = chunked(
            "As a User I want to add a story so that I document it",
            "As a User",
            "I want to add a story",
            "so that I document it",
        );
        let text = insert_missing_commas(
            &story,
            &[DefectSubkind::NoEndsComma, DefectSubkind::NoMeansComma],
        )
        .expect("both spans are present");
        assert_eq!(text, "As a User, I want to add a story, so that I document it");
    }

    #[test]
    fn rejects_other_subkinds() {
        let story = chunked("As a User, I want x, so that y", "As a User,", "I want x,", "so that y");
        assert_eq!(insert_missing_commas(&story, &[DefectSubkind::Brackets]), None);
    }

    #[test]
    fn missing_span_is_not_correctable() {
        let mut story = Story::new(Uuid::nil(), "I want to add a story so that I document it");
        story.chunks.means = Some("I want to add a story".to_string());
        assert_eq!(insert_missing_commas(&story, &[DefectSubkind::NoMeansComma]), None);
    }

    #[test]
    fn concurrent_story_change_is_retryable() {
        let project = Uuid::new_v4();
        let err = AnalysisError::from(RepoError::Conflict { project });
        assert!(matches!(err, AnalysisError::Conflict(id) if id == project));
        assert!(err.is_retryable());
    }
}
