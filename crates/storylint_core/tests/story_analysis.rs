use rusqlite::Connection;
use storylint_core::analysis::lexicon::Lexicon;
use storylint_core::analysis::rules::RuleSettings;
use storylint_core::analysis::tagger::{TaggedText, Tagger, TaggerError, TaggerResult};
use storylint_core::db::open_db_in_memory;
use storylint_core::model::defect::DefectId;
use storylint_core::model::story::{ChunkKind, StoryId};
use storylint_core::repo::defect_repo::{DefectQuery, DefectRepository};
use storylint_core::repo::story_repo::StoryRepository;
use storylint_core::{
    AnalysisError, AnalysisService, Analyzer, DefectKind, DefectService, DefectSubkind, Project,
    ProjectService, Severity, SqliteStore,
};
use std::time::Duration;
use uuid::Uuid;

const WELL_FORMED: &str =
    "As a User, I'm able to add a user story, so that I document a requirement";
const WANT_TO: &str = "As a User, I want to add a user story, so that I document a requirement";
const BRACKETS: &str =
    "As a User, I want to add a user story, so that I sell the system (for money)";

fn new_project(conn: &Connection) -> Project {
    ProjectService::new(SqliteStore::new(conn))
        .create_project("demo")
        .unwrap()
}

fn open_defects(conn: &Connection, story: StoryId) -> Vec<(DefectSubkind, Severity)> {
    SqliteStore::new(conn)
        .list_defects(&DefectQuery::open_for_story(story))
        .unwrap()
        .into_iter()
        .map(|defect| (defect.subkind, defect.severity))
        .collect()
}

fn first_defect(conn: &Connection, story: StoryId, subkind: DefectSubkind) -> DefectId {
    SqliteStore::new(conn)
        .list_defects(&DefectQuery {
            story: Some(story),
            subkind: Some(subkind),
            ..DefectQuery::default()
        })
        .unwrap()
        .first()
        .map(|defect| defect.uuid)
        .expect("defect should exist")
}

#[test]
fn create_story_stores_canonical_chunks() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let story = service
        .create_story(project.uuid, WANT_TO, Some("JIRA-7".to_string()))
        .unwrap();
    assert_eq!(story.chunk(ChunkKind::Role), Some("As a User,"));
    assert_eq!(story.chunk(ChunkKind::Means), Some("I want to add a user story,"));
    assert_eq!(
        story.chunk(ChunkKind::Ends),
        Some("so that I document a requirement")
    );

    let stored = SqliteStore::new(&conn).get_story(story.uuid).unwrap().unwrap();
    assert_eq!(stored, story);
    assert!(open_defects(&conn, story.uuid).is_empty());
}

#[test]
fn missing_means_and_missing_role_yield_one_high_defect_each() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let no_means = service
        .add_story(project.uuid, "As a User, so that I document a requirement", None)
        .unwrap();
    assert_eq!(
        open_defects(&conn, no_means.uuid),
        vec![(DefectSubkind::NoMeans, Severity::High)]
    );

    let no_role = service
        .add_story(
            project.uuid,
            "User wants to add a user story, so that I document a requirement",
            None,
        )
        .unwrap();
    assert_eq!(
        open_defects(&conn, no_role.uuid),
        vec![(DefectSubkind::NoRole, Severity::High)]
    );
}

#[test]
fn identical_stories_flag_each_other_and_edit_clears_both() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let first = service.add_story(project.uuid, WELL_FORMED, None).unwrap();
    assert!(open_defects(&conn, first.uuid).is_empty());

    let second = service.add_story(project.uuid, WELL_FORMED, None).unwrap();
    let identical = vec![(DefectSubkind::Identical, Severity::High)];
    assert_eq!(open_defects(&conn, first.uuid), identical);
    assert_eq!(open_defects(&conn, second.uuid), identical);

    let edited = service.edit_story(first.uuid, WANT_TO).unwrap();
    assert_eq!(edited.text, WANT_TO);
    let unique_left = SqliteStore::new(&conn)
        .list_defects(&DefectQuery::open_of_kind(project.uuid, DefectKind::Unique))
        .unwrap();
    assert!(unique_left.is_empty(), "{unique_left:?}");
}

#[test]
fn re_analyze_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    let story = service.add_story(project.uuid, BRACKETS, None).unwrap();

    let snapshot = || {
        let mut defects: Vec<(DefectSubkind, Severity, String)> = SqliteStore::new(&conn)
            .list_defects(&DefectQuery::open_for_story(story.uuid))
            .unwrap()
            .into_iter()
            .map(|defect| (defect.subkind, defect.severity, defect.highlight))
            .collect();
        defects.sort_by(|left, right| left.0.as_str().cmp(right.0.as_str()));
        defects
    };

    let initial = snapshot();
    service.re_analyze(story.uuid, true).unwrap();
    let once = snapshot();
    service.re_analyze(story.uuid, true).unwrap();
    let twice = snapshot();

    assert_eq!(initial, once);
    assert_eq!(once, twice);

    let summary = service.analyze(story.uuid, false).unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(snapshot(), twice);
}

#[test]
fn brackets_yield_exactly_one_minimal_defect() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let story = service.add_story(project.uuid, BRACKETS, None).unwrap();
    let defects = SqliteStore::new(&conn)
        .list_defects(&DefectQuery::open_for_story(story.uuid))
        .unwrap();
    assert_eq!(defects.len(), 1);
    assert_eq!(defects[0].kind, DefectKind::Minimal);
    assert_eq!(defects[0].subkind, DefectSubkind::Brackets);
    assert!(defects[0]
        .highlight
        .ends_with("<span class=\"highlight-text severity-high\">(for money)</span>"));
}

#[test]
fn trailing_sentence_yields_punctuation_defect() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let story = service
        .add_story(
            project.uuid,
            "As a User, I want to add a user story. This helps me, so that I document a requirement",
            None,
        )
        .unwrap();
    assert!(open_defects(&conn, story.uuid).contains(&(DefectSubkind::Punctuation, Severity::High)));
}

#[test]
fn analyze_project_persists_consensus_and_flags_outlier_template() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    for text in [
        WANT_TO,
        "As a Manager, I want to add a user story, so that I track the work",
        "As a Tester, I want to add a user story, so that I plan the tests",
    ] {
        service.create_story(project.uuid, text, None).unwrap();
    }
    let outlier = service
        .create_story(
            project.uuid,
            "As a Designer, I am able to add a user story, so that I share ideas",
            None,
        )
        .unwrap();

    let result = service.analyze_project(project.uuid).unwrap();
    assert_eq!(result.stories, 4);
    assert_eq!(result.format.phrase(ChunkKind::Role), "As a");
    assert_eq!(result.format.phrase(ChunkKind::Means), "I want to");

    let stored = ProjectService::new(SqliteStore::new(&conn))
        .get_project(project.uuid)
        .unwrap();
    assert_eq!(stored.format, result.format);

    assert_eq!(
        open_defects(&conn, outlier.uuid),
        vec![(DefectSubkind::Uniform, Severity::Medium)]
    );
    let report = DefectService::new(SqliteStore::new(&conn))
        .project_report(project.uuid)
        .unwrap();
    assert_eq!(report.stories, 4);
    assert_eq!(report.medium, 1);
    assert_eq!(report.open_defects(), 1);
    assert_eq!(report.perfect_stories, 3);
}

#[test]
fn false_positive_suppresses_regeneration_until_rule_stops_firing() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    let defects = DefectService::new(SqliteStore::new(&conn));

    let story = service.add_story(project.uuid, BRACKETS, None).unwrap();
    let brackets = first_defect(&conn, story.uuid, DefectSubkind::Brackets);
    let marked = defects.mark_false_positive(brackets, true).unwrap();
    assert!(marked.false_positive);

    service.re_analyze(story.uuid, false).unwrap();
    assert!(open_defects(&conn, story.uuid).is_empty());
    let report = defects.project_report(project.uuid).unwrap();
    assert_eq!(report.false_positives, 1);
    assert_eq!(report.perfect_stories, 1);

    service
        .edit_story(
            story.uuid,
            "As a User, I want to add a user story, so that I sell the system",
        )
        .unwrap();
    let remaining = defects
        .list_defects(&DefectQuery {
            story: Some(story.uuid),
            ..DefectQuery::default()
        })
        .unwrap();
    assert!(remaining.is_empty(), "{remaining:?}");
}

#[test]
fn correct_minor_issue_inserts_missing_comma() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let story = service
        .add_story(
            project.uuid,
            "As a User I want to add a user story, so that I document a requirement",
            None,
        )
        .unwrap();
    assert_eq!(
        open_defects(&conn, story.uuid),
        vec![(DefectSubkind::NoMeansComma, Severity::Minor)]
    );

    let defect = first_defect(&conn, story.uuid, DefectSubkind::NoMeansComma);
    let corrected = service.correct_minor_issue(defect).unwrap();
    assert_eq!(corrected.text, WANT_TO);
    assert!(open_defects(&conn, story.uuid).is_empty());
}

#[test]
fn correct_minor_issues_fixes_whole_project() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    service
        .add_story(
            project.uuid,
            "As a User I want to add a user story, so that I document a requirement",
            None,
        )
        .unwrap();
    let brackets = service.add_story(project.uuid, BRACKETS, None).unwrap();

    assert_eq!(service.correct_minor_issues(project.uuid).unwrap(), 1);
    let report = DefectService::new(SqliteStore::new(&conn))
        .project_report(project.uuid)
        .unwrap();
    assert_eq!(report.minor, 0);
    assert_eq!(report.high, 1);

    let not_minor = first_defect(&conn, brackets.uuid, DefectSubkind::Brackets);
    assert!(matches!(
        service.correct_minor_issue(not_minor),
        Err(AnalysisError::NotCorrectable(DefectSubkind::Brackets))
    ));
}

#[test]
fn delete_story_refreshes_former_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let kept = service.add_story(project.uuid, WELL_FORMED, None).unwrap();
    let removed = service.add_story(project.uuid, WELL_FORMED, None).unwrap();
    assert_eq!(open_defects(&conn, kept.uuid).len(), 1);

    service.delete_story(removed.uuid).unwrap();
    assert!(open_defects(&conn, kept.uuid).is_empty());
    assert!(SqliteStore::new(&conn)
        .get_story(removed.uuid)
        .unwrap()
        .is_none());
    assert!(matches!(
        service.delete_story(removed.uuid),
        Err(AnalysisError::StoryNotFound(id)) if id == removed.uuid
    ));
}

#[test]
fn unknown_story_is_reported_as_not_found() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.re_analyze(missing, true),
        Err(AnalysisError::StoryNotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.create_story(missing, WANT_TO, None),
        Err(AnalysisError::ProjectNotFound(id)) if id == missing
    ));
}

#[test]
fn empty_story_text_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    assert!(matches!(
        service.create_story(project.uuid, "   ", None),
        Err(AnalysisError::InvalidStory(_))
    ));
}

struct TimedOutTagger;

impl Tagger for TimedOutTagger {
    fn tag(&self, _text: &str) -> TaggerResult<TaggedText> {
        Err(TaggerError::Timeout {
            after: Duration::from_secs(3),
        })
    }
}

#[test]
fn tagger_timeout_is_retryable_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::new(
        Lexicon::default(),
        Box::new(TimedOutTagger),
        RuleSettings::default(),
    )
    .unwrap();
    let project = new_project(&conn);
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let err = service
        .add_story(project.uuid, "Export reports", None)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Tagger(TaggerError::Timeout { .. })));
    assert!(err.is_retryable());
    assert_eq!(SqliteStore::new(&conn).count_stories(project.uuid).unwrap(), 0);
}
