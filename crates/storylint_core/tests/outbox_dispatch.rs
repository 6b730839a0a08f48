use std::cell::RefCell;
use storylint_core::db::open_db_in_memory;
use storylint_core::repo::outbox_repo::{OutboxEvent, OutboxEventType, OutboxRepository};
use storylint_core::service::outbox_service::{JsonLinesSink, SinkError};
use storylint_core::{
    AnalysisService, Analyzer, EventSink, OutboxDispatcher, ProjectService, SqliteStore,
};

#[derive(Default)]
struct RecordingSink {
    seen: RefCell<Vec<i64>>,
    reject_after: Option<usize>,
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: &OutboxEvent) -> Result<(), SinkError> {
        let mut seen = self.seen.borrow_mut();
        if self.reject_after.is_some_and(|limit| seen.len() >= limit) {
            return Err(SinkError::Unavailable("tracker offline".to_string()));
        }
        seen.push(event.id);
        Ok(())
    }
}

#[test]
fn analysis_changes_queue_events_with_external_ref() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = ProjectService::new(SqliteStore::new(&conn))
        .create_project("demo")
        .unwrap();
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);

    let story = service
        .add_story(
            project.uuid,
            "As a User, so that I document a requirement",
            Some("TRACKER-1".to_string()),
        )
        .unwrap();
    service.re_analyze(story.uuid, true).unwrap();

    let pending = SqliteStore::new(&conn).pending_events(10).unwrap();
    assert_eq!(pending.len(), 1, "unchanged re-analysis must not queue events");
    let event = &pending[0];
    assert_eq!(event.event_type, OutboxEventType::DefectsChanged);
    assert_eq!(event.external_ref.as_deref(), Some("TRACKER-1"));
    assert_eq!(event.payload["open_defects"][0]["subkind"], "no_means");

    service.delete_story(story.uuid).unwrap();
    let pending = SqliteStore::new(&conn).pending_events(10).unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].event_type, OutboxEventType::StoryDeleted);
}

#[test]
fn dispatcher_delivers_in_order_and_marks_delivered() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = ProjectService::new(SqliteStore::new(&conn))
        .create_project("demo")
        .unwrap();
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    for _ in 0..2 {
        service
            .add_story(project.uuid, "As a User, so that I document a requirement", None)
            .unwrap();
    }
    let expected: Vec<i64> = SqliteStore::new(&conn)
        .pending_events(10)
        .unwrap()
        .iter()
        .map(|event| event.id)
        .collect();
    assert!(expected.len() >= 2);

    let sink = RecordingSink::default();
    let report = OutboxDispatcher::new(SqliteStore::new(&conn), &sink)
        .with_batch_size(1)
        .dispatch_pending()
        .unwrap();

    assert_eq!(report.delivered, expected.len());
    assert_eq!(report.failed_event, None);
    assert_eq!(*sink.seen.borrow(), expected);
    assert!(SqliteStore::new(&conn).pending_events(10).unwrap().is_empty());
}

#[test]
fn dispatcher_stops_at_first_failure_and_keeps_event_pending() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = ProjectService::new(SqliteStore::new(&conn))
        .create_project("demo")
        .unwrap();
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    service
        .add_story(project.uuid, "As a User, so that I document a requirement", None)
        .unwrap();
    service
        .add_story(
            project.uuid,
            "User wants to add a user story, so that I document a requirement",
            None,
        )
        .unwrap();

    let sink = RecordingSink {
        reject_after: Some(1),
        ..RecordingSink::default()
    };
    let report = OutboxDispatcher::new(SqliteStore::new(&conn), &sink)
        .dispatch_pending()
        .unwrap();

    assert_eq!(report.delivered, 1);
    let pending = SqliteStore::new(&conn).pending_events(10).unwrap();
    assert_eq!(report.failed_event, Some(pending[0].id));
    assert_eq!(pending.len(), 1);
}

#[test]
fn json_lines_sink_writes_one_document_per_event() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = ProjectService::new(SqliteStore::new(&conn))
        .create_project("demo")
        .unwrap();
    let service = AnalysisService::new(SqliteStore::new(&conn), &analyzer);
    service
        .add_story(
            project.uuid,
            "As a User, so that I document a requirement",
            Some("TRACKER-9".to_string()),
        )
        .unwrap();

    let sink = JsonLinesSink::new(Vec::new());
    OutboxDispatcher::new(SqliteStore::new(&conn), &sink)
        .dispatch_pending()
        .unwrap();

    let written = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event_type"], "defects_changed");
    assert_eq!(lines[0]["external_ref"], "TRACKER-9");
}

#[test]
fn mark_delivered_twice_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let analyzer = Analyzer::with_rule_tagger().unwrap();
    let project = ProjectService::new(SqliteStore::new(&conn))
        .create_project("demo")
        .unwrap();
    AnalysisService::new(SqliteStore::new(&conn), &analyzer)
        .add_story(project.uuid, "As a User, so that I document a requirement", None)
        .unwrap();

    let store = SqliteStore::new(&conn);
    let event = store.pending_events(1).unwrap().remove(0);
    store.mark_delivered(event.id).unwrap();
    assert!(store.mark_delivered(event.id).is_err());
}
