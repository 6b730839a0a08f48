//! Outbound event delivery.
//!
//! # Responsibility
//! - Hand queued events to an [`EventSink`] in sequence order.
//!
//! # Invariants
//! - An event is marked delivered only after the sink accepted it.
//! - Dispatch stops at the first rejected event so ordering is kept.

use crate::repo::outbox_repo::{OutboxEvent, OutboxRepository};
use crate::repo::RepoError;
use log::{info, warn};
use serde_json::json;
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;

/// Delivery failure reported by a sink.
#[derive(Debug)]
pub enum SinkError {
    /// Receiver is temporarily unavailable; retry later.
    Unavailable(String),
    /// Receiver refused the event.
    Rejected(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "event sink unavailable: {message}"),
            Self::Rejected(message) => write!(f, "event rejected: {message}"),
        }
    }
}

impl Error for SinkError {}

/// Receiver of outbound events, e.g. an issue tracker adapter.
pub trait EventSink {
    fn deliver(&self, event: &OutboxEvent) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn deliver(&self, event: &OutboxEvent) -> Result<(), SinkError> {
        (**self).deliver(event)
    }
}

/// Sink writing one JSON document per line.
pub struct JsonLinesSink<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn deliver(&self, event: &OutboxEvent) -> Result<(), SinkError> {
        let line = json!({
            "id": event.id,
            "event_type": event.event_type.as_str(),
            "story_uuid": event.story_uuid.to_string(),
            "project_uuid": event.project_uuid.to_string(),
            "external_ref": event.external_ref,
            "payload": event.payload,
        });
        let mut writer = self.writer.borrow_mut();
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|err| SinkError::Unavailable(err.to_string()))
    }
}

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Event that stopped the round, if any.
    pub failed_event: Option<i64>,
}

/// Delivers pending outbox events to a sink.
pub struct OutboxDispatcher<R: OutboxRepository, S: EventSink> {
    repo: R,
    sink: S,
    batch_size: u32,
}

impl<R: OutboxRepository, S: EventSink> OutboxDispatcher<R, S> {
    pub const DEFAULT_BATCH_SIZE: u32 = 100;

    pub fn new(repo: R, sink: S) -> Self {
        Self {
            repo,
            sink,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Delivers pending events until the queue is empty or a sink fails.
    pub fn dispatch_pending(&self) -> Result<DispatchReport, RepoError> {
        let mut report = DispatchReport::default();
        loop {
            let events = self.repo.pending_events(self.batch_size)?;
            if events.is_empty() {
                break;
            }
            for event in &events {
                if let Err(err) = self.sink.deliver(event) {
                    warn!(
                        "event=outbox_dispatch module=service status=error event_id={} type={} error={err}",
                        event.id,
                        event.event_type.as_str()
                    );
                    report.failed_event = Some(event.id);
                    return Ok(report);
                }
                self.repo.mark_delivered(event.id)?;
                report.delivered += 1;
            }
        }
        info!(
            "event=outbox_dispatch module=service status=ok delivered={}",
            report.delivered
        );
        Ok(report)
    }
}
