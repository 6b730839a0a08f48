//! Core domain logic for storylint.
//! This crate is the single source of truth for story quality rules.

pub mod analysis;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use analysis::tagger::{ProcessTagger, RuleTagger, TaggedToken, Tagger, TaggerError};
pub use analysis::Analyzer;
pub use config::{AnalyzerConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination};
pub use model::defect::{Defect, DefectKind, DefectScope, DefectSubkind, Severity};
pub use model::project::{Project, ProjectFormat};
pub use model::story::{Chunks, Story};
pub use repo::{RepoError, RepoResult, SqliteStore};
pub use service::analysis_service::{AnalysisError, AnalysisService};
pub use service::defect_service::{DefectService, ProjectReport};
pub use service::outbox_service::{EventSink, OutboxDispatcher};
pub use service::project_service::ProjectService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
