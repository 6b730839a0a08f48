//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate analysis and repository calls into use-case level APIs.
//! - Keep the CLI and integration layers decoupled from storage details.

pub mod analysis_service;
pub mod defect_service;
pub mod outbox_service;
pub mod project_service;
