//! Domain model for projects, stories and their quality defects.
//!
//! # Responsibility
//! - Define canonical data structures used by analysis and persistence.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Stories and defects always reference their owning project.

pub mod defect;
pub mod project;
pub mod story;
