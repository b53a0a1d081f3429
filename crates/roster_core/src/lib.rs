//! Core domain logic for the student roster.
//! This crate is the single source of truth for record lifecycle invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::student::{Student, StudentDraft, StudentId, StudentValidationError};
pub use repo::memory_repo::InMemoryStudentRepository;
pub use repo::student_repo::{RepoError, RepoResult, SqliteStudentRepository, StudentRepository};
pub use service::student_service::{StudentService, StudentServiceError, StudentServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
