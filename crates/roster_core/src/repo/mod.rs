//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the student storage contract consumed by services.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Student::validate()` before persistence.
//! - Every backend applies the same active-only visibility rules.

pub mod memory_repo;
pub mod student_repo;
