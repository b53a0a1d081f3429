//! Domain model for student records.
//!
//! # Responsibility
//! - Define the canonical student entity used by repositories and services.
//! - Own field-level validation rules shared by create and update paths.
//!
//! # Invariants
//! - A student is identified by a repository-assigned `StudentId`.
//! - Deletion is represented by the `active` flag, never by row removal.

pub mod student;
