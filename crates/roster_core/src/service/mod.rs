//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation and repository calls into use-case level APIs.
//! - Keep CLI and other callers decoupled from storage details.

pub mod student_service;
