//! Student record lifecycle service.
//!
//! # Responsibility
//! - Validate caller input before any repository interaction.
//! - Enforce cross-record invariants: email uniqueness and existence.
//! - Translate repository outcomes into one domain error per failure.
//!
//! # Invariants
//! - Validation order is fixed: id, name, email, age, course.
//! - Only active students are visible to reads, updates and uniqueness checks.
//! - `update` works on an owned copy of the stored row and never touches
//!   `id`, `registered_at` or `active`.
//! - The uniqueness pre-check is best effort; storage-level violations are
//!   reported as `DuplicateEmail` as well.
//! - No retries and no partial rollback.

use crate::model::student::{Student, StudentDraft, StudentId, StudentValidationError};
use crate::repo::student_repo::{RepoError, StudentRepository};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StudentServiceResult<T> = Result<T, StudentServiceError>;

/// Errors from student lifecycle operations.
#[derive(Debug)]
pub enum StudentServiceError {
    /// Input failed a field rule; caller must fix input.
    Validation(StudentValidationError),
    /// Another active student already holds this email.
    DuplicateEmail(String),
    /// No active student has this id.
    NotFound(StudentId),
    /// Id is not strictly positive.
    InvalidId(StudentId),
    /// Storage could not complete a write it should have completed.
    Persistence(RepoError),
}

impl StudentServiceError {
    /// Stable machine-readable code used in logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::NotFound(_) => "not_found",
            Self::InvalidId(_) => "invalid_id",
            Self::Persistence(_) => "persistence_error",
        }
    }
}

impl Display for StudentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::NotFound(id) => write!(f, "no student with id {id}"),
            Self::InvalidId(_) => write!(f, "id must be a positive number"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StudentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => err.source(),
            Self::Persistence(err) => err.source(),
            _ => None,
        }
    }
}

impl From<StudentValidationError> for StudentServiceError {
    fn from(value: StudentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StudentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            other => Self::Persistence(other),
        }
    }
}

/// Student lifecycle facade over a repository implementation.
///
/// Stateless across calls; holds only the repository.
pub struct StudentService<R: StudentRepository> {
    repo: R,
}

impl<R: StudentRepository> StudentService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new active student.
    ///
    /// # Errors
    /// - `Validation` for the first violated field rule.
    /// - `DuplicateEmail` when an active student already holds the email.
    /// - `Persistence` when storage rejects the insert.
    pub fn create(&self, draft: StudentDraft) -> StudentServiceResult<Student> {
        let result = self.create_inner(draft);
        match &result {
            Ok(student) => info!(
                "event=student_create module=service status=ok id={}",
                display_id(student.id)
            ),
            Err(err) => log_rejection("student_create", None, err),
        }
        result
    }

    fn create_inner(&self, draft: StudentDraft) -> StudentServiceResult<Student> {
        draft.validate()?;
        if self.repo.exists_active_email(&draft.email)? {
            return Err(StudentServiceError::DuplicateEmail(draft.email));
        }

        let student = Student::new(draft);
        Ok(self.repo.create(&student)?)
    }

    /// Gets one active student by id.
    ///
    /// Returns `Ok(None)` when the id is unknown or the student was deleted.
    pub fn get_by_id(&self, id: StudentId) -> StudentServiceResult<Option<Student>> {
        ensure_valid_id(id)?;
        Ok(self.repo.find_active_by_id(id)?)
    }

    /// Lists active students ordered by name ascending.
    pub fn list_all(&self) -> StudentServiceResult<Vec<Student>> {
        let students = self.repo.find_all_active()?;
        info!(
            "event=student_list module=service status=ok count={}",
            students.len()
        );
        Ok(students)
    }

    /// Replaces name, email, age and course of an active student.
    ///
    /// The email uniqueness lookup only runs when the email changes.
    ///
    /// # Errors
    /// - `InvalidId` / `Validation` before any repository call.
    /// - `NotFound` when no active student has `id`.
    /// - `DuplicateEmail` when the new email belongs to another active student.
    /// - `Persistence` when the row disappeared between read and write.
    pub fn update(&self, id: StudentId, draft: StudentDraft) -> StudentServiceResult<Student> {
        let result = self.update_inner(id, draft);
        match &result {
            Ok(_) => info!("event=student_update module=service status=ok id={id}"),
            Err(err) => log_rejection("student_update", Some(id), err),
        }
        result
    }

    fn update_inner(&self, id: StudentId, draft: StudentDraft) -> StudentServiceResult<Student> {
        ensure_valid_id(id)?;
        draft.validate()?;

        let mut student = self
            .repo
            .find_active_by_id(id)?
            .ok_or(StudentServiceError::NotFound(id))?;

        if draft.email != student.email && self.repo.exists_active_email(&draft.email)? {
            return Err(StudentServiceError::DuplicateEmail(draft.email));
        }

        student.apply(draft);
        if !self.repo.update(&student)? {
            return Err(StudentServiceError::Persistence(RepoError::NotPersisted(
                format!("could not update record with id {id}"),
            )));
        }

        Ok(student)
    }

    /// Soft-deletes an active student.
    ///
    /// Returns `false` when the id is unknown or already inactive.
    pub fn delete(&self, id: StudentId) -> StudentServiceResult<bool> {
        ensure_valid_id(id)?;
        let deleted = self.repo.soft_delete(id)?;
        info!("event=student_delete module=service status=ok id={id} affected={deleted}");
        Ok(deleted)
    }
}

fn ensure_valid_id(id: StudentId) -> StudentServiceResult<()> {
    if id <= 0 {
        return Err(StudentServiceError::InvalidId(id));
    }
    Ok(())
}

fn display_id(id: Option<StudentId>) -> String {
    id.map_or_else(|| "none".to_string(), |value| value.to_string())
}

fn log_rejection(event: &str, id: Option<StudentId>, err: &StudentServiceError) {
    match err {
        StudentServiceError::Persistence(_) => warn!(
            "event={event} module=service status=error id={} error_code={} error={}",
            display_id(id),
            err.code(),
            err
        ),
        _ => info!(
            "event={event} module=service status=rejected id={} error_code={}",
            display_id(id),
            err.code()
        ),
    }
}
