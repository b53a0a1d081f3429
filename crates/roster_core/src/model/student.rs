//! Student domain model.
//!
//! # Responsibility
//! - Define the student entity and the caller-supplied draft fields.
//! - Provide ordered field validation with one error per violated rule.
//!
//! # Invariants
//! - `id` is `None` until a repository assigns it, and never changes after.
//! - Equality and hashing consider `id` only.
//! - `registered_at` is set once at construction.
//! - `active` starts as `true` and only ever transitions to `false`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Repository-assigned student identifier. Valid ids are strictly positive.
pub type StudentId = i64;

/// Minimum accepted age, inclusive.
pub const MIN_AGE: i32 = 18;
/// Maximum accepted age, inclusive.
pub const MAX_AGE: i32 = 100;

const MIN_NAME_CHARS: usize = 2;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@.+$").expect("valid email regex"));

/// Field-level validation failure.
///
/// Rules are checked in declaration order and only the first violation is
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentValidationError {
    /// Name is shorter than two characters after trim.
    InvalidName,
    /// Email is blank or not shaped like `local@domain`.
    InvalidEmail,
    /// Age is outside `[MIN_AGE, MAX_AGE]`.
    AgeOutOfRange(i32),
    /// Course is blank after trim.
    MissingCourse,
}

impl Display for StudentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => {
                write!(f, "name is required and must be at least 2 characters")
            }
            Self::InvalidEmail => write!(f, "email format is invalid"),
            Self::AgeOutOfRange(_) => write!(f, "age must be between 18 and 100"),
            Self::MissingCourse => write!(f, "course is required"),
        }
    }
}

impl Error for StudentValidationError {}

/// Caller-supplied mutable fields of a student.
///
/// Used as input for both creation and full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDraft {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub course: String,
}

impl StudentDraft {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        age: i32,
        course: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
            course: course.into(),
        }
    }

    /// Validates fields in fixed order: name, email, age, course.
    pub fn validate(&self) -> Result<(), StudentValidationError> {
        validate_fields(&self.name, &self.email, self.age, &self.course)
    }
}

/// Canonical student record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Assigned by the repository on creation.
    pub id: Option<StudentId>,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub course: String,
    /// Unix epoch milliseconds.
    pub registered_at: i64,
    /// Soft delete flag. Inactive students are invisible to reads and updates.
    pub active: bool,
}

impl Student {
    /// Creates an unsaved, active student registered now.
    ///
    /// This constructor does not validate; callers validate the draft first.
    pub fn new(draft: StudentDraft) -> Self {
        Self::registered_at(draft, now_epoch_ms())
    }

    /// Creates an unsaved, active student with a caller-provided timestamp.
    pub fn registered_at(draft: StudentDraft, registered_at: i64) -> Self {
        Self {
            id: None,
            name: draft.name,
            email: draft.email,
            age: draft.age,
            course: draft.course,
            registered_at,
            active: true,
        }
    }

    /// Replaces name, email, age and course.
    ///
    /// `id`, `registered_at` and `active` are left untouched.
    pub fn apply(&mut self, draft: StudentDraft) {
        self.name = draft.name;
        self.email = draft.email;
        self.age = draft.age;
        self.course = draft.course;
    }

    /// Marks this student as logically deleted.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Re-applies field rules to a full entity.
    pub fn validate(&self) -> Result<(), StudentValidationError> {
        validate_fields(&self.name, &self.email, self.age, &self.course)
    }
}

impl PartialEq for Student {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Student {}

impl Hash for Student {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn validate_fields(
    name: &str,
    email: &str,
    age: i32,
    course: &str,
) -> Result<(), StudentValidationError> {
    if name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(StudentValidationError::InvalidName);
    }
    if email.trim().is_empty() || !EMAIL_RE.is_match(email) {
        return Err(StudentValidationError::InvalidEmail);
    }
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(StudentValidationError::AgeOutOfRange(age));
    }
    if course.trim().is_empty() {
        return Err(StudentValidationError::MissingCourse);
    }
    Ok(())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
