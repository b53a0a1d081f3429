//! In-memory student repository.
//!
//! # Responsibility
//! - Provide a storage-free reference implementation of `StudentRepository`.
//! - Mirror SQLite semantics closely enough to share contract tests.
//!
//! # Invariants
//! - Ids start at 1, increase monotonically and are never reused.
//! - Rows are never removed; soft delete only clears `active`.
//! - At most one active row holds a given email.

use crate::model::student::{Student, StudentId};
use crate::repo::student_repo::{RepoError, RepoResult, StudentRepository};
use std::cell::RefCell;

#[derive(Debug)]
struct MemoryState {
    rows: Vec<Student>,
    next_id: StudentId,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

impl MemoryState {
    fn active_mut(&mut self, id: StudentId) -> Option<&mut Student> {
        self.rows
            .iter_mut()
            .find(|row| row.active && row.id == Some(id))
    }

    fn email_taken_by_other(&self, email: &str, id: Option<StudentId>) -> bool {
        self.rows
            .iter()
            .any(|row| row.active && row.email == email && row.id != id)
    }
}

/// Vector-backed repository for tests and ephemeral callers.
///
/// Single-threaded: interior mutability uses `RefCell`.
#[derive(Debug, Default)]
pub struct InMemoryStudentRepository {
    state: RefCell<MemoryState>,
}

impl InMemoryStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns copies of every stored row, including inactive ones, in
    /// insertion order.
    pub fn records(&self) -> Vec<Student> {
        self.state.borrow().rows.clone()
    }
}

impl StudentRepository for InMemoryStudentRepository {
    fn create(&self, student: &Student) -> RepoResult<Student> {
        if let Some(id) = student.id {
            return Err(RepoError::AlreadyPersisted(id));
        }
        student.validate()?;

        let mut state = self.state.borrow_mut();
        if student.active && state.email_taken_by_other(&student.email, None) {
            return Err(RepoError::DuplicateEmail(student.email.clone()));
        }

        let mut created = student.clone();
        created.id = Some(state.next_id);
        state.next_id += 1;
        state.rows.push(created.clone());
        Ok(created)
    }

    fn find_active_by_id(&self, id: StudentId) -> RepoResult<Option<Student>> {
        let state = self.state.borrow();
        Ok(state
            .rows
            .iter()
            .find(|row| row.active && row.id == Some(id))
            .cloned())
    }

    fn find_all_active(&self) -> RepoResult<Vec<Student>> {
        let state = self.state.borrow();
        let mut active: Vec<Student> = state
            .rows
            .iter()
            .filter(|row| row.is_active())
            .cloned()
            .collect();
        active.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));
        Ok(active)
    }

    fn exists_active_email(&self, email: &str) -> RepoResult<bool> {
        Ok(self.state.borrow().email_taken_by_other(email, None))
    }

    fn update(&self, student: &Student) -> RepoResult<bool> {
        let id = student.id.ok_or(RepoError::MissingId)?;
        student.validate()?;

        let mut state = self.state.borrow_mut();
        if state.active_mut(id).is_none() {
            return Ok(false);
        }
        if state.email_taken_by_other(&student.email, Some(id)) {
            return Err(RepoError::DuplicateEmail(student.email.clone()));
        }

        if let Some(row) = state.active_mut(id) {
            row.name = student.name.clone();
            row.email = student.email.clone();
            row.age = student.age;
            row.course = student.course.clone();
        }
        Ok(true)
    }

    fn soft_delete(&self, id: StudentId) -> RepoResult<bool> {
        let mut state = self.state.borrow_mut();
        match state.active_mut(id) {
            Some(row) => {
                row.deactivate();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
