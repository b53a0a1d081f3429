//! Student repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the storage contract consumed by `StudentService`.
//! - Keep SQL details inside the core persistence boundary.
//! - Translate storage constraint failures into semantic errors.
//!
//! # Invariants
//! - Reads, updates and uniqueness checks only ever see `active = 1` rows.
//! - Write paths call `Student::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - The partial unique index on active emails is the source of truth for
//!   email uniqueness; violations surface as `RepoError::DuplicateEmail`.

use crate::db::migrations::latest_version;
use crate::db::{is_unique_violation, DbError};
use crate::model::student::{Student, StudentId, StudentValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const STUDENT_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    age,
    course,
    registered_at,
    active
FROM students";

const STUDENT_COLUMNS: [&str; 7] = [
    "id",
    "name",
    "email",
    "age",
    "course",
    "registered_at",
    "active",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from student persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Entity failed field validation before a write.
    Validation(StudentValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Another active student already holds this email.
    DuplicateEmail(String),
    /// A write that should have succeeded affected no row.
    NotPersisted(String),
    /// Update was requested for a student that was never persisted.
    MissingId,
    /// Create was requested for a student that already has an id.
    AlreadyPersisted(StudentId),
    /// Persisted data cannot be converted to a valid student.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateEmail(email) => {
                write!(f, "an active student already uses email `{email}`")
            }
            Self::NotPersisted(message) => write!(f, "{message}"),
            Self::MissingId => write!(f, "student has no id; persist it before updating"),
            Self::AlreadyPersisted(id) => write!(f, "student already persisted with id {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted student data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

// `Validation` and `Db` display the wrapped error as-is, so they forward its
// source instead of repeating it in the chain.
impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => err.source(),
            Self::Db(err) => err.source(),
            _ => None,
        }
    }
}

impl From<StudentValidationError> for RepoError {
    fn from(value: StudentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for student records.
///
/// Every implementation must apply the same active-only filter to
/// `find_active_by_id`, `exists_active_email`, `update` and `soft_delete`.
pub trait StudentRepository {
    /// Inserts a new student and returns a copy with its assigned id.
    fn create(&self, student: &Student) -> RepoResult<Student>;
    /// Gets one active student by id.
    fn find_active_by_id(&self, id: StudentId) -> RepoResult<Option<Student>>;
    /// Lists active students ordered by `name ASC, id ASC`.
    fn find_all_active(&self) -> RepoResult<Vec<Student>>;
    /// Returns whether an active student holds `email`.
    fn exists_active_email(&self, email: &str) -> RepoResult<bool>;
    /// Replaces name/email/age/course of the active row with the same id.
    ///
    /// Returns `false` when no active row matched.
    fn update(&self, student: &Student) -> RepoResult<bool>;
    /// Marks the active row with this id as inactive.
    ///
    /// Returns `false` when no active row matched, including repeat calls.
    fn soft_delete(&self, id: StudentId) -> RepoResult<bool>;
}

impl<R: StudentRepository + ?Sized> StudentRepository for &R {
    fn create(&self, student: &Student) -> RepoResult<Student> {
        (**self).create(student)
    }

    fn find_active_by_id(&self, id: StudentId) -> RepoResult<Option<Student>> {
        (**self).find_active_by_id(id)
    }

    fn find_all_active(&self) -> RepoResult<Vec<Student>> {
        (**self).find_all_active()
    }

    fn exists_active_email(&self, email: &str) -> RepoResult<bool> {
        (**self).exists_active_email(email)
    }

    fn update(&self, student: &Student) -> RepoResult<bool> {
        (**self).update(student)
    }

    fn soft_delete(&self, id: StudentId) -> RepoResult<bool> {
        (**self).soft_delete(id)
    }
}

/// SQLite-backed student repository.
pub struct SqliteStudentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_student_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn create(&self, student: &Student) -> RepoResult<Student> {
        if let Some(id) = student.id {
            return Err(RepoError::AlreadyPersisted(id));
        }
        student.validate()?;

        let inserted = self
            .conn
            .execute(
                "INSERT INTO students (
                    name,
                    email,
                    age,
                    course,
                    registered_at,
                    active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    student.name.as_str(),
                    student.email.as_str(),
                    student.age,
                    student.course.as_str(),
                    student.registered_at,
                    bool_to_int(student.active),
                ],
            )
            .map_err(|err| map_write_error(err, &student.email))?;

        if inserted == 0 {
            return Err(RepoError::NotPersisted(
                "could not insert student record".to_string(),
            ));
        }

        let mut created = student.clone();
        created.id = Some(self.conn.last_insert_rowid());
        Ok(created)
    }

    fn find_active_by_id(&self, id: StudentId) -> RepoResult<Option<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE id = ?1
               AND active = 1;"
        ))?;

        let raw = stmt.query_row([id], read_raw_row).optional()?;
        raw.map(RawStudentRow::into_student).transpose()
    }

    fn find_all_active(&self) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE active = 1
             ORDER BY name ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(read_raw_row(row)?.into_student()?);
        }

        Ok(students)
    }

    fn exists_active_email(&self, email: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM students
                WHERE email = ?1 AND active = 1
            );",
            [email],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, student: &Student) -> RepoResult<bool> {
        let id = student.id.ok_or(RepoError::MissingId)?;
        student.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE students
                 SET
                    name = ?1,
                    email = ?2,
                    age = ?3,
                    course = ?4
                 WHERE id = ?5
                   AND active = 1;",
                params![
                    student.name.as_str(),
                    student.email.as_str(),
                    student.age,
                    student.course.as_str(),
                    id,
                ],
            )
            .map_err(|err| map_write_error(err, &student.email))?;

        Ok(changed > 0)
    }

    fn soft_delete(&self, id: StudentId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE students
             SET active = 0
             WHERE id = ?1
               AND active = 1;",
            [id],
        )?;

        Ok(changed > 0)
    }
}

/// Row values before semantic conversion.
struct RawStudentRow {
    id: StudentId,
    name: String,
    email: String,
    age: i32,
    course: String,
    registered_at: i64,
    active: i64,
}

impl RawStudentRow {
    fn into_student(self) -> RepoResult<Student> {
        let id = self.id;
        let active = match self.active {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid active value `{other}` in students.active for id {id}"
                )));
            }
        };

        let student = Student {
            id: Some(id),
            name: self.name,
            email: self.email,
            age: self.age,
            course: self.course,
            registered_at: self.registered_at,
            active,
        };
        student
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("student {id}: {err}")))?;
        Ok(student)
    }
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawStudentRow> {
    Ok(RawStudentRow {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        age: row.get("age")?,
        course: row.get("course")?,
        registered_at: row.get("registered_at")?,
        active: row.get("active")?,
    })
}

fn map_write_error(err: rusqlite::Error, email: &str) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateEmail(email.to_string())
    } else {
        RepoError::from(err)
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_student_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "students")? {
        return Err(RepoError::MissingRequiredTable("students"));
    }

    for column in STUDENT_COLUMNS {
        if !table_has_column(conn, "students", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "students",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
