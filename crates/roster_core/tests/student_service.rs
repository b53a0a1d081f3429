use roster_core::db::open_db_in_memory;
use roster_core::{
    InMemoryStudentRepository, RepoError, RepoResult, SqliteStudentRepository, Student,
    StudentDraft, StudentId, StudentRepository, StudentService, StudentServiceError,
    StudentValidationError,
};
use std::cell::RefCell;

/// Repository double that records calls and can inject races.
#[derive(Default)]
struct RecordingRepository {
    inner: InMemoryStudentRepository,
    calls: RefCell<Vec<&'static str>>,
    /// Pretends no email is taken so only storage can catch duplicates.
    blind_email_check: bool,
    /// Deletes the target row right before `update` reaches storage.
    delete_before_update: bool,
}

impl RecordingRepository {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl StudentRepository for RecordingRepository {
    fn create(&self, student: &Student) -> RepoResult<Student> {
        self.record("create");
        self.inner.create(student)
    }

    fn find_active_by_id(&self, id: StudentId) -> RepoResult<Option<Student>> {
        self.record("find_active_by_id");
        self.inner.find_active_by_id(id)
    }

    fn find_all_active(&self) -> RepoResult<Vec<Student>> {
        self.record("find_all_active");
        self.inner.find_all_active()
    }

    fn exists_active_email(&self, email: &str) -> RepoResult<bool> {
        self.record("exists_active_email");
        if self.blind_email_check {
            return Ok(false);
        }
        self.inner.exists_active_email(email)
    }

    fn update(&self, student: &Student) -> RepoResult<bool> {
        self.record("update");
        if self.delete_before_update {
            if let Some(id) = student.id {
                self.inner.soft_delete(id)?;
            }
        }
        self.inner.update(student)
    }

    fn soft_delete(&self, id: StudentId) -> RepoResult<bool> {
        self.record("soft_delete");
        self.inner.soft_delete(id)
    }
}

struct FailingCreateRepository;

impl StudentRepository for FailingCreateRepository {
    fn create(&self, _student: &Student) -> RepoResult<Student> {
        Err(RepoError::NotPersisted(
            "could not insert student record".to_string(),
        ))
    }

    fn find_active_by_id(&self, _id: StudentId) -> RepoResult<Option<Student>> {
        Ok(None)
    }

    fn find_all_active(&self) -> RepoResult<Vec<Student>> {
        Ok(Vec::new())
    }

    fn exists_active_email(&self, _email: &str) -> RepoResult<bool> {
        Ok(false)
    }

    fn update(&self, _student: &Student) -> RepoResult<bool> {
        Ok(false)
    }

    fn soft_delete(&self, _id: StudentId) -> RepoResult<bool> {
        Ok(false)
    }
}

fn draft(name: &str, email: &str, age: i32, course: &str) -> StudentDraft {
    StudentDraft::new(name, email, age, course)
}

#[test]
fn lifecycle_scenario_on_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let service = StudentService::new(SqliteStudentRepository::try_new(&conn).unwrap());

    let created = service
        .create(draft("Ana Martínez", "ana@x.com", 24, "Topic A"))
        .unwrap();
    assert_eq!(created.id, Some(1));
    assert!(created.active);

    let updated = service
        .update(1, draft("Ana M.", "ana@x.com", 25, "Topic B"))
        .unwrap();
    assert_eq!(updated.name, "Ana M.");
    assert_eq!(updated.age, 25);
    assert_eq!(updated.course, "Topic B");
    assert_eq!(updated.registered_at, created.registered_at);

    let fetched = service.get_by_id(1).unwrap().unwrap();
    assert_eq!(fetched.name, "Ana M.");
    assert_eq!(fetched.registered_at, created.registered_at);

    assert!(service.delete(1).unwrap());
    assert!(service.get_by_id(1).unwrap().is_none());
    assert!(service.list_all().unwrap().is_empty());

    let err = service
        .update(1, draft("Ana M.", "ana@x.com", 25, "Topic B"))
        .unwrap_err();
    assert!(matches!(err, StudentServiceError::NotFound(1)));
}

#[test]
fn create_then_get_returns_equal_fields() {
    let service = StudentService::new(InMemoryStudentRepository::new());

    let created = service
        .create(draft("Bruno Díaz", "bruno@x.com", 33, "Systems"))
        .unwrap();
    let id = created.id.expect("created student has id");
    let fetched = service.get_by_id(id).unwrap().unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.name, created.name);
    assert_eq!(fetched.email, created.email);
    assert_eq!(fetched.age, created.age);
    assert_eq!(fetched.course, created.course);
    assert_eq!(fetched.registered_at, created.registered_at);
    assert!(fetched.active);
}

#[test]
fn create_with_duplicate_active_email_fails_regardless_of_other_fields() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);
    service
        .create(draft("Ana", "dup@x.com", 24, "Topic A"))
        .unwrap();
    repo.clear();

    let err = service
        .create(draft("Completely Different", "dup@x.com", 60, "Other"))
        .unwrap_err();

    assert!(matches!(&err, StudentServiceError::DuplicateEmail(email) if email == "dup@x.com"));
    assert_eq!(repo.calls(), ["exists_active_email"]);
}

#[test]
fn create_reports_storage_level_duplicate_when_precheck_misses_it() {
    let repo = RecordingRepository {
        blind_email_check: true,
        ..RecordingRepository::default()
    };
    let service = StudentService::new(&repo);
    service
        .create(draft("Ana", "race@x.com", 24, "Topic A"))
        .unwrap();

    let err = service
        .create(draft("Bruno", "race@x.com", 30, "Topic B"))
        .unwrap_err();

    assert!(matches!(err, StudentServiceError::DuplicateEmail(_)));
}

#[test]
fn update_reports_storage_level_duplicate_when_precheck_misses_it() {
    let repo = RecordingRepository {
        blind_email_check: true,
        ..RecordingRepository::default()
    };
    let service = StudentService::new(&repo);
    service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    let bruno = service
        .create(draft("Bruno", "bruno@x.com", 30, "Topic B"))
        .unwrap();
    repo.clear();

    let err = service
        .update(bruno.id.unwrap(), draft("Bruno", "ana@x.com", 30, "Topic B"))
        .unwrap_err();

    assert!(matches!(&err, StudentServiceError::DuplicateEmail(email) if email == "ana@x.com"));
    assert_eq!(
        repo.calls(),
        ["find_active_by_id", "exists_active_email", "update"]
    );
    let stored = service.get_by_id(bruno.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.email, "bruno@x.com");
}

#[test]
fn wrapped_errors_do_not_repeat_their_message_as_source() {
    use std::error::Error;

    let service = StudentService::new(InMemoryStudentRepository::new());
    let err = service
        .create(draft("Ana", "ana@x.com", 10, "Topic A"))
        .unwrap_err();
    assert_eq!(err.to_string(), "age must be between 18 and 100");
    assert!(err.source().is_none());

    let err = StudentServiceError::from(RepoError::NotPersisted(
        "could not update record with id 7".to_string(),
    ));
    assert_eq!(err.to_string(), "could not update record with id 7");
    assert!(err.source().is_none());
}

#[test]
fn create_validation_failure_never_reaches_repository() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);

    let err = service.create(draft("A", "bad", 10, "")).unwrap_err();

    assert!(matches!(
        err,
        StudentServiceError::Validation(StudentValidationError::InvalidName)
    ));
    assert_eq!(err.to_string(), "name is required and must be at least 2 characters");
    assert!(repo.calls().is_empty());
}

#[test]
fn create_surfaces_storage_write_failure_as_persistence_error() {
    let service = StudentService::new(FailingCreateRepository);

    let err = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap_err();

    assert!(matches!(
        err,
        StudentServiceError::Persistence(RepoError::NotPersisted(_))
    ));
}

#[test]
fn age_boundaries_are_inclusive() {
    let service = StudentService::new(InMemoryStudentRepository::new());

    assert!(service.create(draft("Young", "young@x.com", 18, "A")).is_ok());
    assert!(service.create(draft("Old", "old@x.com", 100, "A")).is_ok());

    for age in [17, 101] {
        let err = service
            .create(draft("Out", "out@x.com", age, "A"))
            .unwrap_err();
        assert_eq!(err.to_string(), "age must be between 18 and 100");
    }
}

#[test]
fn list_all_orders_by_name() {
    let service = StudentService::new(InMemoryStudentRepository::new());
    service.create(draft("Beta", "beta@x.com", 20, "A")).unwrap();
    service.create(draft("Alpha", "alpha@x.com", 21, "A")).unwrap();

    let names: Vec<String> = service
        .list_all()
        .unwrap()
        .into_iter()
        .map(|student| student.name)
        .collect();

    assert_eq!(names, ["Alpha", "Beta"]);
}

#[test]
fn list_all_on_empty_store_is_empty() {
    let service = StudentService::new(InMemoryStudentRepository::new());
    assert!(service.list_all().unwrap().is_empty());
}

#[test]
fn invalid_ids_are_rejected_before_repository_access() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);

    for id in [0, -1] {
        assert!(matches!(
            service.get_by_id(id),
            Err(StudentServiceError::InvalidId(_))
        ));
        assert!(matches!(
            service.delete(id),
            Err(StudentServiceError::InvalidId(_))
        ));
        assert!(matches!(
            service.update(id, draft("Ana", "ana@x.com", 24, "A")),
            Err(StudentServiceError::InvalidId(_))
        ));
    }

    assert!(repo.calls().is_empty());
}

#[test]
fn get_by_id_returns_none_for_unknown_id() {
    let service = StudentService::new(InMemoryStudentRepository::new());
    assert!(service.get_by_id(99).unwrap().is_none());
}

#[test]
fn update_with_unchanged_email_skips_uniqueness_lookup() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);
    let created = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    repo.clear();

    service
        .update(created.id.unwrap(), draft("Ana M.", "ana@x.com", 25, "Topic B"))
        .unwrap();

    assert_eq!(repo.calls(), ["find_active_by_id", "update"]);
}

#[test]
fn update_with_new_email_checks_uniqueness() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);
    let created = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    repo.clear();

    let updated = service
        .update(created.id.unwrap(), draft("Ana", "ana.new@x.com", 24, "Topic A"))
        .unwrap();

    assert_eq!(updated.email, "ana.new@x.com");
    assert_eq!(
        repo.calls(),
        ["find_active_by_id", "exists_active_email", "update"]
    );
}

#[test]
fn update_into_email_of_other_active_student_fails() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);
    service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    let bruno = service
        .create(draft("Bruno", "bruno@x.com", 30, "Topic B"))
        .unwrap();
    repo.clear();

    let err = service
        .update(bruno.id.unwrap(), draft("Bruno", "ana@x.com", 30, "Topic B"))
        .unwrap_err();

    assert!(matches!(err, StudentServiceError::DuplicateEmail(_)));
    assert!(!repo.calls().contains(&"update"));
}

#[test]
fn update_validates_fields_before_lookup() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);

    let err = service
        .update(5, draft("Ana", "ana@x.com", 24, " "))
        .unwrap_err();

    assert!(matches!(
        err,
        StudentServiceError::Validation(StudentValidationError::MissingCourse)
    ));
    assert!(repo.calls().is_empty());
}

#[test]
fn update_of_unknown_id_fails_with_not_found() {
    let repo = RecordingRepository::default();
    let service = StudentService::new(&repo);

    let err = service
        .update(99, draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap_err();

    assert!(matches!(err, StudentServiceError::NotFound(99)));
    assert_eq!(repo.calls(), ["find_active_by_id"]);
}

#[test]
fn update_lost_to_concurrent_delete_is_a_persistence_error() {
    let repo = RecordingRepository {
        delete_before_update: true,
        ..RecordingRepository::default()
    };
    let service = StudentService::new(&repo);
    let created = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    let id = created.id.unwrap();

    let err = service
        .update(id, draft("Ana M.", "ana@x.com", 25, "Topic B"))
        .unwrap_err();

    assert!(matches!(err, StudentServiceError::Persistence(_)));
    assert_eq!(
        err.to_string(),
        format!("could not update record with id {id}")
    );
}

#[test]
fn delete_returns_false_for_unknown_or_already_deleted() {
    let service = StudentService::new(InMemoryStudentRepository::new());
    let created = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    let id = created.id.unwrap();

    assert!(!service.delete(id + 1).unwrap());
    assert!(service.delete(id).unwrap());
    assert!(!service.delete(id).unwrap());
}

#[test]
fn deleted_student_is_excluded_from_list() {
    let service = StudentService::new(InMemoryStudentRepository::new());
    let ana = service
        .create(draft("Ana", "ana@x.com", 24, "Topic A"))
        .unwrap();
    let bruno = service
        .create(draft("Bruno", "bruno@x.com", 30, "Topic B"))
        .unwrap();

    service.delete(ana.id.unwrap()).unwrap();

    let ids: Vec<_> = service
        .list_all()
        .unwrap()
        .into_iter()
        .map(|student| student.id)
        .collect();
    assert_eq!(ids, [bruno.id]);
}

#[test]
fn error_codes_are_stable() {
    let service = StudentService::new(InMemoryStudentRepository::new());

    assert_eq!(service.get_by_id(0).unwrap_err().code(), "invalid_id");
    assert_eq!(
        service
            .update(3, draft("Ana", "ana@x.com", 24, "A"))
            .unwrap_err()
            .code(),
        "not_found"
    );
    assert_eq!(
        service
            .create(draft("Ana", "nope", 24, "A"))
            .unwrap_err()
            .code(),
        "validation_error"
    );
}
