//! Lock-guarded facade over every entity store.
//!
//! One `parking_lot::Mutex` guards the whole catalog. Each public method
//! takes it exactly once and then works through `Catalog` methods, which
//! assume the lock is held and never re-acquire it.

use crate::entity::{
    Course, Enrollment, Entity, Student, SystemConfig, Teacher, Timetable, UserAuth,
    MAX_COURSE_STUDENTS, MAX_ENROLLED_COURSES,
};
use crate::log::write_atomic;
use crate::store::IndexedStore;
use parking_lot::Mutex;
use quadra_common::{Rejection, Result, StorageConfig};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// File holding the system configuration record.
pub const CONFIG_FILE: &str = "config.dat";

/// Current time in unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Consistent view of the scheduling inputs, taken under one lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Courses ascending by key.
    pub courses: Vec<Course>,
    /// Teachers ascending by key.
    pub teachers: Vec<Teacher>,
    /// Enrollments derived from student records.
    pub enrollments: Vec<Enrollment>,
}

/// Every store plus the config record. Methods assume the caller holds the
/// database lock.
struct Catalog {
    students: IndexedStore<Student>,
    teachers: IndexedStore<Teacher>,
    courses: IndexedStore<Course>,
    timetables: IndexedStore<Timetable>,
    users: IndexedStore<UserAuth>,
    config: SystemConfig,
    config_path: PathBuf,
    fsync: bool,
}

impl Catalog {
    fn open(storage: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&storage.data_dir)?;
        let config_path = storage.data_dir.join(CONFIG_FILE);
        let config = Self::load_config(&config_path)?;

        Ok(Self {
            students: IndexedStore::open(storage)?,
            teachers: IndexedStore::open(storage)?,
            courses: IndexedStore::open(storage)?,
            timetables: IndexedStore::open(storage)?,
            users: IndexedStore::open(storage)?,
            config,
            config_path,
            fsync: storage.fsync_enabled,
        })
    }

    fn load_config(path: &std::path::Path) -> Result<SystemConfig> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SystemConfig::default()),
            Err(e) => return Err(e.into()),
        };
        let line = text.lines().next().unwrap_or_default();
        match SystemConfig::decode(line) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config record unreadable, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save_config(&self) -> Result<()> {
        let mut line = self.config.encode();
        line.push('\n');
        write_atomic(&self.config_path, line.as_bytes(), self.fsync)
    }

    fn flush(&mut self) -> Result<()> {
        self.students.flush()?;
        self.teachers.flush()?;
        self.courses.flush()?;
        self.timetables.flush()?;
        self.users.flush()?;
        self.save_config()
    }

    fn verify(&self) -> Result<()> {
        self.students.verify()?;
        self.teachers.verify()?;
        self.courses.verify()?;
        self.timetables.verify()?;
        self.users.verify()
    }

    fn remove_student(&mut self, student_id: &str) -> Result<bool> {
        let Some(student) = self.students.get(student_id)? else {
            return Ok(false);
        };
        for course_id in &student.enrolled_courses {
            if let Some(mut course) = self.courses.get(course_id)? {
                let before = course.enrolled_students.len();
                course.enrolled_students.retain(|s| s != student_id);
                if course.enrolled_students.len() != before {
                    self.courses.update(&course)?;
                }
            }
        }
        if !student.email.is_empty() {
            self.users.remove(&student.email)?;
        }
        self.students.remove(student_id)
    }

    fn remove_teacher(&mut self, teacher_id: &str) -> Result<bool> {
        let Some(teacher) = self.teachers.get(teacher_id)? else {
            return Ok(false);
        };
        if !teacher.email.is_empty() {
            self.users.remove(&teacher.email)?;
        }
        self.teachers.remove(teacher_id)
    }

    fn remove_course(&mut self, course_id: &str) -> Result<bool> {
        let Some(course) = self.courses.get(course_id)? else {
            return Ok(false);
        };
        for student_id in &course.enrolled_students {
            if let Some(mut student) = self.students.get(student_id)? {
                let before = student.enrolled_courses.len();
                student.enrolled_courses.retain(|c| c != course_id);
                if student.enrolled_courses.len() != before {
                    self.students.update(&student)?;
                }
            }
        }
        self.courses.remove(course_id)
    }

    /// Runs the enrollment checks in order and returns the loaded records
    /// when every check passes.
    fn check_enroll(
        &self,
        student_id: &str,
        course_id: &str,
        now: i64,
    ) -> Result<std::result::Result<(Student, Course), Rejection>> {
        if !self.config.is_registration_open_at(now) {
            return Ok(Err(Rejection::RegistrationClosed));
        }
        let Some(student) = self.students.get(student_id)? else {
            return Ok(Err(Rejection::StudentNotFound));
        };
        if student.enrolled_courses.len() >= MAX_ENROLLED_COURSES {
            return Ok(Err(Rejection::CourseLimitReached));
        }
        let Some(course) = self.courses.get(course_id)? else {
            return Ok(Err(Rejection::CourseNotFound));
        };
        if course.semester != student.semester {
            return Ok(Err(Rejection::SemesterMismatch));
        }
        if course.enrollment_count() >= MAX_COURSE_STUDENTS {
            return Ok(Err(Rejection::CourseFull));
        }
        if student.is_enrolled_in(course_id) || course.has_student(student_id) {
            return Ok(Err(Rejection::AlreadyEnrolled));
        }
        Ok(Ok((student, course)))
    }

    /// Writes both sides of an enrollment change, restoring the student
    /// record if the course write fails.
    fn write_pair(&mut self, original: &Student, student: &Student, course: &Course) -> Result<()> {
        self.students.update(student)?;
        if let Err(e) = self.courses.update(course) {
            if let Err(restore) = self.students.update(original) {
                warn!(student = %original.student_id, error = %restore, "Failed to restore student record");
            }
            return Err(e);
        }
        Ok(())
    }

    fn enroll(&mut self, student_id: &str, course_id: &str, now: i64) -> Result<()> {
        let (original, mut course) = self.check_enroll(student_id, course_id, now)??;
        let mut student = original.clone();
        student.enrolled_courses.push(course_id.to_string());
        course.enrolled_students.push(student_id.to_string());

        self.write_pair(&original, &student, &course)?;
        // Both records are already written; a failed flush is retried later.
        if let Err(e) = self.flush() {
            warn!(student = %student_id, course = %course_id, error = %e, "Flush after enroll failed");
        }
        debug!(student = %student_id, course = %course_id, "Enrolled student");
        Ok(())
    }

    fn drop_course(&mut self, student_id: &str, course_id: &str, now: i64) -> Result<()> {
        if !self.config.is_registration_open_at(now) {
            return Err(Rejection::RegistrationClosed.into());
        }
        let original = self.students.get(student_id)?.ok_or(Rejection::StudentNotFound)?;
        let mut course = self.courses.get(course_id)?.ok_or(Rejection::CourseNotFound)?;
        if !original.is_enrolled_in(course_id) {
            return Err(Rejection::NotEnrolled.into());
        }

        let mut student = original.clone();
        student.enrolled_courses.retain(|c| c != course_id);
        course.enrolled_students.retain(|s| s != student_id);

        self.write_pair(&original, &student, &course)?;
        // Both records are already written; a failed flush is retried later.
        if let Err(e) = self.flush() {
            warn!(student = %student_id, course = %course_id, error = %e, "Flush after drop failed");
        }
        debug!(student = %student_id, course = %course_id, "Dropped course");
        Ok(())
    }

    /// Upserts `timetables` and removes every other stored semester.
    fn write_timetables(&mut self, timetables: &[Timetable]) -> Result<()> {
        let keep: HashSet<String> = timetables.iter().map(|t| t.key()).collect();
        for timetable in timetables {
            self.timetables.add(timetable)?;
        }
        for key in self.timetables.keys() {
            if !keep.contains(&key) {
                self.timetables.remove(&key)?;
            }
        }
        self.timetables.flush()
    }

    /// Swaps in a new timetable set. On error the previous set and
    /// generated flag are put back.
    fn replace_timetables(&mut self, timetables: &[Timetable]) -> Result<()> {
        for timetable in timetables {
            timetable.check_bounds()?;
        }
        let prior = self.timetables.get_all()?;
        let prior_generated = self.config.timetable_generated;

        let result = self.write_timetables(timetables).and_then(|()| {
            self.config.timetable_generated = true;
            self.save_config()
        });
        if let Err(e) = result {
            self.config.timetable_generated = prior_generated;
            if let Err(restore) = self.write_timetables(&prior) {
                warn!(error = %restore, "Failed to restore previous timetables");
            }
            warn!(error = %e, "Timetable replacement failed, previous set kept");
            return Err(e);
        }
        info!(semesters = timetables.len(), "Replaced timetables");
        Ok(())
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            courses: self.courses.get_all()?,
            teachers: self.teachers.get_all()?,
            enrollments: Enrollment::from_students(&self.students.get_all()?),
        })
    }
}

/// Thread-safe entry point to the record stores.
pub struct Database {
    inner: Mutex<Catalog>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens every store under `storage.data_dir`.
    pub fn open(storage: &StorageConfig) -> Result<Self> {
        let catalog = Catalog::open(storage)?;
        info!(data_dir = %storage.data_dir.display(), "Opened database");
        Ok(Self {
            inner: Mutex::new(catalog),
        })
    }

    // ========================================================================
    // Students
    // ========================================================================

    /// Inserts or overwrites a student. Fails on an out-of-range semester
    /// or more than five courses.
    pub fn add_student(&self, student: &Student) -> Result<()> {
        student.check_bounds()?;
        self.inner.lock().students.add(student)
    }

    pub fn student(&self, student_id: &str) -> Result<Option<Student>> {
        self.inner.lock().students.get(student_id)
    }

    pub fn update_student(&self, student: &Student) -> Result<bool> {
        student.check_bounds()?;
        self.inner.lock().students.update(student)
    }

    /// Removes a student, their course memberships and their login record.
    pub fn remove_student(&self, student_id: &str) -> Result<bool> {
        self.inner.lock().remove_student(student_id)
    }

    pub fn student_exists(&self, student_id: &str) -> bool {
        self.inner.lock().students.exists(student_id)
    }

    /// All students ascending by key.
    pub fn students(&self) -> Result<Vec<Student>> {
        self.inner.lock().students.get_all()
    }

    pub fn students_by_semester(&self, semester: u8) -> Result<Vec<Student>> {
        let mut students = self.students()?;
        students.retain(|s| s.semester == semester);
        Ok(students)
    }

    // ========================================================================
    // Teachers
    // ========================================================================

    pub fn add_teacher(&self, teacher: &Teacher) -> Result<()> {
        self.inner.lock().teachers.add(teacher)
    }

    pub fn teacher(&self, teacher_id: &str) -> Result<Option<Teacher>> {
        self.inner.lock().teachers.get(teacher_id)
    }

    pub fn update_teacher(&self, teacher: &Teacher) -> Result<bool> {
        self.inner.lock().teachers.update(teacher)
    }

    /// Removes a teacher and their login record.
    pub fn remove_teacher(&self, teacher_id: &str) -> Result<bool> {
        self.inner.lock().remove_teacher(teacher_id)
    }

    pub fn teacher_exists(&self, teacher_id: &str) -> bool {
        self.inner.lock().teachers.exists(teacher_id)
    }

    pub fn teachers(&self) -> Result<Vec<Teacher>> {
        self.inner.lock().teachers.get_all()
    }

    // ========================================================================
    // Courses
    // ========================================================================

    /// Inserts or overwrites a course. Fails on an out-of-range semester
    /// or more than fifty students.
    pub fn add_course(&self, course: &Course) -> Result<()> {
        course.check_bounds()?;
        self.inner.lock().courses.add(course)
    }

    pub fn course(&self, course_id: &str) -> Result<Option<Course>> {
        self.inner.lock().courses.get(course_id)
    }

    pub fn update_course(&self, course: &Course) -> Result<bool> {
        course.check_bounds()?;
        self.inner.lock().courses.update(course)
    }

    /// Removes a course and drops it from every enrolled student.
    pub fn remove_course(&self, course_id: &str) -> Result<bool> {
        self.inner.lock().remove_course(course_id)
    }

    pub fn course_exists(&self, course_id: &str) -> bool {
        self.inner.lock().courses.exists(course_id)
    }

    pub fn courses(&self) -> Result<Vec<Course>> {
        self.inner.lock().courses.get_all()
    }

    pub fn courses_by_semester(&self, semester: u8) -> Result<Vec<Course>> {
        let mut courses = self.courses()?;
        courses.retain(|c| c.semester == semester);
        Ok(courses)
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn add_user(&self, user: &UserAuth) -> Result<()> {
        self.inner.lock().users.add(user)
    }

    pub fn user(&self, email: &str) -> Result<Option<UserAuth>> {
        self.inner.lock().users.get(email)
    }

    pub fn update_user(&self, user: &UserAuth) -> Result<bool> {
        self.inner.lock().users.update(user)
    }

    pub fn remove_user(&self, email: &str) -> Result<bool> {
        self.inner.lock().users.remove(email)
    }

    pub fn user_exists(&self, email: &str) -> bool {
        self.inner.lock().users.exists(email)
    }

    pub fn users(&self) -> Result<Vec<UserAuth>> {
        self.inner.lock().users.get_all()
    }

    /// Adds `admin` if no user accounts exist yet. Returns true if added.
    pub fn seed_admin(&self, admin: &UserAuth) -> Result<bool> {
        let mut catalog = self.inner.lock();
        if !catalog.users.is_empty() {
            return Ok(false);
        }
        catalog.users.add(admin)?;
        catalog.flush()?;
        info!(email = %admin.email, "Created initial admin account");
        Ok(true)
    }

    // ========================================================================
    // Enrollment
    // ========================================================================

    /// Returns the first rejection that would refuse this enrollment at
    /// `now`, or `None` if it would succeed.
    pub fn can_enroll(&self, student_id: &str, course_id: &str, now: i64) -> Result<Option<Rejection>> {
        let catalog = self.inner.lock();
        Ok(catalog.check_enroll(student_id, course_id, now)?.err())
    }

    /// Enrolls a student in a course, updating both records.
    ///
    /// A rejection leaves both records untouched.
    pub fn enroll_student(&self, student_id: &str, course_id: &str) -> Result<()> {
        self.enroll_student_at(student_id, course_id, unix_now())
    }

    pub fn enroll_student_at(&self, student_id: &str, course_id: &str, now: i64) -> Result<()> {
        self.inner.lock().enroll(student_id, course_id, now)
    }

    /// Removes an enrollment from both records.
    pub fn drop_course(&self, student_id: &str, course_id: &str) -> Result<()> {
        self.drop_course_at(student_id, course_id, unix_now())
    }

    pub fn drop_course_at(&self, student_id: &str, course_id: &str, now: i64) -> Result<()> {
        self.inner.lock().drop_course(student_id, course_id, now)
    }

    /// Every (student, course) pair, derived from student records.
    pub fn enrollments(&self) -> Result<Vec<Enrollment>> {
        let catalog = self.inner.lock();
        Ok(Enrollment::from_students(&catalog.students.get_all()?))
    }

    // ========================================================================
    // Timetables
    // ========================================================================

    pub fn timetable(&self, semester: u8) -> Result<Option<Timetable>> {
        self.inner.lock().timetables.get(&Timetable::key_for(semester))
    }

    /// All timetables ascending by key.
    pub fn timetables(&self) -> Result<Vec<Timetable>> {
        self.inner.lock().timetables.get_all()
    }

    /// Removes every stored timetable and clears the generated flag.
    pub fn clear_timetables(&self) -> Result<()> {
        let mut catalog = self.inner.lock();
        for key in catalog.timetables.keys() {
            catalog.timetables.remove(&key)?;
        }
        catalog.config.timetable_generated = false;
        catalog.flush()
    }

    /// Replaces the whole timetable set and marks timetables generated, in
    /// one critical section. On error the stored set is left as it was.
    pub fn replace_timetables(&self, timetables: Vec<Timetable>) -> Result<()> {
        self.inner.lock().replace_timetables(&timetables)
    }

    /// Consistent copy of courses, teachers and enrollments.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.inner.lock().snapshot()
    }

    // ========================================================================
    // System config
    // ========================================================================

    pub fn config(&self) -> SystemConfig {
        self.inner.lock().config.clone()
    }

    pub fn update_config(&self, config: SystemConfig) -> Result<()> {
        let mut catalog = self.inner.lock();
        catalog.config = config;
        catalog.save_config()
    }

    pub fn is_registration_open(&self) -> bool {
        self.is_registration_open_at(unix_now())
    }

    pub fn is_registration_open_at(&self, now: i64) -> bool {
        self.inner.lock().config.is_registration_open_at(now)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Writes every side-file and the config record.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    /// Runs the integrity check on every store.
    pub fn verify(&self) -> Result<()> {
        self.inner.lock().verify()
    }

    /// Rebuilds every store's indexes from its log.
    pub fn rebuild_indexes(&self) -> Result<()> {
        let mut catalog = self.inner.lock();
        catalog.students.rebuild_indexes()?;
        catalog.teachers.rebuild_indexes()?;
        catalog.courses.rebuild_indexes()?;
        catalog.timetables.rebuild_indexes()?;
        catalog.users.rebuild_indexes()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.inner.get_mut().flush() {
            warn!(error = %e, "Failed to flush database on drop");
        }
    }
}
