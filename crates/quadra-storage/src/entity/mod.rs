//! Entity models and their per-kind codec.
//!
//! Every persisted kind implements [`Entity`]: one key-extraction rule plus
//! encode/decode to a single Record Log line.

mod course;
mod enrollment;
mod student;
mod system_config;
mod teacher;
mod timetable;
mod user;

pub use course::{required_sessions_for, Course};
pub use enrollment::Enrollment;
pub use student::Student;
pub use system_config::SystemConfig;
pub use teacher::Teacher;
pub use timetable::{ScheduledSession, TimeSlot, Timetable, DAYS_PER_WEEK, SLOTS_PER_DAY};
pub use user::{Role, UserAuth};

use quadra_common::{QuadraError, Result};

/// Maximum courses one student may be enrolled in.
pub const MAX_ENROLLED_COURSES: usize = 5;

/// Maximum students one course may hold.
pub const MAX_COURSE_STUDENTS: usize = 50;

/// Valid semester numbers.
pub const SEMESTERS: std::ops::RangeInclusive<u8> = 1..=8;

/// The closed set of persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Teacher,
    Course,
    Timetable,
    UserAuth,
    SystemConfig,
}

impl EntityKind {
    /// Display name, used in codec errors and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Teacher => "Teacher",
            Self::Course => "Course",
            Self::Timetable => "Timetable",
            Self::UserAuth => "UserAuth",
            Self::SystemConfig => "SystemConfig",
        }
    }

    /// Base file name for this kind's log and side-files.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Teacher => "teachers",
            Self::Course => "courses",
            Self::Timetable => "timetables",
            Self::UserAuth => "users",
            Self::SystemConfig => "config",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record kind that can live in an `IndexedStore`.
pub trait Entity: Clone + Sized {
    const KIND: EntityKind;

    /// The unique, non-empty key of this instance.
    fn key(&self) -> String;

    /// Serializes to one Record Log line.
    fn encode(&self) -> String;

    /// Parses one Record Log line.
    fn decode(line: &str) -> Result<Self>;

    /// Checks field bounds before the record is written.
    fn check_bounds(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects a semester outside [`SEMESTERS`].
pub(crate) fn check_semester(kind: EntityKind, semester: u8) -> Result<()> {
    if SEMESTERS.contains(&semester) {
        return Ok(());
    }
    Err(QuadraError::invalid_record(
        kind.name(),
        format!(
            "semester {} outside {}..={}",
            semester,
            SEMESTERS.start(),
            SEMESTERS.end()
        ),
    ))
}
