//! Error types for Quadra.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using QuadraError.
pub type Result<T> = std::result::Result<T, QuadraError>;

/// Errors that can occur in Quadra operations.
#[derive(Debug, Error)]
pub enum QuadraError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Record log and codec errors
    #[error("Codec error for {kind}: {reason}")]
    Codec { kind: &'static str, reason: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid {kind} record: {reason}")]
    InvalidRecord { kind: &'static str, reason: String },

    #[error("Record not found at location {location}")]
    RecordNotFound { location: u64 },

    // Index errors
    #[error("Side-file corrupted: {}, reason: {reason}", path.display())]
    SideFileCorrupted { path: PathBuf, reason: String },

    #[error("Index inconsistent: {0}")]
    IndexInconsistent(String),

    // Domain rejections
    #[error("Rejected: {0}")]
    Rejected(Rejection),

    // Scheduling errors
    #[error("Could not generate a conflict-free timetable (failed at course {course_id})")]
    Infeasible { course_id: String },

    #[error("Generated timetable failed validation: {0}")]
    ScheduleConflict(String),

    #[error("No courses to schedule")]
    NothingToSchedule,

    #[error("Scheduling run already in progress")]
    SchedulingInProgress,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuadraError {
    /// Builds a codec error for the given entity kind.
    pub fn codec(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Codec {
            kind,
            reason: reason.into(),
        }
    }

    /// Builds an out-of-bounds record error for the given entity kind.
    pub fn invalid_record(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns the rejection if this error is a precondition violation.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<Rejection> for QuadraError {
    fn from(r: Rejection) -> Self {
        Self::Rejected(r)
    }
}

/// Named reasons for refusing an enrollment change.
///
/// The `Display` text is the reason string shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    RegistrationClosed,
    StudentNotFound,
    CourseLimitReached,
    CourseNotFound,
    SemesterMismatch,
    CourseFull,
    AlreadyEnrolled,
    NotEnrolled,
}

impl Rejection {
    /// Human-readable reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RegistrationClosed => "Registration window is closed",
            Self::StudentNotFound => "Student not found",
            Self::CourseLimitReached => "Student already enrolled in maximum 5 courses",
            Self::CourseNotFound => "Course not found",
            Self::SemesterMismatch => "Course is not in student's current semester",
            Self::CourseFull => "Course is full (50 students maximum)",
            Self::AlreadyEnrolled => "Student already enrolled in this course",
            Self::NotEnrolled => "Student is not enrolled in this course",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: QuadraError = io_err.into();
        assert!(matches!(err, QuadraError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_codec_display() {
        let err = QuadraError::codec("Student", "expected 7 fields, got 3");
        assert_eq!(
            err.to_string(),
            "Codec error for Student: expected 7 fields, got 3"
        );
    }

    #[test]
    fn test_invalid_record_display() {
        let err = QuadraError::invalid_record("Course", "semester 0 outside 1..=8");
        assert_eq!(
            err.to_string(),
            "Invalid Course record: semester 0 outside 1..=8"
        );
        assert_eq!(err.rejection(), None);
    }

    #[test]
    fn test_record_not_found_display() {
        let err = QuadraError::RecordNotFound { location: 42 };
        assert_eq!(err.to_string(), "Record not found at location 42");
    }

    #[test]
    fn test_side_file_corrupted_display() {
        let err = QuadraError::SideFileCorrupted {
            path: PathBuf::from("data/students.hash"),
            reason: "checksum mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Side-file corrupted: data/students.hash, reason: checksum mismatch"
        );
    }

    #[test]
    fn test_rejection_display() {
        let err: QuadraError = Rejection::CourseFull.into();
        assert_eq!(
            err.to_string(),
            "Rejected: Course is full (50 students maximum)"
        );
        assert_eq!(err.rejection(), Some(Rejection::CourseFull));
        assert_eq!(
            Rejection::CourseLimitReached.to_string(),
            "Student already enrolled in maximum 5 courses"
        );
    }

    #[test]
    fn test_scheduling_errors_display() {
        let err = QuadraError::Infeasible {
            course_id: "CS201".to_string(),
        };
        assert!(err
            .to_string()
            .starts_with("Could not generate a conflict-free timetable"));
        assert!(err.to_string().contains("CS201"));

        assert_eq!(
            QuadraError::NothingToSchedule.to_string(),
            "No courses to schedule"
        );
        assert_eq!(
            QuadraError::SchedulingInProgress.to_string(),
            "Scheduling run already in progress"
        );
        assert_eq!(
            QuadraError::ScheduleConflict("Teacher T1 double-booked".to_string()).to_string(),
            "Generated timetable failed validation: Teacher T1 double-booked"
        );
    }

    #[test]
    fn test_non_rejection_has_no_rejection() {
        assert!(QuadraError::NothingToSchedule.rejection().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QuadraError>();
    }
}
