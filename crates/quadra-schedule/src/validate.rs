//! Post-hoc checks on generated sessions.
//!
//! Detects:
//! - Two sessions in one classroom at the same slot
//! - A teacher booked twice at the same slot
//! - A student booked twice at the same slot
//! - A session whose slot count differs from its course's requirement
//! - Slots outside the weekly grid

use quadra_storage::{required_sessions_for, ScheduledSession, TimeSlot};
use std::collections::HashMap;
use std::fmt;

/// Validation result.
pub type ValidationResult = Result<(), Vec<Conflict>>;

/// One detected problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Classroom,
    Teacher,
    Student,
    SessionCount,
    InvalidSlot,
}

impl Conflict {
    fn new(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Records first holder of each (resource, slot) and reports later ones.
struct Bookings<'a, K> {
    kind: ConflictKind,
    label: &'static str,
    held: HashMap<(K, TimeSlot), &'a str>,
}

impl<'a, K> Bookings<'a, K>
where
    K: std::hash::Hash + Eq + fmt::Display + Clone,
{
    fn new(kind: ConflictKind, label: &'static str) -> Self {
        Self {
            kind,
            label,
            held: HashMap::new(),
        }
    }

    fn book(&mut self, resource: K, slot: TimeSlot, course_id: &'a str, out: &mut Vec<Conflict>) {
        if let Some(first) = self.held.get(&(resource.clone(), slot)) {
            out.push(Conflict::new(
                self.kind,
                format!(
                    "{} {} double-booked at {}: {} and {}",
                    self.label, resource, slot, first, course_id
                ),
            ));
        } else {
            self.held.insert((resource, slot), course_id);
        }
    }
}

/// Checks classroom, teacher and student double-booking only.
pub fn validate_bookings(sessions: &[ScheduledSession]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut rooms: Bookings<'_, u8> = Bookings::new(ConflictKind::Classroom, "Classroom");
    let mut teachers: Bookings<'_, &str> = Bookings::new(ConflictKind::Teacher, "Teacher");
    let mut students: Bookings<'_, &str> = Bookings::new(ConflictKind::Student, "Student");

    for session in sessions {
        let course_id = session.course_id.as_str();
        for &slot in &session.slots {
            if !slot.is_valid() {
                errors.push(Conflict::new(
                    ConflictKind::InvalidSlot,
                    format!("Course {} uses slot {}:{} outside the week", course_id, slot.day, slot.hour),
                ));
                continue;
            }
            rooms.book(session.classroom, slot, course_id, &mut errors);
            if !session.teacher_id.is_empty() {
                teachers.book(session.teacher_id.as_str(), slot, course_id, &mut errors);
            }
            for student in &session.student_ids {
                students.book(student.as_str(), slot, course_id, &mut errors);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks double-booking plus each session's slot count against its
/// course key.
pub fn validate_sessions(sessions: &[ScheduledSession]) -> ValidationResult {
    let mut errors = validate_bookings(sessions).err().unwrap_or_default();

    for session in sessions {
        let required = required_sessions_for(&session.course_id);
        if session.slots.len() != required {
            errors.push(Conflict::new(
                ConflictKind::SessionCount,
                format!(
                    "Course {} has {} sessions, expected {}",
                    session.course_id,
                    session.slots.len(),
                    required
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
