//! Shared scheduling interface.

use quadra_common::Result;
use quadra_storage::{Course, Enrollment, ScheduledSession, Snapshot, TimeSlot, Timetable};
use std::collections::{BTreeMap, HashMap};

/// Teacher name used when a course's teacher record is missing.
pub const UNKNOWN_TEACHER: &str = "Unknown";

/// Everything a strategy reads. Built once from a database snapshot so the
/// search runs without holding the store lock.
#[derive(Debug, Clone, Default)]
pub struct ScheduleInput {
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    teacher_names: HashMap<String, String>,
}

impl ScheduleInput {
    pub fn new(courses: Vec<Course>, enrollments: Vec<Enrollment>) -> Self {
        Self {
            courses,
            enrollments,
            teacher_names: HashMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let teacher_names = snapshot
            .teachers
            .into_iter()
            .map(|t| (t.teacher_id, t.name))
            .collect();
        Self {
            courses: snapshot.courses,
            enrollments: snapshot.enrollments,
            teacher_names,
        }
    }

    pub fn with_teacher(mut self, teacher_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.teacher_names.insert(teacher_id.into(), name.into());
        self
    }

    /// Display name for a teacher key, or "Unknown".
    pub fn teacher_name(&self, teacher_id: &str) -> &str {
        self.teacher_names
            .get(teacher_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TEACHER)
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.course_id == course_id)
    }

    pub(crate) fn session(
        &self,
        course: &Course,
        classroom: u8,
        slots: Vec<TimeSlot>,
        student_ids: Vec<String>,
    ) -> ScheduledSession {
        ScheduledSession {
            course_id: course.course_id.clone(),
            course_name: course.name.clone(),
            teacher_id: course.teacher_id.clone(),
            teacher_name: self.teacher_name(&course.teacher_id).to_string(),
            classroom,
            slots,
            student_ids,
        }
    }
}

/// Output of one planning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub sessions: Vec<ScheduledSession>,
    /// Course keys the strategy could not place.
    pub unscheduled: Vec<String>,
}

impl Plan {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }

    pub fn session(&self, course_id: &str) -> Option<&ScheduledSession> {
        self.sessions.iter().find(|s| s.course_id == course_id)
    }

    /// Groups sessions into one timetable per semester that received at
    /// least one session, ascending by semester. Sessions whose course is
    /// not in `courses` are dropped.
    pub fn into_timetables(self, courses: &[Course]) -> Vec<Timetable> {
        let semesters: HashMap<&str, u8> = courses
            .iter()
            .map(|c| (c.course_id.as_str(), c.semester))
            .collect();
        let mut by_semester: BTreeMap<u8, Timetable> = BTreeMap::new();
        for session in self.sessions {
            let Some(&semester) = semesters.get(session.course_id.as_str()) else {
                continue;
            };
            by_semester
                .entry(semester)
                .or_insert_with(|| Timetable::new(semester))
                .sessions
                .push(session);
        }
        by_semester.into_values().collect()
    }
}

/// A way of turning courses and enrollments into sessions.
pub trait SchedulingStrategy {
    fn name(&self) -> &'static str;

    fn plan(&self, input: &ScheduleInput) -> Result<Plan>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_storage::Teacher;

    #[test]
    fn test_teacher_name_falls_back() {
        let snapshot = Snapshot {
            courses: vec![Course::new("CS1", "Intro", 1, "T1")],
            teachers: vec![Teacher::new("T1", "Ada")],
            enrollments: Vec::new(),
        };
        let input = ScheduleInput::from_snapshot(snapshot);
        assert_eq!(input.teacher_name("T1"), "Ada");
        assert_eq!(input.teacher_name("T2"), UNKNOWN_TEACHER);
    }

    #[test]
    fn test_into_timetables_groups_by_semester() {
        let courses = vec![
            Course::new("CS1", "A", 3, "T1"),
            Course::new("MATH1", "B", 1, "T2"),
            Course::new("CS2", "C", 3, "T3"),
        ];
        let input = ScheduleInput::new(courses.clone(), Vec::new());
        let plan = Plan {
            sessions: courses
                .iter()
                .map(|c| input.session(c, 1, vec![TimeSlot::new(0, 0)], Vec::new()))
                .chain(std::iter::once(ScheduledSession {
                    course_id: "GONE".to_string(),
                    ..input.session(&courses[0], 1, Vec::new(), Vec::new())
                }))
                .collect(),
            unscheduled: Vec::new(),
        };

        let timetables = plan.into_timetables(&courses);
        assert_eq!(timetables.len(), 2);
        assert_eq!(timetables[0].semester, 1);
        assert_eq!(timetables[0].sessions.len(), 1);
        assert_eq!(timetables[1].semester, 3);
        let ids: Vec<_> = timetables[1].sessions.iter().map(|s| s.course_id.as_str()).collect();
        assert_eq!(ids, ["CS1", "CS2"]);
    }
}
