use super::Student;
use serde::{Deserialize, Serialize};

/// A (student, course) pair. Derived from student records, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: String,
}

impl Enrollment {
    /// Every enrollment named by `students`, in student then course order.
    pub fn from_students(students: &[Student]) -> Vec<Enrollment> {
        students
            .iter()
            .flat_map(|s| {
                s.enrolled_courses.iter().map(move |c| Enrollment {
                    student_id: s.student_id.clone(),
                    course_id: c.clone(),
                })
            })
            .collect()
    }
}
