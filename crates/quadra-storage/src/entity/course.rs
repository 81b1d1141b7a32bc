use super::{check_semester, Entity, EntityKind, MAX_COURSE_STUDENTS};
use crate::codec::{RecordReader, RecordWriter};
use quadra_common::{QuadraError, Result};
use serde::{Deserialize, Serialize};

/// Weekly sessions for a course key: 3 for "CS" courses, 2 otherwise.
pub fn required_sessions_for(course_id: &str) -> usize {
    if course_id.starts_with("CS") {
        3
    } else {
        2
    }
}

/// A course record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub name: String,
    /// Semester the course is offered in, 1 to 8.
    pub semester: u8,
    pub teacher_id: String,
    /// Student keys, at most fifty.
    pub enrolled_students: Vec<String>,
}

impl Course {
    pub fn new(
        course_id: impl Into<String>,
        name: impl Into<String>,
        semester: u8,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            name: name.into(),
            semester,
            teacher_id: teacher_id.into(),
            enrolled_students: Vec::new(),
        }
    }

    #[inline]
    pub fn enrollment_count(&self) -> usize {
        self.enrolled_students.len()
    }

    /// Weekly sessions this course needs.
    pub fn required_sessions(&self) -> usize {
        required_sessions_for(&self.course_id)
    }

    pub fn has_student(&self, student_id: &str) -> bool {
        self.enrolled_students.iter().any(|s| s == student_id)
    }
}

impl Entity for Course {
    const KIND: EntityKind = EntityKind::Course;

    fn key(&self) -> String {
        self.course_id.clone()
    }

    fn encode(&self) -> String {
        RecordWriter::new()
            .str(&self.course_id)
            .str(&self.name)
            .num(self.semester)
            .str(&self.teacher_id)
            .list(&self.enrolled_students)
            .finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 5)?;
        Ok(Self {
            course_id: r.key()?,
            name: r.str()?,
            semester: r.num()?,
            teacher_id: r.str()?,
            enrolled_students: r.list()?,
        })
    }

    fn check_bounds(&self) -> Result<()> {
        check_semester(Self::KIND, self.semester)?;
        if self.enrolled_students.len() > MAX_COURSE_STUDENTS {
            return Err(QuadraError::invalid_record(
                Self::KIND.name(),
                format!(
                    "{} students, at most {}",
                    self.enrolled_students.len(),
                    MAX_COURSE_STUDENTS
                ),
            ));
        }
        Ok(())
    }
}
