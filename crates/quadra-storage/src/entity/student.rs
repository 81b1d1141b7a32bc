use super::{check_semester, Entity, EntityKind, MAX_ENROLLED_COURSES};
use crate::codec::{RecordReader, RecordWriter};
use quadra_common::{QuadraError, Result};
use serde::{Deserialize, Serialize};

/// A student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub email: String,
    pub name: String,
    /// Current semester, 1 to 8.
    pub semester: u8,
    /// Course keys, at most five.
    pub enrolled_courses: Vec<String>,
    pub contact_info: String,
    /// Unix seconds.
    pub admission_date: i64,
}

impl Student {
    pub fn new(student_id: impl Into<String>, name: impl Into<String>, semester: u8) -> Self {
        Self {
            student_id: student_id.into(),
            email: String::new(),
            name: name.into(),
            semester,
            enrolled_courses: Vec::new(),
            contact_info: String::new(),
            admission_date: 0,
        }
    }

    pub fn is_enrolled_in(&self, course_id: &str) -> bool {
        self.enrolled_courses.iter().any(|c| c == course_id)
    }
}

impl Entity for Student {
    const KIND: EntityKind = EntityKind::Student;

    fn key(&self) -> String {
        self.student_id.clone()
    }

    fn encode(&self) -> String {
        RecordWriter::new()
            .str(&self.student_id)
            .str(&self.email)
            .str(&self.name)
            .num(self.semester)
            .list(&self.enrolled_courses)
            .str(&self.contact_info)
            .num(self.admission_date)
            .finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 7)?;
        Ok(Self {
            student_id: r.key()?,
            email: r.str()?,
            name: r.str()?,
            semester: r.num()?,
            enrolled_courses: r.list()?,
            contact_info: r.str()?,
            admission_date: r.num()?,
        })
    }

    fn check_bounds(&self) -> Result<()> {
        check_semester(Self::KIND, self.semester)?;
        if self.enrolled_courses.len() > MAX_ENROLLED_COURSES {
            return Err(QuadraError::invalid_record(
                Self::KIND.name(),
                format!(
                    "{} courses, at most {}",
                    self.enrolled_courses.len(),
                    MAX_ENROLLED_COURSES
                ),
            ));
        }
        Ok(())
    }
}
