use super::{Entity, EntityKind};
use crate::codec::{RecordReader, RecordWriter};
use quadra_common::Result;
use serde::{Deserialize, Serialize};

/// A teacher record. Each teacher is assigned at most one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub teacher_id: String,
    pub email: String,
    pub name: String,
    pub assigned_course_id: String,
    pub department: String,
    pub contact_info: String,
}

impl Teacher {
    pub fn new(teacher_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            email: String::new(),
            name: name.into(),
            assigned_course_id: String::new(),
            department: String::new(),
            contact_info: String::new(),
        }
    }
}

impl Entity for Teacher {
    const KIND: EntityKind = EntityKind::Teacher;

    fn key(&self) -> String {
        self.teacher_id.clone()
    }

    fn encode(&self) -> String {
        RecordWriter::new()
            .str(&self.teacher_id)
            .str(&self.email)
            .str(&self.name)
            .str(&self.assigned_course_id)
            .str(&self.department)
            .str(&self.contact_info)
            .finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 6)?;
        Ok(Self {
            teacher_id: r.key()?,
            email: r.str()?,
            name: r.str()?,
            assigned_course_id: r.str()?,
            department: r.str()?,
            contact_info: r.str()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_codec() {
        let mut teacher = Teacher::new("T1", "Dr. Grace");
        teacher.department = "Computer Science | Theory".to_string();
        teacher.assigned_course_id = "CS201".to_string();
        assert_eq!(Teacher::decode(&teacher.encode()).unwrap(), teacher);
    }

    #[test]
    fn test_teacher_rejects_empty_key() {
        assert!(Teacher::decode("|e|n|c|d|x").is_err());
    }
}
