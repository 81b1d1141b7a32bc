//! Busy-slot bookkeeping for teachers, classrooms and students.

use quadra_storage::{Course, TimeSlot};
use std::collections::{BTreeSet, HashMap};

/// Which slots each resource is already committed to during a run.
///
/// A course with an empty teacher id places no teacher constraint.
#[derive(Debug, Default, Clone)]
pub struct Occupancy {
    teachers: HashMap<String, BTreeSet<TimeSlot>>,
    classrooms: HashMap<u8, BTreeSet<TimeSlot>>,
    students: HashMap<String, BTreeSet<TimeSlot>>,
}

fn busy<K>(map: &HashMap<K, BTreeSet<TimeSlot>>, key: &K, slot: &TimeSlot) -> bool
where
    K: std::hash::Hash + Eq,
{
    map.get(key).is_some_and(|slots| slots.contains(slot))
}

fn release<K>(map: &mut HashMap<K, BTreeSet<TimeSlot>>, key: &K, slot: &TimeSlot)
where
    K: std::hash::Hash + Eq,
{
    if let Some(slots) = map.get_mut(key) {
        slots.remove(slot);
        if slots.is_empty() {
            map.remove(key);
        }
    }
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the course's teacher, `classroom` and every enrolled student
    /// are all free at `slot`.
    pub fn is_free(&self, course: &Course, classroom: u8, slot: &TimeSlot) -> bool {
        if busy(&self.classrooms, &classroom, slot) {
            return false;
        }
        if !course.teacher_id.is_empty() && busy(&self.teachers, &course.teacher_id, slot) {
            return false;
        }
        !course
            .enrolled_students
            .iter()
            .any(|s| busy(&self.students, s, slot))
    }

    /// Every slot of the week free for this course in `classroom`, in
    /// day-major order.
    pub fn free_slots(&self, course: &Course, classroom: u8) -> Vec<TimeSlot> {
        TimeSlot::week()
            .filter(|slot| self.is_free(course, classroom, slot))
            .collect()
    }

    /// Marks `slots` busy for the course's teacher, `classroom` and students.
    pub fn mark(&mut self, course: &Course, classroom: u8, slots: &[TimeSlot]) {
        let room = self.classrooms.entry(classroom).or_default();
        room.extend(slots.iter().copied());
        if !course.teacher_id.is_empty() {
            self.teachers
                .entry(course.teacher_id.clone())
                .or_default()
                .extend(slots.iter().copied());
        }
        for student in &course.enrolled_students {
            self.students
                .entry(student.clone())
                .or_default()
                .extend(slots.iter().copied());
        }
    }

    /// Reverses a previous `mark` with the same arguments.
    pub fn unmark(&mut self, course: &Course, classroom: u8, slots: &[TimeSlot]) {
        for slot in slots {
            release(&mut self.classrooms, &classroom, slot);
            if !course.teacher_id.is_empty() {
                release(&mut self.teachers, &course.teacher_id, slot);
            }
            for student in &course.enrolled_students {
                release(&mut self.students, student, slot);
            }
        }
    }

    /// True if nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty() && self.classrooms.is_empty() && self.students.is_empty()
    }
}
