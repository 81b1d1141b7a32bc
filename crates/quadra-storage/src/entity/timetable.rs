use super::{check_semester, Entity, EntityKind};
use crate::codec::{join_list, split_list, RecordReader, RecordWriter};
use quadra_common::{QuadraError, Result};
use serde::{Deserialize, Serialize};

/// Teaching days per week.
pub const DAYS_PER_WEEK: u8 = 5;

/// Session slots per day.
pub const SLOTS_PER_DAY: u8 = 5;

const DAY_NAMES: [&str; DAYS_PER_WEEK as usize] =
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

// 1.5 hour slots with a lunch gap between slot 1 and slot 2.
const TIME_RANGES: [&str; SLOTS_PER_DAY as usize] = [
    "9:00-10:30",
    "10:30-12:00",
    "13:00-14:30",
    "14:30-16:00",
    "16:00-17:30",
];

/// One cell of the weekly grid. Ordered day-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: u8,
    pub hour: u8,
}

impl TimeSlot {
    #[inline]
    pub const fn new(day: u8, hour: u8) -> Self {
        Self { day, hour }
    }

    /// Every slot of the week, day 0..5 outer and hour 0..5 inner.
    pub fn week() -> impl Iterator<Item = TimeSlot> {
        (0..DAYS_PER_WEEK).flat_map(|day| (0..SLOTS_PER_DAY).map(move |hour| TimeSlot::new(day, hour)))
    }

    pub fn is_valid(&self) -> bool {
        self.day < DAYS_PER_WEEK && self.hour < SLOTS_PER_DAY
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES.get(self.day as usize).copied().unwrap_or("Unknown")
    }

    pub fn time_range(&self) -> &'static str {
        TIME_RANGES
            .get(self.hour as usize)
            .copied()
            .unwrap_or("Unknown")
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.day, self.hour)
    }

    fn decode(s: &str) -> Option<Self> {
        let (day, hour) = s.split_once(':')?;
        let slot = Self::new(day.parse().ok()?, hour.parse().ok()?);
        slot.is_valid().then_some(slot)
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.day_name(), self.time_range())
    }
}

/// One course's weekly placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub course_id: String,
    pub course_name: String,
    pub teacher_id: String,
    pub teacher_name: String,
    /// Classroom id, starting at 1.
    pub classroom: u8,
    pub slots: Vec<TimeSlot>,
    /// Enrolled students at scheduling time.
    pub student_ids: Vec<String>,
}

const SESSION_FIELDS: usize = 7;

impl ScheduledSession {
    fn encode(&self) -> String {
        let slots: Vec<String> = self.slots.iter().map(TimeSlot::encode).collect();
        join_list(&[
            self.course_id.clone(),
            self.course_name.clone(),
            self.teacher_id.clone(),
            self.teacher_name.clone(),
            self.classroom.to_string(),
            join_list(&slots),
            join_list(&self.student_ids),
        ])
    }

    fn decode(raw: &str) -> Result<Self> {
        let bad = |reason: String| QuadraError::codec(EntityKind::Timetable.name(), reason);

        let fields: [String; SESSION_FIELDS] =
            split_list(raw).try_into().map_err(|f: Vec<String>| {
                bad(format!(
                    "session has {} fields, expected {}",
                    f.len(),
                    SESSION_FIELDS
                ))
            })?;
        let [course_id, course_name, teacher_id, teacher_name, classroom, slots, students] = fields;

        let classroom = classroom
            .parse()
            .map_err(|_| bad(format!("bad classroom {:?}", classroom)))?;
        let slots = split_list(&slots)
            .iter()
            .map(|s| TimeSlot::decode(s).ok_or_else(|| bad(format!("bad time slot {:?}", s))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            course_id,
            course_name,
            teacher_id,
            teacher_name,
            classroom,
            slots,
            student_ids: split_list(&students),
        })
    }
}

/// The schedule of one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    pub semester: u8,
    pub sessions: Vec<ScheduledSession>,
}

impl Timetable {
    pub fn new(semester: u8) -> Self {
        Self {
            semester,
            sessions: Vec::new(),
        }
    }

    /// Store key for a semester.
    pub fn key_for(semester: u8) -> String {
        semester.to_string()
    }
}

impl Entity for Timetable {
    const KIND: EntityKind = EntityKind::Timetable;

    fn key(&self) -> String {
        Self::key_for(self.semester)
    }

    fn encode(&self) -> String {
        let mut w = RecordWriter::new();
        w.num(self.semester).num(self.sessions.len());
        for session in &self.sessions {
            w.raw(session.encode());
        }
        w.finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 2)?;
        let semester = r.num()?;
        let count: usize = r.num()?;
        if r.remaining() != count {
            return Err(r.error(format!(
                "declares {} sessions but holds {}",
                count,
                r.remaining()
            )));
        }
        let mut sessions = Vec::with_capacity(count);
        for _ in 0..count {
            sessions.push(ScheduledSession::decode(r.raw()?)?);
        }
        Ok(Self { semester, sessions })
    }

    fn check_bounds(&self) -> Result<()> {
        check_semester(Self::KIND, self.semester)
    }
}
