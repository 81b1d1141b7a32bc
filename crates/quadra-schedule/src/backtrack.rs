//! Depth-first timetable search with an explicit commit stack.
//!
//! Courses are visited in descending enrollment order. Each course tries
//! classrooms 1..=N in turn and takes the first one with enough free slots
//! for its teacher, room and students. When a course fits nowhere, the
//! most recent placement is popped, its busy marks are released and that
//! course resumes from the next classroom.
//!
//! ```text
//!   stack:  [Placed CS201 r1] [Skipped ART1] [Placed MATH101 r1]
//!                                                    ^ depth 2
//!   MATH202 fails in every room
//!     -> pop MATH101, unmark, retry MATH101 from r2
//! ```
//!
//! The search is steppable so tests can inspect each commit.

use crate::occupancy::Occupancy;
use crate::strategy::{Plan, ScheduleInput, SchedulingStrategy};
use quadra_common::{QuadraError, Result};
use quadra_storage::{Course, TimeSlot};
use std::cmp::Reverse;
use tracing::{debug, warn};

/// One decision on the search stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// Course with no students, nothing to place.
    Skipped { course: usize },
    /// Course placed in `classroom` at `slots`.
    Placed {
        course: usize,
        classroom: u8,
        slots: Vec<TimeSlot>,
    },
}

impl Commit {
    /// Index of the course in the input slice.
    pub fn course(&self) -> usize {
        match self {
            Self::Skipped { course } | Self::Placed { course, .. } => *course,
        }
    }
}

/// Search state after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Running,
    Solved,
    Exhausted,
}

/// Counters for one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub steps: u64,
    pub backtracks: u64,
}

/// Picks `course.required_sessions()` slots among the free ones in
/// `classroom`, spreading across days first.
///
/// Takes the first free slot of each distinct day in day order, then fills
/// from the remaining free slots in week order. Returns `None` if too few
/// slots are free.
pub fn select_slots(occupancy: &Occupancy, course: &Course, classroom: u8) -> Option<Vec<TimeSlot>> {
    let required = course.required_sessions();
    let candidates = occupancy.free_slots(course, classroom);
    if candidates.len() < required {
        return None;
    }

    let mut chosen: Vec<TimeSlot> = Vec::with_capacity(required);
    // Candidates are day-major, so a day change marks the first slot of a day.
    for slot in &candidates {
        if chosen.len() == required {
            break;
        }
        if chosen.last().map_or(true, |last| last.day != slot.day) {
            chosen.push(*slot);
        }
    }
    for slot in &candidates {
        if chosen.len() == required {
            break;
        }
        if !chosen.contains(slot) {
            chosen.push(*slot);
        }
    }
    Some(chosen)
}

/// Resumable backtracking search over a course list.
pub struct BacktrackSearch<'a> {
    courses: &'a [Course],
    order: Vec<usize>,
    classrooms: u8,
    occupancy: Occupancy,
    stack: Vec<Commit>,
    /// First classroom to try at the current depth. Wider than u8 so it can
    /// step past classroom 255.
    next_classroom: u16,
    progress: Progress,
    stats: SearchStats,
    /// (depth, course index) of the deepest course that fit nowhere.
    deepest_failure: Option<(usize, usize)>,
}

impl<'a> BacktrackSearch<'a> {
    pub fn new(courses: &'a [Course], classrooms: u8) -> Self {
        let mut order: Vec<usize> = (0..courses.len()).collect();
        // Stable, so equal enrollments keep input order.
        order.sort_by_key(|&i| Reverse(courses[i].enrollment_count()));
        Self {
            courses,
            order,
            classrooms,
            occupancy: Occupancy::new(),
            stack: Vec::with_capacity(courses.len()),
            next_classroom: 1,
            progress: Progress::Running,
            stats: SearchStats::default(),
            deepest_failure: None,
        }
    }

    /// Course indices in visiting order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Current decisions, outermost first.
    pub fn commits(&self) -> &[Commit] {
        &self.stack
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    /// The deepest course that could not be placed, if any failed.
    pub fn failed_course(&self) -> Option<&'a Course> {
        let courses = self.courses;
        self.deepest_failure.map(|(_, idx)| &courses[idx])
    }

    /// Makes one decision: place or skip the next course, or undo the
    /// latest placement.
    pub fn step(&mut self) -> Progress {
        if self.progress != Progress::Running {
            return self.progress;
        }
        self.stats.steps += 1;

        let depth = self.stack.len();
        let Some(&idx) = self.order.get(depth) else {
            self.progress = Progress::Solved;
            return self.progress;
        };
        let courses = self.courses;
        let course = &courses[idx];

        if course.enrolled_students.is_empty() {
            debug!(course = %course.course_id, "Skipping course with no students");
            self.stack.push(Commit::Skipped { course: idx });
            self.next_classroom = 1;
            return self.progress;
        }

        for room in self.next_classroom..=u16::from(self.classrooms) {
            let classroom = room as u8;
            if let Some(slots) = select_slots(&self.occupancy, course, classroom) {
                debug!(
                    course = %course.course_id,
                    classroom,
                    sessions = slots.len(),
                    "Placed course"
                );
                self.occupancy.mark(course, classroom, &slots);
                self.stack.push(Commit::Placed {
                    course: idx,
                    classroom,
                    slots,
                });
                self.next_classroom = 1;
                return self.progress;
            }
        }

        if self.deepest_failure.map_or(true, |(d, _)| depth > d) {
            self.deepest_failure = Some((depth, idx));
        }
        self.backtrack()
    }

    /// Steps until solved or exhausted.
    pub fn run(&mut self) -> Progress {
        while self.step() == Progress::Running {}
        self.progress
    }

    fn backtrack(&mut self) -> Progress {
        while let Some(commit) = self.stack.pop() {
            if let Commit::Placed {
                course,
                classroom,
                slots,
            } = commit
            {
                let placed = &self.courses[course];
                self.occupancy.unmark(placed, classroom, &slots);
                self.stats.backtracks += 1;
                self.next_classroom = u16::from(classroom) + 1;
                debug!(course = %placed.course_id, classroom, "Undid placement");
                return self.progress;
            }
        }
        self.progress = Progress::Exhausted;
        self.progress
    }
}

/// Primary strategy: every course with students gets its full session
/// count, or the whole run fails.
#[derive(Debug, Clone, Copy)]
pub struct Backtracking {
    pub classrooms: u8,
}

impl Backtracking {
    pub fn new(classrooms: u8) -> Self {
        Self { classrooms }
    }
}

impl SchedulingStrategy for Backtracking {
    fn name(&self) -> &'static str {
        "backtracking"
    }

    fn plan(&self, input: &ScheduleInput) -> Result<Plan> {
        let mut search = BacktrackSearch::new(&input.courses, self.classrooms);
        let progress = search.run();
        let stats = search.stats();
        debug!(steps = stats.steps, backtracks = stats.backtracks, "Search finished");

        if progress != Progress::Solved {
            let course_id = search
                .failed_course()
                .map(|c| c.course_id.clone())
                .unwrap_or_default();
            warn!(course = %course_id, backtracks = stats.backtracks, "Timetable search exhausted");
            return Err(QuadraError::Infeasible { course_id });
        }

        let sessions = search
            .commits()
            .iter()
            .filter_map(|commit| match commit {
                Commit::Placed {
                    course,
                    classroom,
                    slots,
                } => {
                    let course = &input.courses[*course];
                    Some(input.session(
                        course,
                        *classroom,
                        slots.clone(),
                        course.enrolled_students.clone(),
                    ))
                }
                Commit::Skipped { .. } => None,
            })
            .collect();
        Ok(Plan {
            sessions,
            unscheduled: Vec::new(),
        })
    }
}
