//! Welsh–Powell coloring over the course conflict graph.
//!
//! Two courses conflict when at least one student is enrolled in both,
//! according to the enrollment records. Each course gets one slot: the
//! first caller slot that no already-colored neighbor holds. Courses are
//! colored in descending degree order and never backtracked.

use crate::strategy::{Plan, ScheduleInput, SchedulingStrategy};
use quadra_common::Result;
use quadra_storage::{Enrollment, TimeSlot};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Classroom used when the caller provides none.
pub const DEFAULT_EXAM_ROOM: u8 = 1;

/// Undirected graph, one node per course key.
#[derive(Debug, Clone, Default)]
pub struct ConflictGraph {
    /// Node keys in insertion order.
    nodes: Vec<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ConflictGraph {
    /// Builds the graph over `course_ids`. Enrollments naming other courses
    /// are ignored.
    pub fn build<'a>(
        course_ids: impl IntoIterator<Item = &'a str>,
        enrollments: &[Enrollment],
    ) -> Self {
        let mut graph = Self::default();
        for id in course_ids {
            if !graph.edges.contains_key(id) {
                graph.nodes.push(id.to_string());
                graph.edges.insert(id.to_string(), BTreeSet::new());
            }
        }

        let mut by_student: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in enrollments {
            if graph.edges.contains_key(&e.course_id) {
                by_student
                    .entry(e.student_id.as_str())
                    .or_default()
                    .push(e.course_id.as_str());
            }
        }
        for courses in by_student.values() {
            for (i, a) in courses.iter().enumerate() {
                for b in &courses[i + 1..] {
                    graph.add_edge(a, b);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        if let Some(set) = self.edges.get_mut(a) {
            set.insert(b.to_string());
        }
        if let Some(set) = self.edges.get_mut(b) {
            set.insert(a.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn degree(&self, course_id: &str) -> usize {
        self.edges.get(course_id).map_or(0, BTreeSet::len)
    }

    pub fn neighbors(&self, course_id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(course_id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn has_conflict(&self, a: &str, b: &str) -> bool {
        self.edges.get(a).is_some_and(|set| set.contains(b))
    }

    /// Nodes by descending degree, ties in insertion order.
    pub fn welsh_powell_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = self.nodes.iter().map(String::as_str).collect();
        order.sort_by_key(|id| Reverse(self.degree(id)));
        order
    }

    /// Assigns each node the first slot in `slots` unused by its colored
    /// neighbors. Nodes with no such slot are absent from the result.
    pub fn color(&self, slots: &[TimeSlot]) -> BTreeMap<String, TimeSlot> {
        let mut colors: BTreeMap<String, TimeSlot> = BTreeMap::new();
        for course in self.welsh_powell_order() {
            let taken: BTreeSet<TimeSlot> = self
                .neighbors(course)
                .filter_map(|n| colors.get(n).copied())
                .collect();
            if let Some(slot) = slots.iter().find(|s| !taken.contains(*s)) {
                colors.insert(course.to_string(), *slot);
            }
        }
        colors
    }
}

/// Single-slot assignment, e.g. for exams. Rooms are not checked.
#[derive(Debug, Clone)]
pub struct GraphColoring {
    pub slots: Vec<TimeSlot>,
    pub rooms: Vec<u8>,
}

impl GraphColoring {
    pub fn new(slots: Vec<TimeSlot>, rooms: Vec<u8>) -> Self {
        Self { slots, rooms }
    }

    fn room(&self) -> u8 {
        self.rooms.first().copied().unwrap_or(DEFAULT_EXAM_ROOM)
    }
}

impl SchedulingStrategy for GraphColoring {
    fn name(&self) -> &'static str {
        "graph-coloring"
    }

    fn plan(&self, input: &ScheduleInput) -> Result<Plan> {
        let graph = ConflictGraph::build(
            input.courses.iter().map(|c| c.course_id.as_str()),
            &input.enrollments,
        );
        let colors = graph.color(&self.slots);

        let mut students: HashMap<&str, Vec<String>> = HashMap::new();
        for e in &input.enrollments {
            students
                .entry(e.course_id.as_str())
                .or_default()
                .push(e.student_id.clone());
        }

        let mut plan = Plan::default();
        for course_id in graph.welsh_powell_order() {
            let Some(course) = input.course(course_id) else {
                continue;
            };
            match colors.get(course_id) {
                Some(slot) => {
                    debug!(course = %course_id, slot = %slot, "Colored course");
                    let enrolled = students.remove(course_id).unwrap_or_default();
                    plan.sessions
                        .push(input.session(course, self.room(), vec![*slot], enrolled));
                }
                None => {
                    warn!(course = %course_id, "Could not schedule course, insufficient time slots");
                    plan.unscheduled.push(course_id.to_string());
                }
            }
        }
        Ok(plan)
    }
}
