//! Timetable scheduling for Quadra.
//!
//! This crate provides:
//! - Backtracking assignment: every course gets its full weekly session
//!   count without room, teacher or student clashes, or the run fails
//! - Conflict-graph coloring: one slot per course, for exam-style plans
//! - Post-hoc validation of generated sessions
//! - `SchedulingEngine`, which snapshots a `Database`, plans and stores

pub mod backtrack;
pub mod coloring;
mod engine;
pub mod occupancy;
mod strategy;
pub mod validate;

pub use backtrack::{select_slots, BacktrackSearch, Backtracking, Commit, Progress, SearchStats};
pub use coloring::{ConflictGraph, GraphColoring, DEFAULT_EXAM_ROOM};
pub use engine::SchedulingEngine;
pub use occupancy::Occupancy;
pub use strategy::{Plan, ScheduleInput, SchedulingStrategy, UNKNOWN_TEACHER};
pub use validate::{validate_bookings, validate_sessions, Conflict, ConflictKind, ValidationResult};
