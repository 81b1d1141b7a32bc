//! Persistent indexed record store for Quadra.
//!
//! This crate provides:
//! - Ordered Index: order-5 B-tree for sorted iteration
//! - Point Index: chained hash table for O(1) lookup
//! - Record Log: line-oriented entity file with in-place overwrite
//! - Index side-files with checksums, rebuildable from the log
//! - Entity models and their line codec
//! - `IndexedStore<E>` and the lock-guarded `Database` facade

pub mod btree;
pub mod codec;
mod database;
pub mod entity;
pub mod hash;
mod log;
mod sidefile;
mod store;

pub use btree::OrderedIndex;
pub use database::{unix_now, Database, Snapshot, CONFIG_FILE};
pub use entity::{
    required_sessions_for, Course, Enrollment, Entity, EntityKind, Role, ScheduledSession,
    Student, SystemConfig, Teacher, TimeSlot, Timetable, UserAuth, MAX_COURSE_STUDENTS,
    MAX_ENROLLED_COURSES,
};
pub use hash::PointIndex;
pub use log::{Location, RecordLog};
pub use sidefile::{IndexKind, SideFile};
pub use store::{IndexedStore, HASH_EXTENSION, LOG_EXTENSION, ORDERED_EXTENSION};
