//! Quadra common errors and configuration.
//!
//! This crate provides shared definitions used across all Quadra components.

pub mod config;
pub mod error;

pub use config::{QuadraConfig, SchedulerConfig, StorageConfig, MAX_CLASSROOMS};
pub use error::{QuadraError, Rejection, Result};
