//! Scheduling entry point over a `Database`.

use crate::backtrack::Backtracking;
use crate::coloring::GraphColoring;
use crate::strategy::{Plan, ScheduleInput, SchedulingStrategy};
use crate::validate::validate_sessions;
use quadra_common::{QuadraError, Result, SchedulerConfig, MAX_CLASSROOMS};
use quadra_storage::{Database, TimeSlot, Timetable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Clears the run flag when dropped.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| QuadraError::SchedulingInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs scheduling strategies against the stored courses.
///
/// The search works on a snapshot and never holds the database lock.
/// Only one run per engine may be in flight.
pub struct SchedulingEngine {
    db: Arc<Database>,
    classrooms: u8,
    running: AtomicBool,
}

impl SchedulingEngine {
    pub fn new(db: Arc<Database>, config: &SchedulerConfig) -> Result<Self> {
        let classrooms = u8::try_from(config.classrooms)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                QuadraError::Config(format!(
                    "classrooms must be in 1..={}, got {}",
                    MAX_CLASSROOMS, config.classrooms
                ))
            })?;
        Ok(Self {
            db,
            classrooms,
            running: AtomicBool::new(false),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn classrooms(&self) -> u8 {
        self.classrooms
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Builds and stores a conflict-free weekly timetable for every
    /// semester, replacing all previous ones.
    ///
    /// On error the stored timetables are left as they were.
    pub fn generate_timetable(&self) -> Result<Vec<Timetable>> {
        let _guard = RunGuard::acquire(&self.running)?;

        let input = ScheduleInput::from_snapshot(self.db.snapshot()?);
        if input.courses.is_empty() {
            warn!("No courses to schedule");
            return Err(QuadraError::NothingToSchedule);
        }

        let strategy = Backtracking::new(self.classrooms);
        let plan = strategy.plan(&input)?;

        if let Err(conflicts) = validate_sessions(&plan.sessions) {
            warn!(conflicts = conflicts.len(), "Generated timetable failed validation");
            let first = conflicts
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            return Err(QuadraError::ScheduleConflict(first));
        }

        let sessions = plan.sessions.len();
        let timetables = plan.into_timetables(&input.courses);
        self.db.replace_timetables(timetables.clone())?;
        info!(
            strategy = strategy.name(),
            sessions,
            semesters = timetables.len(),
            "Generated timetable"
        );
        Ok(timetables)
    }

    /// Assigns each course one slot from `slots` by conflict-graph
    /// coloring. Nothing is stored.
    pub fn plan_exams(&self, slots: Vec<TimeSlot>, rooms: Vec<u8>) -> Result<Plan> {
        let _guard = RunGuard::acquire(&self.running)?;
        let input = ScheduleInput::from_snapshot(self.db.snapshot()?);
        let strategy = GraphColoring::new(slots, rooms);
        let plan = strategy.plan(&input)?;
        info!(
            strategy = strategy.name(),
            scheduled = plan.sessions.len(),
            unscheduled = plan.unscheduled.len(),
            "Planned exams"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_common::StorageConfig;
    use tempfile::tempdir;

    #[test]
    fn test_classroom_bounds() {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::open(&StorageConfig::with_data_dir(dir.path())).unwrap());
        assert!(SchedulingEngine::new(db.clone(), &SchedulerConfig { classrooms: 0 }).is_err());
        assert!(SchedulingEngine::new(db.clone(), &SchedulerConfig { classrooms: 256 }).is_err());
        let engine = SchedulingEngine::new(db, &SchedulerConfig { classrooms: 255 }).unwrap();
        assert_eq!(engine.classrooms(), 255);
    }

    #[test]
    fn test_second_run_refused() {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::open(&StorageConfig::with_data_dir(dir.path())).unwrap());
        let engine = SchedulingEngine::new(db, &SchedulerConfig::default()).unwrap();

        let guard = RunGuard::acquire(&engine.running).unwrap();
        assert!(engine.is_running());
        assert!(matches!(
            engine.generate_timetable(),
            Err(QuadraError::SchedulingInProgress)
        ));
        assert!(matches!(
            engine.plan_exams(TimeSlot::week().collect(), vec![1]),
            Err(QuadraError::SchedulingInProgress)
        ));
        drop(guard);

        assert!(!engine.is_running());
        assert!(matches!(
            engine.generate_timetable(),
            Err(QuadraError::NothingToSchedule)
        ));
        assert!(!engine.is_running());
    }
}
