//! Keyed completed/total counters
//!
//! The task map lock is held only to look up, insert or remove an entry.
//! Counters live in per-task atomics, so updates to different tasks never
//! contend with each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Point-in-time view of one task's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    /// Completion as a percentage in `0.0..=100.0`
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[derive(Debug)]
struct TaskProgress {
    total: u64,
    completed: AtomicU64,
}

impl TaskProgress {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total,
        }
    }
}

/// Registry of progress counters keyed by task key
///
/// Crawls use the selected book URL as their key.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    tasks: RwLock<HashMap<String, Arc<TaskProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task with zero progress, replacing any previous entry
    pub fn init_task(&self, key: &str, total: u64) {
        let task = Arc::new(TaskProgress {
            total,
            completed: AtomicU64::new(0),
        });
        self.tasks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), task);
    }

    /// Adds `delta` completed units, saturating at the task total
    ///
    /// Returns false when the task is unknown.
    pub fn advance(&self, key: &str, delta: u64) -> bool {
        let Some(task) = self.task(key) else {
            return false;
        };
        let _ = task
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |completed| {
                Some(completed.saturating_add(delta).min(task.total))
            });
        true
    }

    /// Overwrites the completed count, clamped to the task total
    pub fn set_completed(&self, key: &str, completed: u64) -> bool {
        let Some(task) = self.task(key) else {
            return false;
        };
        task.completed
            .store(completed.min(task.total), Ordering::Release);
        true
    }

    /// Current counters of a task, or `None` for an unknown key
    pub fn get_progress(&self, key: &str) -> Option<ProgressSnapshot> {
        self.task(key).map(|task| task.snapshot())
    }

    /// Removes a task; returns whether it existed
    pub fn delete_task(&self, key: &str) -> bool {
        self.tasks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn task(&self, key: &str) -> Option<Arc<TaskProgress>> {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}
