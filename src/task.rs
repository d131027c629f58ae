//! Sampling tasks and their activity logs
//!
//! A task owns an immutable embedding footprint, a total sample budget and
//! an append-only activity log filled in by the annealer. Tasks are shared
//! between the simulator's lifecycle lists and the instructions that batch
//! them, so they live behind [`TaskRef`] handles; the simulation is
//! single-threaded throughout.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{QamtError, QamtResult};
use crate::grid::Grid;

/// Shared task handle; identity comparisons use `Rc::ptr_eq`
pub type TaskRef = Rc<RefCell<Task>>;

/// What a task was doing during an activity period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPhase {
    /// One-shot instruction programming latency
    Program,
    /// One annealing read, repeated `repeat` times back to back
    Sample,
}

/// One entry of a task's activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub phase: ActivityPhase,
    pub start: u64,
    pub end: u64,
    pub repeat: u32,
}

/// Structured task input record
///
/// The embedding is a plain 2-D 0/1 array; no expression evaluation happens
/// anywhere in the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub embd: Vec<Vec<u32>>,
    pub num_reads: u32,
    pub anneal_time: u64,
    #[serde(default)]
    pub t_arrive: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anneal_schedule: Option<Vec<(f64, f64)>>,
}

/// A sampling task
#[derive(Debug)]
pub struct Task {
    name: String,
    embedding: Grid,
    num_reads: u32,
    anneal_time: u64,
    anneal_schedule: Option<Vec<(f64, f64)>>,
    arrival_time: u64,
    samples_complete: u32,
    activity_log: Vec<ActivityEntry>,
}

impl Task {
    /// Create a task, validating the sample budget and footprint
    pub fn new(
        name: &str,
        embedding: Grid,
        num_reads: u32,
        anneal_time: u64,
        arrival_time: u64,
    ) -> QamtResult<Self> {
        if num_reads == 0 {
            return Err(QamtError::InvalidTask(format!(
                "task {name}: num_reads must be positive"
            )));
        }
        if anneal_time == 0 {
            return Err(QamtError::InvalidTask(format!(
                "task {name}: anneal_time must be positive"
            )));
        }
        if embedding.count_ones() == 0 {
            return Err(QamtError::InvalidTask(format!(
                "task {name}: embedding has no occupied cells"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            embedding,
            num_reads,
            anneal_time,
            anneal_schedule: None,
            arrival_time,
            samples_complete: 0,
            activity_log: Vec::new(),
        })
    }

    /// Build a task from a structured input record
    pub fn from_spec(spec: &TaskSpec) -> QamtResult<Self> {
        let embedding = Grid::from_rows(&spec.embd)
            .map_err(|e| QamtError::InvalidTask(format!("task {}: {e}", spec.name)))?;
        let mut task = Self::new(
            &spec.name,
            embedding,
            spec.num_reads,
            spec.anneal_time,
            spec.t_arrive,
        )?;
        task.anneal_schedule = spec.anneal_schedule.clone();
        Ok(task)
    }

    /// Parse and validate a JSON array of task records
    pub fn load_slice(json: &str) -> QamtResult<Vec<TaskRef>> {
        let specs: Vec<TaskSpec> = serde_json::from_str(json)?;
        specs
            .iter()
            .map(|spec| Ok(Task::from_spec(spec)?.into_ref()))
            .collect()
    }

    pub fn into_ref(self) -> TaskRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedding(&self) -> &Grid {
        &self.embedding
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads
    }

    pub fn anneal_time(&self) -> u64 {
        self.anneal_time
    }

    pub fn anneal_schedule(&self) -> Option<&[(f64, f64)]> {
        self.anneal_schedule.as_deref()
    }

    pub fn arrival_time(&self) -> u64 {
        self.arrival_time
    }

    pub fn set_arrival_time(&mut self, time: u64) {
        self.arrival_time = time;
    }

    pub fn samples_complete(&self) -> u32 {
        self.samples_complete
    }

    pub fn samples_remaining(&self) -> u32 {
        self.num_reads - self.samples_complete
    }

    /// Credit `n` completed samples.
    ///
    /// Returns the remainder that was outstanding before the update if this
    /// credit completes the task, `None` while samples remain. The counter
    /// never exceeds the budget.
    pub fn sample_plus(&mut self, n: u32) -> Option<u32> {
        let remaining = self.samples_remaining();
        self.samples_complete = (self.samples_complete.saturating_add(n)).min(self.num_reads);
        if remaining <= n {
            Some(remaining)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.samples_remaining() == 0
    }

    /// Append an activity period; entries arrive in non-decreasing start order
    pub fn log(&mut self, phase: ActivityPhase, period: (u64, u64), repeat: u32) {
        debug_assert!(self
            .activity_log
            .last()
            .map_or(true, |last| last.start <= period.0));
        self.activity_log.push(ActivityEntry {
            phase,
            start: period.0,
            end: period.1,
            repeat,
        });
    }

    pub fn activity_log(&self) -> &[ActivityEntry] {
        &self.activity_log
    }

    /// Start of the first logged activity
    pub fn log_start_time(&self) -> Option<u64> {
        self.activity_log.first().map(|entry| entry.start)
    }

    /// End of the last logged activity, with its repeat count unrolled
    pub fn log_end_time(&self) -> Option<u64> {
        self.activity_log
            .last()
            .map(|entry| entry.start + (entry.end - entry.start) * u64::from(entry.repeat))
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
