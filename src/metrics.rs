//! Timing metrics over completed runs
//!
//! A thin consumer of the core's output: execution, response and initial
//! waiting times per task, plus a device-utilisation ratio over the
//! completed instruction list.

use std::collections::HashSet;
use std::rc::Rc;

use crate::instruction::InstructionRef;
use crate::task::TaskRef;

/// Per-task timing snapshot
#[derive(Debug, Clone)]
pub struct TimingRow {
    pub name: String,
    pub arrival: u64,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// Aggregate timing metrics over a set of tasks
///
/// Tasks that never logged any activity are skipped; aggregates over an
/// empty set are `None`.
pub struct TaskTiming {
    tasks: Vec<TaskRef>,
}

impl TaskTiming {
    pub fn new(tasks: &[TaskRef]) -> Self {
        Self {
            tasks: tasks.to_vec(),
        }
    }

    pub fn timing(&self) -> Vec<TimingRow> {
        self.tasks
            .iter()
            .map(|task| {
                let t = task.borrow();
                TimingRow {
                    name: t.name().to_string(),
                    arrival: t.arrival_time(),
                    start: t.log_start_time(),
                    end: t.log_end_time(),
                }
            })
            .collect()
    }

    /// `(arrival, first activity start, last activity end)` per executed task
    fn spans(&self) -> Vec<(u64, u64, u64)> {
        self.tasks
            .iter()
            .filter_map(|task| {
                let t = task.borrow();
                match (t.log_start_time(), t.log_end_time()) {
                    (Some(start), Some(end)) => Some((t.arrival_time(), start, end)),
                    _ => None,
                }
            })
            .collect()
    }

    fn mean(values: impl Iterator<Item = u64>) -> Option<f64> {
        let values: Vec<u64> = values.collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
    }

    /// Average-case execution time
    pub fn acet(&self) -> Option<f64> {
        Self::mean(self.spans().into_iter().map(|(_, start, end)| end - start))
    }

    /// Worst-case execution time
    pub fn wcet(&self) -> Option<u64> {
        self.spans()
            .into_iter()
            .map(|(_, start, end)| end - start)
            .max()
    }

    /// Average-case response time
    pub fn acrt(&self) -> Option<f64> {
        Self::mean(self.spans().into_iter().map(|(arrival, _, end)| end - arrival))
    }

    /// Worst-case response time
    pub fn wcrt(&self) -> Option<u64> {
        self.spans()
            .into_iter()
            .map(|(arrival, _, end)| end - arrival)
            .max()
    }

    /// Average-case initial waiting time
    pub fn aciwt(&self) -> Option<f64> {
        Self::mean(
            self.spans()
                .into_iter()
                .map(|(arrival, start, _)| start - arrival),
        )
    }

    /// Worst-case initial waiting time
    pub fn wciwt(&self) -> Option<u64> {
        self.spans()
            .into_iter()
            .map(|(arrival, start, _)| start - arrival)
            .max()
    }
}

/// Fraction of the device-time product actually consumed by sampling
///
/// Distinct tasks across the instruction list contribute
/// `embedding_ones * num_reads * anneal_time`; the denominator is the device
/// capacity times the span from the earliest start to the latest end.
pub fn resource_utilisation(instructions: &[InstructionRef]) -> Option<f64> {
    if instructions.is_empty() {
        return None;
    }

    let mut seen: HashSet<*const ()> = HashSet::new();
    let mut total_requirement = 0u64;
    for inst in instructions {
        for task in inst.borrow().tasks() {
            if seen.insert(Rc::as_ptr(task).cast()) {
                let t = task.borrow();
                total_requirement += t.embedding().count_ones() as u64
                    * u64::from(t.num_reads())
                    * t.anneal_time();
            }
        }
    }

    let mut earliest = u64::MAX;
    let mut latest = 0u64;
    for inst in instructions {
        if let Some(timing) = inst.borrow().timing() {
            earliest = earliest.min(timing.start);
            latest = latest.max(timing.end);
        }
    }
    if earliest >= latest {
        return None;
    }

    let capacity = instructions[0].borrow().device_capacity() as u64;
    Some(total_requirement as f64 / (capacity * (latest - earliest)) as f64)
}
