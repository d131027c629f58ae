//! Quantum-machine instructions
//!
//! A QMI fuses a batch of co-executing tasks with their grid allocations and
//! a shared sample count. The annealer stamps timing exactly once when it
//! runs the instruction; afterwards the instruction is read-only and lives
//! in the simulator's completed list.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{QamtError, QamtResult};
use crate::grid::Grid;
use crate::packing::Schedule;
use crate::task::TaskRef;

/// Shared instruction handle
pub type InstructionRef = Rc<RefCell<Instruction>>;

/// Timing stamps set by the annealer after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionTiming {
    pub start: u64,
    pub end: u64,
    /// One-shot programming latency
    pub program: u64,
    /// Total sampling time, `anneal_time * num_reads`
    pub sample: u64,
}

/// A fused batch of tasks sharing one annealing run
#[derive(Debug)]
pub struct Instruction {
    tasks: Vec<TaskRef>,
    allocations: Vec<Grid>,
    num_reads: u32,
    anneal_time: u64,
    timing: Option<InstructionTiming>,
}

impl Instruction {
    /// Wrap a single task; the allocation is the task's own embedding
    pub fn from_task(task: &TaskRef) -> Self {
        let t = task.borrow();
        Self {
            tasks: vec![Rc::clone(task)],
            allocations: vec![t.embedding().clone()],
            num_reads: t.num_reads(),
            anneal_time: t.anneal_time(),
            timing: None,
        }
    }

    /// Fuse a packed schedule, preserving its order.
    ///
    /// The sample count is the longest requested duration in the batch; the
    /// anneal time is shared by every member, and a schedule that mixes
    /// anneal times is rejected outright.
    pub fn from_schedule(schedule: &Schedule) -> QamtResult<Self> {
        let first = schedule.first().ok_or(QamtError::EmptySchedule)?;
        let anneal_time = first.task.borrow().anneal_time();
        for assignment in schedule {
            let found = assignment.task.borrow().anneal_time();
            if found != anneal_time {
                return Err(QamtError::MismatchedAnnealTime {
                    expected: anneal_time,
                    found,
                });
            }
        }
        let num_reads = schedule
            .iter()
            .map(|assignment| assignment.duration)
            .max()
            .ok_or(QamtError::EmptySchedule)?;
        Ok(Self {
            tasks: schedule
                .iter()
                .map(|assignment| Rc::clone(&assignment.task))
                .collect(),
            allocations: schedule
                .iter()
                .map(|assignment| assignment.allocation.clone())
                .collect(),
            num_reads,
            anneal_time,
            timing: None,
        })
    }

    pub fn into_ref(self) -> InstructionRef {
        Rc::new(RefCell::new(self))
    }

    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn allocations(&self) -> &[Grid] {
        &self.allocations
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads
    }

    /// Cap or stretch the sample batch; the one post-construction mutator
    pub fn set_num_reads(&mut self, num_reads: u32) {
        self.num_reads = num_reads;
    }

    pub fn anneal_time(&self) -> u64 {
        self.anneal_time
    }

    /// Total cells of the device the batch was packed for
    pub fn device_capacity(&self) -> usize {
        self.allocations.first().map_or(0, Grid::area)
    }

    pub fn timing(&self) -> Option<InstructionTiming> {
        self.timing
    }

    /// Record execution timing; stamped exactly once by the annealer
    pub fn stamp_timing(&mut self, timing: InstructionTiming) {
        debug_assert!(self.timing.is_none());
        self.timing = Some(timing);
    }
}
