//! Scheduling policies
//!
//! A scheduler maps the simulator's ready list to a batch of instructions to
//! issue now. Every variant consults the packers over a clone of the
//! annealer's grid; the simulator dispatches at most the first returned
//! instruction per tick.
//!
//! Policies:
//! - [`ToyScheduler`]: one task at a time, full sample budget
//! - [`StaticScheduler`]: largest-demand-first next-fit, assumes all tasks
//!   arrive at time zero
//! - [`NaiveScheduler`]: single-task dispatch with a batch sample cap
//! - [`NextFitPreemptionScheduler`]: fills the grid round by round, partially
//!   sampled tasks re-enter the ready list
//! - [`DynamicScheduler`]: weighted-random packing with a sample cap

use std::cmp::Reverse;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand_chacha::ChaCha8Rng;

use crate::annealer::Annealer;
use crate::error::{QamtError, QamtResult};
use crate::grid::Grid;
use crate::instruction::{Instruction, InstructionRef};
use crate::packing::{next_fit, random_fit, Assignment, Request, Schedule};
use crate::task::TaskRef;

/// Scheduling plug-in contract
///
/// Returned instructions must reference tasks from `ready`, with allocations
/// disjoint from each other and from the annealer's occupied cells.
pub trait Scheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>>;
}

fn ready_names(ready: &[TaskRef]) -> String {
    ready
        .iter()
        .map(|t| t.borrow().name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Solid block over the task's bounding box at the grid origin
fn origin_block_schedule(task: &TaskRef, resources: &Grid) -> QamtResult<Schedule> {
    let t = task.borrow();
    let demand = t.embedding();
    if !demand.fits_within(resources) {
        return Err(QamtError::InfeasiblePlacement(t.name().to_string()));
    }
    let block = Grid::ones(demand.rows(), demand.cols());
    let allocation = resources.embed(&block, 0, 0);
    Ok(vec![Assignment {
        task: Rc::clone(task),
        allocation,
        duration: t.samples_remaining(),
    }])
}

/// Batch sample count: the task with the largest embedding wins, smallest
/// sample budget breaking ties.
fn batch_num_reads(inst: &Instruction) -> Option<u32> {
    inst.tasks()
        .iter()
        .map(|t| {
            let b = t.borrow();
            (b.embedding().area(), b.num_reads())
        })
        .min_by_key(|&(area, num_reads)| (Reverse(area), num_reads))
        .map(|(_, num_reads)| num_reads)
}

/// Dispatch the first ready task with its full sample budget
#[derive(Debug, Default)]
pub struct ToyScheduler;

impl ToyScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ToyScheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let task = &ready[0];
        let schedule = origin_block_schedule(task, &annealer.resources())?;
        let mut inst = Instruction::from_schedule(&schedule)?;
        inst.set_num_reads(task.borrow().num_reads());
        Ok(vec![inst.into_ref()])
    }
}

/// Pack the whole ready list, largest demand first, and issue the densest
/// schedule. Meant for workloads where every task is available at time zero.
#[derive(Debug, Default)]
pub struct StaticScheduler;

impl StaticScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for StaticScheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let mut requests: Vec<Request> = ready.iter().map(Request::from_task).collect();
        requests.sort_by_key(|r| (Reverse(r.demand.count_ones()), Reverse(r.duration)));

        let schedules = next_fit(&requests, &annealer.resources(), None)?;
        match schedules.first() {
            Some(schedule) if !schedule.is_empty() => {
                Ok(vec![Instruction::from_schedule(schedule)?.into_ref()])
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Single-task dispatch with the batch sample cap applied
#[derive(Debug, Default)]
pub struct NaiveScheduler;

impl NaiveScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for NaiveScheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let schedule = origin_block_schedule(&ready[0], &annealer.resources())?;
        let mut inst = Instruction::from_schedule(&schedule)?;
        if let Some(num_reads) = batch_num_reads(&inst) {
            inst.set_num_reads(num_reads);
        }
        Ok(vec![inst.into_ref()])
    }
}

/// Fill the grid round by round without resetting it, then fuse everything
/// placed into one instruction.
///
/// Tasks whose budgets outlast the fused batch are re-enqueued by the
/// simulator once the instruction completes; preemption here means nothing
/// more than that.
#[derive(Debug, Default)]
pub struct NextFitPreemptionScheduler;

impl NextFitPreemptionScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for NextFitPreemptionScheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let requests: Vec<Request> = ready.iter().map(Request::from_task).collect();
        let mut grid = annealer.resources();
        let mut fused: Schedule = Vec::new();

        loop {
            let round = next_fit(&requests, &grid, Some(1))?;
            let batch = round.into_iter().next().unwrap_or_default();
            if batch.is_empty() {
                break;
            }
            for assignment in batch {
                grid += &assignment.allocation;
                fused.push(assignment);
            }
        }

        if fused.is_empty() {
            return Err(QamtError::InfeasiblePlacement(ready_names(ready)));
        }
        let mut inst = Instruction::from_schedule(&fused)?;
        if let Some(num_reads) = batch_num_reads(&inst) {
            inst.set_num_reads(num_reads);
        }
        Ok(vec![inst.into_ref()])
    }
}

/// Weighted-random packing with a configurable per-batch sample cap
///
/// The random source is injected with a caller-controlled seed; two
/// schedulers built from the same seed produce identical schedules. With no
/// cap the batch runs the smallest member budget.
pub struct DynamicScheduler {
    n_samples: Option<u32>,
    rng: ChaCha8Rng,
}

impl DynamicScheduler {
    /// Default per-batch sample cap
    pub const DEFAULT_N_SAMPLES: u32 = 500;

    pub fn new(n_samples: Option<u32>, rng: ChaCha8Rng) -> Self {
        Self { n_samples, rng }
    }

    pub fn from_seed(n_samples: Option<u32>, seed: u64) -> Self {
        use rand::SeedableRng;
        Self::new(n_samples, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Scheduler for DynamicScheduler {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let requests: Vec<Request> = ready.iter().map(Request::from_task).collect();
        let schedules = random_fit(&requests, &annealer.resources(), None, &mut self.rng)?;
        let schedule = schedules.into_iter().next().unwrap_or_default();
        if schedule.is_empty() {
            return Err(QamtError::InfeasiblePlacement(ready_names(ready)));
        }

        let mut inst = Instruction::from_schedule(&schedule)?;
        let num_reads = match self.n_samples {
            Some(n) => n,
            None => inst
                .tasks()
                .iter()
                .map(|t| t.borrow().num_reads())
                .min()
                .ok_or(QamtError::EmptySchedule)?,
        };
        inst.set_num_reads(num_reads);
        Ok(vec![inst.into_ref()])
    }
}

/// One recorded scheduling call
#[derive(Debug, Clone)]
pub struct SchedulerSample {
    /// Wall-clock time the wrapped scheduler took
    pub elapsed: Duration,
    /// Size of the ready list it saw
    pub ready_tasks: usize,
    /// Per-task embedding area over grid area
    pub demand_ratios: Vec<f64>,
}

/// Wrapper that records per-call scheduling latency and load
pub struct InstrumentedScheduler<S> {
    inner: S,
    samples: Vec<SchedulerSample>,
}

impl<S: Scheduler> InstrumentedScheduler<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            samples: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[SchedulerSample] {
        &self.samples
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Scheduler> Scheduler for InstrumentedScheduler<S> {
    fn schedule(
        &mut self,
        ready: &[TaskRef],
        annealer: &dyn Annealer,
    ) -> QamtResult<Vec<InstructionRef>> {
        let started = Instant::now();
        let result = self.inner.schedule(ready, annealer);
        let grid_area = annealer.resources().area() as f64;
        let demand_ratios = ready
            .iter()
            .map(|t| t.borrow().embedding().area() as f64 / grid_area)
            .collect();
        self.samples.push(SchedulerSample {
            elapsed: started.elapsed(),
            ready_tasks: ready.len(),
            demand_ratios,
        });
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::annealer::ChimeraAnnealer;
    use crate::task::Task;

    fn solid_task(name: &str, rows: usize, cols: usize, num_reads: u32) -> TaskRef {
        let embedding = Grid::from_rows(&vec![vec![1; cols]; rows]).unwrap();
        Task::new(name, embedding, num_reads, 20, 0).unwrap().into_ref()
    }

    #[test]
    fn test_toy_scheduler_wraps_the_first_ready_task() {
        let mut scheduler = ToyScheduler::new();
        let annealer = ChimeraAnnealer::default();
        let ready = [solid_task("a", 3, 2, 700), solid_task("b", 2, 2, 100)];

        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        assert_eq!(insts.len(), 1);
        let inst = insts[0].borrow();
        assert_eq!(inst.tasks().len(), 1);
        assert_eq!(inst.tasks()[0].borrow().name(), "a");
        assert_eq!(inst.num_reads(), 700);
        assert_eq!(inst.allocations()[0].count_ones(), 6);
        assert_eq!(inst.allocations()[0].get(0, 0), 1);
    }

    #[test]
    fn test_toy_scheduler_rejects_an_oversized_task() {
        let mut scheduler = ToyScheduler::new();
        let annealer = ChimeraAnnealer::new(4, 4, 1000);
        let ready = [solid_task("giant", 5, 5, 100)];
        assert!(matches!(
            scheduler.schedule(&ready, &annealer),
            Err(QamtError::InfeasiblePlacement(_))
        ));
    }

    #[test]
    fn test_toy_scheduler_with_no_ready_tasks_is_a_no_op() {
        let mut scheduler = ToyScheduler::new();
        let annealer = ChimeraAnnealer::default();
        assert!(scheduler.schedule(&[], &annealer).unwrap().is_empty());
    }

    #[test]
    fn test_static_scheduler_packs_largest_demand_first() {
        let mut scheduler = StaticScheduler::new();
        let annealer = ChimeraAnnealer::default();
        // Five 8x8 blocks exceed the 16x16 grid; exactly four co-execute.
        let ready: Vec<TaskRef> = (0..5)
            .map(|i| solid_task(&format!("t{i}"), 8, 8, 100 * (i as u32 + 1)))
            .collect();

        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        assert_eq!(insts.len(), 1);
        let inst = insts[0].borrow();
        assert_eq!(inst.tasks().len(), 4);

        // Allocations are pairwise disjoint.
        let allocs = inst.allocations();
        for i in 0..allocs.len() {
            for j in i + 1..allocs.len() {
                assert!(!allocs[i].overlaps(&allocs[j]));
            }
        }
    }

    #[test]
    fn test_static_scheduler_sorts_by_area_then_duration() {
        let mut scheduler = StaticScheduler::new();
        let annealer = ChimeraAnnealer::default();
        let ready = [
            solid_task("small", 2, 2, 900),
            solid_task("large", 10, 10, 100),
        ];
        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        let inst = insts[0].borrow();
        assert_eq!(inst.tasks()[0].borrow().name(), "large");
    }

    #[test]
    fn test_naive_scheduler_caps_reads_by_the_largest_member() {
        let mut scheduler = NaiveScheduler::new();
        let annealer = ChimeraAnnealer::default();
        let ready = [solid_task("a", 4, 4, 800)];
        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        let inst = insts[0].borrow();
        assert_eq!(inst.tasks().len(), 1);
        assert_eq!(inst.num_reads(), 800);
    }

    #[test]
    fn test_preemption_scheduler_fuses_everything_that_fits() {
        let mut scheduler = NextFitPreemptionScheduler::new();
        let annealer = ChimeraAnnealer::default();
        let ready = [
            solid_task("a", 8, 8, 400),
            solid_task("b", 8, 8, 300),
            solid_task("c", 8, 8, 200),
        ];
        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        assert_eq!(insts.len(), 1);
        let inst = insts[0].borrow();
        assert!(inst.tasks().len() >= 3);
        // Ties on area resolve to the smallest budget.
        assert_eq!(inst.num_reads(), 200);
    }

    #[test]
    fn test_preemption_scheduler_rejects_an_infeasible_ready_list() {
        let mut scheduler = NextFitPreemptionScheduler::new();
        let annealer = ChimeraAnnealer::new(4, 4, 1000);
        let ready = [solid_task("giant", 6, 6, 100)];
        assert!(matches!(
            scheduler.schedule(&ready, &annealer),
            Err(QamtError::InfeasiblePlacement(_))
        ));
    }

    #[test]
    fn test_dynamic_scheduler_applies_the_sample_cap() {
        let mut scheduler = DynamicScheduler::from_seed(Some(500), 0);
        let annealer = ChimeraAnnealer::default();
        let ready = [solid_task("a", 4, 4, 900), solid_task("b", 4, 4, 800)];
        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        assert_eq!(insts[0].borrow().num_reads(), 500);
    }

    #[test]
    fn test_dynamic_scheduler_uncapped_uses_the_smallest_budget() {
        let mut scheduler = DynamicScheduler::from_seed(None, 0);
        let annealer = ChimeraAnnealer::default();
        let ready = [solid_task("a", 4, 4, 900), solid_task("b", 4, 4, 250)];
        let insts = scheduler.schedule(&ready, &annealer).unwrap();
        let inst = insts[0].borrow();
        assert_eq!(inst.tasks().len(), 2);
        assert_eq!(inst.num_reads(), 250);
    }

    #[test]
    fn test_dynamic_scheduler_is_deterministic_per_seed() {
        let run = |seed: u64| -> Vec<String> {
            let mut scheduler = DynamicScheduler::from_seed(Some(500), seed);
            let annealer = ChimeraAnnealer::default();
            let ready: Vec<TaskRef> = (0..6)
                .map(|i| solid_task(&format!("t{i}"), 5, 5, 300))
                .collect();
            let insts = scheduler.schedule(&ready, &annealer).unwrap();
            let inst = insts[0].borrow();
            inst.tasks()
                .iter()
                .map(|t| t.borrow().name().to_string())
                .collect()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_instrumented_scheduler_records_each_call() {
        let mut scheduler = InstrumentedScheduler::new(ToyScheduler::new());
        let annealer = ChimeraAnnealer::default();
        let ready = [solid_task("a", 4, 4, 100)];

        scheduler.schedule(&ready, &annealer).unwrap();
        scheduler.schedule(&[], &annealer).unwrap();

        let samples = scheduler.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].ready_tasks, 1);
        assert!((samples[0].demand_ratios[0] - 16.0 / 256.0).abs() < 1e-9);
        assert_eq!(samples[1].ready_tasks, 0);
    }
}
