//! Annealing processor models
//!
//! An annealer owns the resource grid and turns one instruction at a time
//! into elapsed model time: a one-shot programming latency followed by
//! `num_reads` back-to-back samples. Executing an instruction logs the
//! program and sample periods into every batched task and credits their
//! sample budgets. The busy/idle flag is driven by the simulator, which
//! guarantees at most one in-flight instruction.

use std::rc::Rc;

use crate::grid::{Grid, DEFAULT_SHAPE};
use crate::instruction::{Instruction, InstructionRef, InstructionTiming};
use crate::task::ActivityPhase;

/// Default per-instruction programming latency, in model-time units
pub const DEFAULT_PROGRAM_TIME: u64 = 12_000;

/// Annealing-processor plug-in contract
pub trait Annealer {
    /// Run an instruction starting at `now`; returns the finish time.
    ///
    /// Never fails: feasibility is the scheduler's responsibility.
    fn execute(&mut self, inst: &InstructionRef, now: u64) -> u64;

    fn is_idle(&self) -> bool;
    fn set_busy(&mut self);
    fn set_idle(&mut self);

    /// A clone of the resource grid, for schedulers to pack against
    fn resources(&self) -> Grid;

    /// Per-instruction programming latency
    fn program_time(&self, inst: &Instruction) -> u64;

    fn last_instruction(&self) -> Option<InstructionRef>;
}

/// Chimera-topology annealer with a flat programming latency
pub struct ChimeraAnnealer {
    resources: Grid,
    program_time: u64,
    idle: bool,
    last_instruction: Option<InstructionRef>,
}

impl ChimeraAnnealer {
    pub fn new(rows: usize, cols: usize, program_time: u64) -> Self {
        Self {
            resources: Grid::zeros(rows, cols),
            program_time,
            idle: true,
            last_instruction: None,
        }
    }

    /// Default 16x16 grid with the given programming latency
    pub fn with_program_time(program_time: u64) -> Self {
        Self::new(DEFAULT_SHAPE.0, DEFAULT_SHAPE.1, program_time)
    }
}

impl Default for ChimeraAnnealer {
    fn default() -> Self {
        Self::with_program_time(DEFAULT_PROGRAM_TIME)
    }
}

impl Annealer for ChimeraAnnealer {
    fn execute(&mut self, inst: &InstructionRef, now: u64) -> u64 {
        let (tasks, num_reads, anneal_time, program) = {
            let i = inst.borrow();
            (
                i.tasks().to_vec(),
                i.num_reads(),
                i.anneal_time(),
                self.program_time(&i),
            )
        };
        let sample = anneal_time * u64::from(num_reads);
        let elapsed = program + sample;

        for task in &tasks {
            let mut t = task.borrow_mut();
            if program > 0 {
                t.log(ActivityPhase::Program, (now, now + program), 1);
                t.log(
                    ActivityPhase::Sample,
                    (now + program, now + program + anneal_time),
                    num_reads,
                );
            } else {
                t.log(ActivityPhase::Sample, (now, now + anneal_time), num_reads);
            }
            if let Some(remaining) = t.sample_plus(num_reads) {
                tracing::debug!(task = %t.name(), remaining, "sample budget satisfied");
            }
        }

        inst.borrow_mut().stamp_timing(InstructionTiming {
            start: now,
            end: now + elapsed,
            program,
            sample,
        });
        self.last_instruction = Some(Rc::clone(inst));

        now + elapsed
    }

    fn is_idle(&self) -> bool {
        self.idle
    }

    fn set_busy(&mut self) {
        self.idle = false;
    }

    fn set_idle(&mut self) {
        self.idle = true;
    }

    fn resources(&self) -> Grid {
        self.resources.clone()
    }

    fn program_time(&self, _inst: &Instruction) -> u64 {
        self.program_time
    }

    fn last_instruction(&self) -> Option<InstructionRef> {
        self.last_instruction.clone()
    }
}
