//! Discrete-event simulator for quantum-annealing multi-task scheduling
//!
//! This crate models a single annealing processor with a finite 2-D resource
//! grid executing batches of independent sampling tasks that arrive over time:
//! - Packs rigid 2-D embedding footprints onto the grid (bitmap bin-packing
//!   with rotation/mirror symmetry search and edge-preference scoring)
//! - Fuses co-executing tasks into compound quantum-machine instructions
//! - Advances discrete-event time until every task's sample budget is met
//! - Reports execution/response/waiting-time metrics and grid utilisation
//!
//! Annealing is modelled purely as elapsed time; there is no distributed
//! execution and no persisted state. The whole simulation is single-threaded
//! and deterministic given a seeded random source.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod annealer;
pub mod error;
pub mod grid;
pub mod instruction;
pub mod metrics;
pub mod packing;
pub mod placement;
pub mod scheduler;
pub mod simulator;
pub mod task;
pub mod taskgen;

pub use annealer::{Annealer, ChimeraAnnealer};
pub use error::{QamtError, QamtResult};
pub use grid::Grid;
pub use instruction::{Instruction, InstructionRef, InstructionTiming};
pub use metrics::{resource_utilisation, TaskTiming};
pub use packing::{first_fit, next_fit, random_fit, Assignment, Request, Schedule};
pub use placement::{fit_demand, fit_demand_with_symmetries, Placement};
pub use scheduler::{
    DynamicScheduler, InstrumentedScheduler, NaiveScheduler, NextFitPreemptionScheduler, Scheduler,
    StaticScheduler, ToyScheduler,
};
pub use simulator::{Event, Simulator};
pub use task::{ActivityEntry, ActivityPhase, Task, TaskRef, TaskSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
