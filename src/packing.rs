//! Bin-packing strategies over the placement engine
//!
//! The packers turn a list of resource requests into one or more schedules,
//! where a schedule is a set of assignments that co-execute on a fresh copy
//! of the resource grid:
//! - `first_fit` scans open schedules in creation order
//! - `next_fit` keeps a single current schedule and opens a new one only
//!   when nothing else fits
//! - `random_fit` draws tasks by weight from an injected random source and
//!   packs a single schedule

use std::rc::Rc;

use rand::Rng;

use crate::error::{QamtError, QamtResult};
use crate::grid::Grid;
use crate::placement::fit_demand_with_symmetries;
use crate::task::TaskRef;

/// A task's resource requirement, as consumed by the packers
#[derive(Debug, Clone)]
pub struct Request {
    pub task: TaskRef,
    /// The task's embedding footprint
    pub demand: Grid,
    /// Remaining samples, used as the schedule duration
    pub duration: u32,
}

impl Request {
    /// Snapshot a task's current requirement
    pub fn from_task(task: &TaskRef) -> Self {
        let t = task.borrow();
        Self {
            task: Rc::clone(task),
            demand: t.embedding().clone(),
            duration: t.samples_remaining(),
        }
    }
}

/// A committed placement within a schedule
#[derive(Debug, Clone)]
pub struct Assignment {
    pub task: TaskRef,
    /// Grid-shaped allocation bitmap
    pub allocation: Grid,
    pub duration: u32,
}

/// Tasks that run in parallel on one copy of the resource grid
pub type Schedule = Vec<Assignment>;

fn request_names(requests: &[Request]) -> String {
    requests
        .iter()
        .map(|r| r.task.borrow().name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// First-fit: place each request into the first open schedule with room.
///
/// A request that does not fit any open schedule opens a new one; a request
/// that does not fit a fresh grid is a fatal scheduling error.
pub fn first_fit(requests: &[Request], resources: &Grid) -> QamtResult<Vec<Schedule>> {
    let mut schedules: Vec<(Grid, Schedule)> = vec![(resources.clone(), Vec::new())];

    for request in requests {
        let mut placed = false;
        for (grid, subset) in schedules.iter_mut() {
            if let Some(placement) = fit_demand_with_symmetries(grid, &request.demand) {
                *grid += &placement.allocation;
                subset.push(Assignment {
                    task: Rc::clone(&request.task),
                    allocation: placement.allocation,
                    duration: request.duration,
                });
                placed = true;
                break;
            }
        }
        if !placed {
            let mut grid = resources.clone();
            match fit_demand_with_symmetries(&grid, &request.demand) {
                Some(placement) => {
                    grid += &placement.allocation;
                    let subset = vec![Assignment {
                        task: Rc::clone(&request.task),
                        allocation: placement.allocation,
                        duration: request.duration,
                    }];
                    schedules.push((grid, subset));
                }
                None => {
                    return Err(QamtError::InfeasiblePlacement(
                        request.task.borrow().name().to_string(),
                    ));
                }
            }
        }
    }

    Ok(schedules.into_iter().map(|(_, subset)| subset).collect())
}

/// Next-fit: pack a single current schedule, opening a new one only when no
/// remaining request fits.
///
/// `n_schedules` caps how many schedules are produced; once the cap is
/// reached the leftover requests are dropped. An empty schedule that fits
/// none of the remaining requests is a fatal scheduling error.
pub fn next_fit(
    requests: &[Request],
    resources: &Grid,
    n_schedules: Option<usize>,
) -> QamtResult<Vec<Schedule>> {
    let mut remaining: Vec<Request> = requests.to_vec();
    let mut schedules: Vec<(Grid, Schedule)> = vec![(resources.clone(), Vec::new())];

    while !remaining.is_empty() {
        let last = schedules.len() - 1;

        let mut found = None;
        for (i, request) in remaining.iter().enumerate() {
            if let Some(placement) = fit_demand_with_symmetries(&schedules[last].0, &request.demand)
            {
                found = Some((i, placement));
                break;
            }
        }

        match found {
            Some((i, placement)) => {
                let request = remaining.remove(i);
                schedules[last].0 += &placement.allocation;
                schedules[last].1.push(Assignment {
                    task: request.task,
                    allocation: placement.allocation,
                    duration: request.duration,
                });
            }
            None => {
                if let Some(cap) = n_schedules {
                    if schedules.len() >= cap {
                        break;
                    }
                }
                if schedules[last].1.is_empty() {
                    return Err(QamtError::InfeasiblePlacement(request_names(&remaining)));
                }
                schedules.push((resources.clone(), Vec::new()));
            }
        }
    }

    Ok(schedules.into_iter().map(|(_, subset)| subset).collect())
}

/// Weighted-random-fit: pack one schedule, drawing candidates by weight.
///
/// Weights default to 1 and must be positive. Each draw is attempted on the
/// accumulating grid; a candidate that no longer fits is dropped from the
/// pool (and the weight distribution rebuilt) rather than aborting. The
/// random source is injected so callers control the seed.
pub fn random_fit<R: Rng + ?Sized>(
    requests: &[Request],
    resources: &Grid,
    weights: Option<&[f64]>,
    rng: &mut R,
) -> QamtResult<Vec<Schedule>> {
    let mut pool: Vec<Request> = requests.to_vec();
    let mut pool_weights: Vec<f64> = match weights {
        Some(w) => {
            if w.len() != requests.len() {
                return Err(QamtError::InvalidWeights(format!(
                    "{} weights for {} requests",
                    w.len(),
                    requests.len()
                )));
            }
            if w.iter().any(|&x| !x.is_finite() || x <= 0.0) {
                return Err(QamtError::InvalidWeights(
                    "weights must be positive and finite".to_string(),
                ));
            }
            w.to_vec()
        }
        None => vec![1.0; pool.len()],
    };

    let mut grid = resources.clone();
    let mut committed: Schedule = Vec::new();

    while !pool.is_empty() {
        // Inverse-CDF sampling over the current pool.
        let total: f64 = pool_weights.iter().sum();
        let draw = rng.gen::<f64>() * total;
        let mut index = pool.len() - 1;
        let mut cumulative = 0.0;
        for (i, w) in pool_weights.iter().enumerate() {
            cumulative += w;
            if draw < cumulative {
                index = i;
                break;
            }
        }

        let candidate = pool[index].clone();
        let attempt = next_fit(std::slice::from_ref(&candidate), &grid, Some(1))?;
        let placed = attempt.into_iter().next().unwrap_or_default();

        if let Some(assignment) = placed.into_iter().next() {
            grid += &assignment.allocation;
            committed.push(assignment);
        }
        // Either way this candidate leaves the pool: committed, or unable to
        // fit the remaining space.
        pool.remove(index);
        pool_weights.remove(index);
    }

    Ok(vec![committed])
}
