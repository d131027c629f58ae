//! Bitmap placement engine
//!
//! Given a resource bitmap and a demand bitmap, find the best-scoring
//! translation of the demand that overlaps no occupied cell:
//! - A feasibility map is the 2-D cross-correlation of the resource
//!   occupancy with the demand (valid mode); a zero entry means the demand
//!   fits with its top-left corner at that offset.
//! - Feasible offsets are scored by summing the four neighbouring
//!   feasibility values, with out-of-map neighbours counting 1, so
//!   placements hugging occupied regions or the grid boundary win.
//! - Demands may be non-rectangular; the search tries the eight symmetries
//!   of the square (two for fully solid demands, where the rest are
//!   redundant).
//!
//! "No fit" is an ordinary `None`, never an error.

use ndarray::Array2;

use crate::grid::Grid;

/// A chosen allocation and its edge-preference score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Grid-shaped bitmap with one translated copy of the demand
    pub allocation: Grid,
    /// Edge-preference score of the chosen offset; always positive
    pub score: u32,
}

/// Fit a demand onto a resource bitmap without rotating it.
///
/// Returns the allocation for the first highest-scoring feasible offset in
/// row-major order, or `None` when the demand does not fit.
pub fn fit_demand(resources: &Grid, demand: &Grid) -> Option<Placement> {
    if !demand.fits_within(resources) {
        return None;
    }

    let occupancy = resources.occupancy();
    let occ = occupancy.view();
    let dmd = demand.view();
    let (grid_rows, grid_cols) = resources.shape();
    let (dmd_rows, dmd_cols) = demand.shape();
    let out_rows = grid_rows - dmd_rows + 1;
    let out_cols = grid_cols - dmd_cols + 1;

    // Cross-correlation of occupancy with the demand: the number of occupied
    // cells the demand would cover at each offset.
    let mut feasible = Array2::<u32>::zeros((out_rows, out_cols));
    for i in 0..out_rows {
        for j in 0..out_cols {
            let mut overlap = 0;
            for ((u, v), &d) in dmd.indexed_iter() {
                overlap += occ[(i + u, j + v)] * d;
            }
            feasible[(i, j)] = overlap;
        }
    }

    // Neighbour of a feasibility cell, treating the border as occupied so
    // that edge placements score.
    let neighbour = |i: isize, j: isize| -> u32 {
        if i < 0 || j < 0 || i >= out_rows as isize || j >= out_cols as isize {
            1
        } else {
            feasible[(i as usize, j as usize)]
        }
    };

    let mut best: Option<(usize, usize, u32)> = None;
    for i in 0..out_rows {
        for j in 0..out_cols {
            if feasible[(i, j)] != 0 {
                continue;
            }
            let (si, sj) = (i as isize, j as isize);
            let score = neighbour(si - 1, sj)
                + neighbour(si + 1, sj)
                + neighbour(si, sj - 1)
                + neighbour(si, sj + 1);
            if score > best.map_or(0, |(_, _, s)| s) {
                best = Some((i, j, score));
            }
        }
    }

    best.map(|(i, j, score)| Placement {
        allocation: resources.embed(demand, i, j),
        score,
    })
}

/// Fit a demand trying rotations and mirrors, keeping the best score.
///
/// Fully solid demands only need the two distinct rotations; irregular
/// shapes try all eight symmetries, the mirrored variant of each rotation
/// first. The first transform attaining the best score wins.
pub fn fit_demand_with_symmetries(resources: &Grid, demand: &Grid) -> Option<Placement> {
    let transforms = if demand.is_fully_solid() {
        vec![demand.clone(), demand.rot90()]
    } else {
        let mut all = Vec::with_capacity(8);
        let mut rotated = demand.clone();
        for _ in 0..4 {
            all.push(rotated.fliplr());
            all.push(rotated.clone());
            rotated = rotated.rot90();
        }
        all
    };

    let mut best: Option<Placement> = None;
    for transform in &transforms {
        if let Some(candidate) = fit_demand(resources, transform) {
            if candidate.score > best.as_ref().map_or(0, |b| b.score) {
                best = Some(candidate);
            }
        }
    }
    best
}
