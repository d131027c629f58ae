//! 2-D integer resource bitmaps
//!
//! A [`Grid`] is a rectangular matrix of non-negative integers. A cell value
//! of 0 means free, anything greater means occupied. The same type serves as
//! resource map, demand footprint and allocation bitmap; demands and
//! allocations are 0/1 images.

use ndarray::{s, Array2, ArrayView2, Axis};

use crate::error::{QamtError, QamtResult};

/// Default processor grid shape
pub const DEFAULT_SHAPE: (usize, usize) = (16, 16);

/// Rectangular occupancy bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Array2<u32>,
}

impl Grid {
    /// All-free grid of the given shape
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            cells: Array2::zeros((rows, cols)),
        }
    }

    /// Fully occupied grid of the given shape
    pub fn ones(rows: usize, cols: usize) -> Self {
        Self {
            cells: Array2::ones((rows, cols)),
        }
    }

    /// Wrap an existing matrix
    pub fn from_array(cells: Array2<u32>) -> Self {
        Self { cells }
    }

    /// Build from row vectors, rejecting empty or ragged input
    pub fn from_rows(rows: &[Vec<u32>]) -> QamtResult<Self> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(QamtError::InvalidTask("empty bitmap".to_string()));
        }
        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(QamtError::InvalidTask("ragged bitmap rows".to_string()));
        }
        let flat: Vec<u32> = rows.iter().flatten().copied().collect();
        let cells = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| QamtError::InvalidTask(e.to_string()))?;
        Ok(Self { cells })
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Total number of cells
    pub fn area(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[(row, col)]
    }

    pub fn view(&self) -> ArrayView2<'_, u32> {
        self.cells.view()
    }

    /// Boolean image: 1 where occupied, 0 where free
    pub fn occupancy(&self) -> Grid {
        Self {
            cells: self.cells.mapv(|v| u32::from(v > 0)),
        }
    }

    /// Number of occupied cells
    pub fn count_ones(&self) -> usize {
        self.cells.iter().filter(|&&v| v > 0).count()
    }

    /// True when every cell is set (a solid rectangle)
    pub fn is_fully_solid(&self) -> bool {
        self.cells.iter().all(|&v| v > 0)
    }

    /// True when this bitmap's bounding box fits inside `other`'s
    pub fn fits_within(&self, other: &Grid) -> bool {
        self.rows() <= other.rows() && self.cols() <= other.cols()
    }

    /// True when any cell is occupied in both bitmaps
    pub fn overlaps(&self, other: &Grid) -> bool {
        self.cells
            .iter()
            .zip(other.cells.iter())
            .any(|(&a, &b)| a > 0 && b > 0)
    }

    /// Rotate 90 degrees counter-clockwise
    pub fn rot90(&self) -> Grid {
        let mut rotated = self.cells.t().to_owned();
        rotated.invert_axis(Axis(0));
        Self { cells: rotated }
    }

    /// Mirror horizontally (reverse each row)
    pub fn fliplr(&self) -> Grid {
        let mut flipped = self.cells.clone();
        flipped.invert_axis(Axis(1));
        Self { cells: flipped }
    }

    /// Zeros of this grid's shape with `demand` copied in at `(row, col)`
    pub fn embed(&self, demand: &Grid, row: usize, col: usize) -> Grid {
        let mut alloc = Array2::zeros(self.cells.dim());
        let (dr, dc) = demand.shape();
        let mut window = alloc.slice_mut(s![row..row + dr, col..col + dc]);
        window += &demand.cells;
        Self { cells: alloc }
    }

    /// Elementwise sum; shapes must match
    pub fn add_assign(&mut self, other: &Grid) {
        debug_assert_eq!(self.shape(), other.shape());
        self.cells += &other.cells;
    }
}

impl std::ops::AddAssign<&Grid> for Grid {
    fn add_assign(&mut self, rhs: &Grid) {
        Grid::add_assign(self, rhs);
    }
}

impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.cells.rows() {
            for cell in row {
                write!(f, "{}", if *cell > 0 { '#' } else { '.' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
