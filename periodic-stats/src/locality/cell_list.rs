use ndarray::Array3;

use crate::{Error, Vector3D};
use super::PeriodicBox;

/// Maximal number of cells, we need to use this to prevent having too many
/// cells with a large box and a small cutoff
const MAX_NUMBER_OF_CELLS: f64 = 1e6;

/// The cell list sorts points inside a uniform grid of cells covering the
/// box, with cells at least as wide as the cutoff.
///
/// All the points closer than the cutoff to a given point are then in the
/// same cell or in one of the directly neighboring cells, which makes
/// neighbor searches linear in the number of points. Cells are identified by
/// a linear index, from the `[x, y, z]` cell coordinates in row-major order.
#[derive(Debug, Clone)]
pub struct CellList {
    /// Box defining periodic boundary conditions
    simulation_box: PeriodicBox,
    /// Cutoff used to create the cells
    cutoff: f64,
    /// the cells themselves, containing the indexes of the points
    cells: Array3<Vec<usize>>,
}

impl CellList {
    /// Create a new empty `CellList` for the given box and cutoff, with as
    /// many cells as possible while keeping the cells larger than `cutoff`.
    ///
    /// This fails if the cutoff is not positive or larger than half of the
    /// smallest periodic box width.
    pub fn new(simulation_box: PeriodicBox, cutoff: f64) -> Result<CellList, Error> {
        simulation_box.check_cutoff(cutoff)?;

        let widths = simulation_box.nearest_plane_distance();
        let mut n_cells = [1.0; 3];
        for axis in 0..simulation_box.dimensions() {
            n_cells[axis] = f64::max(f64::floor(widths[axis] / cutoff), 1.0);
        }

        // limit memory consumption by ensuring we have less than
        // `MAX_NUMBER_OF_CELLS` cells, while keeping roughly the ratio of
        // cells in each direction. Larger cells are still valid.
        let n_cells_total = n_cells[0] * n_cells[1] * n_cells[2];
        if n_cells_total > MAX_NUMBER_OF_CELLS {
            let factor = if simulation_box.is_2d() {
                f64::sqrt(MAX_NUMBER_OF_CELLS / n_cells_total)
            } else {
                f64::cbrt(MAX_NUMBER_OF_CELLS / n_cells_total)
            };

            for n in &mut n_cells[..simulation_box.dimensions()] {
                *n = f64::max(f64::floor(*n * factor), 1.0);
            }
        }

        let n_cells = [n_cells[0] as usize, n_cells[1] as usize, n_cells[2] as usize];
        Ok(CellList {
            simulation_box: simulation_box,
            cutoff: cutoff,
            cells: Array3::from_elem(n_cells, Vec::new()),
        })
    }

    /// Create a `CellList` and sort all the `points` inside it. The index of
    /// each point in the list is its position in `points`.
    #[time_graph::instrument(name = "CellList::build")]
    pub fn build(simulation_box: PeriodicBox, points: &[Vector3D], cutoff: f64) -> Result<CellList, Error> {
        let mut cell_list = CellList::new(simulation_box, cutoff)?;
        for (index, &position) in points.iter().enumerate() {
            if !position.is_finite() {
                return Err(Error::InvalidGeometry(format!(
                    "point {} has a non finite position: {:?}", index, position
                )));
            }

            let cell = cell_list.cell_index(position);
            cell_list.cells[cell].push(index);
        }

        return Ok(cell_list);
    }

    /// Get the box used by this cell list
    pub fn simulation_box(&self) -> &PeriodicBox {
        &self.simulation_box
    }

    /// Get the cutoff used to create this cell list
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Get the number of cells along each axis
    pub fn n_cells(&self) -> [usize; 3] {
        let shape = self.cells.shape();
        [shape[0], shape[1], shape[2]]
    }

    /// Get the total number of cells
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Get the width of a single cell along each axis, as the distance
    /// between opposite faces of the cell. The third value is infinite for
    /// 2D boxes.
    pub fn cell_width(&self) -> [f64; 3] {
        let widths = self.simulation_box.nearest_plane_distance();
        let n_cells = self.n_cells();
        [
            widths[0] / n_cells[0] as f64,
            widths[1] / n_cells[1] as f64,
            widths[2] / n_cells[2] as f64,
        ]
    }

    /// Smallest cell width over all the axes of the box
    pub(crate) fn min_cell_width(&self) -> f64 {
        let widths = self.cell_width();
        widths[..self.simulation_box.dimensions()].iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Get the coordinates of the cell containing `position`. Positions
    /// outside of the box are wrapped along periodic axes, and clamped into
    /// the edge cells along non-periodic axes.
    fn cell_index(&self, position: Vector3D) -> [usize; 3] {
        let fractional = self.simulation_box.fractional(position);
        let periodic = self.simulation_box.periodic();
        let n_cells = self.n_cells();

        let mut index = [0; 3];
        for axis in 0..self.simulation_box.dimensions() {
            let mut value = fractional[axis];
            if periodic[axis] {
                value -= f64::floor(value);
            }

            let cell = f64::floor(value * n_cells[axis] as f64);
            // this also deals with `value` rounding up to 1.0 in the
            // periodic case
            index[axis] = f64::clamp(cell, 0.0, (n_cells[axis] - 1) as f64) as usize;
        }

        return index;
    }

    /// Get the linear index of the cell containing `position`
    pub fn get_cell(&self, position: Vector3D) -> usize {
        self.cell_id(self.cell_index(position))
    }

    /// Get the linear index of the cell with the given coordinates
    pub fn cell_id(&self, coordinates: [usize; 3]) -> usize {
        let n_cells = self.n_cells();
        (coordinates[0] * n_cells[1] + coordinates[1]) * n_cells[2] + coordinates[2]
    }

    /// Get the `[x, y, z]` coordinates of the cell with linear index `id`
    pub fn cell_coordinates(&self, id: usize) -> [usize; 3] {
        let n_cells = self.n_cells();
        let z = id % n_cells[2];
        let y = (id / n_cells[2]) % n_cells[1];
        let x = id / (n_cells[2] * n_cells[1]);
        [x, y, z]
    }

    /// Get the indexes of the points in the cell `id`
    pub fn particles_in_cell(&self, id: usize) -> &[usize] {
        &self.cells[self.cell_coordinates(id)]
    }

    /// Get the cells directly neighboring the cell `id`, including the cell
    /// itself: the 3x3x3 stencil (3x3 for 2D boxes) around the cell, going
    /// through periodic boundaries. The list is sorted and does not contain
    /// duplicates, even when there are less than three cells along an axis.
    pub fn get_cell_neighbors(&self, id: usize) -> Vec<usize> {
        let mut neighbors = self.shell(id, 0);
        neighbors.extend(self.shell(id, 1));
        neighbors.sort_unstable();
        neighbors.dedup();
        return neighbors;
    }

    /// Get the cells at a Chebyshev distance (maximal number of cells along
    /// any axis) of exactly `distance` of the cell `id`, going through
    /// periodic boundaries.
    ///
    /// The list does not contain duplicates, but for small grids some of
    /// these cells can also be at a smaller distance through another
    /// periodic image.
    pub fn shell(&self, id: usize, distance: usize) -> Vec<usize> {
        let center = self.cell_coordinates(id);
        let n_cells = self.n_cells();
        let periodic = self.simulation_box.periodic();
        let dimensions = self.simulation_box.dimensions();

        let distance = distance as isize;
        let range = |axis: usize| {
            if axis < dimensions { -distance..=distance } else { 0..=0 }
        };

        // move by `delta` cells along `axis`, returning `None` if this goes
        // outside of the grid along a non-periodic axis
        let shifted = |axis: usize, delta: isize| -> Option<usize> {
            let n = n_cells[axis] as isize;
            let value = center[axis] as isize + delta;
            if periodic[axis] {
                Some(value.rem_euclid(n) as usize)
            } else if value >= 0 && value < n {
                Some(value as usize)
            } else {
                None
            }
        };

        let mut cells = Vec::new();
        for dx in range(0) {
            for dy in range(1) {
                for dz in range(2) {
                    if dx.abs().max(dy.abs()).max(dz.abs()) != distance {
                        continue;
                    }

                    let coordinates = match (shifted(0, dx), shifted(1, dy), shifted(2, dz)) {
                        (Some(x), Some(y), Some(z)) => [x, y, z],
                        _ => continue,
                    };
                    cells.push(self.cell_id(coordinates));
                }
            }
        }

        cells.sort_unstable();
        cells.dedup();
        return cells;
    }

    /// Largest shell distance for which `shell` can contain cells not
    /// already found at smaller distances
    pub(crate) fn max_shell(&self) -> usize {
        let n_cells = self.n_cells();
        let periodic = self.simulation_box.periodic();

        let mut max = 0;
        for axis in 0..self.simulation_box.dimensions() {
            let axis_max = if periodic[axis] {
                n_cells[axis] / 2
            } else {
                n_cells[axis] - 1
            };
            max = usize::max(max, axis_max);
        }
        return max;
    }
}
