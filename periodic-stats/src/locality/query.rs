use log::warn;
use rayon::prelude::*;

use crate::{Error, Vector3D};
use super::{PeriodicBox, CellList, Bond, NeighborList, COINCIDENT_DISTANCE};

/// Which kind of neighbors a query should find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Find all points within a distance `r_max` of the query point
    Ball,
    /// Find the `num_neighbors` points closest to the query point
    Nearest,
}

fn default_scale() -> f64 {
    1.1
}

/// Parameters for a neighbor query
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryArgs {
    /// kind of query to run
    pub mode: QueryMode,
    /// Only points closer than `r_max` are returned. This is required for
    /// ball queries, and defaults to half of the smallest periodic box width
    /// for nearest neighbors queries.
    #[serde(default)]
    pub r_max: Option<f64>,
    /// Only points at a distance of at least `r_min` are returned
    #[serde(default)]
    pub r_min: f64,
    /// Number of neighbors to find in nearest neighbors queries
    #[serde(default)]
    pub num_neighbors: usize,
    /// Should we exclude the point with the same index as the query point?
    /// This is used when the query points are the same as the points.
    #[serde(default)]
    pub exclude_ii: bool,
    /// Initial search radius for nearest neighbors queries
    #[serde(default)]
    pub r_guess: Option<f64>,
    /// Factor by which the search radius of nearest neighbors queries grows
    /// when less than `num_neighbors` points are found
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl QueryArgs {
    /// Arguments for a ball query with the given `r_max`
    pub fn ball(r_max: f64) -> QueryArgs {
        QueryArgs {
            mode: QueryMode::Ball,
            r_max: Some(r_max),
            r_min: 0.0,
            num_neighbors: 0,
            exclude_ii: false,
            r_guess: None,
            scale: default_scale(),
        }
    }

    /// Arguments for a query finding the `num_neighbors` nearest neighbors
    pub fn nearest(num_neighbors: usize) -> QueryArgs {
        QueryArgs {
            mode: QueryMode::Nearest,
            num_neighbors: num_neighbors,
            r_max: None,
            ..QueryArgs::ball(0.0)
        }
    }

    /// Read and validate query arguments from a JSON string
    pub fn from_json(json: &str) -> Result<QueryArgs, Error> {
        let args: QueryArgs = serde_json::from_str(json)?;
        args.validate()?;
        return Ok(args);
    }

    /// Serialize these arguments to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check that these arguments are consistent with each other
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(r_max) = self.r_max {
            if !(r_max > 0.0) {
                return Err(Error::InvalidGeometry(format!(
                    "r_max must be positive, got {}", r_max
                )));
            }
        }

        if !(self.r_min >= 0.0 && self.r_min.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "r_min must be positive or zero, got {}", self.r_min
            )));
        }

        if self.r_min >= self.r_max.unwrap_or(f64::INFINITY) {
            return Err(Error::InvalidParameter(format!(
                "r_min ({}) must be smaller than r_max ({:?})", self.r_min, self.r_max
            )));
        }

        match self.mode {
            QueryMode::Ball => {
                if self.r_max.is_none() {
                    return Err(Error::InvalidParameter(
                        "r_max is required for ball queries".into()
                    ));
                }
            }
            QueryMode::Nearest => {
                if self.num_neighbors == 0 {
                    return Err(Error::InvalidParameter(
                        "num_neighbors must be at least 1 for nearest neighbors queries".into()
                    ));
                }

                if !(self.scale > 1.0 && self.scale.is_finite()) {
                    return Err(Error::InvalidParameter(format!(
                        "scale must be larger than 1, got {}", self.scale
                    )));
                }

                if let Some(r_guess) = self.r_guess {
                    if !(r_guess > 0.0) {
                        return Err(Error::InvalidParameter(format!(
                            "r_guess must be positive, got {}", r_guess
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Get the actual maximal distance for queries in `simulation_box`,
    /// checking that it respects the minimum image convention.
    fn effective_r_max(&self, simulation_box: &PeriodicBox) -> Result<f64, Error> {
        self.validate()?;
        match self.r_max {
            Some(r_max) => {
                simulation_box.check_cutoff(r_max)?;
                Ok(r_max)
            }
            None => Ok(simulation_box.min_periodic_width().map_or(f64::INFINITY, |width| 0.5 * width)),
        }
    }
}

/// A single neighbor found by a [`NeighborQuery`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPoint {
    /// index of the query point
    pub query_point: usize,
    /// index of the neighbor in the points of the query
    pub point: usize,
    /// minimum image distance between the query point and the neighbor
    pub distance: f64,
}

impl From<NeighborPoint> for Bond {
    fn from(neighbor: NeighborPoint) -> Bond {
        Bond::new(neighbor.query_point, neighbor.point, neighbor.distance)
    }
}

/// Lazy sequence of neighbors returned by a query
pub type NeighborIter<'a> = Box<dyn Iterator<Item = NeighborPoint> + 'a>;

/// A `NeighborQuery` finds the neighbors of arbitrary query points among a
/// fixed set of points in a periodic box.
///
/// Ball queries can return neighbors in any order, nearest neighbors queries
/// return them sorted by increasing distance, and then by increasing index
/// for equal distances. All implementations must find the same neighbors and
/// distances for the same inputs.
pub trait NeighborQuery: Send + Sync {
    /// Get the box containing the points
    fn simulation_box(&self) -> &PeriodicBox;

    /// Get the points of this query
    fn points(&self) -> &[Vector3D];

    /// Find all the points within `args.r_max` (and at least `args.r_min`) of
    /// `query_point`. `query_index` is the index of the query point, used
    /// for `args.exclude_ii`.
    fn query_ball<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error>;

    /// Find the `args.num_neighbors` points closest to `query_point`, within
    /// `args.r_max`. Less neighbors are returned if there are not enough
    /// points in this range.
    fn query_nearest<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error>;

    /// Run a single query with the mode specified in `args`
    fn query_single<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error> {
        match args.mode {
            QueryMode::Ball => self.query_ball(query_point, query_index, args),
            QueryMode::Nearest => self.query_nearest(query_point, query_index, args),
        }
    }

    /// Find the neighbors of all `query_points` and collect them in a
    /// neighbor list. The queries run in parallel, and the bonds of each
    /// query point are sorted by point index for ball queries and by
    /// distance for nearest neighbors queries.
    ///
    /// The parallel section runs on the current rayon thread pool. Call this
    /// function inside [`WorkerPool::install`](crate::WorkerPool::install)
    /// to choose which threads are used.
    fn query(&self, query_points: &[Vector3D], args: &QueryArgs) -> Result<NeighborList, Error> {
        query_all(self, query_points, args)
    }
}

impl dyn NeighborQuery {
    /// Create the most efficient `NeighborQuery` for the given points and
    /// maximal query distance: a cell list is used when `r_max` is smaller
    /// than a third of the smallest box width, and a brute force search
    /// otherwise.
    pub fn auto(simulation_box: PeriodicBox, points: &[Vector3D], r_max: f64) -> Result<Box<dyn NeighborQuery>, Error> {
        simulation_box.check_cutoff(r_max)?;

        let widths = simulation_box.nearest_plane_distance();
        let l_min = widths[..simulation_box.dimensions()].iter().copied().fold(f64::INFINITY, f64::min);

        if r_max < l_min / 3.0 {
            Ok(Box::new(CellListQuery::new(simulation_box, points, r_max)?))
        } else {
            Ok(Box::new(BruteForceQuery::new(simulation_box, points)?))
        }
    }
}

#[time_graph::instrument(name = "NeighborQuery::query")]
fn query_all<Q>(query: &Q, query_points: &[Vector3D], args: &QueryArgs) -> Result<NeighborList, Error>
    where Q: NeighborQuery + ?Sized
{
    args.validate()?;

    let per_point = query_points.par_iter()
        .enumerate()
        .map(|(index, &query_point)| -> Result<Vec<Bond>, Error> {
            let mut bonds = query.query_single(query_point, index, args)?
                .map(Bond::from)
                .collect::<Vec<_>>();

            if args.mode == QueryMode::Ball {
                bonds.sort_unstable_by_key(|bond| bond.point);
            }

            Ok(bonds)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let n_bonds = per_point.iter().map(Vec::len).sum();
    let mut bonds = Vec::with_capacity(n_bonds);
    for point_bonds in per_point {
        bonds.extend(point_bonds);
    }

    let coincident = bonds.iter()
        .filter(|bond| bond.distance < COINCIDENT_DISTANCE && bond.query_point != bond.point)
        .count();
    if coincident > 0 {
        warn!(
            "found {} pairs of distinct points closer than {}, are some points at the same position?",
            coincident, COINCIDENT_DISTANCE
        );
    }

    return Ok(NeighborList::from_sorted(query_points.len(), query.points().len(), bonds));
}

fn check_query_point(query_point: Vector3D, query_index: usize) -> Result<(), Error> {
    if query_point.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidGeometry(format!(
            "query point {} has a non finite position: {:?}", query_index, query_point
        )))
    }
}

/// Sort candidates by distance, then index, and keep the first `count`
fn select_nearest(mut candidates: Vec<NeighborPoint>, count: usize) -> Vec<NeighborPoint> {
    candidates.sort_unstable_by(|a, b| {
        a.distance.total_cmp(&b.distance).then(a.point.cmp(&b.point))
    });
    candidates.truncate(count);
    return candidates;
}

/// Common filtering of neighbors for all queries
#[derive(Debug, Clone, Copy)]
struct Selection {
    query_point: Vector3D,
    query_index: usize,
    exclude_ii: bool,
    r_min: f64,
    r_max: f64,
}

impl Selection {
    fn check(&self, simulation_box: &PeriodicBox, index: usize, position: Vector3D) -> Option<NeighborPoint> {
        if self.exclude_ii && index == self.query_index {
            return None;
        }

        let distance = simulation_box.distance(self.query_point, position);
        if distance < self.r_max && distance >= self.r_min {
            Some(NeighborPoint {
                query_point: self.query_index,
                point: index,
                distance: distance,
            })
        } else {
            None
        }
    }
}

/// Neighbor search looking at all the points for every query
#[derive(Debug, Clone)]
pub struct BruteForceQuery {
    simulation_box: PeriodicBox,
    points: Vec<Vector3D>,
}

impl BruteForceQuery {
    /// Create a brute force query over `points`
    pub fn new(simulation_box: PeriodicBox, points: &[Vector3D]) -> Result<BruteForceQuery, Error> {
        for (index, point) in points.iter().enumerate() {
            if !point.is_finite() {
                return Err(Error::InvalidGeometry(format!(
                    "point {} has a non finite position: {:?}", index, point
                )));
            }
        }

        Ok(BruteForceQuery {
            simulation_box: simulation_box,
            points: points.to_vec(),
        })
    }
}

impl NeighborQuery for BruteForceQuery {
    fn simulation_box(&self) -> &PeriodicBox {
        &self.simulation_box
    }

    fn points(&self) -> &[Vector3D] {
        &self.points
    }

    fn query_ball<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error> {
        check_query_point(query_point, query_index)?;
        let selection = Selection {
            query_point,
            query_index,
            exclude_ii: args.exclude_ii,
            r_min: args.r_min,
            r_max: args.effective_r_max(&self.simulation_box)?,
        };

        let simulation_box = &self.simulation_box;
        return Ok(Box::new(self.points.iter().enumerate().filter_map(move |(index, &position)| {
            selection.check(simulation_box, index, position)
        })));
    }

    fn query_nearest<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error> {
        if args.mode != QueryMode::Nearest {
            return Err(Error::InvalidParameter("expected nearest neighbors query arguments".into()));
        }
        let candidates = self.query_ball(query_point, query_index, args)?.collect();
        let nearest = select_nearest(candidates, args.num_neighbors);
        return Ok(Box::new(nearest.into_iter()));
    }
}

/// Neighbor search using a [`CellList`] to only look at points in cells
/// close to the query point.
#[derive(Debug, Clone)]
pub struct CellListQuery {
    points: Vec<Vector3D>,
    cells: CellList,
}

impl CellListQuery {
    /// Create a cell list query over `points`, with cells wider than
    /// `cell_width`. Ball queries with `r_max` below `cell_width` only need
    /// to look at the directly neighboring cells.
    pub fn new(simulation_box: PeriodicBox, points: &[Vector3D], cell_width: f64) -> Result<CellListQuery, Error> {
        let cells = CellList::build(simulation_box, points, cell_width)?;
        Ok(CellListQuery {
            points: points.to_vec(),
            cells: cells,
        })
    }

    /// Get the cell list used by this query
    pub fn cell_list(&self) -> &CellList {
        &self.cells
    }

    /// Number of cell shells around a cell to visit to find all the points
    /// closer than `radius`
    fn shells_for(&self, radius: f64) -> usize {
        let max_shell = self.cells.max_shell();
        let shells = f64::ceil(radius / self.cells.min_cell_width());
        if shells >= max_shell as f64 {
            max_shell
        } else {
            usize::max(shells as usize, 1)
        }
    }

    /// Add the points in the cells of shell `shell` around `center` to
    /// `candidates`, skipping already visited cells
    fn visit_shell(&self, center: usize, shell: usize, visited: &mut [bool], selection: &Selection, candidates: &mut Vec<NeighborPoint>) {
        let simulation_box = self.cells.simulation_box();
        for cell in self.cells.shell(center, shell) {
            if visited[cell] {
                continue;
            }
            visited[cell] = true;

            for &index in self.cells.particles_in_cell(cell) {
                if let Some(neighbor) = selection.check(simulation_box, index, self.points[index]) {
                    candidates.push(neighbor);
                }
            }
        }
    }
}

/// Lazy iterator over the neighbors in a list of cells
struct CellBallIter<'a> {
    query: &'a CellListQuery,
    selection: Selection,
    cells: std::vec::IntoIter<usize>,
    current: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for CellBallIter<'a> {
    type Item = NeighborPoint;

    fn next(&mut self) -> Option<NeighborPoint> {
        loop {
            if let Some(&index) = self.current.next() {
                let position = self.query.points[index];
                let neighbor = self.selection.check(self.query.cells.simulation_box(), index, position);
                if neighbor.is_some() {
                    return neighbor;
                }
            } else {
                let cell = self.cells.next()?;
                self.current = self.query.cells.particles_in_cell(cell).iter();
            }
        }
    }
}

impl NeighborQuery for CellListQuery {
    fn simulation_box(&self) -> &PeriodicBox {
        self.cells.simulation_box()
    }

    fn points(&self) -> &[Vector3D] {
        &self.points
    }

    fn query_ball<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error> {
        check_query_point(query_point, query_index)?;
        let r_max = args.effective_r_max(self.simulation_box())?;
        let selection = Selection {
            query_point,
            query_index,
            exclude_ii: args.exclude_ii,
            r_min: args.r_min,
            r_max: r_max,
        };

        let center = self.cells.get_cell(query_point);
        let mut visited = vec![false; self.cells.num_cells()];
        let mut cells = Vec::new();
        for shell in 0..=self.shells_for(r_max) {
            for cell in self.cells.shell(center, shell) {
                if !visited[cell] {
                    visited[cell] = true;
                    cells.push(cell);
                }
            }
        }

        return Ok(Box::new(CellBallIter {
            query: self,
            selection: selection,
            cells: cells.into_iter(),
            current: [].iter(),
        }));
    }

    fn query_nearest<'a>(&'a self, query_point: Vector3D, query_index: usize, args: &QueryArgs) -> Result<NeighborIter<'a>, Error> {
        check_query_point(query_point, query_index)?;
        if args.mode != QueryMode::Nearest {
            return Err(Error::InvalidParameter("expected nearest neighbors query arguments".into()));
        }

        let r_max = args.effective_r_max(self.simulation_box())?;
        let selection = Selection {
            query_point,
            query_index,
            exclude_ii: args.exclude_ii,
            r_min: args.r_min,
            r_max: r_max,
        };

        let center = self.cells.get_cell(query_point);
        let max_shell = self.cells.max_shell();
        let mut visited = vec![false; self.cells.num_cells()];
        let mut candidates = Vec::new();

        let mut radius = f64::min(args.r_guess.unwrap_or_else(|| self.cells.min_cell_width()), r_max);
        let mut next_shell = 0;
        loop {
            // all points closer than `radius` are in the candidates after
            // visiting these shells
            let needed = self.shells_for(radius);
            while next_shell <= needed {
                self.visit_shell(center, next_shell, &mut visited, &selection, &mut candidates);
                next_shell += 1;
            }

            if next_shell > max_shell || radius >= r_max {
                break;
            }

            let found = candidates.iter().filter(|c| c.distance < radius).count();
            if found >= args.num_neighbors {
                candidates.retain(|c| c.distance < radius);
                break;
            }

            radius = f64::min(radius * args.scale, r_max);
        }

        let nearest = select_nearest(candidates, args.num_neighbors);
        return Ok(Box::new(nearest.into_iter()));
    }
}
