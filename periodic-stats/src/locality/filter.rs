//! Filters refine a raw [`NeighborList`], keeping only the bonds satisfying
//! some geometric criterion. Filters never create new bonds: their output is
//! always a subsequence of their input.
use log::warn;
use rayon::prelude::*;

use crate::{Error, Vector3D, WorkerPool};
use super::{Bond, NeighborList, NeighborQuery, QueryArgs};

/// Result of a [`Filter`] computation
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// The neighbor list after filtering
    pub filtered: NeighborList,
    /// The neighbor list before filtering, either given by the user or
    /// computed by the filter
    pub unfiltered: NeighborList,
    /// Indexes of the query points for which the filter could not find a
    /// complete neighbor shell
    pub incomplete_shells: Vec<usize>,
}

/// A `Filter` post-processes a neighbor list to keep only the "true"
/// neighbors of each query point.
pub trait Filter {
    /// Filter the bonds between `query_points` and the points in `query`.
    ///
    /// If `query_points` is `None`, the points of `query` are used as query
    /// points, excluding bonds between a point and itself. If `neighbors` is
    /// `None`, all points are candidate neighbors, sorted by distance.
    fn compute(
        &self,
        query: &dyn NeighborQuery,
        query_points: Option<&[Vector3D]>,
        neighbors: Option<&NeighborList>,
    ) -> Result<FilterOutput, Error>;
}

fn default_shell_offset() -> f64 {
    2.0
}

/// Parameters for the solid angle based nearest neighbors filter
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SannParameters {
    /// Should query points with an incomplete neighbor shell emit a warning
    /// (`true`), or an error (`false`)?
    #[serde(default)]
    pub allow_incomplete_shell: bool,
    /// Offset in the shell radius estimate `R(m) = sum(d_1..d_m) / (m -
    /// shell_offset)`. The value of 2 corresponds to neighbors covering a
    /// total solid angle of 4π.
    #[serde(default = "default_shell_offset")]
    pub shell_offset: f64,
}

impl Default for SannParameters {
    fn default() -> SannParameters {
        SannParameters {
            allow_incomplete_shell: false,
            shell_offset: default_shell_offset(),
        }
    }
}

impl SannParameters {
    /// Read and validate parameters from a JSON string
    pub fn from_json(json: &str) -> Result<SannParameters, Error> {
        let parameters: SannParameters = serde_json::from_str(json)?;
        parameters.validate()?;
        return Ok(parameters);
    }

    /// Serialize these parameters to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// The shell is seeded with 3 neighbors, so `shell_offset` must be
    /// smaller than 3 for the shell radius to be positive.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.shell_offset >= 0.0 && self.shell_offset < 3.0) {
            return Err(Error::InvalidParameter(format!(
                "shell_offset must be between 0 and 3, got {}", self.shell_offset
            )));
        }
        Ok(())
    }
}

/// Final state of the shell search for a single query point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellState {
    /// A candidate was rejected, the shell is complete
    Converged,
    /// We ran out of candidates before the shell was complete
    IncompleteShell,
}

/// Solid angle nearest neighbors (SANN) filter.
///
/// For each query point, candidates are sorted by distance and the shell is
/// seeded with the three closest ones. The next candidate at distance
/// `d_{m+1}` is then accepted as long as it is closer than the shell radius
/// estimate `R(m) = sum(d_1..d_m) / (m - shell_offset)`. The shell is
/// complete when a candidate is rejected; if all candidates are accepted
/// the shell is incomplete, and the raw neighbor list should be computed
/// with a larger cutoff.
///
/// The shell searches run in parallel, on the pool given to
/// [`SannFilter::with_pool`] or on the current rayon thread pool if there is
/// none.
///
/// See van Meel et al., J. Chem. Phys. 136, 234107 (2012).
#[derive(Debug, Clone)]
pub struct SannFilter {
    parameters: SannParameters,
    pool: Option<WorkerPool>,
}

impl SannFilter {
    /// Create a new SANN filter with the given parameters
    pub fn new(parameters: SannParameters) -> Result<SannFilter, Error> {
        parameters.validate()?;
        Ok(SannFilter { parameters, pool: None })
    }

    /// Run this filter (and the neighbor queries it needs) on the threads of
    /// `pool`
    pub fn with_pool(mut self, pool: WorkerPool) -> SannFilter {
        self.pool = Some(pool);
        self
    }

    /// Get the parameters of this filter
    pub fn parameters(&self) -> &SannParameters {
        &self.parameters
    }

    /// Get the worker pool used by this filter, if any
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Run the shell search over the `bonds` of a single query point,
    /// returning the offsets (in `bonds`) of the accepted neighbors.
    fn solid_angle_shell(&self, bonds: &[Bond]) -> (Vec<usize>, ShellState) {
        let mut candidates = (0..bonds.len()).collect::<Vec<_>>();
        candidates.sort_by(|&a, &b| {
            bonds[a].distance.total_cmp(&bonds[b].distance)
                .then(bonds[a].point.cmp(&bonds[b].point))
        });

        if candidates.len() < 3 {
            return (candidates, ShellState::IncompleteShell);
        }

        let mut sum = candidates[..3].iter().map(|&c| bonds[c].distance).sum::<f64>();
        let mut accepted = 3;
        let state = loop {
            if accepted == candidates.len() {
                break ShellState::IncompleteShell;
            }

            let radius = sum / (accepted as f64 - self.parameters.shell_offset);
            let distance = bonds[candidates[accepted]].distance;
            if distance < radius {
                sum += distance;
                accepted += 1;
            } else {
                break ShellState::Converged;
            }
        };

        candidates.truncate(accepted);
        return (candidates, state);
    }
}

impl Filter for SannFilter {
    #[time_graph::instrument(name = "SannFilter::compute")]
    fn compute(
        &self,
        query: &dyn NeighborQuery,
        query_points: Option<&[Vector3D]>,
        neighbors: Option<&NeighborList>,
    ) -> Result<FilterOutput, Error> {
        match &self.pool {
            Some(pool) => pool.install(|| self.filter_bonds(query, query_points, neighbors)),
            None => self.filter_bonds(query, query_points, neighbors),
        }
    }
}

impl SannFilter {
    fn filter_bonds(
        &self,
        query: &dyn NeighborQuery,
        query_points: Option<&[Vector3D]>,
        neighbors: Option<&NeighborList>,
    ) -> Result<FilterOutput, Error> {
        let n_points = query.points().len();
        let exclude_ii = query_points.is_none();
        let query_points = query_points.unwrap_or_else(|| query.points());
        let n_query_points = query_points.len();

        let unfiltered = match neighbors {
            Some(neighbors) => {
                neighbors.validate(n_query_points, n_points)?;
                neighbors.clone()
            }
            None if n_points == 0 => NeighborList::empty(n_query_points, n_points),
            None => {
                let args = QueryArgs { exclude_ii, ..QueryArgs::nearest(n_points) };
                query.query(query_points, &args)?
            }
        };

        let shells = (0..n_query_points).into_par_iter()
            .map(|query_point| {
                let start = unfiltered.find_first_index(query_point);
                let (accepted, state) = self.solid_angle_shell(unfiltered.bonds_for(query_point));
                (start, accepted, state)
            })
            .collect::<Vec<_>>();

        let mut mask = vec![false; unfiltered.num_bonds()];
        let mut incomplete_shells = Vec::new();
        for (query_point, (start, accepted, state)) in shells.into_iter().enumerate() {
            for offset in accepted {
                mask[start + offset] = true;
            }

            if state == ShellState::IncompleteShell {
                incomplete_shells.push(query_point);
            }
        }

        if !incomplete_shells.is_empty() {
            let mut message = format!(
                "{} query point(s) do not have a full neighbor shell, try increasing \
                the number of candidate neighbors. Query points: ",
                incomplete_shells.len()
            );
            let shown = incomplete_shells.iter().take(10).map(|i| i.to_string()).collect::<Vec<_>>();
            message += &shown.join(", ");
            if incomplete_shells.len() > 10 {
                message += ", ...";
            }

            if self.parameters.allow_incomplete_shell {
                warn!("{}", message);
            } else {
                return Err(Error::IncompleteNeighborShell(message));
            }
        }

        let bonds = unfiltered.bonds().iter()
            .zip(&mask)
            .filter(|&(_, &keep)| keep)
            .map(|(&bond, _)| bond)
            .collect();
        let filtered = NeighborList::from_sorted(n_query_points, n_points, bonds);

        return Ok(FilterOutput {
            filtered,
            unfiltered,
            incomplete_shells,
        });
    }
}
