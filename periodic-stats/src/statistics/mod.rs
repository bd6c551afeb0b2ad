//! Binned statistics computed with [`Histogram`](crate::Histogram).
//!
//! Every statistic here follows the same pattern: find the bonds between
//! query points and points (or use a neighbor list given by the caller),
//! accumulate them in a histogram frame by frame, and normalize the reduced
//! histogram when a result is requested.

use std::borrow::Cow;

use crate::{Error, Vector3D};
use crate::histogram::WorkerPool;
use crate::locality::{NeighborList, NeighborQuery, QueryArgs};

mod rdf;
pub use self::rdf::{Rdf, RdfParameters};

mod pmft;
pub use self::pmft::{PmftXyt, PmftXytParameters};

/// Get the bonds to accumulate for a single frame: either the `neighbors`
/// given by the caller, or the result of a ball query on the worker `pool`.
///
/// When `query_points` is `None`, the points of `query` are used as query
/// points and bonds between a point and itself are excluded.
fn ball_neighbors<'a>(
    pool: &WorkerPool,
    query: &dyn NeighborQuery,
    query_points: Option<&[Vector3D]>,
    neighbors: Option<&'a NeighborList>,
    r_max: f64,
    r_min: f64,
) -> Result<Cow<'a, NeighborList>, Error> {
    if let Some(neighbors) = neighbors {
        return Ok(Cow::Borrowed(neighbors));
    }

    let args = QueryArgs {
        r_min: r_min,
        exclude_ii: query_points.is_none(),
        ..QueryArgs::ball(r_max)
    };
    let query_points = query_points.unwrap_or_else(|| query.points());
    let neighbors = pool.install(|| query.query(query_points, &args))?;

    return Ok(Cow::Owned(neighbors));
}
