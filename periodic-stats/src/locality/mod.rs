//! Geometry and neighbor search in periodic boxes.
//!
//! A [`NeighborQuery`] wraps a set of points inside a [`PeriodicBox`], and
//! produces [`NeighborList`]s containing all the bonds between query points
//! and these points. The [`filter`] module can then refine a neighbor list.

mod periodic_box;
pub use self::periodic_box::{PeriodicBox, BoxParameters};

mod cell_list;
pub use self::cell_list::CellList;

mod neighbor_list;
pub use self::neighbor_list::{Bond, NeighborList};

mod query;
pub use self::query::{QueryMode, QueryArgs, NeighborPoint, NeighborIter};
pub use self::query::{NeighborQuery, CellListQuery, BruteForceQuery};

pub mod filter;
pub use self::filter::{Filter, SannFilter, SannParameters, FilterOutput};

/// Distance below which two points are considered to be at the same position
pub(crate) const COINCIDENT_DISTANCE: f64 = 1e-6;
