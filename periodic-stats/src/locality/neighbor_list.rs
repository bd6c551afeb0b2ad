use ndarray::{Array2, ArrayView2};

use crate::Error;

/// A single bond in a [`NeighborList`], between the query point with index
/// `query_point` and the point with index `point`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    /// index of the query point
    pub query_point: usize,
    /// index of the neighboring point
    pub point: usize,
    /// distance between the query point and the point, using the minimum
    /// image convention
    pub distance: f64,
    /// weight of this bond, used by some statistics
    pub weight: f64,
}

impl Bond {
    /// Create a new bond with a weight of 1
    pub fn new(query_point: usize, point: usize, distance: f64) -> Bond {
        Bond { query_point, point, distance, weight: 1.0 }
    }
}

/// A `NeighborList` is a list of bonds between a set of `n_query_points`
/// query points and a set of `n_points` points.
///
/// The bonds are sorted by query point index, so all the bonds of a given
/// query point occupy a contiguous range, which can be found with
/// [`NeighborList::find_first_index`] or [`NeighborList::bonds_for`]. The
/// order of bonds inside this range is the order in which they were created.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborList {
    n_query_points: usize,
    n_points: usize,
    bonds: Vec<Bond>,
}

impl NeighborList {
    /// Create a new neighbor list containing the given `bonds`.
    ///
    /// The bonds are stably sorted by query point index, and all indexes
    /// must be in range (`ShapeMismatch` otherwise).
    pub fn new(n_query_points: usize, n_points: usize, mut bonds: Vec<Bond>) -> Result<NeighborList, Error> {
        if !bonds.windows(2).all(|w| w[0].query_point <= w[1].query_point) {
            bonds.sort_by_key(|bond| bond.query_point);
        }

        let list = NeighborList { n_query_points, n_points, bonds };
        list.validate(n_query_points, n_points)?;
        return Ok(list);
    }

    /// Create a neighbor list from already sorted and validated bonds
    pub(crate) fn from_sorted(n_query_points: usize, n_points: usize, bonds: Vec<Bond>) -> NeighborList {
        debug_assert!(bonds.windows(2).all(|w| w[0].query_point <= w[1].query_point));
        NeighborList { n_query_points, n_points, bonds }
    }

    /// Create an empty neighbor list
    pub fn empty(n_query_points: usize, n_points: usize) -> NeighborList {
        NeighborList::from_sorted(n_query_points, n_points, Vec::new())
    }

    /// Create a neighbor list from the bond table `bonds` with shape
    /// `(num_bonds, 2)`, containing `(query point, point)` pairs, and the
    /// optional `distances` and `weights` of each bond. Distances default to
    /// 0 and weights to 1.
    pub fn from_arrays(
        n_query_points: usize,
        n_points: usize,
        bonds: ArrayView2<usize>,
        distances: Option<&[f64]>,
        weights: Option<&[f64]>,
    ) -> Result<NeighborList, Error> {
        if bonds.ncols() != 2 {
            return Err(Error::ShapeMismatch(format!(
                "bonds array must have 2 columns, got {}", bonds.ncols()
            )));
        }

        let n_bonds = bonds.nrows();
        for (name, values) in [("distances", distances), ("weights", weights)] {
            if let Some(values) = values {
                if values.len() != n_bonds {
                    return Err(Error::ShapeMismatch(format!(
                        "expected {} {} for {} bonds, got {}", n_bonds, name, n_bonds, values.len()
                    )));
                }
            }
        }

        let bonds = bonds.outer_iter().enumerate().map(|(index, pair)| Bond {
            query_point: pair[0],
            point: pair[1],
            distance: distances.map_or(0.0, |d| d[index]),
            weight: weights.map_or(1.0, |w| w[index]),
        }).collect();

        return NeighborList::new(n_query_points, n_points, bonds);
    }

    /// Check that this neighbor list was built for `n_query_points` query
    /// points and `n_points` points, and that all the bonds refer to points
    /// in these ranges.
    pub fn validate(&self, n_query_points: usize, n_points: usize) -> Result<(), Error> {
        if self.n_query_points != n_query_points {
            return Err(Error::ShapeMismatch(format!(
                "neighbor list was built for {} query points, got {}",
                self.n_query_points, n_query_points
            )));
        }

        if self.n_points != n_points {
            return Err(Error::ShapeMismatch(format!(
                "neighbor list was built for {} points, got {}",
                self.n_points, n_points
            )));
        }

        for bond in &self.bonds {
            if bond.query_point >= n_query_points {
                return Err(Error::ShapeMismatch(format!(
                    "query point index {} is out of range for {} query points",
                    bond.query_point, n_query_points
                )));
            }

            if bond.point >= n_points {
                return Err(Error::ShapeMismatch(format!(
                    "point index {} is out of range for {} points",
                    bond.point, n_points
                )));
            }
        }

        Ok(())
    }

    /// Number of query points in this neighbor list
    pub fn n_query_points(&self) -> usize {
        self.n_query_points
    }

    /// Number of points in this neighbor list
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Get the number of bonds in this neighbor list
    pub fn num_bonds(&self) -> usize {
        self.bonds.len()
    }

    /// Is this neighbor list empty?
    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    /// Get all the bonds in this neighbor list
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Get the offset of the first bond with the given query point, or the
    /// offset where such a bond would be inserted if there are none.
    pub fn find_first_index(&self, query_point: usize) -> usize {
        self.bonds.partition_point(|bond| bond.query_point < query_point)
    }

    /// Get all the bonds for the given query point
    pub fn bonds_for(&self, query_point: usize) -> &[Bond] {
        let start = self.find_first_index(query_point);
        let length = self.bonds[start..].partition_point(|bond| bond.query_point == query_point);
        &self.bonds[start..start + length]
    }

    /// Get the offset of the first bond of every query point, in the same
    /// way as `find_first_index`
    pub fn segments(&self) -> Vec<usize> {
        (0..self.n_query_points).map(|i| self.find_first_index(i)).collect()
    }

    /// Get the number of bonds for every query point
    pub fn neighbor_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_query_points];
        for bond in &self.bonds {
            counts[bond.query_point] += 1;
        }
        return counts;
    }

    /// Get the `(num_bonds, 2)` table of `(query point, point)` indexes
    pub fn to_array(&self) -> Array2<usize> {
        let mut array = Array2::zeros((self.bonds.len(), 2));
        for (mut row, bond) in array.outer_iter_mut().zip(&self.bonds) {
            row[0] = bond.query_point;
            row[1] = bond.point;
        }
        return array;
    }

    /// Get the distance of all bonds
    pub fn distances(&self) -> Vec<f64> {
        self.bonds.iter().map(|bond| bond.distance).collect()
    }

    /// Get the weight of all bonds
    pub fn weights(&self) -> Vec<f64> {
        self.bonds.iter().map(|bond| bond.weight).collect()
    }

    /// Get a new neighbor list containing only the bonds for which
    /// `predicate` returns `true`, in the same order.
    pub fn filter<F>(&self, predicate: F) -> NeighborList where F: Fn(&Bond) -> bool {
        let bonds = self.bonds.iter().filter(|bond| predicate(*bond)).copied().collect();
        NeighborList::from_sorted(self.n_query_points, self.n_points, bonds)
    }

    /// Get a new neighbor list containing only the bonds with `r_min <=
    /// distance < r_max`
    pub fn filter_r(&self, r_max: f64, r_min: f64) -> NeighborList {
        self.filter(|bond| bond.distance >= r_min && bond.distance < r_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn test_list() -> NeighborList {
        let bonds = vec![
            Bond::new(3, 0, 1.5),
            Bond::new(0, 1, 1.0),
            Bond::new(0, 2, 0.5),
            Bond::new(1, 0, 1.0),
            Bond::new(3, 2, 2.5),
        ];
        NeighborList::new(5, 3, bonds).unwrap()
    }

    #[test]
    fn sorted_by_query_point() {
        let list = test_list();
        let query_points = list.bonds().iter().map(|b| b.query_point).collect::<Vec<_>>();
        assert_eq!(query_points, [0, 0, 1, 3, 3]);

        // stable sort keeps creation order inside each query point
        let points = list.bonds().iter().map(|b| b.point).collect::<Vec<_>>();
        assert_eq!(points, [1, 2, 0, 0, 2]);
    }

    #[test]
    fn find_first_index() {
        let list = test_list();
        assert_eq!(list.find_first_index(0), 0);
        assert_eq!(list.find_first_index(1), 2);
        // missing query points give the insertion point
        assert_eq!(list.find_first_index(2), 3);
        assert_eq!(list.find_first_index(3), 3);
        assert_eq!(list.find_first_index(4), 5);

        assert_eq!(list.segments(), [0, 2, 3, 3, 5]);
        assert_eq!(list.neighbor_counts(), [2, 1, 0, 2, 0]);
        assert_eq!(list.bonds_for(3).len(), 2);
        assert!(list.bonds_for(2).is_empty());
        assert!(list.bonds_for(4).is_empty());
    }

    #[test]
    fn validate() {
        let list = test_list();
        assert!(list.validate(5, 3).is_ok());
        assert!(matches!(list.validate(4, 3), Err(Error::ShapeMismatch(_))));
        assert!(matches!(list.validate(5, 4), Err(Error::ShapeMismatch(_))));

        let result = NeighborList::new(2, 3, vec![Bond::new(2, 0, 1.0)]);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));

        let result = NeighborList::new(2, 3, vec![Bond::new(0, 3, 1.0)]);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn arrays() {
        let bonds = array![[1, 0], [0, 1], [0, 2]];
        let list = NeighborList::from_arrays(2, 3, bonds.view(), Some(&[0.1, 0.2, 0.3]), None).unwrap();
        assert_eq!(list.to_array(), array![[0, 1], [0, 2], [1, 0]]);
        assert_eq!(list.distances(), [0.2, 0.3, 0.1]);
        assert_eq!(list.weights(), [1.0, 1.0, 1.0]);

        let list = NeighborList::from_arrays(2, 3, bonds.view(), None, Some(&[2.0, 3.0, 4.0])).unwrap();
        assert_eq!(list.distances(), [0.0, 0.0, 0.0]);
        assert_eq!(list.weights(), [3.0, 4.0, 2.0]);

        let result = NeighborList::from_arrays(2, 3, bonds.view(), Some(&[0.1]), None);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));

        let bonds = array![[1, 0, 0]];
        let result = NeighborList::from_arrays(2, 3, bonds.view(), None, None);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn filter() {
        let list = test_list();
        let filtered = list.filter_r(2.0, 0.8);
        assert_eq!(filtered.to_array(), array![[0, 1], [1, 0], [3, 0]]);
        assert_eq!(filtered.n_query_points(), 5);
        assert_eq!(filtered.n_points(), 3);

        let filtered = list.filter(|bond| bond.point == 0);
        assert_eq!(filtered.num_bonds(), 2);
        assert!(list.filter(|_| false).is_empty());
    }
}
