use std::f64::consts::PI;

use ndarray::{Array1, ArrayD};

use crate::{Error, Vector3D};
use crate::histogram::{BinAxis, Histogram, WorkerPool};
use crate::locality::{NeighborList, NeighborQuery};

/// Parameters for radial distribution function calculation
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RdfParameters {
    /// Number of bins between `r_min` and `r_max`
    pub bins: usize,
    /// Largest distance included in the histogram
    pub r_max: f64,
    /// Smallest distance included in the histogram
    #[serde(default)]
    pub r_min: f64,
}

impl RdfParameters {
    /// Read and validate parameters from a JSON string
    pub fn from_json(json: &str) -> Result<RdfParameters, Error> {
        let parameters: RdfParameters = serde_json::from_str(json)?;
        parameters.validate()?;
        return Ok(parameters);
    }

    /// Serialize these parameters to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.r_max > 0.0 && self.r_max.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "r_max must be positive and finite, got {}", self.r_max
            )));
        }

        if !(self.r_min >= 0.0 && self.r_min < self.r_max) {
            return Err(Error::InvalidParameter(format!(
                "r_min must be positive and smaller than r_max ({}), got {}", self.r_max, self.r_min
            )));
        }

        if self.bins == 0 {
            return Err(Error::InvalidParameter("the number of bins must be at least 1".into()));
        }

        Ok(())
    }

    fn axis(&self) -> Result<BinAxis, Error> {
        BinAxis::new(self.bins, self.r_min, self.r_max)
    }
}

/// Radial distribution function `g(r)`, averaged over frames.
///
/// `g(r)` is the number of points in a spherical shell (or a ring in 2D)
/// around the query points, divided by the number expected for an ideal gas
/// at the same density.
#[derive(Debug)]
pub struct Rdf {
    parameters: RdfParameters,
    axis: BinAxis,
    histogram: Histogram<usize>,
    /// dimensionality of the boxes used since the last reset
    is_2d: Option<bool>,
}

impl Rdf {
    pub fn new(parameters: RdfParameters, pool: WorkerPool) -> Result<Rdf, Error> {
        parameters.validate()?;
        let axis = parameters.axis()?;
        let histogram = Histogram::new(&[parameters.bins], pool)?;

        Ok(Rdf {
            parameters,
            axis,
            histogram,
            is_2d: None,
        })
    }

    pub fn parameters(&self) -> &RdfParameters {
        &self.parameters
    }

    /// Accumulate one frame in the histogram.
    ///
    /// Bonds are taken from `neighbors` if given, and computed with a ball
    /// query of radius `r_max` otherwise. If `query_points` is `None`, the
    /// points of `query` are used as query points. Previous frames are
    /// discarded if `reset` is `true`.
    #[time_graph::instrument(name = "Rdf::compute")]
    pub fn compute(
        &mut self,
        query: &dyn NeighborQuery,
        query_points: Option<&[Vector3D]>,
        neighbors: Option<&NeighborList>,
        reset: bool,
    ) -> Result<(), Error> {
        let simulation_box = *query.simulation_box();
        simulation_box.check_cutoff(self.parameters.r_max)?;

        if reset {
            self.reset();
        }

        if let Some(is_2d) = self.is_2d {
            if is_2d != simulation_box.is_2d() {
                return Err(Error::InvalidGeometry(
                    "can not mix 2D and 3D boxes in the same RDF, reset it first".into()
                ));
            }
        } else {
            self.histogram.set_jacobian(shell_jacobian(&self.axis, simulation_box.is_2d()))?;
            self.is_2d = Some(simulation_box.is_2d());
        }

        let n_points = query.points().len();
        let n_query_points = query_points.map_or(n_points, <[Vector3D]>::len);
        let neighbors = super::ball_neighbors(
            self.histogram.pool(),
            query,
            query_points,
            neighbors,
            self.parameters.r_max,
            self.parameters.r_min,
        )?;

        let axis = self.axis;
        self.histogram.accumulate(&simulation_box, n_query_points, &neighbors, n_points, |bins, bond| {
            if let Some(bin) = axis.bin(bond.distance) {
                bins.increment(&[bin]);
            }
        })
    }

    /// Discard all accumulated frames
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.is_2d = None;
    }

    /// Number of frames accumulated since the last reset
    pub fn n_frames(&self) -> usize {
        self.histogram.n_frames()
    }

    pub fn bin_edges(&self) -> Vec<f64> {
        self.axis.bin_edges()
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        self.axis.bin_centers()
    }

    /// Raw number of bonds in each bin, summed over frames
    pub fn bin_counts(&mut self) -> &ArrayD<usize> {
        self.histogram.bin_counts()
    }

    /// The radial distribution function `g(r)`
    pub fn rdf(&mut self) -> &ArrayD<f64> {
        self.histogram.normalized()
    }

    /// Average number of neighbors closer than the upper edge of each bin
    pub fn n_r(&mut self) -> Array1<f64> {
        let n_query_points = self.histogram.n_query_points();
        if n_query_points == 0 {
            return Array1::zeros(self.parameters.bins);
        }

        let mut total = 0;
        self.histogram.bin_counts().iter()
            .map(|&count| {
                total += count;
                total as f64 / n_query_points as f64
            })
            .collect()
    }
}

/// Inverse of the volume of the shell (or area of the ring in 2D) covered
/// by each bin.
fn shell_jacobian(axis: &BinAxis, is_2d: bool) -> ArrayD<f64> {
    let edges = axis.bin_edges();
    let jacobian = edges.windows(2)
        .map(|edges| {
            let (inner, outer) = (edges[0], edges[1]);
            let volume = if is_2d {
                PI * (outer * outer - inner * inner)
            } else {
                4.0 / 3.0 * PI * (outer.powi(3) - inner.powi(3))
            };
            1.0 / volume
        })
        .collect::<Array1<f64>>();

    return jacobian.into_dyn();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locality::{BruteForceQuery, PeriodicBox, Bond};
    use approx::assert_relative_eq;

    fn rdf(bins: usize, r_max: f64) -> Rdf {
        let parameters = RdfParameters { bins, r_max, r_min: 0.0 };
        Rdf::new(parameters, WorkerPool::new(2).unwrap()).unwrap()
    }

    #[test]
    fn parameters() {
        let parameters = RdfParameters::from_json(r#"{"bins": 10, "r_max": 3.0}"#).unwrap();
        assert_eq!(parameters, RdfParameters { bins: 10, r_max: 3.0, r_min: 0.0 });

        let json = parameters.to_json().unwrap();
        assert_eq!(RdfParameters::from_json(&json).unwrap(), parameters);

        assert!(RdfParameters::from_json(r#"{"bins": 0, "r_max": 3.0}"#).is_err());
        assert!(RdfParameters::from_json(r#"{"bins": 10, "r_max": 3.0, "r_min": 3.0}"#).is_err());
        assert!(RdfParameters::from_json(r#"{"bins": 10, "r_max": -3.0}"#).is_err());
        assert!(RdfParameters::from_json(r#"{"bins": 10, "r_max": 3.0, "cutoff": 3.0}"#).is_err());
    }

    #[test]
    fn pair() {
        let simulation_box = PeriodicBox::cube(10.0).unwrap();
        let points = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(1.2, 0.0, 0.0)];
        let query = BruteForceQuery::new(simulation_box, &points).unwrap();

        let mut rdf = rdf(5, 2.5);
        rdf.compute(&query, None, None, false).unwrap();
        assert_eq!(rdf.n_frames(), 1);
        assert_eq!(rdf.bin_counts().as_slice().unwrap(), [0, 0, 2, 0, 0]);

        let density = 2.0 / 1000.0;
        let shell = 4.0 / 3.0 * PI * (1.5f64.powi(3) - 1.0);
        assert_relative_eq!(rdf.rdf()[[2]], 2.0 / (2.0 * density * shell), max_relative = 1e-12);
        assert_eq!(rdf.rdf()[[0]], 0.0);

        assert_eq!(rdf.n_r().to_vec(), [0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_relative_eq!(rdf.bin_centers()[2], 1.25);

        // frames are averaged
        rdf.compute(&query, None, None, false).unwrap();
        assert_eq!(rdf.bin_counts().as_slice().unwrap(), [0, 0, 4, 0, 0]);
        assert_relative_eq!(rdf.rdf()[[2]], 2.0 / (2.0 * density * shell), max_relative = 1e-12);

        rdf.compute(&query, None, None, true).unwrap();
        assert_eq!(rdf.n_frames(), 1);
    }

    #[test]
    fn two_dimensional() {
        let simulation_box = PeriodicBox::square(10.0).unwrap();
        let points = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(0.0, 1.2, 0.0)];
        let query = BruteForceQuery::new(simulation_box, &points).unwrap();

        let mut rdf = rdf(5, 2.5);
        rdf.compute(&query, None, None, false).unwrap();

        let density = 2.0 / 100.0;
        let ring = PI * (1.5 * 1.5 - 1.0);
        assert_relative_eq!(rdf.rdf()[[2]], 2.0 / (2.0 * density * ring), max_relative = 1e-12);

        let cube = PeriodicBox::cube(10.0).unwrap();
        let query_3d = BruteForceQuery::new(cube, &points).unwrap();
        let result = rdf.compute(&query_3d, None, None, false);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));

        rdf.compute(&query_3d, None, None, true).unwrap();
    }

    #[test]
    fn explicit_neighbors() {
        let simulation_box = PeriodicBox::cube(10.0).unwrap();
        let points = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(1.2, 0.0, 0.0)];
        let query_points = [Vector3D::new(0.0, 0.0, 0.2)];
        let query = BruteForceQuery::new(simulation_box, &points).unwrap();

        let mut rdf = rdf(5, 2.5);
        rdf.compute(&query, Some(&query_points), None, false).unwrap();
        assert_eq!(rdf.bin_counts().as_slice().unwrap(), [1, 0, 1, 0, 0]);
        assert_eq!(rdf.n_r().to_vec(), [1.0, 1.0, 2.0, 2.0, 2.0]);

        // bonds outside of the histogram range are ignored
        let neighbors = NeighborList::new(1, 2, vec![Bond::new(0, 1, 0.7), Bond::new(0, 0, 7.0)]).unwrap();
        rdf.compute(&query, Some(&query_points), Some(&neighbors), true).unwrap();
        assert_eq!(rdf.bin_counts().as_slice().unwrap(), [0, 1, 0, 0, 0]);

        let result = rdf.compute(&query, None, Some(&neighbors), false);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn cutoff_too_large() {
        let simulation_box = PeriodicBox::cube(4.0).unwrap();
        let points = [Vector3D::zero()];
        let query = BruteForceQuery::new(simulation_box, &points).unwrap();

        let mut rdf = rdf(5, 2.5);
        let result = rdf.compute(&query, None, None, false);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
        assert_eq!(rdf.n_frames(), 0);
    }
}
