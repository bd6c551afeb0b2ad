use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use ndarray::ArrayD;

use crate::{Error, Vector3D};
use crate::histogram::{BinAxis, Histogram, WorkerPool};
use crate::locality::{NeighborList, NeighborQuery};

/// Pairs with a squared separation below this have no defined direction
const MIN_SQUARED_SEPARATION: f64 = 1e-6;

/// Parameters for the potential of mean force and torque in (x, y, θ)
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PmftXytParameters {
    /// The x axis of the histogram covers `[-max_x, max_x)`
    pub max_x: f64,
    /// The y axis of the histogram covers `[-max_y, max_y)`
    pub max_y: f64,
    /// Number of bins along x
    pub n_x: usize,
    /// Number of bins along y
    pub n_y: usize,
    /// Number of bins for the relative orientation, covering `[0, 2π)`
    pub n_t: usize,
}

impl PmftXytParameters {
    /// Read and validate parameters from a JSON string
    pub fn from_json(json: &str) -> Result<PmftXytParameters, Error> {
        let parameters: PmftXytParameters = serde_json::from_str(json)?;
        parameters.validate()?;
        return Ok(parameters);
    }

    /// Serialize these parameters to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [("max_x", self.max_x), ("max_y", self.max_y)] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::InvalidParameter(format!(
                    "{} must be positive and finite, got {}", name, value
                )));
            }
        }

        for (name, value) in [("n_x", self.n_x), ("n_y", self.n_y), ("n_t", self.n_t)] {
            if value == 0 {
                return Err(Error::InvalidParameter(format!("{} must be at least 1", name)));
            }
        }

        Ok(())
    }

    /// Largest distance between two points contributing to the histogram
    pub fn r_max(&self) -> f64 {
        f64::hypot(self.max_x, self.max_y)
    }
}

/// Potential of mean force and torque of 2D anisotropic particles, binned
/// in the frame of the query particle.
///
/// For each bond from a query point `i` with orientation `θ_i` to a point
/// `j` with orientation `θ_j`, the pair vector is rotated by `-θ_i` to get
/// `(x, y)`, and the relative orientation `T` is the angle between the
/// directions each particle sees the other under, in their own frames. The
/// three are binned in a histogram of shape `(n_x, n_y, n_t)`.
#[derive(Debug)]
pub struct PmftXyt {
    parameters: PmftXytParameters,
    x_axis: BinAxis,
    y_axis: BinAxis,
    t_axis: BinAxis,
    histogram: Histogram<usize>,
    skipped: usize,
}

impl PmftXyt {
    pub fn new(parameters: PmftXytParameters, pool: WorkerPool) -> Result<PmftXyt, Error> {
        parameters.validate()?;

        let x_axis = BinAxis::new(parameters.n_x, -parameters.max_x, parameters.max_x)?;
        let y_axis = BinAxis::new(parameters.n_y, -parameters.max_y, parameters.max_y)?;
        let t_axis = BinAxis::new(parameters.n_t, 0.0, 2.0 * PI)?;

        let shape = [parameters.n_x, parameters.n_y, parameters.n_t];
        let mut histogram = Histogram::new(&shape, pool)?;

        // ideal gas pairs are uniformly distributed in (x, y), and in T
        // over a full turn
        let bin_volume = x_axis.bin_width() * y_axis.bin_width() * t_axis.bin_width() / (2.0 * PI);
        histogram.set_jacobian(ArrayD::from_elem(shape.as_slice(), 1.0 / bin_volume))?;

        Ok(PmftXyt {
            parameters,
            x_axis,
            y_axis,
            t_axis,
            histogram,
            skipped: 0,
        })
    }

    pub fn parameters(&self) -> &PmftXytParameters {
        &self.parameters
    }

    /// Accumulate one frame in the histogram.
    ///
    /// `orientations` are the angles (in radians) of the points in `query`.
    /// If `query_points` is `None`, the points of `query` are also used as
    /// query points, and `query_orientations` must be `None` as well.
    /// Bonds are taken from `neighbors` if given, and computed with a ball
    /// query of radius `sqrt(max_x² + max_y²)` otherwise.
    ///
    /// Pairs of points at the same position have no defined direction: they
    /// are skipped, and a warning is emitted.
    #[time_graph::instrument(name = "PmftXyt::compute")]
    pub fn compute(
        &mut self,
        query: &dyn NeighborQuery,
        orientations: &[f64],
        query_points: Option<&[Vector3D]>,
        query_orientations: Option<&[f64]>,
        neighbors: Option<&NeighborList>,
        reset: bool,
    ) -> Result<(), Error> {
        let simulation_box = *query.simulation_box();
        if !simulation_box.is_2d() {
            return Err(Error::InvalidGeometry("PMFT in (x, y, θ) requires a 2D box".into()));
        }
        simulation_box.check_cutoff(self.parameters.r_max())?;

        let points = query.points();
        if orientations.len() != points.len() {
            return Err(Error::ShapeMismatch(format!(
                "expected {} orientations, got {}", points.len(), orientations.len()
            )));
        }

        let same_points = query_points.is_none();
        let (query_positions, query_orientations) = match (query_points, query_orientations) {
            (Some(positions), Some(angles)) => {
                if positions.len() != angles.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "expected {} query orientations, got {}", positions.len(), angles.len()
                    )));
                }
                (positions, angles)
            }
            (None, None) => (points, orientations),
            (Some(_), None) => {
                return Err(Error::InvalidParameter(
                    "query_orientations are required when using query_points".into()
                ));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidParameter(
                    "query_orientations can only be given together with query_points".into()
                ));
            }
        };

        if reset {
            self.reset();
        }

        let neighbors = super::ball_neighbors(
            self.histogram.pool(),
            query,
            query_points,
            neighbors,
            self.parameters.r_max(),
            0.0,
        )?;

        let skipped = AtomicUsize::new(0);
        let (x_axis, y_axis, t_axis) = (self.x_axis, self.y_axis, self.t_axis);
        self.histogram.accumulate(&simulation_box, query_positions.len(), &neighbors, points.len(), |bins, bond| {
            let i = bond.query_point;
            let j = bond.point;
            let delta = simulation_box.wrap(points[j] - query_positions[i]);
            if delta.norm2() < MIN_SQUARED_SEPARATION {
                if !(same_points && i == j) {
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                return;
            }

            let theta_i = query_orientations[i];
            let (sin, cos) = theta_i.sin_cos();
            let x = cos * delta[0] + sin * delta[1];
            let y = -sin * delta[0] + cos * delta[1];

            let t_i = f64::atan2(delta[1], delta[0]) - theta_i;
            let t_j = f64::atan2(-delta[1], -delta[0]) - orientations[j];
            let t = (t_i - t_j).rem_euclid(2.0 * PI);

            if let (Some(bin_x), Some(bin_y), Some(bin_t)) = (x_axis.bin(x), y_axis.bin(y), t_axis.bin(t)) {
                bins.increment(&[bin_x, bin_y, bin_t]);
            }
        })?;

        let skipped = skipped.into_inner();
        if skipped > 0 {
            warn!(
                "skipped {} pair(s) of points at the same position in PMFT, \
                the direction between them is undefined", skipped
            );
            self.skipped += skipped;
        }

        Ok(())
    }

    /// Discard all accumulated frames
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.skipped = 0;
    }

    /// Number of frames accumulated since the last reset
    pub fn n_frames(&self) -> usize {
        self.histogram.n_frames()
    }

    /// Number of pairs of coincident points skipped since the last reset
    pub fn skipped_pairs(&self) -> usize {
        self.skipped
    }

    pub fn x_centers(&self) -> Vec<f64> {
        self.x_axis.bin_centers()
    }

    pub fn y_centers(&self) -> Vec<f64> {
        self.y_axis.bin_centers()
    }

    pub fn t_centers(&self) -> Vec<f64> {
        self.t_axis.bin_centers()
    }

    /// Raw histogram, with shape `(n_x, n_y, n_t)`
    pub fn bin_counts(&mut self) -> &ArrayD<usize> {
        self.histogram.bin_counts()
    }

    /// Pair correlation function, equal to 1 everywhere for uncorrelated
    /// points
    pub fn pcf(&mut self) -> &ArrayD<f64> {
        self.histogram.normalized()
    }

    /// Potential of mean force and torque `-ln(pcf)`, in units of `kT`. Empty
    /// bins have an infinite potential.
    pub fn pmft(&mut self) -> ArrayD<f64> {
        self.histogram.normalized().mapv(|pcf| -f64::ln(pcf))
    }
}
