//! The `PeriodicBox` type represents the simulation box enclosing a set of
//! points, with periodic boundary conditions along some or all of its axes.
use crate::{Error, Matrix3, Vector3D};

/// Serialized representation of a [`PeriodicBox`], validated when converting
/// back to a box.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BoxParameters {
    /// Length of the box along x
    pub lx: f64,
    /// Length of the box along y
    pub ly: f64,
    /// Length of the box along z, ignored for 2D boxes
    #[serde(default)]
    pub lz: f64,
    /// Tilt factor of the second lattice vector along x
    #[serde(default)]
    pub xy: f64,
    /// Tilt factor of the third lattice vector along x
    #[serde(default)]
    pub xz: f64,
    /// Tilt factor of the third lattice vector along y
    #[serde(default)]
    pub yz: f64,
    /// Is this a two-dimensional box?
    #[serde(default)]
    pub is_2d: bool,
    /// Periodic boundary conditions along each lattice vector
    #[serde(default = "all_periodic")]
    pub periodic: [bool; 3],
}

fn all_periodic() -> [bool; 3] {
    [true, true, true]
}

/// A `PeriodicBox` defines the simulation domain, as a (possibly triclinic)
/// parallelepiped centered on the origin.
///
/// The lattice vectors are `a1 = (lx, 0, 0)`, `a2 = (xy * ly, ly, 0)` and
/// `a3 = (xz * lz, yz * lz, lz)`; a point is inside the box when its
/// fractional coordinates are all in `[0, 1)`. Two-dimensional boxes have
/// `lz = 0` and no z tilt, and only the x and y axes are considered.
///
/// The box is immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "BoxParameters", into = "BoxParameters")]
pub struct PeriodicBox {
    lengths: [f64; 3],
    xy: f64,
    xz: f64,
    yz: f64,
    is_2d: bool,
    periodic: [bool; 3],
}

impl PeriodicBox {
    /// Create a new box with lengths `lx, ly, lz` and tilt factors `xy, xz,
    /// yz`, periodic in all directions.
    pub fn new(lx: f64, ly: f64, lz: f64, xy: f64, xz: f64, yz: f64, is_2d: bool) -> Result<PeriodicBox, Error> {
        let check_length = |name: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidGeometry(format!(
                    "box length {} must be positive and finite, got {}", name, value
                )))
            }
        };

        check_length("lx", lx)?;
        check_length("ly", ly)?;
        if !is_2d {
            check_length("lz", lz)?;
        }

        for (name, tilt) in [("xy", xy), ("xz", xz), ("yz", yz)] {
            if !tilt.is_finite() {
                return Err(Error::InvalidGeometry(format!(
                    "tilt factor {} must be finite, got {}", name, tilt
                )));
            }
        }

        if is_2d && (xz != 0.0 || yz != 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "2D boxes can not have xz or yz tilt factors, got xz={} and yz={}", xz, yz
            )));
        }

        let lz = if is_2d { 0.0 } else { lz };
        return Ok(PeriodicBox {
            lengths: [lx, ly, lz],
            xy: xy,
            xz: xz,
            yz: yz,
            is_2d: is_2d,
            periodic: [true, true, !is_2d],
        });
    }

    /// Create a cubic 3D box with side `length`
    pub fn cube(length: f64) -> Result<PeriodicBox, Error> {
        PeriodicBox::new(length, length, length, 0.0, 0.0, 0.0, false)
    }

    /// Create a square 2D box with side `length`
    pub fn square(length: f64) -> Result<PeriodicBox, Error> {
        PeriodicBox::new(length, length, 0.0, 0.0, 0.0, 0.0, true)
    }

    /// Create a box from a matrix containing the three lattice vectors as
    /// columns. The lattice vectors can have any orientation, the box will
    /// be rotated to the standard upper-triangular form.
    pub fn from_matrix(matrix: Matrix3, is_2d: bool) -> Result<PeriodicBox, Error> {
        let v0 = matrix.column(0);
        let v1 = matrix.column(1);
        let v2 = matrix.column(2);

        let lx = v0.norm();
        let a2x = v0 * v1 / lx;
        let ly = f64::sqrt(v1 * v1 - a2x * a2x);
        let xy = a2x / ly;

        if is_2d {
            return PeriodicBox::new(lx, ly, 0.0, xy, 0.0, 0.0, true);
        }

        let v0_x_v1 = v0 ^ v1;
        let lz = v2 * v0_x_v1 / v0_x_v1.norm();
        let a3x = v0 * v2 / lx;
        let xz = a3x / lz;
        let yz = (v1 * v2 - a2x * a3x) / (ly * lz);

        return PeriodicBox::new(lx, ly, lz, xy, xz, yz, false);
    }

    /// Get a copy of this box with the given periodic boundary conditions.
    /// The third value is ignored for 2D boxes.
    pub fn with_periodic(mut self, periodic: [bool; 3]) -> PeriodicBox {
        self.periodic = periodic;
        if self.is_2d {
            self.periodic[2] = false;
        }
        self
    }

    /// Get the lengths `[lx, ly, lz]` of this box
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    /// Get the tilt factors `[xy, xz, yz]` of this box
    pub fn tilts(&self) -> [f64; 3] {
        [self.xy, self.xz, self.yz]
    }

    /// Get the periodic boundary conditions along each lattice vector
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Is this a two-dimensional box?
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    /// Number of dimensions (2 or 3) of this box
    pub fn dimensions(&self) -> usize {
        if self.is_2d { 2 } else { 3 }
    }

    /// Get the volume of the box, or the area for 2D boxes
    pub fn volume(&self) -> f64 {
        if self.is_2d {
            self.lengths[0] * self.lengths[1]
        } else {
            self.lengths[0] * self.lengths[1] * self.lengths[2]
        }
    }

    /// Get the lattice vector `i` of this box
    ///
    /// # Panics
    ///
    /// If `i` is larger than 2.
    pub fn lattice_vector(&self, i: usize) -> Vector3D {
        let [lx, ly, lz] = self.lengths;
        match i {
            0 => Vector3D::new(lx, 0.0, 0.0),
            1 => Vector3D::new(self.xy * ly, ly, 0.0),
            2 => Vector3D::new(self.xz * lz, self.yz * lz, lz),
            _ => panic!("lattice vector index must be 0, 1 or 2, got {}", i),
        }
    }

    /// Get the matrix containing the lattice vectors as columns
    pub fn matrix(&self) -> Matrix3 {
        let [lx, ly, lz] = self.lengths;
        Matrix3::new([
            [lx, self.xy * ly, self.xz * lz],
            [0.0, ly, self.yz * lz],
            [0.0, 0.0, lz],
        ])
    }

    /// Get the distances between opposite faces of the box. For 2D boxes,
    /// the third value is infinite.
    pub fn nearest_plane_distance(&self) -> [f64; 3] {
        let [lx, ly, lz] = self.lengths;
        let (xy, xz, yz) = (self.xy, self.xz, self.yz);
        if self.is_2d {
            return [
                lx / f64::sqrt(1.0 + xy * xy),
                ly,
                f64::INFINITY,
            ];
        }

        let xy_yz_xz = xy * yz - xz;
        return [
            lx / f64::sqrt(1.0 + xy * xy + xy_yz_xz * xy_yz_xz),
            ly / f64::sqrt(1.0 + yz * yz),
            lz,
        ];
    }

    /// Get the smallest distance between faces along periodic axes, or
    /// `None` if the box is not periodic at all.
    pub fn min_periodic_width(&self) -> Option<f64> {
        let widths = self.nearest_plane_distance();
        let mut min = None;
        for axis in 0..self.dimensions() {
            if self.periodic[axis] {
                min = Some(f64::min(min.unwrap_or(f64::INFINITY), widths[axis]));
            }
        }
        return min;
    }

    /// Check that `cutoff` can be used for minimum image searches in this
    /// box: it must be positive and at most half of the smallest periodic
    /// width.
    pub fn check_cutoff(&self, cutoff: f64) -> Result<(), Error> {
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "cutoff must be positive and finite, got {}", cutoff
            )));
        }

        if let Some(width) = self.min_periodic_width() {
            if cutoff > 0.5 * width {
                return Err(Error::InvalidGeometry(format!(
                    "cutoff ({}) must be smaller than half of the smallest \
                    periodic box width ({})", cutoff, width
                )));
            }
        }

        Ok(())
    }
}

/// Geometric operations using periodic boundary conditions
impl PeriodicBox {
    /// Get the fractional coordinates of `position` in this box. Points
    /// inside the box have all fractional coordinates in `[0, 1)`. The
    /// third fractional coordinate is always 0 for 2D boxes.
    pub fn fractional(&self, position: Vector3D) -> Vector3D {
        let [lx, ly, lz] = self.lengths;

        let z = if self.is_2d { 0.0 } else { position[2] / lz };
        let y = (position[1] - self.yz * lz * z) / ly;
        let x = (position[0] - self.xy * ly * y - self.xz * lz * z) / lx;

        if self.is_2d {
            Vector3D::new(x + 0.5, y + 0.5, 0.0)
        } else {
            Vector3D::new(x + 0.5, y + 0.5, z + 0.5)
        }
    }

    /// Get the Cartesian position corresponding to the `fractional`
    /// coordinates in this box
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        let z = if self.is_2d { 0.0 } else { fractional[2] - 0.5 };
        let centered = Vector3D::new(fractional[0] - 0.5, fractional[1] - 0.5, z);
        return self.matrix() * centered;
    }

    /// Get the periodic image of `vector` inside the box, together with the
    /// number of lattice vectors that were removed along each axis.
    fn image_and_wrap(&self, mut vector: Vector3D) -> ([i32; 3], Vector3D) {
        let fractional = self.fractional(vector);
        let mut image = [0; 3];

        for axis in 0..self.dimensions() {
            if !self.periodic[axis] {
                continue;
            }

            // fractional coordinates are shifted by 0.5, so this rounds the
            // centered coordinate to the nearest integer
            let shift = f64::floor(fractional[axis]);
            if shift != 0.0 {
                vector -= shift * self.lattice_vector(axis);
            }
            image[axis] = shift as i32;
        }

        return (image, vector);
    }

    /// Wrap a displacement vector using the minimum image convention, or a
    /// position back inside the box.
    ///
    /// Along each periodic axis, the fractional component of the result is
    /// in `[-0.5, 0.5)`. The result is the true minimum image whenever the
    /// minimum image is shorter than half of the smallest periodic width
    /// (see [`PeriodicBox::min_periodic_width`]), which covers all the
    /// distances allowed by [`PeriodicBox::check_cutoff`]. Longer
    /// displacements in triclinic boxes can have a shorter image.
    pub fn wrap(&self, vector: Vector3D) -> Vector3D {
        self.image_and_wrap(vector).1
    }

    /// Get the number of box lattice vectors separating `position` from its
    /// image inside the box, such that `position = wrap(position) + image[0]
    /// * a1 + image[1] * a2 + image[2] * a3`.
    pub fn image(&self, position: Vector3D) -> [i32; 3] {
        self.image_and_wrap(position).0
    }

    /// Get all the periodic copies of `position` shifted by at most one
    /// lattice vector along each periodic axis, including `position` itself
    /// (first in the list).
    pub fn images(&self, position: Vector3D) -> Vec<Vector3D> {
        let range = |axis: usize| {
            if axis < self.dimensions() && self.periodic[axis] { -1..=1 } else { 0..=0 }
        };

        let mut images = vec![position];
        for i in range(0) {
            for j in range(1) {
                for k in range(2) {
                    if i == 0 && j == 0 && k == 0 {
                        continue;
                    }

                    let shift = i as f64 * self.lattice_vector(0)
                              + j as f64 * self.lattice_vector(1)
                              + k as f64 * self.lattice_vector(2);
                    images.push(position + shift);
                }
            }
        }

        return images;
    }

    /// Minimum image distance between the points `u` and `v`
    pub fn distance(&self, u: Vector3D, v: Vector3D) -> f64 {
        self.wrap(v - u).norm()
    }

    /// Get the serializable representation of this box
    pub fn to_parameters(&self) -> BoxParameters {
        BoxParameters::from(*self)
    }
}

impl From<PeriodicBox> for BoxParameters {
    fn from(simulation_box: PeriodicBox) -> BoxParameters {
        BoxParameters {
            lx: simulation_box.lengths[0],
            ly: simulation_box.lengths[1],
            lz: simulation_box.lengths[2],
            xy: simulation_box.xy,
            xz: simulation_box.xz,
            yz: simulation_box.yz,
            is_2d: simulation_box.is_2d,
            periodic: simulation_box.periodic,
        }
    }
}

impl TryFrom<BoxParameters> for PeriodicBox {
    type Error = Error;

    fn try_from(parameters: BoxParameters) -> Result<PeriodicBox, Error> {
        let simulation_box = PeriodicBox::new(
            parameters.lx, parameters.ly, parameters.lz,
            parameters.xy, parameters.xz, parameters.yz,
            parameters.is_2d,
        )?;
        Ok(simulation_box.with_periodic(parameters.periodic))
    }
}
