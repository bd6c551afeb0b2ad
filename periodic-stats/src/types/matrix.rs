use std::ops::{Mul, Index};

use super::Vector3D;

/// A 3x3 square matrix type, stored in row-major order.
///
/// `Matrix3 * Vector3D` is the usual matrix-vector product, treating the
/// vector as a column vector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Matrix3([[f64; 3]; 3]);

impl Matrix3 {
    /// Create a new `Matrix3` from the given rows
    pub const fn new(data: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3(data)
    }

    /// Get the column `i` of this matrix as a vector
    pub fn column(&self, i: usize) -> Vector3D {
        Vector3D::new(self[0][i], self[1][i], self[2][i])
    }
}

impl Index<usize> for Matrix3 {
    type Output = [f64; 3];
    #[inline]
    fn index(&self, index: usize) -> &[f64; 3] {
        &self.0[index]
    }
}

impl_arithmetic!(
    Matrix3, Vector3D, Mul, mul, Vector3D, self, vector,
    Vector3D::new(
        self[0][0] * vector[0] + self[0][1] * vector[1] + self[0][2] * vector[2],
        self[1][0] * vector[0] + self[1][1] * vector[1] + self[1][2] * vector[2],
        self[2][0] * vector[0] + self[2][1] * vector[1] + self[2][2] * vector[2],
    )
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_vector() {
        let matrix = Matrix3::new([
            [1.0, 2.0, 3.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 2.0],
        ]);
        let vector = Vector3D::new(1.0, 1.0, 1.0);
        assert_eq!(matrix * vector, Vector3D::new(6.0, 1.0, 2.0));
        assert_eq!(&matrix * &vector, Vector3D::new(6.0, 1.0, 2.0));
        assert_eq!(matrix.column(2), Vector3D::new(3.0, 0.0, 2.0));
        assert_eq!(matrix.column(0), Vector3D::new(1.0, 0.0, 0.0));
    }
}
