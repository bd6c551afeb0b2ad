#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use periodic_stats::{PeriodicBox, Vector3D};

/// Get `count` points uniformly distributed inside `simulation_box`
pub fn random_points(simulation_box: &PeriodicBox, count: usize, seed: u64) -> Vec<Vector3D> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count).map(|_| {
        let fractional = Vector3D::new(rng.random(), rng.random(), rng.random());
        simulation_box.cartesian(fractional)
    }).collect()
}

/// Get `count` angles uniformly distributed in `[0, 2π)`
pub fn random_angles(count: usize, seed: u64) -> Vec<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(0.0..std::f64::consts::TAU)).collect()
}

/// Build a cubic crystal with `n_cells` conventional cells of size
/// `lattice` along each axis, and the given `basis` in fractional
/// coordinates of the conventional cell.
pub fn crystal(basis: &[[f64; 3]], lattice: f64, n_cells: usize) -> (PeriodicBox, Vec<Vector3D>) {
    let length = lattice * n_cells as f64;
    let simulation_box = PeriodicBox::cube(length).expect("invalid box");

    let mut points = Vec::new();
    for i in 0..n_cells {
        for j in 0..n_cells {
            for k in 0..n_cells {
                for site in basis {
                    points.push(Vector3D::new(
                        (i as f64 + site[0]) * lattice - 0.5 * length,
                        (j as f64 + site[1]) * lattice - 0.5 * length,
                        (k as f64 + site[2]) * lattice - 0.5 * length,
                    ));
                }
            }
        }
    }

    (simulation_box, points)
}

pub const SIMPLE_CUBIC: &[[f64; 3]] = &[[0.0, 0.0, 0.0]];

pub const BODY_CENTERED_CUBIC: &[[f64; 3]] = &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]];

pub const FACE_CENTERED_CUBIC: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];
