use approx::assert_ulps_eq;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use periodic_stats::{PeriodicBox, Vector3D};

fn boxes() -> Vec<(&'static str, PeriodicBox)> {
    vec![
        ("cube", PeriodicBox::cube(12.0).unwrap()),
        ("triclinic", PeriodicBox::new(12.0, 13.0, 14.0, 0.3, -0.2, 0.1, false).unwrap()),
        ("very tilted", PeriodicBox::new(8.0, 9.0, 10.0, 0.5, 0.5, -0.5, false).unwrap()),
        ("partially periodic", PeriodicBox::cube(12.0).unwrap().with_periodic([true, false, true])),
        ("tilted 2D", PeriodicBox::new(12.0, 10.0, 0.0, 0.4, 0.0, 0.0, true).unwrap()),
    ]
}

fn random_vector(rng: &mut impl Rng, simulation_box: &PeriodicBox, max: f64) -> Vector3D {
    let x = rng.random_range(-max..max);
    let y = rng.random_range(-max..max);
    let z = if simulation_box.is_2d() { 0.0 } else { rng.random_range(-max..max) };
    Vector3D::new(x, y, z)
}

#[test]
fn wrap_is_idempotent() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(314);
    for (name, simulation_box) in boxes() {
        let periodic = simulation_box.periodic();
        for _ in 0..10000 {
            let vector = random_vector(&mut rng, &simulation_box, 40.0);
            let wrapped = simulation_box.wrap(vector);

            assert_ulps_eq!(simulation_box.wrap(wrapped), wrapped, epsilon = 1e-9);

            // wrapping only removes whole lattice vectors
            let image = simulation_box.image(vector);
            let mut reconstructed = wrapped;
            for axis in 0..simulation_box.dimensions() {
                reconstructed += image[axis] as f64 * simulation_box.lattice_vector(axis);
            }
            assert_ulps_eq!(reconstructed, vector, epsilon = 1e-9);

            let fractional = simulation_box.fractional(wrapped);
            for axis in 0..simulation_box.dimensions() {
                if periodic[axis] {
                    assert!(
                        fractional[axis] > -1e-12 && fractional[axis] < 1.0 + 1e-12,
                        "wrapped vector is outside of the {} box: {:?}", name, wrapped
                    );
                }
            }
        }
    }
}

#[test]
fn wrap_gives_short_minimum_images() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2718);
    for (name, simulation_box) in boxes() {
        let half_width = 0.5 * simulation_box.min_periodic_width().unwrap();

        // any wrapped vector shorter than half of the smallest width is the
        // shortest of its images
        let mut checked = 0;
        for _ in 0..10000 {
            let vector = random_vector(&mut rng, &simulation_box, 40.0);
            let wrapped = simulation_box.wrap(vector);
            if wrapped.norm() >= half_width {
                continue;
            }

            checked += 1;
            for image in simulation_box.images(wrapped) {
                assert!(
                    wrapped.norm() <= image.norm() + 1e-9,
                    "{:?} has a shorter image {:?} in the {} box", wrapped, image, name
                );
            }
        }
        assert!(checked > 500, "only {} short vectors in the {} box", checked, name);

        // short displacements are found back from any of their images
        let periodic = simulation_box.periodic();
        let radius = 0.99 * half_width / f64::sqrt(3.0);
        for _ in 0..10000 {
            let minimal = random_vector(&mut rng, &simulation_box, radius);

            let mut shifted = minimal;
            for axis in 0..simulation_box.dimensions() {
                if periodic[axis] {
                    let count: i32 = rng.random_range(-3..=3);
                    shifted += count as f64 * simulation_box.lattice_vector(axis);
                }
            }

            assert_ulps_eq!(simulation_box.wrap(shifted), minimal, epsilon = 1e-9);
        }
    }
}
