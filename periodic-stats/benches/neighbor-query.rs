use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use periodic_stats::{NeighborQuery, PeriodicBox, QueryArgs, Vector3D};
use periodic_stats::locality::{BruteForceQuery, CellListQuery, Filter, SannFilter, SannParameters};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn random_points(simulation_box: &PeriodicBox, count: usize) -> Vec<Vector3D> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xdead_beef);
    (0..count).map(|_| {
        simulation_box.cartesian(Vector3D::new(rng.random(), rng.random(), rng.random()))
    }).collect()
}

fn ball_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("ball query (r_max = 2)");
    group.noise_threshold(0.05);

    for &n_points in black_box(&[1000, 8000, 27000]) {
        // keep the density constant
        let length = 10.0 * f64::cbrt(n_points as f64 / 1000.0);
        let simulation_box = PeriodicBox::cube(length).unwrap();
        let points = random_points(&simulation_box, n_points);
        let args = QueryArgs { exclude_ii: true, ..QueryArgs::ball(2.0) };

        group.bench_with_input(BenchmarkId::new("cell list", n_points), &points, |b, points| b.iter(|| {
            let query = CellListQuery::new(simulation_box, points, 2.0).unwrap();
            query.query(points, &args).unwrap()
        }));

        if n_points <= 8000 {
            let query = BruteForceQuery::new(simulation_box, &points).unwrap();
            group.bench_with_input(BenchmarkId::new("brute force", n_points), &points, |b, points| b.iter(|| {
                query.query(points, &args).unwrap()
            }));
        }
    }
}

fn nearest_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest neighbors query (8000 points)");
    group.noise_threshold(0.05);

    let simulation_box = PeriodicBox::cube(20.0).unwrap();
    let points = random_points(&simulation_box, 8000);
    let query = CellListQuery::new(simulation_box, &points, 1.0).unwrap();

    for &k in black_box(&[4, 12, 32]) {
        let args = QueryArgs { exclude_ii: true, ..QueryArgs::nearest(k) };
        group.bench_function(format!("k = {}", k), |b| b.iter(|| {
            query.query(&points, &args).unwrap()
        }));
    }
}

fn sann_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("SANN filter");
    group.noise_threshold(0.05);
    group.sample_size(20);

    let simulation_box = PeriodicBox::cube(15.0).unwrap();
    let points = random_points(&simulation_box, 3375);
    let query = CellListQuery::new(simulation_box, &points, 2.5).unwrap();
    let args = QueryArgs { exclude_ii: true, ..QueryArgs::nearest(40) };
    let candidates = query.query(&points, &args).unwrap();

    let parameters = SannParameters { allow_incomplete_shell: true, ..Default::default() };
    let filter = SannFilter::new(parameters).unwrap();
    group.bench_function("40 candidates", |b| b.iter(|| {
        filter.compute(&query, None, Some(&candidates)).unwrap()
    }));
}

criterion_group!(neighbors, ball_query, nearest_query, sann_filter);
criterion_main!(neighbors);
