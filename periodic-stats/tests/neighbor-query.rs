use periodic_stats::{PeriodicBox, NeighborList, NeighborQuery, QueryArgs, Vector3D};
use periodic_stats::locality::{BruteForceQuery, CellListQuery};

mod data;

fn boxes() -> Vec<(&'static str, PeriodicBox)> {
    vec![
        ("cube", PeriodicBox::cube(12.0).unwrap()),
        ("triclinic", PeriodicBox::new(12.0, 13.0, 14.0, 0.3, -0.2, 0.1, false).unwrap()),
        ("partially periodic", PeriodicBox::cube(12.0).unwrap().with_periodic([true, false, true])),
        ("square", PeriodicBox::square(12.0).unwrap()),
        ("tilted 2D", PeriodicBox::new(12.0, 10.0, 0.0, 0.4, 0.0, 0.0, true).unwrap()),
    ]
}

fn check_sorted(neighbors: &NeighborList) {
    let bonds = neighbors.bonds();
    assert!(bonds.windows(2).all(|w| w[0].query_point <= w[1].query_point));

    for query_point in 0..neighbors.n_query_points() {
        let first = neighbors.find_first_index(query_point);
        assert!(bonds[..first].iter().all(|bond| bond.query_point < query_point));
        assert!(bonds[first..].iter().all(|bond| bond.query_point >= query_point));
    }
    assert_eq!(neighbors.find_first_index(neighbors.n_query_points()), bonds.len());
}

#[test]
fn ball_query() {
    for (name, simulation_box) in boxes() {
        let points = data::random_points(&simulation_box, 300, 42);
        let brute_force = BruteForceQuery::new(simulation_box, &points).unwrap();

        for r_max in [0.9, 2.5, 4.5] {
            let cells = CellListQuery::new(simulation_box, &points, r_max).unwrap();

            let args = QueryArgs { exclude_ii: true, ..QueryArgs::ball(r_max) };
            let expected = brute_force.query(&points, &args).unwrap();
            let actual = cells.query(&points, &args).unwrap();
            assert_eq!(actual, expected, "ball query mismatch in {} box with r_max={}", name, r_max);

            check_sorted(&actual);
            assert!(actual.bonds().iter().all(|bond| bond.query_point != bond.point));
            assert!(actual.distances().iter().all(|&d| d < r_max));

            // bonds are sorted by point within each query point
            for query_point in 0..points.len() {
                let bonds = actual.bonds_for(query_point);
                assert!(bonds.windows(2).all(|w| w[0].point < w[1].point));
            }
        }
    }
}

#[test]
fn ball_query_other_points() {
    for (name, simulation_box) in boxes() {
        let points = data::random_points(&simulation_box, 200, 7);
        let query_points = data::random_points(&simulation_box, 50, 8);

        let brute_force = BruteForceQuery::new(simulation_box, &points).unwrap();
        let cells = CellListQuery::new(simulation_box, &points, 1.5).unwrap();

        // the cell list must visit more cells for r_max larger than the cells
        let args = QueryArgs { r_min: 0.5, ..QueryArgs::ball(3.2) };
        let expected = brute_force.query(&query_points, &args).unwrap();
        let actual = cells.query(&query_points, &args).unwrap();
        assert_eq!(actual, expected, "ball query mismatch in {} box", name);
        assert_eq!(actual.n_query_points(), 50);
        assert_eq!(actual.n_points(), 200);
        assert!(actual.distances().iter().all(|&d| (0.5..3.2).contains(&d)));
    }
}

#[test]
fn nearest_query() {
    for (name, simulation_box) in boxes() {
        let points = data::random_points(&simulation_box, 300, 1234);
        let brute_force = BruteForceQuery::new(simulation_box, &points).unwrap();
        let cells = CellListQuery::new(simulation_box, &points, 1.0).unwrap();

        for k in [1, 6, 20] {
            let args = QueryArgs { exclude_ii: true, ..QueryArgs::nearest(k) };
            let expected = brute_force.query(&points, &args).unwrap();
            let actual = cells.query(&points, &args).unwrap();
            assert_eq!(actual, expected, "nearest query mismatch in {} box with k={}", name, k);

            check_sorted(&actual);
            assert!(actual.neighbor_counts().iter().all(|&count| count == k));

            // neighbors come sorted by distance
            for query_point in 0..points.len() {
                let bonds = actual.bonds_for(query_point);
                assert!(bonds.windows(2).all(|w| w[0].distance <= w[1].distance));
            }
        }
    }
}

#[test]
fn nearest_query_with_r_max() {
    let simulation_box = PeriodicBox::cube(12.0).unwrap();
    let points = data::random_points(&simulation_box, 100, 3);
    let brute_force = BruteForceQuery::new(simulation_box, &points).unwrap();
    let cells = CellListQuery::new(simulation_box, &points, 1.0).unwrap();

    // with a small r_max, some points have less than k neighbors
    let args = QueryArgs {
        r_max: Some(1.2),
        r_guess: Some(0.3),
        scale: 1.5,
        exclude_ii: true,
        ..QueryArgs::nearest(4)
    };
    let expected = brute_force.query(&points, &args).unwrap();
    let actual = cells.query(&points, &args).unwrap();
    assert_eq!(actual, expected);
    assert!(actual.neighbor_counts().iter().any(|&count| count < 4));
    assert!(actual.distances().iter().all(|&d| d < 1.2));
}

#[test]
fn auto_query() {
    let simulation_box = PeriodicBox::cube(12.0).unwrap();
    let points = data::random_points(&simulation_box, 200, 5);
    let args = QueryArgs::ball(2.0);

    let expected = BruteForceQuery::new(simulation_box, &points).unwrap().query(&points, &args).unwrap();

    // uses a cell list
    let query = <dyn NeighborQuery>::auto(simulation_box, &points, 2.0).unwrap();
    assert_eq!(query.query(&points, &args).unwrap(), expected);

    // uses a brute force search
    let query = <dyn NeighborQuery>::auto(simulation_box, &points, 5.0).unwrap();
    assert_eq!(query.query(&points, &args).unwrap(), expected);
}

#[test]
fn single_point() {
    let simulation_box = PeriodicBox::cube(12.0).unwrap();
    let points = data::random_points(&simulation_box, 200, 11);
    let cells = CellListQuery::new(simulation_box, &points, 2.0).unwrap();

    let query_point = Vector3D::new(5.9, -5.9, 0.0);
    let neighbors = cells.query_single(query_point, 0, &QueryArgs::ball(2.0))
        .unwrap()
        .collect::<Vec<_>>();

    let expected = points.iter()
        .filter(|&&point| simulation_box.distance(query_point, point) < 2.0)
        .count();
    assert_eq!(neighbors.len(), expected);
    assert!(neighbors.iter().all(|neighbor| neighbor.query_point == 0));
}
