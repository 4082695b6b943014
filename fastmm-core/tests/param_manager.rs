use fastmm_core::autograd::ParamManager;
use ndarray::{arr2, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_register_tiles_the_vector() {
    let mut pm = ParamManager::new();
    let a = pm.register(3, 0.0, 1.0, (0.0, 1.0));
    let b = pm.register(1, -1.0, 1.0, (0.0, 1.0));
    let c = pm.register(5, 0.0, f64::INFINITY, (0.0, 0.01));
    assert_eq!(pm.num_input(), 9);
    assert_eq!(pm.start_of(a), 0);
    assert_eq!(pm.start_of(b), 3);
    assert_eq!(pm.start_of(c), 4);
    let total: usize = pm.groups().iter().map(|g| g.size).sum();
    assert_eq!(total, pm.num_input());
    assert!(pm.cur_x().iter().all(|&v| v == 0.0));
    assert_eq!(pm.lower()[3], -1.0);
    assert_eq!(pm.upper()[4], f64::INFINITY);
}

#[test]
fn test_get_param_is_a_view_with_unit_gradient() {
    let mut pm = ParamManager::new();
    let _ = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    let b = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    pm.set_value(&[0.1, 0.2, 0.3, 0.4]).unwrap();
    let g = pm.get_param(b);
    assert_eq!(g.num_input(), 4);
    assert_eq!(g.value().as_slice().unwrap(), &[0.3, 0.4]);
    assert_eq!(g.grad().col(0).get(2), 1.0);
    assert_eq!(g.grad().col(1).get(3), 1.0);
    assert_eq!(g.grad().col(0).nnz(), 1);
}

#[test]
fn test_set_value_clips_to_bounds() {
    let mut pm = ParamManager::new();
    let _ = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    pm.set_value(&[-0.5, 2.0]).unwrap();
    assert_eq!(pm.cur_x(), &[0.0, 1.0]);
}

#[test]
fn test_set_value_rejects_length_mismatch() {
    let mut pm = ParamManager::new();
    let _ = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    assert!(pm.set_value(&[0.1]).is_err());
    assert!(pm.set_value(&[0.1, 0.2, 0.3]).is_err());
}

#[test]
fn test_set_single_param_pads_and_truncates() {
    let mut pm = ParamManager::new();
    let a = pm.register(3, 0.0, 10.0, (0.0, 1.0));
    pm.set_single_param(a, &[7.0]);
    assert_eq!(pm.cur_x(), &[7.0, 7.0, 7.0]);
    pm.set_single_param(a, &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(pm.cur_x(), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_random_init_stays_in_range() {
    let mut pm = ParamManager::new();
    let _ = pm.register(10, 0.0, 1.0, (0.0, 0.25));
    let _ = pm.register(10, -1.0, 1.0, (-0.01, 0.01));
    let mut rng = StdRng::seed_from_u64(7);
    pm.random_init(&mut rng);
    for &v in &pm.cur_x()[..10] {
        assert!((0.0..0.25).contains(&v));
    }
    for &v in &pm.cur_x()[10..] {
        assert!((-0.01..0.01).contains(&v));
    }
}

#[test]
fn test_perturb_respects_bounds() {
    let mut pm = ParamManager::new();
    let _ = pm.register(20, 0.0, 1.0, (0.0, 1.0));
    pm.set_value(&vec![0.5; 20]).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    pm.perturb(&mut rng, 10.0).unwrap();
    for &v in pm.cur_x() {
        assert!((0.0..=1.0).contains(&v));
    }
    assert!(pm.perturb(&mut rng, -1.0).is_err());
}

#[test]
fn test_linear_constraints_scatter_blocks() {
    let mut pm = ParamManager::new();
    let a = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    let b = pm.register(3, 0.0, 1.0, (0.0, 1.0));
    pm.add_linear_constraint_eq(&[(a, Array2::ones((1, 2)))], &[1.0]);
    pm.add_linear_constraint_eq(
        &[(a, arr2(&[[1.0, 0.0]])), (b, arr2(&[[0.0, -1.0, 0.0]]))],
        &[0.0],
    );
    pm.add_linear_constraint(&[(b, arr2(&[[1.0, 1.0, 1.0]]))], &[2.0]);

    let (la, lb, aeq, beq) = pm.get_linear_constraints();
    assert_eq!(la.nrows(), 1);
    assert_eq!(lb, vec![2.0]);
    assert_eq!(aeq.nrows(), 2);
    assert_eq!(beq, vec![1.0, 0.0]);

    pm.set_value(&[0.25, 0.75, 0.1, 0.25, 0.3]).unwrap();
    let r = aeq.matvec(pm.cur_x());
    assert!((r[0] - 1.0).abs() < 1e-15);
    assert!(r[1].abs() < 1e-15);
    let r = la.matvec(pm.cur_x());
    assert!((r[0] - 0.65).abs() < 1e-15);
}

#[test]
fn test_structurally_empty_rows_are_dropped() {
    let mut pm = ParamManager::new();
    let a = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    pm.add_linear_constraint_eq(&[(a, Array2::zeros((1, 2)))], &[0.0]);
    pm.add_linear_constraint_eq(&[(a, Array2::ones((1, 2)))], &[1.0]);
    let (_, _, aeq, beq) = pm.get_linear_constraints();
    assert_eq!(aeq.nrows(), 1);
    assert_eq!(beq, vec![1.0]);
}

#[test]
fn test_overlapping_blocks_sum_coefficients() {
    let mut pm = ParamManager::new();
    let a = pm.register(2, 0.0, 1.0, (0.0, 1.0));
    pm.add_linear_constraint_eq(
        &[(a, arr2(&[[1.0, 0.0]])), (a, arr2(&[[2.0, 1.0]]))],
        &[0.0],
    );
    let (_, _, aeq, _) = pm.get_linear_constraints();
    pm.set_value(&[1.0, 1.0]).unwrap();
    let r = aeq.matvec(pm.cur_x());
    assert_eq!(r[0], 4.0);
}

#[test]
fn test_pack_results_flattens_vector_entries() {
    let mut pm = ParamManager::new();
    let a = pm.register(2, 0.0, 10.0, (0.0, 1.0));
    let b = pm.register(1, 0.0, 10.0, (0.0, 1.0));
    pm.set_value(&[2.0, 5.0, 1.0]).unwrap();
    let results = vec![pm.get_param(a), pm.get_param(b).entropy()];
    let (vals, jac) = pm.pack_results(&results);
    // one row per entry: two from the vector view, one from the entropy
    assert_eq!(vals.len(), 3);
    assert_eq!(jac.nrows(), 3);
    assert_eq!(vals[0], 2.0);
    assert_eq!(vals[1], 5.0);
    assert_eq!(jac.row(0).get(0), 1.0);
    assert_eq!(jac.row(1).get(1), 1.0);
    assert_eq!(jac.row(1).get(0), 0.0);
}

#[test]
fn test_pack_results_rows_match_gradients() {
    let mut pm = ParamManager::new();
    let a = pm.register(2, 0.0, 10.0, (0.0, 1.0));
    pm.set_value(&[2.0, 5.0]).unwrap();
    let g = pm.get_param(a);
    let results = vec![g.entropy(), g.get(0) * 3.0];
    let (vals, jac) = pm.pack_results(&results);
    assert_eq!(vals.len(), 2);
    assert_eq!(jac.nrows(), 2);
    assert_eq!(vals[1], 6.0);
    assert_eq!(jac.row(1).get(0), 3.0);
    assert_eq!(jac.row(1).get(1), 0.0);
}
