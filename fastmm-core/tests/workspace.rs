use fastmm_core::feasibility::get_feasibility;
use fastmm_core::objective::objective;
use fastmm_core::{Config, ObjMode, Workspace};

fn root_uniform() -> Vec<([usize; 3], Vec<f64>)> {
    // 45 shapes sum to 8 at level 3
    vec![([0, 0, 0], vec![1.0 / 45.0; 45])]
}

#[test]
fn test_build_rejects_shallow_levels() {
    assert!(Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 2).is_err());
}

#[test]
fn test_build_level3_part_counts() {
    let ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    // one part per (shape, region) at the top level
    assert_eq!(ws.parts.level_count(3), 3 * 45);
    assert!(ws.parts.level_count(2) > 0);

    let mut seen = std::collections::HashSet::new();
    for (lv, parts) in ws.parts.levels() {
        for p in parts {
            assert!(seen.insert((lv, p.shape(), p.identifier())));
        }
    }
}

#[test]
fn test_mode_specific_parameter_bounds() {
    let ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 0.8), 3).unwrap();
    let k = ws.k_pos();
    assert_eq!(ws.param_manager.lower()[k], 0.8);
    assert_eq!(ws.param_manager.upper()[k], 0.8);
    let (a, _, _, _) = ws.param_manager.get_linear_constraints();
    assert_eq!(a.nrows(), 0);

    let ws = Workspace::build(Config::new(5.0, ObjMode::Alpha, 1.0), 3).unwrap();
    let w = ws.omega_pos();
    assert_eq!(ws.param_manager.lower()[w], 2.0);
    assert!(ws.param_manager.upper()[w] <= 2.0 + 1e-8);

    let ws = Workspace::build(Config::new(5.0, ObjMode::Mu, 1.0), 3).unwrap();
    let (a, b, _, _) = ws.param_manager.get_linear_constraints();
    assert_eq!(a.nrows(), 1);
    assert_eq!(b, vec![1.0]);
}

#[test]
fn test_uniform_seed_is_feasible() {
    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();

    let mut x = ws.param_manager.cur_x().to_vec();
    x[ws.k_pos()] = 1.0;
    x[ws.omega_pos()] = 3.0;
    ws.param_manager.set_value(&x).unwrap();

    let viol = get_feasibility(&mut ws).unwrap();
    assert!(viol < 1e-9, "violation {} too large", viol);
}

#[test]
fn test_part_frac_conservation() {
    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();
    ws.evaluate();

    let sum3: f64 = ws.parts.level(3).iter().map(|p| p.part_frac()).sum();
    assert!((sum3 - 1.0).abs() < 1e-9);

    // 21 of the 45 shapes have no zero entry and split into two children
    let sum2: f64 = ws.parts.level(2).iter().map(|p| p.part_frac()).sum();
    assert!((sum2 - 2.0 * 21.0 / 45.0).abs() < 1e-9);
}

#[test]
fn test_evaluate_is_idempotent() {
    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();
    ws.evaluate();
    let first: Vec<f64> = ws.parts.level(3).iter().map(|p| p.part_frac()).collect();
    ws.evaluate();
    let second: Vec<f64> = ws.parts.level(3).iter().map(|p| p.part_frac()).collect();
    assert_eq!(first, second);
}

#[test]
fn test_objective_value_per_mode() {
    for (mode, sign) in [(ObjMode::Omega, 1.0), (ObjMode::Alpha, -1.0), (ObjMode::Mu, 1.0)] {
        let mut ws = Workspace::build(Config::new(5.0, mode, 1.0), 3).unwrap();
        let mut x = ws.param_manager.cur_x().to_vec();
        x[ws.omega_pos()] = 2.5;
        x[ws.k_pos()] = 1.0;
        ws.param_manager.set_value(&x).unwrap();

        let pos = match mode {
            ObjMode::Omega => ws.omega_pos(),
            _ => ws.k_pos(),
        };
        let (val, grad) = objective(&ws, ws.param_manager.cur_x());
        assert_eq!(val, sign * ws.param_manager.cur_x()[pos]);
        assert_eq!(grad[pos], sign);
        assert_eq!(val, ws.objective_value());
    }
}

#[test]
fn test_lagrange_constraints_shape() {
    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();
    ws.evaluate();
    let ceq = ws.lagrange_constraints();
    // three regions times num_split residuals per splitting part, plus
    // 3 * 45 from the stage
    assert!(ceq.len() > 3 * 45);
    for g in &ceq {
        assert_eq!(g.len(), 1);
        assert!(g.to_scalar().is_finite());
    }
}
