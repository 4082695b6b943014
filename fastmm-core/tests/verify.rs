use fastmm_core::io::save_param;
use fastmm_core::verify::{verify_mu, verify_omega};
use fastmm_core::{Config, ObjMode, Workspace};

fn root_uniform() -> Vec<([usize; 3], Vec<f64>)> {
    vec![([0, 0, 0], vec![1.0 / 45.0; 45])]
}

#[test]
fn test_verify_omega_accepts_feasible_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("omega.json");

    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Omega, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();
    let mut x = ws.param_manager.cur_x().to_vec();
    x[ws.k_pos()] = 1.0;
    x[ws.omega_pos()] = 3.0;
    ws.param_manager.set_value(&x).unwrap();
    save_param(&path, &ws).unwrap();

    let v = verify_omega(5.0, 1.0, &path).unwrap();
    assert_eq!(v.bound, 3.0);
    assert!(v.max_violation < 1e-9);
}

#[test]
fn test_verify_mu_reports_claimed_bound() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mu.json");

    let mut ws = Workspace::build(Config::new(5.0, ObjMode::Mu, 1.0), 3).unwrap();
    ws.seed_initial(&root_uniform()).unwrap();
    let mut x = ws.param_manager.cur_x().to_vec();
    x[ws.k_pos()] = 0.75;
    x[ws.omega_pos()] = 2.4;
    ws.param_manager.set_value(&x).unwrap();
    save_param(&path, &ws).unwrap();

    let v = verify_mu(5.0, &path).unwrap();
    assert_eq!(v.bound, 0.75);
    // omega - 2K = 0.9 <= 1
    assert!(v.max_violation < 1e-9);
}

#[test]
fn test_verify_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(verify_omega(5.0, 1.0, &path).is_err());
}
