//! Verification entry points: rebuild the decomposition at a fixed depth,
//! load a claimed parameter vector, and report the bound together with the
//! worst constraint violation.

use crate::config::{Config, ObjMode};
use crate::feasibility::get_feasibility;
use crate::io::load_param;
use crate::workspace::Workspace;
use anyhow::Result;
use std::path::Path;

/// All published parameter sets are for this recursion depth.
const VERIFY_MAX_LEVEL: usize = 3;

/// Outcome of one verification run.
#[derive(Debug, Clone, Copy)]
pub struct Verification {
    /// The claimed bound read back from the parameter vector.
    pub bound: f64,
    pub max_violation: f64,
}

/// Check a claimed `omega(1, 1, K) <= bound` certificate.
pub fn verify_omega(q: f64, k: f64, param_file: &Path) -> Result<Verification> {
    let mut ws = Workspace::build(Config::new(q, ObjMode::Omega, k), VERIFY_MAX_LEVEL)?;
    load_param(param_file, Some(k), &mut ws)?;
    let max_violation = get_feasibility(&mut ws)?;
    let omega = ws.param_manager.cur_x()[ws.omega_pos()];

    println!(
        "omega({:.6}) <= {:.8} \t(MaxViolation: {:.6e})",
        k, omega, max_violation
    );
    warn_tolerance(max_violation);
    Ok(Verification {
        bound: omega,
        max_violation,
    })
}

/// Check a claimed `alpha >= bound` certificate (omega pinned to 2).
pub fn verify_alpha(q: f64, param_file: &Path) -> Result<Verification> {
    let mut ws = Workspace::build(Config::new(q, ObjMode::Alpha, 1.0), VERIFY_MAX_LEVEL)?;
    load_param(param_file, None, &mut ws)?;
    let max_violation = get_feasibility(&mut ws)?;
    let k = ws.param_manager.cur_x()[ws.k_pos()];

    println!("alpha >= {:.8} \t(MaxViolation: {:.6e})", k, max_violation);
    warn_tolerance(max_violation);
    Ok(Verification {
        bound: k,
        max_violation,
    })
}

/// Check a claimed `mu <= bound` certificate (`omega(K) <= 1 + 2K`).
pub fn verify_mu(q: f64, param_file: &Path) -> Result<Verification> {
    let mut ws = Workspace::build(Config::new(q, ObjMode::Mu, 1.0), VERIFY_MAX_LEVEL)?;
    load_param(param_file, None, &mut ws)?;
    let max_violation = get_feasibility(&mut ws)?;
    let k = ws.param_manager.cur_x()[ws.k_pos()];

    println!("mu <= {:.8} \t(MaxViolation: {:.6e})", k, max_violation);
    warn_tolerance(max_violation);
    Ok(Verification {
        bound: k,
        max_violation,
    })
}

fn warn_tolerance(max_violation: f64) {
    if max_violation > 1.1e-6 {
        println!("[WARN] The last result seems wrong (the MaxViolation is too large).");
    } else if max_violation > 1.1e-9 {
        println!("[WARN] The last result is not very accurate (MaxViolation > 1e-9).");
    }
}
