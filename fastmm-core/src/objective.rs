//! Objective and constraint callbacks in the form a gradient-based solver
//! consumes: values plus Jacobians against the flat parameter vector.

use crate::config::ObjMode;
use crate::workspace::Workspace;
use anyhow::Result;
use fastmm_utils::RowMatrix;
use ndarray::Array1;

/// Objective value and gradient at `x`. The objective is always one bare
/// parameter, so the gradient is a signed unit vector.
pub fn objective(ws: &Workspace, x: &[f64]) -> (f64, Array1<f64>) {
    let mut grad = Array1::zeros(x.len());
    match ws.config.obj_mode {
        ObjMode::Omega => {
            let pos = ws.omega_pos();
            grad[pos] = 1.0;
            (x[pos], grad)
        }
        ObjMode::Alpha => {
            let pos = ws.k_pos();
            grad[pos] = -1.0;
            (-x[pos], grad)
        }
        ObjMode::Mu => {
            let pos = ws.k_pos();
            grad[pos] = 1.0;
            (x[pos], grad)
        }
    }
}

/// Nonlinear constraint values and Jacobians at `x`:
/// `(c, dc, ceq, dceq)` with `c <= 0` and `ceq == 0`.
pub fn nonlinear_constraints(
    ws: &mut Workspace,
    x: &[f64],
) -> Result<(Array1<f64>, RowMatrix, Array1<f64>, RowMatrix)> {
    ws.param_manager.set_value(x)?;
    let (gc, gceq) = ws.evaluate();
    let (c, dc) = ws.param_manager.pack_results(&gc);
    let (ceq, dceq) = ws.param_manager.pack_results(&gceq);
    Ok((c, dc, ceq, dceq))
}
