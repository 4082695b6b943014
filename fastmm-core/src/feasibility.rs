//! Worst-case constraint violation at the current parameter vector.

use crate::config::ObjMode;
use crate::workspace::Workspace;
use anyhow::Result;

/// Maximum over nonlinear inequality values, absolute nonlinear equality
/// residuals, linear violations `A x - b` and `|Aeq x - beq|`, bound
/// violations, and, in alpha mode, `omega - 2`.
pub fn get_feasibility(ws: &mut Workspace) -> Result<f64> {
    let (gc, gceq) = ws.evaluate();
    let (c, _) = ws.param_manager.pack_results(&gc);
    let (ceq, _) = ws.param_manager.pack_results(&gceq);

    let mut max_viol = 0.0f64;
    for &v in c.iter() {
        max_viol = max_viol.max(v);
    }
    for &v in ceq.iter() {
        max_viol = max_viol.max(v.abs());
    }

    let (a, b, aeq, beq) = ws.param_manager.get_linear_constraints();
    let x = ws.param_manager.cur_x();
    if a.nrows() > 0 {
        for (v, &rhs) in a.matvec(x).iter().zip(&b) {
            max_viol = max_viol.max(v - rhs);
        }
    }
    if aeq.nrows() > 0 {
        for (v, &rhs) in aeq.matvec(x).iter().zip(&beq) {
            max_viol = max_viol.max((v - rhs).abs());
        }
    }

    for i in 0..x.len() {
        max_viol = max_viol.max(ws.param_manager.lower()[i] - x[i]);
        max_viol = max_viol.max(x[i] - ws.param_manager.upper()[i]);
    }

    if ws.config.obj_mode == ObjMode::Alpha {
        let omega = x[ws.omega_pos()];
        max_viol = max_viol.max(omega - 2.0);
    }

    Ok(max_viol)
}
