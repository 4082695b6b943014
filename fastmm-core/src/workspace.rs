//! Session orchestrator: owns the parameter manager, the part registry and
//! the global stage, and drives constraint evaluation.

use crate::autograd::{GroupId, ParamManager};
use crate::config::{Config, ObjMode};
use crate::global_stage::GlobalStage;
use crate::parts::{Part, PartRegistry};
use crate::GVar;
use anyhow::{anyhow, Result};
use fastmm_utils::Shape;
use ndarray::arr2;
use std::array;

/// Omega in alpha mode is pinned to 2 within this tolerance.
const ALPHA_GOAL_EPS: f64 = 1e-9;

pub struct Workspace {
    pub config: Config,
    pub max_level: usize,
    pub param_manager: ParamManager,
    pub parts: PartRegistry,
    pub stage: GlobalStage,

    /// Auxiliary retained-block-count parameters, per region and level
    /// (index `level - 2`).
    num_retain_comp_id: [Vec<GroupId>; 3],
    num_retain_glob_id: [GroupId; 3],
    single_mat_size_id: GroupId,
    omega_id: GroupId,
    k_id: GroupId,

    num_retain_comp_lasteval: [Vec<f64>; 3],
    num_retain_glob_lasteval: [f64; 3],
    single_mat_size_lasteval: f64,
}

impl Workspace {
    /// Register the auxiliary and objective parameters, then build the
    /// global stage and transitively the whole part hierarchy. All
    /// parameters and linear constraints exist once this returns.
    pub fn build(config: Config, max_level: usize) -> Result<Self> {
        if max_level < 3 {
            return Err(anyhow!(
                "max_level must be at least 3, got {}",
                max_level
            ));
        }
        let inf = f64::INFINITY;
        let mut pm = ParamManager::new();

        let mut num_retain_comp_id: [Vec<GroupId>; 3] = array::from_fn(|_| Vec::new());
        let mut num_retain_glob_id = [0; 3];
        for r in 0..3 {
            for _lv in 2..=max_level {
                num_retain_comp_id[r].push(pm.register(1, 0.0, inf, (0.0, 0.01)));
            }
            num_retain_glob_id[r] = pm.register(1, 0.0, inf, (0.0, 0.01));
        }
        let single_mat_size_id = pm.register(1, 0.0, inf, (0.0, 0.01));

        let omega_id = match config.obj_mode {
            ObjMode::Alpha => pm.register(1, 2.0, 2.0 + ALPHA_GOAL_EPS, (0.0, 0.01)),
            _ => pm.register(1, 0.0, inf, (0.0, 0.01)),
        };
        let k_id = match config.obj_mode {
            ObjMode::Omega => pm.register(1, config.k, config.k, (0.0, 0.01)),
            _ => pm.register(1, 0.0, inf, (0.0, 0.01)),
        };
        if config.obj_mode == ObjMode::Mu {
            // omega(K) <= 1 + 2K
            pm.add_linear_constraint(
                &[(omega_id, arr2(&[[1.0]])), (k_id, arr2(&[[-2.0]]))],
                &[1.0],
            );
        }

        let mut parts = PartRegistry::new();
        let stage = GlobalStage::build(&mut pm, &mut parts, &config, max_level);

        for lv in 2..=max_level {
            println!("       Level {}: {} parts", lv, parts.level_count(lv));
        }

        Ok(Self {
            config,
            max_level,
            param_manager: pm,
            parts,
            stage,
            num_retain_comp_id,
            num_retain_glob_id,
            single_mat_size_id,
            omega_id,
            k_id,
            num_retain_comp_lasteval: array::from_fn(|_| Vec::new()),
            num_retain_glob_lasteval: [0.0; 3],
            single_mat_size_lasteval: 0.0,
        })
    }

    pub fn omega_pos(&self) -> usize {
        self.param_manager.start_of(self.omega_id)
    }

    pub fn k_pos(&self) -> usize {
        self.param_manager.start_of(self.k_id)
    }

    /// Full constraint evaluation at the current parameter vector: the
    /// Init pass loads parameters into every node, the Pre pass pushes
    /// reach probabilities top-down, and the Post pass combines complete
    /// splits and contributions bottom-up. Returns the nonlinear
    /// inequality and equality constraint lists.
    pub fn evaluate(&mut self) -> (Vec<GVar>, Vec<GVar>) {
        let pm = &self.param_manager;
        for r in 0..3 {
            self.num_retain_comp_lasteval[r] = self.num_retain_comp_id[r]
                .iter()
                .map(|&id| pm.get_param(id).to_scalar())
                .collect();
            self.num_retain_glob_lasteval[r] =
                pm.get_param(self.num_retain_glob_id[r]).to_scalar();
        }
        self.single_mat_size_lasteval = pm.get_param(self.single_mat_size_id).to_scalar();

        // Init: any order
        for lv in 2..=self.max_level {
            let mut level = self.parts.take_level(lv);
            for part in &mut level {
                part.evaluate_init(&self.param_manager);
            }
            self.parts.put_level(lv, level);
        }
        self.stage.evaluate_init(&self.param_manager);

        // Pre: top-down, parent before child; contributions are collected
        // first so parts mutate only through handles
        for (h, f) in self.stage.pre_contributions() {
            self.parts.get_mut(h).add_part_frac(f);
        }
        for lv in (2..=self.max_level).rev() {
            let contribs: Vec<_> = self
                .parts
                .level(lv)
                .iter()
                .flat_map(Part::pre_contributions)
                .collect();
            for (h, f) in contribs {
                self.parts.get_mut(h).add_part_frac(f);
            }
        }

        // Post: bottom-up, child before parent; the level being written is
        // detached so its parts can read the level below
        let q = self.config.q;
        for lv in 2..=self.max_level {
            let mut level = self.parts.take_level(lv);
            for part in &mut level {
                part.evaluate_post(q, &self.parts);
            }
            self.parts.put_level(lv, level);
        }
        self.stage.evaluate_post(&self.parts);

        // The KKT residuals from lagrange_constraints are deliberately not
        // collected here; feasibility rests on the linear systems and
        // bounds.
        (Vec::new(), Vec::new())
    }

    /// Stationarity residuals for every splitting part and the stage, for
    /// dual-based solvers. Requires a prior [`evaluate`](Self::evaluate).
    pub fn lagrange_constraints(&self) -> Vec<GVar> {
        let mut ceq = Vec::new();
        for (lv, parts) in self.parts.levels() {
            if lv < 3 {
                continue;
            }
            for part in parts {
                if let Part::Split(p) = part {
                    ceq.extend(p.lagrange_constraints());
                }
            }
        }
        ceq.extend(self.stage.lagrange_constraints());
        ceq
    }

    /// Seed all distributions from `(shape, dist)` records, then settle the
    /// auxiliary parameters.
    pub fn seed_initial(&mut self, seeds: &[(Shape, Vec<f64>)]) -> Result<()> {
        self.stage.set_initial(&mut self.param_manager, seeds)?;
        for lv in 2..=self.max_level {
            let level = self.parts.take_level(lv);
            for part in &level {
                part.set_initial(&mut self.param_manager, seeds);
            }
            self.parts.put_level(lv, level);
        }
        self.set_initial();
        Ok(())
    }

    /// Evaluate once and copy the observed auxiliary quantities back into
    /// their parameters, so the initial point satisfies the coupling
    /// constraints they appear in.
    pub fn set_initial(&mut self) {
        self.evaluate();
        for r in 0..3 {
            let vals = self.num_retain_comp_lasteval[r].clone();
            for (i, &id) in self.num_retain_comp_id[r].iter().enumerate() {
                self.param_manager.set_single_param(id, &[vals[i]]);
            }
            self.param_manager
                .set_single_param(self.num_retain_glob_id[r], &[self.num_retain_glob_lasteval[r]]);
        }
        self.param_manager
            .set_single_param(self.single_mat_size_id, &[self.single_mat_size_lasteval]);
    }

    /// The scalar being minimized in the current mode.
    pub fn objective_value(&self) -> f64 {
        let x = self.param_manager.cur_x();
        match self.config.obj_mode {
            ObjMode::Omega => x[self.omega_pos()],
            ObjMode::Alpha => -x[self.k_pos()],
            ObjMode::Mu => x[self.k_pos()],
        }
    }
}
