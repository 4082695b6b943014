//! The top-level hashing stage.
//!
//! Plays the same role as a splitting part, but at the root: it owns the
//! three region proportions, a distribution over every max-level shape per
//! region, and aggregates all parts' contributions into the final answer
//! quantities.

use crate::autograd::{GroupId, ParamManager};
use crate::config::{Config, ObjMode};
use crate::parts::{csd_len, PartHandle, PartRegistry};
use crate::GVar;
use anyhow::{anyhow, Result};
use fastmm_utils::{joint_to_margin, prepare_shapes, Projection, Shape};
use ndarray::{arr2, Array2};
use std::array;

#[derive(Debug)]
pub struct GlobalStage {
    pub level: usize,
    pub power: usize,
    pub sum_col: usize,
    shapes: Vec<Shape>,
    num_shape: usize,
    joint_to_margin: [Projection; 3],
    part_handles: [Vec<PartHandle>; 3],

    region_prop_id: GroupId,
    dist_id: [GroupId; 3],
    dist_max_id: [GroupId; 3],
    lam_margin_id: [[GroupId; 3]; 3],
    lam_sum_id: [GroupId; 3],

    state: Option<StageState>,
    outputs: Option<StageOutputs>,
}

#[derive(Debug)]
struct StageState {
    region_prop: GVar,
    dist: [GVar; 3],
    dist_max: [GVar; 3],
    lam_margin: [[GVar; 3]; 3],
    lam_sum: [GVar; 3],
}

#[derive(Debug)]
struct StageOutputs {
    mat_size: GVar,
    num_block: [GVar; 3],
    hash_penalty_term: [GVar; 3],
    p_comp: [GVar; 3],
    complete_split: [[GVar; 3]; 3],
}

impl GlobalStage {
    /// Register the stage's own parameters and constraints, then build the
    /// whole part hierarchy underneath it.
    pub fn build(
        pm: &mut ParamManager,
        registry: &mut PartRegistry,
        config: &Config,
        max_level: usize,
    ) -> Self {
        let power = 1usize << (max_level - 1);
        let sum_col = 1usize << max_level;
        let shapes = prepare_shapes(max_level);
        let num_shape = shapes.len();
        let jtm = joint_to_margin(&shapes, sum_col);

        let inf = f64::INFINITY;
        let region_prop_id = pm.register(3, 0.0, 1.0, (0.0, 1.0));
        let mut dist_id = [0; 3];
        let mut dist_max_id = [0; 3];
        for r in 0..3 {
            dist_id[r] = pm.register(num_shape, 0.0, 1.0, (0.0, 1.0 / num_shape as f64));
            dist_max_id[r] = pm.register(num_shape, 0.0, 1.0, (0.0, 1.0 / num_shape as f64));
        }
        let mut lam_margin_id = [[0; 3]; 3];
        let mut lam_sum_id = [0; 3];
        for r in 0..3 {
            for t in 0..3 {
                lam_margin_id[r][t] = pm.register(sum_col + 1, -inf, inf, (-0.01, 0.01));
            }
            lam_sum_id[r] = pm.register(1, -inf, inf, (-0.01, 0.01));
        }

        pm.add_linear_constraint_eq(&[(region_prop_id, Array2::ones((1, 3)))], &[1.0]);
        for r in 0..3 {
            pm.add_linear_constraint_eq(
                &[(dist_id[r], Array2::ones((1, num_shape)))],
                &[1.0],
            );
            for jtm_t in &jtm {
                let margin_size = jtm_t.out_len;
                let mut block = Array2::zeros((margin_size, num_shape));
                for (i, &m) in jtm_t.targets.iter().enumerate() {
                    block[[m, i]] = 1.0;
                }
                pm.add_linear_constraint_eq(
                    &[(dist_id[r], block.clone()), (dist_max_id[r], -block)],
                    &vec![0.0; margin_size],
                );
            }
        }

        // the Y and Z regions are always symmetric; with K = 1 all three are
        pm.add_linear_constraint_eq(
            &[(region_prop_id, arr2(&[[0.0, 1.0, -1.0]]))],
            &[0.0],
        );
        if config.obj_mode == ObjMode::Omega && config.k == 1.0 {
            pm.add_linear_constraint_eq(
                &[(region_prop_id, arr2(&[[1.0, -1.0, 0.0]]))],
                &[0.0],
            );
        }

        let part_handles: [Vec<PartHandle>; 3] = array::from_fn(|r| {
            shapes
                .iter()
                .map(|&shape| registry.find_or_create(pm, max_level, shape, (0, r)))
                .collect()
        });

        Self {
            level: max_level,
            power,
            sum_col,
            shapes,
            num_shape,
            joint_to_margin: jtm,
            part_handles,
            region_prop_id,
            dist_id,
            dist_max_id,
            lam_margin_id,
            lam_sum_id,
            state: None,
            outputs: None,
        }
    }

    pub fn part_handles(&self, region: usize) -> &[PartHandle] {
        &self.part_handles[region]
    }

    /// Seed the root distributions from the `(0,0,0)` record. Unlike parts,
    /// a missing root record is fatal.
    pub fn set_initial(&self, pm: &mut ParamManager, seeds: &[(Shape, Vec<f64>)]) -> Result<()> {
        pm.set_single_param(self.region_prop_id, &[1.0 / 3.0; 3]);
        let (_, dist) = seeds
            .iter()
            .find(|(s, _)| *s == [0, 0, 0])
            .ok_or_else(|| anyhow!("No initial distribution for the root shape (0, 0, 0)"))?;
        for r in 0..3 {
            pm.set_single_param(self.dist_id[r], dist);
            pm.set_single_param(self.dist_max_id[r], dist);
        }
        for r in 0..3 {
            pm.set_single_param(self.lam_sum_id[r], &[0.0]);
            for t in 0..3 {
                pm.set_single_param(self.lam_margin_id[r][t], &vec![0.0; self.sum_col + 1]);
            }
        }
        Ok(())
    }

    pub fn evaluate_init(&mut self, pm: &ParamManager) {
        self.outputs = None;
        self.state = Some(StageState {
            region_prop: pm.get_param(self.region_prop_id),
            dist: array::from_fn(|r| pm.get_param(self.dist_id[r])),
            dist_max: array::from_fn(|r| pm.get_param(self.dist_max_id[r])),
            lam_margin: array::from_fn(|r| {
                array::from_fn(|t| pm.get_param(self.lam_margin_id[r][t]))
            }),
            lam_sum: array::from_fn(|r| pm.get_param(self.lam_sum_id[r])),
        });
    }

    /// Seed every max-level part's reach probability from the root
    /// distribution; the top-down pass then propagates it downward.
    pub fn pre_contributions(&self) -> Vec<(PartHandle, f64)> {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let rp = state.region_prop.value();
        let mut out = Vec::with_capacity(3 * self.num_shape);
        for r in 0..3 {
            for (i, &h) in self.part_handles[r].iter().enumerate() {
                out.push((h, state.dist[r].value()[i] * rp[r]));
            }
        }
        out
    }

    pub fn evaluate_post(&mut self, registry: &PartRegistry) {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let n = state.region_prop.num_input();
        let rp = state.region_prop.value().to_vec();
        let csd_size = csd_len(self.power);

        let hash_penalty_term: [GVar; 3] = array::from_fn(|r| {
            (state.dist_max[r].entropy() - state.dist[r].entropy()) * rp[r]
        });

        let num_block: [GVar; 3] = array::from_fn(|r| {
            let entropies: [GVar; 3] = array::from_fn(|t| {
                state.dist[r].project(&self.joint_to_margin[t]).entropy()
            });
            GVar::horzcat(&[&entropies[0], &entropies[1], &entropies[2]]) * rp[r]
        });

        let mut mat_size = GVar::zeros(n, 3);
        for (_, parts) in registry.levels() {
            for part in parts {
                if let Some(ms) = part.mat_size_contribution() {
                    mat_size = &mat_size + ms;
                }
            }
        }

        let complete_split: [[GVar; 3]; 3] = array::from_fn(|r| {
            array::from_fn(|t| {
                let mut acc = GVar::zeros(n, csd_size);
                for (i, &h) in self.part_handles[r].iter().enumerate() {
                    let w = state.dist[r].value()[i];
                    acc = &acc + &(registry.get(h).complete_split(t) * w);
                }
                acc
            })
        });

        let p_comp: [GVar; 3] = array::from_fn(|r| {
            let num = self.p_comp_numerator(state, registry, r);
            let den = complete_split[r][r].entropy()
                - state.dist[r].project(&self.joint_to_margin[r]).entropy();
            (num - den) * rp[r]
        });

        self.outputs = Some(StageOutputs {
            mat_size,
            num_block,
            hash_penalty_term,
            p_comp,
            complete_split,
        });
    }

    fn p_comp_numerator(&self, state: &StageState, registry: &PartRegistry, r: usize) -> GVar {
        let n = state.region_prop.num_input();
        let csd_size = csd_len(self.power);
        let mut res = GVar::scalar(n, 0.0);
        let mut weighted: Vec<GVar> = (0..=self.sum_col).map(|_| GVar::zeros(n, csd_size)).collect();
        let mut prob_sum = vec![0.0; self.sum_col + 1];
        let mut used = vec![false; self.sum_col + 1];

        for (i, &h) in self.part_handles[r].iter().enumerate() {
            let w = state.dist[r].value()[i];
            let part = registry.get(h);
            let shape = part.shape();
            if shape[r] == 0 {
                continue;
            }
            if shape.contains(&0) {
                res = res + part.complete_split(r).entropy() * w;
            } else {
                let idx = shape[r];
                weighted[idx] = &weighted[idx] + &(part.complete_split(r) * w);
                prob_sum[idx] += w;
                used[idx] = true;
            }
        }
        for idx in 1..=self.sum_col {
            if used[idx] {
                res = res + weighted[idx].normalized_entropy(prob_sum[idx]);
            }
        }
        res
    }

    /// KKT stationarity residuals for the root `dist_max` distributions;
    /// preserved for a dual-based solver, unused by feasibility.
    pub fn lagrange_constraints(&self) -> Vec<GVar> {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let mut ceq = Vec::with_capacity(3 * self.num_shape);
        for r in 0..3 {
            for (t, shape) in self.shapes.iter().enumerate() {
                let lam: [GVar; 3] =
                    array::from_fn(|d| state.lam_margin[r][d].get(shape[d]));
                let sum = &(&(&lam[0] + &lam[1]) + &lam[2]) + &state.lam_sum[r] - 1.0;
                ceq.push(sum.exp() - state.dist_max[r].get(t));
            }
        }
        ceq
    }

    pub fn mat_size(&self) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").mat_size
    }

    pub fn num_block(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").num_block[r]
    }

    pub fn hash_penalty_term(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").hash_penalty_term[r]
    }

    pub fn p_comp(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").p_comp[r]
    }

    pub fn complete_split(&self, r: usize, t: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").complete_split[r][t]
    }
}
