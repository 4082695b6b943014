use super::{csd_len, Identifier, PartHandle, PartRegistry};
use crate::autograd::{GroupId, ParamManager};
use crate::GVar;
use fastmm_utils::{joint_to_margin, prepare_splits, Projection, Shape, SplitOption};
use ndarray::Array2;
use std::array;

/// A level >= 3 part whose shape has no zero entry. Owns one distribution
/// over split options per hashing region (plus a `split_dist_max` copy that
/// must share every marginal), region proportions, and Lagrange-multiplier
/// placeholders; its two children per split are handles into the registry.
#[derive(Debug)]
pub struct SplitPart {
    pub level: usize,
    pub power: usize,
    pub sum_col: usize,
    pub sum_half: usize,
    pub part_id: usize,
    pub shape: Shape,
    pub identifier: Identifier,

    splits: Vec<SplitOption>,
    num_split: usize,
    joint_to_margin: [Projection; 3],
    lam_low: [usize; 3],
    lam_high: [usize; 3],

    left: [Vec<PartHandle>; 3],
    right: [Vec<PartHandle>; 3],

    split_dist_id: [GroupId; 3],
    split_dist_max_id: [GroupId; 3],
    region_prop_id: GroupId,
    lam_margin_id: [[GroupId; 3]; 3],
    lam_sum_id: [GroupId; 3],

    /// Accumulated reach probability; rebuilt by every top-down pass.
    pub part_frac: f64,
    state: Option<SplitState>,
    outputs: Option<SplitOutputs>,
}

#[derive(Debug)]
struct SplitState {
    region_prop: GVar,
    split_dist: [GVar; 3],
    split_dist_max: [GVar; 3],
    lam_margin: [[GVar; 3]; 3],
    lam_sum: [GVar; 3],
}

#[derive(Debug)]
struct SplitOutputs {
    hash_penalty_term: [GVar; 3],
    num_block_contribution: [GVar; 3],
    mat_size_contribution: GVar,
    complete_split_region: [[GVar; 3]; 3],
    complete_split: [GVar; 3],
    p_comp: [GVar; 3],
}

impl SplitPart {
    pub fn build(
        pm: &mut ParamManager,
        level: usize,
        part_id: usize,
        shape: Shape,
        identifier: Identifier,
    ) -> Self {
        assert!(level >= 3, "SplitPart requires level >= 3");
        let power = 1usize << (level - 1);
        let sum_col = 1usize << level;
        let sum_half = sum_col / 2;

        let splits = prepare_splits(shape);
        let num_split = splits.len();
        let lefts: Vec<Shape> = splits.iter().map(|s| s.left).collect();
        let jtm = joint_to_margin(&lefts, sum_half);

        let mut lam_low = [usize::MAX; 3];
        let mut lam_high = [0usize; 3];
        for s in &splits {
            for t in 0..3 {
                lam_low[t] = lam_low[t].min(s.left[t]);
                lam_high[t] = lam_high[t].max(s.left[t]);
            }
        }

        let inf = f64::INFINITY;
        let split_dist_id: [GroupId; 3];
        let split_dist_max_id: [GroupId; 3];
        {
            let mut sd = [0; 3];
            let mut sdm = [0; 3];
            for r in 0..3 {
                sd[r] = pm.register(num_split, 0.0, 1.0, (0.0, 1.0 / num_split as f64));
                sdm[r] = pm.register(num_split, 0.0, 1.0, (0.0, 1.0 / num_split as f64));
            }
            split_dist_id = sd;
            split_dist_max_id = sdm;
        }
        let region_prop_id = pm.register(3, 0.0, 1.0, (0.0, 1.0));
        let mut lam_margin_id = [[0; 3]; 3];
        let mut lam_sum_id = [0; 3];
        for r in 0..3 {
            for t in 0..3 {
                let lam_size = lam_high[t] - lam_low[t] + 1;
                lam_margin_id[r][t] = pm.register(lam_size, -inf, inf, (-0.01, 0.01));
            }
            lam_sum_id[r] = pm.register(1, -inf, inf, (-0.01, 0.01));
        }

        // split_dist sums to one, and shares every marginal with
        // split_dist_max
        for r in 0..3 {
            pm.add_linear_constraint_eq(
                &[(split_dist_id[r], Array2::ones((1, num_split)))],
                &[1.0],
            );
            for jtm_t in &jtm {
                let margin_size = jtm_t.out_len;
                let mut block = Array2::zeros((margin_size, num_split));
                for (i, &m) in jtm_t.targets.iter().enumerate() {
                    block[[m, i]] = 1.0;
                }
                pm.add_linear_constraint_eq(
                    &[
                        (split_dist_id[r], block.clone()),
                        (split_dist_max_id[r], -block),
                    ],
                    &vec![0.0; margin_size],
                );
            }
        }
        pm.add_linear_constraint_eq(&[(region_prop_id, Array2::ones((1, 3)))], &[1.0]);

        Self {
            level,
            power,
            sum_col,
            sum_half,
            part_id,
            shape,
            identifier,
            splits,
            num_split,
            joint_to_margin: jtm,
            lam_low,
            lam_high,
            left: [Vec::new(), Vec::new(), Vec::new()],
            right: [Vec::new(), Vec::new(), Vec::new()],
            split_dist_id,
            split_dist_max_id,
            region_prop_id,
            lam_margin_id,
            lam_sum_id,
            part_frac: 0.0,
            state: None,
            outputs: None,
        }
    }

    pub fn splits(&self) -> &[SplitOption] {
        &self.splits
    }

    pub fn num_split(&self) -> usize {
        self.num_split
    }

    pub fn set_children(&mut self, left: [Vec<PartHandle>; 3], right: [Vec<PartHandle>; 3]) {
        debug_assert!(left.iter().all(|v| v.len() == self.num_split));
        debug_assert!(right.iter().all(|v| v.len() == self.num_split));
        self.left = left;
        self.right = right;
    }

    pub fn children(&self, region: usize, split: usize) -> (PartHandle, PartHandle) {
        (self.left[region][split], self.right[region][split])
    }

    /// Seed split distributions from `(shape, dist)` records by exact shape
    /// match; an absent shape falls back to the uniform distribution.
    pub fn set_initial(&self, pm: &mut ParamManager, seeds: &[(Shape, Vec<f64>)]) {
        pm.set_single_param(self.region_prop_id, &[1.0 / 3.0; 3]);

        if let Some((_, dist)) = seeds.iter().find(|(s, _)| *s == self.shape) {
            for r in 0..3 {
                pm.set_single_param(self.split_dist_id[r], dist);
                pm.set_single_param(self.split_dist_max_id[r], dist);
            }
            for r in 0..3 {
                pm.set_single_param(self.lam_sum_id[r], &[0.0]);
                for t in 0..3 {
                    let lam_size = self.lam_high[t] - self.lam_low[t] + 1;
                    pm.set_single_param(self.lam_margin_id[r][t], &vec![0.0; lam_size]);
                }
            }
            return;
        }

        eprintln!(
            "[WARN] No initial distribution for shape {:?}, using uniform",
            self.shape
        );
        let uniform = vec![1.0 / self.num_split as f64; self.num_split];
        for r in 0..3 {
            pm.set_single_param(self.split_dist_id[r], &uniform);
            pm.set_single_param(self.split_dist_max_id[r], &uniform);
        }
    }

    pub fn evaluate_init(&mut self, pm: &ParamManager) {
        self.part_frac = 0.0;
        self.outputs = None;
        self.state = Some(SplitState {
            region_prop: pm.get_param(self.region_prop_id),
            split_dist: array::from_fn(|r| pm.get_param(self.split_dist_id[r])),
            split_dist_max: array::from_fn(|r| pm.get_param(self.split_dist_max_id[r])),
            lam_margin: array::from_fn(|r| {
                array::from_fn(|t| pm.get_param(self.lam_margin_id[r][t]))
            }),
            lam_sum: array::from_fn(|r| pm.get_param(self.lam_sum_id[r])),
        });
    }

    /// Top-down propagation: each split hands the reach probability, scaled
    /// by its probability and region proportion, to both children.
    pub fn pre_contributions(&self) -> Vec<(PartHandle, f64)> {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let rp = state.region_prop.value();
        let mut out = Vec::with_capacity(6 * self.num_split);
        for i in 0..self.num_split {
            for r in 0..3 {
                let f = self.part_frac * state.split_dist[r].value()[i] * rp[r];
                out.push((self.left[r][i], f));
                out.push((self.right[r][i], f));
            }
        }
        out
    }

    /// Bottom-up: combine the children's complete splits into this part's,
    /// and compute the penalty, block-count and decoding terms.
    pub fn evaluate_post(&mut self, registry: &PartRegistry) {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let n = state.region_prop.num_input();
        let rp = state.region_prop.value().to_vec();
        let frac = self.part_frac;
        let csd_size = csd_len(self.power);

        let hash_penalty_term: [GVar; 3] = array::from_fn(|r| {
            (state.split_dist_max[r].entropy() - state.split_dist[r].entropy()) * (frac * rp[r])
        });

        let num_block_contribution: [GVar; 3] = array::from_fn(|r| {
            let margins: [GVar; 3] =
                array::from_fn(|t| state.split_dist[r].project(&self.joint_to_margin[t]));
            let entropies: [GVar; 3] = array::from_fn(|t| margins[t].entropy());
            GVar::horzcat(&[&entropies[0], &entropies[1], &entropies[2]]) * (frac * rp[r])
        });

        let complete_split_region: [[GVar; 3]; 3] = array::from_fn(|r| {
            array::from_fn(|t| {
                let mut acc = GVar::zeros(n, csd_size);
                for i in 0..self.num_split {
                    let w = state.split_dist[r].value()[i];
                    let lhs = registry.get(self.left[r][i]).complete_split(t);
                    let rhs = registry.get(self.right[r][i]).complete_split(t);
                    acc = acc + lhs.kron(rhs) * w;
                }
                acc
            })
        });

        let complete_split: [GVar; 3] = array::from_fn(|t| {
            &(&complete_split_region[0][t] * rp[0]) + &(&complete_split_region[1][t] * rp[1])
                + &complete_split_region[2][t] * rp[2]
        });

        let p_comp: [GVar; 3] = array::from_fn(|r| {
            let num = self.p_comp_numerator(state, registry, r);
            let den = complete_split_region[r][r].entropy()
                - state.split_dist[r].project(&self.joint_to_margin[r]).entropy();
            (num - den) * (frac * rp[r])
        });

        self.outputs = Some(SplitOutputs {
            hash_penalty_term,
            num_block_contribution,
            mat_size_contribution: GVar::zeros(n, 3),
            complete_split_region,
            complete_split,
            p_comp,
        });
    }

    /// Expected number of compatible components in region `r`: children
    /// with a zero dimension contribute their entropy directly; the rest
    /// are bucketed by their shape entry on axis `r` and contribute the
    /// normalized entropy of the bucket's average split distribution.
    fn p_comp_numerator(&self, state: &SplitState, registry: &PartRegistry, r: usize) -> GVar {
        let n = state.region_prop.num_input();
        let child_csd = csd_len(self.power / 2);
        let mut res = GVar::scalar(n, 0.0);
        let mut weighted: Vec<GVar> = (0..=self.sum_half).map(|_| GVar::zeros(n, child_csd)).collect();
        let mut prob_sum = vec![0.0; self.sum_half + 1];
        let mut used = vec![false; self.sum_half + 1];

        for i in 0..self.num_split {
            let w = state.split_dist[r].value()[i];
            for h in [self.left[r][i], self.right[r][i]] {
                let child = registry.get(h);
                let shape = child.shape();
                if shape[r] == 0 {
                    continue;
                }
                if shape.contains(&0) {
                    res = res + child.complete_split(r).entropy() * w;
                } else {
                    let idx = shape[r];
                    weighted[idx] = &weighted[idx] + &(child.complete_split(r) * w);
                    prob_sum[idx] += w;
                    used[idx] = true;
                }
            }
        }
        for idx in 1..=self.sum_half {
            if used[idx] {
                res = res + weighted[idx].normalized_entropy(prob_sum[idx]);
            }
        }
        res
    }

    /// KKT stationarity residuals tying `split_dist_max` to its
    /// exponential-family form. Produced for a dual-based solver; the
    /// feasibility pipeline does not consume them.
    pub fn lagrange_constraints(&self) -> Vec<GVar> {
        let state = self.state.as_ref().expect("evaluate_init not run");
        let mut ceq = Vec::with_capacity(3 * self.num_split);
        for r in 0..3 {
            for (t, s) in self.splits.iter().enumerate() {
                let lam: [GVar; 3] = array::from_fn(|d| {
                    state.lam_margin[r][d].get(s.left[d] - self.lam_low[d])
                });
                let sum = &(&(&lam[0] + &lam[1]) + &lam[2]) + &state.lam_sum[r] - 1.0;
                ceq.push(sum.exp() - state.split_dist_max[r].get(t));
            }
        }
        ceq
    }

    pub fn complete_split(&self, t: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").complete_split[t]
    }

    pub fn complete_split_region(&self, r: usize, t: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").complete_split_region[r][t]
    }

    pub fn mat_size_contribution(&self) -> Option<&GVar> {
        self.outputs.as_ref().map(|o| &o.mat_size_contribution)
    }

    pub fn num_block_contribution(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").num_block_contribution[r]
    }

    pub fn hash_penalty_term(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").hash_penalty_term[r]
    }

    pub fn p_comp(&self, r: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").p_comp[r]
    }
}
