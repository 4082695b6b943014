use super::{csd_len, Identifier};
use crate::autograd::{GroupId, ParamManager};
use crate::GVar;
use fastmm_utils::{decode_csd, encode_csd, Shape};
use ndarray::{Array1, Array2};
use std::array;

/// How one slot of a complete split distribution is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsdEntry {
    /// Probability fixed at zero (digit sum incompatible with the shape).
    Zero,
    /// Probability fixed at one (the forced all-zeros split on the zero axis).
    One,
    /// Free probability; opposite-face entries share the same parameter.
    Param(GroupId),
}

/// A level >= 3 part whose shape has a zero entry. The zero axis forces the
/// trivial split, so instead of recursing this part directly parameterizes
/// its complete split distribution: one probability per feasible CSD on the
/// first nonzero axis, shared with the complementary CSD on the other.
#[derive(Debug)]
pub struct ZeroDimPart {
    pub level: usize,
    pub power: usize,
    pub part_id: usize,
    pub shape: Shape,
    pub identifier: Identifier,
    zero_dim: usize,
    nonzero_dim_1: usize,
    nonzero_dim_2: usize,
    base_mat_size: [f64; 3],
    entries: [Vec<CsdEntry>; 3],
    num_input: usize,

    pub part_frac: f64,
    complete_split: Option<[GVar; 3]>,
    mat_size_contribution: Option<GVar>,
}

impl ZeroDimPart {
    pub fn build(
        pm: &mut ParamManager,
        level: usize,
        part_id: usize,
        shape: Shape,
        identifier: Identifier,
    ) -> Self {
        assert!(level >= 3, "ZeroDimPart requires level >= 3");
        let power = 1usize << (level - 1);
        let csd_size = csd_len(power);

        let (zero_dim, nz1, nz2, base_mat_size) = if shape[0] == 0 {
            (0, 1, 2, [0.0, 0.0, 1.0])
        } else if shape[1] == 0 {
            (1, 0, 2, [1.0, 0.0, 0.0])
        } else {
            (2, 0, 1, [0.0, 1.0, 0.0])
        };

        let mut entries: [Vec<CsdEntry>; 3] = array::from_fn(|_| vec![CsdEntry::Zero; csd_size]);
        // the zero axis always splits as all zeros, CSD id 1
        entries[zero_dim][0] = CsdEntry::One;

        for csd_id in 1..=csd_size {
            let digits = decode_csd(csd_id, power);
            if digits.iter().sum::<u32>() as usize != shape[nz1] {
                continue;
            }
            let gid = pm.register(1, 0.0, 1.0, (0.0, 0.01));
            entries[nz1][csd_id - 1] = CsdEntry::Param(gid);
            let opposite: Vec<u32> = digits.iter().map(|&d| 2 - d).collect();
            entries[nz2][encode_csd(&opposite) - 1] = CsdEntry::Param(gid);
        }

        let lincon: Vec<(GroupId, Array2<f64>)> = entries[nz1]
            .iter()
            .filter_map(|e| match e {
                CsdEntry::Param(gid) => Some((*gid, Array2::ones((1, 1)))),
                _ => None,
            })
            .collect();
        if !lincon.is_empty() {
            pm.add_linear_constraint_eq(&lincon, &[1.0]);
        }

        Self {
            level,
            power,
            part_id,
            shape,
            identifier,
            zero_dim,
            nonzero_dim_1: nz1,
            nonzero_dim_2: nz2,
            base_mat_size,
            entries,
            num_input: 0,
            part_frac: 0.0,
            complete_split: None,
            mat_size_contribution: None,
        }
    }

    /// Spread the probability mass uniformly over the feasible CSDs.
    pub fn set_initial(&self, pm: &mut ParamManager) {
        let gids: Vec<GroupId> = self.entries[self.nonzero_dim_1]
            .iter()
            .filter_map(|e| match e {
                CsdEntry::Param(gid) => Some(*gid),
                _ => None,
            })
            .collect();
        if gids.is_empty() {
            return;
        }
        let uniform = 1.0 / gids.len() as f64;
        for gid in gids {
            pm.set_single_param(gid, &[uniform]);
        }
    }

    /// Materialize the three complete split distributions, wiring each free
    /// slot to its parameter's gradient column.
    pub fn evaluate_init(&mut self, pm: &ParamManager) {
        self.part_frac = 0.0;
        self.mat_size_contribution = None;
        self.num_input = pm.num_input();
        let csd_size = csd_len(self.power);

        self.complete_split = Some(array::from_fn(|t| {
            let mut cs = GVar::zeros(pm.num_input(), csd_size);
            for (i, entry) in self.entries[t].iter().enumerate() {
                match entry {
                    CsdEntry::Zero => {}
                    CsdEntry::One => cs.set_value(i, 1.0),
                    CsdEntry::Param(gid) => cs.set(i, &pm.get_param(*gid)),
                }
            }
            cs
        }));
    }

    /// Inner-product size: the entropy of the nonzero-axis CSD plus
    /// `ln(q)` per expected 1-digit, scaled by the reach probability and
    /// placed on the axis the zero dimension leaves free.
    pub fn evaluate_post(&mut self, q: f64) {
        let cs = self.complete_split.as_ref().expect("evaluate_init not run");
        let nz1 = &cs[self.nonzero_dim_1];

        let mut inner = nz1.entropy();
        for csd_id in 1..=csd_len(self.power) {
            let prob = nz1.value()[csd_id - 1];
            if prob > 0.0 {
                let ones = decode_csd(csd_id, self.power)
                    .iter()
                    .filter(|&&d| d == 1)
                    .count() as f64;
                inner = inner + prob * ones * q.ln();
            }
        }

        let base = GVar::constant(self.num_input, Array1::from_vec(self.base_mat_size.to_vec()));
        self.mat_size_contribution = Some(&(inner * self.part_frac) * &base);
    }

    pub fn complete_split(&self, t: usize) -> &GVar {
        &self.complete_split.as_ref().expect("evaluate_init not run")[t]
    }

    pub fn mat_size_contribution(&self) -> Option<&GVar> {
        self.mat_size_contribution.as_ref()
    }
}
