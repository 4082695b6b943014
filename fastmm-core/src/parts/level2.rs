use super::Identifier;
use crate::autograd::{GroupId, ParamManager};
use crate::GVar;
use fastmm_utils::{encode_csd, rot3, rot3c, Shape};
use ndarray::Array1;
use std::array;

/// Canonical level-2 shape classes, up to cyclic rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    /// `(1,1,2)`: the laser-method constituent with one split parameter.
    C112,
    /// `(0,2,2)`: a pure inner-product tensor with one split parameter.
    C022,
    /// `(0,1,3)`: fixed inner-product tensor.
    C013,
    /// `(0,3,1)`: fixed inner-product tensor.
    C031,
    /// `(0,0,4)`: a single scalar block.
    C004,
}

impl ShapeClass {
    fn canonical(self) -> Shape {
        match self {
            ShapeClass::C112 => [1, 1, 2],
            ShapeClass::C022 => [0, 2, 2],
            ShapeClass::C013 => [0, 1, 3],
            ShapeClass::C031 => [0, 3, 1],
            ShapeClass::C004 => [0, 0, 4],
        }
    }

    fn classify(shape: Shape) -> Self {
        let max = *shape.iter().max().unwrap();
        let min = *shape.iter().min().unwrap();
        if max == 2 && min == 0 {
            ShapeClass::C022
        } else if max == 2 {
            ShapeClass::C112
        } else if max == 3 {
            if matches!(shape, [0, 1, 3] | [1, 3, 0] | [3, 0, 1]) {
                ShapeClass::C013
            } else {
                ShapeClass::C031
            }
        } else {
            ShapeClass::C004
        }
    }
}

/// Level-2 parts skip recursion entirely: the five shape classes have
/// closed-form contributions, expressed in the canonical orientation and
/// rotated back into place. Only `112` and `022` carry a parameter, the
/// probability of splitting the doubled axis as 0+2 (or 2+0) instead of
/// 1+1.
#[derive(Debug)]
pub struct Level2Part {
    pub level: usize,
    pub power: usize,
    pub part_id: usize,
    pub shape: Shape,
    pub identifier: Identifier,
    pub class: ShapeClass,
    /// Left rotations that map canonical outputs back to `shape`'s
    /// orientation.
    rotate_num: usize,

    split_0_id: Option<GroupId>,
    split_0: Option<GVar>,
    num_input: usize,

    pub part_frac: f64,
    outputs: Option<Level2Outputs>,
}

#[derive(Debug)]
struct Level2Outputs {
    mat_size_contribution: GVar,
    num_block_contribution: GVar,
    complete_split: [GVar; 3],
}

impl Level2Part {
    pub fn build(pm: &mut ParamManager, part_id: usize, shape: Shape, identifier: Identifier) -> Self {
        let class = ShapeClass::classify(shape);
        let standard = class.canonical();

        // count right rotations from shape to canonical; outputs are then
        // left-rotated by the same amount
        let mut rotate_num = 0;
        let mut cur = shape;
        while cur != standard && rotate_num < 3 {
            cur = [cur[2], cur[0], cur[1]];
            rotate_num += 1;
        }

        let split_0_id = match class {
            ShapeClass::C112 | ShapeClass::C022 => {
                Some(pm.register(1, 0.0, 0.5, (0.0, 0.01)))
            }
            _ => None,
        };

        Self {
            level: 2,
            power: 2,
            part_id,
            shape,
            identifier,
            class,
            rotate_num,
            split_0_id,
            split_0: None,
            num_input: 0,
            part_frac: 0.0,
            outputs: None,
        }
    }

    pub fn set_initial(&self, pm: &mut ParamManager, split_0: f64) {
        if let Some(id) = self.split_0_id {
            pm.set_single_param(id, &[split_0]);
        }
    }

    pub fn evaluate_init(&mut self, pm: &ParamManager) {
        self.part_frac = 0.0;
        self.outputs = None;
        self.num_input = pm.num_input();
        self.split_0 = self.split_0_id.map(|id| pm.get_param(id));
    }

    pub fn evaluate_post(&mut self, q: f64) {
        let n = self.num_input;
        // contributions use parameter values only; the closed forms are
        // treated as constants by the gradient pipeline
        let s = self.split_0.as_ref().map(|g| g.value()[0]).unwrap_or(0.0);

        let mut cs: [Array1<f64>; 3] = array::from_fn(|_| Array1::zeros(9));
        let num_block;
        let mat_size;

        match self.class {
            ShapeClass::C022 => {
                num_block = [0.0, 0.0, 0.0];
                let h = entropy2(&[s, s, 1.0 - 2.0 * s]);
                mat_size = [0.0, 0.0, h + 2.0 * q.ln() * (1.0 - 2.0 * s)];
                cs[0][idx(&[0, 0])] = 1.0;
                cs[1][idx(&[0, 2])] = s;
                cs[1][idx(&[2, 0])] = s;
                cs[1][idx(&[1, 1])] = 1.0 - 2.0 * s;
                cs[2] = cs[1].clone();
            }
            ShapeClass::C112 => {
                let h = entropy2(&[s, s, 1.0 - 2.0 * s]);
                num_block = [2f64.ln(), 2f64.ln(), h];
                mat_size = [
                    (1.0 - 2.0 * s) * q.ln(),
                    2.0 * s * q.ln(),
                    (1.0 - 2.0 * s) * q.ln(),
                ];
                cs[0][idx(&[0, 1])] = 0.5;
                cs[0][idx(&[1, 0])] = 0.5;
                cs[1] = cs[0].clone();
                cs[2][idx(&[0, 2])] = s;
                cs[2][idx(&[2, 0])] = s;
                cs[2][idx(&[1, 1])] = 1.0 - 2.0 * s;
            }
            ShapeClass::C013 | ShapeClass::C031 => {
                num_block = [0.0, 0.0, 0.0];
                mat_size = [0.0, 0.0, 2f64.ln() + q.ln()];
                cs[0][idx(&[0, 0])] = 1.0;
                let (lo, hi) = if self.class == ShapeClass::C013 {
                    (1, 2)
                } else {
                    (2, 1)
                };
                cs[lo][idx(&[0, 1])] = 0.5;
                cs[lo][idx(&[1, 0])] = 0.5;
                cs[hi][idx(&[1, 2])] = 0.5;
                cs[hi][idx(&[2, 1])] = 0.5;
            }
            ShapeClass::C004 => {
                num_block = [0.0, 0.0, 0.0];
                mat_size = [0.0, 0.0, 0.0];
                cs[0][idx(&[0, 0])] = 1.0;
                cs[1][idx(&[0, 0])] = 1.0;
                cs[2][idx(&[2, 2])] = 1.0;
            }
        }

        let frac = self.part_frac;
        let num_block = rot3(num_block, self.rotate_num);
        let mat_size = rot3(mat_size, self.rotate_num);
        let complete_split = rot3c(
            cs.map(|v| GVar::constant(n, v)),
            self.rotate_num,
        );

        self.outputs = Some(Level2Outputs {
            num_block_contribution: GVar::constant(
                n,
                Array1::from_vec(num_block.iter().map(|v| v * frac).collect()),
            ),
            mat_size_contribution: GVar::constant(
                n,
                Array1::from_vec(mat_size.iter().map(|v| v * frac).collect()),
            ),
            complete_split,
        });
    }

    pub fn complete_split(&self, t: usize) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").complete_split[t]
    }

    pub fn mat_size_contribution(&self) -> Option<&GVar> {
        self.outputs.as_ref().map(|o| &o.mat_size_contribution)
    }

    pub fn num_block_contribution(&self) -> &GVar {
        &self.outputs.as_ref().expect("evaluate_post not run").num_block_contribution
    }
}

/// Zero-based vector index of a two-digit CSD.
fn idx(digits: &[u32]) -> usize {
    encode_csd(digits) - 1
}

/// Base-2 entropy over the positive entries.
fn entropy2(dist: &[f64]) -> f64 {
    dist.iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.log2())
        .sum()
}
