/// Residual tensor dimensions `(i, j, k)` at one recursion node.
pub type Shape = [usize; 3];

/// One admissible way to split a shape into two half-sum children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOption {
    pub left: Shape,
    pub right: Shape,
}

/// All shapes `(i, j, k)` with `i + j + k == 2^level`, in lexicographic order.
pub fn prepare_shapes(level: usize) -> Vec<Shape> {
    let sum_col = 1usize << level;
    let mut shapes = Vec::new();
    for i in 0..=sum_col {
        for j in 0..=(sum_col - i) {
            shapes.push([i, j, sum_col - i - j]);
        }
    }
    shapes
}

/// All ways to split `shape` into two children each summing to half of
/// `shape`'s total, with every component bounded by the parent's.
pub fn prepare_splits(shape: Shape) -> Vec<SplitOption> {
    let sum_col: usize = shape.iter().sum();
    let sum_half = sum_col / 2;
    let mut splits = Vec::new();
    for i in 0..=sum_half.min(shape[0]) {
        for j in 0..=(sum_half - i).min(shape[1]) {
            let k = sum_half - i - j;
            if k > shape[2] {
                continue;
            }
            splits.push(SplitOption {
                left: [i, j, k],
                right: [shape[0] - i, shape[1] - j, shape[2] - k],
            });
        }
    }
    splits
}

/// Projection from a joint distribution over `support` onto the marginal of
/// one coordinate axis. Every support point maps to exactly one marginal
/// bin, so a target index per point replaces the 0/1 projection matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub targets: Vec<usize>,
    pub out_len: usize,
}

impl Projection {
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.targets.len());
        let mut out = vec![0.0; self.out_len];
        for (&t, &v) in self.targets.iter().zip(x) {
            out[t] += v;
        }
        out
    }
}

/// Per-axis joint-to-marginal projections for a distribution supported on
/// `support`, with marginal bins `0..=sum_col`.
pub fn joint_to_margin(support: &[Shape], sum_col: usize) -> [Projection; 3] {
    [0, 1, 2].map(|dim| Projection {
        targets: support.iter().map(|s| s[dim]).collect(),
        out_len: sum_col + 1,
    })
}
