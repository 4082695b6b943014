//! Forward-mode differentiable values.
//!
//! A `GVar` pairs a dense value vector of length `n` with a sparse Jacobian
//! of shape `num_input x n` against one global parameter vector. Column `j`
//! of the Jacobian is the gradient of `value[j]`; every operator preserves
//! this correspondence by the exact chain rule, except for the documented
//! approximations in `div`, `entropy` and `normalized_entropy`.

use fastmm_utils::{Projection, SparseMat, SparseVec};
use ndarray::Array1;
use std::ops::{Add, Div, Mul, Sub};

#[derive(Debug, Clone)]
pub struct GVar {
    num_input: usize,
    value: Array1<f64>,
    grad: SparseMat,
}

impl GVar {
    pub fn new(num_input: usize, value: Array1<f64>, grad: SparseMat) -> Self {
        assert_eq!(grad.nrows(), num_input);
        assert_eq!(grad.ncols(), value.len());
        Self {
            num_input,
            value,
            grad,
        }
    }

    /// A value with no dependence on the parameter vector.
    pub fn constant(num_input: usize, value: Array1<f64>) -> Self {
        let n = value.len();
        Self::new(num_input, value, SparseMat::zeros(num_input, n))
    }

    pub fn scalar(num_input: usize, v: f64) -> Self {
        Self::constant(num_input, Array1::from_elem(1, v))
    }

    pub fn zeros(num_input: usize, n: usize) -> Self {
        Self::constant(num_input, Array1::zeros(n))
    }

    /// A view of a contiguous parameter slice: `d value[i] / d x[start + i] = 1`.
    pub fn param_view(num_input: usize, value: Array1<f64>, start: usize) -> Self {
        let n = value.len();
        Self::new(
            num_input,
            value,
            SparseMat::identity_block(num_input, start, n),
        )
    }

    pub fn num_input(&self) -> usize {
        self.num_input
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn value(&self) -> &Array1<f64> {
        &self.value
    }

    pub fn grad(&self) -> &SparseMat {
        &self.grad
    }

    pub fn to_scalar(&self) -> f64 {
        assert_eq!(self.len(), 1, "GVar is not a scalar");
        self.value[0]
    }

    /// Length-1 view of entry `i`, gradient column included.
    pub fn get(&self, i: usize) -> GVar {
        Self::new(
            self.num_input,
            Array1::from_elem(1, self.value[i]),
            SparseMat::from_cols(self.num_input, vec![self.grad.col(i).clone()]),
        )
    }

    /// Replace entry `i` with a length-1 value, gradient column included.
    pub fn set(&mut self, i: usize, v: &GVar) {
        assert_eq!(v.len(), 1);
        self.value[i] = v.value[0];
        self.grad.set_col(i, v.grad.col(0).clone());
    }

    /// Replace entry `i` with a plain value, zeroing its gradient column.
    pub fn set_value(&mut self, i: usize, v: f64) {
        self.value[i] = v;
        self.grad.set_col(i, SparseVec::new());
    }

    pub fn horzcat(parts: &[&GVar]) -> GVar {
        assert!(!parts.is_empty());
        let num_input = parts[0].num_input;
        let mut value = Vec::new();
        for p in parts {
            assert_eq!(p.num_input, num_input);
            value.extend(p.value.iter().copied());
        }
        let grads: Vec<&SparseMat> = parts.iter().map(|p| &p.grad).collect();
        Self::new(
            num_input,
            Array1::from_vec(value),
            SparseMat::hstack(&grads),
        )
    }

    fn add_impl(&self, other: &GVar, sign: f64) -> GVar {
        assert_eq!(self.num_input, other.num_input);
        assert_eq!(self.len(), other.len(), "GVar length mismatch");
        let value = if sign > 0.0 {
            &self.value + &other.value
        } else {
            &self.value - &other.value
        };
        let grad = if sign > 0.0 {
            self.grad.add(&other.grad)
        } else {
            self.grad.sub(&other.grad)
        };
        Self::new(self.num_input, value, grad)
    }

    fn mul_impl(&self, other: &GVar) -> GVar {
        assert_eq!(self.num_input, other.num_input);
        let (n1, n2) = (self.len(), other.len());
        if n1 == n2 {
            let value = &self.value * &other.value;
            let grad = self
                .grad
                .scale_cols(other.value.as_slice().unwrap())
                .add(&other.grad.scale_cols(self.value.as_slice().unwrap()));
            Self::new(self.num_input, value, grad)
        } else if n2 == 1 {
            // broadcast the scalar operand
            let s = other.value[0];
            let value = &self.value * s;
            let mut cols = Vec::with_capacity(n1);
            for j in 0..n1 {
                let mut c = self.grad.col(j).scaled(s);
                c.axpy(self.value[j], other.grad.col(0));
                cols.push(c);
            }
            Self::new(self.num_input, value, SparseMat::from_cols(self.num_input, cols))
        } else if n1 == 1 {
            other.mul_impl(self)
        } else {
            panic!("GVar length mismatch: {} vs {}", n1, n2);
        }
    }

    /// Elementwise division with the near-zero denominator clamped to
    /// `±eps`, both in the value and in the squared-denominator gradient
    /// term. A documented inaccuracy for |denominator| < eps.
    fn div_impl(&self, other: &GVar) -> GVar {
        assert_eq!(self.num_input, other.num_input);
        let (n1, n2) = (self.len(), other.len());
        assert!(n1 == n2 || n2 == 1, "GVar length mismatch: {} vs {}", n1, n2);
        let eps = f64::EPSILON;
        let mut cols = Vec::with_capacity(n1);
        let mut value = Array1::zeros(n1);
        for j in 0..n1 {
            let a = self.value[j];
            let d = other.value[if n2 == 1 { 0 } else { j }];
            let safe = if d.abs() < eps {
                if d < 0.0 {
                    -eps
                } else {
                    eps
                }
            } else {
                d
            };
            let safe_sq = (d * d).max(eps * eps);
            value[j] = a / safe;
            // (a' d - d' a) / d^2
            let mut c = self.grad.col(j).scaled(d / safe_sq);
            c.axpy(-a / safe_sq, other.grad.col(if n2 == 1 { 0 } else { j }));
            cols.push(c);
        }
        Self::new(self.num_input, value, SparseMat::from_cols(self.num_input, cols))
    }

    pub fn exp(&self) -> GVar {
        let value = self.value.mapv(f64::exp);
        let grad = self.grad.scale_cols(value.as_slice().unwrap());
        Self::new(self.num_input, value, grad)
    }

    /// `Σ -v_i ln(v_i)`, as a length-1 result.
    ///
    /// The value is exact even at zero (the 0 ln 0 = 0 limit is taken by
    /// substituting 1 for non-positive entries); the gradient coefficient
    /// `-ln(max(v_i, eps)) - 1` floors at eps, so it stays finite and
    /// bounded near zero at the price of accuracy there.
    pub fn entropy(&self) -> GVar {
        let eps = f64::EPSILON;
        let mut val = 0.0;
        for &v in &self.value {
            if v > 0.0 {
                val -= v * v.ln();
            }
        }
        let coeff: Vec<f64> = self.value.iter().map(|&v| -v.max(eps).ln() - 1.0).collect();
        let g = self.grad.combine_cols(&coeff);
        Self::new(
            self.num_input,
            Array1::from_elem(1, val),
            SparseMat::from_cols(self.num_input, vec![g]),
        )
    }

    /// `Σ -v_i ln(v_i / p)` where `p` is expected to equal `Σ v_i`.
    ///
    /// At `p <= 0` the function is not differentiable (all components are
    /// forced to zero); the value is 0 and the returned gradient,
    /// `(Σ grad columns) * ln(n)`, deliberately overestimates so that an
    /// optimizer is pushed away from the degenerate point.
    pub fn normalized_entropy(&self, p: f64) -> GVar {
        let eps = f64::EPSILON;
        if p <= 0.0 {
            let n = self.len() as f64;
            let g = self.grad.sum_cols().scaled(n.ln());
            return Self::new(
                self.num_input,
                Array1::from_elem(1, 0.0),
                SparseMat::from_cols(self.num_input, vec![g]),
            );
        }
        let mut val = 0.0;
        let mut coeff = Vec::with_capacity(self.len());
        for &v in &self.value {
            let ratio = v / p;
            if v > 0.0 {
                val -= v * ratio.ln();
            }
            coeff.push(-ratio.max(eps).ln());
        }
        let g = self.grad.combine_cols(&coeff);
        Self::new(
            self.num_input,
            Array1::from_elem(1, val),
            SparseMat::from_cols(self.num_input, vec![g]),
        )
    }

    /// Kronecker-product concatenation of two distributions: the value is
    /// `kron(v1, v2)` and the gradient follows the product rule column by
    /// column, preserving the `i * n2 + j` ordering.
    pub fn kron(&self, other: &GVar) -> GVar {
        assert_eq!(self.num_input, other.num_input);
        let (n1, n2) = (self.len(), other.len());
        let mut value = Array1::zeros(n1 * n2);
        let mut cols = Vec::with_capacity(n1 * n2);
        for i in 0..n1 {
            for j in 0..n2 {
                value[i * n2 + j] = self.value[i] * other.value[j];
                let mut c = self.grad.col(i).scaled(other.value[j]);
                c.axpy(self.value[i], other.grad.col(j));
                cols.push(c);
            }
        }
        Self::new(self.num_input, value, SparseMat::from_cols(self.num_input, cols))
    }

    /// Marginalize through a joint-to-marginal projection.
    pub fn project(&self, p: &Projection) -> GVar {
        assert_eq!(self.len(), p.targets.len());
        let value = Array1::from_vec(p.apply(self.value.as_slice().unwrap()));
        let grad = self.grad.project(&p.targets, p.out_len);
        Self::new(self.num_input, value, grad)
    }

    /// Cyclic left-rotation of a length-3 value, gradient columns included.
    pub fn rot3(&self, n: usize) -> GVar {
        assert_eq!(self.len(), 3);
        let n = n % 3;
        let idx = [n, (n + 1) % 3, (n + 2) % 3];
        let value = Array1::from_vec(idx.iter().map(|&i| self.value[i]).collect());
        let grad = self.grad.select_cols(&idx);
        Self::new(self.num_input, value, grad)
    }
}

impl Add<&GVar> for &GVar {
    type Output = GVar;
    fn add(self, rhs: &GVar) -> GVar {
        self.add_impl(rhs, 1.0)
    }
}

impl Add for GVar {
    type Output = GVar;
    fn add(self, rhs: GVar) -> GVar {
        self.add_impl(&rhs, 1.0)
    }
}

impl Add<f64> for &GVar {
    type Output = GVar;
    fn add(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value + rhs, self.grad.clone())
    }
}

impl Add<f64> for GVar {
    type Output = GVar;
    fn add(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value + rhs, self.grad)
    }
}

impl Sub<&GVar> for &GVar {
    type Output = GVar;
    fn sub(self, rhs: &GVar) -> GVar {
        self.add_impl(rhs, -1.0)
    }
}

impl Sub for GVar {
    type Output = GVar;
    fn sub(self, rhs: GVar) -> GVar {
        self.add_impl(&rhs, -1.0)
    }
}

impl Sub<f64> for &GVar {
    type Output = GVar;
    fn sub(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value - rhs, self.grad.clone())
    }
}

impl Sub<f64> for GVar {
    type Output = GVar;
    fn sub(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value - rhs, self.grad)
    }
}

impl Mul<&GVar> for &GVar {
    type Output = GVar;
    fn mul(self, rhs: &GVar) -> GVar {
        self.mul_impl(rhs)
    }
}

impl Mul for GVar {
    type Output = GVar;
    fn mul(self, rhs: GVar) -> GVar {
        self.mul_impl(&rhs)
    }
}

impl Mul<f64> for &GVar {
    type Output = GVar;
    fn mul(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value * rhs, self.grad.scale(rhs))
    }
}

impl Mul<f64> for GVar {
    type Output = GVar;
    fn mul(self, rhs: f64) -> GVar {
        GVar::new(self.num_input, &self.value * rhs, self.grad.scale(rhs))
    }
}

impl Div<&GVar> for &GVar {
    type Output = GVar;
    fn div(self, rhs: &GVar) -> GVar {
        self.div_impl(rhs)
    }
}

impl Div for GVar {
    type Output = GVar;
    fn div(self, rhs: GVar) -> GVar {
        self.div_impl(&rhs)
    }
}

impl Div<f64> for &GVar {
    type Output = GVar;
    fn div(self, rhs: f64) -> GVar {
        self.div_impl(&GVar::scalar(self.num_input, rhs))
    }
}

impl Div<f64> for GVar {
    type Output = GVar;
    fn div(self, rhs: f64) -> GVar {
        self.div_impl(&GVar::scalar(self.num_input, rhs))
    }
}
