//! The single flat parameter vector behind every differentiable value.
//!
//! Registration tiles groups onto one `cur_x` vector; every group owns a
//! contiguous slice, bounds and a uniform initializer range. Linear
//! constraints are accumulated as sparse rows against the same tiling. All
//! state lives here, owned by the workspace that created it.

use crate::GVar;
use anyhow::{anyhow, Result};
use fastmm_utils::{RowMatrix, SparseVec};
use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;

/// One contiguous slice of the parameter vector.
#[derive(Debug, Clone, Copy)]
pub struct ParamGroup {
    pub start: usize,
    pub size: usize,
    /// (low, high) range for uniform random initialization.
    pub init: (f64, f64),
}

/// Identifies a registered group; returned by [`ParamManager::register`].
pub type GroupId = usize;

#[derive(Debug, Clone, Default)]
pub struct ParamManager {
    groups: Vec<ParamGroup>,
    cur_x: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    lin_a: Vec<SparseVec>,
    lin_b: Vec<f64>,
    lin_aeq: Vec<SparseVec>,
    lin_beq: Vec<f64>,
}

impl ParamManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of scalar parameters registered so far.
    pub fn num_input(&self) -> usize {
        self.cur_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cur_x.is_empty()
    }

    pub fn cur_x(&self) -> &[f64] {
        &self.cur_x
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    pub fn start_of(&self, id: GroupId) -> usize {
        self.groups[id].start
    }

    /// Append a group of `size` parameters with uniform bounds, returning
    /// its id. Values start at zero until set or randomly initialized.
    pub fn register(&mut self, size: usize, lower: f64, upper: f64, init: (f64, f64)) -> GroupId {
        let start = self.cur_x.len();
        self.cur_x.resize(start + size, 0.0);
        self.lower.resize(start + size, lower);
        self.upper.resize(start + size, upper);
        self.groups.push(ParamGroup { start, size, init });
        self.groups.len() - 1
    }

    /// The group's current values as a differentiable view: entry `i`
    /// depends on parameter `start + i` with unit gradient.
    pub fn get_param(&self, id: GroupId) -> GVar {
        let g = self.groups[id];
        let value = Array1::from_vec(self.cur_x[g.start..g.start + g.size].to_vec());
        GVar::param_view(self.num_input(), value, g.start)
    }

    /// Replace the whole parameter vector, clipping to bounds. Silent
    /// clipping is deliberate; a length mismatch is not.
    pub fn set_value(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.cur_x.len() {
            return Err(anyhow!(
                "Parameter vector length mismatch: got {}, expected {}",
                x.len(),
                self.cur_x.len()
            ));
        }
        for (i, &v) in x.iter().enumerate() {
            self.cur_x[i] = v.clamp(self.lower[i], self.upper[i]);
        }
        Ok(())
    }

    /// Overwrite one group's values. A length mismatch is tolerated with a
    /// warning: short inputs are padded by replicating the first value,
    /// long inputs truncated.
    pub fn set_single_param(&mut self, id: GroupId, values: &[f64]) {
        let g = self.groups[id];
        if values.len() != g.size {
            eprintln!(
                "[WARN] set_single_param: group {} expects {} values, got {}",
                id,
                g.size,
                values.len()
            );
        }
        let pad = values.first().copied().unwrap_or(0.0);
        for i in 0..g.size {
            self.cur_x[g.start + i] = values.get(i).copied().unwrap_or(pad);
        }
    }

    /// Draw every parameter uniformly from its group's `(low, high)` range.
    pub fn random_init<R: Rng>(&mut self, rng: &mut R) {
        for g in &self.groups {
            let (low, high) = g.init;
            for i in g.start..g.start + g.size {
                self.cur_x[i] = low + (high - low) * rng.gen::<f64>();
            }
        }
    }

    /// Add centered Gaussian noise of standard deviation `size` to every
    /// parameter, clipped to bounds.
    pub fn perturb<R: Rng>(&mut self, rng: &mut R, size: f64) -> Result<()> {
        let normal = Normal::new(0.0, size)
            .map_err(|e| anyhow!("Invalid perturbation size {}: {}", size, e))?;
        for i in 0..self.cur_x.len() {
            let v = self.cur_x[i] + normal.sample(rng);
            self.cur_x[i] = v.clamp(self.lower[i], self.upper[i]);
        }
        Ok(())
    }

    /// Add linear inequality rows `A x <= b`. Each entry scatters a dense
    /// coefficient block onto one group's slice; blocks from different
    /// entries land on the same rows.
    pub fn add_linear_constraint(&mut self, entries: &[(GroupId, Array2<f64>)], rhs: &[f64]) {
        let rows = self.build_rows(entries, rhs.len());
        self.lin_a.extend(rows);
        self.lin_b.extend_from_slice(rhs);
    }

    /// Add linear equality rows `A x == b`.
    pub fn add_linear_constraint_eq(&mut self, entries: &[(GroupId, Array2<f64>)], rhs: &[f64]) {
        let rows = self.build_rows(entries, rhs.len());
        self.lin_aeq.extend(rows);
        self.lin_beq.extend_from_slice(rhs);
    }

    fn build_rows(&self, entries: &[(GroupId, Array2<f64>)], nrows: usize) -> Vec<SparseVec> {
        let mut rows = vec![Vec::new(); nrows];
        for (id, block) in entries {
            let g = self.groups[*id];
            assert_eq!(block.nrows(), nrows);
            assert_eq!(block.ncols(), g.size);
            for r in 0..nrows {
                for c in 0..g.size {
                    let v = block[[r, c]];
                    if v != 0.0 {
                        rows[r].push((g.start + c, v));
                    }
                }
            }
        }
        rows.into_iter().map(SparseVec::from_entries).collect()
    }

    /// The accumulated linear systems, widened to the final parameter count
    /// and with structurally empty rows dropped. Rows whose coefficients
    /// cancel numerically are kept; only rows with no stored entries go.
    pub fn get_linear_constraints(&self) -> (RowMatrix, Vec<f64>, RowMatrix, Vec<f64>) {
        let n = self.num_input();
        let pack = |rows: &[SparseVec], rhs: &[f64]| {
            let mut m = RowMatrix::new(n);
            let mut b = Vec::with_capacity(rhs.len());
            for (row, &r) in rows.iter().zip(rhs) {
                if row.nnz() > 0 {
                    m.push_row(row.clone());
                    b.push(r);
                }
            }
            (m, b)
        };
        let (a, b) = pack(&self.lin_a, &self.lin_b);
        let (aeq, beq) = pack(&self.lin_aeq, &self.lin_beq);
        (a, b, aeq, beq)
    }

    /// Flatten a list of results into one value vector plus a row-per-entry
    /// Jacobian against the parameter vector. Multi-element results
    /// contribute one row per entry, in order.
    pub fn pack_results(&self, results: &[GVar]) -> (Array1<f64>, RowMatrix) {
        let mut values = Vec::with_capacity(results.len());
        let mut jac = RowMatrix::new(self.num_input());
        for r in results {
            for j in 0..r.len() {
                values.push(r.value()[j]);
                jac.push_row(r.grad().col(j).clone());
            }
        }
        (Array1::from_vec(values), jac)
    }
}
