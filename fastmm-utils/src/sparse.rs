use ndarray::{Array1, Array2};

/// A sparse vector over `f64`, kept as parallel index/value arrays with
/// strictly increasing indices. Explicit zeros are allowed but never required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVec {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVec {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vector with a single 1.0 entry at `pos`.
    pub fn unit(pos: usize) -> Self {
        Self {
            indices: vec![pos],
            values: vec![1.0],
        }
    }

    pub fn from_dense(x: &[f64]) -> Self {
        let mut out = Self::new();
        for (i, &v) in x.iter().enumerate() {
            if v != 0.0 {
                out.indices.push(i);
                out.values.push(v);
            }
        }
        out
    }

    /// Build from (index, value) pairs that may be unsorted or contain
    /// duplicate indices; duplicates are summed.
    pub fn from_entries(mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_by_key(|e| e.0);
        let mut out = Self::new();
        for (i, v) in entries {
            if let Some(&last) = out.indices.last() {
                if last == i {
                    *out.values.last_mut().unwrap() += v;
                    continue;
                }
            }
            out.indices.push(i);
            out.values.push(v);
        }
        out
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, pos: usize) -> f64 {
        match self.indices.binary_search(&pos) {
            Ok(i) => self.values[i],
            Err(_) => 0.0,
        }
    }

    pub fn scaled(&self, a: f64) -> Self {
        if a == 0.0 {
            return Self::new();
        }
        Self {
            indices: self.indices.clone(),
            values: self.values.iter().map(|&v| v * a).collect(),
        }
    }

    /// `self += a * other`, merging the two index sets.
    pub fn axpy(&mut self, a: f64, other: &SparseVec) {
        if a == 0.0 || other.indices.is_empty() {
            return;
        }
        if self.indices.is_empty() {
            *self = other.scaled(a);
            return;
        }
        let mut indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut values = Vec::with_capacity(self.nnz() + other.nnz());
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() || j < other.indices.len() {
            let si = self.indices.get(i).copied().unwrap_or(usize::MAX);
            let oj = other.indices.get(j).copied().unwrap_or(usize::MAX);
            if si < oj {
                indices.push(si);
                values.push(self.values[i]);
                i += 1;
            } else if oj < si {
                indices.push(oj);
                values.push(a * other.values[j]);
                j += 1;
            } else {
                indices.push(si);
                values.push(self.values[i] + a * other.values[j]);
                i += 1;
                j += 1;
            }
        }
        self.indices = indices;
        self.values = values;
    }

    pub fn add(&self, other: &SparseVec) -> Self {
        let mut out = self.clone();
        out.axpy(1.0, other);
        out
    }

    pub fn sub(&self, other: &SparseVec) -> Self {
        let mut out = self.clone();
        out.axpy(-1.0, other);
        out
    }

    pub fn dot_dense(&self, x: &[f64]) -> f64 {
        self.iter().map(|(i, v)| v * x[i]).sum()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn to_dense(&self, len: usize) -> Array1<f64> {
        let mut out = Array1::zeros(len);
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }
}

/// A sparse matrix stored column-major with a fixed row count. Gradient
/// matrices are tall and thin (rows = parameter count, columns = vector
/// length), so per-column storage keeps every operator cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMat {
    nrows: usize,
    cols: Vec<SparseVec>,
}

impl SparseMat {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            cols: vec![SparseVec::new(); ncols],
        }
    }

    /// Columns `j` hold a single 1.0 at row `start + j`.
    pub fn identity_block(nrows: usize, start: usize, ncols: usize) -> Self {
        Self {
            nrows,
            cols: (0..ncols).map(|j| SparseVec::unit(start + j)).collect(),
        }
    }

    pub fn from_cols(nrows: usize, cols: Vec<SparseVec>) -> Self {
        Self { nrows, cols }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn col(&self, j: usize) -> &SparseVec {
        &self.cols[j]
    }

    pub fn set_col(&mut self, j: usize, col: SparseVec) {
        self.cols[j] = col;
    }

    pub fn add(&self, other: &SparseMat) -> Self {
        assert_eq!(self.nrows, other.nrows);
        assert_eq!(self.ncols(), other.ncols());
        let cols = self
            .cols
            .iter()
            .zip(&other.cols)
            .map(|(a, b)| a.add(b))
            .collect();
        Self::from_cols(self.nrows, cols)
    }

    pub fn sub(&self, other: &SparseMat) -> Self {
        assert_eq!(self.nrows, other.nrows);
        assert_eq!(self.ncols(), other.ncols());
        let cols = self
            .cols
            .iter()
            .zip(&other.cols)
            .map(|(a, b)| a.sub(b))
            .collect();
        Self::from_cols(self.nrows, cols)
    }

    pub fn scale(&self, a: f64) -> Self {
        Self::from_cols(self.nrows, self.cols.iter().map(|c| c.scaled(a)).collect())
    }

    /// Scale column `j` by `w[j]`.
    pub fn scale_cols(&self, w: &[f64]) -> Self {
        assert_eq!(self.ncols(), w.len());
        let cols = self
            .cols
            .iter()
            .zip(w)
            .map(|(c, &a)| c.scaled(a))
            .collect();
        Self::from_cols(self.nrows, cols)
    }

    /// Linear combination of columns: `Σ_j coeff[j] * col_j`.
    pub fn combine_cols(&self, coeff: &[f64]) -> SparseVec {
        assert_eq!(self.ncols(), coeff.len());
        let mut out = SparseVec::new();
        for (c, &a) in self.cols.iter().zip(coeff) {
            out.axpy(a, c);
        }
        out
    }

    pub fn sum_cols(&self) -> SparseVec {
        let mut out = SparseVec::new();
        for c in &self.cols {
            out.axpy(1.0, c);
        }
        out
    }

    pub fn hstack(parts: &[&SparseMat]) -> Self {
        assert!(!parts.is_empty());
        let nrows = parts[0].nrows;
        let mut cols = Vec::new();
        for p in parts {
            assert_eq!(p.nrows, nrows);
            cols.extend(p.cols.iter().cloned());
        }
        Self::from_cols(nrows, cols)
    }

    pub fn select_cols(&self, idx: &[usize]) -> Self {
        Self::from_cols(self.nrows, idx.iter().map(|&j| self.cols[j].clone()).collect())
    }

    /// Column-scatter: output column `m` is the sum of every input column `j`
    /// with `targets[j] == m`.
    pub fn project(&self, targets: &[usize], out_len: usize) -> Self {
        assert_eq!(self.ncols(), targets.len());
        let mut out = Self::zeros(self.nrows, out_len);
        for (c, &m) in self.cols.iter().zip(targets) {
            out.cols[m].axpy(1.0, c);
        }
        out
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.nrows, self.ncols()));
        for (j, c) in self.cols.iter().enumerate() {
            for (i, v) in c.iter() {
                out[[i, j]] = v;
            }
        }
        out
    }
}

/// A sparse matrix stored row-major with a fixed column count. Used for
/// linear constraint systems and packed constraint Jacobians, where rows
/// are appended over time and matrix-vector products run row by row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMatrix {
    ncols: usize,
    rows: Vec<SparseVec>,
}

impl RowMatrix {
    pub fn new(ncols: usize) -> Self {
        Self {
            ncols,
            rows: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Growing the column count zero-pads every existing row implicitly.
    pub fn set_ncols(&mut self, ncols: usize) {
        assert!(ncols >= self.ncols);
        self.ncols = ncols;
    }

    pub fn push_row(&mut self, row: SparseVec) {
        self.rows.push(row);
    }

    pub fn row(&self, i: usize) -> &SparseVec {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[SparseVec] {
        &self.rows
    }

    pub fn matvec(&self, x: &[f64]) -> Array1<f64> {
        assert!(x.len() >= self.ncols);
        Array1::from_iter(self.rows.iter().map(|r| r.dot_dense(x)))
    }

    /// Drop rows whose coefficient vector is all zero, keeping `rhs` aligned.
    pub fn prune_empty(&mut self, rhs: &mut Vec<f64>) {
        assert_eq!(self.rows.len(), rhs.len());
        let mut kept_rhs = Vec::with_capacity(rhs.len());
        let mut kept_rows = Vec::with_capacity(self.rows.len());
        for (row, b) in self.rows.drain(..).zip(rhs.drain(..)) {
            if !row.is_empty() {
                kept_rows.push(row);
                kept_rhs.push(b);
            }
        }
        self.rows = kept_rows;
        *rhs = kept_rhs;
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows.len(), self.ncols));
        for (i, r) in self.rows.iter().enumerate() {
            for (j, v) in r.iter() {
                out[[i, j]] = v;
            }
        }
        out
    }
}
