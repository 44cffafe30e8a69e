// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generalized Pauli (Gell-Mann) product basis.
//!
//! Single-qudit elements are normalised to `Tr(λ_a λ_b) = 2 δ_ab`, with
//! `λ_0 = sqrt(2/d)·I`. For `d = 2` the basis is `I, X, Y, Z`. Product
//! elements are indexed row-major over qudits, the first qudit being the
//! most significant digit and the leftmost tensor factor.

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use num_complex::Complex64;

use crate::error::{LinalgError, Result};
use crate::linalg::kron;

/// Operator basis used to decompose and recompose generators.
pub trait OperatorBasis {
    /// Basis operators, shape `(len, dim, dim)`.
    fn operators(&self) -> ArrayView3<'_, Complex64>;

    /// Label per basis element.
    fn labels(&self) -> &[String];

    /// `Tr(P_a P_a)` shared by every element.
    fn normalization(&self) -> f64;

    /// Hilbert space dimension.
    fn dim(&self) -> usize {
        self.operators().shape()[1]
    }

    /// Number of basis elements.
    fn len(&self) -> usize {
        self.operators().shape()[0]
    }

    /// Coefficients `Re Tr(M P_a) / Tr(P_a P_a)` for each matrix of a
    /// `(batch, dim, dim)` stack; shape `(batch, len)`.
    fn decompose(&self, matrices: ArrayView3<Complex64>) -> Result<Array2<f64>> {
        let (batch, n, m) = matrices.dim();
        if n != self.dim() || m != self.dim() {
            return Err(LinalgError::Shape(format!(
                "cannot decompose {}x{} matrices in a basis of dimension {}",
                n,
                m,
                self.dim()
            ))
            .into());
        }
        let ops = self.operators();
        let norm = self.normalization();
        let mut out = Array2::zeros((batch, self.len()));
        for (mat, mut row) in matrices.axis_iter(Axis(0)).zip(out.rows_mut()) {
            for (slot, op) in row.iter_mut().zip(ops.axis_iter(Axis(0))) {
                // Tr(M P) = Σ_ij M_ij P_ji
                let trace: Complex64 = mat
                    .indexed_iter()
                    .map(|((i, j), v)| v * op[[j, i]])
                    .sum();
                *slot = trace.re / norm;
            }
        }
        Ok(out)
    }

    /// `Σ_a c_a P_a`.
    fn compose(&self, coeffs: ArrayView1<f64>) -> Result<Array2<Complex64>> {
        if coeffs.len() != self.len() {
            return Err(LinalgError::Shape(format!(
                "expected {} coefficients, got {}",
                self.len(),
                coeffs.len()
            ))
            .into());
        }
        let dim = self.dim();
        let mut out = Array2::zeros((dim, dim));
        for (&c, op) in coeffs.iter().zip(self.operators().axis_iter(Axis(0))) {
            if c != 0.0 {
                out.scaled_add(Complex64::new(c, 0.0), &op);
            }
        }
        Ok(out)
    }
}

/// Tensor products of generalized Gell-Mann matrices.
#[derive(Debug, Clone)]
pub struct PauliProductBasis {
    num_levels: usize,
    num_qudits: usize,
    operators: Array3<Complex64>,
    labels: Vec<String>,
}

impl PauliProductBasis {
    pub fn new(num_levels: usize, num_qudits: usize) -> Result<Self> {
        if num_levels < 2 || num_qudits == 0 {
            return Err(LinalgError::Shape(format!(
                "basis needs num_levels >= 2 and num_qudits >= 1, got {} and {}",
                num_levels, num_qudits
            ))
            .into());
        }

        let single = gell_mann(num_levels);
        let single_labels = single_labels(num_levels);
        let dim = num_levels.pow(num_qudits as u32);
        let count = single.len().pow(num_qudits as u32);

        let mut operators = Array3::zeros((count, dim, dim));
        let mut labels = Vec::with_capacity(count);
        for index in 0..count {
            let digits = digits(index, single.len(), num_qudits);
            let mut op = Array2::from_elem((1, 1), Complex64::new(1.0, 0.0));
            for &d in &digits {
                op = kron(&op, &single[d]);
            }
            operators.index_axis_mut(Axis(0), index).assign(&op);
            let parts: Vec<&str> = digits.iter().map(|&d| single_labels[d].as_str()).collect();
            labels.push(if num_levels == 2 {
                parts.concat()
            } else {
                parts.join("⊗")
            });
        }

        Ok(Self {
            num_levels,
            num_qudits,
            operators,
            labels,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn num_qudits(&self) -> usize {
        self.num_qudits
    }

    /// Flat index of a per-qudit element tuple.
    pub fn index_of(&self, elements: &[usize]) -> Option<usize> {
        let base = self.num_levels * self.num_levels;
        if elements.len() != self.num_qudits || elements.iter().any(|&e| e >= base) {
            return None;
        }
        Some(elements.iter().fold(0, |acc, &e| acc * base + e))
    }

    /// Per-qudit element tuple of a flat index.
    pub fn elements_of(&self, index: usize) -> Vec<usize> {
        digits(index, self.num_levels * self.num_levels, self.num_qudits)
    }

    /// Basis of the `comp_dim`-level computational subspace and the linear
    /// map from components in this basis to components of the operator
    /// restricted to that subspace, shape `(comp_len, len)`.
    ///
    /// Row 0 of the map is the projection of every element onto `λ_0` of
    /// the subspace.
    pub fn truncation(&self, comp_dim: usize) -> Result<(PauliProductBasis, Array2<f64>)> {
        if comp_dim < 2 || comp_dim > self.num_levels {
            return Err(LinalgError::Shape(format!(
                "computational dimension {} must be in [2, {}]",
                comp_dim, self.num_levels
            ))
            .into());
        }
        let comp = PauliProductBasis::new(comp_dim, self.num_qudits)?;
        let indices = self.subspace_indices(comp_dim);
        let restricted = self
            .operators
            .select(Axis(1), &indices)
            .select(Axis(2), &indices);
        let map = comp.decompose(restricted.view())?.reversed_axes();
        Ok((comp, map))
    }

    /// Components of the operator `Σ c_a P_a` restricted to the
    /// `comp_dim`-level subspace of every qudit.
    pub fn truncate(&self, coeffs: ArrayView1<f64>, comp_dim: usize) -> Result<Array1<f64>> {
        if coeffs.len() != self.len() {
            return Err(LinalgError::Shape(format!(
                "expected {} coefficients, got {}",
                self.len(),
                coeffs.len()
            ))
            .into());
        }
        let (_, map) = self.truncation(comp_dim)?;
        Ok(map.dot(&coeffs))
    }

    /// Flat Hilbert-space indices of the states whose every qudit is below
    /// `comp_dim`, in row-major order.
    fn subspace_indices(&self, comp_dim: usize) -> Vec<usize> {
        let count = comp_dim.pow(self.num_qudits as u32);
        (0..count)
            .map(|k| {
                digits(k, comp_dim, self.num_qudits)
                    .iter()
                    .fold(0, |acc, &level| acc * self.num_levels + level)
            })
            .collect()
    }
}

impl OperatorBasis for PauliProductBasis {
    fn operators(&self) -> ArrayView3<'_, Complex64> {
        self.operators.view()
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn normalization(&self) -> f64 {
        2f64.powi(self.num_qudits as i32)
    }
}

/// Single-qudit generalized Gell-Mann matrices, identity first.
fn gell_mann(d: usize) -> Vec<Array2<Complex64>> {
    let one = Complex64::new(1.0, 0.0);
    let mut mats = Vec::with_capacity(d * d);
    mats.push(Array2::from_diag_elem(d, one * (2.0 / d as f64).sqrt()));

    for k in 1..d {
        for j in 0..k {
            let mut sym = Array2::zeros((d, d));
            sym[[j, k]] = one;
            sym[[k, j]] = one;
            mats.push(sym);

            let mut anti = Array2::zeros((d, d));
            anti[[j, k]] = Complex64::new(0.0, -1.0);
            anti[[k, j]] = Complex64::new(0.0, 1.0);
            mats.push(anti);
        }
        let scale = (2.0 / (k * (k + 1)) as f64).sqrt();
        let mut diag = Array1::zeros(d);
        for l in 0..k {
            diag[l] = one * scale;
        }
        diag[k] = one * (-(k as f64) * scale);
        mats.push(Array2::from_diag(&diag));
    }
    mats
}

fn single_labels(d: usize) -> Vec<String> {
    if d == 2 {
        return ["I", "X", "Y", "Z"].iter().map(|s| s.to_string()).collect();
    }
    (0..d * d).map(|i| format!("λ{}", i)).collect()
}

fn digits(mut index: usize, base: usize, width: usize) -> Vec<usize> {
    let mut out = vec![0; width];
    for slot in out.iter_mut().rev() {
        *slot = index % base;
        index /= base;
    }
    out
}
