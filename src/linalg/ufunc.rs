// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scalar functions of normal matrices, batched.
//!
//! For a normal matrix `M = V·diag(λ)·V†` the evaluator returns
//! `V·diag(op(λ))·V†`. Hermitian inputs go through the symmetric
//! eigensolver; other normal inputs through the complex Schur form, whose
//! triangular factor is diagonal for normal matrices.
//!
//! When a decomposition fails the whole batch is written to a JSON file
//! before the error is returned.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, Schur, SymmetricEigen};
use ndarray::{Array2, Array3, ArrayView3, Axis};
use num_complex::Complex64;
use serde::Serialize;
use tracing::{debug, error};

use super::{from_dmatrix, to_dmatrix};
use crate::error::{LinalgError, Result};

/// Convergence tolerances tried in order. Near-degenerate spectra (a
/// residual close to the identity) may not converge at the first one.
const EIG_TOLERANCES: [f64; 2] = [1e-13, 1e-10];
const EIG_MAX_ITERATIONS: usize = 10_000;

/// Options for [`matrix_ufunc`].
#[derive(Debug, Clone, Default)]
pub struct MatrixFunctionOptions {
    /// Inputs are Hermitian; use the real-eigenvalue solver.
    pub hermitian: bool,
    /// Also return `op(λ)` per matrix.
    pub with_diagonals: bool,
    /// Directory for failed-batch captures; defaults to the system temp dir.
    pub capture_dir: Option<PathBuf>,
}

impl MatrixFunctionOptions {
    pub fn hermitian() -> Self {
        Self {
            hermitian: true,
            ..Self::default()
        }
    }

    pub fn with_diagonals(mut self) -> Self {
        self.with_diagonals = true;
        self
    }

    pub fn capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }
}

/// Result of [`matrix_ufunc`].
#[derive(Debug, Clone)]
pub struct MatrixFunctionOutput {
    /// `V·diag(op(λ))·V†`, shape `(batch, n, n)`
    pub matrices: Array3<Complex64>,
    /// `op(λ)`, shape `(batch, n)`, when requested
    pub diagonals: Option<Array2<Complex64>>,
}

/// Apply `op` to the eigenvalues of every matrix in a `(batch, n, n)` stack.
pub fn matrix_ufunc<F>(
    op: F,
    matrices: ArrayView3<Complex64>,
    options: &MatrixFunctionOptions,
) -> Result<MatrixFunctionOutput>
where
    F: Fn(Complex64) -> Complex64,
{
    let (batch, n, m) = matrices.dim();
    if n != m {
        return Err(LinalgError::Shape(format!(
            "matrix_ufunc requires square matrices, got {}x{}",
            n, m
        ))
        .into());
    }

    let mut out = Array3::zeros((batch, n, n));
    let mut diagonals = options.with_diagonals.then(|| Array2::zeros((batch, n)));

    for (k, mat) in matrices.axis_iter(Axis(0)).enumerate() {
        let Some((vectors, eigenvalues)) = decompose(to_dmatrix(&mat), options.hermitian) else {
            let capture = capture_batch(matrices.view(), options);
            error!(
                batch_size = batch,
                index = k,
                hermitian = options.hermitian,
                capture = ?capture,
                "Eigendecomposition failed"
            );
            return Err(LinalgError::Decomposition {
                batch_size: batch,
                capture,
            }
            .into());
        };

        let values: Vec<Complex64> = eigenvalues.iter().map(|&z| op(z)).collect();
        let mut scaled = vectors.clone();
        for (mut col, value) in scaled.column_iter_mut().zip(&values) {
            col *= *value;
        }
        let result = scaled * vectors.adjoint();
        out.index_axis_mut(Axis(0), k).assign(&from_dmatrix(&result));

        if let Some(diag) = diagonals.as_mut() {
            for (slot, value) in diag.row_mut(k).iter_mut().zip(values) {
                *slot = value;
            }
        }
    }

    debug!(batch_size = batch, dim = n, hermitian = options.hermitian, "matrix_ufunc");

    Ok(MatrixFunctionOutput {
        matrices: out,
        diagonals,
    })
}

/// Eigenvectors and eigenvalues, or `None` if the solver fails.
fn decompose(
    m: DMatrix<Complex64>,
    hermitian: bool,
) -> Option<(DMatrix<Complex64>, Vec<Complex64>)> {
    if m.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return None;
    }
    let (vectors, eigenvalues) = EIG_TOLERANCES
        .iter()
        .find_map(|&eps| try_decompose(m.clone(), hermitian, eps))?;

    let finite = eigenvalues
        .iter()
        .chain(vectors.iter())
        .all(|z: &Complex64| z.re.is_finite() && z.im.is_finite());
    finite.then_some((vectors, eigenvalues))
}

fn try_decompose(
    m: DMatrix<Complex64>,
    hermitian: bool,
    eps: f64,
) -> Option<(DMatrix<Complex64>, Vec<Complex64>)> {
    if hermitian {
        let eig = SymmetricEigen::try_new(m, eps, EIG_MAX_ITERATIONS)?;
        let values: Vec<Complex64> = eig
            .eigenvalues
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .collect();
        Some((eig.eigenvectors, values))
    } else {
        let (q, t) = Schur::try_new(m, eps, EIG_MAX_ITERATIONS)?.unpack();
        let values: Vec<Complex64> = (0..t.nrows()).map(|i| t[(i, i)]).collect();
        Some((q, values))
    }
}

#[derive(Serialize)]
struct FailedBatch<'a> {
    hermitian: bool,
    matrices: ArrayView3<'a, Complex64>,
}

/// Write the batch to a fresh JSON file; `None` if the capture itself fails.
fn capture_batch(
    matrices: ArrayView3<'_, Complex64>,
    options: &MatrixFunctionOptions,
) -> Option<PathBuf> {
    let dir = options
        .capture_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    match write_capture(&dir, matrices, options.hermitian) {
        Ok(path) => Some(path),
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Failed to capture matrix batch");
            None
        }
    }
}

fn write_capture(
    dir: &Path,
    matrices: ArrayView3<'_, Complex64>,
    hermitian: bool,
) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("qudit-sim-eig-")
        .suffix(".json")
        .tempfile_in(dir)?;
    serde_json::to_writer(&mut file, &FailedBatch { hermitian, matrices })?;
    file.flush()?;
    let (_, path) = file.keep()?;
    Ok(path)
}
