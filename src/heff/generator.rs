// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generator extraction and branch-cut detection.

use std::f64::consts::PI;
use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use num_complex::Complex64;

use crate::error::Result;
use crate::linalg::{matrix_ufunc, MatrixFunctionOptions};

/// Generators `i·log U(t)` with their eigenphases.
#[derive(Debug, Clone)]
pub struct GeneratorSeries {
    /// Hermitian generators, shape `(time, dim, dim)`
    pub generators: Array3<Complex64>,
    /// Eigenvalues of each generator, shape `(time, dim)`, in `[-π, π)`
    pub phases: Array2<f64>,
}

/// Compute `i·log U(t)` for every unitary of the series.
pub fn extract_generators(
    unitaries: ArrayView3<Complex64>,
    capture_dir: Option<&Path>,
) -> Result<GeneratorSeries> {
    let mut options = MatrixFunctionOptions::default().with_diagonals();
    if let Some(dir) = capture_dir {
        options = options.capture_dir(dir);
    }
    let output = matrix_ufunc(|z| Complex64::new(-z.arg(), 0.0), unitaries, &options)?;
    let phases = match output.diagonals {
        Some(diag) => diag.mapv(|z| z.re),
        None => Array2::zeros((unitaries.dim().0, unitaries.dim().1)),
    };
    Ok(GeneratorSeries {
        generators: output.matrices,
        phases,
    })
}

/// Number of leading time points before any eigenphase comes within
/// `margin` of `-π`, from below (minimum phase) or from above (maximum
/// phase, sign-flipped). Equals the series length when no phase gets there.
pub fn find_last_valid_it(phases: ArrayView2<f64>, margin: f64) -> usize {
    let limit = -PI + margin;
    phases
        .axis_iter(Axis(0))
        .position(|row| {
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            min < limit || -max < limit
        })
        .unwrap_or(phases.nrows())
}
