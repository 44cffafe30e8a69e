// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense complex linear algebra.
//!
//! Arrays are `ndarray` throughout; `nalgebra` is used internally for the
//! decompositions and linear solves.

pub mod expm;
pub mod ufunc;

pub use expm::matrix_exp;
pub use ufunc::{matrix_ufunc, MatrixFunctionOptions, MatrixFunctionOutput};

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

/// Identity matrix of size `n`.
pub fn identity(n: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(n, Complex64::new(1.0, 0.0))
}

/// Kronecker product `a ⊗ b`.
pub fn kron(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (br, bc) = b.dim();
    Array2::from_shape_fn((a.nrows() * br, a.ncols() * bc), |(i, j)| {
        a[[i / br, j / bc]] * b[[i % br, j % bc]]
    })
}

/// Conjugate transpose.
pub fn dagger(a: &ArrayView2<Complex64>) -> Array2<Complex64> {
    a.t().mapv(|z| z.conj())
}

pub(crate) fn to_dmatrix(a: &ArrayView2<Complex64>) -> DMatrix<Complex64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
