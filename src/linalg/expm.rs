// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Matrix exponential via scaling-and-squaring with Padé(13) approximation.
//!
//! Ref: Higham (2005), "The Scaling and Squaring Method for the Matrix
//! Exponential Revisited", SIAM J. Matrix Anal. Appl. 26(4), 1179.
//!
//! Used by the reference propagator, where every step exponentiates a
//! small dense Hamiltonian.

use ndarray::Array2;
use num_complex::Complex64;

use super::{from_dmatrix, identity, to_dmatrix};
use crate::error::{LinalgError, Result};

/// θ₁₃ from Higham Table 10.2.
const THETA_13: f64 = 5.37;

/// Padé(13,13) coefficients b₀..b₁₃.
const PADE_COEFFS: [f64; 14] = [
    1.0,
    0.5,
    0.12,
    1.833_333_333_333_333_4e-2,
    1.992_753_623_188_405_8e-3,
    1.630_434_782_608_696e-4,
    1.035_196_687_401_6e-5,
    5.175_983_437_008_01e-7,
    2.043_151_356_652_5e-8,
    6.306_022_705_717_593e-10,
    1.483_770_048_404_14e-11,
    2.529_153_491_597_966e-13,
    2.810_170_546_219_962_4e-15,
    1.544_049_750_670_309e-17,
];

/// exp(A) for a square complex matrix.
pub fn matrix_exp(a: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LinalgError::Shape(format!(
            "matrix_exp requires a square matrix, got {}x{}",
            n,
            a.ncols()
        ))
        .into());
    }
    match n {
        0 => return Ok(Array2::zeros((0, 0))),
        1 => return Ok(Array2::from_elem((1, 1), a[[0, 0]].exp())),
        _ => {}
    }

    let norm = one_norm(a);
    let squarings = if norm > THETA_13 {
        (norm / THETA_13).log2().ceil() as i32
    } else {
        0
    };
    let scaled = a.mapv(|z| z / 2f64.powi(squarings));

    let mut result = pade13(&scaled)?;
    for _ in 0..squarings {
        result = result.dot(&result);
    }
    Ok(result)
}

/// exp(A) ≈ (V - U)⁻¹ (V + U) with U odd and V even in A.
fn pade13(a: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let b = |k: usize| Complex64::new(PADE_COEFFS[k], 0.0);
    let eye = identity(a.nrows());
    let a2 = a.dot(a);
    let a4 = a2.dot(&a2);
    let a6 = a4.dot(&a2);

    let odd_high = &a6 * b(13) + &a4 * b(11) + &a2 * b(9);
    let odd = odd_high.dot(&a6) + &a6 * b(7) + &a4 * b(5) + &a2 * b(3) + &eye * b(1);
    let u = a.dot(&odd);

    let even_high = &a6 * b(12) + &a4 * b(10) + &a2 * b(8);
    let v = even_high.dot(&a6) + &a6 * b(6) + &a4 * b(4) + &a2 * b(2) + &eye * b(0);

    let lhs = to_dmatrix(&(&v - &u).view());
    let rhs = to_dmatrix(&(&v + &u).view());
    let solution = lhs.lu().solve(&rhs).ok_or_else(|| {
        LinalgError::Singular("Padé denominator in matrix_exp is not invertible".into())
    })?;
    Ok(from_dmatrix(&solution))
}

/// Max column sum of absolute values.
fn one_norm(a: &Array2<Complex64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|col| col.iter().map(|z| z.norm()).sum::<f64>())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_matrix_close, pauli_x};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_zero_maps_to_identity() {
        let out = matrix_exp(&Array2::zeros((3, 3))).unwrap();
        assert_matrix_close(&out, &identity(3), 1e-14);
    }

    #[test]
    fn test_diagonal_entries_exponentiate() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(1.0, 0.5);
        a[[1, 1]] = Complex64::new(-2.0, 0.0);
        let out = matrix_exp(&a).unwrap();
        assert!((out[[0, 0]] - Complex64::new(1.0, 0.5).exp()).norm() < 1e-12);
        assert_relative_eq!(out[[1, 1]].re, (-2.0f64).exp(), epsilon = 1e-14);
        assert!(out[[0, 1]].norm() < 1e-14);
    }

    #[test]
    fn test_x_rotation() {
        let theta = PI / 3.0;
        let a = pauli_x() * Complex64::new(0.0, -theta / 2.0);
        let out = matrix_exp(&a).unwrap();
        let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
        assert!((out[[0, 0]] - Complex64::new(c, 0.0)).norm() < 1e-12);
        assert!((out[[1, 0]] - Complex64::new(0.0, -s)).norm() < 1e-12);
    }

    #[test]
    fn test_large_norm_is_scaled() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = Complex64::new(0.0, 80.0);
        a[[0, 1]] = Complex64::new(0.0, 30.0);
        a[[1, 0]] = Complex64::new(0.0, 30.0);
        let u = matrix_exp(&a).unwrap();
        // anti-Hermitian input gives a unitary
        let uu = u.dot(&u.t().mapv(|z| z.conj()));
        assert_matrix_close(&uu, &identity(2), 1e-9);
    }

    #[test]
    fn test_non_square_is_rejected() {
        assert!(matrix_exp(&Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_scalar_case() {
        let a = Array2::from_elem((1, 1), Complex64::new(0.3, -1.2));
        let out = matrix_exp(&a).unwrap();
        assert_eq!(out[[0, 0]], Complex64::new(0.3, -1.2).exp());
    }
}
