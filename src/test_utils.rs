// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures.

use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;

use crate::linalg::matrix_exp;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

pub fn pauli_x() -> Array2<Complex64> {
    ndarray::array![[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]]
}

pub fn pauli_y() -> Array2<Complex64> {
    ndarray::array![[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]]
}

pub fn pauli_z() -> Array2<Complex64> {
    ndarray::array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]]
}

/// Stack equally sized matrices along a new leading axis.
pub fn stack(matrices: &[Array2<Complex64>]) -> Array3<Complex64> {
    let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
    ndarray::stack(Axis(0), &views).unwrap()
}

/// `exp(-i·H·t)` for every `t`.
pub fn evolve(h: &Array2<Complex64>, tlist: &[f64]) -> Array3<Complex64> {
    let mats: Vec<Array2<Complex64>> = tlist
        .iter()
        .map(|&t| matrix_exp(&(h * c(0.0, -t))).unwrap())
        .collect();
    stack(&mats)
}

/// Resonant Rabi evolution `exp(-i·Ω·t·σx/2)`.
pub fn rabi_unitaries(omega: f64, tlist: &[f64]) -> Array3<Complex64> {
    evolve(&(pauli_x() * c(omega / 2.0, 0.0)), tlist)
}

pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    ndarray::Array1::linspace(start, stop, num).to_vec()
}

pub fn assert_matrix_close(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) {
    assert_eq!(a.shape(), b.shape());
    for ((i, j), val) in a.indexed_iter() {
        let diff = (val - b[[i, j]]).norm();
        assert!(
            diff < tol,
            "Mismatch at ({}, {}): {:?} vs {:?} (diff={})",
            i,
            j,
            val,
            b[[i, j]],
            diff
        );
    }
}
