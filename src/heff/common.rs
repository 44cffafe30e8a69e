// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Effective-Hamiltonian composition, fidelity and formatting.

use std::f64::consts::PI;
use std::fmt::Write;

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use num_complex::Complex64;

use crate::error::{LinalgError, Result};
use crate::linalg::{matrix_ufunc, MatrixFunctionOptions};
use crate::pauli::OperatorBasis;

/// `Σ_a c_a P_a`.
pub fn make_heff<B>(coeffs: ArrayView1<f64>, basis: &B) -> Result<Array2<Complex64>>
where
    B: OperatorBasis + ?Sized,
{
    basis.compose(coeffs)
}

/// `exp(phase_factor · i · H_eff · t)` for every `t`.
///
/// `phase_factor = -1` gives the effective evolution, `+1` its adjoint.
pub fn compose_ueff<B>(
    coeffs: ArrayView1<f64>,
    basis: &B,
    tlist: &[f64],
    phase_factor: f64,
) -> Result<Array3<Complex64>>
where
    B: OperatorBasis + ?Sized,
{
    let heff = make_heff(coeffs, basis)?;
    let dim = heff.nrows();
    let mut heff_t = Array3::zeros((tlist.len(), dim, dim));
    for (mut slot, &t) in heff_t.axis_iter_mut(Axis(0)).zip(tlist) {
        slot.assign(&(&heff * Complex64::new(t, 0.0)));
    }
    let output = matrix_ufunc(
        |z| Complex64::new(0.0, phase_factor * z.re).exp(),
        heff_t.view(),
        &MatrixFunctionOptions::hermitian(),
    )?;
    Ok(output.matrices)
}

/// `|Tr(U(t) U_eff(t)†)|² / d²` per time point.
pub fn heff_fidelity<B>(
    unitaries: ArrayView3<Complex64>,
    coeffs: ArrayView1<f64>,
    basis: &B,
    tlist: &[f64],
) -> Result<Array1<f64>>
where
    B: OperatorBasis + ?Sized,
{
    let (points, n, _) = unitaries.dim();
    if points != tlist.len() {
        return Err(LinalgError::Shape(format!(
            "{} unitaries for {} time points",
            points,
            tlist.len()
        ))
        .into());
    }
    if n != basis.dim() {
        return Err(LinalgError::Shape(format!(
            "unitary dimension {} does not match basis dimension {}",
            n,
            basis.dim()
        ))
        .into());
    }
    let ueff_dag = compose_ueff(coeffs, basis, tlist, 1.0)?;
    let norm = (n * n) as f64;
    let fidelity = unitaries
        .axis_iter(Axis(0))
        .zip(ueff_dag.axis_iter(Axis(0)))
        .map(|(u, v)| u.dot(&v).diag().sum().norm_sqr() / norm)
        .collect();
    Ok(fidelity)
}

const FREQUENCY_UNITS: [(f64, &str); 4] = [(1e9, "GHz"), (1e6, "MHz"), (1e3, "kHz"), (1.0, "Hz")];

/// Human-readable sum of the nonnegligible terms.
///
/// Coefficients are taken as angular frequencies. The unit is the largest
/// of GHz/MHz/kHz/Hz that the biggest coefficient exceeds (`2π·unit`);
/// smaller values are printed dimensionless. Terms below `threshold`
/// (default: `10⁻³` of the unit) are omitted.
pub fn heff_expr(coeffs: ArrayView1<f64>, labels: &[String], threshold: Option<f64>) -> String {
    let maxval = coeffs.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
    let (norm, header) = FREQUENCY_UNITS
        .iter()
        .map(|&(base, unit)| (2.0 * PI * base, unit))
        .find(|&(norm, _)| maxval > norm)
        .map(|(norm, unit)| (norm, format!("H_eff / (2π {})", unit)))
        .unwrap_or_else(|| (1.0, "H_eff".to_string()));
    let threshold = threshold.unwrap_or(norm * 1e-3);

    let mut expr = String::new();
    for (coeff, label) in coeffs.iter().zip(labels) {
        if coeff.abs() < threshold || *coeff == 0.0 {
            continue;
        }
        if *coeff < 0.0 {
            expr.push_str(if expr.is_empty() { "-" } else { " - " });
        } else if !expr.is_empty() {
            expr.push_str(" + ");
        }
        let _ = write!(expr, "{:.3}{}", coeff.abs() / norm, label);
    }
    if expr.is_empty() {
        expr.push('0');
    }
    format!("{} = {}", header, expr)
}
