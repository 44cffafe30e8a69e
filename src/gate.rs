// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gate identification.
//!
//! The gate implemented by a drive is summarised by the Pauli components of
//! the generator `i·log U(T)` of its final unitary, optionally restricted to
//! a computational subspace of `comp_dim` levels per qudit.

use std::collections::HashMap;
use std::fmt::Write;

use ndarray::{Array1, ArrayView2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::evolution::Integrator;
use crate::hamiltonian::HamiltonianBuilder;
use crate::heff::extract_generators;
use crate::pauli::{OperatorBasis, PauliProductBasis};

/// Pauli components of a gate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateComponents {
    /// Levels per qudit of the basis the components are expressed in
    pub num_levels: usize,
    pub num_qudits: usize,
    pub labels: Vec<String>,
    pub components: Vec<f64>,
}

impl GateComponents {
    /// `exp[-i(...)]` with the components above `threshold`.
    pub fn expr(&self, threshold: f64) -> String {
        let mut exponent = String::new();
        for (label, &value) in self.labels.iter().zip(&self.components) {
            if value.abs() > threshold {
                let _ = write!(exponent, "{:+.3}{}", value, label);
            }
        }
        if exponent.is_empty() {
            exponent.push('0');
        }
        format!("exp[-i({})]", exponent)
    }
}

/// Components of `i·log U` in `basis`, truncated to `comp_dim` levels per
/// qudit when it is smaller than the basis dimension.
pub fn gate_components(
    unitary: ArrayView2<Complex64>,
    basis: &PauliProductBasis,
    comp_dim: Option<usize>,
) -> Result<GateComponents> {
    let batch = unitary.insert_axis(Axis(0));
    let series = extract_generators(batch, None)?;
    let coeffs: Array1<f64> = basis
        .decompose(series.generators.view())?
        .row(0)
        .to_owned();

    match comp_dim {
        Some(dim) if dim != basis.num_levels() => {
            let (comp, map) = basis.truncation(dim)?;
            Ok(GateComponents {
                num_levels: dim,
                num_qudits: basis.num_qudits(),
                labels: comp.labels().to_vec(),
                components: map.dot(&coeffs).to_vec(),
            })
        }
        _ => Ok(GateComponents {
            num_levels: basis.num_levels(),
            num_qudits: basis.num_qudits(),
            labels: basis.labels().to_vec(),
            components: coeffs.to_vec(),
        }),
    }
}

/// Integrate the drives over their full duration and identify the gate.
pub fn identify_gate<I>(
    builder: &HamiltonianBuilder,
    rwa: bool,
    num_time_steps: usize,
    comp_dim: usize,
    integrator: &I,
) -> Result<GateComponents>
where
    I: Integrator + ?Sized,
{
    if comp_dim > builder.num_levels() {
        return Err(Error::Config(format!(
            "computational dimension {} exceeds the {} simulated levels",
            comp_dim,
            builder.num_levels()
        )));
    }
    if num_time_steps < 2 {
        return Err(Error::Config("num_time_steps must be >= 2".into()));
    }
    let duration = builder.duration().ok_or_else(|| {
        Error::Config("gate identification needs drives of finite duration".into())
    })?;

    let tlist = Array1::linspace(0.0, duration, num_time_steps).to_vec();
    let hamiltonian = builder.build(rwa)?;
    let unitaries = integrator.propagate(&hamiltonian, &tlist, &HashMap::new())?;
    let basis = PauliProductBasis::new(builder.num_levels(), builder.num_qudits())?;
    let gate = gate_components(
        unitaries.index_axis(Axis(0), num_time_steps - 1),
        &basis,
        Some(comp_dim),
    )?;

    info!(duration, num_time_steps, comp_dim, "Identified gate");
    Ok(gate)
}
