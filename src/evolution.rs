// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Time evolution of compiled Hamiltonians.
//!
//! [`Integrator`] is the seam to whatever solver produces the unitary
//! series. [`PropagatorIntegrator`] is a reference implementation: each
//! output interval is split into `substeps` slices, and each slice applies
//! `exp(-i·H(t_mid)·h)` with `H` sampled at the slice midpoint.

use std::collections::HashMap;

use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;
use tracing::debug;

use crate::config::IntegratorConfig;
use crate::drive::{Coefficient, SampledCoefficient};
use crate::error::{Error, LinalgError, Result};
use crate::expression::{TextExpression, TimeFunction};
use crate::hamiltonian::Hamiltonian;
use crate::linalg::{identity, matrix_exp};

/// Produces `U(t)` for every requested time, with `U(tlist[0]) = I`.
pub trait Integrator {
    fn propagate(
        &self,
        hamiltonian: &Hamiltonian,
        tlist: &[f64],
        args: &HashMap<String, f64>,
    ) -> Result<Array3<Complex64>>;
}

/// Midpoint piecewise-constant propagator.
#[derive(Debug, Clone)]
pub struct PropagatorIntegrator {
    substeps: usize,
}

impl PropagatorIntegrator {
    pub fn new(substeps: usize) -> Result<Self> {
        if substeps == 0 {
            return Err(Error::Config("substeps must be > 0".into()));
        }
        Ok(Self { substeps })
    }

    pub fn from_config(config: &IntegratorConfig) -> Result<Self> {
        Self::new(config.substeps)
    }

    pub fn substeps(&self) -> usize {
        self.substeps
    }
}

impl Default for PropagatorIntegrator {
    fn default() -> Self {
        Self { substeps: 8 }
    }
}

impl Integrator for PropagatorIntegrator {
    fn propagate(
        &self,
        hamiltonian: &Hamiltonian,
        tlist: &[f64],
        args: &HashMap<String, f64>,
    ) -> Result<Array3<Complex64>> {
        if tlist.is_empty() {
            return Err(LinalgError::Shape("tlist is empty".into()).into());
        }
        if tlist.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(LinalgError::Shape("tlist must be nondecreasing".into()).into());
        }

        let prepared = PreparedHamiltonian::new(hamiltonian)?;
        let dim = hamiltonian.dim;
        let mut out = Array3::zeros((tlist.len(), dim, dim));
        let mut u = identity(dim);
        out.index_axis_mut(Axis(0), 0).assign(&u);

        for (k, window) in tlist.windows(2).enumerate() {
            let h = (window[1] - window[0]) / self.substeps as f64;
            if h > 0.0 {
                for step in 0..self.substeps {
                    let t_mid = window[0] + (step as f64 + 0.5) * h;
                    let ht = prepared.evaluate(t_mid, args)?;
                    let step_u = matrix_exp(&(ht * Complex64::new(0.0, -h)))?;
                    u = step_u.dot(&u);
                }
            }
            out.index_axis_mut(Axis(0), k + 1).assign(&u);
        }

        debug!(
            points = tlist.len(),
            dim,
            substeps = self.substeps,
            "Propagated unitary series"
        );
        Ok(out)
    }
}

/// Coefficient with text already parsed.
enum PreparedCoefficient<'a> {
    Number(f64),
    Sampled(&'a SampledCoefficient),
    Function(&'a TimeFunction),
    Text(TextExpression),
}

impl PreparedCoefficient<'_> {
    fn evaluate(&self, t: f64, args: &HashMap<String, f64>) -> Result<f64> {
        Ok(match self {
            PreparedCoefficient::Number(v) => *v,
            PreparedCoefficient::Sampled(s) => s.value_at(t),
            PreparedCoefficient::Function(f) => f.evaluate_named(t, args)?.re,
            PreparedCoefficient::Text(expr) => expr.evaluate(t, args)?.re,
        })
    }
}

struct PreparedHamiltonian<'a> {
    base: Array2<Complex64>,
    terms: Vec<(&'a Array2<Complex64>, PreparedCoefficient<'a>)>,
}

impl<'a> PreparedHamiltonian<'a> {
    fn new(hamiltonian: &'a Hamiltonian) -> Result<Self> {
        let dim = hamiltonian.dim;
        let base = match &hamiltonian.static_term {
            Some(op) => op.clone(),
            None => Array2::zeros((dim, dim)),
        };
        let terms = hamiltonian
            .terms
            .iter()
            .map(|term| -> Result<_> {
                let coefficient = match &term.coefficient {
                    Coefficient::Number(v) => PreparedCoefficient::Number(*v),
                    Coefficient::Sampled(s) => PreparedCoefficient::Sampled(s),
                    Coefficient::Function(f) => PreparedCoefficient::Function(f),
                    Coefficient::Text(src) => PreparedCoefficient::Text(TextExpression::parse(src)?),
                };
                Ok((&term.operator, coefficient))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { base, terms })
    }

    fn evaluate(&self, t: f64, args: &HashMap<String, f64>) -> Result<Array2<Complex64>> {
        let mut h = self.base.clone();
        for (operator, coefficient) in &self.terms {
            let c = coefficient.evaluate(t, args)?;
            if c != 0.0 {
                h.scaled_add(Complex64::new(c, 0.0), *operator);
            }
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveTerm;
    use crate::hamiltonian::HamiltonianBuilder;
    use crate::pulse::Pulse;
    use crate::test_utils::{assert_matrix_close, linspace, pauli_z, rabi_unitaries};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_constant_drive_matches_rabi() {
        let omega = 0.8;
        // x coefficient Ω/2 on σx
        let h = HamiltonianBuilder::new(2, 1)
            .add_drive(0, DriveTerm::new(3.0, c(omega / 2.0, 0.0)), 3.0, c(1.0, 0.0))
            .build(true)
            .unwrap();
        let tlist = linspace(0.0, 2.0, 11);
        let u = PropagatorIntegrator::new(2)
            .unwrap()
            .propagate(&h, &tlist, &HashMap::new())
            .unwrap();
        let expected = rabi_unitaries(omega, &tlist);
        for k in 0..tlist.len() {
            assert_matrix_close(
                &u.index_axis(Axis(0), k).to_owned(),
                &expected.index_axis(Axis(0), k).to_owned(),
                1e-10,
            );
        }
    }

    #[test]
    fn test_text_coefficient_converges_with_substeps() {
        let h = HamiltonianBuilder::new(2, 1)
            .with_static(pauli_z() * c(0.5, 0.0))
            .add_drive(0, DriveTerm::new(1.3, c(0.2, 0.0)), 1.0, c(1.0, 0.0))
            .build(true)
            .unwrap();
        let tlist = vec![0.0, 3.0];
        let coarse = PropagatorIntegrator::new(100)
            .unwrap()
            .propagate(&h, &tlist, &HashMap::new())
            .unwrap();
        let fine = PropagatorIntegrator::new(400)
            .unwrap()
            .propagate(&h, &tlist, &HashMap::new())
            .unwrap();
        assert_matrix_close(
            &coarse.index_axis(Axis(0), 1).to_owned(),
            &fine.index_axis(Axis(0), 1).to_owned(),
            1e-4,
        );
        // unitarity
        let u = fine.index_axis(Axis(0), 1).to_owned();
        let uu = u.dot(&u.t().mapv(|z| z.conj()));
        assert_matrix_close(&uu, &identity(2), 1e-10);
    }

    #[test]
    fn test_pulse_then_silence_freezes_evolution() {
        let pulse = Pulse::Square {
            duration: 1.0,
            amp: c(0.5, 0.0),
        };
        let h = HamiltonianBuilder::new(2, 1)
            .add_drive(0, DriveTerm::new(2.0, pulse), 2.0, c(1.0, 0.0))
            .build(true)
            .unwrap();
        let tlist = vec![0.0, 1.0, 2.0, 3.0];
        let u = PropagatorIntegrator::default()
            .propagate(&h, &tlist, &HashMap::new())
            .unwrap();
        let after = u.index_axis(Axis(0), 1).to_owned();
        assert_matrix_close(&u.index_axis(Axis(0), 3).to_owned(), &after, 1e-12);
        let expected = rabi_unitaries(1.0, &[1.0]);
        assert_matrix_close(&after, &expected.index_axis(Axis(0), 0).to_owned(), 1e-10);
    }

    #[test]
    fn test_rejects_bad_grids() {
        let h = HamiltonianBuilder::new(2, 1).build(true).unwrap();
        let integrator = PropagatorIntegrator::default();
        assert!(integrator.propagate(&h, &[], &HashMap::new()).is_err());
        assert!(integrator.propagate(&h, &[1.0, 0.0], &HashMap::new()).is_err());
        assert!(PropagatorIntegrator::new(0).is_err());
    }
}
