// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hamiltonian assembly.
//!
//! A compiled Hamiltonian is an optional static operator followed by
//! `(operator, coefficient)` pairs:
//!
//! ```text
//! H(t) = H_0 + Σ_k c_k(t)·O_k
//! ```
//!
//! Each drive on qudit `q` contributes `(a_q + a_q†, x(t))` and
//! `(i(a_q − a_q†), y(t))`, with `a_q` the harmonic lowering operator.

use std::collections::{BTreeSet, HashMap};
use std::f64::consts::PI;

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use tracing::debug;

use crate::drive::{Amplitude, Coefficient, DriveTerm, DriveWarning, Instruction};
use crate::error::{Error, LinalgError, Result};
use crate::expression::Scalar;
use crate::linalg::{dagger, identity, kron, matrix_ufunc, MatrixFunctionOptions};

/// One time-dependent term.
#[derive(Debug, Clone)]
pub struct HamiltonianTerm {
    pub operator: Array2<Complex64>,
    pub coefficient: Coefficient,
}

/// Compiled Hamiltonian `H_0 + Σ c_k(t)·O_k`.
#[derive(Debug, Clone)]
pub struct Hamiltonian {
    pub dim: usize,
    pub static_term: Option<Array2<Complex64>>,
    pub terms: Vec<HamiltonianTerm>,
    pub warnings: Vec<DriveWarning>,
}

impl Hamiltonian {
    /// Names of the unbound parameters across all coefficients.
    pub fn parameter_names(&self) -> BTreeSet<String> {
        self.terms
            .iter()
            .flat_map(|term| term.coefficient.parameters())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// `H(t)` with parameters bound by name.
    pub fn evaluate(&self, t: f64, args: &HashMap<String, f64>) -> Result<Array2<Complex64>> {
        let mut h = match &self.static_term {
            Some(op) => op.clone(),
            None => Array2::zeros((self.dim, self.dim)),
        };
        for term in &self.terms {
            let c = term.coefficient.evaluate(t, args)?;
            if c != 0.0 {
                h.scaled_add(Complex64::new(c, 0.0), &term.operator);
            }
        }
        Ok(h)
    }
}

#[derive(Debug, Clone)]
struct DriveChannel {
    qudit: usize,
    term: DriveTerm,
    frame_frequency: f64,
    drive_base: Complex64,
}

/// Builder for drive Hamiltonians on `num_qudits` qudits of `num_levels`
/// levels each.
#[derive(Debug, Clone)]
pub struct HamiltonianBuilder {
    num_levels: usize,
    num_qudits: usize,
    static_term: Option<Array2<Complex64>>,
    drives: Vec<DriveChannel>,
}

impl HamiltonianBuilder {
    pub fn new(num_levels: usize, num_qudits: usize) -> Self {
        Self {
            num_levels,
            num_qudits,
            static_term: None,
            drives: Vec::new(),
        }
    }

    pub fn with_static(mut self, operator: Array2<Complex64>) -> Self {
        self.static_term = Some(operator);
        self
    }

    /// Add a drive on `qudit` seen from a frame rotating at
    /// `frame_frequency`, scaled by `drive_base`.
    pub fn add_drive(
        mut self,
        qudit: usize,
        term: DriveTerm,
        frame_frequency: f64,
        drive_base: Complex64,
    ) -> Self {
        self.drives.push(DriveChannel {
            qudit,
            term,
            frame_frequency,
            drive_base,
        });
        self
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn num_qudits(&self) -> usize {
        self.num_qudits
    }

    /// Full Hilbert space dimension.
    pub fn dim(&self) -> usize {
        self.num_levels.pow(self.num_qudits as u32)
    }

    /// Latest end time across drives; `None` without drives or when any
    /// drive is indefinite.
    pub fn duration(&self) -> Option<f64> {
        if self.drives.is_empty() {
            return None;
        }
        self.drives
            .iter()
            .map(|drive| drive.term.duration())
            .try_fold(0.0_f64, |acc, d| d.map(|d| acc.max(d)))
    }

    /// Harmonic lowering operator `a = Σ sqrt(n)|n-1⟩⟨n|` on one qudit,
    /// embedded in the full space.
    pub fn lowering_operator(&self, qudit: usize) -> Result<Array2<Complex64>> {
        if qudit >= self.num_qudits {
            return Err(LinalgError::Shape(format!(
                "qudit index {} out of range for {} qudits",
                qudit, self.num_qudits
            ))
            .into());
        }
        let d = self.num_levels;
        let mut a = Array2::zeros((d, d));
        for n in 1..d {
            a[[n - 1, n]] = Complex64::new((n as f64).sqrt(), 0.0);
        }
        let mut out = Array2::from_elem((1, 1), Complex64::new(1.0, 0.0));
        for q in 0..self.num_qudits {
            let factor = if q == qudit { a.clone() } else { identity(d) };
            out = kron(&out, &factor);
        }
        Ok(out)
    }

    /// Compile every drive into `(operator, coefficient)` pairs.
    pub fn build(&self, rwa: bool) -> Result<Hamiltonian> {
        if self.num_levels < 2 || self.num_qudits == 0 {
            return Err(Error::Config(format!(
                "need num_levels >= 2 and num_qudits >= 1, got {} and {}",
                self.num_levels, self.num_qudits
            )));
        }
        let dim = self.dim();
        if let Some(op) = &self.static_term {
            if op.dim() != (dim, dim) {
                return Err(LinalgError::Shape(format!(
                    "static term is {}x{}, expected {}x{}",
                    op.nrows(),
                    op.ncols(),
                    dim,
                    dim
                ))
                .into());
            }
        }

        let mut terms = Vec::new();
        let mut warnings = Vec::new();
        for drive in &self.drives {
            let a = self.lowering_operator(drive.qudit)?;
            let a_dag = dagger(&a.view());
            let x_op = &a + &a_dag;
            let y_op = (&a - &a_dag) * Complex64::new(0.0, 1.0);

            let coeffs = drive
                .term
                .generate_fn(drive.frame_frequency, drive.drive_base, rwa)?;
            warnings.extend(coeffs.warnings);
            for (operator, coefficient) in [(x_op, coeffs.x), (y_op, coeffs.y)] {
                if !coefficient.is_zero() {
                    terms.push(HamiltonianTerm {
                        operator,
                        coefficient,
                    });
                }
            }
        }

        debug!(
            dim,
            drives = self.drives.len(),
            terms = terms.len(),
            rwa,
            "Built Hamiltonian"
        );

        Ok(Hamiltonian {
            dim,
            static_term: self.static_term.clone(),
            terms,
            warnings,
        })
    }

    /// Time grid with `points_per_cycle` points per period of the fastest
    /// literal frequency, over `num_cycles` periods.
    ///
    /// Drive frequencies count as detunings from their frame under RWA and
    /// as carrier plus frame otherwise; the static term contributes its
    /// largest eigenvalue magnitude.
    pub fn make_tlist(
        &self,
        points_per_cycle: usize,
        num_cycles: usize,
        rwa: bool,
    ) -> Result<Vec<f64>> {
        if points_per_cycle == 0 || num_cycles == 0 {
            return Err(Error::Config(
                "points_per_cycle and num_cycles must be > 0".into(),
            ));
        }
        let mut max_frequency = self.static_frequency()?;
        for drive in &self.drives {
            for freq in literal_frequencies(drive.term.sequence()) {
                let f = if rwa {
                    (freq - drive.frame_frequency).abs()
                } else {
                    freq.abs() + drive.frame_frequency.abs()
                };
                max_frequency = max_frequency.max(f);
            }
        }
        if max_frequency == 0.0 {
            // resonant drives only: use the Rabi frequency 2|Ω|
            max_frequency = self
                .drives
                .iter()
                .map(|drive| {
                    2.0 * drive.drive_base.norm() * literal_amplitude(drive.term.sequence())
                })
                .fold(0.0, f64::max);
            debug!(max_frequency, "No literal oscillation, using drive amplitude scale");
        }
        make_tlist(max_frequency, points_per_cycle, num_cycles)
    }

    fn static_frequency(&self) -> Result<f64> {
        let Some(op) = &self.static_term else {
            return Ok(0.0);
        };
        let batch = op.view().insert_axis(Axis(0));
        let out = matrix_ufunc(
            |z| z,
            batch,
            &MatrixFunctionOptions::hermitian().with_diagonals(),
        )?;
        Ok(out
            .diagonals
            .map(|d| d.iter().map(|z| z.re.abs()).fold(0.0, f64::max))
            .unwrap_or(0.0))
    }
}

/// Uniform grid `k·dt`, `dt = 2π / (max_frequency · points_per_cycle)`,
/// with `points_per_cycle · num_cycles + 1` points.
pub fn make_tlist(max_frequency: f64, points_per_cycle: usize, num_cycles: usize) -> Result<Vec<f64>> {
    if !(max_frequency > 0.0 && max_frequency.is_finite()) {
        return Err(Error::Config(format!(
            "cannot derive a time grid from frequency {}; give explicit time points",
            max_frequency
        )));
    }
    let dt = 2.0 * PI / (max_frequency * points_per_cycle as f64);
    let num_points = points_per_cycle * num_cycles + 1;
    Ok((0..num_points).map(|k| k as f64 * dt).collect())
}

/// Largest literal envelope magnitude in a sequence.
fn literal_amplitude(sequence: &[Instruction]) -> f64 {
    sequence
        .iter()
        .filter_map(|inst| match inst {
            Instruction::Pulse(Amplitude::Constant(z)) => Some(z.norm()),
            Instruction::Pulse(Amplitude::Pulse(p)) => Some(p.amp().norm()),
            Instruction::Pulse(Amplitude::Sampled(s)) => {
                Some(s.values.iter().fold(0.0_f64, |acc, z| acc.max(z.norm())))
            }
            _ => None,
        })
        .fold(0.0, f64::max)
}

/// Literal carrier frequencies reachable in a sequence.
fn literal_frequencies(sequence: &[Instruction]) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current: Option<f64> = None;
    for inst in sequence {
        match inst {
            Instruction::SetFrequency(Scalar::Number(f)) => current = Some(*f),
            Instruction::ShiftFrequency(Scalar::Number(df)) => current = current.map(|f| f + df),
            Instruction::SetFrequency(_) | Instruction::ShiftFrequency(_) => current = None,
            Instruction::Pulse(_) => out.extend(current),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Parameter;
    use crate::test_utils::{assert_matrix_close, pauli_x, pauli_y, pauli_z};
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_qubit_drive_operators_are_x_and_y() {
        let builder = HamiltonianBuilder::new(2, 1);
        let a = builder.lowering_operator(0).unwrap();
        let a_dag = dagger(&a.view());
        assert_matrix_close(&(&a + &a_dag), &pauli_x(), 1e-15);
        // i(a - a†) = -Y for a = |0⟩⟨1|
        assert_matrix_close(&((&a - &a_dag) * c(0.0, 1.0)), &(pauli_y() * c(-1.0, 0.0)), 1e-15);
    }

    #[test]
    fn test_lowering_operator_embeds_on_second_qudit() {
        let builder = HamiltonianBuilder::new(3, 2);
        let a1 = builder.lowering_operator(1).unwrap();
        assert_eq!(a1.dim(), (9, 9));
        // |0,1⟩ → |0,0⟩ with amplitude 1, |0,2⟩ → |0,1⟩ with sqrt(2)
        assert_relative_eq!(a1[[0, 1]].re, 1.0);
        assert_relative_eq!(a1[[1, 2]].re, 2f64.sqrt());
        assert_eq!(a1[[0, 3]], c(0.0, 0.0));
        assert!(builder.lowering_operator(2).is_err());
    }

    #[test]
    fn test_build_resonant_drive() {
        let h = HamiltonianBuilder::new(2, 1)
            .with_static(pauli_z() * c(0.0, 0.0))
            .add_drive(0, DriveTerm::new(5.0, c(0.25, 0.0)), 5.0, c(1.0, 0.0))
            .build(true)
            .unwrap();
        // y coefficient is identically zero and dropped
        assert_eq!(h.terms.len(), 1);
        let ht = h.evaluate(0.3, &HashMap::new()).unwrap();
        assert_matrix_close(&ht, &(pauli_x() * c(0.25, 0.0)), 1e-15);
    }

    #[test]
    fn test_build_rejects_bad_static_shape() {
        let err = HamiltonianBuilder::new(3, 1)
            .with_static(pauli_z())
            .build(true)
            .unwrap_err();
        assert!(matches!(err, Error::Linalg(LinalgError::Shape(_))));
    }

    #[test]
    fn test_parameter_names_collected() {
        let term = DriveTerm::new(
            Parameter::new("w"),
            Amplitude::Parameter(Parameter::new("amp").into()),
        );
        let h = HamiltonianBuilder::new(2, 1)
            .add_drive(0, term, 1.0, c(1.0, 0.0))
            .build(true)
            .unwrap();
        let names: Vec<String> = h.parameter_names().into_iter().collect();
        assert_eq!(names, vec!["amp".to_string(), "w".to_string()]);
    }

    #[test]
    fn test_make_tlist_uses_detuning_under_rwa() {
        let builder = HamiltonianBuilder::new(2, 1).add_drive(
            0,
            DriveTerm::new(5.0, c(0.1, 0.0)),
            4.0,
            c(1.0, 0.0),
        );
        let tlist = builder.make_tlist(10, 3, true).unwrap();
        assert_eq!(tlist.len(), 31);
        assert_relative_eq!(tlist[10], 2.0 * PI, epsilon = 1e-12);

        let full = builder.make_tlist(10, 3, false).unwrap();
        assert_relative_eq!(full[10], 2.0 * PI / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_make_tlist_uses_static_spectrum() {
        let builder = HamiltonianBuilder::new(2, 1).with_static(pauli_z() * c(2.0, 0.0));
        let tlist = builder.make_tlist(4, 1, true).unwrap();
        assert_eq!(tlist.len(), 5);
        assert_relative_eq!(tlist[4], PI, epsilon = 1e-12);

        assert!(HamiltonianBuilder::new(2, 1).make_tlist(4, 1, true).is_err());
    }

    #[test]
    fn test_make_tlist_resonant_drive_uses_rabi_frequency() {
        let builder = HamiltonianBuilder::new(2, 1).add_drive(
            0,
            DriveTerm::new(5.0, c(0.3, 0.0)),
            5.0,
            c(1.0, 0.0),
        );
        let tlist = builder.make_tlist(8, 2, true).unwrap();
        assert_eq!(tlist.len(), 17);
        // one Rabi period 2π / 0.6 per 8 points
        assert_relative_eq!(tlist[8], 2.0 * PI / 0.6, epsilon = 1e-12);

        let silent = HamiltonianBuilder::new(2, 1).add_drive(
            0,
            DriveTerm::new(5.0, Amplitude::Parameter(Parameter::new("amp").into())),
            5.0,
            c(1.0, 0.0),
        );
        let err = silent.make_tlist(8, 2, true).unwrap_err();
        assert!(err.to_string().contains("explicit time points"));
    }
}
