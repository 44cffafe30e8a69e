// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Iterative effective-Hamiltonian extraction.
//!
//! Each iteration takes the current residual series
//! `U(t)·U_eff(t)†`, extracts its generators, fits every non-identity
//! basis component with a line through the origin and accepts the
//! strongest well-fitting components into `H_eff`. Every iteration's
//! diagnostic state is appended to the report.

use std::fmt;
use std::path::PathBuf;

use ndarray::{s, Array2, Array3, ArrayView1, ArrayView3, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::common::compose_ueff;
use super::fit::fit_through_origin;
use super::generator::{extract_generators, find_last_valid_it};
use crate::config::{Config, ExtractionConfig};
use crate::error::{LinalgError, Result};
use crate::pauli::OperatorBasis;

/// Why the extraction stopped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Selection found no acceptable component
    NoCandidates,
    /// Residual generators are below the tolerance everywhere
    ResidualNegligible,
    /// `max_iterations` reached
    IterationCap,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::NoCandidates => write!(f, "no candidates"),
            Termination::ResidualNegligible => write!(f, "residual negligible"),
            Termination::IterationCap => write!(f, "iteration cap"),
        }
    }
}

/// Diagnostic state of one iteration.
///
/// Per-element vectors have one entry per basis element; the identity
/// (index 0) is never fitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Eigenphases `arg λ` of the residual unitaries, shape `(time, dim)`.
    /// The generator eigenvalues are their negatives.
    pub ilogvs: Array2<f64>,
    /// Basis coefficients of the residual generators, shape `(time, basis)`
    pub ilogu_coeffs: Array2<f64>,
    /// Number of leading time points usable for fitting
    pub last_valid_it: usize,
    /// Fitted rates
    pub coeffs: Vec<f64>,
    pub fit_success: Vec<bool>,
    /// Normalised deviation from the fitted line
    pub com: Vec<f64>,
    /// `|rate|` relative to the largest accepted rate so far
    pub coeff_ratio: Vec<f64>,
    pub is_candidate: Vec<bool>,
    /// Basis indices accepted this iteration, strongest first
    pub selected: Vec<usize>,
    /// Cumulative effective Hamiltonian after this iteration
    pub heff_coeffs: Vec<f64>,
}

/// Full result of an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub tlist: Vec<f64>,
    pub labels: Vec<String>,
    pub controls: ExtractionConfig,
    pub iterations: Vec<IterationRecord>,
    /// Final effective-Hamiltonian coefficients
    pub heff_coeffs: Vec<f64>,
    pub termination: Termination,
}

impl FitReport {
    /// Accepted terms as `(label, coefficient)`, largest magnitude first.
    pub fn terms(&self) -> Vec<(&str, f64)> {
        let mut terms: Vec<(&str, f64)> = self
            .labels
            .iter()
            .zip(&self.heff_coeffs)
            .filter(|(_, c)| **c != 0.0)
            .map(|(l, c)| (l.as_str(), *c))
            .collect();
        terms.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        terms
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-element outcome of the fit step.
struct ElementFit {
    rate: f64,
    success: bool,
    com: f64,
    ratio: f64,
    candidate: bool,
}

/// Iterative extraction engine.
#[derive(Debug, Clone)]
pub struct IterativeFit {
    controls: ExtractionConfig,
    capture_dir: Option<PathBuf>,
}

impl IterativeFit {
    pub fn new(controls: ExtractionConfig) -> Self {
        Self {
            controls,
            capture_dir: None,
        }
    }

    /// Controls from `extraction`, capture directory from `diagnostics`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            controls: config.extraction.clone(),
            capture_dir: config.diagnostics.failure_dir.clone(),
        }
    }

    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }

    pub fn controls(&self) -> &ExtractionConfig {
        &self.controls
    }

    /// Run the extraction on `U(tlist[k])`, shape `(time, dim, dim)`.
    pub fn run<B>(
        &self,
        unitaries: ArrayView3<Complex64>,
        tlist: &[f64],
        basis: &B,
    ) -> Result<FitReport>
    where
        B: OperatorBasis + ?Sized,
    {
        let (points, n, m) = unitaries.dim();
        if points != tlist.len() || points < 2 {
            return Err(LinalgError::Shape(format!(
                "need at least two unitaries matching the time grid, got {} unitaries for {} times",
                points,
                tlist.len()
            ))
            .into());
        }
        if n != m || n != basis.dim() {
            return Err(LinalgError::Shape(format!(
                "unitaries are {}x{} but the basis acts on dimension {}",
                n,
                m,
                basis.dim()
            ))
            .into());
        }

        let controls = &self.controls;
        let size = basis.len();
        let mut heff = vec![0.0_f64; size];
        let mut residual: Array3<Complex64> = unitaries.to_owned();
        let mut iterations = Vec::new();
        let mut termination = Termination::IterationCap;

        for iteration in 0..controls.max_iterations {
            let series = extract_generators(residual.view(), self.capture_dir.as_deref())?;
            let last_valid_it = find_last_valid_it(series.phases.view(), controls.branch_margin);
            let ilogu_coeffs = basis.decompose(series.generators.view())?;

            let max_heff = heff.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
            let times = &tlist[..last_valid_it];
            let fits: Vec<ElementFit> = (0..size)
                .map(|index| {
                    if index == 0 {
                        return ElementFit {
                            rate: 0.0,
                            success: false,
                            com: 0.0,
                            ratio: 0.0,
                            candidate: false,
                        };
                    }
                    let column = ilogu_coeffs.column(index);
                    let values: Vec<f64> = column.iter().take(last_valid_it).copied().collect();
                    let peak = values.iter().fold(0.0_f64, |acc, y| acc.max(y.abs()));
                    let fit = fit_through_origin(times, &values);
                    let ratio = if max_heff > 0.0 {
                        fit.rate.abs() / max_heff
                    } else {
                        0.0
                    };
                    let mut candidate = fit.success
                        && fit.com < controls.max_com
                        && fit.rate != 0.0
                        && peak > controls.residual_tolerance;
                    if iteration > 0 {
                        candidate &= ratio > controls.min_coeff_ratio || last_valid_it != points;
                    }
                    ElementFit {
                        rate: fit.rate,
                        success: fit.success,
                        com: fit.com,
                        ratio,
                        candidate,
                    }
                })
                .collect();

            let residual_max = ilogu_coeffs
                .slice(s![.., 1..])
                .iter()
                .fold(0.0_f64, |acc, c| acc.max(c.abs()));

            let selected = if residual_max <= controls.residual_tolerance {
                Vec::new()
            } else {
                select(&fits, controls.num_update_per_iteration)
            };
            for &index in &selected {
                heff[index] += fits[index].rate;
            }

            info!(
                iteration,
                last_valid_it,
                candidates = fits.iter().filter(|f| f.candidate).count(),
                selected = selected.len(),
                residual_max,
                "Extraction iteration"
            );

            iterations.push(IterationRecord {
                ilogvs: series.phases.mapv(|p| -p),
                ilogu_coeffs,
                last_valid_it,
                coeffs: fits.iter().map(|f| f.rate).collect(),
                fit_success: fits.iter().map(|f| f.success).collect(),
                com: fits.iter().map(|f| f.com).collect(),
                coeff_ratio: fits.iter().map(|f| f.ratio).collect(),
                is_candidate: fits.iter().map(|f| f.candidate).collect(),
                selected: selected.clone(),
                heff_coeffs: heff.clone(),
            });

            if residual_max <= controls.residual_tolerance {
                termination = Termination::ResidualNegligible;
                break;
            }
            if selected.is_empty() {
                termination = Termination::NoCandidates;
                break;
            }

            residual = residual_series(unitaries, &heff, basis, tlist)?;
            debug!(iteration, "Residual series updated");
        }

        info!(
            iterations = iterations.len(),
            termination = %termination,
            "Extraction finished"
        );

        Ok(FitReport {
            tlist: tlist.to_vec(),
            labels: basis.labels().to_vec(),
            controls: controls.clone(),
            iterations,
            heff_coeffs: heff,
            termination,
        })
    }
}

/// Candidates ordered by descending `|rate|`, at most `cap` of them.
/// Ties keep basis order.
fn select(fits: &[ElementFit], cap: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..fits.len()).filter(|&i| fits[i].candidate).collect();
    indices.sort_by(|&a, &b| fits[b].rate.abs().total_cmp(&fits[a].rate.abs()));
    indices.truncate(cap);
    indices
}

/// `U(t)·exp(+i·H_eff·t)`.
fn residual_series<B>(
    unitaries: ArrayView3<Complex64>,
    heff: &[f64],
    basis: &B,
    tlist: &[f64],
) -> Result<Array3<Complex64>>
where
    B: OperatorBasis + ?Sized,
{
    let coeffs = ArrayView1::from(heff);
    let ueff_dag = compose_ueff(coeffs, basis, tlist, 1.0)?;
    let mut out = Array3::zeros(unitaries.raw_dim());
    Zip::from(out.outer_iter_mut())
        .and(unitaries.outer_iter())
        .and(ueff_dag.outer_iter())
        .for_each(|mut slot, u, v| slot.assign(&u.dot(&v)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heff::common::heff_fidelity;
    use crate::linalg::{identity, kron};
    use crate::pauli::PauliProductBasis;
    use ndarray::Array1;
    use crate::test_utils::{evolve, linspace, pauli_x, pauli_z, rabi_unitaries};
    use approx::assert_relative_eq;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    #[test]
    fn test_rabi_recovers_x_in_one_iteration() {
        let omega = 0.6;
        let tlist = linspace(0.0, 4.0, 41);
        // ΩT = 2.4 < π
        let unitaries = rabi_unitaries(omega, &tlist);
        let basis = PauliProductBasis::new(2, 1).unwrap();
        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();

        let first = &report.iterations[0];
        assert_eq!(first.last_valid_it, tlist.len());
        assert_eq!(first.selected, vec![1]);
        assert_relative_eq!(first.heff_coeffs[1], omega / 2.0, epsilon = 1e-9);
        assert_relative_eq!(report.heff_coeffs[1], omega / 2.0, epsilon = 1e-9);
        for index in [0, 2, 3] {
            assert_relative_eq!(report.heff_coeffs[index], 0.0, epsilon = 1e-9);
        }
        assert_eq!(report.termination, Termination::ResidualNegligible);
        assert_eq!(report.iterations.len(), 2);
    }

    #[test]
    fn test_selection_prefers_largest_magnitude() {
        let basis = PauliProductBasis::new(2, 2).unwrap();
        let xi = basis.index_of(&[1, 0]).unwrap();
        let iz = basis.index_of(&[0, 3]).unwrap();
        let h = kron(&pauli_x(), &identity(2)) * c(0.5)
            + kron(&identity(2), &pauli_z()) * c(-0.9);
        let tlist = linspace(0.0, 2.0, 21);
        let unitaries = evolve(&h, &tlist);

        let controls = ExtractionConfig {
            num_update_per_iteration: 1,
            ..ExtractionConfig::default()
        };
        let report = IterativeFit::new(controls)
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();

        let first = &report.iterations[0];
        assert!(first.is_candidate[xi] && first.is_candidate[iz]);
        assert_eq!(first.selected, vec![iz]);
        assert_relative_eq!(first.heff_coeffs[iz], -0.9, epsilon = 1e-9);
        assert_eq!(first.heff_coeffs[xi], 0.0);

        assert_eq!(report.iterations[1].selected, vec![xi]);
        assert_relative_eq!(report.heff_coeffs[xi], 0.5, epsilon = 1e-9);
        assert_relative_eq!(report.heff_coeffs[iz], -0.9, epsilon = 1e-9);
        assert_eq!(report.termination, Termination::ResidualNegligible);

        let fidelity = heff_fidelity(
            unitaries.view(),
            ArrayView1::from(&report.heff_coeffs[..]),
            &basis,
            &tlist,
        )
        .unwrap();
        assert!(fidelity.iter().all(|f| (f - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_qutrit_extraction_reaches_negligible_residual() {
        let basis = PauliProductBasis::new(3, 1).unwrap();
        let mut coeffs = Array1::zeros(basis.len());
        coeffs[1] = 0.3;
        coeffs[4] = -0.2;
        coeffs[8] = 0.15;
        let h = basis.compose(coeffs.view()).unwrap();
        let tlist = linspace(0.0, 3.0, 31);
        let unitaries = evolve(&h, &tlist);

        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();
        assert_eq!(report.termination, Termination::ResidualNegligible);
        assert_eq!(report.iterations[0].last_valid_it, tlist.len());
        for (got, expected) in report.heff_coeffs.iter().zip(coeffs.iter()) {
            assert_relative_eq!(*got, *expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_two_qutrit_extraction() {
        let basis = PauliProductBasis::new(3, 2).unwrap();
        let mut coeffs = Array1::zeros(basis.len());
        let terms = [([1, 0], 0.3), ([4, 8], -0.2), ([0, 3], 0.1)];
        for (elements, value) in terms {
            coeffs[basis.index_of(&elements).unwrap()] = value;
        }
        let h = basis.compose(coeffs.view()).unwrap();
        let tlist = linspace(0.0, 3.0, 31);
        let unitaries = evolve(&h, &tlist);

        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();
        assert_eq!(report.termination, Termination::ResidualNegligible);
        let mut selected = report.iterations[0].selected.clone();
        selected.sort_unstable();
        let mut expected: Vec<usize> = terms
            .iter()
            .map(|(elements, _)| basis.index_of(elements).unwrap())
            .collect();
        expected.sort_unstable();
        assert_eq!(selected, expected);
        for (got, expected) in report.heff_coeffs.iter().zip(coeffs.iter()) {
            assert_relative_eq!(*got, *expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_branch_cut_limits_fit_window() {
        // eigenphases ±1.0·t reach π - 0.1 just after t = 3.0
        let h = pauli_z() * c(1.0);
        let tlist = linspace(0.0, 4.0, 41);
        let unitaries = evolve(&h, &tlist);
        let basis = PauliProductBasis::new(2, 1).unwrap();
        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();

        let first = &report.iterations[0];
        assert_eq!(first.last_valid_it, 31);
        assert_eq!(first.ilogvs.nrows(), tlist.len());
        assert_relative_eq!(report.heff_coeffs[3], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ilogvs_are_unitary_eigenphases() {
        // energies 0.5 and -0.1, so U(t) has phases -0.5·t and 0.1·t
        let h = identity(2) * c(0.2) + pauli_z() * c(0.3);
        let tlist = linspace(0.0, 2.0, 5);
        let unitaries = evolve(&h, &tlist);
        let basis = PauliProductBasis::new(2, 1).unwrap();
        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();

        let mut phases: Vec<f64> = report.iterations[0].ilogvs.row(2).to_vec();
        phases.sort_by(f64::total_cmp);
        assert_relative_eq!(phases[0], -0.5, epsilon = 1e-12);
        assert_relative_eq!(phases[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_iteration_cap_and_no_candidates() {
        let tlist = linspace(0.0, 2.0, 11);
        let basis = PauliProductBasis::new(2, 1).unwrap();

        // strongly curved trajectory: rotating axis, nothing fits a line
        let mats: Vec<Array2<Complex64>> = tlist
            .iter()
            .map(|&t| {
                let h = pauli_x() * c((3.0 * t).cos()) + pauli_z() * c((3.0 * t).sin());
                crate::linalg::matrix_exp(&(h * Complex64::new(0.0, -t))).unwrap()
            })
            .collect();
        let unitaries = crate::test_utils::stack(&mats);
        let strict = ExtractionConfig {
            max_com: 1e-6,
            ..ExtractionConfig::default()
        };
        let report = IterativeFit::new(strict)
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();
        assert_eq!(report.termination, Termination::NoCandidates);
        assert_eq!(report.iterations.len(), 1);
        assert!(report.heff_coeffs.iter().all(|c| *c == 0.0));

        let capped = ExtractionConfig {
            max_com: 10.0,
            max_iterations: 1,
            ..ExtractionConfig::default()
        };
        let report = IterativeFit::new(capped)
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();
        assert_eq!(report.termination, Termination::IterationCap);
        assert_eq!(report.iterations.len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let tlist = linspace(0.0, 1.0, 5);
        let unitaries = rabi_unitaries(1.0, &tlist);
        let basis = PauliProductBasis::new(2, 1).unwrap();
        let report = IterativeFit::new(ExtractionConfig::default())
            .run(unitaries.view(), &tlist, &basis)
            .unwrap();
        let json = report.to_json().unwrap();
        let back: FitReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.termination, report.termination);
        assert_eq!(back.iterations.len(), report.iterations.len());
        assert_eq!(report.terms()[0].0, "X");
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let basis = PauliProductBasis::new(3, 1).unwrap();
        let tlist = linspace(0.0, 1.0, 3);
        let unitaries = rabi_unitaries(1.0, &tlist);
        let fit = IterativeFit::new(ExtractionConfig::default());
        assert!(fit.run(unitaries.view(), &tlist, &basis).is_err());
        let basis = PauliProductBasis::new(2, 1).unwrap();
        assert!(fit.run(unitaries.view(), &tlist[..2], &basis).is_err());
    }
}
