// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Effective-Hamiltonian extraction.
//!
//! Given a unitary series `U(t)`, [`IterativeFit`] finds coefficients
//! `c_a` such that `U(t) ≈ exp(-i·Σ c_a P_a·t)` over the window before any
//! eigenphase reaches the branch cut of the logarithm.
//!
//! # Example
//!
//! ```
//! use qudit_sim::config::ExtractionConfig;
//! use qudit_sim::heff::{IterativeFit, Termination};
//! use qudit_sim::pauli::PauliProductBasis;
//! use ndarray::{Array2, Array3, Axis};
//! use num_complex::Complex64;
//!
//! // U(t) = exp(-i·0.4·Z·t)
//! let tlist: Vec<f64> = (0..11).map(|k| 0.2 * k as f64).collect();
//! let mut unitaries = Array3::zeros((tlist.len(), 2, 2));
//! for (mut u, &t) in unitaries.axis_iter_mut(Axis(0)).zip(&tlist) {
//!     u.assign(&Array2::from_diag(&ndarray::arr1(&[
//!         Complex64::new(0.0, -0.4 * t).exp(),
//!         Complex64::new(0.0, 0.4 * t).exp(),
//!     ])));
//! }
//!
//! let basis = PauliProductBasis::new(2, 1)?;
//! let report = IterativeFit::new(ExtractionConfig::default()).run(unitaries.view(), &tlist, &basis)?;
//! assert_eq!(report.termination, Termination::ResidualNegligible);
//! assert!((report.heff_coeffs[3] - 0.4).abs() < 1e-9);
//! # Ok::<(), qudit_sim::Error>(())
//! ```

mod common;
mod fit;
mod generator;
mod iterative;

pub use common::{compose_ueff, heff_expr, heff_fidelity, make_heff};
pub use fit::{fit_through_origin, LinearFit};
pub use generator::{extract_generators, find_last_valid_it, GeneratorSeries};
pub use iterative::{FitReport, IterationRecord, IterativeFit, Termination};
