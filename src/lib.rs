// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! qudit-sim
//!
//! Drive-sequence compilation and effective-Hamiltonian extraction for
//! driven multi-level quantum systems.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Iterative extraction (heff)     │
//! ├──────────────────┬──────────────────────┤
//! │  Pauli basis     │  matrix_ufunc        │
//! │  (pauli)         │  (linalg)            │
//! ├──────────────────┴──────────────────────┤
//! │   Hamiltonian assembly + integrator     │
//! ├─────────────────────────────────────────┤
//! │        Drive sequence compiler          │
//! ├────────────────┬────────────────────────┤
//! │ Time functions │  Text expressions      │
//! │ (expression)   │  (expression::text)    │
//! └────────────────┴────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`expression`]: Time-function algebra and text coefficients
//! - [`drive`]: Drive instructions and the sequence compiler
//! - [`pulse`]: Finite-duration pulse envelopes
//! - [`hamiltonian`]: Hamiltonian assembly
//! - [`evolution`]: Integrator seam and reference propagator
//! - [`linalg`]: Matrix exponential and batched matrix functions
//! - [`pauli`]: Generalized Pauli product basis
//! - [`heff`]: Effective-Hamiltonian extraction
//! - [`gate`]: Gate identification from final unitaries
//! - [`run`]: Run descriptions for the command line
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod config;
pub mod drive;
pub mod error;
pub mod evolution;
pub mod expression;
pub mod gate;
pub mod hamiltonian;
pub mod heff;
pub mod linalg;
pub mod pauli;
pub mod pulse;
pub mod run;

pub use config::Config;
pub use error::{Error, Result};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
