// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run descriptions for the command line.
//!
//! A run file names the system, its drives and a time grid:
//!
//! ```yaml
//! levels: 2
//! qudits: 1
//! static_diagonal: [0.0, 0.0]
//! rwa: true
//! drives:
//!   - qudit: 0
//!     frame_frequency: 5.0
//!     sequence:
//!       - set_frequency: 5.0
//!       - pulse: {constant: [0.3, 0.0]}
//! tlist:
//!   duration: 4.0
//!   points: 41
//! ```

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::drive::{Amplitude, DriveTerm, DriveWarning, Instruction, SampledEnvelope};
use crate::error::{Error, Result};
use crate::evolution::{Integrator, PropagatorIntegrator};
use crate::gate::{gate_components, GateComponents};
use crate::hamiltonian::HamiltonianBuilder;
use crate::heff::{heff_fidelity, FitReport, IterativeFit};
use crate::pauli::PauliProductBasis;
use crate::pulse::Pulse;

/// Instruction with literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSpec {
    SetFrequency(f64),
    ShiftFrequency(f64),
    SetPhase(f64),
    ShiftPhase(f64),
    Delay(f64),
    Pulse(AmplitudeSpec),
}

/// Amplitude of a pulse instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeSpec {
    Constant(Complex64),
    Text(String),
    Sampled { dt: f64, values: Vec<Complex64> },
    Envelope(Pulse),
}

impl From<&InstructionSpec> for Instruction {
    fn from(spec: &InstructionSpec) -> Self {
        match spec {
            InstructionSpec::SetFrequency(v) => Instruction::set_frequency(*v),
            InstructionSpec::ShiftFrequency(v) => Instruction::shift_frequency(*v),
            InstructionSpec::SetPhase(v) => Instruction::set_phase(*v),
            InstructionSpec::ShiftPhase(v) => Instruction::shift_phase(*v),
            InstructionSpec::Delay(v) => Instruction::delay(*v),
            InstructionSpec::Pulse(amp) => Instruction::pulse(match amp {
                AmplitudeSpec::Constant(z) => Amplitude::from(*z),
                AmplitudeSpec::Text(src) => Amplitude::from(src.clone()),
                AmplitudeSpec::Sampled { dt, values } => Amplitude::from(SampledEnvelope::new(
                    *dt,
                    Array1::from(values.clone()),
                )),
                AmplitudeSpec::Envelope(pulse) => Amplitude::from(pulse.clone()),
            }),
        }
    }
}

fn default_drive_base() -> Complex64 {
    Complex64::new(1.0, 0.0)
}

fn default_rwa() -> bool {
    true
}

/// One drive channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSpec {
    pub qudit: usize,
    pub frame_frequency: f64,
    #[serde(default = "default_drive_base")]
    pub drive_base: Complex64,
    #[serde(default)]
    pub constant_phase: Option<f64>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub sequence: Vec<InstructionSpec>,
}

impl DriveSpec {
    pub fn to_term(&self) -> DriveTerm {
        let term = DriveTerm::from_sequence(self.sequence.iter().map(Instruction::from).collect());
        match self.constant_phase {
            Some(phase) => term.with_constant_phase(phase),
            None => term,
        }
    }
}

/// Time grid of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeGrid {
    /// Explicit time points
    Values { values: Vec<f64> },
    /// `points` evenly spaced points on `[0, duration]`
    Uniform { duration: f64, points: usize },
    /// Derived from the fastest literal frequency of the system
    Cycles {
        points_per_cycle: usize,
        num_cycles: usize,
    },
}

/// Complete run description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub levels: usize,
    pub qudits: usize,
    /// Diagonal of the static Hamiltonian
    #[serde(default)]
    pub static_diagonal: Option<Vec<f64>>,
    #[serde(default = "default_rwa")]
    pub rwa: bool,
    /// Levels per qudit for the reported gate; all levels when unset
    #[serde(default)]
    pub comp_dim: Option<usize>,
    #[serde(default)]
    pub drives: Vec<DriveSpec>,
    pub tlist: TimeGrid,
}

impl RunSpec {
    /// Load a run description from YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn builder(&self) -> Result<HamiltonianBuilder> {
        let mut builder = HamiltonianBuilder::new(self.levels, self.qudits);
        if let Some(diag) = &self.static_diagonal {
            let dim = builder.dim();
            if diag.len() != dim {
                return Err(Error::Config(format!(
                    "static_diagonal has {} entries, expected {}",
                    diag.len(),
                    dim
                )));
            }
            let values: Array1<Complex64> = diag.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            builder = builder.with_static(Array2::from_diag(&values));
        }
        for drive in &self.drives {
            builder = builder.add_drive(
                drive.qudit,
                drive.to_term(),
                drive.frame_frequency,
                drive.drive_base,
            );
        }
        Ok(builder)
    }

    pub fn time_grid(&self, builder: &HamiltonianBuilder) -> Result<Vec<f64>> {
        match &self.tlist {
            TimeGrid::Values { values } => Ok(values.clone()),
            TimeGrid::Uniform { duration, points } => {
                if *points < 2 || !(*duration > 0.0) {
                    return Err(Error::Config(
                        "tlist needs duration > 0 and at least two points".into(),
                    ));
                }
                Ok(Array1::linspace(0.0, *duration, *points).to_vec())
            }
            TimeGrid::Cycles {
                points_per_cycle,
                num_cycles,
            } => builder.make_tlist(*points_per_cycle, *num_cycles, self.rwa),
        }
    }
}

/// Result of [`run_extraction`].
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub report: FitReport,
    /// Fidelity of the final effective Hamiltonian per time point
    pub fidelity: Vec<f64>,
    /// Generator components of the unitary at the last time point
    pub gate: GateComponents,
    #[serde(skip)]
    pub warnings: Vec<DriveWarning>,
}

/// Build, integrate and extract.
pub fn run_extraction(spec: &RunSpec, config: &Config) -> Result<RunOutcome> {
    let builder = spec.builder()?;
    let hamiltonian = builder.build(spec.rwa)?;
    for warning in &hamiltonian.warnings {
        warn!(%warning, "Drive compiled with warning");
    }
    let tlist = spec.time_grid(&builder)?;

    let integrator = PropagatorIntegrator::from_config(&config.integrator)?;
    let unitaries = integrator.propagate(&hamiltonian, &tlist, &HashMap::new())?;

    let basis = PauliProductBasis::new(spec.levels, spec.qudits)?;
    let report = IterativeFit::from_config(config).run(unitaries.view(), &tlist, &basis)?;
    let coeffs = Array1::from(report.heff_coeffs.clone());
    let fidelity = heff_fidelity(unitaries.view(), coeffs.view(), &basis, &tlist)?;
    let last = unitaries.len_of(Axis(0)) - 1;
    let gate = gate_components(unitaries.index_axis(Axis(0), last), &basis, spec.comp_dim)?;

    info!(
        points = tlist.len(),
        iterations = report.iterations.len(),
        termination = %report.termination,
        min_fidelity = fidelity.iter().copied().fold(1.0, f64::min),
        "Run complete"
    );

    Ok(RunOutcome {
        report,
        fidelity: fidelity.to_vec(),
        gate,
        warnings: hamiltonian.warnings,
    })
}
