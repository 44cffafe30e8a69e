// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for qudit-sim.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. qudit-sim.yaml / config.yaml file (or an explicit path)
//! 3. Environment variables (QUDIT_SIM_*)
//! 4. CLI arguments
//!
//! The `solver.backend` setting is special: it feeds the process-wide
//! coefficient backend toggle read by the drive compiler. [`Config::apply`]
//! publishes it.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};

/// Numeric backend used for compiled drive coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// Literal sequences compile to text expressions for the integrator's
    /// native coefficient path.
    #[default]
    Native,
    /// Every coefficient is compiled to a time-function object.
    Functional,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Native => write!(f, "native"),
            SolverBackend::Functional => write!(f, "functional"),
        }
    }
}

impl std::str::FromStr for SolverBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "native" => Ok(SolverBackend::Native),
            "functional" => Ok(SolverBackend::Functional),
            other => Err(Error::Config(format!("unknown solver backend '{}'", other))),
        }
    }
}

static SOLVER_BACKEND: AtomicU8 = AtomicU8::new(0);

/// Set the process-wide solver backend.
pub fn set_solver_backend(backend: SolverBackend) {
    let raw = match backend {
        SolverBackend::Native => 0,
        SolverBackend::Functional => 1,
    };
    SOLVER_BACKEND.store(raw, Ordering::SeqCst);
}

/// Current process-wide solver backend.
pub fn solver_backend() -> SolverBackend {
    match SOLVER_BACKEND.load(Ordering::SeqCst) {
        1 => SolverBackend::Functional,
        _ => SolverBackend::Native,
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coefficient backend selection
    #[serde(default)]
    pub solver: SolverConfig,

    /// Iterative extraction defaults
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Reference integrator settings
    #[serde(default)]
    pub integrator: IntegratorConfig,

    /// Failure capture settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["qudit-sim.yaml", "qudit-sim.yml", "config.yaml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("QUDIT_SIM_BACKEND") {
            match val.parse() {
                Ok(backend) => self.solver.backend = backend,
                Err(e) => tracing::warn!(error = %e, "Ignoring QUDIT_SIM_BACKEND"),
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_MAX_COM") {
            if let Ok(v) = val.parse() {
                self.extraction.max_com = v;
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_MIN_COEFF_RATIO") {
            if let Ok(v) = val.parse() {
                self.extraction.min_coeff_ratio = v;
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_NUM_UPDATE_PER_ITERATION") {
            if let Ok(v) = val.parse() {
                self.extraction.num_update_per_iteration = v;
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_MAX_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.extraction.max_iterations = v;
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_SUBSTEPS") {
            if let Ok(v) = val.parse() {
                self.integrator.substeps = v;
            }
        }
        if let Ok(val) = env::var("QUDIT_SIM_FAILURE_DIR") {
            self.diagnostics.failure_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("QUDIT_SIM_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("QUDIT_SIM_LOG_JSON") {
            self.logging.json = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        let ex = &self.extraction;
        if ex.max_com.is_nan() || ex.max_com <= 0.0 {
            return Err(Error::Config("extraction.max_com must be > 0".into()));
        }
        if ex.min_coeff_ratio.is_nan() || ex.min_coeff_ratio < 0.0 {
            return Err(Error::Config(
                "extraction.min_coeff_ratio must be >= 0".into(),
            ));
        }
        if ex.num_update_per_iteration == 0 {
            return Err(Error::Config(
                "extraction.num_update_per_iteration must be > 0".into(),
            ));
        }
        if ex.max_iterations == 0 {
            return Err(Error::Config("extraction.max_iterations must be > 0".into()));
        }
        if ex.residual_tolerance.is_nan() || ex.residual_tolerance < 0.0 {
            return Err(Error::Config(
                "extraction.residual_tolerance must be >= 0".into(),
            ));
        }
        if !(0.0..std::f64::consts::PI).contains(&ex.branch_margin) {
            return Err(Error::Config(
                "extraction.branch_margin must be in [0, pi)".into(),
            ));
        }
        if self.integrator.substeps == 0 {
            return Err(Error::Config("integrator.substeps must be > 0".into()));
        }
        if let Some(dir) = &self.diagnostics.failure_dir {
            if !dir.is_dir() {
                tracing::warn!(
                    dir = %dir.display(),
                    "diagnostics.failure_dir does not exist; failing batches cannot be captured there"
                );
            }
        }
        Ok(())
    }

    /// Publish process-wide settings (the solver backend toggle).
    pub fn apply(&self) {
        set_solver_backend(self.solver.backend);
    }
}

/// Solver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Coefficient backend
    #[serde(default)]
    pub backend: SolverBackend,
}

/// Defaults for the iterative effective-Hamiltonian extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum acceptable commutation residual
    #[serde(default = "default_max_com")]
    pub max_com: f64,

    /// Minimum coefficient-to-maximum ratio after the first iteration
    #[serde(default = "default_min_coeff_ratio")]
    pub min_coeff_ratio: f64,

    /// Maximum basis elements accepted per iteration
    #[serde(default = "default_num_update_per_iteration")]
    pub num_update_per_iteration: usize,

    /// Iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Generator magnitude below which the residual counts as explained
    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,

    /// Distance from -pi (radians) at which an eigenphase is considered
    /// to hit the branch cut
    #[serde(default = "default_branch_margin")]
    pub branch_margin: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_com: default_max_com(),
            min_coeff_ratio: default_min_coeff_ratio(),
            num_update_per_iteration: default_num_update_per_iteration(),
            max_iterations: default_max_iterations(),
            residual_tolerance: default_residual_tolerance(),
            branch_margin: default_branch_margin(),
        }
    }
}

fn default_max_com() -> f64 {
    0.05
}

fn default_min_coeff_ratio() -> f64 {
    0.005
}

fn default_num_update_per_iteration() -> usize {
    4
}

fn default_max_iterations() -> usize {
    20
}

fn default_residual_tolerance() -> f64 {
    1e-8
}

fn default_branch_margin() -> f64 {
    0.1
}

/// Reference integrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Midpoint sub-steps per output interval
    #[serde(default = "default_substeps")]
    pub substeps: usize,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            substeps: default_substeps(),
        }
    }
}

fn default_substeps() -> usize {
    8
}

/// Failure capture configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Directory for failing eigendecomposition batches (system temp dir if unset)
    #[serde(default)]
    pub failure_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
