// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! qudit-sim command line
//!
//! Compiles the drives of a run description, integrates the resulting
//! Hamiltonian and extracts its effective Hamiltonian.
//!
//! # Usage
//!
//! ```bash
//! # Extract the effective Hamiltonian of a run
//! qudit-sim extract --run run.yaml
//!
//! # Also write the full iteration report
//! qudit-sim extract --run run.yaml --output report.json
//!
//! # Show effective configuration
//! qudit-sim --config qudit-sim.yaml config
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qudit_sim::config::Config;
use qudit_sim::heff::heff_expr;
use qudit_sim::run::{run_extraction, RunSpec};
use qudit_sim::{Result, VERSION};

/// Drive compilation and effective-Hamiltonian extraction for qudits
#[derive(Parser)]
#[command(name = "qudit-sim")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Effective-Hamiltonian extraction for driven qudits")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "QUDIT_SIM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate a run and extract its effective Hamiltonian
    Extract {
        /// Run description (YAML)
        #[arg(short, long)]
        run: PathBuf,

        /// Write the extraction report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging.level, config.logging.json);

    match cli.command {
        Commands::Extract { run, output } => {
            config.validate()?;
            config.apply();

            let spec = RunSpec::load(&run)?;
            info!(
                version = VERSION,
                run = %run.display(),
                levels = spec.levels,
                qudits = spec.qudits,
                drives = spec.drives.len(),
                backend = %config.solver.backend,
                "Starting extraction"
            );

            let outcome = run_extraction(&spec, &config)?;
            let report = &outcome.report;
            let coeffs = ndarray::ArrayView1::from(&report.heff_coeffs[..]);

            println!("{}", heff_expr(coeffs, &report.labels, None));
            println!(
                "termination: {} after {} iterations",
                report.termination,
                report.iterations.len()
            );
            for (label, value) in report.terms() {
                println!("  {:<12} {:+.6e}", label, value);
            }
            let min_fidelity = outcome.fidelity.iter().copied().fold(1.0, f64::min);
            println!("minimum fidelity: {:.6}", min_fidelity);
            println!("gate: {}", outcome.gate.expr(1e-3));
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning);
            }

            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&outcome)?)?;
                info!(path = %path.display(), "Report written");
            }
        }

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate => match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
