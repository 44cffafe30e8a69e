// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Compiled drive coefficients.

use std::collections::HashMap;
use std::fmt;

use ndarray::Array1;

use crate::error::ExpressionError;
use crate::expression::{Parameter, TextExpression, TimeFunction};

/// Real samples on the grid `t0 + k·dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledCoefficient {
    pub t0: f64,
    pub dt: f64,
    pub values: Array1<f64>,
}

impl SampledCoefficient {
    /// Value at `t`, linearly interpolated between samples.
    ///
    /// The last sample holds until `t0 + len·dt`; outside the window the
    /// coefficient is zero.
    pub fn value_at(&self, t: f64) -> f64 {
        let n = self.values.len();
        if n == 0 || self.dt <= 0.0 {
            return 0.0;
        }
        let k = (t - self.t0) / self.dt;
        if !(0.0..n as f64).contains(&k) {
            return 0.0;
        }
        let i = k.floor() as usize;
        if i + 1 >= n {
            return self.values[n - 1];
        }
        let frac = k - i as f64;
        self.values[i] * (1.0 - frac) + self.values[i + 1] * frac
    }
}

/// One real Hamiltonian coefficient produced by the drive compiler.
#[derive(Debug, Clone)]
pub enum Coefficient {
    /// Text expression in `t` for the native backend
    Text(String),
    /// Static value
    Number(f64),
    /// Sampled array
    Sampled(SampledCoefficient),
    /// Callable `f(t, params)`; only the real part is used
    Function(TimeFunction),
}

impl Coefficient {
    /// Unbound parameters in positional order. Text coefficients have none.
    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Coefficient::Function(f) => f.parameters(),
            _ => &[],
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Coefficient::Number(v) => *v == 0.0,
            Coefficient::Sampled(s) => s.values.iter().all(|v| *v == 0.0),
            Coefficient::Function(f) => f.constant_value().is_some_and(|z| z.re == 0.0),
            Coefficient::Text(_) => false,
        }
    }

    /// Largest literal frequency found in the coefficient, if any.
    pub fn max_frequency(&self) -> Option<f64> {
        match self {
            Coefficient::Function(f) => f.max_frequency(),
            _ => None,
        }
    }

    /// Evaluate at `t` with parameters bound by name.
    pub fn evaluate(&self, t: f64, args: &HashMap<String, f64>) -> Result<f64, ExpressionError> {
        match self {
            Coefficient::Number(v) => Ok(*v),
            Coefficient::Sampled(s) => Ok(s.value_at(t)),
            Coefficient::Function(f) => Ok(f.evaluate_named(t, args)?.re),
            Coefficient::Text(src) => Ok(TextExpression::parse(src)?.evaluate(t, args)?.re),
        }
    }

    /// Evaluate on every point of `tlist`.
    pub fn sample(
        &self,
        tlist: &[f64],
        args: &HashMap<String, f64>,
    ) -> Result<Array1<f64>, ExpressionError> {
        match self {
            Coefficient::Number(v) => Ok(Array1::from_elem(tlist.len(), *v)),
            Coefficient::Sampled(s) => Ok(tlist.iter().map(|&t| s.value_at(t)).collect()),
            Coefficient::Function(f) => tlist
                .iter()
                .map(|&t| f.evaluate_named(t, args).map(|z| z.re))
                .collect(),
            Coefficient::Text(src) => {
                let expr = TextExpression::parse(src)?;
                tlist
                    .iter()
                    .map(|&t| expr.evaluate(t, args).map(|z| z.re))
                    .collect()
            }
        }
    }

    pub(crate) fn category(&self) -> &'static str {
        match self {
            Coefficient::Text(_) => "text",
            Coefficient::Number(_) => "number",
            Coefficient::Sampled(_) => "sampled",
            Coefficient::Function(_) => "function",
        }
    }
}

/// Non-fatal conditions found while compiling a drive.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveWarning {
    /// A time-dependent text amplitude was placed after `t = 0`; text is
    /// not shifted to the pulse start.
    UnshiftedTextAmplitude { expression: String, tzero: f64 },
}

impl fmt::Display for DriveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveWarning::UnshiftedTextAmplitude { expression, tzero } => write!(
                f,
                "Text amplitude '{}' starts at t={} but is evaluated in absolute time",
                expression, tzero
            ),
        }
    }
}

/// X and Y quadrature coefficients of one drive term.
#[derive(Debug, Clone)]
pub struct DriveCoefficients {
    pub x: Coefficient,
    pub y: Coefficient,
    pub warnings: Vec<DriveWarning>,
}
