// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Drive sequence instructions and amplitude categories.

use ndarray::Array1;
use num_complex::Complex64;

use crate::expression::{Parameter, ParameterExpression, Scalar, TimeFunction};
use crate::pulse::Pulse;

/// Complex envelope samples with a fixed step; duration is `len × dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledEnvelope {
    pub dt: f64,
    pub values: Array1<Complex64>,
}

impl SampledEnvelope {
    pub fn new(dt: f64, values: Array1<Complex64>) -> Self {
        Self { dt, values }
    }

    pub fn duration(&self) -> f64 {
        self.values.len() as f64 * self.dt
    }
}

/// Amplitude of a pulse instruction.
#[derive(Debug, Clone)]
pub enum Amplitude {
    /// Static complex envelope (indefinite)
    Constant(Complex64),
    /// Static deferred envelope (indefinite)
    Parameter(ParameterExpression),
    /// Text expression for the native coefficient path (indefinite)
    Text(String),
    /// Sampled envelope (finite)
    Sampled(SampledEnvelope),
    /// Callable envelope in local time (indefinite)
    Function(TimeFunction),
    /// Finite pulse shape
    Pulse(Pulse),
}

impl Amplitude {
    /// Time the amplitude occupies, or `None` for indefinite drives.
    pub fn duration(&self) -> Option<f64> {
        match self {
            Amplitude::Sampled(s) => Some(s.duration()),
            Amplitude::Pulse(p) => Some(p.duration()),
            _ => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        match self {
            Amplitude::Parameter(expr) => !expr.parameters().is_empty(),
            Amplitude::Function(f) => !f.parameters().is_empty(),
            _ => false,
        }
    }

    pub(crate) fn category(&self) -> &'static str {
        match self {
            Amplitude::Constant(_) => "constant",
            Amplitude::Parameter(_) => "parameter",
            Amplitude::Text(_) => "text",
            Amplitude::Sampled(_) => "sampled",
            Amplitude::Function(_) => "function",
            Amplitude::Pulse(_) => "pulse",
        }
    }
}

impl From<f64> for Amplitude {
    fn from(v: f64) -> Self {
        Amplitude::Constant(Complex64::new(v, 0.0))
    }
}

impl From<Complex64> for Amplitude {
    fn from(z: Complex64) -> Self {
        Amplitude::Constant(z)
    }
}

impl From<Parameter> for Amplitude {
    fn from(p: Parameter) -> Self {
        Amplitude::Parameter(p.into())
    }
}

impl From<ParameterExpression> for Amplitude {
    fn from(expr: ParameterExpression) -> Self {
        Amplitude::Parameter(expr)
    }
}

impl From<&str> for Amplitude {
    fn from(s: &str) -> Self {
        Amplitude::Text(s.to_string())
    }
}

impl From<String> for Amplitude {
    fn from(s: String) -> Self {
        Amplitude::Text(s)
    }
}

impl From<SampledEnvelope> for Amplitude {
    fn from(s: SampledEnvelope) -> Self {
        Amplitude::Sampled(s)
    }
}

impl From<TimeFunction> for Amplitude {
    fn from(f: TimeFunction) -> Self {
        Amplitude::Function(f)
    }
}

impl From<Pulse> for Amplitude {
    fn from(p: Pulse) -> Self {
        Amplitude::Pulse(p)
    }
}

/// One step of a drive sequence.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Set the carrier frequency (rad/s)
    SetFrequency(Scalar),
    /// Add to the carrier frequency
    ShiftFrequency(Scalar),
    /// Set the absolute phase at the current time
    SetPhase(Scalar),
    /// Add to the phase offset (virtual Z)
    ShiftPhase(Scalar),
    /// Silence for the given duration
    Delay(f64),
    /// Drive with an amplitude
    Pulse(Amplitude),
}

impl Instruction {
    pub fn set_frequency(value: impl Into<Scalar>) -> Self {
        Instruction::SetFrequency(value.into())
    }

    pub fn shift_frequency(value: impl Into<Scalar>) -> Self {
        Instruction::ShiftFrequency(value.into())
    }

    pub fn set_phase(value: impl Into<Scalar>) -> Self {
        Instruction::SetPhase(value.into())
    }

    pub fn shift_phase(value: impl Into<Scalar>) -> Self {
        Instruction::ShiftPhase(value.into())
    }

    pub fn delay(duration: f64) -> Self {
        Instruction::Delay(duration)
    }

    pub fn pulse(amplitude: impl Into<Amplitude>) -> Self {
        Instruction::Pulse(amplitude.into())
    }

    /// Whether the instruction carries unbound parameters.
    pub fn is_deferred(&self) -> bool {
        match self {
            Instruction::SetFrequency(v)
            | Instruction::ShiftFrequency(v)
            | Instruction::SetPhase(v)
            | Instruction::ShiftPhase(v) => v.is_deferred(),
            Instruction::Delay(_) => false,
            Instruction::Pulse(amp) => amp.is_deferred(),
        }
    }
}
