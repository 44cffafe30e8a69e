// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Oscillatory primitives `op(frequency·t + phase)`.
//!
//! Frequency and phase are each either literal or deferred. The evaluation
//! strategy is fixed at construction so the all-literal case never touches
//! parameter bookkeeping.

use num_complex::Complex64;

use super::parameter::{Parameter, ParameterExpression, Scalar};

/// Which function of the phase argument is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscillationKind {
    Cos,
    Sin,
    /// cos(x) + i·sin(x)
    Exp,
}

impl OscillationKind {
    #[inline]
    fn apply_real(self, x: f64) -> Complex64 {
        match self {
            OscillationKind::Cos => Complex64::new(x.cos(), 0.0),
            OscillationKind::Sin => Complex64::new(x.sin(), 0.0),
            OscillationKind::Exp => Complex64::new(x.cos(), x.sin()),
        }
    }

    #[inline]
    fn apply(self, x: Complex64) -> Complex64 {
        if x.im == 0.0 {
            return self.apply_real(x.re);
        }
        match self {
            OscillationKind::Cos => x.cos(),
            OscillationKind::Sin => x.sin(),
            OscillationKind::Exp => (Complex64::i() * x).exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Strategy {
    Fixed {
        frequency: f64,
        phase: f64,
    },
    DeferredFrequency {
        frequency: ParameterExpression,
        phase: f64,
    },
    DeferredPhase {
        frequency: f64,
        phase: ParameterExpression,
    },
    DeferredBoth {
        frequency: ParameterExpression,
        phase: ParameterExpression,
    },
}

/// `op(frequency·t + phase)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Oscillation {
    kind: OscillationKind,
    strategy: Strategy,
    parameters: Vec<Parameter>,
}

impl Oscillation {
    pub fn new(kind: OscillationKind, frequency: Scalar, phase: Scalar) -> Self {
        let (strategy, parameters) = match (frequency, phase) {
            (Scalar::Number(frequency), Scalar::Number(phase)) => {
                (Strategy::Fixed { frequency, phase }, Vec::new())
            }
            (Scalar::Deferred(frequency), Scalar::Number(phase)) => {
                let parameters = frequency.parameters().to_vec();
                (Strategy::DeferredFrequency { frequency, phase }, parameters)
            }
            (Scalar::Number(frequency), Scalar::Deferred(phase)) => {
                let parameters = phase.parameters().to_vec();
                (Strategy::DeferredPhase { frequency, phase }, parameters)
            }
            (Scalar::Deferred(frequency), Scalar::Deferred(phase)) => {
                let mut parameters = frequency.parameters().to_vec();
                parameters.extend_from_slice(phase.parameters());
                (Strategy::DeferredBoth { frequency, phase }, parameters)
            }
        };
        Self {
            kind,
            strategy,
            parameters,
        }
    }

    pub fn cos(frequency: impl Into<Scalar>, phase: impl Into<Scalar>) -> Self {
        Self::new(OscillationKind::Cos, frequency.into(), phase.into())
    }

    pub fn sin(frequency: impl Into<Scalar>, phase: impl Into<Scalar>) -> Self {
        Self::new(OscillationKind::Sin, frequency.into(), phase.into())
    }

    pub fn exp(frequency: impl Into<Scalar>, phase: impl Into<Scalar>) -> Self {
        Self::new(OscillationKind::Exp, frequency.into(), phase.into())
    }

    pub fn kind(&self) -> OscillationKind {
        self.kind
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Frequency when it is a literal.
    pub fn literal_frequency(&self) -> Option<f64> {
        match &self.strategy {
            Strategy::Fixed { frequency, .. } | Strategy::DeferredPhase { frequency, .. } => {
                Some(*frequency)
            }
            _ => None,
        }
    }

    /// Evaluate at `t`; `args` must cover the parameter tuple.
    #[inline]
    pub(crate) fn eval(&self, t: f64, args: &[f64]) -> Complex64 {
        match &self.strategy {
            Strategy::Fixed { frequency, phase } => self.kind.apply_real(frequency * t + phase),
            Strategy::DeferredFrequency { frequency, phase } => {
                self.kind.apply(frequency.eval_unchecked(args) * t + phase)
            }
            Strategy::DeferredPhase { frequency, phase } => {
                self.kind.apply(phase.eval_unchecked(args) + frequency * t)
            }
            Strategy::DeferredBoth { frequency, phase } => {
                let split = frequency.parameters().len();
                self.kind.apply(
                    frequency.eval_unchecked(&args[..split]) * t
                        + phase.eval_unchecked(&args[split..]),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_strategy() {
        let osc = Oscillation::cos(2.0, 0.5);
        assert!(osc.parameters().is_empty());
        assert_eq!(osc.literal_frequency(), Some(2.0));
        assert_relative_eq!(osc.eval(0.25, &[]).re, (1.0f64).cos());
    }

    #[test]
    fn test_exp_is_unit_phasor() {
        let osc = Oscillation::exp(-1.5, 0.0);
        let z = osc.eval(0.4, &[]);
        assert_relative_eq!(z.re, (-0.6f64).cos());
        assert_relative_eq!(z.im, (-0.6f64).sin());
    }

    #[test]
    fn test_all_strategies_agree() {
        let (f, ph, t): (f64, f64, f64) = (1.3, -0.4, 0.9);
        let expected = (f * t + ph).sin();

        let fixed = Oscillation::sin(f, ph);
        let freq = Oscillation::sin(Parameter::new("f"), ph);
        let phase = Oscillation::sin(f, Parameter::new("p"));
        let both = Oscillation::sin(Parameter::new("f"), Parameter::new("p"));

        assert_relative_eq!(fixed.eval(t, &[]).re, expected, epsilon = 1e-14);
        assert_relative_eq!(freq.eval(t, &[f]).re, expected, epsilon = 1e-14);
        assert_relative_eq!(phase.eval(t, &[ph]).re, expected, epsilon = 1e-14);
        assert_relative_eq!(both.eval(t, &[f, ph]).re, expected, epsilon = 1e-14);
    }

    #[test]
    fn test_both_deferred_concatenates_parameters() {
        let osc = Oscillation::cos(Parameter::new("f"), Parameter::new("p"));
        let names: Vec<&str> = osc.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["f", "p"]);
        assert_eq!(osc.literal_frequency(), None);
    }
}
