// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Drive sequence compiler.
//!
//! A [`DriveTerm`] is an instruction sequence on one drive channel. Walking
//! the sequence tracks the carrier frequency, the phase offset and the
//! elapsed time; every pulse produces an interval whose X and Y quadrature
//! coefficients are generated either in the rotating-wave approximation or
//! in the full frame. Intervals are then merged into one coefficient per
//! quadrature.
//!
//! # Example
//!
//! ```
//! use num_complex::Complex64;
//! use qudit_sim::config::SolverBackend;
//! use qudit_sim::drive::{Coefficient, DriveTerm};
//!
//! let term = DriveTerm::new(5.0, Complex64::new(0.3, 0.0));
//! let coeffs = term
//!     .generate_fn_with(5.0, Complex64::new(1.0, 0.0), true, SolverBackend::Native)
//!     .unwrap();
//! assert!(matches!(coeffs.x, Coefficient::Number(v) if v == 0.3));
//! ```

pub mod coefficient;
mod full;
pub mod instruction;
mod rwa;
mod sequence;

pub use coefficient::{Coefficient, DriveCoefficients, DriveWarning, SampledCoefficient};
pub use instruction::{Amplitude, Instruction, SampledEnvelope};

use num_complex::Complex64;

use crate::config::{solver_backend, SolverBackend};
use crate::error::Result;
use crate::expression::Scalar;

/// A drive channel described by an instruction sequence.
#[derive(Debug, Clone)]
pub struct DriveTerm {
    sequence: Vec<Instruction>,
    constant_phase: Option<Scalar>,
}

impl DriveTerm {
    /// Single pulse at a fixed frequency.
    pub fn new(frequency: impl Into<Scalar>, amplitude: impl Into<Amplitude>) -> Self {
        Self {
            sequence: vec![
                Instruction::SetFrequency(frequency.into()),
                Instruction::Pulse(amplitude.into()),
            ],
            constant_phase: None,
        }
    }

    pub fn from_sequence(sequence: Vec<Instruction>) -> Self {
        Self {
            sequence,
            constant_phase: None,
        }
    }

    /// Sequence preceded by a `SetFrequency` unless it already starts with one.
    pub fn with_frequency(frequency: impl Into<Scalar>, mut sequence: Vec<Instruction>) -> Self {
        if !matches!(sequence.first(), Some(Instruction::SetFrequency(_))) {
            sequence.insert(0, Instruction::SetFrequency(frequency.into()));
        }
        Self::from_sequence(sequence)
    }

    /// Declare that the envelope phase is constant; callable amplitudes are
    /// then generated as `|Ω(t)|·cos/sin(phase - δt)`.
    pub fn with_constant_phase(mut self, phase: impl Into<Scalar>) -> Self {
        self.constant_phase = Some(phase.into());
        self
    }

    pub fn sequence(&self) -> &[Instruction] {
        &self.sequence
    }

    pub fn constant_phase(&self) -> Option<&Scalar> {
        self.constant_phase.as_ref()
    }

    /// The carrier frequency if every `SetFrequency` agrees.
    pub fn frequency(&self) -> Option<&Scalar> {
        let mut values = self.sequence.iter().filter_map(|inst| match inst {
            Instruction::SetFrequency(v) => Some(v),
            _ => None,
        });
        let first = values.next()?;
        values.all(|v| v == first).then_some(first)
    }

    /// The amplitude of a single-pulse term.
    pub fn amplitude(&self) -> Option<&Amplitude> {
        match self.sequence.as_slice() {
            [_, Instruction::Pulse(amp)] => Some(amp),
            _ => None,
        }
    }

    /// End time of the sequence, or `None` if it contains an indefinite
    /// pulse.
    pub fn duration(&self) -> Option<f64> {
        self.sequence.iter().try_fold(0.0_f64, |acc, inst| match inst {
            Instruction::Delay(d) => Some(acc + *d),
            Instruction::Pulse(amp) => amp.duration().map(|d| acc + d),
            _ => Some(acc),
        })
    }

    pub fn has_parameters(&self) -> bool {
        self.sequence.iter().any(Instruction::is_deferred)
            || self.constant_phase.as_ref().is_some_and(Scalar::is_deferred)
    }

    /// Compile X and Y coefficients with the process-wide solver backend.
    pub fn generate_fn(
        &self,
        frame_frequency: f64,
        drive_base: Complex64,
        rwa: bool,
    ) -> Result<DriveCoefficients> {
        self.generate_fn_with(frame_frequency, drive_base, rwa, solver_backend())
    }

    /// Compile X and Y coefficients with an explicit backend.
    pub fn generate_fn_with(
        &self,
        frame_frequency: f64,
        drive_base: Complex64,
        rwa: bool,
        backend: SolverBackend,
    ) -> Result<DriveCoefficients> {
        sequence::compile(
            &self.sequence,
            self.constant_phase.as_ref(),
            frame_frequency,
            drive_base,
            rwa,
            backend,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriveError, Error, ExpressionError};
    use crate::expression::{Parameter, TimeFunction};
    use crate::pulse::Pulse;
    use approx::assert_relative_eq;
    use ndarray::array;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn no_args() -> HashMap<String, f64> {
        HashMap::new()
    }

    fn eval(coeff: &Coefficient, t: f64) -> f64 {
        coeff.evaluate(t, &no_args()).unwrap()
    }

    fn square(duration: f64, amp: f64) -> Pulse {
        Pulse::Square {
            duration,
            amp: c(amp, 0.0),
        }
    }

    #[test]
    fn test_resonant_constant_is_static_split() {
        let term = DriveTerm::new(5.0, c(0.3, 0.2));
        for backend in [SolverBackend::Native, SolverBackend::Functional] {
            let out = term.generate_fn_with(5.0, c(0.0, 1.0), true, backend).unwrap();
            let (Coefficient::Number(x), Coefficient::Number(y)) = (&out.x, &out.y) else {
                panic!("expected static coefficients, got {:?}", out);
            };
            // i·(0.3 + 0.2i) = -0.2 + 0.3i
            assert_relative_eq!(*x, -0.2, epsilon = 1e-15);
            assert_relative_eq!(*y, 0.3, epsilon = 1e-15);
            assert!(out.warnings.is_empty());
        }
    }

    #[test]
    fn test_off_resonant_constant_native_is_text() {
        let term = DriveTerm::new(5.5, c(0.3, 0.2));
        let out = term
            .generate_fn_with(5.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        assert!(matches!(out.x, Coefficient::Text(_)));
        assert!(matches!(out.y, Coefficient::Text(_)));

        let env = c(0.3, 0.2);
        for &t in &[0.0, 0.7, 3.1] {
            let expected = env * Complex64::new(0.0, -0.5 * t).exp();
            assert_relative_eq!(eval(&out.x, t), expected.re, epsilon = 1e-12);
            assert_relative_eq!(eval(&out.y, t), expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_functional_backend_matches_native() {
        let term = DriveTerm::new(5.5, c(0.3, -0.4));
        let native = term
            .generate_fn_with(5.0, c(0.6, 0.8), true, SolverBackend::Native)
            .unwrap();
        let functional = term
            .generate_fn_with(5.0, c(0.6, 0.8), true, SolverBackend::Functional)
            .unwrap();
        assert!(matches!(functional.x, Coefficient::Function(_)));
        for &t in &[0.0, 0.25, 1.9] {
            assert_relative_eq!(eval(&native.x, t), eval(&functional.x, t), epsilon = 1e-12);
            assert_relative_eq!(eval(&native.y, t), eval(&functional.y, t), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_full_frame_zero_frame_frequency() {
        let term = DriveTerm::new(2.0, c(0.25, 0.0));
        let out = term
            .generate_fn_with(0.0, c(1.0, 0.0), false, SolverBackend::Native)
            .unwrap();
        assert!(matches!(out.y, Coefficient::Number(v) if v == 0.0));
        for &t in &[0.0, 0.4, 1.3] {
            assert_relative_eq!(eval(&out.x, t), 0.5 * (2.0 * t).cos(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_full_frame_rotating_frame_split() {
        let term = DriveTerm::new(2.0, c(0.25, 0.1));
        let native = term
            .generate_fn_with(1.5, c(1.0, 0.0), false, SolverBackend::Native)
            .unwrap();
        let functional = term
            .generate_fn_with(1.5, c(1.0, 0.0), false, SolverBackend::Functional)
            .unwrap();
        for &t in &[0.0, 0.4, 1.3] {
            let lab = (c(0.5, 0.2) * Complex64::new(0.0, -2.0 * t).exp()).re;
            assert_relative_eq!(eval(&native.x, t), lab * (1.5 * t).cos(), epsilon = 1e-12);
            assert_relative_eq!(eval(&native.y, t), lab * (1.5 * t).sin(), epsilon = 1e-12);
            assert_relative_eq!(eval(&functional.x, t), eval(&native.x, t), epsilon = 1e-12);
            assert_relative_eq!(eval(&functional.y, t), eval(&native.y, t), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sequencing_errors() {
        let cases = vec![
            vec![Instruction::pulse(0.1)],
            vec![Instruction::shift_frequency(1.0), Instruction::pulse(0.1)],
            vec![Instruction::set_phase(1.0)],
            vec![Instruction::set_frequency(1.0), Instruction::shift_phase(0.5)],
            vec![Instruction::set_frequency(1.0), Instruction::delay(2.0)],
            vec![],
        ];
        for seq in cases {
            let err = DriveTerm::from_sequence(seq)
                .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
                .unwrap_err();
            assert!(
                matches!(err, Error::Drive(DriveError::Sequencing(_))),
                "unexpected {:?}",
                err
            );
        }
    }

    #[test]
    fn test_duration_sums_finite_instructions() {
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::delay(0.5),
            Instruction::pulse(square(2.0, 0.1)),
            Instruction::pulse(SampledEnvelope::new(0.25, array![c(1.0, 0.0), c(1.0, 0.0)])),
        ]);
        assert_relative_eq!(term.duration().unwrap(), 3.0);
        assert_eq!(DriveTerm::new(1.0, 0.3).duration(), None);
    }

    #[test]
    fn test_set_phase_fixes_absolute_phase() {
        let w = 3.0;
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(w),
            Instruction::delay(1.0),
            Instruction::set_phase(0.0),
            Instruction::pulse(square(2.0, 0.5)),
        ]);
        let out = term
            .generate_fn_with(w, c(1.0, 0.0), true, SolverBackend::Functional)
            .unwrap();
        // phase_offset = -w·1, so the envelope picks up exp(i·w)
        assert_relative_eq!(eval(&out.x, 1.5), 0.5 * w.cos(), epsilon = 1e-12);
        assert_relative_eq!(eval(&out.y, 1.5), 0.5 * w.sin(), epsilon = 1e-12);
        // delay interval is silent
        assert_eq!(eval(&out.x, 0.5), 0.0);
    }

    #[test]
    fn test_pulses_then_indefinite_merge_to_piecewise() {
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(4.0),
            Instruction::pulse(square(1.0, 0.2)),
            Instruction::shift_phase(std::f64::consts::FRAC_PI_2),
            Instruction::pulse(square(2.0, 0.4)),
            Instruction::pulse(0.1),
            // never reached: the constant pulse is indefinite
            Instruction::pulse(square(1.0, 9.0)),
        ]);
        let out = term
            .generate_fn_with(4.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        let Coefficient::Function(x) = &out.x else {
            panic!("expected piecewise function, got {:?}", out.x);
        };
        assert!(x.parameters().is_empty());
        assert_relative_eq!(eval(&out.x, 0.5), 0.2, epsilon = 1e-12);
        // exp(-i·π/2) rotates the second pulse onto -Y
        assert_relative_eq!(eval(&out.x, 2.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(eval(&out.y, 2.0), -0.4, epsilon = 1e-12);
        assert_relative_eq!(eval(&out.y, 10.0), -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_sampled_intervals_concatenate() {
        let a = SampledEnvelope::new(0.5, array![c(1.0, 0.0), c(2.0, 0.0)]);
        let b = SampledEnvelope::new(0.5, array![c(3.0, 0.0)]);
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::pulse(a.clone()),
            Instruction::pulse(b),
        ]);
        let out = term
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        let Coefficient::Sampled(x) = &out.x else {
            panic!("expected sampled, got {:?}", out.x);
        };
        assert_eq!(x.values, array![1.0, 2.0, 3.0]);
        assert_eq!(x.t0, 0.0);
        assert_eq!(x.dt, 0.5);

        let mismatched = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::pulse(a.clone()),
            Instruction::pulse(SampledEnvelope::new(0.25, array![c(1.0, 0.0)])),
        ]);
        let err = mismatched
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap_err();
        assert!(matches!(err, Error::Drive(DriveError::TypeConsistency(_))));

        let mixed = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::pulse(a),
            Instruction::pulse(square(1.0, 0.1)),
        ]);
        let err = mixed
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap_err();
        assert!(matches!(err, Error::Drive(DriveError::TypeConsistency(_))));
    }

    #[test]
    fn test_off_resonant_sampled_is_sampled_on_shifted_grid() {
        let env = SampledEnvelope::new(0.5, array![c(1.0, 0.0), c(1.0, 0.0)]);
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(2.0),
            Instruction::pulse(env.clone()),
            Instruction::pulse(env),
        ]);
        let out = term
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        let Coefficient::Sampled(x) = &out.x else {
            panic!("expected sampled, got {:?}", out.x);
        };
        let expected: Vec<f64> = [0.0, 0.5, 1.0, 1.5].iter().map(|t: &f64| t.cos()).collect();
        for (v, e) in x.values.iter().zip(expected) {
            assert_relative_eq!(*v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_text_amplitude_rules() {
        // static text demotes to a constant, allowed everywhere
        let term = DriveTerm::new(Parameter::new("w"), "0.5 + 0.5j");
        let out = term
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Functional)
            .unwrap();
        assert_eq!(out.x.parameters().len(), 1);

        let text = DriveTerm::new(1.0, "cos(t)");
        let err = text
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Functional)
            .unwrap_err();
        assert!(matches!(err, Error::Drive(DriveError::UnsupportedAmplitude(_))));

        let deferred = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::shift_phase(Parameter::new("phi")),
            Instruction::pulse("cos(t)"),
        ]);
        let err = deferred
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap_err();
        assert!(matches!(err, Error::Drive(DriveError::UnsupportedAmplitude(_))));

        let err = DriveTerm::new(1.0, "cos(t")
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap_err();
        assert!(matches!(err, Error::Expression(ExpressionError::Parse { .. })));
    }

    #[test]
    fn test_text_amplitude_after_pulse_warns() {
        let term = DriveTerm::from_sequence(vec![
            Instruction::set_frequency(1.0),
            Instruction::pulse(square(1.0, 0.2)),
            Instruction::pulse("0.1 * cos(t)"),
        ]);
        let out = term
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        assert_eq!(
            out.warnings,
            vec![DriveWarning::UnshiftedTextAmplitude {
                expression: "0.1 * cos(t)".into(),
                tzero: 1.0
            }]
        );
        // text pieces are evaluated in absolute time
        assert_relative_eq!(eval(&out.x, 2.0), 0.1 * 2.0f64.cos(), epsilon = 1e-12);

        let first = DriveTerm::new(1.0, "0.1 * cos(t)")
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Native)
            .unwrap();
        assert!(first.warnings.is_empty());
        assert!(matches!(first.x, Coefficient::Text(_)));
    }

    #[test]
    fn test_text_amplitude_off_resonance() {
        let out = DriveTerm::new(1.5, "0.2 * exp(-t)")
            .generate_fn_with(1.0, c(0.0, 1.0), true, SolverBackend::Native)
            .unwrap();
        for &t in &[0.0_f64, 0.3, 2.0] {
            let env = c(0.0, 1.0) * 0.2 * (-t).exp();
            let expected = env * Complex64::new(0.0, -0.5 * t).exp();
            assert_relative_eq!(eval(&out.x, t), expected.re, epsilon = 1e-12);
            assert_relative_eq!(eval(&out.y, t), expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_phase_callable() {
        let ramp = TimeFunction::from_fn(|t| Complex64::new(t, 0.0));
        let term = DriveTerm::new(2.0, ramp).with_constant_phase(0.3);
        let out = term
            .generate_fn_with(1.0, c(1.0, 0.0), true, SolverBackend::Functional)
            .unwrap();
        for &t in &[0.2, 1.0] {
            assert_relative_eq!(eval(&out.x, t), t * (0.3 - t).cos(), epsilon = 1e-12);
            assert_relative_eq!(eval(&out.y, t), t * (0.3 - t).sin(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_frequency_and_amplitude_accessors() {
        let term = DriveTerm::new(2.0, 0.5);
        assert_eq!(term.frequency(), Some(&Scalar::Number(2.0)));
        assert!(matches!(term.amplitude(), Some(Amplitude::Constant(_))));
        assert!(!term.has_parameters());

        let seq = DriveTerm::with_frequency(
            2.0,
            vec![
                Instruction::pulse(square(1.0, 0.1)),
                Instruction::set_frequency(3.0),
                Instruction::pulse(0.1),
            ],
        );
        assert!(matches!(seq.sequence()[0], Instruction::SetFrequency(_)));
        assert_eq!(seq.frequency(), None);
        assert!(seq.amplitude().is_none());

        let deferred = DriveTerm::new(Parameter::new("w"), 0.5);
        assert!(deferred.has_parameters());
    }

    fn deferred_term() -> DriveTerm {
        DriveTerm::from_sequence(vec![
            Instruction::set_frequency(Parameter::new("w")),
            Instruction::pulse(square(1.0, 0.3)),
            Instruction::shift_phase(Parameter::new("phi")),
            Instruction::pulse(Parameter::new("amp")),
        ])
    }

    fn literal_term(w: f64, phi: f64, amp: f64) -> DriveTerm {
        DriveTerm::from_sequence(vec![
            Instruction::set_frequency(w),
            Instruction::pulse(square(1.0, 0.3)),
            Instruction::shift_phase(phi),
            Instruction::pulse(amp),
        ])
    }

    proptest! {
        #[test]
        fn prop_deferred_binding_matches_literal_compile(
            w in -3.0f64..3.0,
            phi in -3.0f64..3.0,
            amp in -1.0f64..1.0,
            rwa in any::<bool>(),
            t in 0.0f64..4.0,
        ) {
            let frame = 0.7;
            let base = c(0.8, -0.6);
            let deferred = deferred_term()
                .generate_fn_with(frame, base, rwa, SolverBackend::Native)
                .unwrap();
            let literal = literal_term(w, phi, amp)
                .generate_fn_with(frame, base, rwa, SolverBackend::Native)
                .unwrap();
            let args = HashMap::from([
                ("w".to_string(), w),
                ("phi".to_string(), phi),
                ("amp".to_string(), amp),
            ]);
            let dx = deferred.x.evaluate(t, &args).unwrap();
            let dy = deferred.y.evaluate(t, &args).unwrap();
            prop_assert!((dx - literal.x.evaluate(t, &args).unwrap()).abs() < 1e-9);
            prop_assert!((dy - literal.y.evaluate(t, &args).unwrap()).abs() < 1e-9);
        }
    }
}
