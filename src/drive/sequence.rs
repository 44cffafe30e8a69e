// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequence walking and interval merging.

use std::borrow::Cow;

use ndarray::{concatenate, Array1, Axis};
use num_complex::Complex64;
use tracing::{debug, warn};

use crate::config::SolverBackend;
use crate::error::{DriveError, Result};
use crate::expression::{SampledArray, Scalar, TextExpression, TimeFunction, Value};

use super::coefficient::{Coefficient, DriveCoefficients, DriveWarning, SampledCoefficient};
use super::instruction::{Amplitude, Instruction};
use super::{full, rwa};

/// Detuning below which a drive counts as resonant with its frame.
pub(super) const RESONANCE_ATOL: f64 = 1e-8;

/// Coefficient produced for one interval before merging.
pub(super) enum Generated {
    Text(String),
    Value(Value),
}

/// Per-interval inputs to the generators.
pub(super) struct IntervalContext<'a> {
    pub frequency: &'a Scalar,
    pub frame_frequency: f64,
    /// `drive_base · exp(-i·phase_offset)`
    pub drive_base: Value,
    /// `arg(drive_base)`
    pub base_phase: Scalar,
    pub tzero: f64,
    pub constant_phase: Option<&'a Scalar>,
    pub backend: SolverBackend,
}

struct Interval {
    start: f64,
    x: Generated,
    y: Generated,
}

/// Compile an instruction sequence into X/Y coefficients.
pub(super) fn compile(
    sequence: &[Instruction],
    constant_phase: Option<&Scalar>,
    frame_frequency: f64,
    drive_base: Complex64,
    use_rwa: bool,
    backend: SolverBackend,
) -> Result<DriveCoefficients> {
    let has_deferred = sequence.iter().any(Instruction::is_deferred)
        || constant_phase.is_some_and(Scalar::is_deferred);

    let mut frequency: Option<Scalar> = None;
    let mut phase_offset = Scalar::Number(0.0);
    let mut time = 0.0;
    let mut intervals: Vec<Interval> = Vec::new();
    let mut pulses = 0usize;
    let mut warnings = Vec::new();

    for inst in sequence {
        match inst {
            Instruction::ShiftFrequency(value) => {
                let current = frequency.take().ok_or_else(|| {
                    DriveError::Sequencing("ShiftFrequency called before SetFrequency".into())
                })?;
                frequency = Some(current + value.clone());
            }
            Instruction::ShiftPhase(value) => {
                phase_offset = phase_offset + value.clone();
            }
            Instruction::SetFrequency(value) => {
                frequency = Some(value.clone());
            }
            Instruction::SetPhase(value) => {
                let current = frequency.as_ref().ok_or_else(|| {
                    DriveError::Sequencing("SetPhase called before SetFrequency".into())
                })?;
                phase_offset = value.clone() - current.clone() * time;
            }
            Instruction::Delay(duration) => {
                if !(duration.is_finite() && *duration >= 0.0) {
                    return Err(DriveError::Sequencing(format!(
                        "Delay duration must be finite and >= 0, got {}",
                        duration
                    ))
                    .into());
                }
                intervals.push(Interval {
                    start: time,
                    x: Generated::Value(Value::Function(TimeFunction::constant(zero()))),
                    y: Generated::Value(Value::Function(TimeFunction::constant(zero()))),
                });
                time += duration;
            }
            Instruction::Pulse(amplitude) => {
                let current = frequency.as_ref().ok_or_else(|| {
                    DriveError::Sequencing("Pulse called before SetFrequency".into())
                })?;
                let amplitude =
                    resolve_amplitude(amplitude, has_deferred, backend, time, &mut warnings)?;

                let (base, base_phase) = phase_factor(drive_base, &phase_offset);
                let ctx = IntervalContext {
                    frequency: current,
                    frame_frequency,
                    drive_base: base,
                    base_phase,
                    tzero: time,
                    constant_phase,
                    backend,
                };
                let (x, y) = if use_rwa {
                    rwa::generate(&amplitude, &ctx)?
                } else {
                    full::generate(&amplitude, &ctx)?
                };
                intervals.push(Interval { start: time, x, y });
                pulses += 1;

                match amplitude.duration() {
                    Some(duration) => time += duration,
                    None => {
                        time = f64::INFINITY;
                        break;
                    }
                }
            }
        }
    }

    if pulses == 0 {
        return Err(DriveError::Sequencing("No drive amplitude specified".into()).into());
    }

    debug!(
        intervals = intervals.len(),
        rwa = use_rwa,
        backend = %backend,
        end_time = time,
        "Compiled drive sequence"
    );

    let (x, y) = merge(intervals, time)?;
    Ok(DriveCoefficients { x, y, warnings })
}

/// Validate an amplitude against its context. Static text collapses to a
/// constant.
fn resolve_amplitude<'a>(
    amplitude: &'a Amplitude,
    has_deferred: bool,
    backend: SolverBackend,
    tzero: f64,
    warnings: &mut Vec<DriveWarning>,
) -> Result<Cow<'a, Amplitude>> {
    match amplitude {
        Amplitude::Text(src) => {
            let expr = TextExpression::parse(src)?;
            if let Some(value) = expr.constant_value() {
                return Ok(Cow::Owned(Amplitude::Constant(value)));
            }
            if has_deferred || backend != SolverBackend::Native {
                return Err(DriveError::UnsupportedAmplitude(format!(
                    "text amplitude '{}' requires the native backend and a sequence without \
                     deferred parameters",
                    src
                ))
                .into());
            }
            if tzero != 0.0 && expr.references_time() {
                warn!(
                    expression = %src,
                    tzero,
                    "Time-dependent text amplitude inside a sequence is not shifted"
                );
                warnings.push(DriveWarning::UnshiftedTextAmplitude {
                    expression: src.clone(),
                    tzero,
                });
            }
            Ok(Cow::Borrowed(amplitude))
        }
        Amplitude::Sampled(s) => {
            if s.values.is_empty() || !(s.dt > 0.0 && s.dt.is_finite()) {
                return Err(DriveError::UnsupportedAmplitude(format!(
                    "sampled amplitude needs samples and dt > 0, got {} samples with dt={}",
                    s.values.len(),
                    s.dt
                ))
                .into());
            }
            Ok(Cow::Borrowed(amplitude))
        }
        Amplitude::Pulse(p) => {
            p.validate().map_err(DriveError::UnsupportedAmplitude)?;
            Ok(Cow::Borrowed(amplitude))
        }
        _ => Ok(Cow::Borrowed(amplitude)),
    }
}

/// `drive_base · exp(-i·phase_offset)` and its argument.
fn phase_factor(drive_base: Complex64, phase_offset: &Scalar) -> (Value, Scalar) {
    match phase_offset {
        Scalar::Number(phase) => {
            let base = drive_base * Complex64::new(0.0, -phase).exp();
            (Value::Number(base), Scalar::Number(base.arg()))
        }
        Scalar::Deferred(expr) => {
            let factor = (-expr.clone()).exp_i() * drive_base;
            let arg = Scalar::Deferred(factor.clone().arg());
            (Value::Deferred(factor), arg)
        }
    }
}

fn zero() -> Complex64 {
    Complex64::new(0.0, 0.0)
}

pub(super) fn static_value(amplitude: &Amplitude) -> Value {
    match amplitude {
        Amplitude::Constant(z) => Value::Number(*z),
        Amplitude::Parameter(expr) => Value::Deferred(expr.clone()),
        _ => Value::Number(zero()),
    }
}

pub(super) fn callable_value(amplitude: &Amplitude) -> Value {
    match amplitude {
        Amplitude::Function(f) => Value::Function(f.clone()),
        Amplitude::Pulse(p) => Value::Function(p.clone().into()),
        _ => Value::Number(zero()),
    }
}

/// Sampled envelope placed at the interval start, times the drive base.
pub(super) fn sampled_value(amplitude: &Amplitude, ctx: &IntervalContext<'_>) -> Result<Value> {
    let Amplitude::Sampled(s) = amplitude else {
        return Ok(Value::Number(zero()));
    };
    let samples = Value::Sampled(SampledArray::new(ctx.tzero, s.dt, s.values.clone()));
    samples.mul(ctx.drive_base.clone()).map_err(|_| {
        DriveError::UnsupportedAmplitude(
            "sampled amplitudes cannot combine with deferred phases".into(),
        )
        .into()
    })
}

pub(super) fn quadratures(envelope: Value) -> (Generated, Generated) {
    (
        Generated::Value(envelope.clone().real()),
        Generated::Value(envelope.imag()),
    )
}

pub(super) fn join_terms(terms: Vec<String>) -> String {
    if terms.is_empty() {
        "0".to_string()
    } else {
        terms.join(" + ")
    }
}

fn into_coefficient(generated: Generated) -> Coefficient {
    match generated {
        Generated::Text(src) => Coefficient::Text(src),
        Generated::Value(Value::Number(z)) => Coefficient::Number(z.re),
        Generated::Value(Value::Deferred(expr)) => {
            Coefficient::Function(TimeFunction::from(expr))
        }
        Generated::Value(Value::Function(f)) => Coefficient::Function(f),
        Generated::Value(Value::Sampled(s)) => Coefficient::Sampled(SampledCoefficient {
            t0: s.t0,
            dt: s.dt,
            values: s.values.mapv(|z| z.re),
        }),
    }
}

fn merge(intervals: Vec<Interval>, end_time: f64) -> Result<(Coefficient, Coefficient)> {
    if intervals.is_empty() {
        return Err(DriveError::Sequencing("No drive amplitude specified".into()).into());
    }

    let mut starts = Vec::with_capacity(intervals.len() + 1);
    let mut xs = Vec::with_capacity(intervals.len());
    let mut ys = Vec::with_capacity(intervals.len());
    for interval in intervals {
        starts.push(interval.start);
        xs.push(into_coefficient(interval.x));
        ys.push(into_coefficient(interval.y));
    }

    if xs.len() == 1 {
        return Ok((xs.remove(0), ys.remove(0)));
    }

    let is_sampled = |c: &Coefficient| matches!(c, Coefficient::Sampled(_));
    let both = xs.iter().chain(ys.iter());

    if both.clone().all(|c| !is_sampled(c)) {
        starts.push(end_time);
        let x = TimeFunction::piecewise(starts.clone(), to_functions(xs)?)?;
        let y = TimeFunction::piecewise(starts, to_functions(ys)?)?;
        return Ok((Coefficient::Function(x), Coefficient::Function(y)));
    }

    if both.clone().all(is_sampled) {
        return Ok((concatenate_samples(xs)?, concatenate_samples(ys)?));
    }

    let kinds: Vec<&str> = xs.iter().map(Coefficient::category).collect();
    Err(DriveError::TypeConsistency(format!(
        "Cannot generate a Hamiltonian coefficient from amplitude types {:?}",
        kinds
    ))
    .into())
}

fn to_functions(coefficients: Vec<Coefficient>) -> Result<Vec<TimeFunction>> {
    coefficients
        .into_iter()
        .map(|c| match c {
            Coefficient::Number(v) => Ok(TimeFunction::constant(Complex64::new(v, 0.0))),
            Coefficient::Function(f) => Ok(f),
            Coefficient::Text(src) => Ok(TimeFunction::from_text(TextExpression::parse(&src)?)),
            Coefficient::Sampled(_) => Err(DriveError::TypeConsistency(
                "sampled intervals cannot join a piecewise function".into(),
            )
            .into()),
        })
        .collect()
}

fn concatenate_samples(coefficients: Vec<Coefficient>) -> Result<Coefficient> {
    let samples: Vec<SampledCoefficient> = coefficients
        .into_iter()
        .filter_map(|c| match c {
            Coefficient::Sampled(s) => Some(s),
            _ => None,
        })
        .collect();
    let Some(first) = samples.first() else {
        return Err(DriveError::TypeConsistency("no sampled intervals to join".into()).into());
    };
    let (t0, dt) = (first.t0, first.dt);
    if samples
        .iter()
        .any(|s| (s.dt - dt).abs() > 1e-12 * dt.abs())
    {
        return Err(DriveError::TypeConsistency(
            "sampled intervals have different time steps".into(),
        )
        .into());
    }
    let views: Vec<_> = samples.iter().map(|s| s.values.view()).collect();
    let values: Array1<f64> = concatenate(Axis(0), &views)
        .map_err(|e| DriveError::TypeConsistency(format!("cannot join samples: {}", e)))?;
    Ok(Coefficient::Sampled(SampledCoefficient { t0, dt, values }))
}
