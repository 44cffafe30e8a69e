// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Full (non-RWA) coefficient generation.
//!
//! The lab-frame field is `Re[2·Ω(t)·e^{-iωt}]`. Moving to a frame at
//! `frame_frequency` splits it into `lab·cos(frame·t)` on the X quadrature
//! and `lab·sin(frame·t)` on the Y quadrature. Counter-rotating terms are
//! kept.

use num_complex::Complex64;

use crate::config::SolverBackend;
use crate::error::{DriveError, Result};
use crate::expression::{complex_literal, Oscillation, SampledArray, Scalar, Value};

use super::instruction::Amplitude;
use super::sequence::{
    callable_value, join_terms, sampled_value, static_value, Generated, IntervalContext,
};

enum LabFrame {
    Text(String),
    Value(Value),
}

pub(super) fn generate(
    amplitude: &Amplitude,
    ctx: &IntervalContext<'_>,
) -> Result<(Generated, Generated)> {
    let two = Value::from(2.0);
    let frequency = ctx.frequency.clone();

    let lab = match amplitude {
        Amplitude::Constant(_) | Amplitude::Parameter(_) => {
            let double_env = static_value(amplitude)
                .mul(ctx.drive_base.clone())?
                .mul(two)?;
            match (&double_env, &frequency, ctx.backend) {
                (Value::Number(env), Scalar::Number(freq), SolverBackend::Native) => {
                    let mut terms = Vec::new();
                    if env.re != 0.0 {
                        terms.push(format!("({} * cos({} * t))", env.re, freq));
                    }
                    if env.im != 0.0 {
                        terms.push(format!("({} * sin({} * t))", env.im, freq));
                    }
                    let joined = join_terms(terms.clone());
                    LabFrame::Text(if terms.len() > 1 {
                        format!("({})", joined)
                    } else {
                        joined
                    })
                }
                _ => {
                    let cos = Value::Function(Oscillation::cos(frequency.clone(), 0.0).into());
                    let sin = Value::Function(Oscillation::sin(frequency, 0.0).into());
                    let re = double_env.clone().real().mul(cos)?;
                    let im = double_env.imag().mul(sin)?;
                    LabFrame::Value(re.add(im)?)
                }
            }
        }
        Amplitude::Text(src) => LabFrame::Text(text(src, &frequency, ctx)?),
        Amplitude::Sampled(_) => {
            let double_env = sampled_value(amplitude, ctx)?.mul(two)?;
            let carrier = Value::Function(Oscillation::exp(-frequency, 0.0).into());
            LabFrame::Value(carrier.mul(double_env)?.real())
        }
        Amplitude::Function(_) | Amplitude::Pulse(_) => {
            let double_env = callable_value(amplitude)
                .mul(ctx.drive_base.clone())?
                .mul(two)?
                .shifted(ctx.tzero);
            match ctx.constant_phase {
                None => {
                    let carrier = Value::Function(Oscillation::exp(-frequency, 0.0).into());
                    LabFrame::Value(double_env.mul(carrier)?.real())
                }
                Some(cp) => {
                    let phase = cp.clone() + ctx.base_phase.clone();
                    let cos = Value::Function(Oscillation::cos(-frequency, phase).into());
                    LabFrame::Value(double_env.abs().mul(cos)?)
                }
            }
        }
    };

    into_frame(lab, ctx.frame_frequency)
}

fn text(src: &str, frequency: &Scalar, ctx: &IntervalContext<'_>) -> Result<String> {
    let (Value::Number(base), Scalar::Number(freq)) = (&ctx.drive_base, frequency) else {
        return Err(DriveError::UnsupportedAmplitude(format!(
            "text amplitude '{}' needs literal frequency and phase",
            src
        ))
        .into());
    };
    let double_env = format!("{} * ({})", complex_literal(*base * 2.0), src);

    match ctx.constant_phase {
        None => Ok(format!(
            "real({env} * (cos({f} * t) - 1j * sin({f} * t)))",
            env = double_env,
            f = freq
        )),
        Some(Scalar::Number(cp)) => Ok(format!(
            "abs({}) * cos({} - ({} * t))",
            double_env,
            cp + base.arg(),
            freq
        )),
        Some(Scalar::Deferred(_)) => Err(DriveError::UnsupportedAmplitude(format!(
            "text amplitude '{}' cannot take a deferred constant phase",
            src
        ))
        .into()),
    }
}

fn into_frame(lab: LabFrame, frame_frequency: f64) -> Result<(Generated, Generated)> {
    match lab {
        LabFrame::Text(lab) => {
            if frame_frequency == 0.0 {
                return Ok((Generated::Text(lab), Generated::Value(Value::from(0.0))));
            }
            Ok((
                Generated::Text(format!("{} * cos({} * t)", lab, frame_frequency)),
                Generated::Text(format!("{} * sin({} * t)", lab, frame_frequency)),
            ))
        }
        LabFrame::Value(lab) => {
            if frame_frequency == 0.0 {
                let zero = match &lab {
                    Value::Sampled(s) => Value::Sampled(SampledArray::new(
                        s.t0,
                        s.dt,
                        s.values.mapv(|_| Complex64::new(0.0, 0.0)),
                    )),
                    _ => Value::from(0.0),
                };
                return Ok((Generated::Value(lab), Generated::Value(zero)));
            }
            let cos = Value::Function(Oscillation::cos(frame_frequency, 0.0).into());
            let sin = Value::Function(Oscillation::sin(frame_frequency, 0.0).into());
            Ok((
                Generated::Value(lab.clone().mul(cos)?),
                Generated::Value(lab.mul(sin)?),
            ))
        }
    }
}
