// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rotating-wave coefficient generation.
//!
//! In the frame rotating at `frame_frequency`, a drive `Ω(t)·e^{-iωt}`
//! contributes `x + i·y = Ω(t)·e^{-iδt}` with detuning `δ = ω - frame`.
//! Counter-rotating terms are dropped.

use crate::config::SolverBackend;
use crate::error::{DriveError, Result};
use crate::expression::{complex_literal, Oscillation, Scalar, Value};

use super::instruction::Amplitude;
use super::sequence::{
    callable_value, join_terms, quadratures, sampled_value, static_value, Generated,
    IntervalContext, RESONANCE_ATOL,
};

pub(super) fn generate(
    amplitude: &Amplitude,
    ctx: &IntervalContext<'_>,
) -> Result<(Generated, Generated)> {
    let detuning = ctx.frequency.clone() - Scalar::Number(ctx.frame_frequency);
    let resonant = matches!(detuning, Scalar::Number(d) if d.abs() <= RESONANCE_ATOL);

    match amplitude {
        Amplitude::Constant(_) | Amplitude::Parameter(_) => {
            let envelope = static_value(amplitude).mul(ctx.drive_base.clone())?;
            if resonant {
                return Ok(quadratures(envelope));
            }
            if let (Value::Number(env), Scalar::Number(det), SolverBackend::Native) =
                (&envelope, &detuning, ctx.backend)
            {
                let mut x = Vec::new();
                let mut y = Vec::new();
                if env.re != 0.0 {
                    x.push(format!("({} * cos({} * t))", env.re, det));
                    y.push(format!("({} * sin({} * t))", -env.re, det));
                }
                if env.im != 0.0 {
                    x.push(format!("({} * sin({} * t))", env.im, det));
                    y.push(format!("({} * cos({} * t))", env.im, det));
                }
                return Ok((
                    Generated::Text(join_terms(x)),
                    Generated::Text(join_terms(y)),
                ));
            }
            let carrier = Value::Function(Oscillation::exp(-detuning, 0.0).into());
            Ok(quadratures(carrier.mul(envelope)?))
        }
        Amplitude::Text(src) => text(src, &detuning, resonant, ctx),
        Amplitude::Sampled(_) => {
            let envelope = sampled_value(amplitude, ctx)?;
            if resonant {
                return Ok(quadratures(envelope));
            }
            let carrier = Value::Function(Oscillation::exp(-detuning, 0.0).into());
            Ok(quadratures(carrier.mul(envelope)?))
        }
        Amplitude::Function(_) | Amplitude::Pulse(_) => {
            let envelope = callable_value(amplitude)
                .mul(ctx.drive_base.clone())?
                .shifted(ctx.tzero);
            if resonant {
                return Ok(quadratures(envelope));
            }
            match ctx.constant_phase {
                None => {
                    let carrier = Value::Function(Oscillation::exp(-detuning, 0.0).into());
                    Ok(quadratures(envelope.mul(carrier)?))
                }
                Some(cp) => {
                    let phase = cp.clone() + ctx.base_phase.clone();
                    let magnitude = envelope.abs();
                    let cos = Oscillation::cos(-detuning.clone(), phase.clone());
                    let sin = Oscillation::sin(-detuning, phase);
                    Ok((
                        Generated::Value(magnitude.clone().mul(Value::Function(cos.into()))?),
                        Generated::Value(magnitude.mul(Value::Function(sin.into()))?),
                    ))
                }
            }
        }
    }
}

fn text(
    src: &str,
    detuning: &Scalar,
    resonant: bool,
    ctx: &IntervalContext<'_>,
) -> Result<(Generated, Generated)> {
    let (Value::Number(base), Scalar::Number(det)) = (&ctx.drive_base, detuning) else {
        return Err(DriveError::UnsupportedAmplitude(format!(
            "text amplitude '{}' needs literal frequency and phase",
            src
        ))
        .into());
    };
    let envelope = format!("{} * ({})", complex_literal(*base), src);

    if resonant {
        return Ok((
            Generated::Text(format!("real({})", envelope)),
            Generated::Text(format!("imag({})", envelope)),
        ));
    }

    match ctx.constant_phase {
        None => Ok((
            Generated::Text(format!(
                "real({env}) * cos({det} * t) + imag({env}) * sin({det} * t)",
                env = envelope,
                det = det
            )),
            Generated::Text(format!(
                "imag({env}) * cos({det} * t) - real({env}) * sin({det} * t)",
                env = envelope,
                det = det
            )),
        )),
        Some(Scalar::Number(cp)) => {
            let phase = base.arg() + cp;
            Ok((
                Generated::Text(format!(
                    "abs({}) * cos({} - ({} * t))",
                    envelope, phase, det
                )),
                Generated::Text(format!(
                    "abs({}) * sin({} - ({} * t))",
                    envelope, phase, det
                )),
            ))
        }
        Some(Scalar::Deferred(_)) => Err(DriveError::UnsupportedAmplitude(format!(
            "text amplitude '{}' cannot take a deferred constant phase",
            src
        ))
        .into()),
    }
}
