// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Finite-duration pulse envelopes.
//!
//! Envelopes are evaluated in local time `[0, duration)` and vanish outside
//! it. Gaussian edges are lifted so the envelope starts and ends at zero:
//!
//! ```text
//! g(t) = (exp(-(t-c)²/2σ²) - exp(-c²/2σ²)) / (1 - exp(-c²/2σ²)),  c = duration/2
//! ```
//!
//! Ref: Motzoi et al. (2009), "Simple Pulses for Elimination of Leakage in
//! Weakly Nonlinear Qubits", PRL 103, 110501 (DRAG).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Pulse envelope shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Pulse {
    /// Constant amplitude.
    Square { duration: f64, amp: Complex64 },
    /// Lifted Gaussian centred in the window.
    Gaussian {
        duration: f64,
        amp: Complex64,
        sigma: f64,
    },
    /// Flat top of `width` with lifted Gaussian ramps.
    GaussianSquare {
        duration: f64,
        amp: Complex64,
        sigma: f64,
        width: f64,
    },
    /// Gaussian with a derivative component in quadrature.
    Drag {
        duration: f64,
        amp: Complex64,
        sigma: f64,
        beta: f64,
    },
}

impl Pulse {
    pub fn duration(&self) -> f64 {
        match self {
            Pulse::Square { duration, .. }
            | Pulse::Gaussian { duration, .. }
            | Pulse::GaussianSquare { duration, .. }
            | Pulse::Drag { duration, .. } => *duration,
        }
    }

    pub fn amp(&self) -> Complex64 {
        match self {
            Pulse::Square { amp, .. }
            | Pulse::Gaussian { amp, .. }
            | Pulse::GaussianSquare { amp, .. }
            | Pulse::Drag { amp, .. } => *amp,
        }
    }

    /// Validate shape parameters.
    pub fn validate(&self) -> Result<(), String> {
        let duration = self.duration();
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(format!("pulse duration must be finite and > 0, got {}", duration));
        }
        match self {
            Pulse::Square { .. } => {}
            Pulse::Gaussian { sigma, .. } | Pulse::Drag { sigma, .. } => {
                if *sigma <= 0.0 {
                    return Err("sigma must be > 0".into());
                }
            }
            Pulse::GaussianSquare { sigma, width, .. } => {
                if *sigma <= 0.0 {
                    return Err("sigma must be > 0".into());
                }
                if !(0.0..=duration).contains(width) {
                    return Err("width must be in [0, duration]".into());
                }
            }
        }
        Ok(())
    }

    /// Envelope value at local time `t`.
    pub fn evaluate(&self, t: f64) -> Complex64 {
        if !(0.0..self.duration()).contains(&t) {
            return Complex64::new(0.0, 0.0);
        }
        match self {
            Pulse::Square { amp, .. } => *amp,
            Pulse::Gaussian {
                duration,
                amp,
                sigma,
            } => *amp * lifted_gaussian(t - duration / 2.0, duration / 2.0, *sigma),
            Pulse::GaussianSquare {
                duration,
                amp,
                sigma,
                width,
            } => {
                let risefall = (duration - width) / 2.0;
                let value = if t < risefall {
                    lifted_gaussian(t - risefall, risefall, *sigma)
                } else if t < risefall + width {
                    1.0
                } else {
                    lifted_gaussian(t - risefall - width, risefall, *sigma)
                };
                *amp * value
            }
            Pulse::Drag {
                duration,
                amp,
                sigma,
                beta,
            } => {
                let center = duration / 2.0;
                let x = t - center;
                let g = lifted_gaussian(x, center, *sigma);
                let dg = -x / (sigma * sigma) * gaussian_peak(x, center, *sigma);
                *amp * Complex64::new(g, beta * dg)
            }
        }
    }
}

fn gaussian(x: f64, sigma: f64) -> f64 {
    (-x * x / (2.0 * sigma * sigma)).exp()
}

/// exp(-x²/2σ²) / (1 - edge), the unlifted part of the lifted Gaussian.
fn gaussian_peak(x: f64, half_width: f64, sigma: f64) -> f64 {
    let edge = gaussian(half_width, sigma);
    if edge >= 1.0 {
        return gaussian(x, sigma);
    }
    gaussian(x, sigma) / (1.0 - edge)
}

fn lifted_gaussian(x: f64, half_width: f64, sigma: f64) -> f64 {
    let edge = gaussian(half_width, sigma);
    if edge >= 1.0 {
        return gaussian(x, sigma);
    }
    (gaussian(x, sigma) - edge) / (1.0 - edge)
}
