// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linear-in-time fit of a single coefficient trajectory.

use serde::{Deserialize, Serialize};

/// Outcome of fitting `y(t) ≈ rate·t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub rate: f64,
    pub success: bool,
    /// RMS deviation from the fitted line relative to the RMS of the data;
    /// 0 for a failed fit
    pub com: f64,
}

impl LinearFit {
    fn failed() -> Self {
        Self {
            rate: 0.0,
            success: false,
            com: 0.0,
        }
    }
}

/// Least-squares fit of `values` against `rate·times` through the origin.
///
/// Needs at least two points with a nonzero time; anything less, or a
/// non-finite result, is a failed fit.
pub fn fit_through_origin(times: &[f64], values: &[f64]) -> LinearFit {
    let n = times.len().min(values.len());
    if n < 2 {
        return LinearFit::failed();
    }
    let (times, values) = (&times[..n], &values[..n]);

    let stt: f64 = times.iter().map(|t| t * t).sum();
    if stt <= 0.0 || !stt.is_finite() {
        return LinearFit::failed();
    }
    let sty: f64 = times.iter().zip(values).map(|(t, y)| t * y).sum();
    let rate = sty / stt;
    if !rate.is_finite() {
        return LinearFit::failed();
    }

    let syy: f64 = values.iter().map(|y| y * y).sum();
    let com = if syy == 0.0 {
        0.0
    } else {
        let sres: f64 = times
            .iter()
            .zip(values)
            .map(|(t, y)| (y - rate * t).powi(2))
            .sum();
        (sres / syy).sqrt()
    };

    LinearFit {
        rate,
        success: com.is_finite(),
        com,
    }
}
