// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Time-function algebra.
//!
//! Time-dependent scalars come in four categories (see [`value`]):
//!
//! - plain numbers,
//! - deferred [`ParameterExpression`]s evaluated as `f(params)`,
//! - callable [`TimeFunction`]s evaluated as `f(t, params)`,
//! - [`SampledArray`]s aligned to a time grid.
//!
//! Oscillatory primitives ([`Oscillation`]) and text coefficients
//! ([`TextExpression`]) plug into the callable category.

pub mod function;
pub mod oscillation;
pub mod parameter;
pub mod text;
pub mod value;

pub use function::{TimeClosure, TimeFunction};
pub use oscillation::{Oscillation, OscillationKind};
pub use parameter::{Parameter, ParameterExpression, Scalar, UnaryOp};
pub use text::{complex_literal, TextExpression, TIME_SYMBOL};
pub use value::{combine, SampledArray, Value, ValueKind};
