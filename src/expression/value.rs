// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Closed value categories and their combinator table.
//!
//! | lhs \ rhs | Number   | Deferred | Function | Sampled  |
//! |-----------|----------|----------|----------|----------|
//! | Number    | Number   | Deferred | Function | Sampled  |
//! | Deferred  | Deferred | Deferred | Function | error    |
//! | Function  | Function | Function | Function | Sampled  |
//! | Sampled   | Sampled  | error    | Sampled  | Sampled  |
//!
//! A function combined with a sampled array is evaluated on the array's
//! time grid, which requires the function to have no unbound parameters.

use ndarray::Array1;
use num_complex::Complex64;

use super::function::TimeFunction;
use super::parameter::{ParameterExpression, UnaryOp};
use crate::error::ExpressionError;

/// Complex samples on the grid `t0 + k·dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledArray {
    pub t0: f64,
    pub dt: f64,
    pub values: Array1<Complex64>,
}

impl SampledArray {
    pub fn new(t0: f64, dt: f64, values: Array1<Complex64>) -> Self {
        Self { t0, dt, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.values.len() as f64 * self.dt
    }

    /// Sample times.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.values.len(), |k| self.t0 + k as f64 * self.dt)
    }

    fn same_grid(&self, other: &SampledArray) -> bool {
        self.values.len() == other.values.len()
            && (self.dt - other.dt).abs() <= 1e-12 * self.dt.abs().max(other.dt.abs())
            && (self.t0 - other.t0).abs() <= 1e-12 * self.dt.abs().max(1.0)
    }

    fn sample(&self, f: &TimeFunction) -> Result<Array1<Complex64>, ExpressionError> {
        if !f.parameters().is_empty() {
            return Err(ExpressionError::Incompatible(format!(
                "cannot sample a function with unbound parameters {:?}",
                f.parameters()
            )));
        }
        let mut out = Array1::zeros(self.values.len());
        for (k, v) in out.iter_mut().enumerate() {
            *v = f.evaluate(self.t0 + k as f64 * self.dt, &[])?;
        }
        Ok(out)
    }
}

/// Value category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Deferred,
    Function,
    Sampled,
}

/// Result category of a binary operation, or `None` if undefined.
pub fn combine(lhs: ValueKind, rhs: ValueKind) -> Option<ValueKind> {
    use ValueKind::*;
    match (lhs, rhs) {
        (Number, Number) => Some(Number),
        (Number, Deferred) | (Deferred, Number) | (Deferred, Deferred) => Some(Deferred),
        (Sampled, Deferred) | (Deferred, Sampled) => None,
        (Sampled, _) | (_, Sampled) => Some(Sampled),
        (Function, _) | (_, Function) => Some(Function),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Mul,
}

/// A time-dependent scalar in one of the four categories.
#[derive(Debug, Clone)]
pub enum Value {
    Number(Complex64),
    Deferred(ParameterExpression),
    Function(TimeFunction),
    Sampled(SampledArray),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Deferred(_) => ValueKind::Deferred,
            Value::Function(_) => ValueKind::Function,
            Value::Sampled(_) => ValueKind::Sampled,
        }
    }

    pub fn add(self, rhs: Value) -> Result<Value, ExpressionError> {
        self.binary(rhs, BinaryOp::Add)
    }

    pub fn mul(self, rhs: Value) -> Result<Value, ExpressionError> {
        self.binary(rhs, BinaryOp::Mul)
    }

    fn binary(self, rhs: Value, op: BinaryOp) -> Result<Value, ExpressionError> {
        let kind = combine(self.kind(), rhs.kind()).ok_or_else(|| {
            ExpressionError::Incompatible(format!(
                "{:?} and {:?} values cannot be combined",
                self.kind(),
                rhs.kind()
            ))
        })?;

        match kind {
            ValueKind::Number => match (self, rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Mul => a * b,
                })),
                _ => unreachable!("combine() yields Number only for two numbers"),
            },
            ValueKind::Deferred => {
                let a = self.into_expression();
                let b = rhs.into_expression();
                Ok(Value::Deferred(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Mul => a * b,
                }))
            }
            ValueKind::Function => {
                let a = self.into_function();
                let b = rhs.into_function();
                Ok(Value::Function(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Mul => a * b,
                }))
            }
            ValueKind::Sampled => {
                let (t0, dt, a, b) = match (self, rhs) {
                    (Value::Sampled(a), Value::Sampled(b)) => {
                        if !a.same_grid(&b) {
                            return Err(ExpressionError::Incompatible(
                                "sampled arrays are on different grids".into(),
                            ));
                        }
                        (a.t0, a.dt, a.values, b.values)
                    }
                    (Value::Sampled(a), other) => {
                        let b = materialize(&a, other)?;
                        (a.t0, a.dt, a.values, b)
                    }
                    (other, Value::Sampled(b)) => {
                        let a = materialize(&b, other)?;
                        (b.t0, b.dt, a, b.values)
                    }
                    _ => unreachable!("combine() yields Sampled only with a sampled operand"),
                };
                let values = match op {
                    BinaryOp::Add => &a + &b,
                    BinaryOp::Mul => &a * &b,
                };
                Ok(Value::Sampled(SampledArray { t0, dt, values }))
            }
        }
    }

    /// Apply an elementwise operation.
    pub fn unary(self, op: UnaryOp) -> Value {
        match self {
            Value::Number(z) => Value::Number(op.apply(z)),
            Value::Deferred(expr) => Value::Deferred(expr.unary(op)),
            Value::Function(f) => Value::Function(f.unary(op)),
            Value::Sampled(mut s) => {
                s.values.mapv_inplace(|z| op.apply(z));
                Value::Sampled(s)
            }
        }
    }

    pub fn real(self) -> Value {
        self.unary(UnaryOp::Real)
    }

    pub fn imag(self) -> Value {
        self.unary(UnaryOp::Imag)
    }

    pub fn abs(self) -> Value {
        self.unary(UnaryOp::Abs)
    }

    /// Move a callable's local time origin to `tzero`.
    pub fn shifted(self, tzero: f64) -> Value {
        match self {
            Value::Function(f) => Value::Function(f.shifted(tzero)),
            Value::Sampled(s) => Value::Sampled(SampledArray {
                t0: s.t0 + tzero,
                ..s
            }),
            other => other,
        }
    }

    fn into_expression(self) -> ParameterExpression {
        match self {
            Value::Number(z) => ParameterExpression::constant(z),
            Value::Deferred(expr) => expr,
            _ => unreachable!("only numbers and deferred values lift to expressions"),
        }
    }

    /// Lift to a time function; sampled arrays do not lift.
    fn into_function(self) -> TimeFunction {
        match self {
            Value::Number(z) => TimeFunction::constant(z),
            Value::Deferred(expr) => expr.into(),
            Value::Function(f) => f,
            Value::Sampled(_) => unreachable!("sampled arrays never combine into functions"),
        }
    }
}

fn materialize(grid: &SampledArray, value: Value) -> Result<Array1<Complex64>, ExpressionError> {
    match value {
        Value::Number(z) => Ok(Array1::from_elem(grid.len(), z)),
        Value::Function(f) => grid.sample(&f),
        Value::Deferred(_) | Value::Sampled(_) => Err(ExpressionError::Incompatible(
            "deferred values cannot be sampled".into(),
        )),
    }
}

impl From<Complex64> for Value {
    fn from(z: Complex64) -> Self {
        Value::Number(z)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Complex64::new(v, 0.0))
    }
}

impl From<ParameterExpression> for Value {
    fn from(expr: ParameterExpression) -> Self {
        Value::Deferred(expr)
    }
}

impl From<TimeFunction> for Value {
    fn from(f: TimeFunction) -> Self {
        Value::Function(f)
    }
}

impl From<SampledArray> for Value {
    fn from(s: SampledArray) -> Self {
        Value::Sampled(s)
    }
}
