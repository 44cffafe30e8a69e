// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deferred parameters and parameter expressions.
//!
//! A [`ParameterExpression`] carries an ordered tuple of unbound
//! [`Parameter`]s and evaluates to a complex number once values are bound
//! positionally. Combining two expressions concatenates their parameter
//! tuples (left operand first). Duplicates are kept: the same parameter used
//! on both sides appears twice and must be bound twice.

use num_complex::Complex64;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::ExpressionError;

/// A named unbound real parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parameter {
    name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Elementwise complex operations shared by the algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Real,
    Imag,
    Abs,
    Arg,
    Conj,
    /// exp(i·x)
    ExpI,
    Cos,
    Sin,
}

impl UnaryOp {
    #[inline]
    pub fn apply(self, z: Complex64) -> Complex64 {
        match self {
            UnaryOp::Neg => -z,
            UnaryOp::Real => Complex64::new(z.re, 0.0),
            UnaryOp::Imag => Complex64::new(z.im, 0.0),
            UnaryOp::Abs => Complex64::new(z.norm(), 0.0),
            UnaryOp::Arg => Complex64::new(z.arg(), 0.0),
            UnaryOp::Conj => z.conj(),
            UnaryOp::ExpI => (Complex64::i() * z).exp(),
            UnaryOp::Cos => z.cos(),
            UnaryOp::Sin => z.sin(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Real => "real",
            UnaryOp::Imag => "imag",
            UnaryOp::Abs => "abs",
            UnaryOp::Arg => "arg",
            UnaryOp::Conj => "conj",
            UnaryOp::ExpI => "expi",
            UnaryOp::Cos => "cos",
            UnaryOp::Sin => "sin",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ParamNode {
    Constant(Complex64),
    Parameter(usize),
    Add(Box<ParamNode>, Box<ParamNode>),
    Mul(Box<ParamNode>, Box<ParamNode>),
    Unary(UnaryOp, Box<ParamNode>),
}

impl ParamNode {
    fn shifted(self, offset: usize) -> Self {
        if offset == 0 {
            return self;
        }
        match self {
            ParamNode::Parameter(i) => ParamNode::Parameter(i + offset),
            ParamNode::Constant(c) => ParamNode::Constant(c),
            ParamNode::Add(a, b) => {
                ParamNode::Add(Box::new(a.shifted(offset)), Box::new(b.shifted(offset)))
            }
            ParamNode::Mul(a, b) => {
                ParamNode::Mul(Box::new(a.shifted(offset)), Box::new(b.shifted(offset)))
            }
            ParamNode::Unary(op, a) => ParamNode::Unary(op, Box::new(a.shifted(offset))),
        }
    }

    fn eval(&self, values: &[f64]) -> Complex64 {
        match self {
            ParamNode::Constant(c) => *c,
            ParamNode::Parameter(i) => Complex64::new(values[*i], 0.0),
            ParamNode::Add(a, b) => a.eval(values) + b.eval(values),
            ParamNode::Mul(a, b) => a.eval(values) * b.eval(values),
            ParamNode::Unary(op, a) => op.apply(a.eval(values)),
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, params: &[Parameter]) -> fmt::Result {
        match self {
            ParamNode::Constant(c) if c.im == 0.0 => write!(f, "{}", c.re),
            ParamNode::Constant(c) => write!(f, "({}{:+}j)", c.re, c.im),
            ParamNode::Parameter(i) => write!(f, "{}", params[*i]),
            ParamNode::Add(a, b) => {
                write!(f, "(")?;
                a.write(f, params)?;
                write!(f, " + ")?;
                b.write(f, params)?;
                write!(f, ")")
            }
            ParamNode::Mul(a, b) => {
                a.write(f, params)?;
                write!(f, "*")?;
                b.write(f, params)
            }
            ParamNode::Unary(op, a) => {
                write!(f, "{}(", op.name())?;
                a.write(f, params)?;
                write!(f, ")")
            }
        }
    }
}

/// Time-independent expression over deferred parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpression {
    parameters: Vec<Parameter>,
    node: ParamNode,
}

impl ParameterExpression {
    /// Expression with no parameters.
    pub fn constant(value: Complex64) -> Self {
        Self {
            parameters: Vec::new(),
            node: ParamNode::Constant(value),
        }
    }

    /// Unbound parameter tuple, in binding order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Bind values positionally and evaluate.
    pub fn evaluate(&self, values: &[f64]) -> Result<Complex64, ExpressionError> {
        if values.len() != self.parameters.len() {
            return Err(ExpressionError::ParameterCount {
                expected: self.parameters.len(),
                got: values.len(),
            });
        }
        Ok(self.node.eval(values))
    }

    /// Bind values by parameter name and evaluate.
    pub fn evaluate_named(
        &self,
        values: &HashMap<String, f64>,
    ) -> Result<Complex64, ExpressionError> {
        let bound = bind_named(&self.parameters, values)?;
        Ok(self.node.eval(&bound))
    }

    /// Evaluation without the arity check; `values` must hold at least
    /// `parameters().len()` entries.
    pub(crate) fn eval_unchecked(&self, values: &[f64]) -> Complex64 {
        self.node.eval(values)
    }

    fn binary(
        self,
        other: ParameterExpression,
        combine: fn(Box<ParamNode>, Box<ParamNode>) -> ParamNode,
    ) -> Self {
        let offset = self.parameters.len();
        let mut parameters = self.parameters;
        parameters.extend(other.parameters);
        Self {
            parameters,
            node: combine(Box::new(self.node), Box::new(other.node.shifted(offset))),
        }
    }

    /// Apply an elementwise operation.
    pub fn unary(self, op: UnaryOp) -> Self {
        let node = match self.node {
            ParamNode::Constant(c) => ParamNode::Constant(op.apply(c)),
            node => ParamNode::Unary(op, Box::new(node)),
        };
        Self {
            parameters: self.parameters,
            node,
        }
    }

    pub fn real(self) -> Self {
        self.unary(UnaryOp::Real)
    }

    pub fn imag(self) -> Self {
        self.unary(UnaryOp::Imag)
    }

    pub fn abs(self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    pub fn arg(self) -> Self {
        self.unary(UnaryOp::Arg)
    }

    pub fn conj(self) -> Self {
        self.unary(UnaryOp::Conj)
    }

    /// exp(i·self)
    pub fn exp_i(self) -> Self {
        self.unary(UnaryOp::ExpI)
    }
}

/// Resolve a parameter tuple against a name map.
pub(crate) fn bind_named(
    parameters: &[Parameter],
    values: &HashMap<String, f64>,
) -> Result<Vec<f64>, ExpressionError> {
    parameters
        .iter()
        .map(|p| {
            values
                .get(p.name())
                .copied()
                .ok_or_else(|| ExpressionError::UnboundSymbol(p.name().to_string()))
        })
        .collect()
}

impl From<Parameter> for ParameterExpression {
    fn from(p: Parameter) -> Self {
        Self {
            parameters: vec![p],
            node: ParamNode::Parameter(0),
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.write(f, &self.parameters)
    }
}

impl Add for ParameterExpression {
    type Output = ParameterExpression;

    fn add(self, rhs: ParameterExpression) -> Self::Output {
        self.binary(rhs, ParamNode::Add)
    }
}

impl Mul for ParameterExpression {
    type Output = ParameterExpression;

    fn mul(self, rhs: ParameterExpression) -> Self::Output {
        self.binary(rhs, ParamNode::Mul)
    }
}

impl Neg for ParameterExpression {
    type Output = ParameterExpression;

    fn neg(self) -> Self::Output {
        self.unary(UnaryOp::Neg)
    }
}

impl Sub for ParameterExpression {
    type Output = ParameterExpression;

    fn sub(self, rhs: ParameterExpression) -> Self::Output {
        self + (-rhs)
    }
}

impl Add<Complex64> for ParameterExpression {
    type Output = ParameterExpression;

    fn add(self, rhs: Complex64) -> Self::Output {
        self + ParameterExpression::constant(rhs)
    }
}

impl Mul<Complex64> for ParameterExpression {
    type Output = ParameterExpression;

    fn mul(self, rhs: Complex64) -> Self::Output {
        self * ParameterExpression::constant(rhs)
    }
}

/// A real instruction value: literal or deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Deferred(ParameterExpression),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v),
            Scalar::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Scalar::Deferred(_))
    }

    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Scalar::Number(_) => &[],
            Scalar::Deferred(expr) => expr.parameters(),
        }
    }

    /// Lift to a parameter expression.
    pub fn into_expression(self) -> ParameterExpression {
        match self {
            Scalar::Number(v) => ParameterExpression::constant(Complex64::new(v, 0.0)),
            Scalar::Deferred(expr) => expr,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(v) => write!(f, "{}", v),
            Scalar::Deferred(expr) => write!(f, "{}", expr),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<Parameter> for Scalar {
    fn from(p: Parameter) -> Self {
        Scalar::Deferred(p.into())
    }
}

impl From<ParameterExpression> for Scalar {
    fn from(expr: ParameterExpression) -> Self {
        Scalar::Deferred(expr)
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        match (self, rhs) {
            (Scalar::Number(a), Scalar::Number(b)) => Scalar::Number(a + b),
            (a, b) => Scalar::Deferred(a.into_expression() + b.into_expression()),
        }
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        self + (-rhs)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        match self {
            Scalar::Number(v) => Scalar::Number(-v),
            Scalar::Deferred(expr) => Scalar::Deferred(-expr),
        }
    }
}

impl Mul<f64> for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: f64) -> Scalar {
        match self {
            Scalar::Number(v) => Scalar::Number(v * rhs),
            Scalar::Deferred(expr) => Scalar::Deferred(expr * Complex64::new(rhs, 0.0)),
        }
    }
}
