// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Callable functions of time with deferred parameters.
//!
//! A [`TimeFunction`] is a small expression tree evaluated as
//! `f(t, args)`. Every node owns a contiguous slice of the parameter tuple;
//! binary nodes record where the left operand's slice ends.

use num_complex::Complex64;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul};
use std::sync::Arc;

use super::oscillation::Oscillation;
use super::parameter::{bind_named, Parameter, ParameterExpression, UnaryOp};
use super::text::{TextExpression, TIME_SYMBOL};
use crate::error::ExpressionError;
use crate::pulse::Pulse;

/// User closure `f(t, args)`.
pub type TimeClosure = Arc<dyn Fn(f64, &[f64]) -> Complex64 + Send + Sync>;

#[derive(Clone)]
enum FnNode {
    Constant(Complex64),
    Deferred(ParameterExpression),
    Closure(TimeClosure),
    Pulse(Pulse),
    Oscillation(Oscillation),
    /// Parsed text; `symbols` are the non-time symbols bound from `args`.
    Text {
        expr: TextExpression,
        symbols: Vec<String>,
    },
    Sum {
        lhs: Box<FnNode>,
        rhs: Box<FnNode>,
        split: usize,
    },
    Product {
        lhs: Box<FnNode>,
        rhs: Box<FnNode>,
        split: usize,
    },
    Unary(UnaryOp, Box<FnNode>),
    /// Evaluates `inner` at `t - tzero`.
    Shifted {
        tzero: f64,
        inner: Box<FnNode>,
    },
    /// `pieces[i]` is active on `[times[i], times[i+1])`.
    Piecewise {
        times: Vec<f64>,
        pieces: Vec<FnNode>,
        offsets: Vec<usize>,
    },
}

impl FnNode {
    fn eval(&self, t: f64, args: &[f64]) -> Result<Complex64, ExpressionError> {
        match self {
            FnNode::Constant(c) => Ok(*c),
            FnNode::Deferred(expr) => Ok(expr.eval_unchecked(args)),
            FnNode::Closure(f) => Ok(f(t, args)),
            FnNode::Pulse(pulse) => Ok(pulse.evaluate(t)),
            FnNode::Oscillation(osc) => Ok(osc.eval(t, args)),
            FnNode::Text { expr, symbols } => expr.evaluate_with(|name| {
                if name == TIME_SYMBOL {
                    return Some(Complex64::new(t, 0.0));
                }
                symbols
                    .iter()
                    .position(|s| s == name)
                    .map(|i| Complex64::new(args[i], 0.0))
            }),
            FnNode::Sum { lhs, rhs, split } => {
                Ok(lhs.eval(t, &args[..*split])? + rhs.eval(t, &args[*split..])?)
            }
            FnNode::Product { lhs, rhs, split } => {
                Ok(lhs.eval(t, &args[..*split])? * rhs.eval(t, &args[*split..])?)
            }
            FnNode::Unary(op, inner) => Ok(op.apply(inner.eval(t, args)?)),
            FnNode::Shifted { tzero, inner } => inner.eval(t - tzero, args),
            FnNode::Piecewise {
                times,
                pieces,
                offsets,
            } => {
                let idx = times.partition_point(|start| *start <= t);
                if idx == 0 || idx > pieces.len() {
                    return Ok(Complex64::new(0.0, 0.0));
                }
                let i = idx - 1;
                pieces[i].eval(t, &args[offsets[i]..offsets[i + 1]])
            }
        }
    }

    fn max_frequency(&self) -> Option<f64> {
        let pair = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, None) => x,
            (None, y) => y,
        };
        match self {
            FnNode::Oscillation(osc) => osc.literal_frequency().map(f64::abs),
            FnNode::Sum { lhs, rhs, .. } | FnNode::Product { lhs, rhs, .. } => {
                pair(lhs.max_frequency(), rhs.max_frequency())
            }
            FnNode::Unary(_, inner) | FnNode::Shifted { inner, .. } => inner.max_frequency(),
            FnNode::Piecewise { pieces, .. } => pieces
                .iter()
                .fold(None, |acc, piece| pair(acc, piece.max_frequency())),
            _ => None,
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FnNode::Constant(c) => write!(f, "{}", c),
            FnNode::Deferred(expr) => write!(f, "{}", expr),
            FnNode::Closure(_) => write!(f, "<closure>"),
            FnNode::Pulse(pulse) => write!(f, "{:?}", pulse),
            FnNode::Oscillation(osc) => write!(f, "{:?}", osc.kind()),
            FnNode::Text { expr, .. } => write!(f, "'{}'", expr),
            FnNode::Sum { lhs, rhs, .. } => {
                write!(f, "(")?;
                lhs.describe(f)?;
                write!(f, " + ")?;
                rhs.describe(f)?;
                write!(f, ")")
            }
            FnNode::Product { lhs, rhs, .. } => {
                lhs.describe(f)?;
                write!(f, " * ")?;
                rhs.describe(f)
            }
            FnNode::Unary(op, inner) => {
                write!(f, "{:?}(", op)?;
                inner.describe(f)?;
                write!(f, ")")
            }
            FnNode::Shifted { tzero, inner } => {
                inner.describe(f)?;
                write!(f, "@{}", tzero)
            }
            FnNode::Piecewise { times, .. } => write!(f, "Piecewise{:?}", times),
        }
    }
}

/// Callable function of time.
#[derive(Clone)]
pub struct TimeFunction {
    node: FnNode,
    parameters: Vec<Parameter>,
}

impl TimeFunction {
    pub fn constant(value: Complex64) -> Self {
        Self {
            node: FnNode::Constant(value),
            parameters: Vec::new(),
        }
    }

    /// Wrap a closure over `(t, args)` with the given parameter tuple.
    pub fn from_closure<F>(f: F, parameters: Vec<Parameter>) -> Self
    where
        F: Fn(f64, &[f64]) -> Complex64 + Send + Sync + 'static,
    {
        Self {
            node: FnNode::Closure(Arc::new(f)),
            parameters,
        }
    }

    /// Wrap a parameterless closure over `t`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(f64) -> Complex64 + Send + Sync + 'static,
    {
        Self::from_closure(move |t, _| f(t), Vec::new())
    }

    /// Wrap a text expression; its non-time symbols become parameters in
    /// sorted order.
    pub fn from_text(expr: TextExpression) -> Self {
        let symbols: Vec<String> = expr
            .free_symbols()
            .iter()
            .filter(|s| s.as_str() != TIME_SYMBOL)
            .cloned()
            .collect();
        let parameters = symbols.iter().map(Parameter::new).collect();
        Self {
            node: FnNode::Text { expr, symbols },
            parameters,
        }
    }

    /// Piecewise composition; `times` holds one more entry than `pieces`
    /// and must be nondecreasing.
    pub fn piecewise(times: Vec<f64>, pieces: Vec<TimeFunction>) -> Result<Self, ExpressionError> {
        if times.len() != pieces.len() + 1 {
            return Err(ExpressionError::Incompatible(format!(
                "piecewise needs {} breakpoints for {} pieces, got {}",
                pieces.len() + 1,
                pieces.len(),
                times.len()
            )));
        }
        if times.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(ExpressionError::Incompatible(
                "piecewise breakpoints must be nondecreasing".into(),
            ));
        }

        let mut parameters = Vec::new();
        let mut offsets = vec![0];
        let mut nodes = Vec::with_capacity(pieces.len());
        for piece in pieces {
            parameters.extend(piece.parameters);
            offsets.push(parameters.len());
            nodes.push(piece.node);
        }

        Ok(Self {
            node: FnNode::Piecewise {
                times,
                pieces: nodes,
                offsets,
            },
            parameters,
        })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Value when the function is a literal constant.
    pub fn constant_value(&self) -> Option<Complex64> {
        match self.node {
            FnNode::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Largest literal oscillation frequency in the tree.
    pub fn max_frequency(&self) -> Option<f64> {
        self.node.max_frequency()
    }

    /// Evaluate at local time `t - tzero`.
    pub fn shifted(self, tzero: f64) -> Self {
        if tzero == 0.0 {
            return self;
        }
        let node = match self.node {
            FnNode::Constant(c) => FnNode::Constant(c),
            FnNode::Deferred(expr) => FnNode::Deferred(expr),
            node => FnNode::Shifted {
                tzero,
                inner: Box::new(node),
            },
        };
        Self {
            node,
            parameters: self.parameters,
        }
    }

    pub fn unary(self, op: UnaryOp) -> Self {
        let node = match self.node {
            FnNode::Constant(c) => FnNode::Constant(op.apply(c)),
            FnNode::Deferred(expr) => FnNode::Deferred(expr.unary(op)),
            node => FnNode::Unary(op, Box::new(node)),
        };
        Self {
            node,
            parameters: self.parameters,
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

    pub fn conj(self) -> Self {
        self.unary(UnaryOp::Conj)
    }

    /// Evaluate with positionally bound parameters.
    pub fn evaluate(&self, t: f64, args: &[f64]) -> Result<Complex64, ExpressionError> {
        if args.len() != self.parameters.len() {
            return Err(ExpressionError::ParameterCount {
                expected: self.parameters.len(),
                got: args.len(),
            });
        }
        self.node.eval(t, args)
    }

    /// Evaluate with parameters bound by name.
    pub fn evaluate_named(
        &self,
        t: f64,
        args: &HashMap<String, f64>,
    ) -> Result<Complex64, ExpressionError> {
        let bound = bind_named(&self.parameters, args)?;
        self.node.eval(t, &bound)
    }

    fn combine(self, rhs: TimeFunction, product: bool) -> Self {
        if let (FnNode::Constant(a), FnNode::Constant(b)) = (&self.node, &rhs.node) {
            let value = if product { a * b } else { a + b };
            return Self::constant(value);
        }
        let split = self.parameters.len();
        let mut parameters = self.parameters;
        parameters.extend(rhs.parameters);
        let lhs = Box::new(self.node);
        let rhs = Box::new(rhs.node);
        let node = if product {
            FnNode::Product { lhs, rhs, split }
        } else {
            FnNode::Sum { lhs, rhs, split }
        };
        Self { node, parameters }
    }
}

impl fmt::Debug for TimeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeFunction(")?;
        self.node.describe(f)?;
        write!(f, "; params={:?})", self.parameters)
    }
}

impl From<Pulse> for TimeFunction {
    fn from(pulse: Pulse) -> Self {
        Self {
            node: FnNode::Pulse(pulse),
            parameters: Vec::new(),
        }
    }
}

impl From<Oscillation> for TimeFunction {
    fn from(osc: Oscillation) -> Self {
        let parameters = osc.parameters().to_vec();
        Self {
            node: FnNode::Oscillation(osc),
            parameters,
        }
    }
}

impl From<ParameterExpression> for TimeFunction {
    fn from(expr: ParameterExpression) -> Self {
        let parameters = expr.parameters().to_vec();
        Self {
            node: FnNode::Deferred(expr),
            parameters,
        }
    }
}

impl Add for TimeFunction {
    type Output = TimeFunction;

    fn add(self, rhs: TimeFunction) -> TimeFunction {
        self.combine(rhs, false)
    }
}

impl Mul for TimeFunction {
    type Output = TimeFunction;

    fn mul(self, rhs: TimeFunction) -> TimeFunction {
        self.combine(rhs, true)
    }
}

impl Mul<Complex64> for TimeFunction {
    type Output = TimeFunction;

    fn mul(self, rhs: Complex64) -> TimeFunction {
        self.combine(TimeFunction::constant(rhs), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    #[test]
    fn test_product_slices_arguments() {
        let amp: TimeFunction = ParameterExpression::from(Parameter::new("amp")).into();
        let osc: TimeFunction = Oscillation::cos(Parameter::new("w"), 0.0).into();
        let f = amp * osc;
        let names: Vec<&str> = f.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["amp", "w"]);
        let v = f.evaluate(0.5, &[2.0, 3.0]).unwrap();
        assert_relative_eq!(v.re, 2.0 * (1.5f64).cos());
    }

    #[test]
    fn test_arity_is_checked() {
        let f: TimeFunction = Oscillation::sin(Parameter::new("w"), 0.0).into();
        assert!(matches!(
            f.evaluate(0.0, &[]),
            Err(ExpressionError::ParameterCount {
                expected: 1,
                got: 0
            })
        ));
    }

    #[test]
    fn test_shift_applies_to_callables_only() {
        let ramp = TimeFunction::from_fn(|t| c(t)).shifted(2.0);
        assert_relative_eq!(ramp.evaluate(5.0, &[]).unwrap().re, 3.0);
        let constant = TimeFunction::constant(c(4.0)).shifted(2.0);
        assert_eq!(constant.constant_value(), Some(c(4.0)));
    }

    #[test]
    fn test_piecewise_half_open_intervals() {
        let f = TimeFunction::piecewise(
            vec![0.0, 1.0, 1.0, 3.0],
            vec![
                TimeFunction::constant(c(1.0)),
                TimeFunction::constant(c(99.0)),
                TimeFunction::from_fn(|t| c(10.0 * t)),
            ],
        )
        .unwrap();
        assert_eq!(f.evaluate(-0.5, &[]).unwrap(), c(0.0));
        assert_eq!(f.evaluate(0.0, &[]).unwrap(), c(1.0));
        assert_eq!(f.evaluate(0.999, &[]).unwrap(), c(1.0));
        // the zero-length interval never activates
        assert_eq!(f.evaluate(1.0, &[]).unwrap(), c(10.0));
        assert_eq!(f.evaluate(3.0, &[]).unwrap(), c(0.0));
    }

    #[test]
    fn test_piecewise_parameter_offsets() {
        let a: TimeFunction = ParameterExpression::from(Parameter::new("a")).into();
        let b: TimeFunction = ParameterExpression::from(Parameter::new("b")).into();
        let f = TimeFunction::piecewise(vec![0.0, 1.0, f64::INFINITY], vec![a, b]).unwrap();
        assert_eq!(f.parameters().len(), 2);
        assert_eq!(f.evaluate(0.5, &[7.0, 8.0]).unwrap(), c(7.0));
        assert_eq!(f.evaluate(100.0, &[7.0, 8.0]).unwrap(), c(8.0));
    }

    #[test]
    fn test_piecewise_rejects_bad_breakpoints() {
        let one = || TimeFunction::constant(c(1.0));
        assert!(TimeFunction::piecewise(vec![0.0, 1.0], vec![one(), one()]).is_err());
        assert!(TimeFunction::piecewise(vec![1.0, 0.0], vec![one()]).is_err());
        assert!(TimeFunction::piecewise(vec![0.0, f64::NAN], vec![one()]).is_err());
    }

    #[test]
    fn test_text_symbols_become_parameters() {
        let expr = TextExpression::parse("amp * cos(w * t)").unwrap();
        let f = TimeFunction::from_text(expr);
        let names: Vec<&str> = f.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["amp", "w"]);

        let mut args = HashMap::new();
        args.insert("amp".to_string(), 0.5);
        args.insert("w".to_string(), 2.0);
        let v = f.evaluate_named(0.25, &args).unwrap();
        assert_relative_eq!(v.re, 0.5 * (0.5f64).cos());
    }

    #[test]
    fn test_constant_folding_and_max_frequency() {
        let f = TimeFunction::constant(c(2.0)) * TimeFunction::constant(c(3.0));
        assert_eq!(f.constant_value(), Some(c(6.0)));

        let g = TimeFunction::from(Oscillation::cos(-5.0, 0.0)) * c(2.0)
            + TimeFunction::from(Oscillation::sin(3.0, 0.0));
        assert_eq!(g.max_frequency(), Some(5.0));
    }

    #[test]
    fn test_pulse_node() {
        let f = TimeFunction::from(Pulse::Square {
            duration: 1.0,
            amp: c(0.2),
        })
        .shifted(4.0);
        assert_eq!(f.evaluate(4.5, &[]).unwrap(), c(0.2));
        assert_eq!(f.evaluate(0.5, &[]).unwrap(), c(0.0));
    }
}
