// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Text coefficient expressions.
//!
//! The dialect consumed by the integrator's native coefficient path:
//! real and imaginary literals (`1.5`, `2e-3`, `0.5j`), symbols (`t`, `pi`,
//! named arguments), `+ - * / ^` (`**` is accepted for `^`), unary minus,
//! parentheses and the functions `cos sin exp sqrt abs real imag conj arg`.
//! Evaluation is complex-valued.

use logos::Logos;
use num_complex::Complex64;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

use crate::error::ExpressionError;

/// Time symbol.
pub const TIME_SYMBOL: &str = "t";

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Real(f64),

    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?[jJ]", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].parse::<f64>().ok()
    })]
    Imag(f64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("^")]
    #[token("**")]
    Power,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Real(v) => write!(f, "{}", v),
            Token::Imag(v) => write!(f, "{}j", v),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Power => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 3,
        }
    }

    fn right_associative(self) -> bool {
        matches!(self, BinOp::Pow)
    }
}

/// Functions recognized in text expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Cos,
    Sin,
    Exp,
    Sqrt,
    Abs,
    Real,
    Imag,
    Conj,
    Arg,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "cos" => Some(Func::Cos),
            "sin" => Some(Func::Sin),
            "exp" => Some(Func::Exp),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            "real" => Some(Func::Real),
            "imag" => Some(Func::Imag),
            "conj" => Some(Func::Conj),
            "arg" | "angle" => Some(Func::Arg),
            _ => None,
        }
    }

    fn apply(self, z: Complex64) -> Complex64 {
        match self {
            Func::Cos => z.cos(),
            Func::Sin => z.sin(),
            Func::Exp => z.exp(),
            Func::Sqrt => z.sqrt(),
            Func::Abs => Complex64::new(z.norm(), 0.0),
            Func::Real => Complex64::new(z.re, 0.0),
            Func::Imag => Complex64::new(z.im, 0.0),
            Func::Conj => z.conj(),
            Func::Arg => Complex64::new(z.arg(), 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(Complex64),
    Symbol(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        arg: Box<Expr>,
    },
}

impl Expr {
    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(name) => {
                if name != "pi" {
                    out.insert(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_symbols(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
            Expr::Call { arg, .. } => arg.collect_symbols(out),
        }
    }

    fn eval<F>(&self, lookup: &F) -> Result<Complex64, ExpressionError>
    where
        F: Fn(&str) -> Option<Complex64>,
    {
        match self {
            Expr::Number(z) => Ok(*z),
            Expr::Symbol(name) => match lookup(name) {
                Some(v) => Ok(v),
                None if name == "pi" => Ok(Complex64::new(std::f64::consts::PI, 0.0)),
                None => Err(ExpressionError::UnboundSymbol(name.clone())),
            },
            Expr::Neg(inner) => Ok(-inner.eval(lookup)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(lookup)?;
                let b = rhs.eval(lookup)?;
                Ok(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => power(a, b),
                })
            }
            Expr::Call { func, arg } => Ok(func.apply(arg.eval(lookup)?)),
        }
    }
}

fn power(base: Complex64, exponent: Complex64) -> Complex64 {
    if exponent.im != 0.0 {
        return base.powc(exponent);
    }
    let e = exponent.re;
    if base.im == 0.0 && base.re >= 0.0 {
        Complex64::new(base.re.powf(e), 0.0)
    } else if e.fract() == 0.0 && e.abs() <= 64.0 {
        base.powi(e as i32)
    } else {
        base.powf(e)
    }
}

/// A parsed text coefficient expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TextExpression {
    source: String,
    ast: Expr,
    symbols: BTreeSet<String>,
}

impl TextExpression {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(result) = lexer.next() {
            let span = lexer.span();
            match result {
                Ok(token) => tokens.push((token, span)),
                Err(()) => {
                    return Err(ExpressionError::Parse {
                        position: span.start,
                        message: format!("invalid token '{}'", &source[span]),
                    })
                }
            }
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            len: source.len(),
        };
        let ast = parser.parse_expression(0)?;
        if let Some((token, span)) = parser.tokens.get(parser.pos) {
            return Err(ExpressionError::Parse {
                position: span.start,
                message: format!("unexpected '{}'", token),
            });
        }

        let mut symbols = BTreeSet::new();
        ast.collect_symbols(&mut symbols);

        Ok(Self {
            source: source.to_string(),
            ast,
            symbols,
        })
    }

    /// The expression as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Symbols that need a value at evaluation time (`pi` is built in).
    pub fn free_symbols(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    /// Whether the expression mentions the time symbol.
    pub fn references_time(&self) -> bool {
        self.symbols.contains(TIME_SYMBOL)
    }

    /// Value of an expression with no free symbols.
    pub fn constant_value(&self) -> Option<Complex64> {
        if !self.symbols.is_empty() {
            return None;
        }
        self.ast.eval(&|_: &str| None).ok()
    }

    /// Evaluate at time `t` with named arguments.
    pub fn evaluate(
        &self,
        t: f64,
        args: &HashMap<String, f64>,
    ) -> Result<Complex64, ExpressionError> {
        self.evaluate_with(|name| {
            if name == TIME_SYMBOL {
                Some(Complex64::new(t, 0.0))
            } else {
                args.get(name).map(|v| Complex64::new(*v, 0.0))
            }
        })
    }

    /// Evaluate with a symbol lookup.
    pub fn evaluate_with<F>(&self, lookup: F) -> Result<Complex64, ExpressionError>
    where
        F: Fn(&str) -> Option<Complex64>,
    {
        self.ast.eval(&lookup)
    }
}

impl fmt::Display for TextExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::str::FromStr for TextExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextExpression::parse(s)
    }
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.len)
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_binary_op(&self) -> Option<BinOp> {
        match self.peek()? {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Power => Some(BinOp::Pow),
            _ => None,
        }
    }

    /// Precedence climbing over binary operators.
    fn parse_expression(&mut self, min_prec: u8) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.peek_binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;

            let next_min = if op.right_associative() { prec } else { prec + 1 };
            let rhs = self.parse_expression(next_min)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    /// Unary minus binds looser than `^`: `-x^2 == -(x^2)`.
    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.consume(&Token::Minus) {
            let inner = self.parse_expression(BinOp::Pow.precedence())?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.consume(&Token::Plus) {
            return self.parse_expression(BinOp::Pow.precedence());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression"))?;

        match token {
            Token::Real(v) => {
                self.pos += 1;
                Ok(Expr::Number(Complex64::new(v, 0.0)))
            }
            Token::Imag(v) => {
                self.pos += 1;
                Ok(Expr::Number(Complex64::new(0.0, v)))
            }
            Token::Identifier(name) => {
                let at = self.position();
                self.pos += 1;
                if self.consume(&Token::LParen) {
                    let func = Func::from_name(&name).ok_or(ExpressionError::Parse {
                        position: at,
                        message: format!("unknown function '{}'", name),
                    })?;
                    let arg = self.parse_expression(0)?;
                    if !self.consume(&Token::RParen) {
                        return Err(self.error("expected ')'"));
                    }
                    Ok(Expr::Call {
                        func,
                        arg: Box::new(arg),
                    })
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expression(0)?;
                if !self.consume(&Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected '{}'", other))),
        }
    }
}

/// Format a complex literal in the text dialect.
pub fn complex_literal(z: Complex64) -> String {
    format!("({}{:+}j)", z.re, z.im)
}
