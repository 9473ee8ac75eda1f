// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression trees handed to the engine by the planner
//!
//! The engine never interprets SQL text. Predicates, projected columns,
//! group keys, sort keys and join keys all arrive as [`Expr`] nodes and are
//! evaluated row by row through [`Evaluator`].

pub mod eval;

pub use eval::{Evaluator, RowContext};

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column of the current row, possibly qualified (`o.user_id`)
    Column(String),
    /// Constant value
    Literal(Value),
    /// `*`, only meaningful in projections and `count(*)`
    Star,
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call; aggregate names are recognised by the group-by operator
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn equals(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::Eq, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::Gt, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::Lt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::Or, other)
    }

    /// Aggregate function name (lower case) if this is a call to count/sum/avg/min/max
    pub fn aggregate_name(&self) -> Option<String> {
        match self {
            Expr::Function { name, .. } => {
                let lower = name.to_lowercase();
                matches!(lower.as_str(), "count" | "sum" | "avg" | "min" | "max").then_some(lower)
            }
            _ => None,
        }
    }

    /// If this is `column = literal` (either side), return both parts
    pub fn as_column_equality(&self) -> Option<(&str, &Value)> {
        match self {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(c), Expr::Literal(v)) | (Expr::Literal(v), Expr::Column(c)) => {
                    Some((c.as_str(), v))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Star => write!(f, "*"),
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Neg => write!(f, "-{}", expr),
                UnaryOp::IsNull => write!(f, "{} IS NULL", expr),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", expr),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
