// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row-at-a-time expression evaluation
//!
//! `eval` returns `None` whenever the expression cannot produce a value for
//! this row: a missing column, a type mismatch, a failed function call or
//! SQL unknown. Operators decide what a `None` means for them.

use super::{BinaryOp, Expr, UnaryOp};
use crate::functions::FunctionRegistry;
use crate::types::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Named field access into the row being evaluated
pub trait RowContext {
    fn get(&self, name: &str) -> Option<&Value>;
}

/// Context with no fields, used for constant expressions such as INSERT values
pub struct EmptyRow;

impl RowContext for EmptyRow {
    fn get(&self, _name: &str) -> Option<&Value> {
        None
    }
}

/// Side-effect free expression evaluator
#[derive(Debug, Clone)]
pub struct Evaluator {
    functions: Arc<FunctionRegistry>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::new()))
    }
}

impl Evaluator {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Evaluate `expr` against one row
    pub fn eval(&self, row: &dyn RowContext, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Column(name) => row.get(name).cloned(),
            Expr::Literal(value) => Some(value.clone()),
            Expr::Star => None,
            Expr::Unary { op, expr } => self.eval_unary(row, *op, expr),
            Expr::Binary { op, left, right } => self.eval_binary(row, *op, left, right),
            Expr::Function { name, args } => {
                let arguments = args
                    .iter()
                    .map(|arg| self.eval(row, arg).unwrap_or(Value::Null))
                    .collect();
                match self.functions.call(name, arguments) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::trace!("function {} failed: {}", name, e);
                        None
                    }
                }
            }
        }
    }

    /// Evaluate a predicate; anything other than a boolean is `None`
    pub fn eval_bool(&self, row: &dyn RowContext, expr: &Expr) -> Option<bool> {
        match self.eval(row, expr)? {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn eval_unary(&self, row: &dyn RowContext, op: UnaryOp, expr: &Expr) -> Option<Value> {
        match op {
            UnaryOp::IsNull => Some(Value::Bool(
                self.eval(row, expr).map_or(true, |v| v.is_null()),
            )),
            UnaryOp::IsNotNull => Some(Value::Bool(
                self.eval(row, expr).map_or(false, |v| !v.is_null()),
            )),
            UnaryOp::Not => self.eval_bool(row, expr).map(|b| Value::Bool(!b)),
            UnaryOp::Neg => match self.eval(row, expr)? {
                Value::Int(i) => i.checked_neg().map(Value::Int),
                Value::Number(n) => Some(Value::Number(-n)),
                _ => None,
            },
        }
    }

    fn eval_binary(
        &self,
        row: &dyn RowContext,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Option<Value> {
        match op {
            BinaryOp::And => {
                let l = self.eval_bool(row, left);
                if l == Some(false) {
                    return Some(Value::Bool(false));
                }
                let r = self.eval_bool(row, right);
                match (l, r) {
                    (_, Some(false)) => Some(Value::Bool(false)),
                    (Some(true), Some(true)) => Some(Value::Bool(true)),
                    _ => None,
                }
            }
            BinaryOp::Or => {
                let l = self.eval_bool(row, left);
                if l == Some(true) {
                    return Some(Value::Bool(true));
                }
                let r = self.eval_bool(row, right);
                match (l, r) {
                    (_, Some(true)) => Some(Value::Bool(true)),
                    (Some(false), Some(false)) => Some(Value::Bool(false)),
                    _ => None,
                }
            }
            _ => {
                let l = self.eval(row, left)?;
                let r = self.eval(row, right)?;
                if l.is_null() || r.is_null() {
                    return None;
                }
                match op {
                    BinaryOp::Eq => Some(Value::Bool(l.sql_equals(&r))),
                    BinaryOp::NotEq => Some(Value::Bool(!l.sql_equals(&r))),
                    BinaryOp::Lt => compare(&l, &r, |o| o == Ordering::Less),
                    BinaryOp::LtEq => compare(&l, &r, |o| o != Ordering::Greater),
                    BinaryOp::Gt => compare(&l, &r, |o| o == Ordering::Greater),
                    BinaryOp::GtEq => compare(&l, &r, |o| o != Ordering::Less),
                    _ => arithmetic(op, &l, &r),
                }
            }
        }
    }
}

fn compare(l: &Value, r: &Value, test: impl Fn(Ordering) -> bool) -> Option<Value> {
    l.compare(r).map(|ordering| Value::Bool(test(ordering)))
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Option<Value> {
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int),
            BinaryOp::Mod => a.checked_rem(b).map(Value::Int),
            BinaryOp::Div if b == 0 => None,
            BinaryOp::Div => Some(Value::Number(a as f64 / b as f64)),
            _ => None,
        };
    }
    if !l.is_numeric() || !r.is_numeric() {
        return None;
    }
    let (a, b) = (l.as_number()?, r.as_number()?);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return None,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return None,
    };
    Some(Value::Number(result))
}
