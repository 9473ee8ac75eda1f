// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Numeric function implementations
//!
//! - ABS: absolute value, keeps integers as integers
//! - ROUND: half-away-from-zero rounding to N decimal places
//! - TO_INT / TO_NUMBER: explicit numeric casts

use super::function_trait::{Function, FunctionContext, FunctionError, FunctionResult};
use crate::types::Value;

fn numeric_argument(context: &FunctionContext, index: usize, function: &str) -> FunctionResult<Option<f64>> {
    let value = context.get_argument(index)?;
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_number()
        .map(Some)
        .ok_or_else(|| FunctionError::InvalidArgumentType {
            message: format!("{} cannot convert {} to number", function, value.type_name()),
        })
}

// ==============================================================================
// ABS FUNCTION
// ==============================================================================

#[derive(Debug)]
pub struct AbsFunction;

impl AbsFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for AbsFunction {
    fn name(&self) -> &str {
        "ABS"
    }

    fn description(&self) -> &str {
        "Returns the absolute value of a number"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        if let Value::Int(i) = context.get_argument(0)? {
            return Ok(Value::Int(i.abs()));
        }
        Ok(numeric_argument(context, 0, "ABS")?
            .map(|n| Value::Number(n.abs()))
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}

// ==============================================================================
// ROUND FUNCTION
// ==============================================================================

/// ROUND function - ROUND(n) or ROUND(n, places)
#[derive(Debug)]
pub struct RoundFunction;

impl RoundFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for RoundFunction {
    fn name(&self) -> &str {
        "ROUND"
    }

    fn description(&self) -> &str {
        "Rounds a number half away from zero to the given number of decimal places"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn accepts(&self, count: usize) -> bool {
        (1..=2).contains(&count)
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let arg_count = context.argument_count();
        if !(1..=2).contains(&arg_count) {
            return Err(FunctionError::InvalidArgumentType {
                message: "ROUND function expects 1 or 2 arguments".to_string(),
            });
        }

        let number = match numeric_argument(context, 0, "ROUND")? {
            Some(n) => n,
            None => return Ok(Value::Null),
        };

        let decimal_places = if arg_count == 2 {
            context
                .get_argument(1)?
                .as_int()
                .ok_or_else(|| FunctionError::InvalidArgumentType {
                    message: "ROUND decimal places argument must be an integer".to_string(),
                })? as i32
        } else {
            0
        };

        Ok(Value::Number(round_half_away(number, decimal_places)))
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}

/// ROUND(n, d) = sign(n) * FLOOR(|n| * 10^d + 0.5) / 10^d
fn round_half_away(n: f64, decimal_places: i32) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    if n < 0.0 {
        return -round_half_away(-n, decimal_places);
    }
    let multiplier = 10.0_f64.powi(decimal_places);
    (n * multiplier + 0.5).floor() / multiplier
}

// ==============================================================================
// CAST FUNCTIONS
// ==============================================================================

/// TO_INT function - truncating integer cast
#[derive(Debug)]
pub struct ToIntFunction;

impl ToIntFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for ToIntFunction {
    fn name(&self) -> &str {
        "TO_INT"
    }

    fn description(&self) -> &str {
        "Casts a value to an integer, truncating any fraction"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        match context.get_argument(0)? {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            _ => Ok(numeric_argument(context, 0, "TO_INT")?
                .map(|n| Value::Int(n.trunc() as i64))
                .unwrap_or(Value::Null)),
        }
    }

    fn return_type(&self) -> &str {
        "Int"
    }
}

/// TO_NUMBER function - floating point cast
#[derive(Debug)]
pub struct ToNumberFunction;

impl ToNumberFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for ToNumberFunction {
    fn name(&self) -> &str {
        "TO_NUMBER"
    }

    fn description(&self) -> &str {
        "Casts a value to a floating point number"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        Ok(numeric_argument(context, 0, "TO_NUMBER")?
            .map(Value::Number)
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}
