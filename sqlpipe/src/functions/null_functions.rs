// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Null handling function implementations
//!
//! - NULLIF: Returns NULL if two expressions are equal, otherwise returns the first expression
//! - COALESCE: Returns the first non-NULL expression from a list of expressions

use super::function_trait::{Function, FunctionContext, FunctionResult};
use crate::types::Value;

// ==============================================================================
// NULLIF FUNCTION
// ==============================================================================

/// NULLIF function - returns NULL if expr1 equals expr2, otherwise returns expr1
#[derive(Debug)]
pub struct NullIfFunction;

impl NullIfFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for NullIfFunction {
    fn name(&self) -> &str {
        "NULLIF"
    }

    fn description(&self) -> &str {
        "Returns NULL if expr1 equals expr2, otherwise returns expr1"
    }

    fn argument_count(&self) -> usize {
        2
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(2)?;

        let expr1 = context.get_argument(0)?;
        let expr2 = context.get_argument(1)?;

        if expr1.is_null() || expr2.is_null() {
            return Ok(expr1.clone());
        }

        if expr1.sql_equals(expr2) {
            Ok(Value::Null)
        } else {
            Ok(expr1.clone())
        }
    }

    fn return_type(&self) -> &str {
        "Any"
    }
}

// ==============================================================================
// COALESCE FUNCTION
// ==============================================================================

/// COALESCE function - returns the first non-NULL expression from a list
#[derive(Debug)]
pub struct CoalesceFunction;

impl CoalesceFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for CoalesceFunction {
    fn name(&self) -> &str {
        "COALESCE"
    }

    fn description(&self) -> &str {
        "Returns the first non-NULL argument"
    }

    fn argument_count(&self) -> usize {
        0
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        Ok(context
            .arguments
            .iter()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "Any"
    }

    fn is_variadic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce() {
        let ctx = FunctionContext::new(vec![Value::Null, Value::Int(2), Value::Int(3)]);
        assert_eq!(CoalesceFunction::new().execute(&ctx).unwrap(), Value::Int(2));

        let ctx = FunctionContext::new(vec![Value::Null]);
        assert_eq!(CoalesceFunction::new().execute(&ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_nullif() {
        let ctx = FunctionContext::new(vec![Value::Int(2), Value::Number(2.0)]);
        assert_eq!(NullIfFunction::new().execute(&ctx).unwrap(), Value::Null);

        let ctx = FunctionContext::new(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(NullIfFunction::new().execute(&ctx).unwrap(), Value::Int(2));
    }
}
