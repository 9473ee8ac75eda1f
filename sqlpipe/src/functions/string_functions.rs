// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Consolidated string function implementations
//!
//! This module contains all string manipulation functions:
//! - UPPER / LOWER: case conversion
//! - TRIM: removes leading/trailing whitespace
//! - LENGTH: character count
//! - CONCAT: joins the string form of every argument
//! - CONTAINS: substring test
//! - LIKE: SQL pattern match with `%` and `_` wildcards

use super::function_trait::{Function, FunctionContext, FunctionError, FunctionResult};
use crate::types::Value;
use regex::Regex;

/// String form of a scalar argument, `None` for null and for containers
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Map(_) | Value::Slice(_) => None,
        other => Some(other.to_key_string()),
    }
}

// ==============================================================================
// UPPER FUNCTION
// ==============================================================================

/// UPPER function - converts string values to uppercase
#[derive(Debug)]
pub struct UpperFunction;

impl UpperFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for UpperFunction {
    fn name(&self) -> &str {
        "UPPER"
    }

    fn description(&self) -> &str {
        "Converts string values to uppercase"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        Ok(scalar_text(context.get_argument(0)?)
            .map(|s| Value::String(s.to_uppercase()))
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// LOWER FUNCTION
// ==============================================================================

/// LOWER function - converts string values to lowercase
#[derive(Debug)]
pub struct LowerFunction;

impl LowerFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for LowerFunction {
    fn name(&self) -> &str {
        "LOWER"
    }

    fn description(&self) -> &str {
        "Converts string values to lowercase"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        Ok(scalar_text(context.get_argument(0)?)
            .map(|s| Value::String(s.to_lowercase()))
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// TRIM FUNCTION
// ==============================================================================

#[derive(Debug)]
pub struct TrimFunction;

impl TrimFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for TrimFunction {
    fn name(&self) -> &str {
        "TRIM"
    }

    fn description(&self) -> &str {
        "Removes leading and trailing whitespace"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        match context.get_argument(0)? {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            other => Err(FunctionError::InvalidArgumentType {
                message: format!("TRIM expects a String, got {}", other.type_name()),
            }),
        }
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// LENGTH FUNCTION
// ==============================================================================

/// LENGTH function - number of characters in a string or items in a slice
#[derive(Debug)]
pub struct LengthFunction;

impl LengthFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for LengthFunction {
    fn name(&self) -> &str {
        "LENGTH"
    }

    fn description(&self) -> &str {
        "Returns the number of characters in a string or elements in a collection"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        match context.get_argument(0)? {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Slice(items) => Ok(Value::Int(items.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.len() as i64)),
            other => Err(FunctionError::InvalidArgumentType {
                message: format!("LENGTH expects a String or Slice, got {}", other.type_name()),
            }),
        }
    }

    fn return_type(&self) -> &str {
        "Int"
    }
}

// ==============================================================================
// CONCAT FUNCTION
// ==============================================================================

#[derive(Debug)]
pub struct ConcatFunction;

impl ConcatFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for ConcatFunction {
    fn name(&self) -> &str {
        "CONCAT"
    }

    fn description(&self) -> &str {
        "Concatenates the string form of every argument, skipping nulls"
    }

    fn argument_count(&self) -> usize {
        0
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let joined: String = context.arguments.iter().filter_map(scalar_text).collect();
        Ok(Value::String(joined))
    }

    fn return_type(&self) -> &str {
        "String"
    }

    fn is_variadic(&self) -> bool {
        true
    }
}

// ==============================================================================
// CONTAINS FUNCTION
// ==============================================================================

#[derive(Debug)]
pub struct ContainsFunction;

impl ContainsFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for ContainsFunction {
    fn name(&self) -> &str {
        "CONTAINS"
    }

    fn description(&self) -> &str {
        "Tests whether the first string contains the second"
    }

    fn argument_count(&self) -> usize {
        2
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(2)?;
        let haystack = context.get_argument(0)?;
        let needle = context.get_argument(1)?;
        match (scalar_text(haystack), scalar_text(needle)) {
            (Some(h), Some(n)) => Ok(Value::Bool(h.contains(&n))),
            _ => Ok(Value::Null),
        }
    }

    fn return_type(&self) -> &str {
        "Bool"
    }
}

// ==============================================================================
// LIKE FUNCTION
// ==============================================================================

/// LIKE function - SQL pattern matching, `%` matches any run and `_` one character
#[derive(Debug)]
pub struct LikeFunction;

impl LikeFunction {
    pub fn new() -> Self {
        Self
    }

    fn pattern_to_regex(pattern: &str) -> FunctionResult<Regex> {
        let mut translated = String::with_capacity(pattern.len() + 2);
        translated.push('^');
        for ch in pattern.chars() {
            match ch {
                '%' => translated.push_str(".*"),
                '_' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');
        Regex::new(&translated).map_err(|e| FunctionError::ExecutionError {
            message: format!("invalid LIKE pattern '{}': {}", pattern, e),
        })
    }
}

impl Function for LikeFunction {
    fn name(&self) -> &str {
        "LIKE"
    }

    fn description(&self) -> &str {
        "Matches a string against a SQL LIKE pattern"
    }

    fn argument_count(&self) -> usize {
        2
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(2)?;
        let subject = match scalar_text(context.get_argument(0)?) {
            Some(s) => s,
            None => return Ok(Value::Null),
        };
        let pattern = context.string_argument(1)?;
        let regex = Self::pattern_to_regex(pattern)?;
        Ok(Value::Bool(regex.is_match(&subject)))
    }

    fn return_type(&self) -> &str {
        "Bool"
    }
}
