// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Generic function trait for expression evaluation
//!
//! Every scalar function callable from an expression implements [`Function`].
//! Arguments arrive already evaluated as [`Value`]s.

use crate::types::Value;

/// Error type for function execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum FunctionError {
    #[error("Invalid argument count: expected {expected}, got {actual}")]
    InvalidArgumentCount { expected: usize, actual: usize },

    #[error("Invalid argument type: {message}")]
    InvalidArgumentType { message: String },

    #[error("Function execution failed: {message}")]
    ExecutionError { message: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },
}

/// Result type for function execution
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Function execution context
pub struct FunctionContext {
    /// Evaluated function arguments
    pub arguments: Vec<Value>,
}

impl FunctionContext {
    pub fn new(arguments: Vec<Value>) -> Self {
        Self { arguments }
    }

    /// Get a specific argument by index
    pub fn get_argument(&self, index: usize) -> FunctionResult<&Value> {
        self.arguments
            .get(index)
            .ok_or_else(|| FunctionError::InvalidArgumentCount {
                expected: index + 1,
                actual: self.arguments.len(),
            })
    }

    /// Get the number of arguments
    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// Check if the function has the expected number of arguments
    pub fn validate_argument_count(&self, expected: usize) -> FunctionResult<()> {
        if self.argument_count() != expected {
            return Err(FunctionError::InvalidArgumentCount {
                expected,
                actual: self.argument_count(),
            });
        }
        Ok(())
    }

    /// Get an argument that must be a string
    pub fn string_argument(&self, index: usize) -> FunctionResult<&str> {
        let value = self.get_argument(index)?;
        value
            .as_string()
            .ok_or_else(|| FunctionError::InvalidArgumentType {
                message: format!(
                    "argument {} must be a String, got {}",
                    index,
                    value.type_name()
                ),
            })
    }
}

/// Core trait for all functions - just implement this for any function
pub trait Function: Send + Sync + std::fmt::Debug {
    /// Get the name of the function
    fn name(&self) -> &str;

    /// Get the function description
    fn description(&self) -> &str;

    /// Get the expected number of arguments
    fn argument_count(&self) -> usize;

    /// Execute the function with the given context
    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value>;

    /// Get the return type of the function
    fn return_type(&self) -> &str;

    /// Check if this function accepts a variable number of arguments
    fn is_variadic(&self) -> bool {
        false
    }

    /// Check whether a call with `count` arguments is acceptable
    fn accepts(&self, count: usize) -> bool {
        self.is_variadic() || count == self.argument_count()
    }
}
