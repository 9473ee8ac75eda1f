// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar function registry used by the expression evaluator
//!
//! Add new functions by implementing the [`Function`] trait and registering
//! them. The registry is an ordinary value: build one per engine and hand it
//! to the executor, there is no process-wide instance.

mod function_trait;
mod null_functions;
mod numeric_functions;
mod string_functions;
mod temporal_functions;

pub use function_trait::{Function, FunctionContext, FunctionError, FunctionResult};

use crate::types::Value;
use std::collections::HashMap;

/// Registry of all available functions
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn Function + 'static>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Create a new function registry with the built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register("UPPER", Box::new(string_functions::UpperFunction::new()));
        registry.register("LOWER", Box::new(string_functions::LowerFunction::new()));
        registry.register("TRIM", Box::new(string_functions::TrimFunction::new()));
        registry.register("LENGTH", Box::new(string_functions::LengthFunction::new()));
        registry.register("LEN", Box::new(string_functions::LengthFunction::new())); // Alias
        registry.register("CONCAT", Box::new(string_functions::ConcatFunction::new()));
        registry.register(
            "CONTAINS",
            Box::new(string_functions::ContainsFunction::new()),
        );
        registry.register("LIKE", Box::new(string_functions::LikeFunction::new()));

        registry.register("NULLIF", Box::new(null_functions::NullIfFunction::new()));
        registry.register(
            "COALESCE",
            Box::new(null_functions::CoalesceFunction::new()),
        );

        registry.register("ABS", Box::new(numeric_functions::AbsFunction::new()));
        registry.register("ROUND", Box::new(numeric_functions::RoundFunction::new()));
        registry.register("TO_INT", Box::new(numeric_functions::ToIntFunction::new()));
        registry.register(
            "TO_NUMBER",
            Box::new(numeric_functions::ToNumberFunction::new()),
        );

        registry.register("NOW", Box::new(temporal_functions::NowFunction::new()));
        registry.register(
            "TO_TIMESTAMP",
            Box::new(temporal_functions::ToTimestampFunction::new()),
        );

        registry
    }

    /// Register a new function, replacing any function with the same name
    pub fn register(&mut self, name: &str, function: Box<dyn Function + 'static>) {
        self.functions.insert(name.to_uppercase(), function);
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(&name.to_uppercase()).map(|f| f.as_ref())
    }

    /// Check if a function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Look up and run a function with already evaluated arguments
    pub fn call(&self, name: &str, arguments: Vec<Value>) -> FunctionResult<Value> {
        let function = self.get(name).ok_or_else(|| FunctionError::UnknownFunction {
            name: name.to_string(),
        })?;
        if !function.accepts(arguments.len()) {
            return Err(FunctionError::InvalidArgumentCount {
                expected: function.argument_count(),
                actual: arguments.len(),
            });
        }
        function.execute(&FunctionContext::new(arguments))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let registry = FunctionRegistry::new();

        assert!(registry.get("upper").is_some(), "UPPER function should work");
        assert!(registry.get("UPPER").is_some());
        assert!(registry.has_function("Coalesce"));
        assert!(!registry.has_function("KEYS"));
    }

    #[test]
    fn test_call_checks_arity() {
        let registry = FunctionRegistry::new();

        let err = registry
            .call("upper", vec![Value::from("a"), Value::from("b")])
            .unwrap_err();
        assert!(matches!(err, FunctionError::InvalidArgumentCount { .. }));

        assert_eq!(
            registry.call("round", vec![Value::Number(1.25), Value::Int(1)]).unwrap(),
            Value::Number(1.3)
        );
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::empty();
        assert!(matches!(
            registry.call("upper", vec![]),
            Err(FunctionError::UnknownFunction { .. })
        ));
    }
}
