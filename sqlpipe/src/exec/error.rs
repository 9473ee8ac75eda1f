// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution error types

use crate::functions::FunctionError;
use crate::storage::StorageError;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Expression evaluation error: {0}")]
    ExpressionError(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Missing capability: table '{table}' does not support {capability}")]
    MissingCapability { table: String, capability: String },

    #[error("Unexpected message in {task}: {detail}")]
    UnexpectedMessage { task: String, detail: String },

    #[error("Missing join key in {task}")]
    MissingJoinKey { task: String },

    #[error("Join key already set on message {id}")]
    JoinKeyAlreadySet { id: u64 },

    #[error("Materialization limit exceeded in {task}: more than {limit} rows buffered")]
    MaterializationLimit { task: String, limit: usize },

    #[error("Runtime fault: {0}")]
    RuntimeFault(String),

    #[error("Statement cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for ExecutionError {
    fn from(error: StorageError) -> Self {
        ExecutionError::StorageError(error.to_string())
    }
}

impl From<FunctionError> for ExecutionError {
    fn from(error: FunctionError) -> Self {
        ExecutionError::ExpressionError(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ExecutionError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            ExecutionError::Cancelled
        } else {
            ExecutionError::RuntimeFault(format!("task panicked: {}", error))
        }
    }
}
