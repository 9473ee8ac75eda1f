// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage error types and the values exchanged with backends

use crate::expr::Evaluator;
use crate::types::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Error types for storage operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Connection to table '{0}' is closed")]
    ConnectionClosed(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Row payload handed to `Upsert::put`
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// One value per table column, in table column order
    Positional(Vec<Value>),
    /// Column name to value; columns not named keep their stored value
    Named(BTreeMap<String, Value>),
}

/// Per-statement context passed to every write call
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub statement_id: Uuid,
    /// Lets backends evaluate WHERE expressions against their own rows
    pub evaluator: Evaluator,
}

impl WriteContext {
    pub fn new(statement_id: Uuid, evaluator: Evaluator) -> Self {
        Self {
            statement_id,
            evaluator,
        }
    }
}
