// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend contracts
//!
//! A [`DataSource`] opens one [`Connection`] per table per task. The
//! connection advertises what it can do through optional capability
//! accessors; the executor checks them while building the task tree so a
//! missing capability is reported before anything runs.

use super::types::{RowValues, StorageResult, WriteContext};
use crate::exec::message::Message;
use crate::expr::Expr;
use crate::plan::DeletePlan;
use crate::types::Value;
use std::collections::BTreeMap;

/// Something that can open connections to named tables
pub trait DataSource: Send + Sync {
    /// Open a connection to `table`
    fn open(&self, table: &str) -> StorageResult<Box<dyn Connection>>;
}

/// An open handle on one table
pub trait Connection: Send + Sync {
    fn table(&self) -> &str;

    /// Table columns in storage order
    fn columns(&self) -> Vec<String>;

    /// Primary key column, if the table has one
    fn primary_key(&self) -> Option<String> {
        None
    }

    fn scanner(&self) -> Option<&dyn Scanner> {
        None
    }

    fn upsert(&self) -> Option<&dyn Upsert> {
        None
    }

    fn patch_where(&self) -> Option<&dyn PatchWhere> {
        None
    }

    fn deletion(&self) -> Option<&dyn Deletion> {
        None
    }

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> StorageResult<()>;
}

/// Full-table read access
pub trait Scanner: Send + Sync {
    fn create_iterator(&self) -> StorageResult<Box<dyn RowIterator>>;
}

/// Pull-based row stream; `None` means the scan is complete
pub trait RowIterator: Send {
    fn next(&mut self) -> Option<Message>;
}

/// Keyed writes
pub trait Upsert: Send + Sync {
    /// Write one row and return its key. Without a key the backend picks one.
    fn put(&self, ctx: &WriteContext, key: Option<&str>, values: RowValues)
        -> StorageResult<String>;
}

/// Predicate-driven partial updates
pub trait PatchWhere: Send + Sync {
    /// Apply `values` to every row matching `where_expr`, returning the number of rows changed
    fn patch_where(
        &self,
        ctx: &WriteContext,
        where_expr: &Expr,
        values: &BTreeMap<String, Value>,
    ) -> StorageResult<u64>;
}

/// Predicate-driven deletes
pub trait Deletion: Send + Sync {
    fn delete_expression(
        &self,
        ctx: &WriteContext,
        plan: &DeletePlan,
        where_expr: &Expr,
    ) -> StorageResult<u64>;
}
