// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! INSERT, UPSERT, UPDATE and DELETE
//!
//! Every mutation emits exactly one summary row with the columns `status`
//! and `affected`, whether it completes, is cancelled or hits a backend
//! failure. The summary goes out with a non-blocking send so it is delivered
//! even after the statement signal has closed.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::{column_index, Message};
use super::task::{Task, TaskBase, TaskResult};
use crate::expr::eval::EmptyRow;
use crate::expr::Expr;
use crate::plan::{DeletePlan, InsertPlan, UpdatePlan};
use crate::storage::{Connection, RowValues, StorageError};
use crate::types::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const STATUS_COLUMN: &str = "status";
pub const AFFECTED_COLUMN: &str = "affected";

pub const STATUS_OK: &str = "ok";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Build the `(status, affected)` summary row
pub fn summary_message(status: &str, affected: u64) -> Message {
    Message::row(
        1,
        vec![Value::from(status), Value::Int(affected as i64)],
        column_index(&[STATUS_COLUMN, AFFECTED_COLUMN]),
    )
}

fn missing_capability(connection: &dyn Connection, capability: &str) -> ExecutionError {
    ExecutionError::MissingCapability {
        table: connection.table().to_string(),
        capability: capability.to_string(),
    }
}

fn position_of(columns: &[String], table: &str, column: &str) -> TaskResult<usize> {
    let bare = column.rsplit_once('.').map_or(column, |(_, bare)| bare);
    columns
        .iter()
        .position(|c| c == column || c == bare)
        .ok_or_else(|| {
            ExecutionError::InvalidPlan(format!("table '{}' has no column '{}'", table, column))
        })
}

/// Emit the summary and, for a backend failure, report it
fn conclude(base: &mut TaskBase, affected: u64, failure: Option<StorageError>) -> TaskResult {
    let status = match &failure {
        Some(e) => format!("error: {}", e),
        None if base.signal().is_closed() => STATUS_CANCELLED.to_string(),
        None => STATUS_OK.to_string(),
    };
    log::debug!("{} finished: {} ({} affected)", base.name(), status, affected);
    if !base.try_emit(summary_message(&status, affected)) {
        log::warn!("{} could not deliver its summary", base.name());
    }
    match failure {
        Some(e) => Err(base.fail(e.into())),
        None => {
            base.finish();
            Ok(())
        }
    }
}

/// INSERT and UPSERT of literal row tuples
pub struct InsertTask {
    base: TaskBase,
    connection: Box<dyn Connection>,
    rows: Vec<Vec<Expr>>,
    /// Table position of each plan column
    positions: Vec<usize>,
    width: usize,
    /// Table position of the primary key when upserting
    key_position: Option<usize>,
}

impl InsertTask {
    pub fn new_insert(
        ctx: Arc<ExecutionContext>,
        plan: &InsertPlan,
        connection: Box<dyn Connection>,
    ) -> TaskResult<Self> {
        Self::new("insert", ctx, plan, connection, false)
    }

    pub fn new_upsert(
        ctx: Arc<ExecutionContext>,
        plan: &InsertPlan,
        connection: Box<dyn Connection>,
    ) -> TaskResult<Self> {
        Self::new("upsert", ctx, plan, connection, true)
    }

    fn new(
        kind: &str,
        ctx: Arc<ExecutionContext>,
        plan: &InsertPlan,
        connection: Box<dyn Connection>,
        keyed: bool,
    ) -> TaskResult<Self> {
        if connection.upsert().is_none() {
            return Err(missing_capability(connection.as_ref(), "Upsert"));
        }
        let table_columns = connection.columns();
        let columns = if plan.columns.is_empty() {
            table_columns.clone()
        } else {
            plan.columns.clone()
        };
        let positions = columns
            .iter()
            .map(|column| position_of(&table_columns, &plan.table, column))
            .collect::<TaskResult<Vec<usize>>>()?;

        if let Some((i, row)) = plan
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ExecutionError::InvalidPlan(format!(
                "row {} has {} values for {} columns",
                i,
                row.len(),
                columns.len()
            )));
        }

        let key_position = if keyed {
            let pk = connection.primary_key().ok_or_else(|| {
                ExecutionError::InvalidPlan(format!(
                    "upsert into '{}' needs a primary key",
                    plan.table
                ))
            })?;
            let pos = position_of(&table_columns, &plan.table, &pk)?;
            if !positions.contains(&pos) {
                return Err(ExecutionError::InvalidPlan(format!(
                    "upsert into '{}' must supply primary key column '{}'",
                    plan.table, pk
                )));
            }
            Some(pos)
        } else {
            None
        };

        Ok(Self {
            base: TaskBase::new(format!("{}({})", kind, plan.table), ctx),
            connection,
            rows: plan.rows.clone(),
            positions,
            width: table_columns.len(),
            key_position,
        })
    }
}

#[async_trait]
impl Task for InsertTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, false)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();
        let write_ctx = ctx.write_context();
        let Some(upsert) = self.connection.upsert() else {
            let e = missing_capability(self.connection.as_ref(), "Upsert");
            return Err(self.base.fail(e));
        };

        let mut applied = 0u64;
        let mut failure = None;
        for tuple in &self.rows {
            if self.base.signal().is_closed() {
                break;
            }
            let mut values = vec![Value::Null; self.width];
            for (expr, pos) in tuple.iter().zip(&self.positions) {
                values[*pos] = ctx.evaluator.eval(&EmptyRow, expr).unwrap_or(Value::Null);
            }
            // a null key leaves the backend to assign one
            let key = self
                .key_position
                .map(|pos| &values[pos])
                .filter(|value| !value.is_null())
                .map(Value::to_key_string);

            match upsert.put(&write_ctx, key.as_deref(), RowValues::Positional(values)) {
                Ok(_) => applied += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            // gives cancellation a chance between rows
            tokio::task::yield_now().await;
        }

        conclude(&mut self.base, applied, failure)
    }

    fn close(&mut self) -> TaskResult {
        if self.base.close() {
            self.connection.close()?;
        }
        Ok(())
    }

    fn set_input(&mut self, _input: MessageReceiver) {
        log::warn!("{} ignores its input stream", self.base.name());
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }
}

enum UpdateMode {
    Patch(Expr),
    /// Backend has no `PatchWhere`; update the single row named by `pk = literal`
    KeyedPut(String),
}

pub struct UpdateTask {
    base: TaskBase,
    connection: Box<dyn Connection>,
    values: BTreeMap<String, Value>,
    mode: UpdateMode,
}

impl UpdateTask {
    pub fn new(
        ctx: Arc<ExecutionContext>,
        plan: &UpdatePlan,
        connection: Box<dyn Connection>,
    ) -> TaskResult<Self> {
        let table_columns = connection.columns();
        let mut values = BTreeMap::new();
        for assignment in &plan.assignments {
            let pos = position_of(&table_columns, &plan.table, &assignment.column)?;
            let value = ctx
                .evaluator
                .eval(&EmptyRow, &assignment.value)
                .ok_or_else(|| {
                    ExecutionError::InvalidPlan(format!(
                        "value assigned to '{}' is not a constant expression",
                        assignment.column
                    ))
                })?;
            values.insert(table_columns[pos].clone(), value);
        }

        let where_expr = plan.where_expr.clone().unwrap_or(Expr::lit(true));
        let mode = if connection.patch_where().is_some() {
            UpdateMode::Patch(where_expr)
        } else if connection.upsert().is_some() {
            let key = Self::key_from_where(connection.as_ref(), &where_expr).ok_or_else(|| {
                ExecutionError::InvalidPlan(format!(
                    "table '{}' cannot patch by predicate; WHERE must be `primary_key = literal`",
                    plan.table
                ))
            })?;
            UpdateMode::KeyedPut(key)
        } else {
            return Err(missing_capability(connection.as_ref(), "PatchWhere"));
        };

        Ok(Self {
            base: TaskBase::new(format!("update({})", plan.table), ctx),
            connection,
            values,
            mode,
        })
    }

    fn key_from_where(connection: &dyn Connection, where_expr: &Expr) -> Option<String> {
        let pk = connection.primary_key()?;
        let (column, value) = where_expr.as_column_equality()?;
        let bare = column.rsplit_once('.').map_or(column, |(_, bare)| bare);
        (bare == pk && !value.is_null()).then(|| value.to_key_string())
    }
}

#[async_trait]
impl Task for UpdateTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, false)
    }

    async fn run(&mut self) -> TaskResult {
        if self.base.signal().is_closed() {
            return conclude(&mut self.base, 0, None);
        }
        let write_ctx = self.base.ctx().write_context();

        let outcome = match &self.mode {
            UpdateMode::Patch(where_expr) => match self.connection.patch_where() {
                Some(patch) => patch.patch_where(&write_ctx, where_expr, &self.values),
                None => Err(StorageError::InvalidOperation(
                    "PatchWhere capability disappeared".to_string(),
                )),
            },
            UpdateMode::KeyedPut(key) => match self.connection.upsert() {
                Some(upsert) => match upsert.put(
                    &write_ctx,
                    Some(key.as_str()),
                    RowValues::Named(self.values.clone()),
                ) {
                    Ok(_) => Ok(1),
                    Err(StorageError::KeyNotFound(_)) => Ok(0),
                    Err(e) => Err(e),
                },
                None => Err(StorageError::InvalidOperation(
                    "Upsert capability disappeared".to_string(),
                )),
            },
        };

        match outcome {
            Ok(affected) => conclude(&mut self.base, affected, None),
            Err(e) => conclude(&mut self.base, 0, Some(e)),
        }
    }

    fn close(&mut self) -> TaskResult {
        if self.base.close() {
            self.connection.close()?;
        }
        Ok(())
    }

    fn set_input(&mut self, _input: MessageReceiver) {
        log::warn!("{} ignores its input stream", self.base.name());
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }
}

pub struct DeleteTask {
    base: TaskBase,
    connection: Box<dyn Connection>,
    plan: DeletePlan,
    where_expr: Expr,
}

impl DeleteTask {
    pub fn new(
        ctx: Arc<ExecutionContext>,
        plan: &DeletePlan,
        connection: Box<dyn Connection>,
    ) -> TaskResult<Self> {
        if connection.deletion().is_none() {
            return Err(missing_capability(connection.as_ref(), "Deletion"));
        }
        Ok(Self {
            base: TaskBase::new(format!("delete({})", plan.table), ctx),
            connection,
            plan: plan.clone(),
            where_expr: plan.where_expr.clone().unwrap_or(Expr::lit(true)),
        })
    }
}

#[async_trait]
impl Task for DeleteTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, false)
    }

    async fn run(&mut self) -> TaskResult {
        if self.base.signal().is_closed() {
            return conclude(&mut self.base, 0, None);
        }
        let write_ctx = self.base.ctx().write_context();
        let outcome = match self.connection.deletion() {
            Some(deletion) => deletion.delete_expression(&write_ctx, &self.plan, &self.where_expr),
            None => Err(StorageError::InvalidOperation(
                "Deletion capability disappeared".to_string(),
            )),
        };
        match outcome {
            Ok(affected) => conclude(&mut self.base, affected, None),
            Err(e) => conclude(&mut self.base, 0, Some(e)),
        }
    }

    fn close(&mut self) -> TaskResult {
        if self.base.close() {
            self.connection.close()?;
        }
        Ok(())
    }

    fn set_input(&mut self, _input: MessageReceiver) {
        log::warn!("{} ignores its input stream", self.base.name());
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }
}
