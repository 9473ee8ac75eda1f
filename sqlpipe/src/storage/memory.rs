// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage backend
//!
//! Tables keep rows in insertion order, keyed by primary key when the table
//! has one and by an auto-assigned id otherwise. Writes with an existing key
//! overwrite the stored row, so inserts and upserts both replace by key.

use super::registry::SourceRegistry;
use super::traits::{Connection, DataSource, Deletion, PatchWhere, RowIterator, Scanner, Upsert};
use super::types::{RowValues, StorageError, StorageResult, WriteContext};
use crate::exec::message::{column_index, ColumnIndex, Message, RowMessage, RowView};
use crate::expr::Expr;
use crate::plan::DeletePlan;
use crate::types::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Which capabilities connections to a table advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCapabilities {
    pub scan: bool,
    pub upsert: bool,
    pub patch_where: bool,
    pub delete: bool,
}

impl Default for TableCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl TableCapabilities {
    pub fn all() -> Self {
        Self {
            scan: true,
            upsert: true,
            patch_where: true,
            delete: true,
        }
    }

    pub fn read_only() -> Self {
        Self {
            scan: true,
            upsert: false,
            patch_where: false,
            delete: false,
        }
    }

    /// Everything except `PatchWhere`, forcing keyed updates
    pub fn without_patch() -> Self {
        Self {
            patch_where: false,
            ..Self::all()
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    key: String,
    values: Vec<Value>,
}

#[derive(Debug, Default)]
struct TableData {
    rows: BTreeMap<u64, StoredRow>,
    keys: HashMap<String, u64>,
}

/// One in-memory table
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    columns: Vec<String>,
    index: Arc<ColumnIndex>,
    primary_key: Option<String>,
    capabilities: TableCapabilities,
    data: RwLock<TableData>,
    next_id: AtomicU64,
    open_connections: AtomicUsize,
}

impl MemoryTable {
    fn new(
        name: &str,
        columns: &[&str],
        primary_key: Option<&str>,
        capabilities: TableCapabilities,
    ) -> StorageResult<Self> {
        if let Some(pk) = primary_key {
            if !columns.contains(&pk) {
                return Err(StorageError::ColumnNotFound {
                    table: name.to_string(),
                    column: pk.to_string(),
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            index: column_index(columns),
            primary_key: primary_key.map(str::to_string),
            capabilities,
            data: RwLock::new(TableData::default()),
            next_id: AtomicU64::new(1),
            open_connections: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.data.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of connections opened and not yet closed
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Snapshot of every row in storage order
    pub fn rows(&self) -> Vec<RowMessage> {
        self.data
            .read()
            .rows
            .iter()
            .map(|(id, row)| RowMessage::new(*id, row.values.clone(), self.index.clone()))
            .collect()
    }

    /// Stored values for `key`
    pub fn get(&self, key: &str) -> Option<Vec<Value>> {
        let data = self.data.read();
        let id = data.keys.get(key)?;
        data.rows.get(id).map(|row| row.values.clone())
    }

    /// Seed a row directly, bypassing any connection
    pub fn insert_row(&self, values: Vec<Value>) -> StorageResult<String> {
        self.write_positional(None, values)
    }

    fn column_position(&self, column: &str) -> StorageResult<usize> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| StorageError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn derive_key(&self, values: &[Value], id: u64) -> String {
        self.primary_key
            .as_deref()
            .and_then(|pk| self.index.get(pk))
            .and_then(|pos| values.get(*pos))
            .filter(|value| !value.is_null())
            .map(Value::to_key_string)
            .unwrap_or_else(|| id.to_string())
    }

    fn write_positional(&self, key: Option<&str>, values: Vec<Value>) -> StorageResult<String> {
        if values.len() != self.columns.len() {
            return Err(StorageError::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }

        let mut data = self.data.write();
        let fresh_id = self.next_id.load(Ordering::SeqCst);
        let key = match key {
            Some(key) => key.to_string(),
            None => self.derive_key(&values, fresh_id),
        };

        match data.keys.get(&key).copied() {
            Some(id) => {
                if let Some(row) = data.rows.get_mut(&id) {
                    row.values = values;
                }
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                data.keys.insert(key.clone(), id);
                data.rows.insert(
                    id,
                    StoredRow {
                        key: key.clone(),
                        values,
                    },
                );
            }
        }
        Ok(key)
    }

    fn write_named(
        &self,
        key: Option<&str>,
        values: BTreeMap<String, Value>,
    ) -> StorageResult<String> {
        let mut updates = Vec::with_capacity(values.len());
        for (column, value) in values {
            updates.push((self.column_position(&column)?, value));
        }

        match key {
            Some(key) => {
                let mut data = self.data.write();
                let id = data
                    .keys
                    .get(key)
                    .copied()
                    .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;
                if let Some(row) = data.rows.get_mut(&id) {
                    for (pos, value) in updates {
                        row.values[pos] = value;
                    }
                }
                Ok(key.to_string())
            }
            None => {
                let mut row = vec![Value::Null; self.columns.len()];
                for (pos, value) in updates {
                    row[pos] = value;
                }
                self.write_positional(None, row)
            }
        }
    }

    fn patch(
        &self,
        ctx: &WriteContext,
        where_expr: &Expr,
        values: &BTreeMap<String, Value>,
    ) -> StorageResult<u64> {
        let mut updates = Vec::with_capacity(values.len());
        for (column, value) in values {
            if self.primary_key.as_deref() == Some(column.as_str()) {
                return Err(StorageError::InvalidOperation(format!(
                    "cannot patch primary key column '{}'",
                    column
                )));
            }
            updates.push((self.column_position(column)?, value));
        }

        let mut data = self.data.write();
        let mut patched = 0;
        for row in data.rows.values_mut() {
            let view = RowView::new(&row.values, &self.index);
            if ctx.evaluator.eval_bool(&view, where_expr) != Some(true) {
                continue;
            }
            for (pos, value) in &updates {
                row.values[*pos] = (*value).clone();
            }
            patched += 1;
        }
        log::debug!(
            "statement {} patched {} rows in '{}'",
            ctx.statement_id,
            patched,
            self.name
        );
        Ok(patched)
    }

    fn delete_matching(&self, ctx: &WriteContext, where_expr: &Expr) -> StorageResult<u64> {
        let mut data = self.data.write();
        let doomed: Vec<(u64, String)> = data
            .rows
            .iter()
            .filter(|(_, row)| {
                let view = RowView::new(&row.values, &self.index);
                ctx.evaluator.eval_bool(&view, where_expr) == Some(true)
            })
            .map(|(id, row)| (*id, row.key.clone()))
            .collect();

        for (id, key) in &doomed {
            data.rows.remove(id);
            data.keys.remove(key);
        }
        log::debug!(
            "statement {} deleted {} rows from '{}'",
            ctx.statement_id,
            doomed.len(),
            self.name
        );
        Ok(doomed.len() as u64)
    }
}

/// A set of in-memory tables
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, Arc<MemoryTable>>>,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a table with every capability
    pub fn create_table(
        &self,
        name: &str,
        columns: &[&str],
        primary_key: Option<&str>,
    ) -> StorageResult<Arc<MemoryTable>> {
        self.create_table_with(name, columns, primary_key, TableCapabilities::all())
    }

    pub fn create_table_with(
        &self,
        name: &str,
        columns: &[&str],
        primary_key: Option<&str>,
        capabilities: TableCapabilities,
    ) -> StorageResult<Arc<MemoryTable>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StorageError::TableAlreadyExists(name.to_string()));
        }
        let table = Arc::new(MemoryTable::new(name, columns, primary_key, capabilities)?);
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Option<Arc<MemoryTable>> {
        self.tables.read().get(name).cloned()
    }

    /// Route every table of this database through `registry`
    pub fn register_all(self: &Arc<Self>, registry: &mut SourceRegistry) {
        let names: Vec<String> = self.tables.read().keys().cloned().collect();
        for name in names {
            registry.register(name, self.clone());
        }
    }
}

impl DataSource for MemoryDatabase {
    fn open(&self, table: &str) -> StorageResult<Box<dyn Connection>> {
        let table = self
            .table(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        table.open_connections.fetch_add(1, Ordering::SeqCst);
        log::trace!("opened connection to '{}'", table.name);
        Ok(Box::new(MemoryConnection {
            table,
            closed: false,
        }))
    }
}

/// Connection to a [`MemoryTable`]
pub struct MemoryConnection {
    table: Arc<MemoryTable>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::ConnectionClosed(self.table.name.clone()));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn table(&self) -> &str {
        &self.table.name
    }

    fn columns(&self) -> Vec<String> {
        self.table.columns.clone()
    }

    fn primary_key(&self) -> Option<String> {
        self.table.primary_key.clone()
    }

    fn scanner(&self) -> Option<&dyn Scanner> {
        self.table.capabilities.scan.then_some(self as &dyn Scanner)
    }

    fn upsert(&self) -> Option<&dyn Upsert> {
        self.table.capabilities.upsert.then_some(self as &dyn Upsert)
    }

    fn patch_where(&self) -> Option<&dyn PatchWhere> {
        self.table
            .capabilities
            .patch_where
            .then_some(self as &dyn PatchWhere)
    }

    fn deletion(&self) -> Option<&dyn Deletion> {
        self.table.capabilities.delete.then_some(self as &dyn Deletion)
    }

    fn close(&mut self) -> StorageResult<()> {
        if !self.closed {
            self.closed = true;
            self.table.open_connections.fetch_sub(1, Ordering::SeqCst);
            log::trace!("closed connection to '{}'", self.table.name);
        }
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Scanner for MemoryConnection {
    fn create_iterator(&self) -> StorageResult<Box<dyn RowIterator>> {
        self.ensure_open()?;
        let rows: Vec<Message> = self.table.rows().into_iter().map(Message::Row).collect();
        Ok(Box::new(MemoryRowIterator {
            rows: rows.into_iter(),
        }))
    }
}

impl Upsert for MemoryConnection {
    fn put(
        &self,
        _ctx: &WriteContext,
        key: Option<&str>,
        values: RowValues,
    ) -> StorageResult<String> {
        self.ensure_open()?;
        match values {
            RowValues::Positional(values) => self.table.write_positional(key, values),
            RowValues::Named(values) => self.table.write_named(key, values),
        }
    }
}

impl PatchWhere for MemoryConnection {
    fn patch_where(
        &self,
        ctx: &WriteContext,
        where_expr: &Expr,
        values: &BTreeMap<String, Value>,
    ) -> StorageResult<u64> {
        self.ensure_open()?;
        self.table.patch(ctx, where_expr, values)
    }
}

impl Deletion for MemoryConnection {
    fn delete_expression(
        &self,
        ctx: &WriteContext,
        _plan: &DeletePlan,
        where_expr: &Expr,
    ) -> StorageResult<u64> {
        self.ensure_open()?;
        self.table.delete_matching(ctx, where_expr)
    }
}

/// Snapshot iterator over a table scan
pub struct MemoryRowIterator {
    rows: std::vec::IntoIter<Message>,
}

impl RowIterator for MemoryRowIterator {
    fn next(&mut self) -> Option<Message> {
        self.rows.next()
    }
}
