// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Messages flowing between tasks
//!
//! A message is one row. It is either positional (values plus an id) or
//! column-indexed (values plus a shared name-to-position index). Operators
//! that need named field access wrap positional messages with the column
//! list declared on their plan node.

use crate::exec::error::ExecutionError;
use crate::expr::RowContext;
use crate::types::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column name to position map shared by every row of one shape
pub type ColumnIndex = HashMap<String, usize>;

/// Build a shared column index from an ordered list of names
pub fn column_index<S: AsRef<str>>(names: &[S]) -> Arc<ColumnIndex> {
    Arc::new(
        names
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.as_ref().to_string(), pos))
            .collect(),
    )
}

/// Column names of an index ordered by position
pub fn ordered_columns(index: &ColumnIndex) -> Vec<String> {
    let mut columns: Vec<(&String, &usize)> = index.iter().collect();
    columns.sort_by_key(|(_, pos)| **pos);
    columns.into_iter().map(|(name, _)| name.clone()).collect()
}

/// Positional message: ordered values and an id
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesMessage {
    pub id: u64,
    pub values: Vec<Value>,
    join_key: Option<String>,
}

impl ValuesMessage {
    pub fn new(id: u64, values: Vec<Value>) -> Self {
        Self {
            id,
            values,
            join_key: None,
        }
    }
}

/// Column-indexed message
#[derive(Debug, Clone, PartialEq)]
pub struct RowMessage {
    pub id: u64,
    pub values: Vec<Value>,
    pub index: Arc<ColumnIndex>,
    join_key: Option<String>,
}

impl RowMessage {
    pub fn new(id: u64, values: Vec<Value>, index: Arc<ColumnIndex>) -> Self {
        Self {
            id,
            values,
            index,
            join_key: None,
        }
    }

    /// Build a row from `(column, value)` pairs in order
    pub fn from_pairs<S: AsRef<str>>(id: u64, pairs: Vec<(S, Value)>) -> Self {
        let names: Vec<&str> = pairs.iter().map(|(name, _)| name.as_ref()).collect();
        let index = column_index(&names);
        let values = pairs.into_iter().map(|(_, value)| value).collect();
        Self::new(id, values, index)
    }

    pub fn columns(&self) -> Vec<String> {
        ordered_columns(&self.index)
    }

    /// Carry the join key of the row this one was derived from
    pub fn with_join_key(mut self, key: Option<String>) -> Self {
        self.join_key = key;
        self
    }
}

impl RowContext for RowMessage {
    fn get(&self, name: &str) -> Option<&Value> {
        lookup(&self.values, &self.index, name)
    }
}

/// Borrowed named view over a message's values
pub struct RowView<'a> {
    values: &'a [Value],
    index: &'a ColumnIndex,
}

impl<'a> RowView<'a> {
    pub fn new(values: &'a [Value], index: &'a ColumnIndex) -> Self {
        Self { values, index }
    }

    pub fn index(&self) -> &'a ColumnIndex {
        self.index
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl RowContext for RowView<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        lookup(self.values, self.index, name)
    }
}

/// Exact name first, then the unqualified part of `table.column`
fn lookup<'a>(values: &'a [Value], index: &ColumnIndex, name: &str) -> Option<&'a Value> {
    if let Some(pos) = index.get(name) {
        return values.get(*pos);
    }
    let (_, bare) = name.rsplit_once('.')?;
    index.get(bare).and_then(|pos| values.get(*pos))
}

/// One row flowing through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Values(ValuesMessage),
    Row(RowMessage),
}

impl Message {
    pub fn values(id: u64, values: Vec<Value>) -> Self {
        Message::Values(ValuesMessage::new(id, values))
    }

    pub fn row(id: u64, values: Vec<Value>, index: Arc<ColumnIndex>) -> Self {
        Message::Row(RowMessage::new(id, values, index))
    }

    pub fn id(&self) -> u64 {
        match self {
            Message::Values(m) => m.id,
            Message::Row(m) => m.id,
        }
    }

    pub fn value_slice(&self) -> &[Value] {
        match self {
            Message::Values(m) => &m.values,
            Message::Row(m) => &m.values,
        }
    }

    pub fn join_key(&self) -> Option<&str> {
        match self {
            Message::Values(m) => m.join_key.as_deref(),
            Message::Row(m) => m.join_key.as_deref(),
        }
    }

    /// Attach the join key; a message carries at most one
    pub fn set_join_key(&mut self, key: String) -> Result<(), ExecutionError> {
        let (id, slot) = match self {
            Message::Values(m) => (m.id, &mut m.join_key),
            Message::Row(m) => (m.id, &mut m.join_key),
        };
        if slot.is_some() {
            return Err(ExecutionError::JoinKeyAlreadySet { id });
        }
        *slot = Some(key);
        Ok(())
    }

    /// Named view of this message. Positional messages need `fallback`, the
    /// column list declared by the consuming operator.
    pub fn view<'a>(&'a self, fallback: Option<&'a ColumnIndex>) -> Option<RowView<'a>> {
        match self {
            Message::Row(m) => Some(RowView {
                values: &m.values,
                index: &m.index,
            }),
            Message::Values(m) => fallback.map(|index| RowView {
                values: &m.values,
                index,
            }),
        }
    }

    /// Convert into a column-indexed row, wrapping positional values with `fallback`
    pub fn into_row(self, fallback: Option<&Arc<ColumnIndex>>) -> Option<RowMessage> {
        match self {
            Message::Row(m) => Some(m),
            Message::Values(m) => fallback.map(|index| RowMessage {
                id: m.id,
                values: m.values,
                index: index.clone(),
                join_key: m.join_key,
            }),
        }
    }
}

impl From<RowMessage> for Message {
    fn from(row: RowMessage) -> Self {
        Message::Row(row)
    }
}

impl From<ValuesMessage> for Message {
    fn from(values: ValuesMessage) -> Self {
        Message::Values(values)
    }
}
