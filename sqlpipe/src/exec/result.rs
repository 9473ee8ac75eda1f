// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement results collected from the root output stream

use super::message::{ordered_columns, Message};
use super::mutation::{AFFECTED_COLUMN, STATUS_CANCELLED, STATUS_COLUMN, STATUS_OK};
use crate::expr::RowContext;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a mutation statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSummary {
    /// `ok`, `cancelled` or `error: <message>`
    pub status: String,
    pub affected: u64,
}

impl MutationSummary {
    /// Read a summary row emitted by a mutation task
    pub fn from_message(message: &Message) -> Option<Self> {
        let view = message.view(None)?;
        let status = view.get(STATUS_COLUMN)?.as_string()?.to_string();
        let affected = view.get(AFFECTED_COLUMN)?.as_int()?;
        Some(Self {
            status,
            affected: u64::try_from(affected).ok()?,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == STATUS_CANCELLED
    }

    /// Backend error message, if the mutation failed
    pub fn error(&self) -> Option<&str> {
        self.status.strip_prefix("error: ")
    }
}

/// Query execution result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Column names of the first row, in output order
    pub columns: Vec<String>,
    pub execution_time_ms: u64,
    pub rows_affected: usize,
    /// Set for mutation statements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation: Option<MutationSummary>,
}

impl QueryResult {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let columns = messages
            .iter()
            .find_map(|message| match message {
                Message::Row(row) => Some(ordered_columns(&row.index)),
                Message::Values(_) => None,
            })
            .unwrap_or_default();
        let rows: Vec<Row> = messages.iter().map(Row::from_message).collect();
        Self {
            rows_affected: rows.len(),
            rows,
            columns,
            ..Self::default()
        }
    }

    pub fn for_mutation(summary: MutationSummary) -> Self {
        Self {
            rows_affected: summary.affected as usize,
            mutation: Some(summary),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get values from all rows at a specific position
    pub fn get_values_at_position(&self, position: usize) -> Vec<&Value> {
        self.rows
            .iter()
            .filter_map(|row| row.get_value_at_position(position))
            .collect()
    }

    /// Values of one named column across all rows
    pub fn column_values(&self, name: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .filter_map(|row| row.get_value(name))
            .collect()
    }
}

/// Single result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Message id the row was produced from
    pub id: u64,
    /// Named values
    pub values: HashMap<String, Value>,
    /// Values in output column order
    pub positional_values: Vec<Value>,
}

impl Row {
    pub fn from_message(message: &Message) -> Self {
        match message {
            Message::Row(row) => {
                let names = ordered_columns(&row.index);
                let mut result = Self::from_positional(row.values.clone(), &names);
                result.id = row.id;
                result
            }
            Message::Values(values) => Self {
                id: values.id,
                values: HashMap::new(),
                positional_values: values.values.clone(),
            },
        }
    }

    /// Create a row from positional values with column names
    pub fn from_positional(values: Vec<Value>, columns: &[String]) -> Self {
        let named = columns
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            id: 0,
            values: named,
            positional_values: values,
        }
    }

    /// Get a value by column name
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get a value by position
    pub fn get_value_at_position(&self, position: usize) -> Option<&Value> {
        self.positional_values.get(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::message::column_index;
    use crate::exec::mutation::summary_message;

    #[test]
    fn test_rows_from_messages() {
        let index = column_index(&["a", "b"]);
        let result = QueryResult::from_messages(vec![
            Message::row(4, vec![Value::Int(1), "x".into()], index.clone()),
            Message::row(5, vec![Value::Int(2), "y".into()], index),
        ]);
        assert_eq!(result.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[1].id, 5);
        assert_eq!(result.rows[1].get_value("b"), Some(&Value::from("y")));
        assert_eq!(
            result.get_values_at_position(0),
            vec![&Value::Int(1), &Value::Int(2)]
        );
    }

    #[test]
    fn test_summary_parsing() {
        let ok = MutationSummary::from_message(&summary_message("ok", 3)).unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.affected, 3);

        let failed =
            MutationSummary::from_message(&summary_message("error: disk on fire", 1)).unwrap();
        assert_eq!(failed.error(), Some("disk on fire"));
        assert!(MutationSummary::from_message(&Message::values(1, vec![])).is_none());
    }
}
