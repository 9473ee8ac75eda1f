// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Inner equi-join
//!
//! Each side of a join ends with a [`JoinKeyTask`] that stamps the join key
//! on every row. [`JoinMergeTask`] drains both sides concurrently, buckets
//! rows by key and emits the left x right cross product for every key seen
//! on both sides.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::{column_index, ColumnIndex, Message};
use super::task::{Task, TaskBase, TaskResult};
use crate::expr::{Expr, RowContext};
use crate::plan::{JoinColumn, JoinKeyPlan, JoinMergePlan};
use crate::types::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

const KEY_SEPARATOR: &str = "\0";

/// Attaches the join key to each row
pub struct JoinKeyTask {
    base: TaskBase,
    keys: Vec<Expr>,
}

impl JoinKeyTask {
    pub fn new(ctx: Arc<ExecutionContext>, plan: &JoinKeyPlan) -> Self {
        Self {
            base: TaskBase::new("join_key", ctx).with_input_columns(&plan.input_columns),
            keys: plan.keys.clone(),
        }
    }
}

#[async_trait]
impl Task for JoinKeyTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        if self.keys.is_empty() {
            return Err(ExecutionError::InvalidPlan(
                "join key needs at least one expression".to_string(),
            ));
        }
        self.base.setup(depth, true)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();

        while let Some(message) = self.base.recv().await {
            // merged rows are looked up by name, so positional input is wrapped here
            let Some(row) = message.into_row(self.base.input_index()) else {
                return Err(self.base.fail(ExecutionError::UnexpectedMessage {
                    task: self.base.name().to_string(),
                    detail: "positional row without declared input columns".to_string(),
                }));
            };
            let parts = self
                .keys
                .iter()
                .map(|expr| {
                    ctx.evaluator
                        .eval(&row, expr)
                        .filter(|value| !value.is_null())
                        .map(|value| value.to_key_string())
                })
                .collect::<Option<Vec<String>>>();
            let mut message = Message::Row(row);
            let Some(parts) = parts else {
                self.base.log_dropped(&message, "join key not evaluable");
                continue;
            };

            if let Err(e) = message.set_join_key(parts.join(KEY_SEPARATOR)) {
                return Err(self.base.fail(e));
            }
            if !self.base.emit(message).await {
                break;
            }
        }

        self.base.finish();
        Ok(())
    }

    fn close(&mut self) -> TaskResult {
        self.base.close();
        Ok(())
    }

    fn set_input(&mut self, input: MessageReceiver) {
        self.base.set_input(input);
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }
}

/// Rows of one join side bucketed by key, keys in first-seen order
#[derive(Default)]
struct SideBuffer {
    rows: HashMap<String, Vec<Message>>,
    keys: Vec<String>,
    len: usize,
}

impl SideBuffer {
    fn push(&mut self, key: String, message: Message) {
        self.len += 1;
        match self.rows.get_mut(&key) {
            Some(bucket) => bucket.push(message),
            None => {
                self.keys.push(key.clone());
                self.rows.insert(key, vec![message]);
            }
        }
    }
}

/// Drain one side until end of stream or cancellation
async fn collect_side(
    ctx: &ExecutionContext,
    task: &str,
    input: &mut MessageReceiver,
) -> Result<SideBuffer, ExecutionError> {
    let mut buffer = SideBuffer::default();
    let signal = ctx.signal();
    loop {
        let message = tokio::select! {
            biased;
            _ = signal.closed() => break,
            message = input.recv() => message,
        };
        let Some(message) = message else {
            break;
        };
        if !matches!(message, Message::Row(_)) {
            return Err(ExecutionError::UnexpectedMessage {
                task: task.to_string(),
                detail: "join input must be column-indexed".to_string(),
            });
        }
        let Some(key) = message
            .join_key()
            .filter(|key| !key.is_empty())
            .map(str::to_string)
        else {
            return Err(ExecutionError::MissingJoinKey {
                task: task.to_string(),
            });
        };
        buffer.push(key, message);
        if let Some(limit) = ctx.config.max_buffered_rows {
            if buffer.len > limit {
                return Err(ExecutionError::MaterializationLimit {
                    task: task.to_string(),
                    limit,
                });
            }
        }
    }
    Ok(buffer)
}

/// Merges two keyed inputs into joined rows
pub struct JoinMergeTask {
    base: TaskBase,
    left: Option<MessageReceiver>,
    right: Option<MessageReceiver>,
    left_columns: Vec<JoinColumn>,
    right_columns: Vec<JoinColumn>,
    output_index: Arc<ColumnIndex>,
    width: usize,
}

impl JoinMergeTask {
    pub fn new(ctx: Arc<ExecutionContext>, plan: &JoinMergePlan) -> TaskResult<Self> {
        let width = plan.output_columns.len();
        if let Some(column) = plan
            .left_columns
            .iter()
            .chain(&plan.right_columns)
            .find(|column| column.position >= width)
        {
            return Err(ExecutionError::InvalidPlan(format!(
                "join column '{}' maps to position {} but only {} output columns exist",
                column.source, column.position, width
            )));
        }
        Ok(Self {
            base: TaskBase::new("join_merge", ctx),
            left: None,
            right: None,
            left_columns: plan.left_columns.clone(),
            right_columns: plan.right_columns.clone(),
            output_index: column_index(&plan.output_columns),
            width,
        })
    }

    fn copy_columns(columns: &[JoinColumn], message: &Message, values: &mut [Value]) {
        let Some(view) = message.view(None) else {
            return;
        };
        for column in columns {
            if let Some(value) = view.get(&column.source) {
                values[column.position] = value.clone();
            }
        }
    }
}

#[async_trait]
impl Task for JoinMergeTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        if self.left.is_none() || self.right.is_none() {
            return Err(ExecutionError::InvalidPlan(
                "join merge needs both a left and a right input".to_string(),
            ));
        }
        self.base.setup(depth, false)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();
        let name = self.base.name().to_string();
        let (Some(left), Some(right)) = (self.left.as_mut(), self.right.as_mut()) else {
            return Err(self.base.fail(ExecutionError::InvalidPlan(
                "join merge started without inputs".to_string(),
            )));
        };

        let sides = tokio::try_join!(
            collect_side(&ctx, &name, left),
            collect_side(&ctx, &name, right)
        );
        let (left, right) = match sides {
            Ok(sides) => sides,
            Err(e) => return Err(self.base.fail(e)),
        };
        if ctx.is_cancelled() {
            self.base.finish();
            return Ok(());
        }

        let mut next_id = 1u64;
        let mut matched_keys = 0usize;
        'keys: for key in &left.keys {
            let Some(right_rows) = right.rows.get(key) else {
                continue;
            };
            matched_keys += 1;
            for left_row in left.rows.get(key).into_iter().flatten() {
                for right_row in right_rows {
                    let mut values = vec![Value::Null; self.width];
                    Self::copy_columns(&self.left_columns, left_row, &mut values);
                    Self::copy_columns(&self.right_columns, right_row, &mut values);
                    let joined = Message::row(next_id, values, self.output_index.clone());
                    next_id += 1;
                    if !self.base.emit(joined).await {
                        break 'keys;
                    }
                }
            }
        }

        log::debug!(
            "{} joined {} left and {} right rows over {} shared keys into {} rows",
            name,
            left.len,
            right.len,
            matched_keys,
            next_id - 1
        );
        self.base.finish();
        Ok(())
    }

    fn close(&mut self) -> TaskResult {
        if self.base.close() {
            self.left = None;
            self.right = None;
        }
        Ok(())
    }

    fn set_input(&mut self, input: MessageReceiver) {
        if self.left.is_none() {
            self.left = Some(input);
        } else {
            self.right = Some(input);
        }
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }

    /// Expects exactly `[left, right]`
    fn set_inputs(&mut self, inputs: Vec<MessageReceiver>) {
        let mut inputs = inputs.into_iter();
        self.left = inputs.next();
        self.right = inputs.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::channel::message_channel;
    use crate::exec::message::RowMessage;
    use crate::exec::task::test_support::{context, rows, run_with_input, value_of};

    fn keyed(id: u64, pairs: Vec<(&str, Value)>, key: &str) -> Message {
        let mut message = Message::Row(RowMessage::from_pairs(id, pairs));
        message.set_join_key(key.to_string()).unwrap();
        message
    }

    fn merge_plan() -> JoinMergePlan {
        let leaf = crate::plan::PlanNode::Select(crate::plan::SelectPlan::sequential(vec![]));
        JoinMergePlan {
            left: Box::new(leaf.clone()),
            right: Box::new(leaf),
            left_columns: vec![JoinColumn::new("name", 0)],
            right_columns: vec![JoinColumn::new("o.total", 1)],
            output_columns: vec!["name".to_string(), "total".to_string()],
        }
    }

    async fn run_merge(
        task: &mut JoinMergeTask,
        left: Vec<Message>,
        right: Vec<Message>,
    ) -> (TaskResult, Vec<Message>) {
        let (left_tx, left_rx) = message_channel(left.len().max(1));
        let (right_tx, right_rx) = message_channel(right.len().max(1));
        for m in left {
            left_tx.send(m).await.unwrap();
        }
        for m in right {
            right_tx.send(m).await.unwrap();
        }
        drop(left_tx);
        drop(right_tx);

        task.set_inputs(vec![left_rx, right_rx]);
        let mut output = task.take_output().unwrap();
        task.setup(0).unwrap();
        let (result, out) = tokio::join!(task.run(), async move {
            let mut out = Vec::new();
            while let Some(m) = output.recv().await {
                out.push(m);
            }
            out
        });
        task.close().unwrap();
        (result, out)
    }

    #[tokio::test]
    async fn test_join_key_attaches_and_drops_unevaluable() {
        let input = rows(
            &["a", "b"],
            vec![
                vec![Value::Int(1), "x".into()],
                vec![Value::Null, "y".into()],
                vec![Value::Int(3), "z".into()],
            ],
        );
        let mut task = JoinKeyTask::new(
            context(),
            &JoinKeyPlan {
                keys: vec![Expr::col("a"), Expr::col("b")],
                input_columns: vec![],
            },
        );
        let (result, out) = run_with_input(&mut task, input).await;
        result.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].join_key(), Some("1\0x"));
        assert_eq!(out[1].join_key(), Some("3\0z"));
    }

    #[tokio::test]
    async fn test_join_key_twice_is_fatal() {
        let ctx = context();
        let mut task = JoinKeyTask::new(
            ctx.clone(),
            &JoinKeyPlan {
                keys: vec![Expr::col("a")],
                input_columns: vec![],
            },
        );
        let input = vec![keyed(1, vec![("a", Value::Int(1))], "1")];
        let (result, _) = run_with_input(&mut task, input).await;
        assert_eq!(result, Err(ExecutionError::JoinKeyAlreadySet { id: 1 }));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cross_product_per_shared_key() {
        let left = vec![
            keyed(1, vec![("name", "ann".into())], "u1"),
            keyed(2, vec![("name", "bob".into())], "u2"),
            keyed(3, vec![("name", "ann2".into())], "u1"),
        ];
        let right = vec![
            keyed(10, vec![("total", Value::Int(5))], "u1"),
            keyed(11, vec![("total", Value::Int(6))], "u1"),
            keyed(12, vec![("total", Value::Int(7))], "u3"),
        ];
        let mut task = JoinMergeTask::new(context(), &merge_plan()).unwrap();
        let (result, out) = run_merge(&mut task, left, right).await;
        result.unwrap();

        // 2 left rows x 2 right rows for u1; u2 and u3 have no partner
        assert_eq!(out.len(), 4);
        let mut pairs: Vec<(String, i64)> = out
            .iter()
            .map(|m| {
                (
                    value_of(m, "name").unwrap().to_key_string(),
                    value_of(m, "total").unwrap().as_int().unwrap(),
                )
            })
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("ann".to_string(), 5),
                ("ann".to_string(), 6),
                ("ann2".to_string(), 5),
                ("ann2".to_string(), 6),
            ]
        );
        assert!(out.iter().all(|m| m.join_key().is_none()));
    }

    #[tokio::test]
    async fn test_missing_join_key_is_fatal() {
        let ctx = context();
        let left = vec![Message::Row(RowMessage::from_pairs(1, vec![("name", Value::from("a"))]))];
        let mut task = JoinMergeTask::new(ctx.clone(), &merge_plan()).unwrap();
        let (result, out) = run_merge(&mut task, left, vec![]).await;
        assert!(matches!(result, Err(ExecutionError::MissingJoinKey { .. })));
        assert!(out.is_empty());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_join_key_is_fatal() {
        let ctx = context();
        let left = vec![keyed(1, vec![("name", Value::from("a"))], "")];
        let right = vec![keyed(2, vec![("total", Value::Int(1))], "")];
        let mut task = JoinMergeTask::new(ctx.clone(), &merge_plan()).unwrap();
        let (result, out) = run_merge(&mut task, left, right).await;
        assert!(matches!(result, Err(ExecutionError::MissingJoinKey { .. })));
        assert!(out.is_empty());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_positional_rows_are_keyed_and_joinable() {
        let key_plan = |columns: &[&str]| JoinKeyPlan {
            keys: vec![Expr::col(columns[0])],
            input_columns: columns.iter().map(|c| c.to_string()).collect(),
        };

        let mut left_key = JoinKeyTask::new(context(), &key_plan(&["id", "name"]));
        let input = vec![Message::values(1, vec![Value::Int(7), Value::from("ann")])];
        let (result, left) = run_with_input(&mut left_key, input).await;
        result.unwrap();
        assert_eq!(left.len(), 1);
        assert!(matches!(left[0], Message::Row(_)));
        assert_eq!(left[0].join_key(), Some("7"));

        let mut right_key = JoinKeyTask::new(context(), &key_plan(&["total"]));
        let input = vec![Message::values(1, vec![Value::Int(7)])];
        let (result, right) = run_with_input(&mut right_key, input).await;
        result.unwrap();
        assert_eq!(right[0].join_key(), Some("7"));

        let mut merge = JoinMergeTask::new(context(), &merge_plan()).unwrap();
        let (result, out) = run_merge(&mut merge, left, right).await;
        result.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(value_of(&out[0], "name"), Some(&Value::from("ann")));
        assert_eq!(value_of(&out[0], "total"), Some(&Value::Int(7)));
    }

    #[tokio::test]
    async fn test_positional_rows_without_columns_are_fatal() {
        let mut task = JoinKeyTask::new(
            context(),
            &JoinKeyPlan {
                keys: vec![Expr::col("a")],
                input_columns: vec![],
            },
        );
        let (result, out) =
            run_with_input(&mut task, vec![Message::values(1, vec![Value::Int(7)])]).await;
        assert!(matches!(result, Err(ExecutionError::UnexpectedMessage { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_positions() {
        let mut plan = merge_plan();
        plan.right_columns.push(JoinColumn::new("x", 5));
        assert!(JoinMergeTask::new(context(), &plan).is_err());
    }
}
