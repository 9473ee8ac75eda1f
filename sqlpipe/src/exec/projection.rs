// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Column projection
//!
//! In-process projections sit mid-pipeline and keep the message id and join
//! key. The final projection ends a statement: it numbers rows afresh and
//! emits only the declared result columns.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::{column_index, ordered_columns, ColumnIndex, Message, RowMessage};
use super::task::{Task, TaskBase, TaskResult};
use crate::expr::{Evaluator, Expr, RowContext};
use crate::plan::{ProjectedColumn, ProjectionPlan};
use crate::types::Value;
use async_trait::async_trait;
use std::sync::Arc;

pub struct ProjectionTask {
    base: TaskBase,
    columns: Vec<ProjectedColumn>,
    final_projection: bool,
    next_id: u64,
    /// Output index of the previous row, reused while the shape is stable
    last_index: Option<(Vec<String>, Arc<ColumnIndex>)>,
}

impl ProjectionTask {
    pub fn new(ctx: Arc<ExecutionContext>, plan: &ProjectionPlan) -> Self {
        let kind = if plan.final_projection {
            "final_projection"
        } else {
            "projection"
        };
        Self {
            base: TaskBase::new(kind, ctx).with_input_columns(&plan.input_columns),
            columns: plan.columns.clone(),
            final_projection: plan.final_projection,
            next_id: 1,
            last_index: None,
        }
    }

    fn project(
        evaluator: &Evaluator,
        columns: &[ProjectedColumn],
        row: &dyn RowContext,
        input_index: &ColumnIndex,
    ) -> Vec<(String, Value)> {
        let mut projected = Vec::with_capacity(columns.len());
        for column in columns {
            if let Some(guard) = &column.guard {
                if evaluator.eval_bool(row, guard) != Some(true) {
                    continue;
                }
            }
            match &column.expr {
                Expr::Star => {
                    for name in ordered_columns(input_index) {
                        let value = row.get(&name).cloned().unwrap_or(Value::Null);
                        projected.push((name, value));
                    }
                }
                expr => {
                    let value = evaluator.eval(row, expr).unwrap_or(Value::Null);
                    projected.push((column.alias.clone(), value));
                }
            }
        }
        projected
    }

    fn index_for(&mut self, names: Vec<String>) -> Arc<ColumnIndex> {
        match &self.last_index {
            Some((last, index)) if *last == names => index.clone(),
            _ => {
                let index = column_index(&names);
                self.last_index = Some((names, index.clone()));
                index
            }
        }
    }
}

#[async_trait]
impl Task for ProjectionTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, true)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();

        while let Some(message) = self.base.recv().await {
            let projected = {
                let Some(view) = message.view(self.base.input_index().map(|i| i.as_ref())) else {
                    return Err(self.base.fail(ExecutionError::UnexpectedMessage {
                        task: self.base.name().to_string(),
                        detail: "positional row without declared input columns".to_string(),
                    }));
                };
                Self::project(&ctx.evaluator, &self.columns, &view, view.index())
            };

            let (names, values): (Vec<String>, Vec<Value>) = projected.into_iter().unzip();
            let index = self.index_for(names);
            let row = if self.final_projection {
                let id = self.next_id;
                self.next_id += 1;
                RowMessage::new(id, values, index)
            } else {
                RowMessage::new(message.id(), values, index)
                    .with_join_key(message.join_key().map(str::to_string))
            };

            if !self.base.emit(Message::Row(row)).await {
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
