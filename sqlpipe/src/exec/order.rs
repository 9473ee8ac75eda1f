// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! ORDER BY
//!
//! Sort keys are compared as strings (null sorts as the empty string), so
//! numeric columns order lexically: "10" comes before "9".

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::Message;
use super::task::{Task, TaskBase, TaskResult};
use crate::plan::{OrderPlan, SortKey};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

pub struct OrderTask {
    base: TaskBase,
    keys: Vec<SortKey>,
}

impl OrderTask {
    pub fn new(ctx: Arc<ExecutionContext>, plan: &OrderPlan) -> Self {
        Self {
            base: TaskBase::new("order", ctx).with_input_columns(&plan.input_columns),
            keys: plan.keys.clone(),
        }
    }

    fn compare(&self, a: &[String], b: &[String]) -> Ordering {
        for ((key, left), right) in self.keys.iter().zip(a).zip(b) {
            let ordering = left.cmp(right);
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[async_trait]
impl Task for OrderTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, true)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();
        let mut buffered: Vec<(Vec<String>, Message)> = Vec::new();

        while let Some(message) = self.base.recv().await {
            let sort_values = {
                let Some(view) = message.view(self.base.input_index().map(|i| i.as_ref())) else {
                    return Err(self.base.fail(ExecutionError::UnexpectedMessage {
                        task: self.base.name().to_string(),
                        detail: "positional row without declared input columns".to_string(),
                    }));
                };
                self.keys
                    .iter()
                    .map(|key| {
                        ctx.evaluator
                            .eval(&view, &key.expr)
                            .map(|v| v.to_key_string())
                            .unwrap_or_default()
                    })
                    .collect::<Vec<String>>()
            };
            buffered.push((sort_values, message));
            self.base.check_buffered(buffered.len())?;
        }

        if self.base.signal().is_closed() {
            self.base.finish();
            return Ok(());
        }

        // stable: equal keys keep arrival order
        buffered.sort_by(|(a, _), (b, _)| self.compare(a, b));
        log::debug!("{} sorted {} rows", self.base.name(), buffered.len());

        for (_, message) in buffered {
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
