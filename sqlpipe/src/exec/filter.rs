// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! WHERE and HAVING
//!
//! A row passes only when the predicate evaluates to boolean `true`. False,
//! null, non-boolean results and evaluation failures all drop the row; none
//! of them is an error.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::task::{Task, TaskBase, TaskResult};
use crate::expr::Expr;
use crate::plan::FilterPlan;
use async_trait::async_trait;
use std::sync::Arc;

pub struct FilterTask {
    base: TaskBase,
    predicate: Expr,
}

impl FilterTask {
    pub fn new_where(ctx: Arc<ExecutionContext>, plan: &FilterPlan) -> Self {
        Self::new("where", ctx, plan)
    }

    pub fn new_having(ctx: Arc<ExecutionContext>, plan: &FilterPlan) -> Self {
        Self::new("having", ctx, plan)
    }

    fn new(kind: &str, ctx: Arc<ExecutionContext>, plan: &FilterPlan) -> Self {
        Self {
            base: TaskBase::new(format!("{}({})", kind, plan.predicate), ctx)
                .with_input_columns(&plan.input_columns),
            predicate: plan.predicate.clone(),
        }
    }
}

#[async_trait]
impl Task for FilterTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, true)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();
        let (mut passed, mut dropped) = (0usize, 0usize);

        while let Some(message) = self.base.recv().await {
            let Some(view) = message.view(self.base.input_index().map(|i| i.as_ref())) else {
                return Err(self.base.fail(ExecutionError::UnexpectedMessage {
                    task: self.base.name().to_string(),
                    detail: "positional row without declared input columns".to_string(),
                }));
            };
            if ctx.evaluator.eval_bool(&view, &self.predicate) != Some(true) {
                self.base.log_dropped(&message, "predicate not true");
                dropped += 1;
                continue;
            }
            passed += 1;
            if !self.base.emit(message).await {
                break;
            }
        }

        log::debug!(
            "{} passed {} rows, dropped {}",
            self.base.name(),
            passed,
            dropped
        );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::message::Message;
    use crate::exec::task::test_support::{context, rows, run_with_input};
    use crate::types::Value;

    fn plan(predicate: Expr) -> FilterPlan {
        FilterPlan {
            predicate,
            input_columns: vec![],
        }
    }

    #[tokio::test]
    async fn test_keeps_subset_in_order() {
        let input = rows(
            &["n"],
            (0..50).map(|i| vec![Value::Int(i)]).collect(),
        );
        let mut task = FilterTask::new_where(
            context(),
            &plan(Expr::binary(
                Expr::col("n"),
                crate::expr::BinaryOp::Mod,
                Expr::lit(3),
            )
            .equals(Expr::lit(0))),
        );

        let (result, out) = run_with_input(&mut task, input.clone()).await;
        result.unwrap();
        let expected: Vec<Message> = input
            .into_iter()
            .filter(|m| (m.id() - 1) % 3 == 0)
            .collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_null_and_non_boolean_drop_silently() {
        let input = rows(
            &["flag"],
            vec![
                vec![Value::Bool(true)],
                vec![Value::Null],
                vec![Value::from("yes")],
                vec![Value::Bool(false)],
            ],
        );
        let mut task = FilterTask::new_having(context(), &plan(Expr::col("flag")));
        let (result, out) = run_with_input(&mut task, input).await;
        result.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), 1);
    }

    #[tokio::test]
    async fn test_positional_rows_use_declared_columns() {
        let input = vec![
            Message::values(1, vec![Value::Int(5)]),
            Message::values(2, vec![Value::Int(50)]),
        ];
        let mut task = FilterTask::new_where(
            context(),
            &FilterPlan {
                predicate: Expr::col("price").gt(Expr::lit(10)),
                input_columns: vec!["price".to_string()],
            },
        );
        let (result, out) = run_with_input(&mut task, input).await;
        result.unwrap();
        assert_eq!(out, vec![Message::values(2, vec![Value::Int(50)])]);
    }

    #[tokio::test]
    async fn test_positional_rows_without_columns_are_fatal() {
        let ctx = context();
        let mut task =
            FilterTask::new_where(ctx.clone(), &plan(Expr::col("price").gt(Expr::lit(10))));
        let (result, out) =
            run_with_input(&mut task, vec![Message::values(1, vec![Value::Int(5)])]).await;
        assert!(matches!(
            result,
            Err(ExecutionError::UnexpectedMessage { .. })
        ));
        assert!(out.is_empty());
        assert!(ctx.is_cancelled());
    }
}
