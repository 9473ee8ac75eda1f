// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Hash aggregation
//!
//! Rows are bucketed by their string-coerced GROUP BY values joined with the
//! unit separator. Nothing is emitted until the input is exhausted. Bucket
//! order on output is hash-map order.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::{column_index, ColumnIndex, Message};
use super::task::{Task, TaskBase, TaskResult};
use crate::expr::{Evaluator, Expr, RowContext};
use crate::plan::GroupByPlan;
use crate::types::Value;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    /// Value of a GROUP BY expression, taken from the bucket's first row
    GroupKey,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Plain expression: the value from the bucket's last row
    Last,
}

#[derive(Debug, Clone)]
struct ColumnSpec {
    aggregate: Aggregate,
    /// Aggregate argument, or the column expression itself
    expr: Expr,
}

#[derive(Debug, Clone)]
enum State {
    Value(Value),
    Count,
    Sum {
        int_total: Option<i64>,
        float_total: f64,
        all_int: bool,
    },
    Avg {
        total: f64,
        count: i64,
    },
    Extreme(Option<Value>),
}

impl State {
    fn initial(aggregate: Aggregate) -> Self {
        match aggregate {
            Aggregate::GroupKey | Aggregate::Last => State::Value(Value::Null),
            Aggregate::Count => State::Count,
            Aggregate::Sum => State::Sum {
                int_total: Some(0),
                float_total: 0.0,
                all_int: true,
            },
            Aggregate::Avg => State::Avg {
                total: 0.0,
                count: 0,
            },
            Aggregate::Min | Aggregate::Max => State::Extreme(None),
        }
    }
}

struct Bucket {
    rows: i64,
    states: Vec<State>,
}

pub struct GroupByTask {
    base: TaskBase,
    group_by: Vec<Expr>,
    specs: Vec<ColumnSpec>,
    output_index: Arc<ColumnIndex>,
    partial: bool,
}

impl GroupByTask {
    pub fn new(ctx: Arc<ExecutionContext>, plan: &GroupByPlan) -> TaskResult<Self> {
        let mut specs = Vec::with_capacity(plan.columns.len());
        for column in &plan.columns {
            specs.push(Self::resolve(&column.expr, &plan.group_by)?);
        }
        let aliases: Vec<&str> = plan.columns.iter().map(|c| c.alias.as_str()).collect();
        let name = if plan.partial {
            "group_by(partial)"
        } else {
            "group_by"
        };
        Ok(Self {
            base: TaskBase::new(name, ctx).with_input_columns(&plan.input_columns),
            group_by: plan.group_by.clone(),
            specs,
            output_index: column_index(&aliases),
            partial: plan.partial,
        })
    }

    fn resolve(expr: &Expr, group_by: &[Expr]) -> TaskResult<ColumnSpec> {
        if group_by.contains(expr) {
            return Ok(ColumnSpec {
                aggregate: Aggregate::GroupKey,
                expr: expr.clone(),
            });
        }
        let Some(name) = expr.aggregate_name() else {
            return Ok(ColumnSpec {
                aggregate: Aggregate::Last,
                expr: expr.clone(),
            });
        };
        let aggregate = match name.as_str() {
            "count" => Aggregate::Count,
            "sum" => Aggregate::Sum,
            "avg" => Aggregate::Avg,
            "min" => Aggregate::Min,
            _ => Aggregate::Max,
        };
        let argument = match expr {
            Expr::Function { args, .. } => args.first().cloned(),
            _ => None,
        };
        match (aggregate, argument) {
            (Aggregate::Count, argument) => Ok(ColumnSpec {
                aggregate,
                expr: argument.unwrap_or(Expr::Star),
            }),
            (_, Some(argument)) => Ok(ColumnSpec {
                aggregate,
                expr: argument,
            }),
            (_, None) => Err(ExecutionError::InvalidPlan(format!(
                "{} requires an argument",
                name
            ))),
        }
    }

    fn bucket_key(&self, evaluator: &Evaluator, row: &dyn RowContext) -> String {
        let parts: Vec<String> = self
            .group_by
            .iter()
            .map(|expr| {
                evaluator
                    .eval(row, expr)
                    .map(|v| v.to_key_string())
                    .unwrap_or_default()
            })
            .collect();
        parts.join(&KEY_SEPARATOR.to_string())
    }

    fn accumulate(&self, evaluator: &Evaluator, row: &dyn RowContext, bucket: &mut Bucket) {
        let first = bucket.rows == 0;
        bucket.rows += 1;
        for (spec, state) in self.specs.iter().zip(bucket.states.iter_mut()) {
            match (spec.aggregate, state) {
                (Aggregate::Count, _) => {}
                (Aggregate::GroupKey, State::Value(value)) => {
                    if first {
                        *value = evaluator.eval(row, &spec.expr).unwrap_or(Value::Null);
                    }
                }
                (Aggregate::Last, State::Value(value)) => {
                    *value = evaluator.eval(row, &spec.expr).unwrap_or(Value::Null);
                }
                (
                    Aggregate::Sum,
                    State::Sum {
                        int_total,
                        float_total,
                        all_int,
                    },
                ) => match evaluator.eval(row, &spec.expr) {
                    Some(Value::Int(i)) => {
                        *int_total = int_total.and_then(|total| total.checked_add(i));
                        *float_total += i as f64;
                    }
                    Some(Value::Number(n)) => {
                        *all_int = false;
                        *float_total += n;
                    }
                    // unevaluable counts as zero
                    _ => {}
                },
                (Aggregate::Avg, State::Avg { total, count }) => {
                    if let Some(n) = evaluator
                        .eval(row, &spec.expr)
                        .filter(Value::is_numeric)
                        .and_then(|v| v.as_number())
                    {
                        *total += n;
                        *count += 1;
                    }
                }
                (aggregate, State::Extreme(current)) => {
                    let Some(candidate) = evaluator
                        .eval(row, &spec.expr)
                        .filter(|v| !v.is_null())
                    else {
                        continue;
                    };
                    let wanted = if aggregate == Aggregate::Min {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    };
                    let replace = match current {
                        None => true,
                        Some(existing) => candidate.compare(existing) == Some(wanted),
                    };
                    if replace {
                        *current = Some(candidate);
                    }
                }
                _ => {}
            }
        }
    }

    fn finalize(&self, bucket: Bucket) -> Vec<Value> {
        let rows = bucket.rows;
        bucket
            .states
            .into_iter()
            .map(|state| match state {
                State::Value(value) => value,
                State::Count if self.partial => {
                    Value::Slice(vec![Value::Int(rows), Value::Number(0.0)])
                }
                State::Count => Value::Int(rows),
                State::Sum {
                    int_total,
                    float_total,
                    all_int,
                } => {
                    if self.partial {
                        Value::Slice(vec![Value::Int(rows), Value::Number(float_total)])
                    } else {
                        match int_total {
                            Some(total) if all_int => Value::Int(total),
                            _ => Value::Number(float_total),
                        }
                    }
                }
                State::Avg { total, count } => {
                    if self.partial {
                        Value::Slice(vec![Value::Int(count), Value::Number(total)])
                    } else if count == 0 {
                        Value::Null
                    } else {
                        Value::Number(total / count as f64)
                    }
                }
                State::Extreme(value) => value.unwrap_or(Value::Null),
            })
            .collect()
    }
}

#[async_trait]
impl Task for GroupByTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, true)
    }

    async fn run(&mut self) -> TaskResult {
        let ctx = self.base.ctx().clone();
        let mut buckets: HashMap<String, Bucket> = HashMap::new();
        let mut consumed = 0usize;

        while let Some(message) = self.base.recv().await {
            let Some(view) = message.view(self.base.input_index().map(|i| i.as_ref())) else {
                return Err(self.base.fail(ExecutionError::UnexpectedMessage {
                    task: self.base.name().to_string(),
                    detail: "positional row without declared input columns".to_string(),
                }));
            };
            let key = self.bucket_key(&ctx.evaluator, &view);
            let bucket = buckets.entry(key).or_insert_with(|| Bucket {
                rows: 0,
                states: self
                    .specs
                    .iter()
                    .map(|spec| State::initial(spec.aggregate))
                    .collect(),
            });
            self.accumulate(&ctx.evaluator, &view, bucket);
            consumed += 1;
            self.base.check_buffered(buckets.len())?;
        }

        if self.base.signal().is_closed() {
            self.base.finish();
            return Ok(());
        }

        log::debug!(
            "{} folded {} rows into {} groups",
            self.base.name(),
            consumed,
            buckets.len()
        );
        for (id, bucket) in buckets.into_values().enumerate() {
            let values = self.finalize(bucket);
            let row = Message::row(id as u64 + 1, values, self.output_index.clone());
            if !self.base.emit(row).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::exec::task::test_support::{rows, run_with_input, value_of};
    use crate::plan::OutputColumn;

    fn orders() -> Vec<Message> {
        rows(
            &["user_id", "price"],
            vec![
                vec!["x".into(), Value::Int(20)],
                vec!["y".into(), Value::Int(5)],
                vec!["x".into(), Value::Int(40)],
            ],
        )
    }

    fn plan(partial: bool) -> GroupByPlan {
        GroupByPlan {
            group_by: vec![Expr::col("user_id")],
            columns: vec![
                OutputColumn::new(Expr::col("user_id"), "user_id"),
                OutputColumn::new(Expr::func("count", vec![Expr::Star]), "count"),
                OutputColumn::new(Expr::func("sum", vec![Expr::col("price")]), "total"),
                OutputColumn::new(Expr::func("avg", vec![Expr::col("price")]), "avg"),
            ],
            partial,
            input_columns: vec![],
        }
    }

    fn group<'a>(out: &'a [Message], user: &str) -> &'a Message {
        out.iter()
            .find(|m| value_of(m, "user_id") == Some(&Value::from(user)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_row_per_key() {
        let ctx = Arc::new(ExecutionContext::default());
        let mut task = GroupByTask::new(ctx, &plan(false)).unwrap();
        let (result, out) = run_with_input(&mut task, orders()).await;
        result.unwrap();

        assert_eq!(out.len(), 2);
        let x = group(&out, "x");
        assert_eq!(value_of(x, "count"), Some(&Value::Int(2)));
        assert_eq!(value_of(x, "total"), Some(&Value::Int(60)));
        assert_eq!(value_of(x, "avg"), Some(&Value::Number(30.0)));
        let y = group(&out, "y");
        assert_eq!(value_of(y, "count"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_results_do_not_depend_on_arrival_order() {
        let mut input: Vec<Message> = rows(
            &["user_id", "price"],
            (0..40)
                .map(|i| vec![Value::from(format!("u{}", i % 4)), Value::Number(i as f64 * 1.5)])
                .collect(),
        );
        let ctx = Arc::new(ExecutionContext::default());
        let mut ordered = GroupByTask::new(ctx.clone(), &plan(false)).unwrap();
        let (_, expected) = run_with_input(&mut ordered, input.clone()).await;

        fastrand::seed(7);
        fastrand::shuffle(&mut input);
        let mut shuffled = GroupByTask::new(ctx, &plan(false)).unwrap();
        let (_, actual) = run_with_input(&mut shuffled, input).await;

        for user in ["u0", "u1", "u2", "u3"] {
            let (a, b) = (group(&expected, user), group(&actual, user));
            for column in ["count", "total", "avg"] {
                let (a, b) = (value_of(a, column).unwrap(), value_of(b, column).unwrap());
                assert!((a.as_number().unwrap() - b.as_number().unwrap()).abs() < 1e-9);
            }
        }
    }

    #[tokio::test]
    async fn test_unevaluable_values() {
        let input = rows(
            &["g", "v"],
            vec![
                vec!["a".into(), "oops".into()],
                vec!["a".into(), Value::Null],
                vec!["b".into(), Value::Int(4)],
            ],
        );
        let group_plan = GroupByPlan {
            group_by: vec![Expr::col("g")],
            columns: vec![
                OutputColumn::new(Expr::col("g"), "user_id"),
                OutputColumn::new(Expr::func("sum", vec![Expr::col("v")]), "sum"),
                OutputColumn::new(Expr::func("avg", vec![Expr::col("v")]), "avg"),
                OutputColumn::new(Expr::func("max", vec![Expr::col("v")]), "max"),
                OutputColumn::new(Expr::col("v"), "last"),
            ],
            partial: false,
            input_columns: vec![],
        };
        let mut task =
            GroupByTask::new(Arc::new(ExecutionContext::default()), &group_plan).unwrap();
        let (result, out) = run_with_input(&mut task, input).await;
        result.unwrap();

        let a = group(&out, "a");
        assert_eq!(value_of(a, "sum"), Some(&Value::Int(0)));
        assert_eq!(value_of(a, "avg"), Some(&Value::Null));
        assert_eq!(value_of(a, "last"), Some(&Value::Null));
        assert_eq!(value_of(group(&out, "b"), "max"), Some(&Value::Int(4)));
    }

    #[tokio::test]
    async fn test_partial_mode_emits_count_sum_pairs() {
        let ctx = Arc::new(ExecutionContext::default());
        let mut task = GroupByTask::new(ctx, &plan(true)).unwrap();
        let (result, out) = run_with_input(&mut task, orders()).await;
        result.unwrap();

        let x = group(&out, "x");
        assert_eq!(
            value_of(x, "total"),
            Some(&Value::Slice(vec![Value::Int(2), Value::Number(60.0)]))
        );
        assert_eq!(
            value_of(x, "avg"),
            Some(&Value::Slice(vec![Value::Int(2), Value::Number(60.0)]))
        );
    }

    #[tokio::test]
    async fn test_empty_input_emits_nothing() {
        let ctx = Arc::new(ExecutionContext::default());
        let mut task = GroupByTask::new(ctx, &plan(false)).unwrap();
        let (result, out) = run_with_input(&mut task, vec![]).await;
        result.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_bucket_limit() {
        let ctx = Arc::new(ExecutionContext::new(
            EngineConfig::default().with_max_buffered_rows(1),
            Default::default(),
        ));
        let mut task = GroupByTask::new(ctx.clone(), &plan(false)).unwrap();
        let (result, out) = run_with_input(&mut task, orders()).await;
        assert!(matches!(
            result,
            Err(ExecutionError::MaterializationLimit { limit: 1, .. })
        ));
        assert!(out.is_empty());
        assert!(ctx.first_error().is_some());
    }

    #[tokio::test]
    async fn test_bucket_limit_counts_groups_not_rows() {
        let ctx = Arc::new(ExecutionContext::new(
            EngineConfig::default().with_max_buffered_rows(2),
            Default::default(),
        ));
        let mut task = GroupByTask::new(ctx, &plan(false)).unwrap();
        // three rows, two groups
        let (result, out) = run_with_input(&mut task, orders()).await;
        result.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_aggregate_without_argument_is_rejected() {
        let bad = GroupByPlan {
            group_by: vec![],
            columns: vec![OutputColumn::new(Expr::func("sum", vec![]), "s")],
            partial: false,
            input_columns: vec![],
        };
        assert!(GroupByTask::new(Arc::new(ExecutionContext::default()), &bad).is_err());
    }
}
