// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement executor
//!
//! Turns a [`PlanNode`] tree into a tree of tasks, runs it and collects the
//! root output. The lifecycle is `build`, `setup`, `run`, `close`; `execute`
//! drives all of it and folds the output into a [`QueryResult`].

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::channel::MessageReceiver;
use super::composite::{Parallel, Sequential};
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::filter::FilterTask;
use super::group_by::GroupByTask;
use super::join::{JoinKeyTask, JoinMergeTask};
use super::message::Message;
use super::mutation::{DeleteTask, InsertTask, UpdateTask};
use super::order::OrderTask;
use super::projection::ProjectionTask;
use super::result::{MutationSummary, QueryResult};
use super::source::SourceTask;
use super::task::{Task, TaskResult};
use crate::config::EngineConfig;
use crate::expr::Evaluator;
use crate::plan::PlanNode;
use crate::storage::SourceRegistry;

/// Cancels a running statement from outside the executor
#[derive(Clone)]
pub struct CancelHandle {
    ctx: Arc<ExecutionContext>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        log::debug!("statement {} cancelled", self.ctx.statement_id);
        self.ctx.report_error(ExecutionError::Cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }
}

/// Executes one statement plan
pub struct Executor {
    ctx: Arc<ExecutionContext>,
    root: Option<Box<dyn Task>>,
    outputs: Vec<MessageReceiver>,
    mutation: bool,
    set_up: bool,
    closed: bool,
}

impl Executor {
    /// Build the task tree for `plan`, opening a connection per table access
    pub fn build(
        plan: &PlanNode,
        registry: &SourceRegistry,
        config: EngineConfig,
    ) -> Result<Self, ExecutionError> {
        Self::build_with_evaluator(plan, registry, config, Evaluator::default())
    }

    /// Like [`Executor::build`] with a caller-supplied function registry
    pub fn build_with_evaluator(
        plan: &PlanNode,
        registry: &SourceRegistry,
        config: EngineConfig,
        evaluator: Evaluator,
    ) -> Result<Self, ExecutionError> {
        config.validate()?;
        let ctx = Arc::new(ExecutionContext::new(config, evaluator));
        let mut root = build_node(plan, &ctx, registry)?;
        let outputs = root.take_outputs();
        log::debug!(
            "statement {} built {} plan with {} output(s)",
            ctx.statement_id,
            plan.kind(),
            outputs.len()
        );

        Ok(Self {
            ctx,
            root: Some(root),
            outputs,
            mutation: plan.is_mutation(),
            set_up: false,
            closed: false,
        })
    }

    pub fn statement_id(&self) -> Uuid {
        self.ctx.statement_id
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// The root task, absent only while `run` is in progress
    pub fn root(&self) -> Option<&dyn Task> {
        self.root.as_deref()
    }

    /// Wire channels and validate the tree
    pub fn setup(&mut self) -> TaskResult {
        if self.set_up {
            return Ok(());
        }
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| ExecutionError::InvalidPlan("executor is running".to_string()))?;
        root.setup(0)?;
        self.set_up = true;
        Ok(())
    }

    /// Run the tree to completion
    ///
    /// Returns the first error any task reported, which is `Cancelled` after
    /// an external cancel. Output must be drained concurrently or the tree
    /// stalls once the root channel fills up.
    pub async fn run(&mut self) -> TaskResult {
        self.setup()?;
        let mut root = self
            .root
            .take()
            .ok_or_else(|| ExecutionError::InvalidPlan("executor is running".to_string()))?;

        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let result = root.run().await;
            (root, result)
        });
        let result = match handle.await {
            Ok((root, result)) => {
                self.root = Some(root);
                result
            }
            Err(join_error) => {
                let error = ExecutionError::from(join_error);
                log::error!("statement {} aborted: {}", self.ctx.statement_id, error);
                self.ctx.report_error(error.clone());
                Err(error)
            }
        };
        log::debug!(
            "statement {} ran in {:?}",
            self.ctx.statement_id,
            started.elapsed()
        );

        match self.ctx.first_error() {
            Some(error) => Err(error),
            None => result,
        }
    }

    /// Release every task's resources; later calls do nothing
    pub fn close(&mut self) -> TaskResult {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.ctx.signal().close();
        match self.root.as_mut() {
            Some(root) => root.close(),
            None => Ok(()),
        }
    }

    /// The root output channel, once
    pub fn take_output(&mut self) -> Option<MessageReceiver> {
        if self.outputs.is_empty() {
            None
        } else {
            Some(self.outputs.remove(0))
        }
    }

    /// Every root output channel; a parallel root has one per branch
    pub fn take_outputs(&mut self) -> Vec<MessageReceiver> {
        std::mem::take(&mut self.outputs)
    }

    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            ctx: self.ctx.clone(),
        }
    }

    /// First error recorded for the statement
    pub fn error(&self) -> Option<ExecutionError> {
        self.ctx.first_error()
    }

    /// Set up, run and close, collecting the root output
    ///
    /// A select that fails returns the error and discards any rows already
    /// produced. A mutation always returns its summary, including a failed
    /// or cancelled one.
    pub async fn execute(mut self) -> Result<QueryResult, ExecutionError> {
        let started = Instant::now();
        if let Err(e) = self.setup() {
            let _ = self.close();
            return Err(e);
        }

        let outputs = self.take_outputs();
        let (run_result, messages) = tokio::join!(self.run(), drain_all(outputs));
        let close_result = self.close();
        let elapsed = started.elapsed().as_millis() as u64;

        if self.mutation {
            if let Some(summary) = messages.iter().find_map(MutationSummary::from_message) {
                log::debug!(
                    "statement {} finished: {} ({} affected)",
                    self.ctx.statement_id,
                    summary.status,
                    summary.affected
                );
                let mut result = QueryResult::for_mutation(summary);
                result.execution_time_ms = elapsed;
                return Ok(result);
            }
            run_result?;
            return Err(ExecutionError::RuntimeFault(
                "mutation produced no summary".to_string(),
            ));
        }

        run_result?;
        close_result?;
        let mut result = QueryResult::from_messages(messages);
        result.execution_time_ms = elapsed;
        log::debug!(
            "statement {} returned {} rows in {}ms",
            self.ctx.statement_id,
            result.len(),
            elapsed
        );
        Ok(result)
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Read every output channel to its end
async fn drain_all(outputs: Vec<MessageReceiver>) -> Vec<Message> {
    let handles: Vec<_> = outputs
        .into_iter()
        .map(|mut rx| {
            tokio::spawn(async move {
                let mut messages = Vec::new();
                while let Some(message) = rx.recv().await {
                    messages.push(message);
                }
                messages
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(mut messages) => all.append(&mut messages),
            Err(e) => log::error!("output drain aborted: {}", e),
        }
    }
    all
}

fn build_children(
    nodes: &[PlanNode],
    ctx: &Arc<ExecutionContext>,
    registry: &SourceRegistry,
) -> TaskResult<Vec<Box<dyn Task>>> {
    nodes
        .iter()
        .map(|node| build_node(node, ctx, registry))
        .collect()
}

fn build_node(
    node: &PlanNode,
    ctx: &Arc<ExecutionContext>,
    registry: &SourceRegistry,
) -> TaskResult<Box<dyn Task>> {
    let task_ctx = ctx.clone();
    let task: Box<dyn Task> = match node {
        PlanNode::Select(select) => {
            let children = build_children(&select.children, ctx, registry)?;
            if select.parallel {
                Box::new(Parallel::new(task_ctx, children))
            } else {
                Box::new(Sequential::new(task_ctx, children))
            }
        }
        PlanNode::Source(plan) => Box::new(SourceTask::new(task_ctx, registry.open(&plan.table)?)?),
        PlanNode::Where(plan) => Box::new(FilterTask::new_where(task_ctx, plan)),
        PlanNode::Having(plan) => Box::new(FilterTask::new_having(task_ctx, plan)),
        PlanNode::GroupBy(plan) => Box::new(GroupByTask::new(task_ctx, plan)?),
        PlanNode::Order(plan) => Box::new(OrderTask::new(task_ctx, plan)),
        PlanNode::Projection(plan) => Box::new(ProjectionTask::new(task_ctx, plan)),
        PlanNode::JoinKey(plan) => Box::new(JoinKeyTask::new(task_ctx, plan)),
        PlanNode::JoinMerge(plan) => {
            let left = build_node(&plan.left, ctx, registry)?;
            let right = build_node(&plan.right, ctx, registry)?;
            let merge = JoinMergeTask::new(ctx.clone(), plan)?;
            let branches = Parallel::new(ctx.clone(), vec![left, right]);
            Box::new(
                Sequential::new(task_ctx, vec![Box::new(branches), Box::new(merge)]).with_name("join"),
            )
        }
        PlanNode::Insert(plan) => Box::new(InsertTask::new_insert(
            task_ctx,
            plan,
            registry.open(&plan.table)?,
        )?),
        PlanNode::Upsert(plan) => Box::new(InsertTask::new_upsert(
            task_ctx,
            plan,
            registry.open(&plan.table)?,
        )?),
        PlanNode::Update(plan) => {
            Box::new(UpdateTask::new(task_ctx, plan, registry.open(&plan.table)?)?)
        }
        PlanNode::Delete(plan) => {
            Box::new(DeleteTask::new(task_ctx, plan, registry.open(&plan.table)?)?)
        }
    };
    log::trace!("built {} task '{}'", node.kind(), task.name());
    Ok(task)
}
