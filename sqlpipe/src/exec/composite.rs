// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Composite tasks: sequential chains and parallel siblings
//!
//! Each child runs as its own tokio task. A panic inside a child surfaces
//! here as a `JoinError`, is recorded as a runtime fault and stops the
//! statement; the host process keeps running.

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::task::{Task, TaskResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Spawn every child, wait for all of them and put the survivors back
async fn run_children(
    ctx: &Arc<ExecutionContext>,
    owner: &str,
    children: &mut Vec<Box<dyn Task>>,
    reverse: bool,
) -> TaskResult {
    let count = children.len();
    let mut spawned: Vec<(usize, Box<dyn Task>)> =
        std::mem::take(children).into_iter().enumerate().collect();
    if reverse {
        // consumers first, so every producer starts with a live reader
        spawned.reverse();
    }

    let handles: Vec<_> = spawned
        .into_iter()
        .map(|(pos, mut child)| {
            let handle = tokio::spawn(async move {
                let result = child.run().await;
                (child, result)
            });
            (pos, handle)
        })
        .collect();

    let mut slots: Vec<Option<Box<dyn Task>>> = (0..count).map(|_| None).collect();
    let mut failure: Option<ExecutionError> = None;
    for (pos, handle) in handles {
        match handle.await {
            Ok((child, result)) => {
                if let Err(e) = result {
                    failure.get_or_insert(e);
                }
                slots[pos] = Some(child);
            }
            Err(join_error) => {
                let error = ExecutionError::from(join_error);
                log::error!("child {} of {} aborted: {}", pos, owner, error);
                ctx.report_error(error.clone());
                failure.get_or_insert(error);
            }
        }
    }
    *children = slots.into_iter().flatten().collect();

    match failure {
        Some(e) => Err(ctx.first_error().unwrap_or(e)),
        None => Ok(()),
    }
}

fn close_children(children: &mut [Box<dyn Task>]) -> TaskResult {
    let mut first = Ok(());
    for child in children.iter_mut() {
        if let Err(e) = child.close() {
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

/// Children chained output to input; started last to first
pub struct Sequential {
    name: String,
    ctx: Arc<ExecutionContext>,
    children: Vec<Box<dyn Task>>,
}

impl Sequential {
    pub fn new(ctx: Arc<ExecutionContext>, children: Vec<Box<dyn Task>>) -> Self {
        Self {
            name: "sequential".to_string(),
            ctx,
            children,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Task for Sequential {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        if self.children.is_empty() {
            return Err(ExecutionError::InvalidPlan(format!(
                "{} has no children",
                self.name
            )));
        }
        for i in 1..self.children.len() {
            let outputs = self.children[i - 1].take_outputs();
            if !outputs.is_empty() {
                self.children[i].set_inputs(outputs);
            }
        }
        for child in self.children.iter_mut() {
            child.setup(depth + 1)?;
        }
        Ok(())
    }

    async fn run(&mut self) -> TaskResult {
        log::debug!("{} starting {} children", self.name, self.children.len());
        run_children(&self.ctx, &self.name, &mut self.children, true).await
    }

    fn close(&mut self) -> TaskResult {
        close_children(&mut self.children)
    }

    fn children(&self) -> Vec<&dyn Task> {
        self.children.iter().map(|child| child.as_ref()).collect()
    }

    fn set_input(&mut self, input: MessageReceiver) {
        if let Some(first) = self.children.first_mut() {
            first.set_input(input);
        }
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.children.last_mut().and_then(|last| last.take_output())
    }

    fn set_inputs(&mut self, inputs: Vec<MessageReceiver>) {
        if let Some(first) = self.children.first_mut() {
            first.set_inputs(inputs);
        }
    }

    fn take_outputs(&mut self) -> Vec<MessageReceiver> {
        self.children
            .last_mut()
            .map(|last| last.take_outputs())
            .unwrap_or_default()
    }
}

/// Independent children run side by side
pub struct Parallel {
    name: String,
    ctx: Arc<ExecutionContext>,
    children: Vec<Box<dyn Task>>,
}

impl Parallel {
    pub fn new(ctx: Arc<ExecutionContext>, children: Vec<Box<dyn Task>>) -> Self {
        Self {
            name: "parallel".to_string(),
            ctx,
            children,
        }
    }
}

#[async_trait]
impl Task for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        for child in self.children.iter_mut() {
            child.setup(depth + 1)?;
        }
        Ok(())
    }

    async fn run(&mut self) -> TaskResult {
        log::debug!("{} starting {} children", self.name, self.children.len());
        run_children(&self.ctx, &self.name, &mut self.children, false).await
    }

    fn close(&mut self) -> TaskResult {
        close_children(&mut self.children)
    }

    fn children(&self) -> Vec<&dyn Task> {
        self.children.iter().map(|child| child.as_ref()).collect()
    }

    fn set_input(&mut self, input: MessageReceiver) {
        if let Some(first) = self.children.first_mut() {
            first.set_input(input);
        }
    }

    /// Parallel children each own a separate stream; use `take_outputs`
    fn take_output(&mut self) -> Option<MessageReceiver> {
        None
    }

    fn set_inputs(&mut self, inputs: Vec<MessageReceiver>) {
        for (child, input) in self.children.iter_mut().zip(inputs) {
            child.set_input(input);
        }
    }

    fn take_outputs(&mut self) -> Vec<MessageReceiver> {
        self.children
            .iter_mut()
            .flat_map(|child| child.take_outputs())
            .collect()
    }
}
