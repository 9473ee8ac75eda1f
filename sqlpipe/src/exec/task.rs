// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Task contract and the shared plumbing every operator builds on
//!
//! A task owns at most one input receiver and one output sender. It runs
//! until its input is exhausted, its consumer goes away, or the statement
//! signal closes. Dropping the output sender is the only end-of-stream
//! marker a task ever produces.

use super::channel::{message_channel, MessageReceiver, MessageSender, Signal};
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::message::{column_index, ColumnIndex, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for task operations
pub type TaskResult<T = ()> = Result<T, ExecutionError>;

/// A node of the running pipeline
#[async_trait]
pub trait Task: Send {
    fn name(&self) -> &str;

    /// Prepare the task before it runs; `depth` is its distance from the root
    fn setup(&mut self, depth: usize) -> TaskResult;

    /// Process input until it is exhausted or the statement is cancelled
    async fn run(&mut self) -> TaskResult;

    /// Release resources. Safe to call more than once.
    fn close(&mut self) -> TaskResult;

    fn children(&self) -> Vec<&dyn Task> {
        Vec::new()
    }

    /// Connect the upstream stream
    fn set_input(&mut self, input: MessageReceiver);

    /// Hand out the downstream stream; `None` once taken or if the task has none
    fn take_output(&mut self) -> Option<MessageReceiver>;

    /// Connect several upstream streams (only joins consume more than one)
    fn set_inputs(&mut self, mut inputs: Vec<MessageReceiver>) {
        if let Some(input) = inputs.pop() {
            self.set_input(input);
        }
    }

    /// Hand out every downstream stream
    fn take_outputs(&mut self) -> Vec<MessageReceiver> {
        self.take_output().into_iter().collect()
    }
}

/// Channel plumbing and error reporting shared by leaf tasks
pub struct TaskBase {
    name: String,
    ctx: Arc<ExecutionContext>,
    input: Option<MessageReceiver>,
    output: Option<MessageSender>,
    output_rx: Option<MessageReceiver>,
    /// Names for positional input messages
    input_index: Option<Arc<ColumnIndex>>,
    depth: usize,
    closed: bool,
}

impl TaskBase {
    pub fn new(name: impl Into<String>, ctx: Arc<ExecutionContext>) -> Self {
        let (tx, rx) = message_channel(ctx.config.channel_capacity);
        Self {
            name: name.into(),
            ctx,
            input: None,
            output: Some(tx),
            output_rx: Some(rx),
            input_index: None,
            depth: 0,
            closed: false,
        }
    }

    /// Declare the column names used to wrap positional input
    pub fn with_input_columns(mut self, columns: &[String]) -> Self {
        if !columns.is_empty() {
            self.input_index = Some(column_index(columns));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ctx(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    pub fn signal(&self) -> &Signal {
        self.ctx.signal()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn input_index(&self) -> Option<&Arc<ColumnIndex>> {
        self.input_index.as_ref()
    }

    pub fn set_input(&mut self, input: MessageReceiver) {
        self.input = Some(input);
    }

    pub fn take_output(&mut self) -> Option<MessageReceiver> {
        self.output_rx.take()
    }

    /// Record the depth and check that an input is connected
    pub fn setup(&mut self, depth: usize, needs_input: bool) -> TaskResult {
        self.depth = depth;
        if needs_input && self.input.is_none() {
            return Err(ExecutionError::InvalidPlan(format!(
                "{} has no input stream",
                self.name
            )));
        }
        log::trace!("{:indent$}setup {}", "", self.name, indent = depth * 2);
        Ok(())
    }

    /// Next input message; `None` at end of stream or once the signal closes
    pub async fn recv(&mut self) -> Option<Message> {
        if self.ctx.signal().is_closed() {
            return None;
        }
        let input = self.input.as_mut()?;
        tokio::select! {
            biased;
            _ = self.ctx.signal().closed() => None,
            message = input.recv() => message,
        }
    }

    /// Send downstream. Returns `false` when the task should stop: the
    /// consumer is gone or the signal closed.
    pub async fn emit(&mut self, message: Message) -> bool {
        let Some(output) = self.output.as_ref() else {
            return false;
        };
        tokio::select! {
            biased;
            _ = self.ctx.signal().closed() => false,
            sent = output.send(message) => sent.is_ok(),
        }
    }

    /// Send without waiting. Used for mutation summaries, which must be
    /// delivered even after the signal closes.
    pub fn try_emit(&mut self, message: Message) -> bool {
        self.output
            .as_ref()
            .map_or(false, |output| output.try_send(message).is_ok())
    }

    /// Report a task-fatal error and end the output stream. Returns the
    /// error so callers can `return Err(base.fail(e))`.
    pub fn fail(&mut self, error: ExecutionError) -> ExecutionError {
        log::error!("{} failed: {}", self.name, error);
        self.ctx.report_error(error.clone());
        self.output = None;
        error
    }

    /// Fail unless `buffered` is within the configured materialization limit
    pub fn check_buffered(&mut self, buffered: usize) -> TaskResult {
        match self.ctx.config.max_buffered_rows {
            Some(limit) if buffered > limit => {
                let task = self.name.clone();
                Err(self.fail(ExecutionError::MaterializationLimit { task, limit }))
            }
            _ => Ok(()),
        }
    }

    /// Log a row dropped by a soft evaluation failure
    pub fn log_dropped(&self, message: &Message, reason: &str) {
        if self.ctx.config.log_dropped_rows {
            log::debug!("{} dropped row {}: {}", self.name, message.id(), reason);
        } else {
            log::trace!("{} dropped row {}: {}", self.name, message.id(), reason);
        }
    }

    /// End the output stream
    pub fn finish(&mut self) {
        self.output = None;
    }

    /// Drop channels; returns `true` only on the first call
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.output = None;
        self.input = None;
        true
    }
}
