// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table scan feeding the pipeline

use super::channel::MessageReceiver;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::task::{Task, TaskBase, TaskResult};
use crate::storage::Connection;
use async_trait::async_trait;
use std::sync::Arc;

/// Streams every row of one table downstream unchanged
pub struct SourceTask {
    base: TaskBase,
    connection: Box<dyn Connection>,
}

impl SourceTask {
    /// Fails when the connection cannot scan
    pub fn new(ctx: Arc<ExecutionContext>, connection: Box<dyn Connection>) -> TaskResult<Self> {
        if connection.scanner().is_none() {
            return Err(ExecutionError::MissingCapability {
                table: connection.table().to_string(),
                capability: "Scanner".to_string(),
            });
        }
        let name = format!("source({})", connection.table());
        Ok(Self {
            base: TaskBase::new(name, ctx),
            connection,
        })
    }
}

#[async_trait]
impl Task for SourceTask {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn setup(&mut self, depth: usize) -> TaskResult {
        self.base.setup(depth, false)
    }

    async fn run(&mut self) -> TaskResult {
        let scanner = self.connection.scanner().ok_or_else(|| {
            self.base.fail(ExecutionError::MissingCapability {
                table: self.connection.table().to_string(),
                capability: "Scanner".to_string(),
            })
        })?;
        let mut rows = scanner
            .create_iterator()
            .map_err(|e| self.base.fail(e.into()))?;

        let mut emitted = 0usize;
        while !self.base.signal().is_closed() {
            let Some(message) = rows.next() else {
                break;
            };
            if !self.base.emit(message).await {
                break;
            }
            emitted += 1;
        }
        log::debug!("{} emitted {} rows", self.base.name(), emitted);
        self.base.finish();
        Ok(())
    }

    fn close(&mut self) -> TaskResult {
        if self.base.close() {
            self.connection.close()?;
        }
        Ok(())
    }

    /// Sources read from storage, never from a channel
    fn set_input(&mut self, _input: MessageReceiver) {
        log::warn!("{} ignores its input stream", self.base.name());
    }

    fn take_output(&mut self) -> Option<MessageReceiver> {
        self.base.take_output()
    }
}
