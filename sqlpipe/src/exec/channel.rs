// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Message channels and the statement-wide cancellation signal

use super::message::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub type MessageSender = mpsc::Sender<Message>;
pub type MessageReceiver = mpsc::Receiver<Message>;

/// Bounded single-producer message channel; dropping the sender is end of stream
pub fn message_channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Broadcast cancellation shared by every task of one statement
#[derive(Debug, Clone)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal; later calls are no-ops
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is closed
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so this only returns once closed
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_wakes_waiters() {
        let signal = Signal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.closed().await })
        };

        assert!(!signal.is_closed());
        signal.close();
        signal.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn test_closed_returns_immediately_when_already_closed() {
        let signal = Signal::new();
        signal.close();
        tokio::time::timeout(Duration::from_millis(100), signal.closed())
            .await
            .unwrap();
    }
}
