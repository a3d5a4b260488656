//! Outbound message transports.

pub mod stdio;

pub use stdio::{spawn_line_reader, StdioTransport};

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{CourierError, Result};
use crate::types::Envelope;

/// Hands outbound envelopes to the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<()>;
}

/// Transport that keeps every outbound envelope in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Envelope>>,
    notify: Notify,
    fail_sends: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.fail_sends.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    /// Snapshot of everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain everything sent so far.
    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wait until at least `count` envelopes have been sent.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Result<Vec<Envelope>> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                // register before checking so a concurrent send is not missed
                notified.as_mut().enable();
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CourierError::Timeout(timeout.as_millis() as u64))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, envelope: Envelope) -> Result<()> {
        if *self.fail_sends.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(CourierError::Transport(format!(
                "delivery to {} refused",
                envelope.target
            )));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
        self.notify.notify_waiters();
        Ok(())
    }
}
