//! Test doubles for the bridge's external collaborators.
//!
//! Hand-rolled recording fakes rather than a mocking crate: the surfaces are
//! two small traits and the assertions are about call order and counts.
//! Exported so downstream crates can drive a bridge without a real transport
//! or mailbox runtime.

use crate::connection::MessageSender;
use crate::error::{BridgeError, Result};
use crate::router::{Address, MailboxRouter};
use crate::wire::WireMessage;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use types::MailboxId;

/// [`MailboxRouter`] that records every call. Accessors return snapshots.
#[derive(Debug, Default)]
pub struct RecordingRouter {
    delivered: Mutex<Vec<(MailboxId, Bytes)>>,
    terminations: Mutex<Vec<(MailboxId, MailboxId)>>,
    watches: Mutex<Vec<(MailboxId, Address)>>,
    unwatches: Mutex<Vec<(MailboxId, Address)>>,
}

impl RecordingRouter {
    /// Application payloads delivered, as `(target, payload)`.
    pub fn delivered(&self) -> Vec<(MailboxId, Bytes)> {
        self.delivered.lock().clone()
    }

    /// Termination notices delivered, as `(watcher, terminated)`.
    pub fn terminations(&self) -> Vec<(MailboxId, MailboxId)> {
        self.terminations.lock().clone()
    }

    /// Watch registrations, as `(watched, watcher address)`.
    pub fn watches(&self) -> Vec<(MailboxId, Address)> {
        self.watches.lock().clone()
    }

    pub fn unwatches(&self) -> Vec<(MailboxId, Address)> {
        self.unwatches.lock().clone()
    }
}

impl MailboxRouter for RecordingRouter {
    fn deliver(&self, target: MailboxId, payload: Bytes) {
        self.delivered.lock().push((target, payload));
    }

    fn deliver_termination(&self, target: MailboxId, terminated: MailboxId) {
        self.terminations.lock().push((target, terminated));
    }

    fn watch_termination(&self, target: MailboxId, watcher: Address) {
        self.watches.lock().push((target, watcher));
    }

    fn unwatch_termination(&self, target: MailboxId, watcher: &Address) {
        self.unwatches.lock().push((target, watcher.clone()));
    }
}

/// [`MessageSender`] that records frames and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<WireMessage>>,
    fail_sends: AtomicBool,
    terminate_calls: AtomicUsize,
}

impl RecordingSender {
    /// A sender whose every `send` fails with a broken-pipe error.
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.fail_sends.store(true, Ordering::SeqCst);
        sender
    }

    /// Flip failure mode at runtime.
    pub fn set_failing(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Frames successfully sent, in order.
    pub fn sent(&self) -> Vec<WireMessage> {
        self.sent.lock().clone()
    }

    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &WireMessage) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BridgeError::send_failed(
                message.description(),
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset"),
            ));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn terminate(&self) {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
    }
}
