//! Connection Guard
//!
//! Holds the live connection to one remote node. Connections come and go as
//! the orchestration layer dials, loses and replaces them; the guard is the
//! single piece of bridge state that is genuinely shared across tasks.

use crate::error::Result;
use crate::wire::WireMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// The live connection to one specific remote node.
///
/// Implemented by the transport layer. Ownership transfers into the guard on
/// bind; binding a replacement does not close the old sender, tearing down
/// superseded senders is the binder's job.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Transmit one frame. `Ok` means handed to the transport, not that the
    /// peer received it; the bridge never assumes more than "no error".
    async fn send(&self, message: &WireMessage) -> Result<()>;

    /// Best-effort, idempotent close.
    async fn terminate(&self);
}

/// Hook invoked synchronously whenever a sender is bound. Diagnostic seam.
pub type ConnectionHook = Box<dyn Fn() + Send + Sync>;

/// Current sender for one remote node, or none while disconnected.
///
/// Observers never see a "connecting" state: there is a sender or there is
/// not. Every bind wakes all waiters at once.
pub struct ConnectionGuard {
    current: watch::Sender<Option<Arc<dyn MessageSender>>>,
    on_established: Mutex<Option<ConnectionHook>>,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            on_established: Mutex::new(None),
        }
    }

    /// Block the calling task until a sender is bound. Safe from any number
    /// of concurrent callers; all are released together on bind.
    pub async fn wait_until_connected(&self) {
        let mut rx = self.current.subscribe();
        // wait_for only fails when the sender side is dropped, and we own it.
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Install `sender` as current, unconditionally replacing any previous
    /// value, and wake all waiters. The connection-established hook, if any,
    /// runs synchronously inside the same update.
    pub fn bind(&self, sender: Arc<dyn MessageSender>) {
        let hook = self.on_established.lock();
        self.current.send_modify(|current| {
            *current = Some(sender);
            if let Some(hook) = hook.as_ref() {
                hook();
            }
        });
        debug!("connection bound");
    }

    /// Clear the bound sender only if it is still exactly `sender`.
    ///
    /// A disconnect notification can arrive after the connection has already
    /// been replaced; comparing identities keeps the stale close from
    /// clobbering the newer binding.
    pub fn clear_if_current(&self, sender: &Arc<dyn MessageSender>) {
        self.current.send_if_modified(|current| match current {
            Some(bound) if Arc::ptr_eq(bound, sender) => {
                *current = None;
                true
            }
            _ => false,
        });
    }

    /// Snapshot of the bound sender, if any.
    pub fn current(&self) -> Option<Arc<dyn MessageSender>> {
        self.current.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Register a hook invoked on every bind.
    pub fn on_connection_established(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_established.lock() = Some(Box::new(hook));
    }
}

impl Default for ConnectionGuard {
    fn default() -> Self {
        Self::new()
    }
}
